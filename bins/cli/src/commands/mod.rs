//! CLI command handlers.

pub mod cache;
pub mod config;
pub mod health;
pub mod query;

pub use cache::{run_cache_clear_command, run_cache_invalidate_command, run_cache_stats_command};
pub use config::{run_config_check, run_config_show};
pub use health::run_health_command;
pub use query::{QueryCommandInput, run_query_command};
