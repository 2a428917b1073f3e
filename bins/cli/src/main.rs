//! `docrag` binary entrypoint.

mod commands;
mod error;
mod format;
mod logging;

use clap::{Args, Parser, Subcommand, ValueEnum};
use commands::{
    QueryCommandInput, run_cache_clear_command, run_cache_invalidate_command,
    run_cache_stats_command, run_config_check, run_config_show, run_health_command,
    run_query_command,
};
use docrag_domain::CacheLayer;
use docrag_infra::ConfigRendering;
use error::CliError;
use format::{CliOutput, OutputArgs, OutputMode};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(
    name = "docrag",
    version,
    about = "Cache administration and cached queries for the document RAG service",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    output: OutputArgs,

    #[command(flatten)]
    source: ConfigSource,

    #[command(subcommand)]
    command: Commands,
}

/// Where the cache config comes from. Env variables apply on top.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigSource {
    /// Config file (`.toml` or `.json`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Partial config as JSON, merged over the file.
    #[arg(long, global = true)]
    overrides_json: Option<String>,
}

impl ConfigSource {
    fn path(&self) -> Option<&Path> {
        self.config.as_deref()
    }

    fn overrides(&self) -> Option<&str> {
        self.overrides_json.as_deref()
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Cache administration.
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// Answer a question against a local corpus through the cache.
    Query {
        /// Question text.
        question: String,
        /// Restrict retrieval to one document.
        #[arg(long)]
        doc_id: Option<String>,
        /// Corpus file: a JSON array of chunks or plain text paragraphs.
        #[arg(long)]
        corpus: PathBuf,
        /// Ask the question this many times in one process.
        #[arg(long, default_value_t = 1)]
        repeat: u32,
    },
    /// Config-related commands.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Service health and cache status.
    Health,
}

#[derive(Debug, Subcommand)]
enum CacheCommands {
    /// Store statistics (hits, misses, hit rate).
    Stats,
    /// Remove cached entries.
    Clear {
        /// Only clear this layer (`embedding`, `similarity`, `query`).
        #[arg(long)]
        layer: Option<CacheLayer>,
    },
    /// Drop answers and hit lists after a document was ingested.
    Invalidate {
        /// Document that received new content.
        #[arg(long)]
        doc_id: String,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Print the effective config.
    Show {
        /// Rendering for text output.
        #[arg(long, value_enum, default_value_t = RenderingArg::Toml)]
        format: RenderingArg,
    },
    /// Validate config loading, merging and env overrides.
    Check,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RenderingArg {
    Json,
    Toml,
}

impl From<RenderingArg> for ConfigRendering {
    fn from(value: RenderingArg) -> Self {
        match value {
            RenderingArg::Json => Self::Json,
            RenderingArg::Toml => Self::Toml,
        }
    }
}

fn main() -> std::process::ExitCode {
    logging::init();
    let cli = Cli::parse();
    let mode = OutputMode::from_args(&cli.output);

    match run(cli.command, &cli.source, mode) {
        Ok(output) => match write_output(&output) {
            Ok(()) => std::process::ExitCode::from(output.exit_code.as_u8()),
            Err(error) => exit_with_error(&error),
        },
        Err(error) => exit_with_error(&error),
    }
}

fn exit_with_error(error: &CliError) -> std::process::ExitCode {
    let _ = writeln!(io::stderr(), "error: {error}");
    std::process::ExitCode::from(error.exit_code().as_u8())
}

fn run(command: Commands, source: &ConfigSource, mode: OutputMode) -> Result<CliOutput, CliError> {
    match command {
        Commands::Cache { command } => match command {
            CacheCommands::Stats => run_cache_stats_command(mode, source),
            CacheCommands::Clear { layer } => run_cache_clear_command(mode, source, layer),
            CacheCommands::Invalidate { doc_id } => {
                run_cache_invalidate_command(mode, source, &doc_id)
            },
        },
        Commands::Query {
            question,
            doc_id,
            corpus,
            repeat,
        } => run_query_command(
            mode,
            source,
            QueryCommandInput {
                question,
                doc_id,
                corpus,
                repeat,
            },
        ),
        Commands::Config { command } => {
            let env = collect_env();
            match command {
                ConfigCommands::Show { format } => {
                    run_config_show(mode, source, &env, format.into())
                },
                ConfigCommands::Check => run_config_check(mode, source, &env),
            }
        },
        Commands::Health => run_health_command(mode, source),
    }
}

fn write_output(output: &CliOutput) -> Result<(), CliError> {
    let mut stdout = io::stdout();
    stdout.write_all(output.stdout.as_bytes())?;

    if !output.stderr.is_empty() {
        let mut stderr = io::stderr();
        stderr.write_all(output.stderr.as_bytes())?;
        stderr.flush()?;
    }
    Ok(())
}

fn collect_env() -> BTreeMap<String, String> {
    std::env::vars().collect()
}
