//! Redis-backed store.
//!
//! One multiplexed connection is opened lazily and shared by all callers.
//! After a connection failure, new attempts wait for `reconnect_backoff` so
//! an unreachable server costs one failed connect per backoff window rather
//! than one per request.

use super::FallibleStore;
use docrag_domain::{CacheKey, CacheLayer, CacheStatistics, StoreBackend};
use docrag_ports::BoxFuture;
use docrag_shared::{ErrorEnvelope, Result, SecretString, redact_url_credentials};
use redis::aio::MultiplexedConnection;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

const SCAN_COUNT: u32 = 100;
const DELETE_CHUNK: usize = 100;

/// Settings for [`RedisStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisStoreConfig {
    /// Connection URL; may carry credentials.
    pub url: SecretString,
    /// Prefix prepended to every key (`"<ns>:"`); empty for none.
    pub namespace: Box<str>,
    /// Minimum delay between reconnect attempts.
    pub reconnect_backoff: Duration,
    /// Upper bound for opening the connection. Keep it below the caller's
    /// operation timeout so a hung connect is recorded as a failure.
    pub connect_timeout: Duration,
}

impl RedisStoreConfig {
    /// Config for `url` with no namespace, a one second backoff and a one
    /// second connect timeout.
    #[must_use]
    pub fn new(url: impl Into<Box<str>>) -> Self {
        Self {
            url: SecretString::new(url),
            namespace: "".into(),
            reconnect_backoff: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(1),
        }
    }
}

enum ConnectionState {
    Idle,
    Connected(MultiplexedConnection),
    Failed { at: Instant, message: String },
}

/// Store backed by a Redis server.
pub struct RedisStore {
    client: redis::Client,
    display_url: String,
    namespace: Box<str>,
    reconnect_backoff: Duration,
    connect_timeout: Duration,
    state: tokio::sync::Mutex<ConnectionState>,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RedisStore")
            .field("url", &self.display_url)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Build a store. No connection is opened until the first call.
    pub fn new(config: RedisStoreConfig) -> Result<Self> {
        let display_url = redact_url_credentials(config.url.expose());
        let client = redis::Client::open(config.url.expose()).map_err(|error| {
            ErrorEnvelope::backend_unavailable(format!("invalid redis url {display_url}: {error}"))
        })?;
        let namespace = if config.namespace.is_empty() || config.namespace.ends_with(':') {
            config.namespace
        } else {
            format!("{}:", config.namespace).into_boxed_str()
        };
        Ok(Self {
            client,
            display_url,
            namespace,
            reconnect_backoff: config.reconnect_backoff,
            connect_timeout: config.connect_timeout,
            state: tokio::sync::Mutex::new(ConnectionState::Idle),
        })
    }

    /// Server address with credentials masked.
    #[must_use]
    pub fn display_url(&self) -> &str {
        &self.display_url
    }

    fn full_key(&self, key: &CacheKey) -> String {
        format!("{}{}", self.namespace, key.as_str())
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        let mut state = self.state.lock().await;
        match &*state {
            ConnectionState::Connected(connection) => return Ok(connection.clone()),
            ConnectionState::Failed { at, message } if at.elapsed() < self.reconnect_backoff => {
                return Err(ErrorEnvelope::backend_unavailable(format!(
                    "redis at {} unavailable: {message}",
                    self.display_url
                )));
            },
            _ => {},
        }

        let connected = tokio::time::timeout(
            self.connect_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await;
        let message = match connected {
            Ok(Ok(connection)) => {
                *state = ConnectionState::Connected(connection.clone());
                return Ok(connection);
            },
            Ok(Err(error)) => error.to_string(),
            Err(_) => format!("connect timed out after {}ms", self.connect_timeout.as_millis()),
        };
        *state = ConnectionState::Failed {
            at: Instant::now(),
            message: message.clone(),
        };
        Err(ErrorEnvelope::backend_unavailable(format!(
            "redis at {} unavailable: {message}",
            self.display_url
        ))
        .with_metadata("operation", "connect"))
    }

    async fn command_failed(&self, operation: &'static str, error: &redis::RedisError) -> ErrorEnvelope {
        if error.is_io_error() || error.is_connection_dropped() || error.is_connection_refusal() {
            let mut state = self.state.lock().await;
            *state = ConnectionState::Failed {
                at: Instant::now(),
                message: error.to_string(),
            };
        }
        ErrorEnvelope::backend_unavailable(format!("redis {operation} failed: {error}"))
            .with_metadata("operation", operation)
    }

    async fn scan_keys(&self, connection: &mut MultiplexedConnection, pattern: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let scanned: redis::RedisResult<(u64, Vec<String>)> = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(connection)
                .await;
            let (next, batch) = match scanned {
                Ok(page) => page,
                Err(error) => return Err(self.command_failed("scan", &error).await),
            };
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(keys)
    }
}

impl FallibleStore for RedisStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Redis
    }

    fn get(&self, key: CacheKey) -> BoxFuture<'_, Result<Option<Vec<u8>>>> {
        Box::pin(async move {
            let mut connection = self.connection().await?;
            let value: redis::RedisResult<Option<Vec<u8>>> = redis::cmd("GET")
                .arg(self.full_key(&key))
                .query_async(&mut connection)
                .await;
            match value {
                Ok(value) => Ok(value),
                Err(error) => Err(self.command_failed("get", &error).await),
            }
        })
    }

    fn set(&self, key: CacheKey, value: Vec<u8>, ttl: Duration) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let ttl_secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
            let mut connection = self.connection().await?;
            let stored: redis::RedisResult<()> = redis::cmd("SET")
                .arg(self.full_key(&key))
                .arg(value)
                .arg("EX")
                .arg(ttl_secs.max(1))
                .query_async(&mut connection)
                .await;
            match stored {
                Ok(()) => Ok(()),
                Err(error) => Err(self.command_failed("set", &error).await),
            }
        })
    }

    fn delete(&self, key: CacheKey) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            let mut connection = self.connection().await?;
            let removed: redis::RedisResult<u64> = redis::cmd("DEL")
                .arg(self.full_key(&key))
                .query_async(&mut connection)
                .await;
            match removed {
                Ok(count) => Ok(count > 0),
                Err(error) => Err(self.command_failed("delete", &error).await),
            }
        })
    }

    fn clear_layers(&self, layers: Vec<CacheLayer>) -> BoxFuture<'_, Result<u64>> {
        Box::pin(async move {
            let mut connection = self.connection().await?;
            let mut removed = 0u64;
            for layer in layers {
                let pattern = format!("{}{}", self.namespace, layer.key_pattern());
                let keys = self.scan_keys(&mut connection, &pattern).await?;
                for chunk in keys.chunks(DELETE_CHUNK) {
                    let deleted: redis::RedisResult<u64> = redis::cmd("DEL")
                        .arg(chunk)
                        .query_async(&mut connection)
                        .await;
                    match deleted {
                        Ok(count) => removed += count,
                        Err(error) => return Err(self.command_failed("clear", &error).await),
                    }
                }
            }
            Ok(removed)
        })
    }

    fn stats(&self) -> BoxFuture<'_, Result<CacheStatistics>> {
        Box::pin(async move {
            let mut connection = self.connection().await?;
            let info: redis::RedisResult<String> =
                redis::cmd("INFO").query_async(&mut connection).await;
            match info {
                Ok(info) => Ok(parse_redis_info(&info)),
                Err(error) => Err(self.command_failed("stats", &error).await),
            }
        })
    }

    fn shutdown(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            *state = ConnectionState::Idle;
        })
    }
}

/// Build a statistics snapshot from the text of a Redis `INFO` reply.
#[must_use]
pub fn parse_redis_info(info: &str) -> CacheStatistics {
    let fields: BTreeMap<&str, &str> = info
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.trim().split_once(':'))
        .collect();
    let number = |name: &str| fields.get(name).and_then(|value| value.parse::<u64>().ok());

    let mut stats = CacheStatistics::connected(
        StoreBackend::Redis,
        number("keyspace_hits").unwrap_or(0),
        number("keyspace_misses").unwrap_or(0),
    );
    if let Some(used) = fields.get("used_memory_human") {
        stats = stats.with_used_memory(*used);
    }
    if let Some(clients) = number("connected_clients") {
        stats = stats.with_connected_clients(clients);
    }
    if let Some(commands) = number("total_commands_processed") {
        stats = stats.with_total_commands(commands);
    }
    stats
}
