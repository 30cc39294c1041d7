use config::{Config, Environment, File};
use notify::{recommended_watcher, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::error;

use std::env;

use crate::error::PoolError;
use crate::pool::SelectorOptions;
use crate::utils::tracing::LogFormat;

#[derive(Debug, Deserialize)]
pub struct RawSettings {
    pub servers: Vec<String>,
    #[serde(default = "default_num_retries")]
    pub num_retries: u32,
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    #[serde(default = "default_true")]
    pub randomize: bool,
    #[serde(default = "default_true")]
    pub always_try_last: bool,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub nodelay: bool,
    /// Zero keeps failure records until they are cleared.
    #[serde(default)]
    pub failure_ttl_secs: u64,
    /// Zero connects once and exits.
    #[serde(default)]
    pub probe_interval_secs: u64,
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_num_retries() -> u32 {
    1
}

fn default_retry_interval_secs() -> u64 {
    60
}

fn default_max_consecutive_failures() -> u32 {
    1
}

fn default_connect_timeout_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// `host:port` entries; malformed ones are dropped by `EndpointRegistry::from_servers`.
    pub servers: Vec<String>,
    pub options: SelectorOptions,
    pub connect_timeout: Duration,
    pub nodelay: bool,
    pub probe_interval: Option<Duration>,
    pub log_format: LogFormat,
}

impl Settings {
    /// Loads `$RUN_MODE` (default `development`), then `config`, then
    /// `FAILOVER__*` environment overrides. `FAILOVER_CONFIG` names an
    /// explicit file instead of the first two.
    pub fn new() -> Result<Self, PoolError> {
        if let Ok(path) = env::var("FAILOVER_CONFIG") {
            return Self::from_file(path);
        }

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let builder = Config::builder()
            .add_source(File::with_name(&run_mode).required(false))
            .add_source(File::with_name("config").required(run_mode == "production"))
            .add_source(
                Environment::with_prefix("FAILOVER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("servers"),
            )
            .build()?;

        Self::from_raw(builder.try_deserialize()?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PoolError> {
        let builder = Config::builder()
            .add_source(File::from(path.as_ref()).required(true))
            .build()?;

        Self::from_raw(builder.try_deserialize()?)
    }

    pub fn from_raw(raw: RawSettings) -> Result<Self, PoolError> {
        if raw.num_retries == 0 {
            return Err(PoolError::Configuration(
                "num_retries must be at least 1".into(),
            ));
        }
        if raw.max_consecutive_failures == 0 {
            return Err(PoolError::Configuration(
                "max_consecutive_failures must be at least 1".into(),
            ));
        }

        let options = SelectorOptions {
            num_retries: raw.num_retries,
            retry_interval: Duration::from_secs(raw.retry_interval_secs),
            max_consecutive_failures: raw.max_consecutive_failures,
            randomize: raw.randomize,
            always_try_last: raw.always_try_last,
            failure_ttl: (raw.failure_ttl_secs > 0)
                .then(|| Duration::from_secs(raw.failure_ttl_secs)),
        };

        Ok(Self {
            servers: raw.servers,
            options,
            connect_timeout: Duration::from_millis(raw.connect_timeout_ms),
            nodelay: raw.nodelay,
            probe_interval: (raw.probe_interval_secs > 0)
                .then(|| Duration::from_secs(raw.probe_interval_secs)),
            log_format: raw.log_format,
        })
    }

    /// Reloads `path` whenever it changes. Reloads that fail validation are
    /// logged and skipped. Watching stops when the returned watcher is dropped.
    pub fn watch_config(
        path: impl Into<PathBuf>,
    ) -> Result<(RecommendedWatcher, UnboundedReceiver<Settings>), PoolError> {
        let path = path.into();
        let (tx, rx) = unbounded_channel();
        let config_path = path.clone();

        let mut watcher: RecommendedWatcher =
            recommended_watcher(move |res: notify::Result<notify::Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    match Settings::from_file(&config_path) {
                        Ok(new_settings) => {
                            if let Err(e) = tx.send(new_settings) {
                                error!("Error sending new config: {:?}", e);
                            }
                        }
                        Err(e) => error!("Error reloading config: {}", e),
                    }
                }
                Ok(_) => {}
                Err(e) => error!("Watch error: {:?}", e),
            })
            .map_err(|e| PoolError::Configuration(e.to_string()))?;

        watcher
            .watch(&path, RecursiveMode::NonRecursive)
            .map_err(|e| PoolError::Configuration(e.to_string()))?;

        Ok((watcher, rx))
    }
}
