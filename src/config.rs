// Layered settings.
//
// Precedence: defaults < config file < environment < CLI. The `.env` file
// is loaded into the environment by `main` before any of this runs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::api::DEFAULT_TIMEOUT;
use crate::scheduler::{Backoff, BackoffKind, JoinPolicy, RetryPolicy, TimeoutAction};

const APP_DIR: &str = "alist-upload";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{key}={value:?} is not a valid number")]
    InvalidEnv { key: &'static str, value: String },

    #[error("no host configured; set ALIST_HOST, `host` in the config file, or pass --host")]
    MissingHost,

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
}

/// One source of settings. Every field is optional so layers can be
/// stacked; the later layer wins field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Layer {
    pub host: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub concurrency: Option<usize>,
    pub request_timeout_secs: Option<u64>,
    pub join_timeout_secs: Option<u64>,
    pub on_timeout: Option<TimeoutAction>,
    pub max_retries: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
    pub retry_backoff: Option<BackoffKind>,
}

impl Layer {
    /// Overlays `over` on top of `self`.
    pub fn merge(self, over: Layer) -> Layer {
        Layer {
            host: over.host.or(self.host),
            username: over.username.or(self.username),
            password: over.password.or(self.password),
            concurrency: over.concurrency.or(self.concurrency),
            request_timeout_secs: over.request_timeout_secs.or(self.request_timeout_secs),
            join_timeout_secs: over.join_timeout_secs.or(self.join_timeout_secs),
            on_timeout: over.on_timeout.or(self.on_timeout),
            max_retries: over.max_retries.or(self.max_retries),
            retry_backoff_ms: over.retry_backoff_ms.or(self.retry_backoff_ms),
            retry_backoff: over.retry_backoff.or(self.retry_backoff),
        }
    }

    pub fn from_file(path: &Path) -> Result<Layer, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads `ALIST_*` variables through `lookup`. Empty values are ignored.
    pub fn from_env_with<F>(lookup: F) -> Result<Layer, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Ok(Layer {
            host: get("ALIST_HOST"),
            username: get("ALIST_USERNAME"),
            password: get("ALIST_PASSWORD"),
            concurrency: parse_env(&get, "ALIST_CONCURRENCY")?,
            request_timeout_secs: parse_env(&get, "ALIST_REQUEST_TIMEOUT")?,
            join_timeout_secs: parse_env(&get, "ALIST_JOIN_TIMEOUT")?,
            ..Layer::default()
        })
    }

    pub fn from_env() -> Result<Layer, ConfigError> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }
}

fn parse_env<T, G>(get: &G, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { key, value }),
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    /// Prompted for when absent.
    pub username: Option<String>,
    /// Prompted for when absent.
    pub password: Option<String>,
    pub concurrency: usize,
    pub request_timeout: Duration,
    pub join: JoinPolicy,
    pub retry: RetryPolicy,
}

impl Settings {
    pub fn resolve(layer: Layer) -> Result<Settings, ConfigError> {
        let host = layer.host.ok_or(ConfigError::MissingHost)?;
        let concurrency = match layer.concurrency {
            Some(0) => return Err(ConfigError::ZeroConcurrency),
            Some(n) => n,
            None => num_cpus::get().max(1),
        };
        let backoff = match layer.retry_backoff_ms {
            None => Backoff::None,
            Some(ms) => Backoff::from_kind(
                layer.retry_backoff.unwrap_or_default(),
                Duration::from_millis(ms),
            ),
        };

        Ok(Settings {
            host,
            username: layer.username,
            password: layer.password,
            concurrency,
            request_timeout: layer
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
            join: JoinPolicy {
                timeout: layer.join_timeout_secs.map(Duration::from_secs),
                on_timeout: layer.on_timeout.unwrap_or_default(),
            },
            retry: RetryPolicy {
                max_retries: layer.max_retries,
                backoff,
            },
        })
    }
}

/// `<config dir>/alist-upload/config.toml`, e.g. `~/.config/...` on Linux.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}

/// Stacks file, environment and CLI layers and resolves them.
///
/// An explicitly named config file must exist; the default one is optional.
pub fn load(explicit: Option<&Path>, cli: Layer) -> Result<Settings, ConfigError> {
    let file = match explicit {
        Some(path) => Layer::from_file(path)?,
        None => match default_config_path() {
            Some(path) if path.is_file() => {
                tracing::debug!(path = %path.display(), "using config file");
                Layer::from_file(&path)?
            }
            _ => Layer::default(),
        },
    };
    Settings::resolve(file.merge(Layer::from_env()?).merge(cli))
}
