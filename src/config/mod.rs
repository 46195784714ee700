//! Gateway configuration.
//!
//! Every knob is a process-wide constant read once at startup from
//! `BIBGATE_*` environment variables. Nothing is reloadable.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `BIBGATE_LISTEN` | `0.0.0.0:2000` |
//! | `BIBGATE_UPSTREAM_URL` | `http://localhost:1234` |
//! | `BIBGATE_SESSION_ID` | `foo-123` |
//! | `BIBGATE_CACHE_ENABLED` | `true` |
//! | `BIBGATE_CACHE_ERRORS` | `true` |
//! | `BIBGATE_CACHE_MAX_ENTRIES` | unbounded |
//! | `BIBGATE_CACHE_TTL_SECS` | never expires |
//! | `BIBGATE_SINGLE_FLIGHT` | `false` |
//! | `BIBGATE_MISSING_PARAM_STATUS` | `400` |
//! | `BIBGATE_UPSTREAM_TIMEOUT_SECS` | no timeout |
//! | `BIBGATE_RESTART_ENABLED` | `false` |

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::http::StatusCode;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:2000";
pub const DEFAULT_UPSTREAM_URL: &str = "http://localhost:1234";
pub const DEFAULT_SESSION_ID: &str = "foo-123";

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: invalid upstream URL {value:?}: {source}")]
    InvalidUrl {
        var: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("{var}: expected {expected}, got {value:?}")]
    InvalidValue {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Cache behavior.
///
/// With neither `max_entries` nor `ttl` set the cache is unbounded and
/// entries live for the whole process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// When `false`, nothing is ever stored or looked up.
    pub enabled: bool,
    /// Whether upstream failures and DOI misses are stored like successes.
    pub cache_errors: bool,
    pub max_entries: Option<usize>,
    pub ttl: Option<Duration>,
}

impl CacheConfig {
    /// `true` when an eviction or expiry bound was configured.
    pub fn is_bounded(&self) -> bool {
        self.max_entries.is_some() || self.ttl.is_some()
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_errors: true,
            max_entries: None,
            ttl: None,
        }
    }
}

/// Everything the gateway needs at construction time.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen_addr: String,
    /// Base URL of the translation server; `/web` and `/export` are appended.
    pub upstream_base_url: Url,
    /// Session identifier sent with every `/web` call.
    pub session_id: String,
    pub cache: CacheConfig,
    /// Share one upstream computation between concurrent misses on a key.
    pub single_flight: bool,
    /// Status returned when the `url` parameter is missing. Always 4xx.
    pub missing_param_status: StatusCode,
    pub upstream_timeout: Option<Duration>,
    /// Expose `GET /restart`.
    pub restart_enabled: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_owned(),
            upstream_base_url: Url::parse(DEFAULT_UPSTREAM_URL)
                .unwrap_or_else(|e| unreachable!("default upstream URL is valid: {e}")),
            session_id: DEFAULT_SESSION_ID.to_owned(),
            cache: CacheConfig::default(),
            single_flight: false,
            missing_param_status: StatusCode::BAD_REQUEST,
            upstream_timeout: None,
            restart_enabled: false,
        }
    }
}

impl GatewayConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, falling back to defaults for
    /// unset or empty variables.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(addr) = get("BIBGATE_LISTEN") {
            config.listen_addr = addr;
        }
        if let Some(raw) = get("BIBGATE_UPSTREAM_URL") {
            config.upstream_base_url =
                Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl {
                    var: "BIBGATE_UPSTREAM_URL",
                    value: raw.clone(),
                    source,
                })?;
        }
        if let Some(session) = get("BIBGATE_SESSION_ID") {
            config.session_id = session;
        }

        if let Some(raw) = get("BIBGATE_CACHE_ENABLED") {
            config.cache.enabled = parse_bool("BIBGATE_CACHE_ENABLED", &raw)?;
        }
        if let Some(raw) = get("BIBGATE_CACHE_ERRORS") {
            config.cache.cache_errors = parse_bool("BIBGATE_CACHE_ERRORS", &raw)?;
        }
        if let Some(raw) = get("BIBGATE_CACHE_MAX_ENTRIES") {
            let max: usize = parse_num("BIBGATE_CACHE_MAX_ENTRIES", &raw)?;
            if max == 0 {
                return Err(ConfigError::InvalidValue {
                    var: "BIBGATE_CACHE_MAX_ENTRIES",
                    value: raw,
                    expected: "a positive integer",
                });
            }
            config.cache.max_entries = Some(max);
        }
        if let Some(raw) = get("BIBGATE_CACHE_TTL_SECS") {
            config.cache.ttl = Some(Duration::from_secs(parse_num(
                "BIBGATE_CACHE_TTL_SECS",
                &raw,
            )?));
        }

        if let Some(raw) = get("BIBGATE_SINGLE_FLIGHT") {
            config.single_flight = parse_bool("BIBGATE_SINGLE_FLIGHT", &raw)?;
        }
        if let Some(raw) = get("BIBGATE_MISSING_PARAM_STATUS") {
            let status = StatusCode::from_u16(parse_num("BIBGATE_MISSING_PARAM_STATUS", &raw)?);
            if !status.is_client_error() {
                return Err(ConfigError::InvalidValue {
                    var: "BIBGATE_MISSING_PARAM_STATUS",
                    value: raw,
                    expected: "a 4xx status code",
                });
            }
            config.missing_param_status = status;
        }
        if let Some(raw) = get("BIBGATE_UPSTREAM_TIMEOUT_SECS") {
            config.upstream_timeout = Some(Duration::from_secs(parse_num(
                "BIBGATE_UPSTREAM_TIMEOUT_SECS",
                &raw,
            )?));
        }
        if let Some(raw) = get("BIBGATE_RESTART_ENABLED") {
            config.restart_enabled = parse_bool("BIBGATE_RESTART_ENABLED", &raw)?;
        }

        Ok(config)
    }
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: raw.to_owned(),
            expected: "a boolean",
        }),
    }
}

fn parse_num<T: FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: raw.to_owned(),
        expected: "a non-negative integer",
    })
}
