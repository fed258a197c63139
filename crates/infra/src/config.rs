//! Configuration loading and representation.
//!
//! Everything comes from environment variables. Absent variables fall back to
//! development defaults; present but malformed values are an error.
//!
//! `TRANSFORMER_SECRET` only has a development default in loopback mode. Once
//! platform credentials are configured the webhook is reachable from outside,
//! so the secret becomes mandatory.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::publisher::HttpPublisherConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_WEBHOOK_BASE_URL: &str = "https://webhook.api.flowcore.io";
pub const DEFAULT_DATA_CORE: &str = "todo-app";
pub const DEV_TRANSFORMER_SECRET: &str = "dev-transformer-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("{present} is set but {missing} is not")]
    Incomplete {
        present: &'static str,
        missing: &'static str,
    },
}

/// Credentials and addressing for the external event platform.
#[derive(Clone)]
pub struct FlowcoreConfig {
    pub tenant: String,
    pub api_key: String,
    pub base_url: String,
    pub data_core: String,
}

impl core::fmt::Debug for FlowcoreConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FlowcoreConfig")
            .field("tenant", &self.tenant)
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("data_core", &self.data_core)
            .finish()
    }
}

impl FlowcoreConfig {
    pub fn publisher_config(&self, timeout: Duration) -> HttpPublisherConfig {
        HttpPublisherConfig {
            base_url: self.base_url.clone(),
            tenant: self.tenant.clone(),
            data_core: self.data_core.clone(),
            api_key: self.api_key.clone(),
            timeout,
        }
    }
}

#[derive(Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub transformer_secret: String,
    /// Postgres read model when set (`DATABASE_URL`, or `POSTGRES_URL`), in-memory otherwise.
    pub database_url: Option<String>,
    /// HTTP publisher when set, loopback publisher + delivery worker otherwise.
    pub flowcore: Option<FlowcoreConfig>,
    pub publish_timeout: Duration,
    pub store_timeout: Duration,
    /// Upper bound on read-after-write waits in the HTTP layer.
    pub read_wait: Duration,
}

impl core::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("bind_addr", &self.bind_addr)
            .field("transformer_secret", &"[REDACTED]")
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("flowcore", &self.flowcore)
            .field("publish_timeout", &self.publish_timeout)
            .field("store_timeout", &self.store_timeout)
            .field("read_wait", &self.read_wait)
            .finish()
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bind_addr = get("TODOFLOW_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                name: "TODOFLOW_BIND_ADDR",
                reason: e.to_string(),
            })?;

        let flowcore = match (get("FLOWCORE_TENANT"), get("FLOWCORE_API_KEY")) {
            (Some(tenant), Some(api_key)) => Some(FlowcoreConfig {
                tenant,
                api_key,
                base_url: get("FLOWCORE_WEBHOOK_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_WEBHOOK_BASE_URL.to_string()),
                data_core: get("FLOWCORE_DATA_CORE").unwrap_or_else(|| DEFAULT_DATA_CORE.to_string()),
            }),
            (Some(_), None) => {
                return Err(ConfigError::Incomplete {
                    present: "FLOWCORE_TENANT",
                    missing: "FLOWCORE_API_KEY",
                });
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete {
                    present: "FLOWCORE_API_KEY",
                    missing: "FLOWCORE_TENANT",
                });
            }
            (None, None) => None,
        };

        let transformer_secret = match (get("TRANSFORMER_SECRET"), &flowcore) {
            (Some(secret), _) => secret,
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete {
                    present: "FLOWCORE_TENANT",
                    missing: "TRANSFORMER_SECRET",
                });
            }
            (None, None) => {
                warn!("TRANSFORMER_SECRET not set, using development default (loopback only)");
                DEV_TRANSFORMER_SECRET.to_string()
            }
        };

        Ok(Self {
            bind_addr,
            transformer_secret,
            database_url: get("DATABASE_URL").or_else(|| get("POSTGRES_URL")),
            flowcore,
            publish_timeout: millis(&get, "PUBLISH_TIMEOUT_MS", 5_000)?,
            store_timeout: millis(&get, "STORE_TIMEOUT_MS", 5_000)?,
            read_wait: millis(&get, "READ_WAIT_MS", 1_000)?,
        })
    }
}

fn millis(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    match get(name) {
        None => Ok(Duration::from_millis(default)),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            }),
    }
}
