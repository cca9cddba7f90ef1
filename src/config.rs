//! Runtime configuration
//!
//! The chat bind address comes from the first command line argument; the
//! rest is read from environment variables:
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `CHAT_STATUS_ADDR` | status endpoint address, empty disables it | `127.0.0.1:8080` |
//! | `CHAT_TYPING_DELAY_MS` | pause between typing notice and message | `500` |
//! | `CHAT_TLS_CERT` / `CHAT_TLS_KEY` | PEM files, both or neither | unset (plain TCP) |
//! | `OPENAI_API_KEY` | enables `/gpt` | unset |
//! | `CHAT_COMPLETION_MODEL` | model name for `/gpt` | `gpt-3.5-turbo` |

use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;

/// Default chat address
pub const DEFAULT_ADDR: &str = "127.0.0.1:9000";

/// Default status endpoint address
pub const DEFAULT_STATUS_ADDR: &str = "127.0.0.1:8080";

/// Default pacing delay before a chat message is relayed
pub const DEFAULT_TYPING_DELAY: Duration = Duration::from_millis(500);

pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-3.5-turbo";

/// Certificate and key locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Everything the binary needs to start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub status_addr: Option<String>,
    pub typing_delay: Duration,
    pub tls: Option<TlsPaths>,
    pub openai_api_key: Option<String>,
    pub completion_model: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_ADDR.to_string(),
            status_addr: Some(DEFAULT_STATUS_ADDR.to_string()),
            typing_delay: DEFAULT_TYPING_DELAY,
            tls: None,
            openai_api_key: None,
            completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
        }
    }
}

impl ServerConfig {
    /// Read the process arguments and environment
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_sources(std::env::args().nth(1), |key| std::env::var(key).ok())
    }

    /// Build a config from an optional bind address and a variable lookup
    pub fn from_sources<F>(bind_addr: Option<String>, var: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let status_addr = match var("CHAT_STATUS_ADDR") {
            Some(addr) if addr.trim().is_empty() => None,
            Some(addr) => Some(addr),
            None => defaults.status_addr,
        };

        let typing_delay = match var("CHAT_TYPING_DELAY_MS") {
            Some(ms) => ms
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| {
                    AppError::Config(format!("CHAT_TYPING_DELAY_MS '{}': {}", ms, e))
                })?,
            None => defaults.typing_delay,
        };

        let tls = match (var("CHAT_TLS_CERT"), var("CHAT_TLS_KEY")) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            }),
            (None, None) => None,
            _ => {
                return Err(AppError::Config(
                    "CHAT_TLS_CERT and CHAT_TLS_KEY must be set together".to_string(),
                ))
            }
        };

        Ok(Self {
            bind_addr: bind_addr.unwrap_or(defaults.bind_addr),
            status_addr,
            typing_delay,
            tls,
            openai_api_key: var("OPENAI_API_KEY").filter(|key| !key.is_empty()),
            completion_model: var("CHAT_COMPLETION_MODEL").unwrap_or(defaults.completion_model),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_sources(None, lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.typing_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_sources(
            Some("0.0.0.0:7000".to_string()),
            lookup(&[
                ("CHAT_STATUS_ADDR", ""),
                ("CHAT_TYPING_DELAY_MS", "25"),
                ("CHAT_TLS_CERT", "server.crt"),
                ("CHAT_TLS_KEY", "server.key"),
                ("OPENAI_API_KEY", "sk-test"),
            ]),
        )
        .unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:7000");
        assert!(config.status_addr.is_none());
        assert_eq!(config.typing_delay, Duration::from_millis(25));
        assert_eq!(
            config.tls,
            Some(TlsPaths {
                cert: PathBuf::from("server.crt"),
                key: PathBuf::from("server.key"),
            })
        );
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_bad_delay_is_rejected() {
        let result = ServerConfig::from_sources(None, lookup(&[("CHAT_TYPING_DELAY_MS", "soon")]));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_half_tls_config_is_rejected() {
        let result = ServerConfig::from_sources(None, lookup(&[("CHAT_TLS_CERT", "server.crt")]));
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
