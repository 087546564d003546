use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MinerError, Result};

pub const DEFAULT_INSTANCE: &str = "https://crypto.monkeyflip.io";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Credentials sent along with authenticated calls only.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub id: String,
    pub key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("id", &self.id)
            .field("key", &"***")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct MinerConfig {
    /// Base URL of the verification service.
    pub instance: String,
    pub auth: Option<Credentials>,
    /// `development`, `test` or `production`; picks the default log level.
    pub env: String,
    /// Per-request transport timeout.
    pub timeout: Duration,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            instance: DEFAULT_INSTANCE.to_string(),
            auth: None,
            env: "development".to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl MinerConfig {
    /// Read `MINER_*` variables (call `dotenvy::dotenv()` first to pick up `.env`).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let timeout = match lookup("MINER_TIMEOUT_MS") {
            Some(v) => Duration::from_millis(v.trim().parse().map_err(|_| {
                MinerError::Config(format!("MINER_TIMEOUT_MS is not a number: {v:?}"))
            })?),
            None => defaults.timeout,
        };

        let auth = match (lookup("MINER_AUTH_ID"), lookup("MINER_AUTH_KEY")) {
            (Some(id), Some(key)) => Some(Credentials { id, key }),
            _ => None,
        };

        Ok(Self {
            instance: lookup("MINER_INSTANCE").unwrap_or(defaults.instance),
            auth,
            env: lookup("MINER_ENV").unwrap_or(defaults.env),
            timeout,
        })
    }

    /// Log filter used when `RUST_LOG` is unset.
    pub fn default_log_level(&self) -> &'static str {
        match self.env.as_str() {
            "test" => "error",
            "production" => "info",
            _ => "debug",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let cfg = MinerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(cfg.instance, DEFAULT_INSTANCE);
        assert!(cfg.auth.is_none());
        assert_eq!(cfg.timeout, Duration::from_millis(DEFAULT_TIMEOUT_MS));
        assert_eq!(cfg.default_log_level(), "debug");
    }

    #[test]
    fn reads_credentials_and_overrides() {
        let cfg = MinerConfig::from_lookup(lookup_from(&[
            ("MINER_INSTANCE", "http://localhost:8080"),
            ("MINER_AUTH_ID", "me"),
            ("MINER_AUTH_KEY", "k"),
            ("MINER_ENV", "production"),
            ("MINER_TIMEOUT_MS", "1500"),
        ]))
        .unwrap();
        assert_eq!(cfg.instance, "http://localhost:8080");
        assert_eq!(cfg.auth.as_ref().map(|a| a.id.as_str()), Some("me"));
        assert_eq!(cfg.timeout, Duration::from_millis(1500));
        assert_eq!(cfg.default_log_level(), "info");
    }

    #[test]
    fn half_configured_credentials_are_ignored() {
        let cfg = MinerConfig::from_lookup(lookup_from(&[("MINER_AUTH_ID", "me")])).unwrap();
        assert!(cfg.auth.is_none());
    }

    #[test]
    fn bad_timeout_is_a_config_error() {
        let err = MinerConfig::from_lookup(lookup_from(&[("MINER_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, MinerError::Config(_)));
    }

    #[test]
    fn debug_hides_key() {
        let c = Credentials {
            id: "me".into(),
            key: "secret".into(),
        };
        assert!(!format!("{c:?}").contains("secret"));
    }
}
