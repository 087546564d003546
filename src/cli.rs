use clap::{Parser, Subcommand};

use crate::config::{Credentials, MinerConfig};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Speculative block miner for a remote verification service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Base URL of the verification service (overrides MINER_INSTANCE).
    #[arg(long, global = true)]
    pub instance: Option<String>,

    /// Credential id sent with `mine` requests (overrides MINER_AUTH_ID).
    #[arg(long, global = true)]
    pub auth_id: Option<String>,

    /// Credential secret sent with `mine` requests (overrides MINER_AUTH_KEY).
    #[arg(long, global = true)]
    pub auth_key: Option<String>,

    /// Per-request timeout in milliseconds (overrides MINER_TIMEOUT_MS).
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Print the chain metadata reported by the service.
    Info,

    /// Rebuild and verify the genesis block, then exit.
    Init,

    /// Mine until the requested number of blocks has been accepted.
    Mine {
        #[arg(long, short, default_value_t = 1)]
        count: u32,
    },

    /// Run a local verification service to mine against.
    ServeMock {
        #[arg(long, env = "HOST", default_value = "127.0.0.1")]
        host: String,
        #[arg(long, env = "PORT", default_value_t = 8080)]
        port: u16,
        /// Difficulty reported by `info`.
        #[arg(long, default_value_t = 2)]
        difficulty: u32,
        /// Leading zeros a claimed hash must have.
        #[arg(long, default_value_t = 0)]
        min_leading_zeros: u32,
        /// Number of claimable blocks.
        #[arg(long, default_value_t = 100)]
        capacity: u64,
    },
}

impl Cli {
    /// Layer command-line overrides on top of the environment config.
    pub fn apply(&self, mut cfg: MinerConfig) -> MinerConfig {
        if let Some(instance) = &self.instance {
            cfg.instance = instance.clone();
        }
        if let Some(ms) = self.timeout_ms {
            cfg.timeout = std::time::Duration::from_millis(ms);
        }
        match (&self.auth_id, &self.auth_key) {
            (Some(id), Some(key)) => {
                cfg.auth = Some(Credentials {
                    id: id.clone(),
                    key: key.clone(),
                })
            }
            (Some(id), None) => {
                if let Some(auth) = cfg.auth.as_mut() {
                    auth.id = id.clone();
                }
            }
            (None, Some(key)) => {
                if let Some(auth) = cfg.auth.as_mut() {
                    auth.key = key.clone();
                }
            }
            (None, None) => {}
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_env_config() {
        let cli = Cli::parse_from([
            "spec_miner",
            "mine",
            "--count",
            "3",
            "--instance",
            "http://localhost:8080",
            "--auth-id",
            "me",
            "--auth-key",
            "k",
        ]);
        assert!(matches!(cli.command, Commands::Mine { count: 3 }));

        let cfg = cli.apply(MinerConfig::default());
        assert_eq!(cfg.instance, "http://localhost:8080");
        assert_eq!(cfg.auth.map(|a| a.id), Some("me".to_string()));
    }

    #[test]
    fn lone_key_flag_needs_existing_credentials() {
        let cli = Cli::parse_from(["spec_miner", "init", "--auth-key", "k"]);
        assert!(cli.apply(MinerConfig::default()).auth.is_none());
    }
}
