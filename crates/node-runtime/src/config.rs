//! # Node Configuration
//!
//! Runtime parameters read from the environment, with development
//! defaults. Consensus parameters come from the selected [`Network`].

use qc_18_message_transactions::{MessageTxnConfig, Network};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Data directory variable
pub const ENV_DATA_DIR: &str = "MSG_DATA_DIR";
/// Network variable (`main` or `regtest`)
pub const ENV_NETWORK: &str = "MSG_NETWORK";
/// Mining worker count variable
pub const ENV_MINING_THREADS: &str = "MSG_MINING_THREADS";
/// Block interval variable, in seconds
pub const ENV_BLOCK_INTERVAL: &str = "MSG_BLOCK_INTERVAL_SECS";
/// Key store passphrase variable
pub const ENV_KEY_PASSPHRASE: &str = "MSG_KEY_PASSPHRASE";

/// Complete node configuration.
#[derive(Clone)]
pub struct NodeConfig {
    /// Chain store and key store location.
    pub data_dir: PathBuf,
    /// Consensus parameter set.
    pub network: Network,
    /// Mining worker threads (0 = one per CPU).
    pub mining_threads: usize,
    /// Time between generated blocks.
    pub block_interval: Duration,
    /// Unlocks an encrypted key store; a new store is created encrypted.
    pub key_passphrase: Option<String>,
}

impl fmt::Debug for NodeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeConfig")
            .field("data_dir", &self.data_dir)
            .field("network", &self.network)
            .field("mining_threads", &self.mining_threads)
            .field("block_interval", &self.block_interval)
            .field("key_passphrase", &self.key_passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./msgnode-data"),
            network: Network::Regtest,
            mining_threads: 0,
            block_interval: Duration::from_secs(10),
            key_passphrase: None,
        }
    }
}

impl NodeConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; unset keys keep their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(ENV_DATA_DIR) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(network) = lookup(ENV_NETWORK) {
            config.network = network
                .parse()
                .map_err(|_| ConfigError::Invalid(ENV_NETWORK, network))?;
        }
        if let Some(threads) = lookup(ENV_MINING_THREADS) {
            config.mining_threads = threads
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(ENV_MINING_THREADS, threads))?;
        }
        if let Some(secs) = lookup(ENV_BLOCK_INTERVAL) {
            let parsed: u64 = secs
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(ENV_BLOCK_INTERVAL, secs.clone()))?;
            if parsed == 0 {
                return Err(ConfigError::Invalid(ENV_BLOCK_INTERVAL, secs));
            }
            config.block_interval = Duration::from_secs(parsed);
        }
        if let Some(passphrase) = lookup(ENV_KEY_PASSPHRASE) {
            if passphrase.is_empty() {
                return Err(ConfigError::Invalid(ENV_KEY_PASSPHRASE, passphrase));
            }
            config.key_passphrase = Some(passphrase);
        }
        Ok(config)
    }

    /// Message transaction parameters for this node.
    pub fn message_config(&self) -> MessageTxnConfig {
        MessageTxnConfig {
            mining_threads: self.mining_threads,
            ..MessageTxnConfig::for_network(self.network)
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Variable set to a value that cannot be used.
    #[error("invalid value for {0}: '{1}'")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = NodeConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.network, Network::Regtest);
        assert_eq!(config.block_interval, Duration::from_secs(10));
        assert_eq!(config.message_config().base_target, MessageTxnConfig::regtest().base_target);
    }

    #[test]
    fn test_all_variables() {
        let config = NodeConfig::from_lookup(lookup(&[
            (ENV_DATA_DIR, "/tmp/node"),
            (ENV_NETWORK, "main"),
            (ENV_MINING_THREADS, "3"),
            (ENV_BLOCK_INTERVAL, "60"),
        ]))
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/node"));
        assert_eq!(config.network, Network::Main);
        assert_eq!(config.block_interval, Duration::from_secs(60));

        let msg = config.message_config();
        assert_eq!(msg.mining_threads, 3);
        assert_eq!(msg.base_target, MessageTxnConfig::default().base_target);
    }

    #[test]
    fn test_invalid_values() {
        assert_eq!(
            NodeConfig::from_lookup(lookup(&[(ENV_NETWORK, "testnet")])).unwrap_err(),
            ConfigError::Invalid(ENV_NETWORK, "testnet".into())
        );
        assert!(NodeConfig::from_lookup(lookup(&[(ENV_MINING_THREADS, "many")])).is_err());
        assert!(NodeConfig::from_lookup(lookup(&[(ENV_BLOCK_INTERVAL, "0")])).is_err());
        assert!(NodeConfig::from_lookup(lookup(&[(ENV_KEY_PASSPHRASE, "")])).is_err());
    }

    #[test]
    fn test_error_message_names_variable() {
        let err = NodeConfig::from_lookup(lookup(&[(ENV_MINING_THREADS, "many")])).unwrap_err();
        assert_eq!(err.to_string(), "invalid value for MSG_MINING_THREADS: 'many'");
    }

    #[test]
    fn test_passphrase_read_but_not_printed() {
        let config = NodeConfig::from_lookup(lookup(&[(ENV_KEY_PASSPHRASE, "s3cret")])).unwrap();
        assert_eq!(config.key_passphrase.as_deref(), Some("s3cret"));
        let printed = format!("{config:?}");
        assert!(!printed.contains("s3cret"));
        assert!(printed.contains("<redacted>"));
    }
}
