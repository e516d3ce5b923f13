//! Configuration types for message transactions

use crate::error::{MsgTxnError, Result};
use primitive_types::U256;
use serde::Deserialize;

/// Parameter set selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production parameters
    #[default]
    Main,
    /// Local testing with a very easy base target
    Regtest,
}

impl std::str::FromStr for Network {
    type Err = MsgTxnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "main" | "mainnet" => Ok(Self::Main),
            "regtest" => Ok(Self::Regtest),
            other => Err(MsgTxnError::InvalidConfig(format!(
                "unknown network '{other}'"
            ))),
        }
    }
}

/// Consensus and node parameters for message transactions
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MessageTxnConfig {
    /// Reference block reward `S` in base units
    pub block_reward: u64,

    /// Base target `T0`; the target for cost `C` is `T0 * floor(S / C)`
    pub base_target: U256,

    /// Cost units charged per serialized byte
    pub fee_per_byte: u64,

    /// Replay window `W` in blocks
    pub accepted_depth: u64,

    /// Maximum message transactions held for relay
    pub pool_capacity: usize,

    /// Mining worker threads (0 = one per CPU)
    pub mining_threads: usize,
}

impl Default for MessageTxnConfig {
    fn default() -> Self {
        Self {
            block_reward: crate::DEFAULT_BLOCK_REWARD,
            base_target: U256::from(0xffffu64) << 200,
            fee_per_byte: crate::FEE_PER_BYTE,
            accepted_depth: crate::MSG_TXN_ACCEPTED_DEPTH,
            pool_capacity: crate::DEFAULT_POOL_CAPACITY,
            mining_threads: 0,
        }
    }
}

impl MessageTxnConfig {
    /// Regression-test parameters: solutions take a few hundred hashes.
    pub fn regtest() -> Self {
        Self {
            base_target: U256::one() << 228,
            ..Self::default()
        }
    }

    /// Parameters for a network.
    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Main => Self::default(),
            Network::Regtest => Self::regtest(),
        }
    }

    /// Worker count with `0` resolved to the CPU count.
    pub fn effective_mining_threads(&self) -> usize {
        if self.mining_threads == 0 {
            num_cpus::get().max(1)
        } else {
            self.mining_threads
        }
    }

    /// Reject parameter combinations the subsystem cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.accepted_depth == 0 {
            return Err(MsgTxnError::InvalidConfig(
                "accepted_depth must be at least 1".into(),
            ));
        }
        if self.fee_per_byte == 0 {
            return Err(MsgTxnError::InvalidConfig(
                "fee_per_byte must be positive".into(),
            ));
        }
        if self.block_reward == 0 || self.base_target.is_zero() {
            return Err(MsgTxnError::InvalidConfig(
                "block_reward and base_target must be positive".into(),
            ));
        }
        if self.pool_capacity == 0 {
            return Err(MsgTxnError::InvalidConfig(
                "pool_capacity must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(MessageTxnConfig::default().validate().is_ok());
        assert!(MessageTxnConfig::regtest().validate().is_ok());
        assert!(MessageTxnConfig::regtest().base_target > MessageTxnConfig::default().base_target);
    }

    #[test]
    fn test_zero_depth_rejected() {
        let config = MessageTxnConfig {
            accepted_depth: 0,
            ..MessageTxnConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(MsgTxnError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: MessageTxnConfig =
            serde_json::from_str(r#"{ "accepted_depth": 3, "mining_threads": 2 }"#).unwrap();
        assert_eq!(config.accepted_depth, 3);
        assert_eq!(config.effective_mining_threads(), 2);
        assert_eq!(config.fee_per_byte, crate::FEE_PER_BYTE);
    }

    #[test]
    fn test_network_parse() {
        assert_eq!("regtest".parse::<Network>().unwrap(), Network::Regtest);
        assert_eq!("Main".parse::<Network>().unwrap(), Network::Main);
        assert!("testnet".parse::<Network>().is_err());
    }
}
