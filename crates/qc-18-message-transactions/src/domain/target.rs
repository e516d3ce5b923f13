//! Work target derivation.
//!
//! A message costing `C` units must produce a pow hash at or below
//! `T0 * floor(S / C)`. Costlier messages get proportionally harder targets.

use crate::config::MessageTxnConfig;
use crate::error::{MsgTxnError, Result};
use primitive_types::{U256, U512};
use shared_types::{Hash, Transaction};

/// Cost-scaled target calculator.
#[derive(Clone, Debug)]
pub struct TargetCalculator {
    block_reward: u64,
    base_target: U256,
    fee_per_byte: u64,
}

impl TargetCalculator {
    /// Create a calculator from `S`, `T0` and the per-byte fee.
    pub fn new(block_reward: u64, base_target: U256, fee_per_byte: u64) -> Self {
        Self {
            block_reward,
            base_target,
            fee_per_byte,
        }
    }

    /// Calculator for the configured parameters.
    pub fn from_config(config: &MessageTxnConfig) -> Self {
        Self::new(config.block_reward, config.base_target, config.fee_per_byte)
    }

    /// Cost of a transaction of `size` serialized bytes.
    pub fn cost_of(&self, size: usize) -> u64 {
        (size as u64).saturating_mul(self.fee_per_byte)
    }

    /// Target for cost `cost`.
    ///
    /// Computed in 512 bits and saturated to `U256::MAX`.
    ///
    /// # Errors
    ///
    /// `InvalidCost` when `cost` is zero.
    pub fn target_for_cost(&self, cost: u64) -> Result<U256> {
        if cost == 0 {
            return Err(MsgTxnError::InvalidCost);
        }
        let ratio = self.block_reward / cost;
        let product = U512::from(self.base_target) * U512::from(ratio);
        Ok(U256::try_from(product).unwrap_or(U256::MAX))
    }

    /// Target for a transaction, from its serialized size.
    pub fn target_for(&self, tx: &Transaction) -> Result<U256> {
        self.target_for_cost(self.cost_of(tx.serialized_size()))
    }
}

/// Transaction id with the sign bit flipped, read as a big-endian integer.
pub fn pow_hash(txid: &Hash) -> U256 {
    U256::from_big_endian(txid) ^ (U256::one() << 255)
}

/// Low 32 bits of a block hash, as committed in a payload anchor.
pub fn anchor_hash32(block_hash: &Hash) -> u32 {
    U256::from_big_endian(block_hash).low_u32()
}

/// True if `hash` satisfies `target`.
#[inline]
pub fn meets_target(hash: U256, target: U256) -> bool {
    hash <= target
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn calc() -> TargetCalculator {
        TargetCalculator::new(5_000_000_000, U256::one() << 228, 10)
    }

    #[test]
    fn test_zero_cost_rejected() {
        assert!(matches!(calc().target_for_cost(0), Err(MsgTxnError::InvalidCost)));
    }

    #[test]
    fn test_target_formula() {
        let target = calc().target_for_cost(12_930).unwrap();
        let expected = (U256::one() << 228) * U256::from(5_000_000_000u64 / 12_930);
        assert_eq!(target, expected);
    }

    #[test]
    fn test_cost_above_reward_gives_zero_target() {
        assert_eq!(calc().target_for_cost(5_000_000_001).unwrap(), U256::zero());
    }

    #[test]
    fn test_overflow_saturates() {
        let calc = TargetCalculator::new(u64::MAX, U256::MAX, 1);
        assert_eq!(calc.target_for_cost(1).unwrap(), U256::MAX);
    }

    #[test]
    fn test_pow_hash_flips_top_bit() {
        let mut id = [0u8; 32];
        assert_eq!(pow_hash(&id), U256::one() << 255);
        id[0] = 0x80;
        assert_eq!(pow_hash(&id), U256::zero());
    }

    #[test]
    fn test_anchor_hash32_is_low_word() {
        let mut hash = [0u8; 32];
        hash[28..].copy_from_slice(&[0x12, 0x34, 0x56, 0x78]);
        hash[0] = 0xFF;
        assert_eq!(anchor_hash32(&hash), 0x1234_5678);
    }

    proptest! {
        #[test]
        fn prop_target_non_increasing_in_cost(a in 1u64..10_000_000, b in 1u64..10_000_000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let calc = calc();
            prop_assert!(calc.target_for_cost(hi).unwrap() <= calc.target_for_cost(lo).unwrap());
        }
    }
}
