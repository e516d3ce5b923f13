//! Parallel proof-of-work search for message transactions.
//!
//! Worker `i` of `N` tries nonces `i, i + N, i + 2N, ...` over the `u32`
//! space. The first worker to meet the target claims the result with a
//! compare-and-swap on the shared found flag; everyone else stops at their
//! next iteration.

use super::message_tx::MessageTransaction;
use super::payload::MessagePayload;
use super::target::{meets_target, pow_hash};
use crate::error::{MsgTxnError, Result};
use primitive_types::U256;
use shared_types::sha256d;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::time::Instant;
use tracing::{debug, info};

/// Cooperative cancellation handle shared with a running search.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// New, not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the search to stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Has cancellation been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Multi-threaded nonce search.
#[derive(Clone, Debug)]
pub struct PowMiner {
    num_threads: usize,
}

impl PowMiner {
    /// Miner with `num_threads` workers (0 is treated as 1).
    pub fn new(num_threads: usize) -> Self {
        Self {
            num_threads: num_threads.max(1),
        }
    }

    /// One worker per CPU.
    pub fn with_default_threads() -> Self {
        Self::new(num_cpus::get())
    }

    /// Worker count.
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Search for a nonce whose transaction meets `target`.
    ///
    /// The template's own nonce is ignored.
    ///
    /// # Errors
    ///
    /// - `MiningCancelled` if `cancel` fired before a solution was found
    /// - `NonceSpaceExhausted` if no nonce in `u32` meets the target
    #[tracing::instrument(skip_all, fields(threads = self.num_threads, anchor = template.anchor_height))]
    pub fn mine(
        &self,
        template: &MessagePayload,
        target: U256,
        cancel: &CancelToken,
    ) -> Result<MessageTransaction> {
        debug!("[qc-18] Starting message PoW: target={:#x}", target);
        let started = Instant::now();

        let encoded = Arc::new(MessageTransaction::template(&template.with_nonce(0)).encode());
        let nonce_offset = MessageTransaction::template_nonce_offset(encoded.len());

        let found = Arc::new(AtomicBool::new(false));
        let result_nonce = Arc::new(AtomicU64::new(0));
        let attempts = Arc::new(AtomicU64::new(0));
        let stride = self.num_threads as u64;

        let mut handles = Vec::with_capacity(self.num_threads);
        for worker in 0..self.num_threads {
            let encoded = Arc::clone(&encoded);
            let found = Arc::clone(&found);
            let result_nonce = Arc::clone(&result_nonce);
            let attempts = Arc::clone(&attempts);
            let cancel = cancel.clone();

            handles.push(std::thread::spawn(move || {
                let mut bytes = encoded.as_ref().clone();
                let mut tried = 0u64;
                let mut nonce = worker as u64;

                while nonce <= u64::from(u32::MAX) {
                    if found.load(Ordering::Relaxed) || cancel.is_cancelled() {
                        break;
                    }

                    bytes[nonce_offset..nonce_offset + 4]
                        .copy_from_slice(&(nonce as u32).to_le_bytes());
                    tried += 1;

                    if meets_target(pow_hash(&sha256d(&bytes)), target) {
                        if found
                            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
                            .is_ok()
                        {
                            result_nonce.store(nonce, Ordering::Release);
                        }
                        break;
                    }
                    nonce += stride;
                }
                attempts.fetch_add(tried, Ordering::Relaxed);
            }));
        }

        for handle in handles {
            let _ = handle.join();
        }

        let elapsed = started.elapsed();
        let tried = attempts.load(Ordering::Relaxed);

        if found.load(Ordering::Acquire) {
            let nonce = result_nonce.load(Ordering::Acquire) as u32;
            let mined = MessageTransaction::from_template(template.with_nonce(nonce));
            info!(
                "[qc-18] Message PoW found: nonce={} attempts={} elapsed={:?} txid={}",
                nonce,
                tried,
                elapsed,
                hex::encode(mined.id())
            );
            Ok(mined)
        } else if cancel.is_cancelled() {
            debug!("[qc-18] Message PoW cancelled after {} attempts", tried);
            Err(MsgTxnError::MiningCancelled)
        } else {
            Err(MsgTxnError::NonceSpaceExhausted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payload::MESSAGE_CIPHERTEXT_LEN;
    use crate::domain::target::TargetCalculator;

    fn template() -> MessagePayload {
        let mut ciphertext = vec![0u8; MESSAGE_CIPHERTEXT_LEN];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut ciphertext);
        MessagePayload::new(10, 0x1234, 0, ciphertext).unwrap()
    }

    fn regtest_target(payload: &MessagePayload) -> U256 {
        TargetCalculator::new(5_000_000_000, U256::one() << 228, 10)
            .target_for(&MessageTransaction::template(payload))
            .unwrap()
    }

    #[test]
    fn test_solution_meets_target_for_any_worker_count() {
        for threads in [1, 2, 5] {
            let payload = template();
            let target = regtest_target(&payload);
            let mined = PowMiner::new(threads)
                .mine(&payload, target, &CancelToken::new())
                .unwrap();

            assert!(mined.pow_hash() <= target);
            assert_eq!(mined.payload().anchor_height, 10);
            assert_eq!(mined.id(), mined.transaction().hash());
        }
    }

    #[test]
    fn test_zero_threads_means_one() {
        assert_eq!(PowMiner::new(0).num_threads(), 1);
    }

    #[test]
    fn test_cancel_before_start() {
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = PowMiner::new(2).mine(&template(), U256::zero(), &cancel);
        assert!(matches!(result, Err(MsgTxnError::MiningCancelled)));
    }

    #[test]
    fn test_cancel_while_running() {
        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let payload = template();

        let handle = std::thread::spawn(move || PowMiner::new(2).mine(&payload, U256::zero(), &cancel));
        std::thread::sleep(std::time::Duration::from_millis(50));
        remote.cancel();

        assert!(matches!(
            handle.join().unwrap(),
            Err(MsgTxnError::MiningCancelled)
        ));
    }
}
