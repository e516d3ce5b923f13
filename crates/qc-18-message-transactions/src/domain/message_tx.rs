//! Message transactions: recognition and construction.

use super::payload::{MessagePayload, NONCE_OFFSET, PAYLOAD_LEN};
use super::target::{pow_hash, TargetCalculator};
use crate::error::Result;
use primitive_types::U256;
use shared_types::{Block, Hash, OutputScript, Transaction, TxInput, TxOutput};

/// A transaction carrying exactly one message payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageTransaction {
    tx: Transaction,
    payload: MessagePayload,
    id: Hash,
}

impl MessageTransaction {
    /// Recognize a message transaction.
    ///
    /// Returns `None` unless exactly one data-carrier output decodes as a
    /// payload. Such transactions are left to ordinary validation.
    pub fn from_transaction(tx: Transaction) -> Option<Self> {
        let payload = {
            let mut decoded = tx
                .data_carriers()
                .filter_map(|data| MessagePayload::decode(data).ok());
            let payload = decoded.next()?;
            if decoded.next().is_some() {
                return None;
            }
            payload
        };
        let id = tx.hash();
        Some(Self { tx, payload, id })
    }

    /// Unmined transaction shape: one null input and one zero-value
    /// data-carrier output holding the payload.
    pub fn template(payload: &MessagePayload) -> Transaction {
        Transaction {
            version: Transaction::VERSION,
            inputs: vec![TxInput::null(Vec::new())],
            outputs: vec![TxOutput {
                value: 0,
                script: OutputScript::DataCarrier(payload.encode()),
            }],
            lock_time: 0,
        }
    }

    /// Wrap a template built by [`MessageTransaction::template`].
    pub(crate) fn from_template(payload: MessagePayload) -> Self {
        let tx = Self::template(&payload);
        let id = tx.hash();
        Self { tx, payload, id }
    }

    /// Byte offset of the payload nonce within a template's encoding.
    ///
    /// The data-carrier output is last, followed only by the 4-byte lock time.
    pub(crate) fn template_nonce_offset(encoded_len: usize) -> usize {
        encoded_len - 4 - PAYLOAD_LEN + NONCE_OFFSET
    }

    /// Transaction id.
    pub fn id(&self) -> Hash {
        self.id
    }

    /// Decoded payload.
    pub fn payload(&self) -> &MessagePayload {
        &self.payload
    }

    /// Underlying transaction.
    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    /// Consume into the underlying transaction.
    pub fn into_transaction(self) -> Transaction {
        self.tx
    }

    /// Id with the sign bit flipped, compared against the target.
    pub fn pow_hash(&self) -> U256 {
        pow_hash(&self.id)
    }

    /// Economic cost under `calculator`.
    pub fn cost(&self, calculator: &TargetCalculator) -> u64 {
        calculator.cost_of(self.tx.serialized_size())
    }

    /// Target this transaction must meet.
    pub fn target(&self, calculator: &TargetCalculator) -> Result<U256> {
        calculator.target_for(&self.tx)
    }
}

/// Message transactions of a block, in block order.
pub fn message_transactions(block: &Block) -> impl Iterator<Item = MessageTransaction> + '_ {
    block
        .transactions
        .iter()
        .filter_map(|tx| MessageTransaction::from_transaction(tx.clone()))
}

/// Ids of a block's message transactions, in block order.
pub fn message_ids(block: &Block) -> Vec<Hash> {
    message_transactions(block).map(|m| m.id()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payload::MESSAGE_CIPHERTEXT_LEN;

    fn payload(nonce: u32) -> MessagePayload {
        MessagePayload::new(3, 0xABCD, nonce, vec![1u8; MESSAGE_CIPHERTEXT_LEN]).unwrap()
    }

    #[test]
    fn test_template_is_recognized() {
        let tx = MessageTransaction::template(&payload(0));
        let msg = MessageTransaction::from_transaction(tx.clone()).unwrap();
        assert_eq!(msg.id(), tx.hash());
        assert_eq!(msg.payload(), &payload(0));
    }

    #[test]
    fn test_nonce_offset_points_at_nonce() {
        let mut bytes = MessageTransaction::template(&payload(0)).encode();
        let offset = MessageTransaction::template_nonce_offset(bytes.len());
        bytes[offset..offset + 4].copy_from_slice(&77u32.to_le_bytes());

        let patched = Transaction::decode(&bytes).unwrap();
        assert_eq!(patched, MessageTransaction::template(&payload(77)));
    }

    #[test]
    fn test_two_payloads_not_recognized() {
        let mut tx = MessageTransaction::template(&payload(0));
        tx.outputs.push(tx.outputs[0].clone());
        assert!(MessageTransaction::from_transaction(tx).is_none());
    }

    #[test]
    fn test_ordinary_data_carrier_not_recognized() {
        let mut tx = MessageTransaction::template(&payload(0));
        tx.outputs[0].script = OutputScript::DataCarrier(b"MSGFREE:short".to_vec());
        assert!(MessageTransaction::from_transaction(tx).is_none());
    }

    #[test]
    fn test_cost_scales_with_size() {
        let calc = TargetCalculator::new(5_000_000_000, U256::one() << 228, 10);
        let msg = MessageTransaction::from_template(payload(0));
        assert_eq!(msg.cost(&calc), msg.transaction().serialized_size() as u64 * 10);
    }
}
