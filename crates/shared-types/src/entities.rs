//! # Core Domain Entities
//!
//! Chain entities and their canonical byte encoding.
//!
//! ## Clusters
//!
//! - **Chain**: `Block`, `BlockHeader`, `Transaction`, `TxInput`, `TxOutput`
//! - **Lookup**: `TxLocation`
//!
//! ## Canonical Encoding
//!
//! All integers are little-endian. Variable-length fields carry a `u32`
//! length prefix. Transaction and block identifiers are the double SHA-256
//! of this encoding, so any two nodes derive identical ids.

use crate::errors::DecodeError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// Re-export U256 from primitive-types for use across all subsystems
pub use primitive_types::U256;

// =============================================================================
// CLUSTER A: THE CHAIN
// =============================================================================

/// A 32-byte hash (double SHA-256).
pub type Hash = [u8; 32];

/// The all-zero hash (parent of genesis, null input reference).
pub const ZERO_HASH: Hash = [0u8; 32];

/// `prev_index` value marking an input that spends nothing.
pub const NULL_INDEX: u32 = u32::MAX;

/// Timestamp of the genesis block.
pub const GENESIS_TIMESTAMP: u64 = 1_296_688_602;

/// Double SHA-256.
pub fn sha256d(data: &[u8]) -> Hash {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

/// A transaction input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Transaction being spent, or `ZERO_HASH` for a null input.
    pub prev_tx: Hash,
    /// Output index being spent, or `NULL_INDEX`.
    pub prev_index: u32,
    /// Unlocking data.
    pub script_sig: Vec<u8>,
    /// Sequence number.
    pub sequence: u32,
}

impl TxInput {
    /// An input that spends nothing, carrying arbitrary data.
    pub fn null(script_sig: Vec<u8>) -> Self {
        Self {
            prev_tx: ZERO_HASH,
            prev_index: NULL_INDEX,
            script_sig,
            sequence: u32::MAX,
        }
    }

    /// Returns true if this input does not reference a previous output.
    pub fn is_null(&self) -> bool {
        self.prev_tx == ZERO_HASH && self.prev_index == NULL_INDEX
    }
}

/// Locking condition of an output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputScript {
    /// Spendable by the holder of this compressed public key.
    PayToPublicKey(Vec<u8>),
    /// Provably unspendable output carrying opaque data.
    DataCarrier(Vec<u8>),
}

impl OutputScript {
    const TAG_PAY_TO_PUBKEY: u8 = 0x00;
    const TAG_DATA_CARRIER: u8 = 0x6a;

    fn tag(&self) -> u8 {
        match self {
            Self::PayToPublicKey(_) => Self::TAG_PAY_TO_PUBKEY,
            Self::DataCarrier(_) => Self::TAG_DATA_CARRIER,
        }
    }

    fn data(&self) -> &[u8] {
        match self {
            Self::PayToPublicKey(data) | Self::DataCarrier(data) => data,
        }
    }
}

/// A transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Amount in base units.
    pub value: u64,
    /// Locking script.
    pub script: OutputScript,
}

/// A transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Format version.
    pub version: u32,
    /// Inputs, in order.
    pub inputs: Vec<TxInput>,
    /// Outputs, in order.
    pub outputs: Vec<TxOutput>,
    /// Earliest height or time this transaction may be included.
    pub lock_time: u32,
}

impl Transaction {
    /// Current transaction format version.
    pub const VERSION: u32 = 1;

    /// Build the coinbase for a block at `height` paying `reward` to `payee`.
    ///
    /// The height is committed in the input data so coinbases of different
    /// blocks never share an id.
    pub fn coinbase(height: u64, reward: u64, payee: Vec<u8>) -> Self {
        Self {
            version: Self::VERSION,
            inputs: vec![TxInput::null(height.to_le_bytes().to_vec())],
            outputs: vec![TxOutput {
                value: reward,
                script: OutputScript::PayToPublicKey(payee),
            }],
            lock_time: 0,
        }
    }

    /// Returns true for the first transaction of a block.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1
            && self.inputs[0].is_null()
            && self
                .outputs
                .iter()
                .any(|o| matches!(o.script, OutputScript::PayToPublicKey(_)))
    }

    /// Canonical encoding.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.serialized_size());
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            out.extend_from_slice(&input.prev_tx);
            out.extend_from_slice(&input.prev_index.to_le_bytes());
            put_bytes(&mut out, &input.script_sig);
            out.extend_from_slice(&input.sequence.to_le_bytes());
        }
        out.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            out.extend_from_slice(&output.value.to_le_bytes());
            out.push(output.script.tag());
            put_bytes(&mut out, output.script.data());
        }
        out.extend_from_slice(&self.lock_time.to_le_bytes());
        out
    }

    /// Decode the canonical encoding. Trailing bytes are rejected.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(bytes);
        let version = reader.u32()?;

        let input_count = reader.count()?;
        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            inputs.push(TxInput {
                prev_tx: reader.hash()?,
                prev_index: reader.u32()?,
                script_sig: reader.bytes()?,
                sequence: reader.u32()?,
            });
        }

        let output_count = reader.count()?;
        let mut outputs = Vec::with_capacity(output_count);
        for _ in 0..output_count {
            let value = reader.u64()?;
            let tag = reader.u8()?;
            let data = reader.bytes()?;
            let script = match tag {
                OutputScript::TAG_PAY_TO_PUBKEY => OutputScript::PayToPublicKey(data),
                OutputScript::TAG_DATA_CARRIER => OutputScript::DataCarrier(data),
                other => return Err(DecodeError::UnknownScriptTag(other)),
            };
            outputs.push(TxOutput { value, script });
        }

        let lock_time = reader.u32()?;
        reader.finish()?;

        Ok(Self {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    /// Hex of the canonical encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.encode())
    }

    /// Parse a hex-encoded transaction.
    pub fn from_hex(raw: &str) -> Result<Self, DecodeError> {
        let bytes = hex::decode(raw.trim()).map_err(|e| DecodeError::InvalidHex(e.to_string()))?;
        Self::decode(&bytes)
    }

    /// Transaction id: double SHA-256 of the canonical encoding.
    pub fn hash(&self) -> Hash {
        sha256d(&self.encode())
    }

    /// Length of the canonical encoding in bytes.
    pub fn serialized_size(&self) -> usize {
        let inputs: usize = self
            .inputs
            .iter()
            .map(|i| 32 + 4 + 4 + i.script_sig.len() + 4)
            .sum();
        let outputs: usize = self
            .outputs
            .iter()
            .map(|o| 8 + 1 + 4 + o.script.data().len())
            .sum();
        4 + 4 + inputs + 4 + outputs + 4
    }

    /// Data carried by each data-carrier output, in output order.
    pub fn data_carriers(&self) -> impl Iterator<Item = &[u8]> {
        self.outputs.iter().filter_map(|o| match &o.script {
            OutputScript::DataCarrier(data) => Some(data.as_slice()),
            OutputScript::PayToPublicKey(_) => None,
        })
    }
}

/// The header of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockHeader {
    /// Protocol version for this block.
    pub version: u32,
    /// Block height in the chain.
    pub height: u64,
    /// Hash of the parent block (creates the chain linkage).
    pub parent_hash: Hash,
    /// Merkle root of all transaction ids in the block.
    pub tx_root: Hash,
    /// Unix timestamp when the block was produced.
    pub timestamp: u64,
    /// Block nonce.
    pub nonce: u64,
}

impl BlockHeader {
    /// Canonical header encoding (92 bytes).
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(92);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&self.parent_hash);
        out.extend_from_slice(&self.tx_root);
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.nonce.to_le_bytes());
        out
    }

    /// Block hash: double SHA-256 of the header encoding.
    pub fn hash(&self) -> Hash {
        sha256d(&self.encode())
    }
}

/// A block: header plus ordered transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// The block header.
    pub header: BlockHeader,
    /// Transactions, coinbase first.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Assemble a block on top of `parent_hash`, computing the tx root.
    pub fn new(
        parent_hash: Hash,
        height: u64,
        timestamp: u64,
        transactions: Vec<Transaction>,
    ) -> Self {
        let tx_root = merkle_root(&transactions.iter().map(Transaction::hash).collect::<Vec<_>>());
        Self {
            header: BlockHeader {
                version: 1,
                height,
                parent_hash,
                tx_root,
                timestamp,
                nonce: 0,
            },
            transactions,
        }
    }

    /// The deterministic genesis block shared by every node.
    pub fn genesis() -> Self {
        Self::new(
            ZERO_HASH,
            0,
            GENESIS_TIMESTAMP,
            vec![Transaction::coinbase(0, 0, Vec::new())],
        )
    }

    /// Block hash.
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// Block height.
    pub fn height(&self) -> u64 {
        self.header.height
    }

    /// Recompute the tx root and compare against the header.
    pub fn has_valid_tx_root(&self) -> bool {
        let ids: Vec<Hash> = self.transactions.iter().map(Transaction::hash).collect();
        merkle_root(&ids) == self.header.tx_root
    }
}

/// Merkle root over transaction ids, duplicating the last id on odd levels.
pub fn merkle_root(ids: &[Hash]) -> Hash {
    if ids.is_empty() {
        return ZERO_HASH;
    }
    let mut level = ids.to_vec();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            if let Some(last) = level.last().copied() {
                level.push(last);
            }
        }
        level = level
            .chunks(2)
            .map(|pair| {
                let mut buf = [0u8; 64];
                buf[..32].copy_from_slice(&pair[0]);
                buf[32..].copy_from_slice(&pair[1]);
                sha256d(&buf)
            })
            .collect();
    }
    level[0]
}

// =============================================================================
// CLUSTER B: LOOKUP
// =============================================================================

/// Where a transaction was confirmed on the active chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxLocation {
    /// Height of the confirming block.
    pub block_height: u64,
    /// Hash of the confirming block.
    pub block_hash: Hash,
    /// Position within the block.
    pub tx_index: u32,
}

// =============================================================================
// ENCODING HELPERS
// =============================================================================

fn put_bytes(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or(DecodeError::UnexpectedEof { offset: self.pos })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(raw))
    }

    fn u64(&mut self) -> Result<u64, DecodeError> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(raw))
    }

    fn hash(&mut self) -> Result<Hash, DecodeError> {
        let mut raw = [0u8; 32];
        raw.copy_from_slice(self.take(32)?);
        Ok(raw)
    }

    /// Element count, bounded by the bytes left so a hostile prefix
    /// cannot force a huge allocation.
    fn count(&mut self) -> Result<usize, DecodeError> {
        let count = self.u32()? as usize;
        if count > self.buf.len() - self.pos {
            return Err(DecodeError::UnexpectedEof { offset: self.pos });
        }
        Ok(count)
    }

    fn bytes(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn finish(&self) -> Result<(), DecodeError> {
        if self.pos == self.buf.len() {
            Ok(())
        } else {
            Err(DecodeError::TrailingBytes(self.buf.len() - self.pos))
        }
    }
}
