//! File-backed chain store.
//!
//! Each active block is one bincode file named by its zero-padded height.
//! Files are written through a temp file and renamed. Popping the tip
//! deletes its file. The in-memory chain changes only alongside a
//! successful filesystem step. On open the chain is replayed from height 0 upward
//! into an [`InMemoryChainStore`], which serves all reads.

use super::memory::InMemoryChainStore;
use crate::ports::{ChainReader, ChainStore, ChainStoreError};
use parking_lot::Mutex;
use shared_types::{Block, Hash, TxLocation};
use std::path::{Path, PathBuf};
use tracing::info;

/// Active chain persisted to a directory.
#[derive(Debug)]
pub struct FileChainStore {
    dir: PathBuf,
    chain: InMemoryChainStore,
    write_lock: Mutex<()>,
}

fn io_err(e: impl std::fmt::Display) -> ChainStoreError {
    ChainStoreError::Backend(e.to_string())
}

impl FileChainStore {
    /// Open (or initialize with genesis) the chain in `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, ChainStoreError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(io_err)?;

        let mut blocks = Vec::new();
        loop {
            let path = Self::block_path(&dir, blocks.len() as u64);
            if !path.exists() {
                break;
            }
            let bytes = std::fs::read(&path).map_err(io_err)?;
            let block: Block = bincode::deserialize(&bytes).map_err(io_err)?;
            blocks.push(block);
        }

        let store = if blocks.is_empty() {
            let store = Self {
                dir,
                chain: InMemoryChainStore::default(),
                write_lock: Mutex::new(()),
            };
            store.append(Block::genesis())?;
            store
        } else {
            Self {
                dir,
                chain: InMemoryChainStore::from_blocks(blocks)?,
                write_lock: Mutex::new(()),
            }
        };

        info!(
            "[qc-18] Chain store opened at {}: {} blocks",
            store.dir.display(),
            store.chain.len()
        );
        Ok(store)
    }

    fn block_path(dir: &Path, height: u64) -> PathBuf {
        dir.join(format!("{height:010}.block"))
    }
}

impl ChainReader for FileChainStore {
    fn tip(&self) -> Result<(u64, Hash), ChainStoreError> {
        self.chain.tip()
    }

    fn block_hash_at(&self, height: u64) -> Result<Option<Hash>, ChainStoreError> {
        self.chain.block_hash_at(height)
    }

    fn block_at(&self, height: u64) -> Result<Option<Block>, ChainStoreError> {
        self.chain.block_at(height)
    }

    fn find_transaction(&self, txid: &Hash) -> Result<Option<TxLocation>, ChainStoreError> {
        self.chain.find_transaction(txid)
    }
}

impl ChainStore for FileChainStore {
    fn append(&self, block: Block) -> Result<(), ChainStoreError> {
        let _guard = self.write_lock.lock();
        let expected_height = self.chain.len() as u64;
        if block.height() != expected_height {
            return Err(ChainStoreError::NotConnected {
                expected_height,
                got: block.height(),
            });
        }

        let bytes = bincode::serialize(&block).map_err(io_err)?;
        let path = Self::block_path(&self.dir, block.height());
        let temp = path.with_extension("tmp");
        std::fs::write(&temp, &bytes).map_err(io_err)?;

        if let Err(e) = self.chain.append(block) {
            let _ = std::fs::remove_file(&temp);
            return Err(e);
        }
        if let Err(e) = std::fs::rename(&temp, &path) {
            // Memory must not run ahead of disk.
            let _ = self.chain.pop_tip();
            let _ = std::fs::remove_file(&temp);
            return Err(io_err(e));
        }
        Ok(())
    }

    fn pop_tip(&self) -> Result<Block, ChainStoreError> {
        let _guard = self.write_lock.lock();
        let (height, _) = self.chain.tip()?;
        if height == 0 {
            return self.chain.pop_tip();
        }

        // Move the file aside first so a failed pop can put it back.
        let path = Self::block_path(&self.dir, height);
        let popped = path.with_extension("popped");
        std::fs::rename(&path, &popped).map_err(io_err)?;
        match self.chain.pop_tip() {
            Ok(block) => {
                std::fs::remove_file(&popped).map_err(io_err)?;
                Ok(block)
            }
            Err(e) => {
                let _ = std::fs::rename(&popped, &path);
                Err(e)
            }
        }
    }
}
