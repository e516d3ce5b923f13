//! Adapters: chain storage backends and the relay pool.

pub mod file;
pub mod memory;
pub mod pool;

pub use file::FileChainStore;
pub use memory::InMemoryChainStore;
pub use pool::MessagePool;
