//! Adapter implementations
//!
//! Adapters implement the storage ports:
//! - In-memory pools for sessions, presence and mailboxes
//! - In-memory or file-backed hash registries

pub mod hash_file;
pub mod memory;

pub use hash_file::FileHashRegistry;
pub use memory::{MemoryAdapter, MemoryHashRegistry};
