//! Shared knowledge store for agentnet.
//!
//! Every agent in a network reads and publishes findings through one
//! [`KnowledgeStore`]. Entries are keyed by string and carry opaque JSON.
//!
//! # Persistence
//!
//! Entries marked persistent are written to a [`SnapshotBackend`] as a
//! single JSON object on every persistent mutation, and reloaded once when
//! the store opens. Temporary entries live only in memory and are dropped
//! by [`KnowledgeStore::clear_temporary`].
//!
//! ```text
//!  agents ──► KnowledgeStore (async mutex) ──► SnapshotBackend
//!                                              ├─ FileBackend   (JSON file)
//!                                              └─ MemoryBackend (tests)
//! ```

pub mod backend;
pub mod store;
pub mod types;

pub use backend::{FileBackend, MemoryBackend, SnapshotBackend};
pub use store::KnowledgeStore;
pub use types::{KnowledgeConfig, KnowledgeEntry};
