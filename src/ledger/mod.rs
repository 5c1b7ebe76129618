//! Durable storage for task records
//!
//! The ledger is the single source of truth shared by the HTTP API, the
//! dispatcher and every worker. Nothing else keeps task state in memory.
//!
//! - [`TaskStore`] is the contract the core consumes.
//! - [`FjallStore`] persists records in an embedded Fjall LSM keyspace,
//!   one JSON value per task under `task:{id}`.
//! - [`MemoryStore`] keeps records in a map; handy for tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use taskfetch::ledger::{FjallStore, TaskStore};
//!
//! let store = FjallStore::open("storage/ledger")?;
//! let task = store.create(vec!["https://example.com/a.png".into()])?;
//! assert!(store.claim(&task.id)?.is_some());
//! ```

pub mod error;
pub mod memory;
pub mod partitions;
pub mod store;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use store::FjallStore;
pub use traits::TaskStore;
