//! Persistence backends for the inventory graph.

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{GraphStore, OpenStore, StoreError, StoreResult};
