pub mod config;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod inventory;
pub mod parser;
pub mod providers;
pub mod report;
pub mod rules;
pub mod schema;
pub mod snapshot;
pub mod store;

pub use config::GuardConfig;
pub use error::{GuardError, GuardResult};
pub use graph::{Edge, LedgerEntry, NodeHandle, NodeId, StoredNode};
pub use inventory::{ConnectOutcome, Inventory, RecordOutcome};
pub use rules::{RuleFinding, RuleTarget};
pub use schema::{NodeKind, NodeRecord, Platform, Relation};
pub use store::{GraphStore, MemoryStore, OpenStore, SqliteStore};
