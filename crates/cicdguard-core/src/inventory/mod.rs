//! The ingestion and annotation engine: upsert store, relationship fabric and
//! finding ledger over any [`GraphStore`].

mod fabric;
mod ledger;
mod upsert;

pub use fabric::ConnectOutcome;
pub use ledger::RecordOutcome;

use crate::store::GraphStore;

/// Typed access to the inventory graph.
///
/// Every mutation is validated against the schema and persisted through the
/// underlying store before it returns.
#[derive(Debug)]
pub struct Inventory<S: GraphStore> {
    store: S,
}

impl<S: GraphStore> Inventory<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}
