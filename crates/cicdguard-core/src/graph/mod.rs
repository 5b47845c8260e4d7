//! Value types shared by the stores and the inventory.

mod edge;
mod findings;
mod node;

pub use edge::Edge;
pub use findings::{
    decode_columns, encode_columns, LedgerEntry, FINDING_DELIMITER, LEGACY_DELIMITER,
};
pub use node::{NodeHandle, NodeId, StoredNode};
