//! Unified manufacturing graph: role classification, snapshot index,
//! bounded context traversal, and single-hop queries.
//!
//! Everything here is pure and synchronous; snapshots are built once and
//! then only read.

pub mod classifier;
pub mod context;
pub mod index;
pub mod query;

pub use classifier::{Classification, ClassificationRule, classify, explain};
pub use context::{ContextBuilder, MAX_HOPS, MAX_VISITED, ManufacturingContext};
pub use index::{GraphSnapshot, HAS_PARENT, SnapshotInput, SnapshotStats};
pub use query::{EquipmentNode, InstanceSummary, LineNode, SearchHit};
