//! Snapshot cache and query façade for the manufacturing graph.
//!
//! - [`cache`]: owns the published snapshot, rebuilds it from the sources
//!   in the background when it goes stale
//! - [`service`]: read operations answered from one snapshot per call

pub mod cache;
pub mod service;

pub use cache::{CacheStatus, GraphCache, RebuildFailure, SourceReport, fetch_all};
pub use service::{
    ContextView, ObjectMetadata, ObjectView, QueryService, RelationshipsView, SearchResult,
};
