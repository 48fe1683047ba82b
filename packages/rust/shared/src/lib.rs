//! Shared types, error model, and configuration for mfgraph.
//!
//! This crate is the foundation depended on by all other mfgraph crates.
//! It provides:
//! - [`MfGraphError`]: the unified error type
//! - Domain types ([`Instance`], [`ElementId`], [`Edge`], [`Role`], [`SnapshotId`])
//! - Configuration ([`AppConfig`], [`CacheConfig`], [`SourceConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CacheConfig, Dialect, ServerConfig, SourceConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{MfGraphError, Result};
pub use types::{
    Direction, Edge, ElementId, Instance, Namespace, RelationshipRef, Role, SnapshotId,
    TypeDeclaration,
};
