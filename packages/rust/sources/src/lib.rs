//! Upstream source adapters: fetch raw instances, types, and relationships from
//! each independently operated service and normalize them into [`Instance`]s.
//!
//! This crate provides:
//! - [`SourceAdapter`]: the fetch contract every source implements
//! - [`dialects`]: per-source payload shapes (ERP, MES, SCADA, generic)
//! - [`HttpSource`]: the HTTP/JSON adapter driven by a dialect
//! - [`IdQualifier`]: namespace qualification of element identifiers

pub mod dialects;
pub mod http;
pub mod qualify;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use mfgraph_shared::{AppConfig, Instance, Namespace, Result, TypeDeclaration};

pub use dialects::{
    ErpDialect, GenericDialect, MesDialect, NormalizedObject, PayloadDialect, ScadaDialect,
    dialect_for,
};
pub use http::HttpSource;
pub use qualify::IdQualifier;

// ---------------------------------------------------------------------------
// Source errors
// ---------------------------------------------------------------------------

/// What went wrong while fetching from a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceErrorKind {
    /// The source could not be read at all; it contributes no instances.
    SourceUnreachable,
    /// The source answered but some data is missing or malformed.
    PartialSourceData,
}

/// A non-fatal, structured fetch failure attributed to one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceError {
    pub source: String,
    pub kind: SourceErrorKind,
    pub message: String,
}

impl SourceError {
    pub fn unreachable(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            kind: SourceErrorKind::SourceUnreachable,
            message: message.into(),
        }
    }

    pub fn partial(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            kind: SourceErrorKind::PartialSourceData,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:?}): {}", self.source, self.kind, self.message)
    }
}

// ---------------------------------------------------------------------------
// Fetch outcome
// ---------------------------------------------------------------------------

/// Everything one source returned, plus what failed.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub source: String,
    pub namespaces: Vec<Namespace>,
    pub types: Vec<TypeDeclaration>,
    pub instances: Vec<Instance>,
    pub errors: Vec<SourceError>,
}

impl FetchOutcome {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// Outcome for a source that could not be read at all.
    pub fn unreachable(source: impl Into<String>, message: impl Into<String>) -> Self {
        let source = source.into();
        let error = SourceError::unreachable(source.clone(), message);
        Self {
            source,
            errors: vec![error],
            ..Default::default()
        }
    }

    /// Whether this source failed entirely.
    pub fn is_unreachable(&self) -> bool {
        self.errors
            .iter()
            .any(|e| e.kind == SourceErrorKind::SourceUnreachable)
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Fetch contract for one upstream service.
///
/// `fetch` never fails: whatever could be retrieved is returned together with
/// structured [`SourceError`]s describing the rest.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Source name for tracing and error attribution.
    fn name(&self) -> &str;

    /// Fetch namespaces, types, instances, and relationships.
    async fn fetch(&self) -> FetchOutcome;
}

/// Build one HTTP adapter per configured source, in config order.
pub fn build_sources(config: &AppConfig) -> Result<Vec<Arc<dyn SourceAdapter>>> {
    let known_prefixes = config.prefixes();
    config
        .sources
        .iter()
        .map(|source| {
            let adapter = HttpSource::new(source.clone(), &known_prefixes)?;
            Ok(Arc::new(adapter) as Arc<dyn SourceAdapter>)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_outcome_has_no_instances() {
        let outcome = FetchOutcome::unreachable("mes", "connection refused");
        assert!(outcome.is_unreachable());
        assert!(outcome.instances.is_empty());
        assert_eq!(outcome.errors[0].source, "mes");
        assert!(outcome.errors[0].to_string().contains("connection refused"));
    }

    #[test]
    fn partial_outcome_is_not_unreachable() {
        let mut outcome = FetchOutcome::new("erp");
        outcome
            .errors
            .push(SourceError::partial("erp", "namespaces: HTTP 503"));
        assert!(!outcome.is_unreachable());
    }

    #[test]
    fn build_sources_from_default_config() {
        let config = AppConfig::default();
        let sources = build_sources(&config).expect("build sources");
        let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["erp", "mes", "scada"]);
    }
}
