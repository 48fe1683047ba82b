//! Namespace qualification of element identifiers.
//!
//! Sources reuse local identifiers freely (`1001`, `line-1`), so every id is
//! prefixed with its source's prefix at ingestion. Ids that already carry a
//! known prefix are left alone, which lets cross-source references resolve.

use mfgraph_shared::ElementId;

/// Qualifies local identifiers for one source.
#[derive(Debug, Clone)]
pub struct IdQualifier {
    prefix: String,
    known_prefixes: Vec<String>,
}

impl IdQualifier {
    /// `known_prefixes` are the prefixes of every configured source.
    pub fn new(prefix: impl Into<String>, known_prefixes: &[String]) -> Self {
        let prefix = prefix.into();
        let mut known: Vec<String> = known_prefixes.iter().map(|p| p.to_lowercase()).collect();
        if !known.contains(&prefix.to_lowercase()) {
            known.push(prefix.to_lowercase());
        }
        Self {
            prefix,
            known_prefixes: known,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether `id` already starts with `<known prefix>-` or `<known prefix>:`.
    pub fn is_qualified(&self, id: &str) -> bool {
        let lower = id.to_lowercase();
        self.known_prefixes.iter().any(|p| {
            lower
                .strip_prefix(p.as_str())
                .is_some_and(|rest| rest.starts_with('-') || rest.starts_with(':'))
        })
    }

    /// Qualify a local identifier.
    pub fn qualify(&self, local: &str) -> ElementId {
        let local = local.trim();
        if self.is_qualified(local) {
            ElementId::from(local)
        } else {
            ElementId::new(format!("{}-{local}", self.prefix))
        }
    }
}
