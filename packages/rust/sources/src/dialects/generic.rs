//! Generic (fallback) dialect.
//!
//! Uses the i3X-style field names only; suitable for any source that already
//! speaks the common shape.

use super::PayloadDialect;

/// Dialect with no source-specific conventions.
pub struct GenericDialect;

impl PayloadDialect for GenericDialect {
    fn name(&self) -> &str {
        "generic"
    }
}
