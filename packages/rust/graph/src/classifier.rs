//! Role inference for schema-less instances.
//!
//! Classification is a fixed, ordered rule chain over an instance's own data:
//! 1. `TypeId` keywords, 2. `ElementId` naming patterns, 3. attribute hints.
//! The first matching rule wins. Within rules 1 and 2 the keyword table is
//! scanned top to bottom, so more specific roles (Sensor, Equipment) shadow
//! broader ones (Line, Order). Reordering either table changes results.

use serde::Serialize;

use mfgraph_shared::{Instance, Role};

/// Keywords matched (case-insensitive substring) against `TypeId` and `ElementId`.
const ROLE_KEYWORDS: &[(Role, &[&str])] = &[
    (Role::Sensor, &["sensor"]),
    (Role::Operator, &["operator"]),
    (Role::MaterialBatch, &["materialbatch", "batch", "material"]),
    (Role::Equipment, &["equipment", "equip", "machine", "asset"]),
    (Role::Line, &["line"]),
    (Role::Job, &["job", "workorder", "work-order"]),
    (Role::Order, &["order"]),
];

/// Attribute-name hints, compared against normalized attribute names.
const ATTRIBUTE_HINTS: &[(Role, &[&str])] = &[
    (Role::Order, &["customer"]),
    (Role::Operator, &["shift", "badge"]),
    (Role::MaterialBatch, &["batchnumber", "lotnumber", "expirydate"]),
    (Role::Job, &["jobstatus", "scheduledstart", "workorder"]),
    (Role::Sensor, &["engineeringunit", "measurement", "reading"]),
    (Role::Equipment, &["oee", "availability", "mtbf"]),
];

/// Which rule produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClassificationRule {
    TypeId,
    ElementId,
    Attribute,
    Fallback,
}

/// A role together with the evidence for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub role: Role,
    pub rule: ClassificationRule,
    /// Keyword or attribute that matched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<String>,
}

/// Infer the semantic role of an instance.
pub fn classify(instance: &Instance) -> Role {
    explain(instance).role
}

/// Classify and report which rule fired.
pub fn explain(instance: &Instance) -> Classification {
    if let Some((role, keyword)) = instance.type_id.as_deref().and_then(match_keyword) {
        return Classification {
            role,
            rule: ClassificationRule::TypeId,
            matched: Some(keyword.to_string()),
        };
    }

    if let Some((role, keyword)) = match_keyword(instance.element_id.as_str()) {
        return Classification {
            role,
            rule: ClassificationRule::ElementId,
            matched: Some(keyword.to_string()),
        };
    }

    if let Some((role, attribute)) = match_attributes(instance) {
        return Classification {
            role,
            rule: ClassificationRule::Attribute,
            matched: Some(attribute),
        };
    }

    Classification {
        role: Role::Unknown,
        rule: ClassificationRule::Fallback,
        matched: None,
    }
}

fn match_keyword(text: &str) -> Option<(Role, &'static str)> {
    let lower = text.to_lowercase();
    ROLE_KEYWORDS.iter().find_map(|(role, keywords)| {
        keywords
            .iter()
            .find(|k| lower.contains(*k))
            .map(|k| (*role, *k))
    })
}

fn match_attributes(instance: &Instance) -> Option<(Role, String)> {
    if instance.attributes.is_empty() {
        return None;
    }
    let names: Vec<(String, &String)> = instance
        .attributes
        .keys()
        .map(|k| (normalize_attribute(k), k))
        .collect();

    ATTRIBUTE_HINTS.iter().find_map(|(role, hints)| {
        names
            .iter()
            .find(|(normalized, _)| hints.iter().any(|h| normalized.contains(h)))
            .map(|(_, original)| (*role, (*original).clone()))
    })
}

/// Lowercase and strip `_`, `-`, and spaces.
fn normalize_attribute(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}
