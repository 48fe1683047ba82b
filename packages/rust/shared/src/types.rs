//! Core domain types for the unified manufacturing graph.

use std::borrow::Borrow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ElementId
// ---------------------------------------------------------------------------

/// Globally unique element identifier (namespace-qualified at ingestion).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub String);

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ElementId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for ElementId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ElementId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// SnapshotId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one published graph snapshot (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(pub Uuid);

impl SnapshotId {
    /// Generate a new time-sortable snapshot identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SnapshotId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Inferred semantic category of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Equipment,
    Line,
    Job,
    Order,
    MaterialBatch,
    Operator,
    Sensor,
    Unknown,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Equipment => "Equipment",
            Role::Line => "Line",
            Role::Job => "Job",
            Role::Order => "Order",
            Role::MaterialBatch => "MaterialBatch",
            Role::Operator => "Operator",
            Role::Sensor => "Sensor",
            Role::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Relationships
// ---------------------------------------------------------------------------

/// Direction of a relationship as seen from the instance that holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outgoing,
    Incoming,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::Outgoing => Direction::Incoming,
            Direction::Incoming => Direction::Outgoing,
        }
    }

    /// Lenient parse of direction strings found in upstream payloads.
    pub fn parse_lenient(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "outgoing" | "out" | "forward" | "source" => Some(Direction::Outgoing),
            "incoming" | "in" | "inverse" | "reverse" | "target" => Some(Direction::Incoming),
            _ => None,
        }
    }
}

/// One (direction, target) entry in an instance's relationship map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipRef {
    pub direction: Direction,
    pub target: ElementId,
}

/// A typed, directed edge between two instances.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub source: ElementId,
    pub relationship_type: String,
    pub target: ElementId,
}

impl Edge {
    pub fn new(
        source: impl Into<ElementId>,
        relationship_type: impl Into<String>,
        target: impl Into<ElementId>,
    ) -> Self {
        Self {
            source: source.into(),
            relationship_type: relationship_type.into(),
            target: target.into(),
        }
    }

    /// The endpoint opposite to `id`, if `id` is one of the endpoints.
    pub fn other_end(&self, id: &str) -> Option<&ElementId> {
        if self.source.as_str() == id {
            Some(&self.target)
        } else if self.target.as_str() == id {
            Some(&self.source)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Instance
// ---------------------------------------------------------------------------

/// A node in the unified graph: one real-world entity from any source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub element_id: ElementId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Source-declared type; classification input, not authoritative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ElementId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    /// Relationship type → (direction, target) pairs, duplicates removed.
    #[serde(default)]
    pub relationships: BTreeMap<String, Vec<RelationshipRef>>,
}

impl Instance {
    pub fn new(element_id: impl Into<ElementId>) -> Self {
        Self {
            element_id: element_id.into(),
            name: None,
            type_id: None,
            parent_id: None,
            namespace: None,
            attributes: BTreeMap::new(),
            relationships: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_type(mut self, type_id: impl Into<String>) -> Self {
        self.type_id = Some(type_id.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<ElementId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_relationship(
        mut self,
        relationship_type: impl Into<String>,
        direction: Direction,
        target: impl Into<ElementId>,
    ) -> Self {
        self.add_relationship(relationship_type, direction, target);
        self
    }

    /// Record a relationship; returns `false` if the same entry already existed.
    pub fn add_relationship(
        &mut self,
        relationship_type: impl Into<String>,
        direction: Direction,
        target: impl Into<ElementId>,
    ) -> bool {
        let entry = RelationshipRef {
            direction,
            target: target.into(),
        };
        let refs = self
            .relationships
            .entry(relationship_type.into())
            .or_default();
        if refs.contains(&entry) {
            return false;
        }
        refs.push(entry);
        true
    }

    /// Name if present, otherwise the element id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.element_id.as_str())
    }

    /// Total number of relationship entries across all types.
    pub fn relationship_count(&self) -> usize {
        self.relationships.values().map(Vec::len).sum()
    }
}

// ---------------------------------------------------------------------------
// Namespaces & type declarations
// ---------------------------------------------------------------------------

/// A logical grouping of types/instances contributed by one upstream source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Namespace {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Name of the source that declared it.
    pub source: String,
}

/// A source-declared object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDeclaration {
    pub element_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_uri: Option<String>,
    pub source: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_id_roundtrip() {
        let id = SnapshotId::new();
        let parsed: SnapshotId = id.to_string().parse().expect("parse SnapshotId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn element_id_borrows_as_str() {
        let mut map = std::collections::HashMap::new();
        map.insert(ElementId::from("erp-order-1"), 1);
        assert_eq!(map.get("erp-order-1"), Some(&1));
    }

    #[test]
    fn add_relationship_deduplicates() {
        let mut inst = Instance::new("mes-job-1");
        assert!(inst.add_relationship("ExecutedOn", Direction::Outgoing, "scada-equipment-1"));
        assert!(!inst.add_relationship("ExecutedOn", Direction::Outgoing, "scada-equipment-1"));
        assert!(inst.add_relationship("ExecutedOn", Direction::Incoming, "scada-equipment-1"));
        assert_eq!(inst.relationship_count(), 2);
    }

    #[test]
    fn instance_serializes_camel_case() {
        let inst = Instance::new("scada-equipment-filler-1")
            .with_name("Filler 1")
            .with_type("scada:EquipmentType")
            .with_parent("scada-line-1")
            .with_attribute("OEE", 99.2);

        let json = serde_json::to_value(&inst).expect("serialize");
        assert_eq!(json["elementId"], "scada-equipment-filler-1");
        assert_eq!(json["typeId"], "scada:EquipmentType");
        assert_eq!(json["parentId"], "scada-line-1");
        assert_eq!(json["attributes"]["OEE"], 99.2);

        let parsed: Instance = serde_json::from_value(json).expect("deserialize");
        assert_eq!(parsed, inst);
    }

    #[test]
    fn direction_parse_lenient() {
        assert_eq!(Direction::parse_lenient("Outgoing"), Some(Direction::Outgoing));
        assert_eq!(Direction::parse_lenient(" inverse "), Some(Direction::Incoming));
        assert_eq!(Direction::parse_lenient("sideways"), None);
        assert_eq!(Direction::Outgoing.reverse(), Direction::Incoming);
    }

    #[test]
    fn edge_other_end() {
        let edge = Edge::new("mes-job-1", "ExecutedOn", "scada-equipment-1");
        assert_eq!(
            edge.other_end("mes-job-1").map(ElementId::as_str),
            Some("scada-equipment-1")
        );
        assert_eq!(
            edge.other_end("scada-equipment-1").map(ElementId::as_str),
            Some("mes-job-1")
        );
        assert!(edge.other_end("erp-order-1").is_none());
    }
}
