//! Single-hop reads over a snapshot: relationships, search, containment, hierarchy.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use mfgraph_shared::{ElementId, Instance, MfGraphError, RelationshipRef, Result, Role};

use crate::index::GraphSnapshot;

// ---------------------------------------------------------------------------
// Relationships
// ---------------------------------------------------------------------------

/// The instance's own relationship map, without traversal.
pub fn relationships_of<'a>(
    snapshot: &'a GraphSnapshot,
    element_id: &str,
) -> Result<&'a BTreeMap<String, Vec<RelationshipRef>>> {
    snapshot
        .get(element_id)
        .map(|inst| &inst.relationships)
        .ok_or_else(|| MfGraphError::not_found(element_id))
}

/// Targets of one relationship type (matched case-insensitively), both directions.
pub fn relationship_targets<'a>(
    snapshot: &'a GraphSnapshot,
    element_id: &str,
    relationship_type: &str,
) -> Result<Vec<&'a RelationshipRef>> {
    let relationships = relationships_of(snapshot, element_id)?;
    Ok(relationships
        .iter()
        .filter(|(name, _)| name.eq_ignore_ascii_case(relationship_type))
        .flat_map(|(_, refs)| refs.iter())
        .collect())
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// One search result with the first location the term matched.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit<'a> {
    pub instance: &'a Instance,
    pub role: Role,
    pub match_location: String,
}

/// Case-insensitive substring search over id, name, type and attribute values.
///
/// `type_filter`, when given, must be a case-insensitive substring of the type id.
pub fn search<'a>(
    snapshot: &'a GraphSnapshot,
    term: &str,
    type_filter: Option<&str>,
) -> Result<Vec<SearchHit<'a>>> {
    let term = term.trim();
    if term.is_empty() {
        return Err(MfGraphError::validation("search term must not be empty"));
    }
    let needle = term.to_lowercase();
    let type_filter = type_filter
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase);

    Ok(snapshot
        .classified()
        .filter(|(inst, _)| match &type_filter {
            Some(filter) => inst
                .type_id
                .as_deref()
                .is_some_and(|t| t.to_lowercase().contains(filter.as_str())),
            None => true,
        })
        .filter_map(|(inst, role)| {
            match_location(inst, &needle).map(|match_location| SearchHit {
                instance: inst,
                role,
                match_location,
            })
        })
        .collect())
}

fn match_location(inst: &Instance, needle: &str) -> Option<String> {
    let contains = |s: &str| s.to_lowercase().contains(needle);

    if contains(inst.element_id.as_str()) {
        return Some("ID".to_string());
    }
    if inst.name.as_deref().is_some_and(contains) {
        return Some("Name".to_string());
    }
    if inst.type_id.as_deref().is_some_and(contains) {
        return Some("Type".to_string());
    }
    inst.attributes
        .iter()
        .find(|(_, value)| contains(&scalar_text(value)))
        .map(|(key, _)| format!("Attribute: {key}"))
}

/// Text form of an attribute value as a user would type it.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Containment
// ---------------------------------------------------------------------------

/// Children of `element_id`: every instance with a `HasParent` edge to it.
pub fn children<'a>(snapshot: &'a GraphSnapshot, element_id: &str) -> Result<Vec<&'a Instance>> {
    if !snapshot.contains(element_id) {
        return Err(MfGraphError::not_found(element_id));
    }
    Ok(snapshot.children_of(element_id))
}

/// Parent of `element_id`; `Ok(None)` for roots and unresolved parents.
pub fn parent<'a>(snapshot: &'a GraphSnapshot, element_id: &str) -> Result<Option<&'a Instance>> {
    if !snapshot.contains(element_id) {
        return Err(MfGraphError::not_found(element_id));
    }
    Ok(snapshot.parent_of(element_id))
}

// ---------------------------------------------------------------------------
// Production hierarchy
// ---------------------------------------------------------------------------

/// Compact view of an instance inside the hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSummary {
    pub element_id: ElementId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_id: Option<String>,
    pub role: Role,
}

impl InstanceSummary {
    fn of(inst: &Instance, role: Role) -> Self {
        Self {
            element_id: inst.element_id.clone(),
            name: inst.display_name().to_string(),
            type_id: inst.type_id.clone(),
            role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentNode {
    #[serde(flatten)]
    pub equipment: InstanceSummary,
    pub sensors: Vec<InstanceSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineNode {
    #[serde(flatten)]
    pub line: InstanceSummary,
    pub equipment: Vec<EquipmentNode>,
}

/// Line → Equipment → Sensor, by role and containment edges.
///
/// With `line_id`, an unknown id is not-found and a non-Line id yields no lines.
pub fn production_hierarchy(snapshot: &GraphSnapshot, line_id: Option<&str>) -> Result<Vec<LineNode>> {
    if let Some(id) = line_id {
        if !snapshot.contains(id) {
            return Err(MfGraphError::not_found(id));
        }
    }

    let children_with_role = |parent: &str, role: Role| -> Vec<InstanceSummary> {
        snapshot
            .children_of(parent)
            .into_iter()
            .filter_map(|child| {
                let child_role = snapshot.role_of(child.element_id.as_str())?;
                (child_role == role).then(|| InstanceSummary::of(child, child_role))
            })
            .collect()
    };

    Ok(snapshot
        .classified()
        .filter(|(inst, role)| {
            *role == Role::Line && line_id.is_none_or(|id| inst.element_id.as_str() == id)
        })
        .map(|(line, role)| LineNode {
            line: InstanceSummary::of(line, role),
            equipment: children_with_role(line.element_id.as_str(), Role::Equipment)
                .into_iter()
                .map(|equipment| EquipmentNode {
                    sensors: children_with_role(equipment.element_id.as_str(), Role::Sensor),
                    equipment,
                })
                .collect(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mfgraph_shared::Direction;

    fn plant() -> GraphSnapshot {
        GraphSnapshot::build(vec![
            Instance::new("scada-line-1").with_name("Bottling Line 1").with_type("LineType"),
            Instance::new("scada-equipment-filler-1")
                .with_name("Filler")
                .with_type("EquipmentType")
                .with_parent("scada-line-1")
                .with_attribute("OEE", 99.2)
                .with_attribute("state", "Running"),
            Instance::new("scada-sensor-temp-1")
                .with_type("SensorType")
                .with_parent("scada-equipment-filler-1")
                .with_attribute("engineeringUnit", "C"),
            Instance::new("scada-line-2").with_type("LineType"),
            Instance::new("mes-job-1")
                .with_type("JobType")
                .with_relationship("ExecutedOn", Direction::Outgoing, "scada-equipment-filler-1"),
            Instance::new("erp-order-1")
                .with_name("Order for Acme")
                .with_type("SalesOrder")
                .with_relationship("ForJob", Direction::Outgoing, "mes-job-1"),
        ])
    }

    fn ids(hits: &[SearchHit<'_>]) -> Vec<String> {
        hits.iter().map(|h| h.instance.element_id.to_string()).collect()
    }

    #[test]
    fn search_matches_id() {
        let snap = plant();
        let hits = search(&snap, "filler", None).unwrap();
        assert_eq!(ids(&hits), vec!["scada-equipment-filler-1"]);
        assert_eq!(hits[0].match_location, "ID");
        assert_eq!(hits[0].role, Role::Equipment);
    }

    #[test]
    fn search_matches_attribute_value() {
        let snap = plant();
        let hits = search(&snap, "99.2", None).unwrap();
        assert_eq!(ids(&hits), vec!["scada-equipment-filler-1"]);
        assert_eq!(hits[0].match_location, "Attribute: OEE");
    }

    #[test]
    fn search_reports_first_location() {
        let snap = plant();
        let hits = search(&snap, "ACME", None).unwrap();
        assert_eq!(ids(&hits), vec!["erp-order-1"]);
        assert_eq!(hits[0].match_location, "Name");

        let hits = search(&snap, "salesorder", None).unwrap();
        assert_eq!(hits[0].match_location, "Type");
    }

    #[test]
    fn search_type_filter() {
        let snap = plant();
        let hits = search(&snap, "scada", Some("line")).unwrap();
        assert_eq!(ids(&hits), vec!["scada-line-1", "scada-line-2"]);
    }

    #[test]
    fn empty_search_is_rejected() {
        let err = search(&plant(), "  ", None).unwrap_err();
        assert!(matches!(err, MfGraphError::Validation { .. }));
    }

    #[test]
    fn relationships_are_read_directly() {
        let snap = plant();
        let rels = relationships_of(&snap, "mes-job-1").unwrap();
        assert_eq!(rels["ExecutedOn"][0].direction, Direction::Outgoing);
        assert_eq!(rels["ForJob"][0].direction, Direction::Incoming);

        let targets = relationship_targets(&snap, "mes-job-1", "executedon").unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].target.as_str(), "scada-equipment-filler-1");

        assert!(relationship_targets(&snap, "mes-job-1", "Unknown").unwrap().is_empty());
        assert!(relationships_of(&snap, "missing").unwrap_err().is_not_found());
    }

    #[test]
    fn containment_queries() {
        let snap = plant();
        let kids = children(&snap, "scada-line-1").unwrap();
        assert_eq!(kids.len(), 1);
        assert_eq!(kids[0].element_id.as_str(), "scada-equipment-filler-1");

        let p = parent(&snap, "scada-sensor-temp-1").unwrap();
        assert_eq!(p.map(|i| i.element_id.as_str()), Some("scada-equipment-filler-1"));
        assert!(parent(&snap, "scada-line-1").unwrap().is_none());
        assert!(children(&snap, "missing").unwrap_err().is_not_found());
    }

    #[test]
    fn has_children_alone_establishes_containment() {
        let snap = GraphSnapshot::build(vec![
            Instance::new("scada-line-1")
                .with_type("LineType")
                .with_relationship("HasChildren", Direction::Outgoing, "scada-equipment-1"),
            Instance::new("scada-equipment-1").with_type("EquipmentType"),
        ]);

        let kids = children(&snap, "scada-line-1").unwrap();
        assert_eq!(kids.len(), 1);
        assert_eq!(kids[0].element_id.as_str(), "scada-equipment-1");

        let p = parent(&snap, "scada-equipment-1").unwrap();
        assert_eq!(p.map(|i| i.element_id.as_str()), Some("scada-line-1"));

        let lines = production_hierarchy(&snap, Some("scada-line-1")).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].equipment.len(), 1);
        assert_eq!(lines[0].equipment[0].equipment.element_id.as_str(), "scada-equipment-1");
    }

    #[test]
    fn hierarchy_nests_line_equipment_sensor() {
        let snap = plant();
        let lines = production_hierarchy(&snap, None).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].line.name, "Bottling Line 1");
        assert_eq!(lines[0].equipment.len(), 1);
        assert_eq!(lines[0].equipment[0].sensors.len(), 1);
        assert_eq!(
            lines[0].equipment[0].sensors[0].element_id.as_str(),
            "scada-sensor-temp-1"
        );
        assert!(lines[1].equipment.is_empty());

        let json = serde_json::to_value(&lines[0]).unwrap();
        assert_eq!(json["elementId"], "scada-line-1");
        assert_eq!(json["equipment"][0]["sensors"][0]["role"], "Sensor");
    }

    #[test]
    fn hierarchy_line_filter() {
        let snap = plant();
        let lines = production_hierarchy(&snap, Some("scada-line-2")).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].line.element_id.as_str(), "scada-line-2");

        assert!(production_hierarchy(&snap, Some("erp-order-1")).unwrap().is_empty());
        assert!(production_hierarchy(&snap, Some("nope")).unwrap_err().is_not_found());
    }
}
