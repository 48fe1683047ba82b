//! Payload dialects: per-source mapping from raw JSON records to [`Instance`]s.
//!
//! Each upstream service names its fields a little differently and encodes
//! some relationships as plain reference attributes (`equipmentId`, `jobId`).
//! A dialect lists the field-name candidates and reference attributes for one
//! source; [`normalize_object`] applies it.

mod erp;
mod generic;
mod mes;
mod scada;

use serde_json::{Map, Value};

use mfgraph_shared::{Dialect, Direction, ElementId, Instance, Namespace, TypeDeclaration};

use crate::qualify::IdQualifier;

pub use erp::ErpDialect;
pub use generic::GenericDialect;
pub use mes::MesDialect;
pub use scada::ScadaDialect;

/// Envelope keys under which list endpoints may wrap their array.
const ENVELOPE_KEYS: &[&str] = &["items", "data", "objects", "results", "value"];

/// Keys identifying a relationship target inside an object entry.
const TARGET_KEYS: &[&str] = &["targetId", "target", "elementId", "relatedElementId", "id"];

/// Keys naming the relationship type inside a list entry.
const RELATIONSHIP_TYPE_KEYS: &[&str] = &["relationshipType", "type", "name"];

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Field conventions of one upstream payload shape.
///
/// Defaults follow the i3X-style field names shared by most sources; dialects
/// override only what differs.
pub trait PayloadDialect: Send + Sync {
    /// Human-readable dialect name for tracing.
    fn name(&self) -> &str;

    fn id_keys(&self) -> &[&'static str] {
        &["elementId", "id"]
    }

    fn name_keys(&self) -> &[&'static str] {
        &["displayName", "name"]
    }

    fn type_keys(&self) -> &[&'static str] {
        &["typeId", "typeElementId", "type"]
    }

    fn parent_keys(&self) -> &[&'static str] {
        &["parentId"]
    }

    fn namespace_keys(&self) -> &[&'static str] {
        &["namespaceUri", "namespace"]
    }

    fn attribute_keys(&self) -> &[&'static str] {
        &["attributes", "values", "properties"]
    }

    /// Attributes whose value is the id of a related element: (attribute, relationship type).
    fn reference_attributes(&self) -> &[(&'static str, &'static str)] {
        &[]
    }

    /// Normalize one attribute value to a scalar.
    fn scalar(&self, value: &Value) -> Value {
        value.clone()
    }
}

/// Dialect implementation for a configured [`Dialect`].
pub fn dialect_for(dialect: Dialect) -> Box<dyn PayloadDialect> {
    match dialect {
        Dialect::Erp => Box::new(ErpDialect),
        Dialect::Mes => Box::new(MesDialect),
        Dialect::Scada => Box::new(ScadaDialect),
        Dialect::Generic => Box::new(GenericDialect),
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// One raw record mapped into the common instance shape.
#[derive(Debug, Clone)]
pub struct NormalizedObject {
    /// Identifier as the upstream knows it (used for follow-up requests).
    pub local_id: String,
    pub instance: Instance,
    /// Whether the record carried its relationships inline.
    pub has_inline_relationships: bool,
    /// Relationship entries that could not be interpreted.
    pub skipped_relationships: usize,
}

/// Map one raw JSON record into an [`Instance`].
pub fn normalize_object(
    dialect: &dyn PayloadDialect,
    qualifier: &IdQualifier,
    raw: &Value,
) -> Result<NormalizedObject, String> {
    let obj = raw
        .as_object()
        .ok_or_else(|| format!("expected a JSON object, got {}", kind_of(raw)))?;

    let local_id = first_string(obj, dialect.id_keys())
        .ok_or_else(|| format!("record has none of the id fields {:?}", dialect.id_keys()))?;
    if local_id.trim().is_empty() {
        return Err("record has an empty element id".into());
    }

    let mut instance = Instance::new(qualifier.qualify(&local_id));
    instance.name = first_string(obj, dialect.name_keys());
    instance.type_id = first_string(obj, dialect.type_keys());
    instance.parent_id = first_string(obj, dialect.parent_keys())
        .filter(|p| !p.trim().is_empty())
        .map(|p| qualifier.qualify(&p));
    instance.namespace = first_string(obj, dialect.namespace_keys());

    for key in dialect.attribute_keys() {
        match obj.get(*key) {
            Some(Value::Object(attrs)) => {
                for (name, value) in attrs {
                    insert_attribute(&mut instance, dialect, name, value);
                }
            }
            // [{ "name": "OEE", "value": 99.2 }, ...]
            Some(Value::Array(entries)) => {
                for entry in entries {
                    let Some(entry) = entry.as_object() else { continue };
                    let Some(name) = first_string(entry, &["name", "key", "attribute"]) else {
                        continue;
                    };
                    let value = entry.get("value").unwrap_or(&Value::Null);
                    insert_attribute(&mut instance, dialect, &name, value);
                }
            }
            _ => {}
        }
    }

    for (attribute, relationship_type) in dialect.reference_attributes() {
        let reference = obj
            .get(*attribute)
            .or_else(|| instance.attributes.get(*attribute))
            .and_then(value_as_string);
        if let Some(target) = reference.filter(|t| !t.trim().is_empty()) {
            instance.add_relationship(
                *relationship_type,
                Direction::Outgoing,
                qualifier.qualify(&target),
            );
        }
    }

    let mut has_inline_relationships = false;
    let mut skipped_relationships = 0;
    if let Some(inline) = obj.get("relationships").filter(|v| !v.is_null()) {
        has_inline_relationships = true;
        match parse_relationships(inline, qualifier) {
            Ok((entries, skipped)) => {
                skipped_relationships = skipped;
                for (relationship_type, direction, target) in entries {
                    instance.add_relationship(relationship_type, direction, target);
                }
            }
            Err(_) => skipped_relationships += 1,
        }
    }

    Ok(NormalizedObject {
        local_id,
        instance,
        has_inline_relationships,
        skipped_relationships,
    })
}

fn insert_attribute(instance: &mut Instance, dialect: &dyn PayloadDialect, name: &str, value: &Value) {
    let value = dialect.scalar(value);
    if !value.is_null() {
        instance.attributes.insert(name.to_string(), value);
    }
}

/// Parse a relationship payload into (type, direction, qualified target) triples.
///
/// Accepts a map `{type: target | [target...]}` (targets as strings or objects)
/// or a list of `{relationshipType, targetId, direction?}` entries, optionally
/// wrapped in a `relationships`/`items`/`data` envelope. Returns the parsed
/// entries and the number of entries that had to be skipped.
pub fn parse_relationships(
    value: &Value,
    qualifier: &IdQualifier,
) -> Result<(Vec<(String, Direction, ElementId)>, usize), String> {
    let mut entries = Vec::new();
    let mut skipped = 0;

    match value {
        Value::Null => {}
        Value::Object(map) => {
            if let Some(inner) = ["relationships", "items", "data"]
                .iter()
                .find_map(|k| map.get(*k))
                .filter(|_| map.len() == 1)
            {
                return parse_relationships(inner, qualifier);
            }
            for (relationship_type, targets) in map {
                let targets: Vec<&Value> = match targets {
                    Value::Array(items) => items.iter().collect(),
                    other => vec![other],
                };
                for target in targets {
                    match target_of(target, qualifier) {
                        Some((direction, id)) => {
                            entries.push((relationship_type.clone(), direction, id))
                        }
                        None => skipped += 1,
                    }
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                let parsed = item.as_object().and_then(|obj| {
                    let relationship_type = first_string(obj, RELATIONSHIP_TYPE_KEYS)?;
                    let (direction, target) = target_of(item, qualifier)?;
                    Some((relationship_type, direction, target))
                });
                match parsed {
                    Some(entry) => entries.push(entry),
                    None => skipped += 1,
                }
            }
        }
        other => return Err(format!("unexpected relationship payload: {}", kind_of(other))),
    }

    Ok((entries, skipped))
}

fn target_of(value: &Value, qualifier: &IdQualifier) -> Option<(Direction, ElementId)> {
    match value {
        Value::String(_) | Value::Number(_) => {
            let id = value_as_string(value)?;
            Some((Direction::Outgoing, qualifier.qualify(&id)))
        }
        Value::Object(obj) => {
            let id = first_string(obj, TARGET_KEYS)?;
            let direction = obj
                .get("direction")
                .and_then(Value::as_str)
                .and_then(Direction::parse_lenient)
                .unwrap_or(Direction::Outgoing);
            Some((direction, qualifier.qualify(&id)))
        }
        _ => None,
    }
}

/// Parse a namespace listing.
pub fn parse_namespaces(value: &Value, source: &str) -> Vec<Namespace> {
    list_items(value)
        .into_iter()
        .flatten()
        .filter_map(|item| match item {
            Value::String(uri) => Some(Namespace {
                uri: uri.clone(),
                display_name: None,
                source: source.to_string(),
            }),
            Value::Object(obj) => Some(Namespace {
                uri: first_string(obj, &["uri", "namespaceUri", "elementId", "id"])?,
                display_name: first_string(obj, &["displayName", "name"]),
                source: source.to_string(),
            }),
            _ => None,
        })
        .collect()
}

/// Parse an object-type listing.
pub fn parse_types(value: &Value, source: &str) -> Vec<TypeDeclaration> {
    list_items(value)
        .into_iter()
        .flatten()
        .filter_map(|item| {
            let obj = item.as_object()?;
            Some(TypeDeclaration {
                element_id: first_string(obj, &["elementId", "typeId", "id"])?,
                display_name: first_string(obj, &["displayName", "name"]),
                namespace_uri: first_string(obj, &["namespaceUri", "namespace"]),
                source: source.to_string(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// JSON helpers
// ---------------------------------------------------------------------------

/// The record list of a list endpoint: a bare array or an enveloped one.
pub fn list_items(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(map) => ENVELOPE_KEYS
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_array)),
        _ => None,
    }
}

/// First key present with a string-like value.
pub(crate) fn first_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(value_as_string))
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn qualifier(prefix: &str) -> IdQualifier {
        let known = vec!["erp".to_string(), "mes".to_string(), "scada".to_string()];
        IdQualifier::new(prefix, &known)
    }

    #[test]
    fn generic_record_normalizes() {
        let raw = json!({
            "elementId": "line-1",
            "displayName": "Bottling Line 1",
            "typeId": "LineType",
            "namespaceUri": "urn:plant:scada",
            "attributes": { "OEE": 87.5, "status": "Running", "note": null }
        });
        let obj = normalize_object(&GenericDialect, &qualifier("scada"), &raw).expect("normalize");
        let inst = obj.instance;
        assert_eq!(obj.local_id, "line-1");
        assert_eq!(inst.element_id.as_str(), "scada-line-1");
        assert_eq!(inst.name.as_deref(), Some("Bottling Line 1"));
        assert_eq!(inst.type_id.as_deref(), Some("LineType"));
        assert_eq!(inst.namespace.as_deref(), Some("urn:plant:scada"));
        assert_eq!(inst.attributes.len(), 2);
        assert!(!obj.has_inline_relationships);
    }

    #[test]
    fn attribute_list_form_is_accepted() {
        let raw = json!({
            "elementId": "equipment-2",
            "values": [ { "name": "OEE", "value": 99.2 }, { "value": 1 } ]
        });
        let obj = normalize_object(&GenericDialect, &qualifier("scada"), &raw).expect("normalize");
        assert_eq!(obj.instance.attributes.get("OEE"), Some(&json!(99.2)));
        assert_eq!(obj.instance.attributes.len(), 1);
    }

    #[test]
    fn missing_id_is_rejected() {
        let err = normalize_object(&GenericDialect, &qualifier("erp"), &json!({"name": "x"}))
            .unwrap_err();
        assert!(err.contains("id fields"));

        let err = normalize_object(&GenericDialect, &qualifier("erp"), &json!([1, 2])).unwrap_err();
        assert!(err.contains("array"));
    }

    #[test]
    fn numeric_ids_are_stringified() {
        let raw = json!({ "id": 1001, "parentId": 7 });
        let obj = normalize_object(&GenericDialect, &qualifier("erp"), &raw).expect("normalize");
        assert_eq!(obj.instance.element_id.as_str(), "erp-1001");
        assert_eq!(
            obj.instance.parent_id.as_ref().map(ElementId::as_str),
            Some("erp-7")
        );
    }

    #[test]
    fn inline_relationships_map_form() {
        let raw = json!({
            "elementId": "job-1",
            "relationships": {
                "ExecutedOn": "scada-equipment-1",
                "ProducedBy": [ { "elementId": "operator-3", "direction": "incoming" }, 17.5, true ]
            }
        });
        let obj = normalize_object(&MesDialect, &qualifier("mes"), &raw).expect("normalize");
        let rels = &obj.instance.relationships;
        assert!(obj.has_inline_relationships);
        assert_eq!(rels["ExecutedOn"][0].target.as_str(), "scada-equipment-1");
        assert_eq!(rels["ProducedBy"][0].direction, Direction::Incoming);
        assert_eq!(rels["ProducedBy"][0].target.as_str(), "mes-operator-3");
        // 17.5 is a valid (numeric) id, `true` is not.
        assert_eq!(rels["ProducedBy"].len(), 2);
        assert_eq!(obj.skipped_relationships, 1);
    }

    #[test]
    fn relationship_list_form_with_envelope() {
        let payload = json!({
            "relationships": [
                { "relationshipType": "ForJob", "targetId": "mes-job-1" },
                { "type": "HasChildren", "target": "equipment-1", "direction": "outgoing" },
                { "targetId": "missing-type" }
            ]
        });
        let (entries, skipped) =
            parse_relationships(&payload, &qualifier("scada")).expect("parse");
        assert_eq!(entries.len(), 2);
        assert_eq!(skipped, 1);
        assert_eq!(entries[0].0, "ForJob");
        assert_eq!(entries[0].2.as_str(), "mes-job-1");
        assert_eq!(entries[1].2.as_str(), "scada-equipment-1");
    }

    #[test]
    fn relationship_scalar_payload_is_error() {
        assert!(parse_relationships(&json!("nope"), &qualifier("erp")).is_err());
        let (entries, skipped) = parse_relationships(&Value::Null, &qualifier("erp")).unwrap();
        assert!(entries.is_empty());
        assert_eq!(skipped, 0);
    }

    #[test]
    fn list_items_unwraps_envelopes() {
        assert_eq!(list_items(&json!([1, 2])).map(Vec::len), Some(2));
        assert_eq!(list_items(&json!({ "items": [1] })).map(Vec::len), Some(1));
        assert_eq!(list_items(&json!({ "value": [1, 2, 3] })).map(Vec::len), Some(3));
        assert!(list_items(&json!({ "count": 3 })).is_none());
        assert!(list_items(&json!("x")).is_none());
    }

    #[test]
    fn namespaces_and_types_parse() {
        let ns = parse_namespaces(
            &json!([{ "uri": "urn:erp", "displayName": "ERP" }, "urn:erp:ext", 4]),
            "erp",
        );
        assert_eq!(ns.len(), 2);
        assert_eq!(ns[0].display_name.as_deref(), Some("ERP"));
        assert_eq!(ns[1].uri, "urn:erp:ext");

        let types = parse_types(
            &json!({ "data": [{ "elementId": "OrderType", "namespaceUri": "urn:erp" }, {}] }),
            "erp",
        );
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].source, "erp");
    }
}
