//! Equipment / sensor telemetry (SCADA) dialect.
//!
//! Telemetry values arrive as `{ "value": .., "quality": .., "timestamp": .. }`
//! and are flattened to the bare value.

use serde_json::Value;

use super::PayloadDialect;

/// Dialect for the SCADA telemetry service.
pub struct ScadaDialect;

impl PayloadDialect for ScadaDialect {
    fn name(&self) -> &str {
        "scada"
    }

    fn id_keys(&self) -> &[&'static str] {
        &["elementId", "tagId", "id"]
    }

    fn name_keys(&self) -> &[&'static str] {
        &["displayName", "name", "tagName"]
    }

    fn scalar(&self, value: &Value) -> Value {
        match value {
            Value::Object(obj) if obj.contains_key("value") => {
                obj.get("value").cloned().unwrap_or(Value::Null)
            }
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialects::normalize_object;
    use crate::qualify::IdQualifier;
    use serde_json::json;

    #[test]
    fn telemetry_values_are_flattened() {
        let known = vec!["scada".to_string()];
        let raw = json!({
            "elementId": "scada-equipment-filler-1",
            "tagName": "Filler 1",
            "parentId": "line-1",
            "values": {
                "OEE": { "value": 99.2, "quality": "Good", "timestamp": "2026-10-19T08:00:00Z" },
                "state": "Running"
            }
        });
        let obj = normalize_object(&ScadaDialect, &IdQualifier::new("scada", &known), &raw)
            .expect("normalize");
        let inst = obj.instance;
        assert_eq!(inst.name.as_deref(), Some("Filler 1"));
        assert_eq!(inst.parent_id.as_ref().map(|p| p.as_str()), Some("scada-line-1"));
        assert_eq!(inst.attributes["OEE"], json!(99.2));
        assert_eq!(inst.attributes["state"], json!("Running"));
    }
}
