//! Enterprise order system dialect.
//!
//! ERP records are keyed by order number and link to production through
//! plain reference attributes rather than declared relationships.

use super::PayloadDialect;

/// Dialect for the ERP order service.
pub struct ErpDialect;

impl PayloadDialect for ErpDialect {
    fn name(&self) -> &str {
        "erp"
    }

    fn id_keys(&self) -> &[&'static str] {
        &["elementId", "orderId", "id"]
    }

    fn name_keys(&self) -> &[&'static str] {
        &["displayName", "name", "orderNumber"]
    }

    fn reference_attributes(&self) -> &[(&'static str, &'static str)] {
        &[
            ("jobId", "ForJob"),
            ("mesJobId", "ForJob"),
            ("materialBatchId", "ConsumesBatch"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialects::normalize_object;
    use crate::qualify::IdQualifier;
    use serde_json::json;

    #[test]
    fn order_links_to_job_via_reference_attribute() {
        let known = vec!["erp".to_string(), "mes".to_string()];
        let raw = json!({
            "orderId": "order-1001",
            "orderNumber": "SO-1001",
            "typeId": "erp:SalesOrderType",
            "attributes": { "customerName": "Acme Beverages", "quantity": 5000, "jobId": "mes-job-1" }
        });
        let obj = normalize_object(&ErpDialect, &IdQualifier::new("erp", &known), &raw)
            .expect("normalize");
        let inst = obj.instance;
        assert_eq!(inst.element_id.as_str(), "erp-order-1001");
        assert_eq!(inst.name.as_deref(), Some("SO-1001"));
        assert_eq!(inst.relationships["ForJob"][0].target.as_str(), "mes-job-1");
        // The reference stays visible as an attribute too.
        assert!(inst.attributes.contains_key("jobId"));
    }
}
