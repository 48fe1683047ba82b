//! Production execution (MES) dialect.

use super::PayloadDialect;

/// Dialect for the MES job service.
pub struct MesDialect;

impl PayloadDialect for MesDialect {
    fn name(&self) -> &str {
        "mes"
    }

    fn id_keys(&self) -> &[&'static str] {
        &["elementId", "jobId", "id"]
    }

    fn reference_attributes(&self) -> &[(&'static str, &'static str)] {
        &[
            ("equipmentId", "ExecutedOn"),
            ("operatorId", "AssignedTo"),
            ("orderId", "ForOrder"),
            ("materialBatchId", "ConsumesBatch"),
        ]
    }
}
