//! Unified query façade over the snapshot cache.
//!
//! Every call reads the currently published snapshot once and answers from it,
//! so a single response never mixes two snapshots. Results are owned and
//! serializable; the HTTP layer and the CLI print them as JSON.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument};

use mfgraph_graph::{
    Classification, ContextBuilder, GraphSnapshot, LineNode, ManufacturingContext, explain, query,
};
use mfgraph_shared::{
    CacheConfig, ElementId, Instance, MfGraphError, Namespace, RelationshipRef, Result, Role,
};

use crate::cache::{CacheStatus, GraphCache};

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// One instance as returned by object, children, and parent lookups.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectView {
    #[serde(flatten)]
    pub instance: Instance,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ObjectMetadata>,
}

/// Extra detail returned when metadata is requested.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    pub classification: Classification,
    pub relationship_count: usize,
    pub child_count: usize,
    pub snapshot_version: u64,
}

impl ObjectView {
    fn of(snapshot: &GraphSnapshot, instance: &Instance, include_metadata: bool) -> Self {
        let element_id = instance.element_id.as_str();
        let metadata = include_metadata.then(|| ObjectMetadata {
            classification: explain(instance),
            relationship_count: instance.relationship_count(),
            child_count: snapshot.children_of(element_id).len(),
            snapshot_version: snapshot.version(),
        });
        Self {
            instance: instance.clone(),
            role: snapshot.role_of(element_id).unwrap_or(Role::Unknown),
            metadata,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(flatten)]
    pub instance: Instance,
    pub role: Role,
    pub match_location: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipsView {
    pub element_id: ElementId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship_type: Option<String>,
    /// Relationship map, restricted to `relationship_type` when one was given.
    pub relationships: BTreeMap<String, Vec<RelationshipRef>>,
    /// Distinct targets across `relationships`, in map order.
    pub targets: Vec<ElementId>,
}

/// A manufacturing context plus its relationship summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextView {
    #[serde(flatten)]
    pub context: ManufacturingContext,
    pub relationship_count: usize,
    pub relationship_summary: BTreeMap<String, usize>,
}

impl From<ManufacturingContext> for ContextView {
    fn from(context: ManufacturingContext) -> Self {
        Self {
            relationship_count: context.all_relationships.len(),
            relationship_summary: context.relationship_summary(),
            context,
        }
    }
}

// ---------------------------------------------------------------------------
// QueryService
// ---------------------------------------------------------------------------

/// Read operations over the current snapshot.
#[derive(Debug, Clone)]
pub struct QueryService {
    cache: GraphCache,
    builder: ContextBuilder,
}

impl QueryService {
    pub fn new(cache: GraphCache, config: &CacheConfig) -> Self {
        let builder = ContextBuilder::new()
            .with_max_hops(config.max_hops as usize)
            .with_max_visited(config.max_visited);
        Self { cache, builder }
    }

    pub fn cache(&self) -> &GraphCache {
        &self.cache
    }

    fn snapshot(&self) -> Arc<GraphSnapshot> {
        self.cache.get()
    }

    /// Namespaces across all sources, first declaration of each URI kept.
    pub fn namespaces(&self) -> Vec<Namespace> {
        let snapshot = self.snapshot();
        let mut seen = HashSet::new();
        snapshot
            .namespaces()
            .iter()
            .filter(|ns| seen.insert(ns.uri.clone()))
            .cloned()
            .collect()
    }

    pub fn object(&self, element_id: &str, include_metadata: bool) -> Result<ObjectView> {
        let snapshot = self.snapshot();
        let instance = snapshot
            .get(element_id)
            .ok_or_else(|| MfGraphError::not_found(element_id))?;
        Ok(ObjectView::of(&snapshot, instance, include_metadata))
    }

    #[instrument(skip(self))]
    pub fn search(&self, term: &str, type_filter: Option<&str>) -> Result<Vec<SearchResult>> {
        let snapshot = self.snapshot();
        let hits = query::search(&snapshot, term, type_filter)?;
        debug!(hits = hits.len(), "search complete");
        Ok(hits
            .into_iter()
            .map(|hit| SearchResult {
                instance: hit.instance.clone(),
                role: hit.role,
                match_location: hit.match_location,
            })
            .collect())
    }

    pub fn children(&self, element_id: &str) -> Result<Vec<ObjectView>> {
        let snapshot = self.snapshot();
        Ok(query::children(&snapshot, element_id)?
            .into_iter()
            .map(|child| ObjectView::of(&snapshot, child, false))
            .collect())
    }

    pub fn parent(&self, element_id: &str) -> Result<Option<ObjectView>> {
        let snapshot = self.snapshot();
        Ok(query::parent(&snapshot, element_id)?.map(|p| ObjectView::of(&snapshot, p, false)))
    }

    /// Single-hop relationships; all types when `relationship_type` is `None`.
    pub fn relationships(
        &self,
        element_id: &str,
        relationship_type: Option<&str>,
    ) -> Result<RelationshipsView> {
        let snapshot = self.snapshot();
        let all = query::relationships_of(&snapshot, element_id)?;
        let relationship_type = relationship_type.map(str::trim).filter(|t| !t.is_empty());

        let relationships: BTreeMap<String, Vec<RelationshipRef>> = all
            .iter()
            .filter(|(name, _)| relationship_type.is_none_or(|t| name.eq_ignore_ascii_case(t)))
            .map(|(name, refs)| (name.clone(), refs.clone()))
            .collect();

        let mut seen = HashSet::new();
        let targets = relationships
            .values()
            .flatten()
            .filter(|r| seen.insert(r.target.clone()))
            .map(|r| r.target.clone())
            .collect();

        Ok(RelationshipsView {
            element_id: ElementId::from(element_id),
            relationship_type: relationship_type.map(str::to_string),
            relationships,
            targets,
        })
    }

    #[instrument(skip(self))]
    pub fn context(&self, element_id: &str) -> Result<ContextView> {
        let snapshot = self.snapshot();
        self.builder.build(element_id, &snapshot).map(ContextView::from)
    }

    pub fn hierarchy(&self, line_id: Option<&str>) -> Result<Vec<LineNode>> {
        let snapshot = self.snapshot();
        query::production_hierarchy(&snapshot, line_id)
    }

    pub fn status(&self) -> CacheStatus {
        self.cache.status()
    }

    /// Mark the snapshot stale and start a background rebuild.
    pub fn request_refresh(&self) -> CacheStatus {
        self.cache.invalidate();
        // The read itself schedules the rebuild.
        let _ = self.cache.get();
        self.cache.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use mfgraph_shared::Direction;
    use mfgraph_sources::SourceAdapter;

    use crate::cache::tests::{MockSource, cache_of, erp, mes, scada};

    async fn service() -> QueryService {
        let cache = cache_of(&[erp(), mes(), scada()]);
        cache.initialize().await.expect("initialize");
        QueryService::new(cache, &CacheConfig::default())
    }

    #[tokio::test]
    async fn context_view_serializes_slots_and_summary() {
        let svc = service().await;
        let view = svc.context("scada-equipment-filler-1").unwrap();
        assert_eq!(view.relationship_count, 3);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["startId"], "scada-equipment-filler-1");
        assert_eq!(json["equipment"]["elementId"], "scada-equipment-filler-1");
        assert_eq!(json["line"]["elementId"], "scada-line-1");
        assert_eq!(json["job"]["elementId"], "mes-job-1");
        assert_eq!(json["order"]["elementId"], "erp-order-1001");
        assert!(json.get("operator").is_none());
        assert_eq!(json["relationshipSummary"]["ForJob"], 1);
        assert_eq!(json["allRelationships"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn context_of_unknown_id_is_not_found() {
        let svc = service().await;
        assert!(svc.context("nonexistent-id").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn object_with_and_without_metadata() {
        let svc = service().await;
        let plain = svc.object("mes-job-1", false).unwrap();
        assert_eq!(plain.role, Role::Job);
        assert!(plain.metadata.is_none());

        let rich = svc.object("scada-line-1", true).unwrap();
        let meta = rich.metadata.expect("metadata");
        assert_eq!(meta.child_count, 1);
        assert_eq!(meta.snapshot_version, 1);

        let json = serde_json::to_value(svc.object("mes-job-1", true).unwrap()).unwrap();
        assert_eq!(json["elementId"], "mes-job-1");
        assert_eq!(json["role"], "Job");
        assert_eq!(json["metadata"]["classification"]["rule"], "TypeId");
    }

    #[tokio::test]
    async fn relationships_filter_by_type() {
        let svc = service().await;
        let all = svc.relationships("mes-job-1", None).unwrap();
        assert_eq!(all.relationships.len(), 2);
        assert_eq!(all.targets.len(), 2);

        let one = svc.relationships("mes-job-1", Some("executedOn")).unwrap();
        assert_eq!(one.relationships.len(), 1);
        assert_eq!(one.targets, vec![ElementId::from("scada-equipment-filler-1")]);

        assert!(svc.relationships("missing", None).unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn search_children_parent_hierarchy() {
        let svc = service().await;
        let hits = svc.search("filler", None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].match_location, "ID");

        let kids = svc.children("scada-line-1").unwrap();
        assert_eq!(kids[0].instance.element_id.as_str(), "scada-equipment-filler-1");
        let parent = svc.parent("scada-equipment-filler-1").unwrap().unwrap();
        assert_eq!(parent.instance.element_id.as_str(), "scada-line-1");

        let lines = svc.hierarchy(None).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].equipment.len(), 1);
    }

    #[tokio::test]
    async fn namespaces_are_deduplicated() {
        struct NsSource(&'static str);

        #[async_trait::async_trait]
        impl SourceAdapter for NsSource {
            fn name(&self) -> &str {
                self.0
            }

            async fn fetch(&self) -> mfgraph_sources::FetchOutcome {
                let mut outcome = mfgraph_sources::FetchOutcome::new(self.0);
                outcome.namespaces = vec![Namespace {
                    uri: "urn:plant".into(),
                    display_name: None,
                    source: self.0.into(),
                }];
                outcome.instances = vec![Instance::new(format!("{}-x", self.0))];
                outcome
            }
        }

        let cache = GraphCache::new(
            vec![
                Arc::new(NsSource("a")) as Arc<dyn SourceAdapter>,
                Arc::new(NsSource("b")) as Arc<dyn SourceAdapter>,
            ],
            &CacheConfig::default(),
        );
        cache.initialize().await.unwrap();
        let svc = QueryService::new(cache, &CacheConfig::default());
        let namespaces = svc.namespaces();
        assert_eq!(namespaces.len(), 1);
        assert_eq!(namespaces[0].source, "a");
    }

    #[tokio::test]
    async fn request_refresh_rebuilds_in_background() {
        let svc = service().await;
        let status = svc.request_refresh();
        assert_eq!(status.version, 1);

        for _ in 0..100 {
            if svc.status().version == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(svc.status().version, 2);
    }

    #[tokio::test]
    async fn degraded_source_leaves_job_slot_empty() {
        let cache = cache_of(&[erp(), MockSource::down("mes"), scada()]);
        cache.initialize().await.unwrap();
        let svc = QueryService::new(cache, &CacheConfig::default());

        let view = svc.context("scada-line-1").unwrap();
        assert!(view.context.job.is_none());
        assert!(view.context.equipment.is_some());

        // The order still resolves; its reference to the missing job is kept as declared.
        let order = svc.object("erp-order-1001", false).unwrap();
        assert_eq!(
            order.instance.relationships["ForJob"][0].direction,
            Direction::Outgoing
        );
    }
}
