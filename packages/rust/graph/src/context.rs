//! Bounded breadth-first context assembly.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;
use tracing::debug;

use mfgraph_shared::{Edge, ElementId, Instance, MfGraphError, Result, Role};

use crate::index::GraphSnapshot;

/// Default traversal depth.
pub const MAX_HOPS: usize = 4;

/// Default cap on visited nodes, independent of the hop budget.
pub const MAX_VISITED: usize = 10_000;

// ---------------------------------------------------------------------------
// ManufacturingContext
// ---------------------------------------------------------------------------

/// Role slots discovered around a starting element.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManufacturingContext {
    pub start_id: ElementId,
    pub snapshot_version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equipment: Option<Instance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<Instance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<Instance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Instance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material_batch: Option<Instance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<Instance>,
    /// Every edge walked during traversal, in discovery order.
    pub all_relationships: Vec<Edge>,
    /// Number of distinct nodes visited, the start included.
    pub visited: usize,
    /// Set when the visited-node cap stopped traversal early.
    pub truncated: bool,
}

impl ManufacturingContext {
    fn new(start_id: ElementId, snapshot_version: u64) -> Self {
        Self {
            start_id,
            snapshot_version,
            equipment: None,
            line: None,
            job: None,
            order: None,
            material_batch: None,
            operator: None,
            all_relationships: Vec::new(),
            visited: 0,
            truncated: false,
        }
    }

    /// The slot a role fills, or `None` for roles without a slot.
    pub fn slot(&self, role: Role) -> Option<&Instance> {
        match role {
            Role::Equipment => self.equipment.as_ref(),
            Role::Line => self.line.as_ref(),
            Role::Job => self.job.as_ref(),
            Role::Order => self.order.as_ref(),
            Role::MaterialBatch => self.material_batch.as_ref(),
            Role::Operator => self.operator.as_ref(),
            Role::Sensor | Role::Unknown => None,
        }
    }

    fn slot_mut(&mut self, role: Role) -> Option<&mut Option<Instance>> {
        match role {
            Role::Equipment => Some(&mut self.equipment),
            Role::Line => Some(&mut self.line),
            Role::Job => Some(&mut self.job),
            Role::Order => Some(&mut self.order),
            Role::MaterialBatch => Some(&mut self.material_batch),
            Role::Operator => Some(&mut self.operator),
            Role::Sensor | Role::Unknown => None,
        }
    }

    /// Populated slots in fixed role order.
    pub fn populated_slots(&self) -> Vec<(Role, &Instance)> {
        [
            Role::Equipment,
            Role::Line,
            Role::Job,
            Role::Order,
            Role::MaterialBatch,
            Role::Operator,
        ]
        .into_iter()
        .filter_map(|role| self.slot(role).map(|inst| (role, inst)))
        .collect()
    }

    /// Edge count per relationship type.
    pub fn relationship_summary(&self) -> BTreeMap<String, usize> {
        let mut summary = BTreeMap::new();
        for edge in &self.all_relationships {
            *summary.entry(edge.relationship_type.clone()).or_insert(0) += 1;
        }
        summary
    }
}

// ---------------------------------------------------------------------------
// ContextBuilder
// ---------------------------------------------------------------------------

/// Breadth-first traversal over a snapshot, in both edge directions.
#[derive(Debug, Clone, Copy)]
pub struct ContextBuilder {
    max_hops: usize,
    max_visited: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self {
            max_hops: MAX_HOPS,
            max_visited: MAX_VISITED,
        }
    }
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    pub fn with_max_visited(mut self, max_visited: usize) -> Self {
        self.max_visited = max_visited.max(1);
        self
    }

    /// Assemble the manufacturing context around `start`.
    ///
    /// Nodes are visited closest-first; within one distance, in the order their
    /// connecting edges were inserted into the index. The first node of each
    /// role fills that role's slot.
    pub fn build(&self, start: &str, snapshot: &GraphSnapshot) -> Result<ManufacturingContext> {
        let start_node = snapshot
            .node_index(start)
            .ok_or_else(|| MfGraphError::not_found(start))?;

        let (start_instance, _) = snapshot.node(start_node);
        let mut ctx = ManufacturingContext::new(start_instance.element_id.clone(), snapshot.version());

        let mut visited = vec![false; snapshot.len()];
        let mut walked = vec![false; snapshot.edges().len()];
        let mut queue: VecDeque<(usize, usize)> = VecDeque::new();

        visited[start_node] = true;
        ctx.visited = 1;
        queue.push_back((start_node, 0));

        while let Some((node, depth)) = queue.pop_front() {
            let (instance, role) = snapshot.node(node);
            if let Some(slot) = ctx.slot_mut(role) {
                if slot.is_none() {
                    *slot = Some(instance.clone());
                }
            }

            if depth >= self.max_hops {
                continue;
            }

            for &e in snapshot.incident_of(node) {
                if walked[e] {
                    continue;
                }
                let (edge, s, t) = snapshot.edge_at(e);
                let next = if s == node { t } else { s };

                if !visited[next] {
                    if ctx.visited >= self.max_visited {
                        ctx.truncated = true;
                        continue;
                    }
                    visited[next] = true;
                    ctx.visited += 1;
                    queue.push_back((next, depth + 1));
                }

                walked[e] = true;
                ctx.all_relationships.push(edge.clone());
            }
        }

        debug!(
            start,
            visited = ctx.visited,
            edges = ctx.all_relationships.len(),
            truncated = ctx.truncated,
            "context built"
        );
        Ok(ctx)
    }
}
