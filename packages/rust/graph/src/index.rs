//! Immutable graph snapshot with forward/reverse adjacency.
//!
//! [`GraphSnapshot::build`] is a pure function of its input: it merges duplicate
//! ids, turns every declared relationship and every `parent_id` into a
//! deduplicated [`Edge`], indexes the edges in both directions, and writes them
//! back into both endpoints' relationship maps. Once built, a snapshot is never
//! mutated.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use mfgraph_shared::{
    Direction, Edge, ElementId, Instance, Namespace, Role, SnapshotId, TypeDeclaration,
};

use crate::classifier::classify;

/// Relationship type materialized for `parent_id` (child → parent).
pub const HAS_PARENT: &str = "HasParent";

/// Declared relationship types that are the inverse of a canonical type.
/// `(declared, canonical)`: a declared `A -declared-> B` is stored as `B -canonical-> A`.
const INVERSE_TYPES: &[(&str, &str)] = &[("HasChildren", HAS_PARENT)];

// ---------------------------------------------------------------------------
// Input & stats
// ---------------------------------------------------------------------------

/// Everything a snapshot is built from.
#[derive(Debug, Clone, Default)]
pub struct SnapshotInput {
    pub instances: Vec<Instance>,
    pub namespaces: Vec<Namespace>,
    pub types: Vec<TypeDeclaration>,
}

impl From<Vec<Instance>> for SnapshotInput {
    fn from(instances: Vec<Instance>) -> Self {
        Self {
            instances,
            ..Default::default()
        }
    }
}

/// Counters describing a built snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStats {
    pub instances: usize,
    pub edges: usize,
    /// Declared relationships whose other endpoint is not in the snapshot.
    pub dangling_references: usize,
    /// Input records merged into an earlier record with the same id.
    pub merged_duplicates: usize,
    pub roles: BTreeMap<Role, usize>,
}

// ---------------------------------------------------------------------------
// GraphSnapshot
// ---------------------------------------------------------------------------

/// A fully built, read-only graph.
#[derive(Debug, Clone)]
pub struct GraphSnapshot {
    id: SnapshotId,
    version: u64,
    built_at: DateTime<Utc>,
    instances: Vec<Instance>,
    roles: Vec<Role>,
    by_id: HashMap<ElementId, usize>,
    edges: Vec<Edge>,
    /// (source node, target node) per edge.
    edge_nodes: Vec<(usize, usize)>,
    /// Edge indices touching each node, in global edge insertion order.
    incident: Vec<Vec<usize>>,
    forward: Vec<HashMap<String, Vec<usize>>>,
    reverse: Vec<HashMap<String, Vec<usize>>>,
    children: Vec<Vec<usize>>,
    namespaces: Vec<Namespace>,
    types: Vec<TypeDeclaration>,
    stats: SnapshotStats,
}

impl GraphSnapshot {
    /// Build a snapshot from a bare instance set.
    pub fn build(instances: Vec<Instance>) -> Self {
        Self::build_from(SnapshotInput::from(instances))
    }

    /// A snapshot with no instances (served before the first rebuild).
    pub fn empty() -> Self {
        Self::build(Vec::new())
    }

    /// Build a snapshot from instances plus namespace/type metadata.
    pub fn build_from(input: SnapshotInput) -> Self {
        let SnapshotInput {
            instances: raw,
            namespaces,
            types,
        } = input;

        // 1. Merge duplicate ids (first record wins for scalar fields).
        let mut instances: Vec<Instance> = Vec::with_capacity(raw.len());
        let mut by_id: HashMap<ElementId, usize> = HashMap::with_capacity(raw.len());
        let mut merged_duplicates = 0;
        for inst in raw {
            match by_id.get(&inst.element_id) {
                Some(&existing) => {
                    merged_duplicates += 1;
                    debug!(element_id = %inst.element_id, "merging duplicate instance");
                    merge_into(&mut instances[existing], inst);
                }
                None => {
                    by_id.insert(inst.element_id.clone(), instances.len());
                    instances.push(inst);
                }
            }
        }

        let n = instances.len();
        let mut edges = Vec::new();
        let mut edge_nodes = Vec::new();
        let mut incident = vec![Vec::new(); n];
        let mut forward: Vec<HashMap<String, Vec<usize>>> = vec![HashMap::new(); n];
        let mut reverse: Vec<HashMap<String, Vec<usize>>> = vec![HashMap::new(); n];
        let mut seen: HashSet<(usize, String, usize)> = HashSet::new();
        let mut dangling_references = 0;

        // 2. Collect canonical edges in instance order, then relationship-type order.
        for (node, inst) in instances.iter().enumerate() {
            let mut candidates: Vec<(ElementId, String, ElementId)> = Vec::new();
            if let Some(parent) = &inst.parent_id {
                candidates.push((inst.element_id.clone(), HAS_PARENT.to_string(), parent.clone()));
            }
            for (relationship_type, refs) in &inst.relationships {
                for r in refs {
                    let (source, target) = match r.direction {
                        Direction::Outgoing => (inst.element_id.clone(), r.target.clone()),
                        Direction::Incoming => (r.target.clone(), inst.element_id.clone()),
                    };
                    candidates.push(canonicalize(source, relationship_type, target));
                }
            }

            for (source, relationship_type, target) in candidates {
                let (Some(&s), Some(&t)) = (by_id.get(&source), by_id.get(&target)) else {
                    dangling_references += 1;
                    debug!(
                        from = %instances[node].element_id,
                        %source,
                        %target,
                        %relationship_type,
                        "relationship endpoint missing from snapshot"
                    );
                    continue;
                };
                if !seen.insert((s, relationship_type.clone(), t)) {
                    continue;
                }

                let e = edges.len();
                incident[s].push(e);
                if s != t {
                    incident[t].push(e);
                }
                forward[s].entry(relationship_type.clone()).or_default().push(t);
                reverse[t].entry(relationship_type.clone()).or_default().push(s);
                edge_nodes.push((s, t));
                edges.push(Edge {
                    source,
                    relationship_type,
                    target,
                });
            }
        }

        // 3. Write every edge back into both endpoints' relationship maps.
        for (edge, &(s, t)) in edges.iter().zip(&edge_nodes) {
            instances[s].add_relationship(
                edge.relationship_type.clone(),
                Direction::Outgoing,
                edge.target.clone(),
            );
            instances[t].add_relationship(
                edge.relationship_type.clone(),
                Direction::Incoming,
                edge.source.clone(),
            );
        }

        // 4. Containment index from canonical HasParent edges; a child known only
        //    through HasChildren gets its parent_id filled in.
        let mut children = vec![Vec::new(); n];
        for (edge, &(s, t)) in edges.iter().zip(&edge_nodes) {
            if s == t || edge.relationship_type != HAS_PARENT {
                continue;
            }
            children[t].push(s);
            if instances[s].parent_id.is_none() {
                instances[s].parent_id = Some(edge.target.clone());
            }
        }

        let roles: Vec<Role> = instances.iter().map(classify).collect();
        let mut role_counts = BTreeMap::new();
        for role in &roles {
            *role_counts.entry(*role).or_insert(0) += 1;
        }

        let stats = SnapshotStats {
            instances: n,
            edges: edges.len(),
            dangling_references,
            merged_duplicates,
            roles: role_counts,
        };

        Self {
            id: SnapshotId::new(),
            version: 0,
            built_at: Utc::now(),
            instances,
            roles,
            by_id,
            edges,
            edge_nodes,
            incident,
            forward,
            reverse,
            children,
            namespaces,
            types,
            stats,
        }
    }

    /// Stamp the publication version (set once, before the snapshot is shared).
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    // -- metadata ----------------------------------------------------------

    pub fn id(&self) -> SnapshotId {
        self.id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn stats(&self) -> &SnapshotStats {
        &self.stats
    }

    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    pub fn types(&self) -> &[TypeDeclaration] {
        &self.types
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    // -- lookups -----------------------------------------------------------

    pub fn get(&self, element_id: &str) -> Option<&Instance> {
        self.by_id.get(element_id).map(|&i| &self.instances[i])
    }

    pub fn contains(&self, element_id: &str) -> bool {
        self.by_id.contains_key(element_id)
    }

    /// Role assigned to an instance at build time.
    pub fn role_of(&self, element_id: &str) -> Option<Role> {
        self.by_id.get(element_id).map(|&i| self.roles[i])
    }

    /// All instances in build order.
    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.instances.iter()
    }

    /// All instances with their roles, in build order.
    pub fn classified(&self) -> impl Iterator<Item = (&Instance, Role)> {
        self.instances.iter().zip(self.roles.iter().copied())
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Targets (outgoing) or sources (incoming) of `relationship_type` edges at `element_id`.
    pub fn neighbors(
        &self,
        element_id: &str,
        relationship_type: &str,
        direction: Direction,
    ) -> Vec<&ElementId> {
        let Some(&node) = self.by_id.get(element_id) else {
            return Vec::new();
        };
        let adjacency = match direction {
            Direction::Outgoing => &self.forward[node],
            Direction::Incoming => &self.reverse[node],
        };
        adjacency
            .get(relationship_type)
            .map(|nodes| {
                nodes
                    .iter()
                    .map(|&i| &self.instances[i].element_id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Edges touching `element_id`, in insertion order.
    pub fn incident_edges(&self, element_id: &str) -> Vec<&Edge> {
        self.by_id
            .get(element_id)
            .map(|&node| self.incident[node].iter().map(|&e| &self.edges[e]).collect())
            .unwrap_or_default()
    }

    /// Instances with a `HasParent` edge to `element_id`.
    pub fn children_of(&self, element_id: &str) -> Vec<&Instance> {
        self.by_id
            .get(element_id)
            .map(|&node| self.children[node].iter().map(|&c| &self.instances[c]).collect())
            .unwrap_or_default()
    }

    /// The instance named by `element_id`'s `parent_id`, if it is in the snapshot.
    /// A parent declared only through `HasChildren` is filled in at build time.
    pub fn parent_of(&self, element_id: &str) -> Option<&Instance> {
        let parent = self.get(element_id)?.parent_id.as_ref()?;
        self.get(parent.as_str())
    }

    // -- node-index access for traversal ------------------------------------

    pub(crate) fn node_index(&self, element_id: &str) -> Option<usize> {
        self.by_id.get(element_id).copied()
    }

    pub(crate) fn node(&self, node: usize) -> (&Instance, Role) {
        (&self.instances[node], self.roles[node])
    }

    pub(crate) fn incident_of(&self, node: usize) -> &[usize] {
        &self.incident[node]
    }

    pub(crate) fn edge_at(&self, edge: usize) -> (&Edge, usize, usize) {
        let (s, t) = self.edge_nodes[edge];
        (&self.edges[edge], s, t)
    }
}

impl Default for GraphSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

fn canonicalize(
    source: ElementId,
    relationship_type: &str,
    target: ElementId,
) -> (ElementId, String, ElementId) {
    match INVERSE_TYPES
        .iter()
        .find(|(declared, _)| declared.eq_ignore_ascii_case(relationship_type))
    {
        Some((_, canonical)) => (target, (*canonical).to_string(), source),
        None => (source, relationship_type.to_string(), target),
    }
}

/// Merge a duplicate record into the first one seen.
fn merge_into(first: &mut Instance, dup: Instance) {
    if first.name.is_none() {
        first.name = dup.name;
    }
    if first.type_id.is_none() {
        first.type_id = dup.type_id;
    }
    if first.parent_id.is_none() {
        first.parent_id = dup.parent_id;
    }
    if first.namespace.is_none() {
        first.namespace = dup.namespace;
    }
    for (key, value) in dup.attributes {
        first.attributes.entry(key).or_insert(value);
    }
    for (relationship_type, refs) in dup.relationships {
        for r in refs {
            first.add_relationship(relationship_type.clone(), r.direction, r.target);
        }
    }
}
