//! Evidence graph: entities, weighted interactions and seed evidence for one run.
//!
//! Adjacency lists keyed by dense node index; memory is linear in the number of
//! entities plus interactions. The graph is mutable only until `freeze`, which
//! hands out a cheaply clonable read-only `SeededGraph`.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use reason_common::confidence::{aggregate_confidence, is_valid_confidence, weighted_merge};
use reason_common::{EntityKind, ReasonError, RelationKind, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::conflict::{check_merge, check_relation_sign, EdgeConflict};

// ---------------------------------------------------------------------------
// Entities and seed evidence
// ---------------------------------------------------------------------------

/// A biological object node. Immutable once added to a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub kind: EntityKind,
    /// Optional seed carried in with the entity; applied through `seed`.
    #[serde(default)]
    pub seed: Option<SeedInput>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedInput {
    pub value: f64,
    pub source_tag: String,
}

impl Entity {
    pub fn new(id: impl Into<String>, kind: EntityKind) -> Self {
        Self { id: id.into(), kind, seed: None, confidence: None }
    }

    pub fn with_seed(mut self, value: f64, source_tag: impl Into<String>) -> Self {
        self.seed = Some(SeedInput { value, source_tag: source_tag.into() });
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Accumulated seed evidence for one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeedEvidence {
    /// Confidence-weighted running mean of every value seeded so far
    pub value: f64,
    /// Noisy-OR of the confidences seen
    pub confidence: f64,
    /// Cumulative confidence weight behind `value`
    pub weight: f64,
    pub sources: Vec<String>,
}

// ---------------------------------------------------------------------------
// Interactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub source_db: Option<String>,
    pub literature_confidence: Option<f64>,
}

impl Provenance {
    /// Weight given to this interaction when averaging duplicates.
    pub fn merge_weight(&self) -> f64 {
        self.literature_confidence.unwrap_or(1.0)
    }
}

/// Interaction as supplied by callers, addressed by entity id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub from: String,
    pub to: String,
    pub kind: RelationKind,
    /// In [-1, 1]; sign encodes activation/inhibition
    pub weight: f64,
    #[serde(default = "default_directed")]
    pub directed: bool,
    #[serde(default)]
    pub provenance: Provenance,
}

fn default_directed() -> bool { true }

impl Interaction {
    pub fn directed(from: impl Into<String>, to: impl Into<String>, kind: RelationKind, weight: f64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            kind,
            weight,
            directed: true,
            provenance: Provenance::default(),
        }
    }

    pub fn undirected(a: impl Into<String>, b: impl Into<String>, kind: RelationKind, weight: f64) -> Self {
        Self { directed: false, ..Self::directed(a, b, kind, weight) }
    }

    pub fn with_provenance(mut self, source_db: Option<String>, literature_confidence: Option<f64>) -> Self {
        self.provenance = Provenance { source_db, literature_confidence };
        self
    }
}

/// Stored edge, addressed by node index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub from: usize,
    pub to: usize,
    pub kind: RelationKind,
    pub weight: f64,
    pub directed: bool,
    pub provenance: Provenance,
    /// Cumulative provenance confidence behind `weight`
    pub merge_weight: f64,
    /// Number of input interactions merged into this edge
    pub merged: u32,
}

/// Identity of an edge for merging. Directedness is part of the key: a
/// directed and an undirected interaction over the same pair and kind are
/// kept as two edges and both propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EdgeKey {
    from: usize,
    to: usize,
    kind: RelationKind,
    directed: bool,
}

impl EdgeKey {
    fn new(from: usize, to: usize, kind: RelationKind, directed: bool) -> Self {
        // Undirected edges are stored under a canonical endpoint order
        let (from, to) = if directed || from <= to { (from, to) } else { (to, from) };
        Self { from, to, kind, directed }
    }
}

/// Result of `add_interaction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeInsert {
    Inserted(usize),
    Merged(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

#[derive(Debug, Clone, Copy)]
struct Adj {
    node: usize,
    edge: usize,
}

// ---------------------------------------------------------------------------
// EvidenceGraph
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct EvidenceGraph {
    entities: Vec<Entity>,
    index: HashMap<String, usize>,
    seeds: Vec<Option<SeedEvidence>>,
    edges: Vec<Edge>,
    edge_index: HashMap<EdgeKey, usize>,
    out_adj: Vec<Vec<Adj>>,
    in_adj: Vec<Vec<Adj>>,
    conflicts: Vec<EdgeConflict>,
}

impl EvidenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(entities: usize, edges: usize) -> Self {
        Self {
            entities: Vec::with_capacity(entities),
            index: HashMap::with_capacity(entities),
            seeds: Vec::with_capacity(entities),
            edges: Vec::with_capacity(edges),
            edge_index: HashMap::with_capacity(edges),
            out_adj: Vec::with_capacity(entities),
            in_adj: Vec::with_capacity(entities),
            conflicts: Vec::new(),
        }
    }

    /// Add an entity. Re-adding an id with the same kind is a no-op apart from
    /// merging any seed it carries; a different kind is a `DuplicateEntity`.
    pub fn add_entity(&mut self, entity: Entity) -> Result<()> {
        if let Some(c) = entity.confidence {
            if !is_valid_confidence(c) {
                return Err(ReasonError::InvalidEvidence(format!(
                    "entity {} has confidence {c} outside [0, 1]",
                    entity.id
                )));
            }
        }

        if let Some(&idx) = self.index.get(&entity.id) {
            let existing = self.entities[idx].kind;
            if existing != entity.kind {
                return Err(ReasonError::DuplicateEntity {
                    id: entity.id,
                    existing: existing.to_string(),
                    attempted: entity.kind.to_string(),
                });
            }
        } else {
            let idx = self.entities.len();
            self.index.insert(entity.id.clone(), idx);
            self.entities.push(Entity { seed: None, ..entity.clone() });
            self.seeds.push(None);
            self.out_adj.push(Vec::new());
            self.in_adj.push(Vec::new());
        }

        if let Some(seed) = entity.seed {
            let confidence = entity.confidence.unwrap_or(1.0);
            self.seed_tagged(&entity.id, seed.value, confidence, Some(seed.source_tag))?;
        }
        Ok(())
    }

    /// Add an interaction between two known entities, merging duplicates
    /// (same endpoints, kind and directedness) by provenance-weighted averaging.
    /// A directed and an undirected interaction never merge with each other.
    pub fn add_interaction(&mut self, interaction: Interaction) -> Result<EdgeInsert> {
        let from = self.require(&interaction.from)?;
        let to = self.require(&interaction.to)?;

        if !(interaction.weight.is_finite() && (-1.0..=1.0).contains(&interaction.weight)) {
            return Err(ReasonError::InvalidEvidence(format!(
                "interaction {} -> {} has weight {} outside [-1, 1]",
                interaction.from, interaction.to, interaction.weight
            )));
        }
        if let Some(c) = interaction.provenance.literature_confidence {
            if !is_valid_confidence(c) {
                return Err(ReasonError::InvalidEvidence(format!(
                    "interaction {} -> {} has provenance confidence {c} outside [0, 1]",
                    interaction.from, interaction.to
                )));
            }
        }

        if let Some(conflict_type) = check_relation_sign(interaction.kind, interaction.weight) {
            let conflict = EdgeConflict::new(&interaction, conflict_type);
            warn!(from = %interaction.from, to = %interaction.to, kind = %interaction.kind, "{}", conflict.detail);
            self.conflicts.push(conflict);
        }

        let key = EdgeKey::new(from, to, interaction.kind, interaction.directed);
        let incoming_weight = interaction.provenance.merge_weight();

        if let Some(&edge_idx) = self.edge_index.get(&key) {
            let edge = &mut self.edges[edge_idx];
            if let Some(conflict_type) = check_merge(edge.weight, interaction.weight) {
                let conflict = EdgeConflict::new(&interaction, conflict_type);
                warn!(from = %interaction.from, to = %interaction.to, "{}", conflict.detail);
                self.conflicts.push(conflict);
            }
            let (weight, merge_weight) =
                weighted_merge(edge.weight, edge.merge_weight, interaction.weight, incoming_weight);
            edge.weight = weight;
            edge.merge_weight = merge_weight;
            edge.merged += 1;
            edge.provenance.literature_confidence = match (
                edge.provenance.literature_confidence,
                interaction.provenance.literature_confidence,
            ) {
                (Some(a), Some(b)) => Some(aggregate_confidence(&[a, b])),
                (a, b) => a.or(b),
            };
            if edge.provenance.source_db.is_none() {
                edge.provenance.source_db = interaction.provenance.source_db;
            }
            debug!(edge = edge_idx, weight, merged = edge.merged, "Merged duplicate interaction");
            return Ok(EdgeInsert::Merged(edge_idx));
        }

        let edge_idx = self.edges.len();
        self.edges.push(Edge {
            from,
            to,
            kind: interaction.kind,
            weight: interaction.weight,
            directed: interaction.directed,
            provenance: interaction.provenance,
            merge_weight: incoming_weight,
            merged: 1,
        });
        self.edge_index.insert(key, edge_idx);

        self.out_adj[from].push(Adj { node: to, edge: edge_idx });
        self.in_adj[to].push(Adj { node: from, edge: edge_idx });
        if !interaction.directed {
            self.out_adj[to].push(Adj { node: from, edge: edge_idx });
            self.in_adj[from].push(Adj { node: to, edge: edge_idx });
        }
        Ok(EdgeInsert::Inserted(edge_idx))
    }

    /// Seed an entity with evidence. Re-seeding merges into a confidence-weighted
    /// running mean, so repeated calls settle instead of oscillating.
    pub fn seed(&mut self, entity_id: &str, value: f64, confidence: f64) -> Result<()> {
        self.seed_tagged(entity_id, value, confidence, None)
    }

    pub fn seed_tagged(
        &mut self,
        entity_id: &str,
        value: f64,
        confidence: f64,
        source_tag: Option<String>,
    ) -> Result<()> {
        let idx = self.require(entity_id)?;
        if !value.is_finite() {
            return Err(ReasonError::InvalidEvidence(format!("seed for {entity_id} is not finite")));
        }
        if !is_valid_confidence(confidence) {
            return Err(ReasonError::InvalidEvidence(format!(
                "seed confidence {confidence} for {entity_id} outside [0, 1]"
            )));
        }

        let slot = &mut self.seeds[idx];
        match slot {
            Some(existing) => {
                let (merged, weight) = weighted_merge(existing.value, existing.weight, value, confidence);
                existing.value = merged;
                existing.weight = weight;
                existing.confidence = aggregate_confidence(&[existing.confidence, confidence]);
                if let Some(tag) = source_tag {
                    if !existing.sources.contains(&tag) {
                        existing.sources.push(tag);
                    }
                }
            }
            None => {
                *slot = Some(SeedEvidence {
                    value,
                    confidence,
                    weight: confidence,
                    sources: source_tag.into_iter().collect(),
                });
            }
        }
        Ok(())
    }

    /// Lazy, restartable neighbour iterator.
    pub fn neighbors(&self, entity_id: &str, direction: Direction) -> Result<Neighbors<'_>> {
        let idx = self.require(entity_id)?;
        Ok(self.neighbors_at(idx, direction))
    }

    pub fn neighbors_at(&self, idx: usize, direction: Direction) -> Neighbors<'_> {
        let (primary, secondary): (&[Adj], &[Adj]) = match direction {
            Direction::Outgoing => (&self.out_adj[idx], &[]),
            Direction::Incoming => (&self.in_adj[idx], &[]),
            Direction::Both => (&self.out_adj[idx], &self.in_adj[idx]),
        };
        Neighbors {
            graph: self,
            primary: primary.iter(),
            secondary: secondary.iter(),
        }
    }

    fn require(&self, id: &str) -> Result<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| ReasonError::UnknownEntity(id.to_string()))
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.index_of(id).map(|i| &self.entities[i])
    }

    pub fn entity_at(&self, idx: usize) -> &Entity {
        &self.entities[idx]
    }

    /// Entities in insertion order, the stable node order used by propagation.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn seed_of(&self, id: &str) -> Option<&SeedEvidence> {
        self.index_of(id).and_then(|i| self.seeds[i].as_ref())
    }

    /// Seed value at a node index, 0.0 when unseeded.
    pub fn seed_value_at(&self, idx: usize) -> f64 {
        self.seeds[idx].as_ref().map(|s| s.value).unwrap_or(0.0)
    }

    pub fn seeded_count(&self) -> usize {
        self.seeds.iter().filter(|s| s.is_some()).count()
    }

    /// Sum of absolute outgoing weights; 1.0 for nodes without outgoing weight.
    pub fn outdegree_norm(&self, idx: usize) -> f64 {
        let sum: f64 = self.out_adj[idx].iter().map(|a| self.edges[a.edge].weight.abs()).sum();
        if sum > 0.0 { sum } else { 1.0 }
    }

    /// Sign and relation conflicts recorded while loading.
    pub fn conflicts(&self) -> &[EdgeConflict] {
        &self.conflicts
    }

    /// End the seeding phase.
    pub fn freeze(self) -> SeededGraph {
        debug!(
            entities = self.entities.len(),
            edges = self.edges.len(),
            seeded = self.seeded_count(),
            "Evidence graph frozen"
        );
        SeededGraph { inner: Arc::new(self) }
    }
}

// ---------------------------------------------------------------------------
// Neighbour iteration
// ---------------------------------------------------------------------------

/// Iterator over (neighbour, edge) pairs. Clone it to restart.
#[derive(Clone)]
pub struct Neighbors<'a> {
    graph: &'a EvidenceGraph,
    primary: std::slice::Iter<'a, Adj>,
    secondary: std::slice::Iter<'a, Adj>,
}

impl<'a> Iterator for Neighbors<'a> {
    type Item = (&'a Entity, &'a Edge);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(adj) = self.primary.next() {
            return Some((&self.graph.entities[adj.node], &self.graph.edges[adj.edge]));
        }
        // Undirected edges were already yielded from the outgoing list
        for adj in self.secondary.by_ref() {
            let edge = &self.graph.edges[adj.edge];
            if edge.directed {
                return Some((&self.graph.entities[adj.node], edge));
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Frozen snapshot
// ---------------------------------------------------------------------------

/// Read-only graph after seeding; shared across propagation workers and runs.
#[derive(Debug, Clone)]
pub struct SeededGraph {
    inner: Arc<EvidenceGraph>,
}

impl Deref for SeededGraph {
    type Target = EvidenceGraph;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gene(id: &str) -> Entity {
        Entity::new(id, EntityKind::Gene)
    }

    #[test]
    fn test_duplicate_entity_with_conflicting_kind() {
        let mut g = EvidenceGraph::new();
        g.add_entity(gene("SNCA")).unwrap();
        let err = g.add_entity(Entity::new("SNCA", EntityKind::Pathway)).unwrap_err();
        assert!(matches!(err, ReasonError::DuplicateEntity { .. }));
        // Same kind is idempotent
        g.add_entity(gene("SNCA")).unwrap();
        assert_eq!(g.entity_count(), 1);
    }

    #[test]
    fn test_directed_and_undirected_edges_stay_apart() {
        let mut g = EvidenceGraph::new();
        g.add_entity(gene("LRRK2")).unwrap();
        g.add_entity(gene("GBA")).unwrap();
        let a = g.add_interaction(Interaction::directed("LRRK2", "GBA", RelationKind::Binds, 0.4)).unwrap();
        let b = g.add_interaction(Interaction::undirected("GBA", "LRRK2", RelationKind::Binds, 0.4)).unwrap();
        assert_eq!((a, b), (EdgeInsert::Inserted(0), EdgeInsert::Inserted(1)));
        assert_eq!(g.edge_count(), 2);

        // Same directedness merges regardless of endpoint order
        let c = g.add_interaction(Interaction::undirected("LRRK2", "GBA", RelationKind::Binds, 0.6)).unwrap();
        assert_eq!(c, EdgeInsert::Merged(1));
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn test_interaction_requires_known_endpoints() {
        let mut g = EvidenceGraph::new();
        g.add_entity(gene("LRRK2")).unwrap();
        let err = g
            .add_interaction(Interaction::directed("LRRK2", "PINK1", RelationKind::Activates, 0.5))
            .unwrap_err();
        assert!(matches!(err, ReasonError::UnknownEntity(id) if id == "PINK1"));
    }

    #[test]
    fn test_interaction_weight_out_of_range() {
        let mut g = EvidenceGraph::new();
        g.add_entity(gene("A")).unwrap();
        g.add_entity(gene("B")).unwrap();
        let err = g
            .add_interaction(Interaction::directed("A", "B", RelationKind::Binds, 1.5))
            .unwrap_err();
        assert!(matches!(err, ReasonError::InvalidEvidence(_)));
    }

    #[test]
    fn test_duplicate_interactions_merge_by_provenance_confidence() {
        let mut g = EvidenceGraph::new();
        g.add_entity(gene("A")).unwrap();
        g.add_entity(gene("B")).unwrap();
        let first = Interaction::directed("A", "B", RelationKind::Activates, 0.9)
            .with_provenance(Some("reactome".into()), Some(0.75));
        let second = Interaction::directed("A", "B", RelationKind::Activates, 0.1)
            .with_provenance(None, Some(0.25));
        assert_eq!(g.add_interaction(first).unwrap(), EdgeInsert::Inserted(0));
        assert_eq!(g.add_interaction(second).unwrap(), EdgeInsert::Merged(0));

        let edge = &g.edges()[0];
        assert!((edge.weight - 0.7).abs() < 1e-12);
        assert_eq!(edge.merged, 2);
        assert_eq!(edge.provenance.source_db.as_deref(), Some("reactome"));
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn test_same_pair_different_kind_kept_separate() {
        let mut g = EvidenceGraph::new();
        g.add_entity(gene("A")).unwrap();
        g.add_entity(gene("B")).unwrap();
        g.add_interaction(Interaction::directed("A", "B", RelationKind::Activates, 0.5)).unwrap();
        g.add_interaction(Interaction::directed("A", "B", RelationKind::Binds, 0.3)).unwrap();
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn test_undirected_duplicates_merge_regardless_of_endpoint_order() {
        let mut g = EvidenceGraph::new();
        g.add_entity(gene("A")).unwrap();
        g.add_entity(gene("B")).unwrap();
        g.add_interaction(Interaction::undirected("A", "B", RelationKind::Binds, 0.4)).unwrap();
        let second = g.add_interaction(Interaction::undirected("B", "A", RelationKind::Binds, 0.6)).unwrap();
        assert_eq!(second, EdgeInsert::Merged(0));
        assert!((g.edges()[0].weight - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_seed_unknown_entity() {
        let mut g = EvidenceGraph::new();
        assert!(matches!(g.seed("GBA", 1.0, 0.9), Err(ReasonError::UnknownEntity(_))));
    }

    #[test]
    fn test_reseed_is_confidence_weighted() {
        let mut g = EvidenceGraph::new();
        g.add_entity(gene("GBA")).unwrap();
        g.seed("GBA", 2.0, 0.8).unwrap();
        g.seed("GBA", 0.0, 0.2).unwrap();
        let seed = g.seed_of("GBA").unwrap();
        assert!((seed.value - 1.6).abs() < 1e-12);
        assert!((seed.weight - 1.0).abs() < 1e-12);

        // Repeating the same seed leaves the value where it is
        let mut h = EvidenceGraph::new();
        h.add_entity(gene("GBA")).unwrap();
        h.seed("GBA", 1.5, 0.6).unwrap();
        h.seed("GBA", 1.5, 0.6).unwrap();
        assert!((h.seed_of("GBA").unwrap().value - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_entity_seed_applied_on_add() {
        let mut g = EvidenceGraph::new();
        g.add_entity(gene("SNCA").with_seed(1.2, "rnaseq").with_confidence(0.9)).unwrap();
        let seed = g.seed_of("SNCA").unwrap();
        assert_eq!(seed.value, 1.2);
        assert_eq!(seed.sources, vec!["rnaseq".to_string()]);
        assert!(g.entity("SNCA").unwrap().seed.is_none());
    }

    #[test]
    fn test_neighbors_directions_and_restart() {
        let mut g = EvidenceGraph::new();
        for id in ["A", "B", "C"] {
            g.add_entity(gene(id)).unwrap();
        }
        g.add_interaction(Interaction::directed("A", "B", RelationKind::Activates, 0.8)).unwrap();
        g.add_interaction(Interaction::undirected("B", "C", RelationKind::Binds, 0.5)).unwrap();

        let out: Vec<&str> = g.neighbors("B", Direction::Outgoing).unwrap().map(|(e, _)| e.id.as_str()).collect();
        assert_eq!(out, vec!["C"]);

        let incoming: Vec<&str> = g.neighbors("B", Direction::Incoming).unwrap().map(|(e, _)| e.id.as_str()).collect();
        assert_eq!(incoming, vec!["A", "C"]);

        let both = g.neighbors("B", Direction::Both).unwrap();
        let first: Vec<&str> = both.clone().map(|(e, _)| e.id.as_str()).collect();
        let second: Vec<&str> = both.map(|(e, _)| e.id.as_str()).collect();
        assert_eq!(first, vec!["C", "A"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_outdegree_norm_guards_isolated_nodes() {
        let mut g = EvidenceGraph::new();
        g.add_entity(gene("A")).unwrap();
        g.add_entity(gene("B")).unwrap();
        g.add_interaction(Interaction::directed("A", "B", RelationKind::Inhibits, -0.6)).unwrap();
        assert!((g.outdegree_norm(0) - 0.6).abs() < 1e-12);
        assert_eq!(g.outdegree_norm(1), 1.0);
    }

    #[test]
    fn test_freeze_shares_snapshot() {
        let mut g = EvidenceGraph::new();
        g.add_entity(gene("A")).unwrap();
        let frozen = g.freeze();
        let clone = frozen.clone();
        assert_eq!(clone.entity_count(), 1);
        assert!(std::ptr::eq(&*frozen as *const EvidenceGraph, &*clone as *const EvidenceGraph));
    }
}
