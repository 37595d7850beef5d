//! Ingestion records: the flat shapes data adapters hand to the graph.
//!
//! Records are validated on the way in by the graph itself; this module only
//! maps records onto `add_entity` / `add_interaction` / `seed` and counts what
//! happened.

use reason_common::{EntityKind, ReasonError, RelationKind, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::graph::{EdgeInsert, Entity, EvidenceGraph, Interaction};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub entity_id: String,
    pub entity_kind: EntityKind,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub source_tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub from_id: String,
    pub to_id: String,
    pub kind: RelationKind,
    pub weight: f64,
    #[serde(default)]
    pub provenance_confidence: Option<f64>,
    #[serde(default)]
    pub source_db: Option<String>,
    #[serde(default = "default_directed")]
    pub directed: bool,
}

fn default_directed() -> bool { true }

impl From<&InteractionRecord> for Interaction {
    fn from(r: &InteractionRecord) -> Self {
        let base = if r.directed {
            Interaction::directed(r.from_id.clone(), r.to_id.clone(), r.kind, r.weight)
        } else {
            Interaction::undirected(r.from_id.clone(), r.to_id.clone(), r.kind, r.weight)
        };
        base.with_provenance(r.source_db.clone(), r.provenance_confidence)
    }
}

/// Counts from one load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub entities: usize,
    pub seeds: usize,
    pub interactions_inserted: usize,
    pub interactions_merged: usize,
    pub conflicts: usize,
}

/// Load evidence then interactions into `graph`. Stops at the first invalid
/// record; the graph keeps whatever was loaded before it.
pub fn load_records(
    graph: &mut EvidenceGraph,
    evidence: &[EvidenceRecord],
    interactions: &[InteractionRecord],
) -> Result<LoadSummary> {
    let mut summary = LoadSummary::default();
    let entities_before = graph.entity_count();
    let conflicts_before = graph.conflicts().len();

    for record in evidence {
        graph.add_entity(Entity::new(record.entity_id.clone(), record.entity_kind))?;
        match (record.value, record.confidence) {
            (Some(value), confidence) => {
                graph.seed_tagged(
                    &record.entity_id,
                    value,
                    confidence.unwrap_or(1.0),
                    record.source_tag.clone(),
                )?;
                summary.seeds += 1;
            }
            (None, Some(_)) => {
                return Err(ReasonError::InvalidEvidence(format!(
                    "evidence record for {} has a confidence but no value",
                    record.entity_id
                )));
            }
            (None, None) => {}
        }
    }

    for record in interactions {
        match graph.add_interaction(Interaction::from(record))? {
            EdgeInsert::Inserted(_) => summary.interactions_inserted += 1,
            EdgeInsert::Merged(_) => summary.interactions_merged += 1,
        }
    }

    summary.entities = graph.entity_count() - entities_before;
    summary.conflicts = graph.conflicts().len() - conflicts_before;
    info!(
        entities = summary.entities,
        seeds = summary.seeds,
        inserted = summary.interactions_inserted,
        merged = summary.interactions_merged,
        conflicts = summary.conflicts,
        "Loaded evidence records"
    );
    Ok(summary)
}

impl EvidenceGraph {
    /// Build a fresh graph from records.
    pub fn from_records(
        evidence: &[EvidenceRecord],
        interactions: &[InteractionRecord],
    ) -> Result<(Self, LoadSummary)> {
        let mut graph = Self::with_capacity(evidence.len(), interactions.len());
        let summary = load_records(&mut graph, evidence, interactions)?;
        Ok((graph, summary))
    }
}
