//! Shared fixtures for REASON integration tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use reason_common::{CandidateKind, EntityKind, RelationKind};
use reason_engine::EvidenceBundle;
use reason_kg::{Entity, EvidenceGraph, EvidenceRecord, Interaction, InteractionRecord, SeededGraph};
use reason_ranker::{Candidate, CandidateRanker, CandidateSpec, ChannelScoreRecord, RankedList, UncertaintyInterval};
use reason_sim::{ScriptedSimulator, ValidationOutcome};

pub use pretty_assertions;

/// Install a test-friendly subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("reason=debug"))
        .with_test_writer()
        .try_init();
}

/// A(seed 1.0) → B (0.8) → C (0.5).
pub fn chain_graph() -> SeededGraph {
    let mut g = EvidenceGraph::new();
    for id in ["A", "B", "C"] {
        g.add_entity(Entity::new(id, EntityKind::Gene)).expect("fresh entity");
    }
    g.seed("A", 1.0, 1.0).expect("known entity");
    g.add_interaction(Interaction::directed("A", "B", RelationKind::Activates, 0.8))
        .expect("known endpoints");
    g.add_interaction(Interaction::directed("B", "C", RelationKind::Activates, 0.5))
        .expect("known endpoints");
    g.freeze()
}

/// A fused candidate with a symmetric interval of `half` around `score`.
pub fn candidate(id: &str, kind: CandidateKind, score: f64, half: f64) -> Candidate {
    Candidate {
        entity_id: id.to_string(),
        kind,
        channels: BTreeMap::new(),
        composite_score: score,
        uncertainty: UncertaintyInterval::around(score, half),
        rank: None,
        audit: Vec::new(),
    }
}

/// Ranked lists for every kind, with the given drug scores.
pub fn ranked_drugs(scores: &[(&str, f64)]) -> BTreeMap<CandidateKind, RankedList> {
    let candidates = scores
        .iter()
        .map(|(id, s)| candidate(id, CandidateKind::Drug, *s, 0.1))
        .collect();
    CandidateRanker::new().rank_all(candidates)
}

/// Simulator that contradicts the given candidates and confirms the rest.
pub fn contradicting(ids: &[&str]) -> Arc<ScriptedSimulator> {
    let sim = ids
        .iter()
        .fold(ScriptedSimulator::new(), |sim, id| sim.respond(id, ValidationOutcome::Contradicted, -0.6));
    Arc::new(sim)
}

fn evidence(id: &str, kind: EntityKind, seed: Option<(f64, f64)>) -> EvidenceRecord {
    EvidenceRecord {
        entity_id: id.to_string(),
        entity_kind: kind,
        value: seed.map(|(v, _)| v),
        confidence: seed.map(|(_, c)| c),
        source_tag: seed.map(|_| "transcriptomics".to_string()),
    }
}

fn link(from: &str, to: &str, kind: RelationKind, weight: f64, conf: f64) -> InteractionRecord {
    InteractionRecord {
        from_id: from.to_string(),
        to_id: to.to_string(),
        kind,
        weight,
        provenance_confidence: Some(conf),
        source_db: Some("reactome".to_string()),
        directed: true,
    }
}

fn score(candidate: &str, channel: &str, value: f64, confidence: f64) -> ChannelScoreRecord {
    ChannelScoreRecord {
        candidate_id: candidate.to_string(),
        channel_name: channel.to_string(),
        normalized_score: value,
        confidence,
    }
}

/// Small Parkinson's disease evidence bundle: three targets, three drugs, one
/// treatment and two pathways.
pub fn parkinson_bundle() -> EvidenceBundle {
    use EntityKind::*;
    use RelationKind::*;

    EvidenceBundle {
        disease: "Parkinson disease".to_string(),
        entities: vec![
            evidence("SNCA", Gene, Some((2.4, 0.9))),
            evidence("LRRK2", Gene, Some((1.6, 0.8))),
            evidence("GBA", Gene, Some((0.9, 0.7))),
            evidence("PINK1", Gene, None),
            evidence("dopamine", Metabolite, Some((-1.2, 0.6))),
            evidence("mitophagy", Pathway, None),
            evidence("dopamine_synthesis", Pathway, None),
            evidence("levodopa", Compound, None),
            evidence("ambroxol", Compound, None),
            evidence("DNL151", Compound, None),
            evidence("DBS", Treatment, None),
        ],
        interactions: vec![
            link("SNCA", "LRRK2", Activates, 0.6, 0.8),
            link("LRRK2", "PINK1", Inhibits, -0.4, 0.6),
            link("PINK1", "mitophagy", ParticipatesIn, 0.9, 0.9),
            link("GBA", "SNCA", Inhibits, -0.5, 0.7),
            link("dopamine", "dopamine_synthesis", ParticipatesIn, 0.8, 0.9),
            link("levodopa", "dopamine", Activates, 0.9, 0.95),
            link("ambroxol", "GBA", Activates, 0.5, 0.6),
            link("DNL151", "LRRK2", Inhibits, -0.8, 0.85),
            link("DBS", "dopamine_synthesis", Regulates, 0.3, 0.5),
        ],
        channel_scores: vec![
            score("levodopa", "docking", 0.82, 0.9),
            score("ambroxol", "docking", 0.55, 0.7),
            score("DNL151", "docking", 0.74, 0.8),
            score("levodopa", "literature", 0.95, 0.95),
            score("ambroxol", "literature", 0.40, 0.6),
            score("SNCA", "omics_significance", 0.9, 0.9),
            score("LRRK2", "omics_significance", 0.7, 0.8),
            score("LRRK2", "structural_tractability", 0.8, 0.9),
            score("GBA", "structural_tractability", 0.6, 0.7),
            score("DBS", "literature", 0.7, 0.8),
        ],
        candidates: vec![
            CandidateSpec::new("SNCA", CandidateKind::Target),
            CandidateSpec::new("LRRK2", CandidateKind::Target),
            CandidateSpec::new("GBA", CandidateKind::Target),
            CandidateSpec::new("levodopa", CandidateKind::Drug),
            CandidateSpec::new("ambroxol", CandidateKind::Drug),
            CandidateSpec::new("DNL151", CandidateKind::Drug),
            CandidateSpec::new("DBS", CandidateKind::Treatment),
        ],
        known: None,
    }
}
