//! Final run report.
//!
//! Carries no run id or timestamp, so two runs over the same inputs serialize
//! byte-identically.

use std::collections::BTreeMap;

use reason_common::{AnalysisLevel, CandidateKind, Result};
use reason_kg::{EdgeConflict, PathwayImpact};
use reason_ranker::{AuditEntry, Candidate, ExcludedCandidate, RankedList};
use reason_sim::SimulationRecord;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub rank: Option<usize>,
    pub entity_id: String,
    pub composite_score: Option<f64>,
    pub uncertainty_lower: Option<f64>,
    pub uncertainty_upper: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub audit: Vec<AuditEntry>,
}

impl From<&Candidate> for RankedEntry {
    fn from(c: &Candidate) -> Self {
        Self {
            rank: c.rank,
            entity_id: c.entity_id.clone(),
            composite_score: Some(c.composite_score),
            uncertainty_lower: Some(c.uncertainty.lower),
            uncertainty_upper: Some(c.uncertainty.upper),
            excluded_reason: None,
            audit: c.audit.clone(),
        }
    }
}

impl From<&ExcludedCandidate> for RankedEntry {
    fn from(e: &ExcludedCandidate) -> Self {
        Self {
            rank: None,
            entity_id: e.entity_id.clone(),
            composite_score: e.composite_score,
            uncertainty_lower: None,
            uncertainty_upper: None,
            excluded_reason: Some(e.reason.clone()),
            audit: Vec::new(),
        }
    }
}

/// Ranked entries first, then excluded ones.
pub fn entries_for(list: &RankedList) -> Vec<RankedEntry> {
    list.ranked
        .iter()
        .map(RankedEntry::from)
        .chain(list.excluded.iter().map(RankedEntry::from))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetadata {
    pub disease: String,
    pub level: AnalysisLevel,
    pub propagation_iterations: usize,
    pub converged: bool,
    pub simulation_passes_run: usize,
    /// None when simulation feedback did not run
    pub feedback_converged: Option<bool>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub rankings: BTreeMap<CandidateKind, Vec<RankedEntry>>,
    pub pathways: Vec<PathwayImpact>,
    pub conflicts: Vec<EdgeConflict>,
    pub simulations: Vec<SimulationRecord>,
}

impl RunReport {
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn ranked_ids(&self, kind: CandidateKind) -> Vec<&str> {
        self.rankings
            .get(&kind)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.rank.is_some())
                    .map(|e| e.entity_id.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn entry(&self, kind: CandidateKind, entity_id: &str) -> Option<&RankedEntry> {
        self.rankings.get(&kind)?.iter().find(|e| e.entity_id == entity_id)
    }
}
