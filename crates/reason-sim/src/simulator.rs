//! Simulator request/response contract.
//!
//! The simulator's internals are opaque: the engine only sends a candidate id
//! with a perturbation description and reads back a three-valued outcome.

use std::fmt;

use async_trait::async_trait;
use reason_common::{CandidateKind, Result};
use reason_ranker::Candidate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub candidate_id: String,
    pub perturbation_description: String,
}

impl SimulationRequest {
    pub fn for_candidate(candidate: &Candidate) -> Self {
        Self {
            candidate_id: candidate.entity_id.clone(),
            perturbation_description: describe_perturbation(&candidate.entity_id, candidate.kind),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOutcome {
    Confirmed,
    Contradicted,
    Inconclusive,
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Confirmed => "confirmed",
            Self::Contradicted => "contradicted",
            Self::Inconclusive => "inconclusive",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResponse {
    pub candidate_id: String,
    pub outcome: ValidationOutcome,
    #[serde(default)]
    pub effect_size: f64,
}

impl SimulationResponse {
    pub fn new(candidate_id: impl Into<String>, outcome: ValidationOutcome, effect_size: f64) -> Self {
        Self { candidate_id: candidate_id.into(), outcome, effect_size }
    }
}

/// Systems-biology simulator.
#[async_trait]
pub trait Simulator: Send + Sync {
    fn name(&self) -> &str;

    /// Run one simulation. Transport and protocol failures are
    /// `ReasonError::Simulator`; the caller applies its own timeout.
    async fn simulate(&self, request: &SimulationRequest) -> Result<SimulationResponse>;
}

/// Human-readable perturbation for a candidate of a given kind.
pub fn describe_perturbation(entity_id: &str, kind: CandidateKind) -> String {
    match kind {
        CandidateKind::Target => format!("knock down {entity_id}"),
        CandidateKind::Drug => format!("administer {entity_id}"),
        CandidateKind::Treatment => format!("apply treatment regimen {entity_id}"),
    }
}
