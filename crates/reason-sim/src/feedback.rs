//! Simulation feedback: validate top-ranked candidates and re-rank.
//!
//! Each pass submits every not-yet-simulated candidate in the top-K of each
//! ranked list. Outcomes are applied in rank order regardless of completion
//! order:
//!
//! - confirmed: no change
//! - contradicted: composite × `penalty_multiplier`
//! - inconclusive, timeout or simulator failure: interval widened by
//!   `inconclusive_widening` on each side
//!
//! A candidate is simulated at most once per run. The loop has converged when
//! no top-K slot holds an unsimulated candidate.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use reason_common::{CancellationToken, CandidateKind, FeedbackConfig, ReasonError, Result};
use reason_ranker::RankedList;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::simulator::{SimulationRequest, SimulationResponse, Simulator, ValidationOutcome};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationRecord {
    pub pass: usize,
    pub candidate_id: String,
    pub kind: CandidateKind,
    pub outcome: ValidationOutcome,
    pub effect_size: f64,
    /// Set when the outcome was forced to inconclusive (timeout, failure)
    pub note: Option<String>,
}

/// Per-run feedback bookkeeping, carried across passes.
#[derive(Debug, Clone, Default)]
pub struct FeedbackState {
    simulated: BTreeSet<(CandidateKind, String)>,
    pub passes_run: usize,
    pub records: Vec<SimulationRecord>,
    pub warnings: Vec<String>,
}

impl FeedbackState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_simulated(&self, kind: CandidateKind, entity_id: &str) -> bool {
        self.simulated.contains(&(kind, entity_id.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub pass: usize,
    pub submitted: usize,
    pub contradicted: usize,
    pub inconclusive: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackReport {
    pub passes_run: usize,
    pub converged: bool,
    pub records: Vec<SimulationRecord>,
    pub warnings: Vec<String>,
}

pub struct SimulationFeedbackLoop {
    simulator: Arc<dyn Simulator>,
    config: FeedbackConfig,
    concurrency: usize,
}

impl SimulationFeedbackLoop {
    pub fn new(simulator: Arc<dyn Simulator>, config: FeedbackConfig) -> Self {
        Self { simulator, config, concurrency: 4 }
    }

    /// Maximum simulator requests in flight within one pass.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn config(&self) -> &FeedbackConfig {
        &self.config
    }

    /// Unsimulated candidates currently in a top-K slot.
    pub fn pending(&self, lists: &BTreeMap<CandidateKind, RankedList>, state: &FeedbackState) -> usize {
        lists
            .values()
            .flat_map(|list| list.top(self.config.top_k).iter())
            .filter(|c| !state.is_simulated(c.kind, &c.entity_id))
            .count()
    }

    /// Run up to `passes` passes, stopping early once nothing is pending.
    pub async fn run(
        &self,
        lists: &mut BTreeMap<CandidateKind, RankedList>,
        passes: usize,
        cancel: &CancellationToken,
    ) -> Result<FeedbackReport> {
        let mut state = FeedbackState::new();
        while state.passes_run < passes && self.pending(lists, &state) > 0 {
            if cancel.is_cancelled() {
                return Err(ReasonError::Cancelled(format!("simulation pass {}", state.passes_run + 1)));
            }
            self.run_pass(lists, &mut state).await;
        }
        Ok(self.finish(lists, state))
    }

    /// Close out a run: convergence verdict plus the collected records.
    pub fn finish(&self, lists: &BTreeMap<CandidateKind, RankedList>, mut state: FeedbackState) -> FeedbackReport {
        let pending = self.pending(lists, &state);
        let converged = pending == 0;
        if !converged {
            let err = ReasonError::NonConvergence {
                stage: "simulation feedback".into(),
                iterations: state.passes_run,
            };
            warn!(pending, "{err}");
            state
                .warnings
                .push(format!("{err}; {pending} top-{} candidates never simulated", self.config.top_k));
        }
        FeedbackReport {
            passes_run: state.passes_run,
            converged,
            records: state.records,
            warnings: state.warnings,
        }
    }

    /// One simulate-and-rerank pass over every list.
    pub async fn run_pass(
        &self,
        lists: &mut BTreeMap<CandidateKind, RankedList>,
        state: &mut FeedbackState,
    ) -> PassSummary {
        state.passes_run += 1;
        let pass = state.passes_run;

        // Rank order within each kind, kinds in fixed order
        let batch: Vec<(CandidateKind, SimulationRequest)> = lists
            .iter()
            .flat_map(|(kind, list)| {
                list.top(self.config.top_k)
                    .iter()
                    .filter(|c| !state.is_simulated(*kind, &c.entity_id))
                    .map(|c| (*kind, SimulationRequest::for_candidate(c)))
                    .collect::<Vec<_>>()
            })
            .collect();

        for (kind, req) in &batch {
            state.simulated.insert((*kind, req.candidate_id.clone()));
        }
        info!(pass, submitted = batch.len(), "Submitting simulation batch");

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let simulator = &self.simulator;
        let results: Vec<Result<SimulationResponse>> = stream::iter(batch.iter())
            .map(|(_, req)| async move {
                match tokio::time::timeout(timeout, simulator.simulate(req)).await {
                    Ok(result) => result,
                    Err(_) => Err(ReasonError::SimulationTimeout {
                        candidate_id: req.candidate_id.clone(),
                        timeout_secs: self.config.timeout_secs,
                    }),
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut summary = PassSummary { pass, submitted: batch.len(), contradicted: 0, inconclusive: 0 };
        for ((kind, req), result) in batch.iter().zip(results) {
            let record = self.apply(lists, pass, *kind, &req.candidate_id, result, &mut state.warnings);
            match record.outcome {
                ValidationOutcome::Contradicted => summary.contradicted += 1,
                ValidationOutcome::Inconclusive => summary.inconclusive += 1,
                ValidationOutcome::Confirmed => {}
            }
            state.records.push(record);
        }

        for list in lists.values_mut() {
            list.rerank();
        }
        debug!(pass, contradicted = summary.contradicted, inconclusive = summary.inconclusive, "Pass re-ranked");
        summary
    }

    fn apply(
        &self,
        lists: &mut BTreeMap<CandidateKind, RankedList>,
        pass: usize,
        kind: CandidateKind,
        candidate_id: &str,
        result: Result<SimulationResponse>,
        warnings: &mut Vec<String>,
    ) -> SimulationRecord {
        let (outcome, effect_size, note) = match result {
            Ok(resp) if resp.candidate_id == candidate_id => (resp.outcome, resp.effect_size, None),
            Ok(resp) => {
                let msg = format!("simulator answered for {} when asked about {candidate_id}", resp.candidate_id);
                (ValidationOutcome::Inconclusive, 0.0, Some(msg))
            }
            Err(e) => (ValidationOutcome::Inconclusive, 0.0, Some(e.to_string())),
        };
        if let Some(msg) = &note {
            warn!(candidate = candidate_id, "{msg}; treating as inconclusive");
            warnings.push(msg.clone());
        }

        let candidate = lists
            .get_mut(&kind)
            .and_then(|list| list.ranked.iter_mut().find(|c| c.entity_id == candidate_id));
        if let Some(candidate) = candidate {
            match outcome {
                ValidationOutcome::Confirmed => candidate.confirm(pass, effect_size),
                ValidationOutcome::Contradicted => candidate.apply_penalty(
                    self.config.penalty_multiplier,
                    pass,
                    format!("contradicted by simulation (effect size {effect_size:.3})"),
                ),
                ValidationOutcome::Inconclusive => candidate.widen(
                    self.config.inconclusive_widening,
                    pass,
                    note.clone().unwrap_or_else(|| "inconclusive simulation".to_string()),
                ),
            }
        }

        SimulationRecord {
            pass,
            candidate_id: candidate_id.to_string(),
            kind,
            outcome,
            effect_size,
            note,
        }
    }
}
