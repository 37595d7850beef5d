//! One analysis run as a forward-only state machine.
//!
//! Seeded → Propagated → Fused → Ranked → (Simulating → Reranked)* → Final
//!
//! Each stage method checks the current stage and the cancellation token
//! before doing any work. Calling a stage out of order is `NotReady`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use reason_common::{AnalysisConfig, CancellationToken, CandidateKind, ReasonError, Result};
use reason_kg::{pathway_impacts, ImpactPropagator, PropagationResult, SeededGraph};
use reason_ranker::{
    CandidateFilter, CandidateRanker, CandidateSpec, ChannelRegistry, EvidenceFuser, FusionOutcome,
    RankedList,
};
use reason_sim::{FeedbackState, PassSummary, SimulationFeedbackLoop, Simulator};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::report::{entries_for, RunMetadata, RunReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Seeded,
    Propagated,
    Fused,
    Ranked,
    Simulating,
    Reranked,
    Final,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Seeded => "seeded",
            Self::Propagated => "propagated",
            Self::Fused => "fused",
            Self::Ranked => "ranked",
            Self::Simulating => "simulating",
            Self::Reranked => "reranked",
            Self::Final => "final",
        };
        f.write_str(s)
    }
}

pub struct AnalysisRun {
    run_id: Uuid,
    config: AnalysisConfig,
    stage: RunStage,
    graph: SeededGraph,
    candidates: Vec<CandidateSpec>,
    registry: ChannelRegistry,
    ranker: CandidateRanker,
    feedback_loop: Option<SimulationFeedbackLoop>,
    cancel: CancellationToken,
    pool: rayon::ThreadPool,

    propagation: Option<PropagationResult>,
    fusion: Option<FusionOutcome>,
    lists: BTreeMap<CandidateKind, RankedList>,
    feedback: FeedbackState,
    warnings: Vec<String>,
}

impl AnalysisRun {
    /// Validate the configuration and start a run on a seeded graph.
    pub fn new(
        config: AnalysisConfig,
        graph: SeededGraph,
        candidates: Vec<CandidateSpec>,
        registry: ChannelRegistry,
    ) -> Result<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.execution.parallel_workers)
            .build()
            .map_err(|e| ReasonError::Configuration(format!("cannot build worker pool: {e}")))?;
        let ranker = CandidateRanker::from_config(&config.ranking);

        Ok(Self {
            run_id: Uuid::new_v4(),
            config,
            stage: RunStage::Seeded,
            graph,
            candidates,
            registry,
            ranker,
            feedback_loop: None,
            cancel: CancellationToken::new(),
            pool,
            propagation: None,
            fusion: None,
            lists: BTreeMap::new(),
            feedback: FeedbackState::new(),
            warnings: Vec::new(),
        })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_simulator(mut self, simulator: Arc<dyn Simulator>) -> Self {
        let feedback = SimulationFeedbackLoop::new(simulator, self.config.feedback.clone())
            .with_concurrency(self.config.execution.parallel_workers.max(1));
        self.feedback_loop = Some(feedback);
        self
    }

    /// Add a caller-supplied filter; only effective before ranking.
    pub fn with_filter(mut self, filter: impl CandidateFilter + 'static) -> Self {
        self.ranker = self.ranker.with_filter(filter);
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn stage(&self) -> RunStage {
        self.stage
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn graph(&self) -> &SeededGraph {
        &self.graph
    }

    pub fn propagation(&self) -> Option<&PropagationResult> {
        self.propagation.as_ref()
    }

    pub fn rankings(&self) -> &BTreeMap<CandidateKind, RankedList> {
        &self.lists
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn enter(&self, allowed: &[RunStage], next: &str) -> Result<()> {
        if !allowed.contains(&self.stage) {
            let expected = allowed.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(" or ");
            return Err(ReasonError::NotReady { expected, actual: self.stage.to_string() });
        }
        if self.cancel.is_cancelled() {
            return Err(ReasonError::Cancelled(next.to_string()));
        }
        Ok(())
    }

    pub fn propagate(&mut self) -> Result<&PropagationResult> {
        self.enter(&[RunStage::Seeded], "propagation")?;
        let propagator = ImpactPropagator::new(self.config.propagation.clone())?;
        let (graph, cancel) = (&self.graph, &self.cancel);
        let result = self.pool.install(|| propagator.propagate_with_cancel(graph, cancel))?;

        if !result.converged {
            self.warnings.push(
                ReasonError::NonConvergence { stage: "propagation".into(), iterations: result.iterations }
                    .to_string(),
            );
        }
        self.stage = RunStage::Propagated;
        Ok(self.propagation.insert(result))
    }

    pub fn fuse(&mut self) -> Result<&FusionOutcome> {
        self.enter(&[RunStage::Propagated], "fusion")?;
        let propagation = self
            .propagation
            .as_ref()
            .ok_or_else(|| ReasonError::NotReady { expected: "propagated".into(), actual: "fused".into() })?;
        let fuser = EvidenceFuser::new(&self.config.fusion)?;
        let (candidates, registry) = (&self.candidates, &self.registry);
        let outcome = self.pool.install(|| fuser.fuse(candidates, propagation, registry))?;

        for excluded in &outcome.excluded {
            self.warnings.push(format!("{} ({}): {}", excluded.entity_id, excluded.kind, excluded.reason));
        }
        self.stage = RunStage::Fused;
        Ok(self.fusion.insert(outcome))
    }

    pub fn rank(&mut self) -> Result<&BTreeMap<CandidateKind, RankedList>> {
        self.enter(&[RunStage::Fused], "ranking")?;
        let outcome = self.fusion.take().unwrap_or_default();

        let mut lists = self.ranker.rank_all(outcome.candidates);
        for excluded in outcome.excluded {
            if let Some(list) = lists.get_mut(&excluded.kind) {
                list.excluded.push(excluded);
            }
        }
        for list in lists.values_mut() {
            list.excluded.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        }

        self.lists = lists;
        self.stage = RunStage::Ranked;
        Ok(&self.lists)
    }

    /// Passes this run may still take.
    pub fn remaining_passes(&self) -> usize {
        if self.feedback_loop.is_none() {
            return 0;
        }
        self.config.effective_feedback_passes().saturating_sub(self.feedback.passes_run)
    }

    /// One simulate-and-rerank pass.
    pub async fn simulate_pass(&mut self) -> Result<PassSummary> {
        self.enter(&[RunStage::Ranked, RunStage::Reranked], "simulation")?;
        if self.remaining_passes() == 0 {
            return Err(ReasonError::NotReady {
                expected: "a remaining simulation pass".into(),
                actual: format!("{} ({} passes run)", self.stage, self.feedback.passes_run),
            });
        }
        let Some(feedback) = self.feedback_loop.as_ref() else {
            return Err(ReasonError::Configuration("no simulator attached to this run".into()));
        };

        self.stage = RunStage::Simulating;
        let summary = feedback.run_pass(&mut self.lists, &mut self.feedback).await;
        self.stage = RunStage::Reranked;
        Ok(summary)
    }

    /// Run the remaining passes, stopping once no top-K candidate is pending.
    pub async fn run_feedback(&mut self) -> Result<usize> {
        let mut passes = 0;
        while self.remaining_passes() > 0 {
            let pending = match &self.feedback_loop {
                Some(fb) => fb.pending(&self.lists, &self.feedback),
                None => 0,
            };
            if pending == 0 {
                break;
            }
            self.simulate_pass().await?;
            passes += 1;
        }
        Ok(passes)
    }

    /// Close the run and produce the report.
    pub fn finalize(&mut self) -> Result<RunReport> {
        self.enter(&[RunStage::Ranked, RunStage::Reranked], "finalization")?;
        let propagation = self
            .propagation
            .as_ref()
            .ok_or_else(|| ReasonError::NotReady { expected: "propagated".into(), actual: self.stage.to_string() })?;

        let (passes_run, feedback_converged, simulations) = match &self.feedback_loop {
            Some(fb) if self.feedback.passes_run > 0 => {
                let report = fb.finish(&self.lists, std::mem::take(&mut self.feedback));
                self.warnings.extend(report.warnings);
                (report.passes_run, Some(report.converged), report.records)
            }
            _ => (0, None, Vec::new()),
        };

        let metadata = RunMetadata {
            disease: self.config.disease.clone(),
            level: self.config.level,
            propagation_iterations: propagation.iterations,
            converged: propagation.converged,
            simulation_passes_run: passes_run,
            feedback_converged,
            warnings: self.warnings.clone(),
        };
        let rankings = self.lists.iter().map(|(kind, list)| (*kind, entries_for(list))).collect();

        let report = RunReport {
            metadata,
            rankings,
            pathways: pathway_impacts(&self.graph, propagation),
            conflicts: self.graph.conflicts().to_vec(),
            simulations,
        };
        self.stage = RunStage::Final;
        if !report.metadata.warnings.is_empty() {
            warn!(run_id = %self.run_id, warnings = report.metadata.warnings.len(), "Run finished with warnings");
        }
        info!(run_id = %self.run_id, "Run finalized");
        Ok(report)
    }
}
