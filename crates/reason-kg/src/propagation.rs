//! Network propagation of seed evidence (personalized-PageRank style).
//!
//! Update rule, iterated to a fixed point:
//!
//!   score(v) = d · Σ_{u→v} w(u,v) · score(u) / norm(u) + seed(v)
//!
//! `norm(u)` is the sum of absolute outgoing weights of u (1.0 when u has
//! none). Scores are expressed in seed units: this is the classic
//! `(1 - d) · seed` restart formulation rescaled by 1 / (1 - d), so a seeded
//! node with no inflow reports exactly its seed.
//!
//! Each iteration reads only the previous iterate and writes a fresh buffer;
//! buffers are swapped after every node is done. Summation order per node is
//! fixed (incoming edges sorted by source index), so parallel and sequential
//! runs are bit-identical.

use std::collections::BTreeMap;

use rayon::prelude::*;
use reason_common::{CancellationToken, PropagationConfig, ReasonError, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::graph::SeededGraph;

/// Perturbation score per entity. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropagationResult {
    pub scores: BTreeMap<String, f64>,
    pub iterations: usize,
    pub converged: bool,
    /// Maximum absolute change in the last iteration
    pub final_delta: f64,
}

impl PropagationResult {
    pub fn score(&self, entity_id: &str) -> Option<f64> {
        self.scores.get(entity_id).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

pub struct ImpactPropagator {
    config: PropagationConfig,
}

impl ImpactPropagator {
    pub fn new(config: PropagationConfig) -> Result<Self> {
        if !(config.damping > 0.0 && config.damping < 1.0) {
            return Err(ReasonError::Configuration(format!(
                "damping must be in (0, 1), got {}",
                config.damping
            )));
        }
        if !(config.epsilon.is_finite() && config.epsilon > 0.0) {
            return Err(ReasonError::Configuration(format!(
                "epsilon must be positive, got {}",
                config.epsilon
            )));
        }
        if config.max_iterations == 0 {
            return Err(ReasonError::Configuration("max_iterations must be at least 1".into()));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &PropagationConfig {
        &self.config
    }

    pub fn propagate(&self, graph: &SeededGraph) -> Result<PropagationResult> {
        self.propagate_with_cancel(graph, &CancellationToken::new())
    }

    /// Run propagation, checking `cancel` before each iteration. An iteration
    /// that has started always completes.
    pub fn propagate_with_cancel(
        &self,
        graph: &SeededGraph,
        cancel: &CancellationToken,
    ) -> Result<PropagationResult> {
        let n = graph.entity_count();
        let damping = self.config.damping;

        let seeds: Vec<f64> = (0..n).map(|i| graph.seed_value_at(i)).collect();
        let incoming = build_incoming(graph, damping);

        let mut current = seeds.clone();
        let mut next = vec![0.0_f64; n];
        let mut iterations = 0;
        let mut converged = n == 0;
        let mut final_delta = 0.0;

        while !converged && iterations < self.config.max_iterations {
            if cancel.is_cancelled() {
                return Err(ReasonError::Cancelled(format!("propagation iteration {}", iterations + 1)));
            }

            let update = |(v, out): (usize, &mut f64)| {
                let inflow: f64 = incoming[v].iter().map(|&(u, coef)| coef * current[u]).sum();
                *out = inflow + seeds[v];
            };
            if self.config.parallel {
                next.par_iter_mut().enumerate().for_each(update);
            } else {
                next.iter_mut().enumerate().for_each(update);
            }

            final_delta = current
                .iter()
                .zip(next.iter())
                .map(|(old, new)| (old - new).abs())
                .fold(0.0, f64::max);
            std::mem::swap(&mut current, &mut next);
            iterations += 1;

            debug!(iteration = iterations, delta = final_delta, "Propagation step");
            if final_delta < self.config.epsilon {
                converged = true;
            }
        }

        if converged {
            info!(iterations, entities = n, "Propagation converged");
        } else {
            warn!(
                "{}",
                ReasonError::NonConvergence { stage: "propagation".into(), iterations }
            );
        }

        let scores = graph
            .entities()
            .iter()
            .zip(current)
            .map(|(e, s)| (e.id.clone(), s))
            .collect();

        Ok(PropagationResult { scores, iterations, converged, final_delta })
    }
}

/// Per-node list of (source index, d · w / norm(source)), sorted by source.
fn build_incoming(graph: &SeededGraph, damping: f64) -> Vec<Vec<(usize, f64)>> {
    let n = graph.entity_count();
    let norms: Vec<f64> = (0..n).map(|i| graph.outdegree_norm(i)).collect();
    let mut incoming: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];

    for edge in graph.edges() {
        incoming[edge.to].push((edge.from, damping * edge.weight / norms[edge.from]));
        if !edge.directed {
            incoming[edge.from].push((edge.to, damping * edge.weight / norms[edge.to]));
        }
    }
    for list in &mut incoming {
        // Stable: parallel edges from one source keep insertion order
        list.sort_by_key(|&(u, _)| u);
    }
    incoming
}
