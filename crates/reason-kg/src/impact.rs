//! Pathway-level view of a propagation result.

use std::cmp::Ordering;

use reason_common::{EntityKind, RelationKind};
use serde::Serialize;

use crate::graph::{Direction, SeededGraph};
use crate::propagation::PropagationResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathwayImpact {
    pub pathway_id: String,
    pub score: f64,
    /// Members linked by `participates_in`, strongest first
    pub members: Vec<String>,
}

/// Pathway entities ordered by |score| descending, id ascending on ties.
pub fn pathway_impacts(graph: &SeededGraph, result: &PropagationResult) -> Vec<PathwayImpact> {
    let mut impacts: Vec<PathwayImpact> = graph
        .entities()
        .iter()
        .filter(|e| e.kind == EntityKind::Pathway)
        .map(|pathway| {
            let mut members: Vec<(&str, f64)> = graph
                .neighbors(&pathway.id, Direction::Incoming)
                .map(|it| {
                    it.filter(|(_, edge)| edge.kind == RelationKind::ParticipatesIn)
                        .map(|(member, _)| (member.id.as_str(), result.score(&member.id).unwrap_or(0.0)))
                        .collect()
                })
                .unwrap_or_default();
            members.sort_by(|a, b| by_magnitude(a.1, b.1).then_with(|| a.0.cmp(b.0)));
            members.dedup_by(|a, b| a.0 == b.0);

            PathwayImpact {
                pathway_id: pathway.id.clone(),
                score: result.score(&pathway.id).unwrap_or(0.0),
                members: members.into_iter().map(|(id, _)| id.to_string()).collect(),
            }
        })
        .collect();

    impacts.sort_by(|a, b| by_magnitude(a.score, b.score).then_with(|| a.pathway_id.cmp(&b.pathway_id)));
    impacts
}

fn by_magnitude(a: f64, b: f64) -> Ordering {
    b.abs().total_cmp(&a.abs())
}
