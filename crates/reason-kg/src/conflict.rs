//! Conflict detection for interaction evidence.
//!
//! Conflicts never block loading: the merged weight is still used, and the
//! conflict is kept on the graph so the run report can surface it.

use reason_common::RelationKind;
use serde::Serialize;

use crate::graph::Interaction;

/// Classification of a detected conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Two merged interactions assert opposite signs (activates vs inhibits).
    Directional,
    /// The weight sign contradicts the relation kind (e.g. `inhibits` with w > 0).
    RelationSign,
}

/// A conflict between interaction records for one (source, target, kind).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeConflict {
    pub from: String,
    pub to: String,
    pub kind: RelationKind,
    pub conflict_type: ConflictType,
    pub detail: String,
}

impl EdgeConflict {
    pub fn new(interaction: &Interaction, conflict_type: ConflictType) -> Self {
        let detail = match conflict_type {
            ConflictType::Directional => format!(
                "Directional conflict on {} -{}-> {}: merged evidence disagrees in sign",
                interaction.from, interaction.kind, interaction.to
            ),
            ConflictType::RelationSign => format!(
                "Relation sign conflict on {} -{}-> {}: weight {} contradicts relation",
                interaction.from, interaction.kind, interaction.to, interaction.weight
            ),
        };
        Self {
            from: interaction.from.clone(),
            to: interaction.to.clone(),
            kind: interaction.kind,
            conflict_type,
            detail,
        }
    }
}

/// Weight sign disagrees with what the relation kind implies.
pub fn check_relation_sign(kind: RelationKind, weight: f64) -> Option<ConflictType> {
    let expected = kind.expected_sign()?;
    if weight != 0.0 && weight.signum() != expected {
        Some(ConflictType::RelationSign)
    } else {
        None
    }
}

/// Existing and incoming weights point in opposite directions.
pub fn check_merge(existing: f64, incoming: f64) -> Option<ConflictType> {
    if existing * incoming < 0.0 {
        Some(ConflictType::Directional)
    } else {
        None
    }
}
