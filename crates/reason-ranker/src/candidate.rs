//! Candidates: fused, rankable entities with an audit trail.

use std::collections::BTreeMap;

use reason_common::CandidateKind;
use serde::{Deserialize, Serialize};

use crate::channels::{ChannelScore, EvidenceChannel};

/// A candidate declaration supplied with the evidence: which entity, ranked
/// as which kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub entity_id: String,
    pub kind: CandidateKind,
}

impl CandidateSpec {
    pub fn new(entity_id: impl Into<String>, kind: CandidateKind) -> Self {
        Self { entity_id: entity_id.into(), kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyInterval {
    pub lower: f64,
    pub upper: f64,
}

impl UncertaintyInterval {
    pub fn around(center: f64, half_width: f64) -> Self {
        Self { lower: center - half_width, upper: center + half_width }
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn half_width(&self) -> f64 {
        self.width() / 2.0
    }
}

/// Adjustment applied after fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AuditEntry {
    Penalized {
        pass: usize,
        multiplier: f64,
        before: f64,
        after: f64,
        reason: String,
    },
    Widened {
        pass: usize,
        amount: f64,
        reason: String,
    },
    Confirmed {
        pass: usize,
        effect_size: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub entity_id: String,
    pub kind: CandidateKind,
    /// Usable channel inputs that went into the composite
    pub channels: BTreeMap<EvidenceChannel, ChannelScore>,
    pub composite_score: f64,
    pub uncertainty: UncertaintyInterval,
    /// 1-based position in its ranked list; None until ranked
    pub rank: Option<usize>,
    #[serde(default)]
    pub audit: Vec<AuditEntry>,
}

impl Candidate {
    pub fn has_channel(&self, channel: &EvidenceChannel) -> bool {
        self.channels.contains_key(channel)
    }

    /// Scale the composite; the interval moves with it, keeping its width.
    pub fn apply_penalty(&mut self, multiplier: f64, pass: usize, reason: impl Into<String>) {
        let before = self.composite_score;
        let after = before * multiplier;
        let half = self.uncertainty.half_width();
        self.composite_score = after;
        self.uncertainty = UncertaintyInterval::around(after, half);
        self.audit.push(AuditEntry::Penalized { pass, multiplier, before, after, reason: reason.into() });
    }

    /// Widen the interval by `amount` on each side; the score is unchanged.
    pub fn widen(&mut self, amount: f64, pass: usize, reason: impl Into<String>) {
        self.uncertainty.lower -= amount;
        self.uncertainty.upper += amount;
        self.audit.push(AuditEntry::Widened { pass, amount, reason: reason.into() });
    }

    pub fn confirm(&mut self, pass: usize, effect_size: f64) {
        self.audit.push(AuditEntry::Confirmed { pass, effect_size });
    }

    pub fn was_penalized(&self) -> bool {
        self.audit.iter().any(|a| matches!(a, AuditEntry::Penalized { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(score: f64) -> Candidate {
        Candidate {
            entity_id: "X".into(),
            kind: CandidateKind::Drug,
            channels: BTreeMap::new(),
            composite_score: score,
            uncertainty: UncertaintyInterval::around(score, 0.1),
            rank: Some(1),
            audit: vec![],
        }
    }

    #[test]
    fn test_penalty_scales_score_and_keeps_width() {
        let mut c = candidate(0.9);
        c.apply_penalty(0.5, 1, "contradicted");
        assert!((c.composite_score - 0.45).abs() < 1e-12);
        assert!((c.uncertainty.width() - 0.2).abs() < 1e-12);
        assert!((c.uncertainty.lower - 0.35).abs() < 1e-12);
        assert!(c.was_penalized());
    }

    #[test]
    fn test_widen_keeps_score() {
        let mut c = candidate(0.6);
        c.widen(0.1, 1, "inconclusive");
        assert_eq!(c.composite_score, 0.6);
        assert!((c.uncertainty.width() - 0.4).abs() < 1e-12);
        assert_eq!(c.audit.len(), 1);
    }
}
