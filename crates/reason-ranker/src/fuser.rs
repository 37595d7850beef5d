//! Evidence fusion: channel scores → composite score with uncertainty.
//!
//! For each usable channel c (prior > 0, confidence > 0):
//!
//!   a_c       = prior(c) · confidence(c)
//!   composite = Σ a_c · s_c / Σ a_c
//!   spread    = Σ a_c · (s_c − composite)²
//!   half      = sqrt(spread + κ · (1 − Σ a_c))
//!
//! with priors summing to 1 and κ = `missing_evidence_penalty`.
//! The second term charges for evidence mass that is absent or low-confidence,
//! so dropping a channel never narrows the interval while κ ≥ 1.

use std::collections::{BTreeMap, HashSet};

use rayon::prelude::*;
use reason_common::{CandidateKind, FusionConfig, PropagationNormalisation, ReasonError, Result};
use reason_kg::PropagationResult;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::candidate::{Candidate, CandidateSpec, UncertaintyInterval};
use crate::channels::{ChannelRegistry, ChannelScore, EvidenceChannel};
use crate::normalise::normalise_propagation;
use crate::weights::ChannelPriors;

/// A candidate that did not make it into a ranked list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedCandidate {
    pub entity_id: String,
    pub kind: CandidateKind,
    pub composite_score: Option<f64>,
    pub reason: String,
}

/// Fused candidates in declaration order, plus those fusion had to drop.
#[derive(Debug, Clone, Default)]
pub struct FusionOutcome {
    pub candidates: Vec<Candidate>,
    pub excluded: Vec<ExcludedCandidate>,
}

pub struct EvidenceFuser {
    priors: ChannelPriors,
    missing_evidence_penalty: f64,
    propagation_confidence: f64,
    normalisation: PropagationNormalisation,
}

impl EvidenceFuser {
    pub fn new(config: &FusionConfig) -> Result<Self> {
        let priors = ChannelPriors::from_config(config)?;
        if priors.iter().any(|(_, w)| !(w.is_finite() && w >= 0.0)) {
            return Err(ReasonError::Configuration("channel priors must be non-negative".into()));
        }
        if priors.sum() <= 0.0 {
            return Err(ReasonError::Configuration("channel priors must not all be zero".into()));
        }
        if config.missing_evidence_penalty < 1.0 {
            return Err(ReasonError::Configuration(format!(
                "missing_evidence_penalty must be >= 1.0, got {}",
                config.missing_evidence_penalty
            )));
        }
        if !(0.0..=1.0).contains(&config.propagation_confidence) {
            return Err(ReasonError::Configuration(format!(
                "propagation_confidence must be in [0, 1], got {}",
                config.propagation_confidence
            )));
        }
        if !priors.validate() {
            return Err(ReasonError::Configuration(format!(
                "channel priors must sum to 1.0, got {:.4}",
                priors.sum()
            )));
        }
        Ok(Self {
            priors,
            missing_evidence_penalty: config.missing_evidence_penalty,
            propagation_confidence: config.propagation_confidence,
            normalisation: config.propagation_normalisation,
        })
    }

    pub fn priors(&self) -> &ChannelPriors {
        &self.priors
    }

    /// Fuse one candidate's channels. Returns the composite, the interval and
    /// the channels that were actually used.
    ///
    /// The half-width is `sqrt(Σ a(s − m)² + κ(1 − Σ a))`. The spread term is
    /// weighted by raw evidence mass `a`, not divided by `Σ a`, so it is not a
    /// weighted standard deviation: thin evidence yields a small spread and
    /// leaves the width to the missing-mass term.
    pub fn fuse_channels(
        &self,
        channels: &BTreeMap<EvidenceChannel, ChannelScore>,
    ) -> Result<(f64, UncertaintyInterval, BTreeMap<EvidenceChannel, ChannelScore>)> {
        let mut usable = BTreeMap::new();
        for (channel, cs) in channels {
            if !(cs.score.is_finite() && (0.0..=1.0).contains(&cs.score)) {
                return Err(ReasonError::InvalidEvidence(format!(
                    "channel '{channel}' score {} outside [0, 1]",
                    cs.score
                )));
            }
            if !(0.0..=1.0).contains(&cs.confidence) {
                return Err(ReasonError::InvalidEvidence(format!(
                    "channel '{channel}' confidence {} outside [0, 1]",
                    cs.confidence
                )));
            }
            if self.priors.prior(channel) > 0.0 && cs.confidence > 0.0 {
                usable.insert(channel.clone(), *cs);
            }
        }
        if usable.is_empty() {
            return Err(ReasonError::InsufficientEvidence("no usable evidence channels".into()));
        }

        let weighted: Vec<(f64, f64)> = usable
            .iter()
            .map(|(c, cs)| (self.priors.prior(c) * cs.confidence, cs.score))
            .collect();
        let mass: f64 = weighted.iter().map(|(a, _)| a).sum();
        let composite = (weighted.iter().map(|(a, s)| a * s).sum::<f64>() / mass).clamp(0.0, 1.0);
        let spread: f64 = weighted.iter().map(|(a, s)| a * (s - composite).powi(2)).sum();
        let missing = (1.0 - mass).max(0.0);
        let half = (spread + self.missing_evidence_penalty * missing).sqrt();

        Ok((composite, UncertaintyInterval::around(composite, half), usable))
    }

    /// Fuse every declared candidate. Duplicate declarations are dropped; a
    /// candidate with no usable channel is excluded with a reason. Invalid
    /// channel values abort the whole fusion.
    pub fn fuse(
        &self,
        specs: &[CandidateSpec],
        propagation: &PropagationResult,
        registry: &ChannelRegistry,
    ) -> Result<FusionOutcome> {
        let mut seen = HashSet::new();
        let specs: Vec<&CandidateSpec> = specs
            .iter()
            .filter(|s| {
                let fresh = seen.insert((s.kind, s.entity_id.as_str()));
                if !fresh {
                    warn!(entity = %s.entity_id, kind = %s.kind, "Duplicate candidate declaration ignored");
                }
                fresh
            })
            .collect();

        let propagation_scores = self.propagation_channel(&specs, propagation);

        let fused: Vec<std::result::Result<Candidate, ExcludedCandidate>> = specs
            .par_iter()
            .enumerate()
            .map(|(i, spec)| self.fuse_one(spec, propagation_scores[i], registry))
            .collect::<Result<Vec<_>>>()?;

        let mut outcome = FusionOutcome::default();
        for item in fused {
            match item {
                Ok(candidate) => outcome.candidates.push(candidate),
                Err(excluded) => outcome.excluded.push(excluded),
            }
        }
        info!(
            fused = outcome.candidates.len(),
            excluded = outcome.excluded.len(),
            "Evidence fusion complete"
        );
        Ok(outcome)
    }

    fn fuse_one(
        &self,
        spec: &CandidateSpec,
        propagation: Option<f64>,
        registry: &ChannelRegistry,
    ) -> Result<std::result::Result<Candidate, ExcludedCandidate>> {
        let mut channels = registry.collect(&spec.entity_id);
        if let Some(score) = propagation {
            channels.insert(
                EvidenceChannel::Propagation,
                ChannelScore::new(score, self.propagation_confidence),
            );
        }

        match self.fuse_channels(&channels) {
            Ok((composite_score, uncertainty, used)) => {
                debug!(entity = %spec.entity_id, composite_score, width = uncertainty.width(), "Fused candidate");
                Ok(Ok(Candidate {
                    entity_id: spec.entity_id.clone(),
                    kind: spec.kind,
                    channels: used,
                    composite_score,
                    uncertainty,
                    rank: None,
                    audit: Vec::new(),
                }))
            }
            Err(ReasonError::InsufficientEvidence(why)) => {
                warn!(entity = %spec.entity_id, kind = %spec.kind, "Candidate excluded: {why}");
                Ok(Err(ExcludedCandidate {
                    entity_id: spec.entity_id.clone(),
                    kind: spec.kind,
                    composite_score: None,
                    reason: format!("insufficient evidence: {why}"),
                }))
            }
            Err(e) => Err(e),
        }
    }

    /// Propagation channel score per candidate, normalised within each kind.
    /// None when the entity is not in the propagated graph.
    fn propagation_channel(
        &self,
        specs: &[&CandidateSpec],
        propagation: &PropagationResult,
    ) -> Vec<Option<f64>> {
        let mut out = vec![None; specs.len()];
        for kind in CandidateKind::ALL {
            let members: Vec<(usize, f64)> = specs
                .iter()
                .enumerate()
                .filter(|(_, s)| s.kind == kind)
                .filter_map(|(i, s)| propagation.score(&s.entity_id).map(|raw| (i, raw)))
                .collect();
            let raw: Vec<f64> = members.iter().map(|(_, r)| *r).collect();
            let normed = normalise_propagation(&raw, self.normalisation);
            for ((i, _), n) in members.iter().zip(normed) {
                out[*i] = Some(n);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::StaticChannelProvider;

    fn fuser() -> EvidenceFuser {
        EvidenceFuser::new(&FusionConfig::default()).unwrap()
    }

    fn channels(entries: &[(EvidenceChannel, f64, f64)]) -> BTreeMap<EvidenceChannel, ChannelScore> {
        entries.iter().map(|(c, s, conf)| (c.clone(), ChannelScore::new(*s, *conf))).collect()
    }

    #[test]
    fn test_composite_is_weighted_mean() {
        let input = channels(&[
            (EvidenceChannel::Propagation, 1.0, 1.0),
            (EvidenceChannel::Docking, 0.5, 1.0),
        ]);
        let (composite, interval, used) = fuser().fuse_channels(&input).unwrap();
        // (0.3·1.0 + 0.2·0.5) / 0.5
        assert!((composite - 0.8).abs() < 1e-12);
        assert!(interval.lower < composite && composite < interval.upper);
        assert_eq!(used.len(), 2);
    }

    #[test]
    fn test_composite_invariant_to_channel_order() {
        let a = channels(&[
            (EvidenceChannel::Literature, 0.3, 0.6),
            (EvidenceChannel::Docking, 0.9, 0.8),
            (EvidenceChannel::OmicsSignificance, 0.1, 1.0),
        ]);
        let mut reversed = BTreeMap::new();
        for (k, v) in a.iter().rev() {
            reversed.insert(k.clone(), *v);
        }
        assert_eq!(fuser().fuse_channels(&a).unwrap().0, fuser().fuse_channels(&reversed).unwrap().0);
    }

    #[test]
    fn test_removing_channel_never_narrows() {
        let full = channels(&[
            (EvidenceChannel::Propagation, 0.9, 0.8),
            (EvidenceChannel::Docking, 0.2, 0.9),
            (EvidenceChannel::Literature, 0.6, 0.5),
        ]);
        let (_, full_interval, _) = fuser().fuse_channels(&full).unwrap();
        for removed in full.keys() {
            let mut fewer = full.clone();
            fewer.remove(removed);
            let (_, interval, _) = fuser().fuse_channels(&fewer).unwrap();
            assert!(
                interval.width() >= full_interval.width() - 1e-12,
                "removing {removed} narrowed the interval"
            );
        }
    }

    #[test]
    fn test_no_usable_channel_is_insufficient() {
        let err = fuser().fuse_channels(&BTreeMap::new()).unwrap_err();
        assert!(matches!(err, ReasonError::InsufficientEvidence(_)));

        // Zero confidence and zero prior both mean unusable
        let unusable = channels(&[
            (EvidenceChannel::Docking, 0.7, 0.0),
            (EvidenceChannel::Custom("unlisted".into()), 0.7, 1.0),
        ]);
        let err = fuser().fuse_channels(&unusable).unwrap_err();
        assert!(matches!(err, ReasonError::InsufficientEvidence(_)));
    }

    #[test]
    fn test_out_of_range_score_is_invalid() {
        let bad = channels(&[(EvidenceChannel::Docking, 1.4, 1.0)]);
        assert!(matches!(fuser().fuse_channels(&bad), Err(ReasonError::InvalidEvidence(_))));
    }

    #[test]
    fn test_priors_not_summing_to_one_rejected() {
        let config = FusionConfig {
            priors: BTreeMap::from([("docking".to_string(), 0.9), ("literature".to_string(), 0.9)]),
            ..Default::default()
        };
        let err = EvidenceFuser::new(&config).err().unwrap();
        assert!(matches!(&err, ReasonError::Configuration(msg) if msg.contains("sum to 1.0")), "{err}");
    }

    #[test]
    fn test_aliased_priors_rejected() {
        let config = FusionConfig {
            priors: BTreeMap::from([
                ("omics".to_string(), 0.5),
                ("omics_significance".to_string(), 0.25),
                ("docking".to_string(), 0.25),
            ]),
            ..Default::default()
        };
        assert!(matches!(EvidenceFuser::new(&config), Err(ReasonError::Configuration(_))));
    }

    #[test]
    fn test_penalty_below_one_rejected() {
        let config = FusionConfig { missing_evidence_penalty: 0.5, ..Default::default() };
        assert!(matches!(EvidenceFuser::new(&config), Err(ReasonError::Configuration(_))));
    }

    #[test]
    fn test_fuse_excludes_candidates_without_evidence() {
        let propagation = PropagationResult {
            scores: BTreeMap::from([("LRRK2".to_string(), 0.4), ("GBA".to_string(), 0.2)]),
            iterations: 3,
            converged: true,
            final_delta: 0.0,
        };
        let mut registry = ChannelRegistry::new();
        registry
            .register(Box::new(StaticChannelProvider::new(EvidenceChannel::Docking).with("ambroxol", 0.7, 0.9)))
            .unwrap();
        let specs = vec![
            CandidateSpec::new("LRRK2", CandidateKind::Target),
            CandidateSpec::new("GBA", CandidateKind::Target),
            CandidateSpec::new("ambroxol", CandidateKind::Drug),
            CandidateSpec::new("unknown-drug", CandidateKind::Drug),
            CandidateSpec::new("LRRK2", CandidateKind::Target),
        ];

        let outcome = fuser().fuse(&specs, &propagation, &registry).unwrap();
        let ids: Vec<&str> = outcome.candidates.iter().map(|c| c.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["LRRK2", "GBA", "ambroxol"]);
        assert_eq!(outcome.excluded.len(), 1);
        assert_eq!(outcome.excluded[0].entity_id, "unknown-drug");
        assert!(outcome.excluded[0].reason.contains("insufficient evidence"));

        // Max-abs within the target kind: LRRK2 is the strongest
        let lrrk2 = &outcome.candidates[0];
        assert_eq!(lrrk2.channels[&EvidenceChannel::Propagation].score, 1.0);
        assert_eq!(outcome.candidates[1].channels[&EvidenceChannel::Propagation].score, 0.5);
    }
}
