//! Candidate ranking with filters.
//!
//! One candidate kind per list. Ordering: composite descending, then narrower
//! uncertainty interval, then entity id ascending. Filters run before ranking;
//! what fails lands in `excluded` with the filter's reason.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use reason_common::{CandidateKind, RankingConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::candidate::Candidate;
use crate::channels::EvidenceChannel;
use crate::fuser::ExcludedCandidate;

/// Pre-ranking predicate. `check` returns the exclusion reason, or None to keep.
pub trait CandidateFilter: Send + Sync {
    fn name(&self) -> &str;
    fn check(&self, candidate: &Candidate) -> Option<String>;
}

pub struct MinCompositeScore(pub f64);

impl CandidateFilter for MinCompositeScore {
    fn name(&self) -> &str {
        "min_composite_score"
    }

    fn check(&self, c: &Candidate) -> Option<String> {
        (c.composite_score < self.0)
            .then(|| format!("composite score {:.4} below minimum {:.4}", c.composite_score, self.0))
    }
}

pub struct RequiredChannels(pub Vec<EvidenceChannel>);

impl CandidateFilter for RequiredChannels {
    fn name(&self) -> &str {
        "required_channels"
    }

    fn check(&self, c: &Candidate) -> Option<String> {
        let missing: Vec<&str> = self.0.iter().filter(|ch| !c.has_channel(ch)).map(|ch| ch.name()).collect();
        (!missing.is_empty()).then(|| format!("missing required channels: {}", missing.join(", ")))
    }
}

pub struct MaxUncertaintyWidth(pub f64);

impl CandidateFilter for MaxUncertaintyWidth {
    fn name(&self) -> &str {
        "max_uncertainty_width"
    }

    fn check(&self, c: &Candidate) -> Option<String> {
        let width = c.uncertainty.width();
        (width > self.0).then(|| format!("uncertainty width {width:.4} exceeds maximum {:.4}", self.0))
    }
}

/// Caller-supplied predicate; candidates for which it returns false are excluded.
pub struct PredicateFilter<F> {
    name: String,
    predicate: F,
}

impl<F> PredicateFilter<F>
where
    F: Fn(&Candidate) -> bool + Send + Sync,
{
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self { name: name.into(), predicate }
    }
}

impl<F> CandidateFilter for PredicateFilter<F>
where
    F: Fn(&Candidate) -> bool + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, c: &Candidate) -> Option<String> {
        (!(self.predicate)(c)).then(|| format!("rejected by filter '{}'", self.name))
    }
}

/// Ordered candidates of a single kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedList {
    pub kind: CandidateKind,
    pub ranked: Vec<Candidate>,
    pub excluded: Vec<ExcludedCandidate>,
}

impl RankedList {
    pub fn top(&self, k: usize) -> &[Candidate] {
        &self.ranked[..k.min(self.ranked.len())]
    }

    pub fn position(&self, entity_id: &str) -> Option<usize> {
        self.ranked.iter().position(|c| c.entity_id == entity_id)
    }

    pub fn get(&self, entity_id: &str) -> Option<&Candidate> {
        self.ranked.iter().find(|c| c.entity_id == entity_id)
    }

    /// Re-sort after scores or intervals changed and renumber ranks.
    pub fn rerank(&mut self) {
        sort_and_number(&mut self.ranked);
    }
}

/// Total ranking order.
pub fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    b.composite_score
        .total_cmp(&a.composite_score)
        .then_with(|| a.uncertainty.width().total_cmp(&b.uncertainty.width()))
        .then_with(|| a.entity_id.cmp(&b.entity_id))
}

fn sort_and_number(candidates: &mut [Candidate]) {
    candidates.sort_by(compare_candidates);
    for (i, c) in candidates.iter_mut().enumerate() {
        c.rank = Some(i + 1);
    }
}

#[derive(Default)]
pub struct CandidateRanker {
    filters: Vec<Box<dyn CandidateFilter>>,
}

impl CandidateRanker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in filters from configuration.
    pub fn from_config(config: &RankingConfig) -> Self {
        let mut ranker = Self::new();
        if config.min_composite_score > 0.0 {
            ranker = ranker.with_filter(MinCompositeScore(config.min_composite_score));
        }
        if !config.required_channels.is_empty() {
            let channels = config.required_channels.iter().map(|n| EvidenceChannel::parse(n)).collect();
            ranker = ranker.with_filter(RequiredChannels(channels));
        }
        if let Some(width) = config.max_uncertainty_width {
            ranker = ranker.with_filter(MaxUncertaintyWidth(width));
        }
        ranker
    }

    pub fn with_filter(mut self, filter: impl CandidateFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Rank the candidates of `kind`; candidates of other kinds are ignored.
    pub fn rank(&self, kind: CandidateKind, candidates: Vec<Candidate>) -> RankedList {
        let mut ranked = Vec::new();
        let mut excluded = Vec::new();

        for mut candidate in candidates.into_iter().filter(|c| c.kind == kind) {
            match self.filters.iter().find_map(|f| f.check(&candidate)) {
                Some(reason) => {
                    debug!(entity = %candidate.entity_id, %reason, "Candidate filtered out");
                    excluded.push(ExcludedCandidate {
                        entity_id: candidate.entity_id,
                        kind,
                        composite_score: Some(candidate.composite_score),
                        reason,
                    });
                }
                None => {
                    candidate.rank = None;
                    ranked.push(candidate);
                }
            }
        }

        sort_and_number(&mut ranked);
        excluded.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        info!(kind = %kind, ranked = ranked.len(), excluded = excluded.len(), "Ranked candidates");
        RankedList { kind, ranked, excluded }
    }

    /// One list per candidate kind, including empty ones.
    pub fn rank_all(&self, candidates: Vec<Candidate>) -> BTreeMap<CandidateKind, RankedList> {
        let mut by_kind: BTreeMap<CandidateKind, Vec<Candidate>> =
            CandidateKind::ALL.iter().map(|k| (*k, Vec::new())).collect();
        for c in candidates {
            by_kind.entry(c.kind).or_default().push(c);
        }
        by_kind
            .into_iter()
            .map(|(kind, group)| (kind, self.rank(kind, group)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::UncertaintyInterval;
    use crate::channels::ChannelScore;

    fn candidate(id: &str, score: f64, half: f64) -> Candidate {
        Candidate {
            entity_id: id.into(),
            kind: CandidateKind::Drug,
            channels: BTreeMap::from([(EvidenceChannel::Docking, ChannelScore::new(score, 1.0))]),
            composite_score: score,
            uncertainty: UncertaintyInterval::around(score, half),
            rank: None,
            audit: vec![],
        }
    }

    fn ids(list: &RankedList) -> Vec<&str> {
        list.ranked.iter().map(|c| c.entity_id.as_str()).collect()
    }

    #[test]
    fn test_ties_broken_by_width_then_id() {
        let list = CandidateRanker::new().rank(
            CandidateKind::Drug,
            vec![
                candidate("zonisamide", 0.7, 0.1),
                candidate("amantadine", 0.7, 0.1),
                candidate("rasagiline", 0.7, 0.05),
                candidate("levodopa", 0.9, 0.3),
            ],
        );
        assert_eq!(ids(&list), vec!["levodopa", "rasagiline", "amantadine", "zonisamide"]);
        let ranks: Vec<usize> = list.ranked.iter().filter_map(|c| c.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_filters_exclude_with_reason() {
        let ranker = CandidateRanker::from_config(&RankingConfig {
            min_composite_score: 0.5,
            required_channels: vec!["docking".into()],
            max_uncertainty_width: Some(0.5),
        });
        let mut no_docking = candidate("safinamide", 0.8, 0.1);
        no_docking.channels.clear();

        let list = ranker.rank(
            CandidateKind::Drug,
            vec![
                candidate("levodopa", 0.9, 0.1),
                candidate("selegiline", 0.3, 0.1),
                candidate("istradefylline", 0.8, 0.4),
                no_docking,
            ],
        );
        assert_eq!(ids(&list), vec!["levodopa"]);
        assert_eq!(list.excluded.len(), 3);
        let reasons: BTreeMap<&str, &str> =
            list.excluded.iter().map(|e| (e.entity_id.as_str(), e.reason.as_str())).collect();
        assert!(reasons["selegiline"].contains("below minimum"));
        assert!(reasons["istradefylline"].contains("uncertainty width"));
        assert!(reasons["safinamide"].contains("missing required channels: docking"));
    }

    #[test]
    fn test_predicate_filter() {
        let ranker = CandidateRanker::new()
            .with_filter(PredicateFilter::new("no-ergolines", |c: &Candidate| !c.entity_id.starts_with("bromo")));
        let list = ranker.rank(
            CandidateKind::Drug,
            vec![candidate("bromocriptine", 0.6, 0.1), candidate("ropinirole", 0.5, 0.1)],
        );
        assert_eq!(ids(&list), vec!["ropinirole"]);
        assert_eq!(list.excluded[0].reason, "rejected by filter 'no-ergolines'");
    }

    #[test]
    fn test_kinds_never_mixed() {
        let mut target = candidate("LRRK2", 0.99, 0.1);
        target.kind = CandidateKind::Target;
        let lists = CandidateRanker::new().rank_all(vec![candidate("levodopa", 0.5, 0.1), target]);
        assert_eq!(lists.len(), CandidateKind::ALL.len());
        assert_eq!(ids(&lists[&CandidateKind::Drug]), vec!["levodopa"]);
        assert_eq!(ids(&lists[&CandidateKind::Target]), vec!["LRRK2"]);
        assert!(lists[&CandidateKind::Treatment].ranked.is_empty());
    }

    #[test]
    fn test_penalized_candidate_drops_below_higher_scores() {
        let mut list = CandidateRanker::new().rank(
            CandidateKind::Drug,
            vec![candidate("X", 0.9, 0.1), candidate("Y", 0.5, 0.1), candidate("Z", 0.4, 0.1)],
        );
        let x = list.position("X").unwrap();
        list.ranked[x].apply_penalty(0.5, 1, "contradicted by simulation");
        list.rerank();
        assert_eq!(ids(&list), vec!["Y", "X", "Z"]);
        assert!((list.get("X").unwrap().composite_score - 0.45).abs() < 1e-12);
        assert_eq!(list.get("X").unwrap().rank, Some(2));
    }
}
