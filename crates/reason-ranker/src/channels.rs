//! Evidence channels and the providers that supply them.
//!
//! Known channels are enum variants; anything else is `Custom(name)` and must
//! come from a registered `ChannelProvider`. Every provider returns scores
//! already normalised to [0, 1].

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use reason_common::{canonical_channel_name, ReasonError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EvidenceChannel {
    Propagation,
    Docking,
    Literature,
    OmicsSignificance,
    StructuralTractability,
    Custom(String),
}

impl EvidenceChannel {
    pub const KNOWN: [EvidenceChannel; 5] = [
        EvidenceChannel::Propagation,
        EvidenceChannel::Docking,
        EvidenceChannel::Literature,
        EvidenceChannel::OmicsSignificance,
        EvidenceChannel::StructuralTractability,
    ];

    pub fn name(&self) -> &str {
        match self {
            Self::Propagation => "propagation",
            Self::Docking => "docking",
            Self::Literature => "literature",
            Self::OmicsSignificance => "omics_significance",
            Self::StructuralTractability => "structural_tractability",
            Self::Custom(name) => name,
        }
    }

    /// Map a channel name onto a known variant, or `Custom`.
    pub fn parse(name: &str) -> Self {
        let canonical = canonical_channel_name(name);
        match canonical.as_str() {
            "propagation" => Self::Propagation,
            "docking" => Self::Docking,
            "literature" => Self::Literature,
            "omics_significance" => Self::OmicsSignificance,
            "structural_tractability" => Self::StructuralTractability,
            _ => Self::Custom(canonical),
        }
    }
}

impl fmt::Display for EvidenceChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<String> for EvidenceChannel {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<EvidenceChannel> for String {
    fn from(c: EvidenceChannel) -> Self {
        c.name().to_string()
    }
}

/// One channel's normalised score for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelScore {
    pub score: f64,
    pub confidence: f64,
}

impl ChannelScore {
    pub fn new(score: f64, confidence: f64) -> Self {
        Self { score, confidence }
    }
}

/// Flat channel score as delivered by docking/structural/literature adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelScoreRecord {
    pub candidate_id: String,
    pub channel_name: String,
    pub normalized_score: f64,
    #[serde(default = "default_record_confidence")]
    pub confidence: f64,
}

fn default_record_confidence() -> f64 { 1.0 }

/// Source of normalised scores for one channel.
///
/// Implementations can use:
/// - Precomputed adapter output (records)
/// - A scoring service
/// - Mock data (testing)
pub trait ChannelProvider: Send + Sync {
    fn channel(&self) -> EvidenceChannel;

    /// Score for a candidate, or None if this channel has nothing on it.
    fn score(&self, candidate_id: &str) -> Option<ChannelScore>;
}

// ── Static provider ─────────────────────────────────────────────────────────

/// Provider backed by an in-memory table.
pub struct StaticChannelProvider {
    channel: EvidenceChannel,
    scores: HashMap<String, ChannelScore>,
}

impl StaticChannelProvider {
    pub fn new(channel: EvidenceChannel) -> Self {
        Self { channel, scores: HashMap::new() }
    }

    /// Add a candidate score. A later entry for the same candidate replaces it.
    pub fn with(mut self, candidate_id: &str, score: f64, confidence: f64) -> Self {
        self.insert(candidate_id, ChannelScore::new(score, confidence));
        self
    }

    pub fn insert(&mut self, candidate_id: &str, score: ChannelScore) {
        self.scores.insert(candidate_id.to_string(), score);
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl ChannelProvider for StaticChannelProvider {
    fn channel(&self) -> EvidenceChannel {
        self.channel.clone()
    }

    fn score(&self, candidate_id: &str) -> Option<ChannelScore> {
        self.scores.get(candidate_id).copied()
    }
}

// ── Registry ────────────────────────────────────────────────────────────────

/// One provider per channel. Propagation is computed by the fuser and cannot
/// be registered.
#[derive(Default)]
pub struct ChannelRegistry {
    providers: BTreeMap<EvidenceChannel, Box<dyn ChannelProvider>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Box<dyn ChannelProvider>) -> Result<()> {
        let channel = provider.channel();
        if channel == EvidenceChannel::Propagation {
            return Err(ReasonError::Configuration(
                "the propagation channel is derived from the graph and cannot be registered".into(),
            ));
        }
        if self.providers.contains_key(&channel) {
            return Err(ReasonError::Configuration(format!(
                "a provider for channel '{channel}' is already registered"
            )));
        }
        debug!(channel = %channel, "Registered channel provider");
        self.providers.insert(channel, provider);
        Ok(())
    }

    /// Group flat records into one static provider per channel.
    pub fn from_records(records: &[ChannelScoreRecord]) -> Result<Self> {
        let mut grouped: BTreeMap<EvidenceChannel, StaticChannelProvider> = BTreeMap::new();
        for record in records {
            let channel = EvidenceChannel::parse(&record.channel_name);
            grouped
                .entry(channel.clone())
                .or_insert_with(|| StaticChannelProvider::new(channel))
                .insert(
                    &record.candidate_id,
                    ChannelScore::new(record.normalized_score, record.confidence),
                );
        }

        let mut registry = Self::new();
        for (_, provider) in grouped {
            registry.register(Box::new(provider))?;
        }
        Ok(registry)
    }

    pub fn channels(&self) -> impl Iterator<Item = &EvidenceChannel> {
        self.providers.keys()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Every registered channel's score for a candidate, in channel order.
    pub fn collect(&self, candidate_id: &str) -> BTreeMap<EvidenceChannel, ChannelScore> {
        self.providers
            .iter()
            .filter_map(|(channel, p)| p.score(candidate_id).map(|s| (channel.clone(), s)))
            .collect()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names_round_trip() {
        for channel in EvidenceChannel::KNOWN {
            assert_eq!(EvidenceChannel::parse(channel.name()), channel);
        }
        assert_eq!(
            EvidenceChannel::parse("kinase_selectivity"),
            EvidenceChannel::Custom("kinase_selectivity".into())
        );
        assert_eq!(EvidenceChannel::parse("Omics-Significance"), EvidenceChannel::OmicsSignificance);
    }

    #[test]
    fn test_static_provider() {
        let provider = StaticChannelProvider::new(EvidenceChannel::Docking)
            .with("LRRK2", 0.72, 0.9)
            .with("GBA", 0.40, 0.5);

        assert_eq!(provider.score("LRRK2"), Some(ChannelScore::new(0.72, 0.9)));
        assert_eq!(provider.score("SNCA"), None);
        assert_eq!(provider.len(), 2);
    }

    #[test]
    fn test_registry_rejects_duplicate_and_propagation() {
        let mut registry = ChannelRegistry::new();
        registry.register(Box::new(StaticChannelProvider::new(EvidenceChannel::Docking))).unwrap();
        assert!(registry
            .register(Box::new(StaticChannelProvider::new(EvidenceChannel::Docking)))
            .is_err());
        assert!(registry
            .register(Box::new(StaticChannelProvider::new(EvidenceChannel::Propagation)))
            .is_err());
    }

    #[test]
    fn test_registry_from_records_groups_by_channel() {
        let records = vec![
            ChannelScoreRecord {
                candidate_id: "levodopa".into(),
                channel_name: "docking".into(),
                normalized_score: 0.8,
                confidence: 0.9,
            },
            ChannelScoreRecord {
                candidate_id: "levodopa".into(),
                channel_name: "bbb_permeability".into(),
                normalized_score: 0.6,
                confidence: 1.0,
            },
        ];
        let registry = ChannelRegistry::from_records(&records).unwrap();
        let scores = registry.collect("levodopa");
        assert_eq!(registry.len(), 2);
        assert_eq!(scores[&EvidenceChannel::Docking].score, 0.8);
        assert_eq!(scores[&EvidenceChannel::Custom("bbb_permeability".into())].score, 0.6);
    }

    #[test]
    fn test_channel_serializes_as_name() {
        let json = serde_json::to_string(&EvidenceChannel::OmicsSignificance).unwrap();
        assert_eq!(json, "\"omics_significance\"");
    }
}
