//! reason-ranker — Evidence fusion and candidate ranking.

pub mod candidate;
pub mod channels;
pub mod fuser;
pub mod normalise;
pub mod ranker;
pub mod weights;

pub use candidate::{AuditEntry, Candidate, CandidateSpec, UncertaintyInterval};
pub use channels::{
    ChannelProvider, ChannelRegistry, ChannelScore, ChannelScoreRecord, EvidenceChannel,
    StaticChannelProvider,
};
pub use fuser::{EvidenceFuser, ExcludedCandidate, FusionOutcome};
pub use ranker::{
    compare_candidates, CandidateFilter, CandidateRanker, MaxUncertaintyWidth, MinCompositeScore,
    PredicateFilter, RankedList, RequiredChannels,
};
pub use weights::ChannelPriors;
