//! reason-common — Shared types, errors, and configuration used across all REASON crates.

pub mod error;
pub mod entities;
pub mod confidence;
pub mod analysis_config;

// Re-export commonly used types
pub use analysis_config::{
    AnalysisConfig, AnalysisLevel, ExecutionConfig, FeedbackConfig, FusionConfig,
    PropagationConfig, PropagationNormalisation, RankingConfig,
    canonical_channel_name, PRIOR_SUM_TOLERANCE,
};
pub use tokio_util::sync::CancellationToken;
pub use entities::{CandidateKind, EntityKind, RelationKind};
pub use error::{ReasonError, Result};
