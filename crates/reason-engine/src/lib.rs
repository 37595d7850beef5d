//! reason-engine — Analysis runs over seeded evidence graphs.
//!
//! Ties together propagation (reason-kg), fusion and ranking (reason-ranker)
//! and simulation feedback (reason-sim) behind the `AnalysisRun` state machine.

pub mod bundle;
pub mod cache;
pub mod pipeline;
pub mod report;
pub mod run;
pub mod validation;

pub use bundle::{AnalysisInputs, EvidenceBundle};
pub use cache::{disease_key, GraphCache};
pub use pipeline::run_analysis;
pub use report::{RankedEntry, RunMetadata, RunReport};
pub use run::{AnalysisRun, RunStage};
pub use validation::{validate_against_known, CategoryValidation, KnownAnnotations, ValidationSummary};
