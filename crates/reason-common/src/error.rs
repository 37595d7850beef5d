use thiserror::Error;

/// Error taxonomy shared by every engine stage.
///
/// Structural errors (`DuplicateEntity`, `UnknownEntity`, `Configuration`,
/// `InvalidEvidence`) are fatal at the call that triggered them.
/// `NonConvergence` and `SimulationTimeout` are never returned by the engine
/// itself; they exist so warnings can be reported with the same wording.
#[derive(Debug, Error)]
pub enum ReasonError {
    #[error("Duplicate entity: {id} already registered as {existing}, got {attempted}")]
    DuplicateEntity {
        id: String,
        existing: String,
        attempted: String,
    },

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Stage not ready: expected {expected}, run is at {actual}")]
    NotReady { expected: String, actual: String },

    #[error("Insufficient evidence: {0}")]
    InsufficientEvidence(String),

    #[error("Did not converge after {iterations} iterations ({stage})")]
    NonConvergence { stage: String, iterations: usize },

    #[error("Simulation timed out for candidate {candidate_id} after {timeout_secs}s")]
    SimulationTimeout { candidate_id: String, timeout_secs: u64 },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid evidence: {0}")]
    InvalidEvidence(String),

    #[error("Simulator error: {0}")]
    Simulator(String),

    #[error("Run cancelled before {0}")]
    Cancelled(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReasonError>;
