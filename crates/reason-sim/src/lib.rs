//! reason-sim — Simulator interface and the simulation feedback loop.

pub mod feedback;
pub mod http;
pub mod scripted;
pub mod simulator;

pub use feedback::{FeedbackReport, FeedbackState, PassSummary, SimulationFeedbackLoop, SimulationRecord};
pub use http::HttpSimulator;
pub use scripted::{ScriptedResponse, ScriptedSimulator};
pub use simulator::{describe_perturbation, SimulationRequest, SimulationResponse, Simulator, ValidationOutcome};
