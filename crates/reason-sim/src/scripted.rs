//! In-memory simulator with scripted answers.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reason_common::{ReasonError, Result};

use crate::simulator::{SimulationRequest, SimulationResponse, Simulator, ValidationOutcome};

#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Respond { outcome: ValidationOutcome, effect_size: f64 },
    /// Answer after a delay (to exercise timeouts)
    Delayed { delay: Duration, outcome: ValidationOutcome },
    Fail(String),
}

/// Answers from a table; unscripted candidates get `default`.
pub struct ScriptedSimulator {
    script: HashMap<String, ScriptedResponse>,
    default: ValidationOutcome,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSimulator {
    pub fn new() -> Self {
        Self {
            script: HashMap::new(),
            default: ValidationOutcome::Confirmed,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_default(mut self, outcome: ValidationOutcome) -> Self {
        self.default = outcome;
        self
    }

    pub fn respond(mut self, candidate_id: &str, outcome: ValidationOutcome, effect_size: f64) -> Self {
        self.script
            .insert(candidate_id.to_string(), ScriptedResponse::Respond { outcome, effect_size });
        self
    }

    pub fn delay(mut self, candidate_id: &str, delay: Duration, outcome: ValidationOutcome) -> Self {
        self.script
            .insert(candidate_id.to_string(), ScriptedResponse::Delayed { delay, outcome });
        self
    }

    pub fn fail(mut self, candidate_id: &str, message: &str) -> Self {
        self.script
            .insert(candidate_id.to_string(), ScriptedResponse::Fail(message.to_string()));
        self
    }

    /// Candidate ids in the order requests arrived.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Default for ScriptedSimulator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Simulator for ScriptedSimulator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn simulate(&self, request: &SimulationRequest) -> Result<SimulationResponse> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.candidate_id.clone());
        }
        let id = request.candidate_id.clone();
        match self.script.get(&request.candidate_id).cloned() {
            Some(ScriptedResponse::Respond { outcome, effect_size }) => {
                Ok(SimulationResponse::new(id, outcome, effect_size))
            }
            Some(ScriptedResponse::Delayed { delay, outcome }) => {
                tokio::time::sleep(delay).await;
                Ok(SimulationResponse::new(id, outcome, 0.0))
            }
            Some(ScriptedResponse::Fail(message)) => Err(ReasonError::Simulator(message)),
            None => Ok(SimulationResponse::new(id, self.default, 0.0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str) -> SimulationRequest {
        SimulationRequest { candidate_id: id.into(), perturbation_description: String::new() }
    }

    #[tokio::test]
    async fn test_scripted_answers_and_records_calls() {
        let sim = ScriptedSimulator::new()
            .respond("X", ValidationOutcome::Contradicted, -0.3)
            .fail("Y", "solver diverged");

        let x = sim.simulate(&request("X")).await.unwrap();
        assert_eq!(x.outcome, ValidationOutcome::Contradicted);
        assert!(matches!(sim.simulate(&request("Y")).await, Err(ReasonError::Simulator(_))));
        let z = sim.simulate(&request("Z")).await.unwrap();
        assert_eq!(z.outcome, ValidationOutcome::Confirmed);
        assert_eq!(sim.calls(), vec!["X", "Y", "Z"]);
    }
}
