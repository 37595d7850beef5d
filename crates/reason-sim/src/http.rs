//! JSON-over-HTTP simulator adapter.
//!
//! POSTs a `SimulationRequest` to `{base_url}/simulate` and expects a
//! `SimulationResponse` body.

use async_trait::async_trait;
use reason_common::{ReasonError, Result};
use tracing::debug;

use crate::simulator::{SimulationRequest, SimulationResponse, Simulator};

pub struct HttpSimulator {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSimulator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/simulate", self.base_url)
    }
}

#[async_trait]
impl Simulator for HttpSimulator {
    fn name(&self) -> &str {
        "http"
    }

    async fn simulate(&self, request: &SimulationRequest) -> Result<SimulationResponse> {
        let url = self.endpoint();
        debug!(candidate = %request.candidate_id, url = %url, "Submitting simulation");

        let resp = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| ReasonError::Simulator(format!("simulator unreachable at {url}: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ReasonError::Simulator(format!("simulator error {status}: {body}")));
        }

        let response: SimulationResponse = resp
            .json()
            .await
            .map_err(|e| ReasonError::Simulator(format!("failed to parse simulator response: {e}")))?;

        if response.candidate_id != request.candidate_id {
            return Err(ReasonError::Simulator(format!(
                "simulator answered for {} when asked about {}",
                response.candidate_id, request.candidate_id
            )));
        }
        Ok(response)
    }
}
