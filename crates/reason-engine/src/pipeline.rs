//! End-to-end analysis: propagate, fuse, rank, refine, report.

use std::sync::Arc;

use reason_common::{AnalysisConfig, CancellationToken, Result};
use reason_sim::Simulator;
use tracing::{info, info_span, Instrument};

use crate::bundle::AnalysisInputs;
use crate::report::RunReport;
use crate::run::AnalysisRun;

/// Drive one run through every stage. Feedback runs only when a simulator is
/// given and the analysis level allows it.
pub async fn run_analysis(
    config: AnalysisConfig,
    inputs: AnalysisInputs,
    simulator: Option<Arc<dyn Simulator>>,
    cancel: CancellationToken,
) -> Result<RunReport> {
    let mut run = AnalysisRun::new(config, inputs.graph, inputs.candidates, inputs.registry)?
        .with_cancellation(cancel);
    if let Some(sim) = simulator {
        run = run.with_simulator(sim);
    }

    let span = info_span!(
        "analysis",
        run_id = %run.run_id(),
        disease = %run.config().disease,
        level = ?run.config().level,
    );

    async move {
        info!("Starting analysis run");
        run.propagate()?;
        run.fuse()?;
        run.rank()?;
        let passes = run.run_feedback().await?;
        info!(passes, "Simulation feedback done");
        run.finalize()
    }
    .instrument(span)
    .await
}
