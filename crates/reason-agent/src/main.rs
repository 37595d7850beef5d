//! REASON — pathway impact and treatment ranking.
//! Entry point for the `reason` binary.

mod config;

use std::sync::Arc;

use reason_common::CancellationToken;
use reason_engine::{run_analysis, validate_against_known, EvidenceBundle, GraphCache};
use reason_sim::{HttpSimulator, Simulator};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialise structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("reason=debug,info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("REASON starting up...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration; positional arguments override the bundle path
    let config = match config::Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!("Could not load reason.toml: {e}");
            return Ok(());
        }
    };
    let mut bundles: Vec<String> = std::env::args().skip(1).collect();
    if bundles.is_empty() {
        bundles.push(config.input.bundle.clone());
    }

    let simulator: Option<Arc<dyn Simulator>> = match config.simulator.url.as_deref() {
        Some(url) => {
            let sim = HttpSimulator::new(url);
            info!(endpoint = %sim.endpoint(), "Simulation feedback enabled");
            Some(Arc::new(sim) as Arc<dyn Simulator>)
        }
        None => {
            info!("No simulator configured; ranking without feedback");
            None
        }
    };

    // Ctrl+C cancels between stages
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling run");
                cancel.cancel();
            }
        });
    }

    // Bundles for the same disease share one seeded graph
    let cache = GraphCache::new();
    for path in &bundles {
        analyse_bundle(&config, path, &cache, simulator.clone(), cancel.clone()).await?;
    }
    Ok(())
}

async fn analyse_bundle(
    config: &config::Config,
    path: &str,
    cache: &GraphCache,
    simulator: Option<Arc<dyn Simulator>>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let bundle = EvidenceBundle::from_path(path)?;
    let mut analysis = config.analysis.clone();
    if analysis.disease.is_empty() {
        analysis.disease = bundle.disease.clone();
    }
    let known = bundle.known.clone();
    let inputs = bundle.into_inputs_cached(cache)?;
    match &inputs.load_summary {
        Some(summary) => info!(
            entities = summary.entities,
            seeds = summary.seeds,
            interactions = summary.interactions_inserted,
            merged = summary.interactions_merged,
            conflicts = summary.conflicts,
            "Evidence graph built from {path}"
        ),
        None => info!(disease = %analysis.disease, "Reusing cached evidence graph for {path}"),
    }

    let started = chrono::Utc::now();
    let disease = analysis.disease.clone();
    let report = run_analysis(analysis, inputs, simulator, cancel).await?;
    let json = report.to_json_pretty()?;

    match config.report_path(&disease, started) {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, &json)?;
            info!("Report written to {}", path.display());
        }
        None => println!("{json}"),
    }

    for warning in &report.metadata.warnings {
        warn!("{warning}");
    }

    if let Some(known) = known.filter(|k| !k.is_empty()) {
        let validation = validate_against_known(&report, &known, config.output.validation_k);
        for (category, v) in &validation.categories {
            info!(
                category = %category,
                k = v.k,
                hits = v.hits.len(),
                precision = v.precision_at_k,
                recall = v.recall_at_k,
                "Validation"
            );
        }
        info!(overall_score = validation.overall_score, "Validation against known annotations");
        if let Some(path) = config.report_path(&format!("{disease}_validation"), started) {
            std::fs::write(&path, serde_json::to_string_pretty(&validation)?)?;
        }
    }

    info!(elapsed_ms = (chrono::Utc::now() - started).num_milliseconds(), "Done");
    Ok(())
}
