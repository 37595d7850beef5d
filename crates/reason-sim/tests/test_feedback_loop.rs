use std::sync::Arc;
use std::time::Duration;

use reason_common::{CancellationToken, CandidateKind, FeedbackConfig};
use reason_sim::{ScriptedSimulator, SimulationFeedbackLoop, ValidationOutcome};
use reason_test_utils::pretty_assertions::assert_eq;
use reason_test_utils::ranked_drugs;

fn config(top_k: usize) -> FeedbackConfig {
    FeedbackConfig { top_k, ..Default::default() }
}

#[tokio::test(start_paused = true)]
async fn test_outcomes_applied_in_rank_order() {
    let sim = Arc::new(
        ScriptedSimulator::new()
            .delay("X", Duration::from_secs(30), ValidationOutcome::Contradicted)
            .respond("Y", ValidationOutcome::Confirmed, 0.4),
    );
    let mut lists = ranked_drugs(&[("X", 0.9), ("Y", 0.7), ("Z", 0.4)]);
    let feedback = SimulationFeedbackLoop::new(sim.clone(), config(3)).with_concurrency(3);

    let report = feedback.run(&mut lists, 1, &CancellationToken::new()).await.unwrap();

    let recorded: Vec<&str> = report.records.iter().map(|r| r.candidate_id.as_str()).collect();
    assert_eq!(recorded, vec!["X", "Y", "Z"]);
    assert_eq!(report.records[0].outcome, ValidationOutcome::Contradicted);
    assert!(report.converged);
    assert!(report.warnings.is_empty());
}

#[tokio::test]
async fn test_converges_once_top_k_settles() {
    let sim = Arc::new(ScriptedSimulator::new().respond("X", ValidationOutcome::Contradicted, -0.5));
    let mut lists = ranked_drugs(&[("X", 0.9), ("Y", 0.7), ("Z", 0.4)]);
    let feedback = SimulationFeedbackLoop::new(sim.clone(), config(2));

    let report = feedback.run(&mut lists, 3, &CancellationToken::new()).await.unwrap();

    // X drops to 0.45, still above Z; top-2 is {Y, X}, both already simulated
    assert_eq!(report.passes_run, 1);
    assert!(report.converged);
    assert_eq!(sim.calls(), vec!["X".to_string(), "Y".to_string()]);
    let order: Vec<&str> = lists[&CandidateKind::Drug].ranked.iter().map(|c| c.entity_id.as_str()).collect();
    assert_eq!(order, vec!["Y", "X", "Z"]);
}

#[tokio::test]
async fn test_empty_lists_need_no_pass() {
    let sim = Arc::new(ScriptedSimulator::new());
    let mut lists = ranked_drugs(&[]);
    let feedback = SimulationFeedbackLoop::new(sim.clone(), config(5));

    let report = feedback.run(&mut lists, 3, &CancellationToken::new()).await.unwrap();

    assert_eq!(report.passes_run, 0);
    assert!(report.converged);
    assert!(sim.calls().is_empty());
}
