mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{controller, ScriptedEvaluator, ScriptedImprover};
use docloops_core::{CycleError, CycleOptions, Document, StopReason};
use docloops_eval::Grade;

fn readme(content: &str) -> Document {
    Document::new(content, "readme").with_filename("README.md")
}

fn options() -> CycleOptions {
    CycleOptions::default().without_saving()
}

#[tokio::test]
async fn test_keeps_best_content_when_last_iteration_regresses() {
    let evaluator = Arc::new(ScriptedEvaluator::new(&[("v0", 60), ("v1", 75), ("v2", 74)]));
    let improver = Arc::new(ScriptedImprover::new(&["v1", "v2"]));

    let record = controller(&evaluator, &improver)
        .run_cycle(readme("v0"), &options())
        .await
        .unwrap();

    assert_eq!(record.iterations.len(), 2);
    assert_eq!(record.score_trajectory(), vec![60, 75, 74]);
    assert_eq!(record.initial_score, 60);
    assert_eq!(record.final_score, 75);
    assert_eq!(record.final_content, "v1");
    assert_eq!(record.stop_reason, StopReason::InsufficientImprovement);
    assert_eq!(record.iterations[1].score_delta(), -1);
    assert_eq!(evaluator.calls(), 3);
}

#[tokio::test]
async fn test_target_met_before_any_improvement() {
    let evaluator = Arc::new(ScriptedEvaluator::new(&[("v0", 85)]));
    let improver = Arc::new(ScriptedImprover::new(&["unused"]));

    let record = controller(&evaluator, &improver)
        .run_cycle(readme("v0"), &options().with_target_score(80.0))
        .await
        .unwrap();

    assert!(record.iterations.is_empty());
    assert_eq!(record.final_content, record.initial_content);
    assert_eq!(record.stop_reason, StopReason::TargetReached);
    assert_eq!(improver.calls(), 0);
}

#[tokio::test]
async fn test_min_improvement_boundary_is_inclusive() {
    let evaluator = Arc::new(ScriptedEvaluator::new(&[("v0", 50), ("v1", 52), ("v2", 60)]));
    let improver = Arc::new(ScriptedImprover::new(&["v1", "v2"]));

    let record = controller(&evaluator, &improver)
        .run_cycle(readme("v0"), &options().with_min_improvement(2.0))
        .await
        .unwrap();

    assert_eq!(record.iterations.len(), 1);
    assert_eq!(record.stop_reason, StopReason::InsufficientImprovement);
    assert_eq!(record.final_score, 52);
}

#[tokio::test]
async fn test_gain_above_min_improvement_continues() {
    let evaluator = Arc::new(ScriptedEvaluator::new(&[("v0", 50), ("v1", 53), ("v2", 54)]));
    let improver = Arc::new(ScriptedImprover::new(&["v1", "v2"]));

    let record = controller(&evaluator, &improver)
        .run_cycle(readme("v0"), &options().with_min_improvement(2.0))
        .await
        .unwrap();

    assert_eq!(record.iterations.len(), 2);
    assert_eq!(record.final_content, "v2");
}

#[tokio::test]
async fn test_stops_at_max_iterations() {
    let evaluator = Arc::new(ScriptedEvaluator::new(&[
        ("v0", 10),
        ("v1", 20),
        ("v2", 30),
        ("v3", 40),
    ]));
    let improver = Arc::new(ScriptedImprover::new(&["v1", "v2", "v3", "v4"]));

    let record = controller(&evaluator, &improver)
        .run_cycle(readme("v0"), &options())
        .await
        .unwrap();

    assert_eq!(record.iterations.len(), 3);
    assert_eq!(record.stop_reason, StopReason::MaxIterations);
    assert_eq!(record.final_score, 40);
    assert_eq!(improver.calls(), 3);
}

#[tokio::test]
async fn test_target_reached_after_improvement() {
    let evaluator = Arc::new(ScriptedEvaluator::new(&[("v0", 60), ("v1", 72)]));
    let improver = Arc::new(ScriptedImprover::new(&["v1"]));

    let record = controller(&evaluator, &improver)
        .run_cycle(readme("v0"), &options().with_target_score(70.0))
        .await
        .unwrap();

    assert_eq!(record.iterations.len(), 1);
    assert_eq!(record.stop_reason, StopReason::TargetReached);
}

#[tokio::test]
async fn test_score_ceiling_stops_cycle() {
    let evaluator = Arc::new(ScriptedEvaluator::new(&[("v0", 80), ("v1", 96)]));
    let improver = Arc::new(ScriptedImprover::new(&["v1", "v2"]));

    let record = controller(&evaluator, &improver)
        .run_cycle(readme("v0"), &options().with_max_iterations(5))
        .await
        .unwrap();

    assert_eq!(record.iterations.len(), 1);
    assert_eq!(record.stop_reason, StopReason::ScoreCeiling);
    assert_eq!(record.final_score, 96);
}

#[tokio::test]
async fn test_zero_iterations_only_evaluates() {
    let evaluator = Arc::new(ScriptedEvaluator::new(&[("v0", 40)]));
    let improver = Arc::new(ScriptedImprover::new(&["v1"]));

    let record = controller(&evaluator, &improver)
        .run_cycle(readme("v0"), &options().with_max_iterations(0))
        .await
        .unwrap();

    assert!(record.iterations.is_empty());
    assert_eq!(record.stop_reason, StopReason::MaxIterations);
    assert_eq!(record.initial_score, 40);
    assert_eq!(evaluator.calls(), 1);
    assert_eq!(improver.calls(), 0);
}

#[tokio::test]
async fn test_improver_failure_keeps_content_and_records_attempt() {
    let evaluator = Arc::new(ScriptedEvaluator::new(&[("v0", 60), ("v1", 70)]));
    let improver = Arc::new(ScriptedImprover::with_results(vec![
        Ok("v1".to_string()),
        Err("backend exploded".to_string()),
    ]));

    let record = controller(&evaluator, &improver)
        .run_cycle(readme("v0"), &options())
        .await
        .unwrap();

    assert_eq!(record.stop_reason, StopReason::ImproverFailed);
    assert_eq!(record.iterations.len(), 1);
    assert_eq!(record.final_content, "v1");

    let failed = record.failed_attempt.as_ref().unwrap();
    assert_eq!(failed.index, 2);
    assert_eq!(failed.score_before, 70);
    assert!(failed.error.contains("backend exploded"));
    assert!(record.format_report().contains("Failed Attempt"));
}

#[tokio::test]
async fn test_evaluator_failure_degrades_to_zero_score() {
    // "broken" has no scripted score, so the evaluator errors on it
    let evaluator = Arc::new(ScriptedEvaluator::new(&[("v1", 50)]));
    let improver = Arc::new(ScriptedImprover::new(&["v1"]));

    let record = controller(&evaluator, &improver)
        .run_cycle(readme("broken"), &options().with_max_iterations(1))
        .await
        .unwrap();

    let initial = record.initial_evaluation.as_ref().unwrap();
    assert_eq!(initial.grade, Grade::Error);
    assert_eq!(record.initial_score, 0);
    assert!(initial.summary.starts_with("Evaluation failed"));
    assert_eq!(record.final_score, 50);
    assert_eq!(record.final_content, "v1");
}

#[tokio::test]
async fn test_unregistered_doc_type_is_configuration_error() {
    let evaluator = Arc::new(ScriptedEvaluator::new(&[("v0", 60)]));
    let improver = Arc::new(ScriptedImprover::new(&["v1"]));

    let result = controller(&evaluator, &improver)
        .run_cycle(Document::new("v0", "wiki"), &options())
        .await;

    assert!(matches!(result, Err(CycleError::Configuration(_))));
    assert_eq!(evaluator.calls(), 0);
}

#[tokio::test]
async fn test_invalid_options_fail_before_evaluating() {
    let evaluator = Arc::new(ScriptedEvaluator::new(&[("v0", 60)]));
    let improver = Arc::new(ScriptedImprover::new(&["v1"]));

    let result = controller(&evaluator, &improver)
        .run_cycle(readme("v0"), &options().with_target_score(f64::NAN))
        .await;

    assert!(matches!(result, Err(CycleError::Configuration(_))));
    assert_eq!(evaluator.calls(), 0);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let evaluator = Arc::new(ScriptedEvaluator::new(&[("v0", 60)]));
    let improver = Arc::new(ScriptedImprover::new(&["v1"]));
    let controller = controller(&evaluator, &improver);
    controller.interrupt_handle().store(true, Ordering::SeqCst);

    let record = controller.run_cycle(readme("v0"), &options()).await.unwrap();

    assert_eq!(record.stop_reason, StopReason::Cancelled);
    assert!(record.initial_evaluation.is_none());
    assert_eq!(record.final_content, "v0");
    assert_eq!(evaluator.calls(), 0);
}

#[tokio::test]
async fn test_cancelled_mid_iteration_returns_best_so_far() {
    let evaluator = Arc::new(ScriptedEvaluator::new(&[("v0", 60), ("v1", 90)]));
    let improver = Arc::new(ScriptedImprover::new(&["v1"]));
    let controller = controller(&evaluator, &improver);
    improver.interrupt_on_call(controller.interrupt_handle());

    let record = controller.run_cycle(readme("v0"), &options()).await.unwrap();

    // The rewrite finished but was never evaluated, so it cannot be kept
    assert_eq!(record.stop_reason, StopReason::Cancelled);
    assert!(record.iterations.is_empty());
    assert_eq!(record.final_content, "v0");
    assert_eq!(record.final_score, 60);
    assert_eq!(evaluator.calls(), 1);
}

#[tokio::test]
async fn test_focus_areas_passed_to_improver() {
    let evaluator = Arc::new(ScriptedEvaluator::new(&[("v0", 60), ("v1", 60)]));
    let improver = Arc::new(ScriptedImprover::new(&["v1"]));

    controller(&evaluator, &improver)
        .run_cycle(readme("v0"), &options())
        .await
        .unwrap();
    assert_eq!(improver.focus_seen.lock().unwrap()[0], vec!["Add more examples"]);

    let improver = Arc::new(ScriptedImprover::new(&["v1"]));
    controller(&evaluator, &improver)
        .run_cycle(
            readme("v0"),
            &options().with_focus_categories(vec!["usage_examples".to_string()]),
        )
        .await
        .unwrap();
    assert_eq!(improver.focus_seen.lock().unwrap()[0], vec!["Improve Usage Examples"]);
}

#[tokio::test]
async fn test_final_score_is_best_of_trajectory() {
    let trajectories: [&[u32]; 4] = [&[50, 70, 65], &[80, 79], &[30, 40, 55, 54], &[90, 90]];

    for scores in trajectories {
        let contents: Vec<String> = (0..scores.len()).map(|i| format!("v{}", i)).collect();
        let table: Vec<(&str, u32)> = contents
            .iter()
            .map(String::as_str)
            .zip(scores.iter().copied())
            .collect();
        let rewrites: Vec<&str> = contents[1..].iter().map(String::as_str).collect();

        let evaluator = Arc::new(ScriptedEvaluator::new(&table));
        let improver = Arc::new(ScriptedImprover::new(&rewrites));
        let record = controller(&evaluator, &improver)
            .run_cycle(readme("v0"), &options().with_max_iterations(5))
            .await
            .unwrap();

        let trajectory = record.score_trajectory();
        let best = *trajectory.iter().max().unwrap();
        assert_eq!(record.final_score, best, "trajectory {:?}", trajectory);
        assert!(record.final_score >= record.initial_score);

        let best_index = trajectory.iter().position(|s| *s == best).unwrap();
        assert_eq!(record.final_content, contents[best_index]);
    }
}

#[tokio::test]
async fn test_single_step_api() {
    let evaluator = Arc::new(ScriptedEvaluator::new(&[("v0", 60), ("v1", 70)]));
    let improver = Arc::new(ScriptedImprover::new(&["v1"]));
    let controller = controller(&evaluator, &improver);
    let metadata = Default::default();

    let (evaluation, metrics) = controller.evaluate("v0", "readme", &metadata).await.unwrap();
    assert_eq!(metrics["total_score"], 60.0);

    let step = controller
        .improve("v0", &evaluation, "readme", &metadata)
        .await
        .unwrap();
    assert_eq!(step.improved_content, "v1");
    assert!(step.eval_after.is_none());

    let (after, _) = controller
        .evaluate(&step.improved_content, "readme", &metadata)
        .await
        .unwrap();
    let step = step.with_eval_after(after);
    assert_eq!(step.score_delta(), Some(10));

    assert!(matches!(
        controller.evaluate("v0", "wiki", &metadata).await,
        Err(CycleError::Configuration(_))
    ));
}
