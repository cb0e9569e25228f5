//! End-to-end evaluation scenarios
//!
//! Drives the controller the way the CLI does: configuration in, report dump
//! and run summary out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use parley::report::ReportLog;
use parley::runner::{EpochController, EvalConfig, EvalProgress, RunSummary, Termination};
use parley::{DataType, EvalError, Example, Model, Prediction};

const EPS: f64 = 1e-9;

fn approx(actual: Option<f64>, expected: f64) -> bool {
    actual.is_some_and(|v| (v - expected).abs() < EPS)
}

type Block = serde_json::Map<String, serde_json::Value>;

/// Run a config, collecting one dump block per progress update
async fn run_with_dump(config: EvalConfig) -> (RunSummary, Vec<Block>) {
    let log = Arc::new(Mutex::new(ReportLog::new()));
    let sink = log.clone();

    let mut controller = EpochController::from_config(config).unwrap();
    controller.set_progress_callback(Arc::new(move |p: EvalProgress| {
        sink.lock().push(&p.report);
    }));
    let summary = controller.run().await.unwrap();

    let dump = log.lock().render();
    (summary, ReportLog::parse(&dump).unwrap())
}

fn write_task(dir: &std::path::Path, name: &str, labels: &[&str]) -> String {
    let examples: Vec<_> = labels
        .iter()
        .enumerate()
        .map(|(i, label)| Example::new(format!("question {i}")).with_labels([*label]))
        .collect();
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_string(&examples).unwrap()).unwrap();
    format!("file:{}", path.display())
}

#[tokio::test]
async fn test_default_metrics_dump_one_block_per_example() {
    let config = EvalConfig::new("integration_tests")
        .with_num_examples(5)
        .with_log_every_n_examples(1);
    let (summary, blocks) = run_with_dump(config).await;

    assert_eq!(blocks.len(), 5);
    for (i, block) in blocks.iter().enumerate() {
        assert_eq!(block["exs"], (i + 1) as u64);
        assert_eq!(block["accuracy"], 1.0);
        assert!(!block.contains_key("rouge-1"));
        assert!(!block.contains_key("f1"));
    }
    assert_eq!(summary.report.exs, 5);
    assert_eq!(summary.metrics, vec!["accuracy"]);
    assert_eq!(summary.termination, Termination::Complete);
}

const ROUGE: [&str; 3] = ["rouge-1", "rouge-2", "rouge-L"];

#[tokio::test]
async fn test_all_metrics_in_every_dump_block() {
    let config = EvalConfig::new("integration_tests")
        .with_metrics("all")
        .with_num_examples(5)
        .with_log_every_n_examples(1);
    let (summary, blocks) = run_with_dump(config).await;

    assert_eq!(blocks.len(), 5);
    for (i, block) in blocks.iter().enumerate() {
        assert_eq!(block["exs"], (i + 1) as u64);
        for name in ["accuracy", "f1", "bleu-4"].into_iter().chain(ROUGE) {
            assert_eq!(block.get(name).and_then(|v| v.as_f64()), Some(1.0), "{name} in block {i}");
        }
    }
    for name in ["accuracy", "f1", "bleu-4"].into_iter().chain(ROUGE) {
        assert!(approx(summary.report.get(name), 1.0), "{name}");
    }
}

#[tokio::test]
async fn test_metric_families_select_members_in_every_block() {
    let config = EvalConfig::new("integration_tests")
        .with_metrics("accuracy,rouge")
        .with_num_examples(5)
        .with_log_every_n_examples(1);
    let (summary, blocks) = run_with_dump(config).await;

    assert_eq!(blocks.len(), 5);
    for (i, block) in blocks.iter().enumerate() {
        assert_eq!(block["exs"], (i + 1) as u64);
        for name in ROUGE {
            assert_eq!(block.get(name).and_then(|v| v.as_f64()), Some(1.0), "{name} in block {i}");
        }
        let mut keys: Vec<_> = block.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["accuracy", "exs", "rouge-1", "rouge-2", "rouge-L"]);
    }
    assert!(summary.report.get("f1").is_none());
    assert!(summary.report.get("bleu-4").is_none());
}

#[tokio::test]
async fn test_multitask_micro_and_macro() {
    let tasks = "integration_tests,integration_tests:multiturnCandidate";

    for micro in [false, true] {
        let config = EvalConfig::new(tasks)
            .with_model("random_candidate")
            .with_num_epochs(0.5)
            .with_aggregate_micro(micro);
        let mut controller = EpochController::from_config(config).unwrap();
        let summary = controller.run().await.unwrap();
        let report = &summary.report;

        let single = report.task("integration_tests").unwrap();
        let multi = report.task("integration_tests:multiturnCandidate").unwrap();
        assert_eq!(single.exs, 50);
        assert_eq!(multi.exs, 200);
        assert_eq!(report.exs, 250);

        let (a1, a2) = (single.accuracy().unwrap(), multi.accuracy().unwrap());
        let expected = if micro {
            (a1 + 4.0 * a2) / 5.0
        } else {
            (a1 + a2) / 2.0
        };
        assert!(approx(report.accuracy(), expected), "micro={micro}");
    }
}

#[tokio::test]
async fn test_train_evalmode_is_batch_size_invariant() {
    let tasks = "integration_tests,integration_tests:fixed_dialog_candidate";

    for batchsize in [1, 64] {
        let config = EvalConfig::new(tasks)
            .with_datatype(DataType::train_evalmode())
            .with_batchsize(batchsize);
        let mut controller = EpochController::from_config(config).unwrap();
        let summary = controller.run().await.unwrap();

        for task in ["integration_tests", "integration_tests:fixed_dialog_candidate"] {
            let report = summary.report.task(task).unwrap();
            assert_eq!(report.exs, 500, "{task} with batchsize {batchsize}");
            assert_eq!(report.accuracy(), Some(1.0));
        }
        assert_eq!(summary.termination, Termination::Complete);
    }
}

#[tokio::test]
async fn test_training_stream_cycles_to_cap() {
    let config = EvalConfig::new("integration_tests")
        .with_datatype("train".parse().unwrap())
        .with_num_examples(1200)
        .with_batchsize(7);
    let mut controller = EpochController::from_config(config).unwrap();
    let summary = controller.run().await.unwrap();
    assert_eq!(summary.report.exs, 1200);
    assert_eq!(controller.finished()[0].epochs, 2);
}

#[tokio::test]
async fn test_stream_datatype_exhausts() {
    let config =
        EvalConfig::new("integration_tests").with_datatype("valid:stream".parse().unwrap());
    let mut controller = EpochController::from_config(config).unwrap();
    let summary = controller.run().await.unwrap();
    assert_eq!(summary.report.exs, 100);
    assert_eq!(summary.termination, Termination::Exhausted);
}

#[tokio::test]
async fn test_fractional_epoch_floors() {
    let dir = tempfile::tempdir().unwrap();
    let task = write_task(dir.path(), "five.json", &["a", "b", "c", "d", "e"]);

    let config = EvalConfig::new(task).with_num_epochs(0.5);
    let mut controller = EpochController::from_config(config).unwrap();
    let summary = controller.run().await.unwrap();
    assert_eq!(summary.report.exs, 2);
}

#[tokio::test]
async fn test_progress_every_n_examples() {
    let config = EvalConfig::new("integration_tests").with_log_every_n_examples(25);
    let (summary, blocks) = run_with_dump(config).await;
    let exs: Vec<_> = blocks.iter().map(|b| b["exs"].as_u64().unwrap()).collect();
    assert_eq!(exs, vec![25, 50, 75, 100]);
    assert_eq!(summary.report.exs, 100);
}

/// Takes one second per example
struct Slow;

#[async_trait]
impl Model for Slow {
    fn name(&self) -> &str {
        "slow"
    }

    async fn evaluate(&self, example: &Example) -> anyhow::Result<Prediction> {
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(Prediction::new(example.labels[0].clone()))
    }
}

#[tokio::test(start_paused = true)]
async fn test_deadline_cancels_with_partial_report() {
    let config = EvalConfig::new("integration_tests,integration_tests:fixed_dialog_candidate")
        .with_timeout_secs(5);
    let mut controller = EpochController::new(config, Arc::new(Slow)).unwrap();
    let summary = controller.run().await.unwrap();

    assert_eq!(summary.termination, Termination::Cancelled);
    assert_eq!(summary.report.exs, 5);
    assert_eq!(summary.report.accuracy(), Some(1.0));
    // the second task never starts
    assert_eq!(summary.tasks.len(), 1);
}

/// Fails on any example labeled "boom"
struct Boom;

#[async_trait]
impl Model for Boom {
    fn name(&self) -> &str {
        "boom"
    }

    async fn evaluate(&self, example: &Example) -> anyhow::Result<Prediction> {
        if example.labels[0] == "boom" {
            anyhow::bail!("model exploded");
        }
        Ok(Prediction::new(example.labels[0].clone()))
    }
}

#[tokio::test]
async fn test_failed_task_keeps_finished_reports() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_task(dir.path(), "good.json", &["a", "b", "c"]);
    let bad = write_task(dir.path(), "bad.json", &["x", "boom"]);

    let config = EvalConfig::new(format!("{good},{bad}"));
    let mut controller = EpochController::new(config, Arc::new(Boom)).unwrap();
    let err = controller.run().await.unwrap_err();

    match &err {
        EvalError::Evaluation { task, index, .. } => {
            assert_eq!(task, &bad);
            assert_eq!(*index, 1);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(controller.finished().len(), 1);
    assert_eq!(controller.global_report().exs, 3);
}

#[tokio::test]
async fn test_unknown_task_fails_before_evaluation() {
    let config = EvalConfig::new("integration_tests,no_such_task");
    let mut controller = EpochController::from_config(config).unwrap();
    let err = controller.run().await.unwrap_err();
    assert!(matches!(err, EvalError::Config(_)));
    assert!(controller.finished().is_empty());
}
