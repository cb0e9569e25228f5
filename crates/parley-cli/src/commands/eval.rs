//! Evaluation commands

use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use parley_eval::metrics::MetricRegistry;
use parley_eval::report::{REPORT_DELIMITER, ReportFormat, ReportLog, generate_report};
use parley_eval::runner::{EpochController, EvalConfig, EvalProgress};
use parley_eval::tasks::DataType;

use crate::args::EvalArgs;

/// Built-in task names shown by `parley list`
const BUILTIN_TASKS: &[&str] = &[
    "integration_tests",
    "integration_tests:multiturnCandidate",
    "integration_tests:fixed_dialog_candidate",
];

/// Merge command-line options over the config file (or the defaults)
pub fn build_config(args: &EvalArgs) -> Result<EvalConfig> {
    let mut config = match &args.config_file {
        Some(path) => EvalConfig::from_file(path)?,
        None => EvalConfig::default(),
    };

    if let Some(task) = &args.task {
        config.task = task.clone();
    }
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(datatype) = &args.datatype {
        config.datatype = datatype.parse::<DataType>()?;
    }
    if let Some(metrics) = &args.metrics {
        config.metrics = Some(metrics.clone());
    }
    if let Some(micro) = args.aggregate_micro {
        config.aggregate_micro = micro;
    }
    if let Some(n) = args.num_examples {
        config.num_examples = Some(n);
    }
    if let Some(epochs) = args.num_epochs {
        config.num_epochs = Some(epochs);
    }
    if let Some(batchsize) = args.batchsize {
        config.batchsize = batchsize;
    }
    if let Some(secs) = args.timeout_secs {
        config.timeout_secs = Some(secs);
    }
    if let Some(n) = args.max_parallel_tasks {
        config.max_parallel_tasks = n;
    }
    if let Some(n) = args.log_every_n_examples {
        config.log_every_n_examples = Some(n);
    }
    if args.display_examples {
        config.display_examples = true;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    Ok(config)
}

/// Run an evaluation
///
/// With `--log-every-n-examples` the report dump is streamed to stdout, one
/// block per update separated by `---`; the final report follows.
pub async fn run(args: EvalArgs) -> Result<()> {
    let config = build_config(&args)?;
    let report_format = ReportFormat::from_str(&args.format).unwrap_or(ReportFormat::Table);
    let stream_blocks = config.log_every_n_examples.is_some();

    let mut controller = EpochController::from_config(config)?;

    if stream_blocks {
        let log = Arc::new(Mutex::new(ReportLog::new()));
        controller.set_progress_callback(Arc::new(move |progress: EvalProgress| {
            let mut log = log.lock();
            if !log.is_empty() {
                print!("{REPORT_DELIMITER}");
            }
            println!("{}", log.push(&progress.report));
        }));
    }

    // Ctrl+C stops every task at its next batch boundary
    let token = controller.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling evaluation");
            token.cancel();
        }
    });

    let summary = match controller.run().await {
        Ok(summary) => summary,
        Err(e) => {
            for run in controller.finished() {
                eprintln!(
                    "finished before failure: {} ({} exs, accuracy {:?})",
                    run.task_id,
                    run.report.exs,
                    run.report.accuracy()
                );
            }
            return Err(e.into());
        }
    };

    if stream_blocks {
        println!();
    }
    println!("{}", generate_report(&summary, report_format)?);
    Ok(())
}

/// List metric families and built-in tasks
pub fn list() {
    println!("Metric families:\n");
    println!("{:<12} {}", "Family", "Metrics");
    println!("{:-<40}", "");
    for family in MetricRegistry::families() {
        let members = MetricRegistry::members(family).unwrap_or_default();
        println!("{:<12} {}", family, members.join(", "));
    }

    println!("\nBuilt-in tasks:\n");
    for task in BUILTIN_TASKS {
        println!("  {task}");
    }
    println!("  file:<path>   (YAML/JSON file or directory of examples)");
}
