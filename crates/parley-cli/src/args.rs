//! CLI argument definitions using clap
//!
//! - parley eval -t <tasks>      # Evaluate the configured model
//! - parley list                 # Show metric families and built-in tasks

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(about = "Parley - multi-task evaluation engine for conversational models")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate a model on one or more tasks
    Eval(EvalArgs),

    /// List metric families and built-in tasks
    List,
}

/// Options of `parley eval`; unset options fall back to the config file,
/// then to built-in defaults
#[derive(Args, Debug, Default)]
pub struct EvalArgs {
    /// Comma-separated task names
    #[arg(short = 't', long)]
    pub task: Option<String>,

    /// Built-in model name (repeat_label, random_candidate)
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// Data split and modifiers, e.g. valid, test, train:evalmode, valid:stream
    #[arg(short = 'd', long)]
    pub datatype: Option<String>,

    /// Metric vocabulary: all, default, or a comma list of families
    #[arg(long)]
    pub metrics: Option<String>,

    /// Weight global metrics by example instead of by task
    /// (`--aggregate-micro false` restores per-task weighting)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub aggregate_micro: Option<bool>,

    /// Per-task example cap
    #[arg(short = 'n', long)]
    pub num_examples: Option<u64>,

    /// Per-task epochs, fractional allowed
    #[arg(long)]
    pub num_epochs: Option<f64>,

    /// Examples per model call
    #[arg(short = 'b', long)]
    pub batchsize: Option<usize>,

    /// Wall-clock deadline for the whole run
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Tasks evaluated concurrently
    #[arg(long)]
    pub max_parallel_tasks: Option<usize>,

    /// Print a report block every N examples
    #[arg(long)]
    pub log_every_n_examples: Option<u64>,

    /// Log every example and prediction (visible with RUST_LOG=debug)
    #[arg(long)]
    pub display_examples: bool,

    /// Seed for shuffling and random models
    #[arg(long)]
    pub seed: Option<u64>,

    /// YAML or JSON file with evaluation options
    #[arg(long)]
    pub config_file: Option<PathBuf>,

    /// Final report format: table, json, markdown
    #[arg(long, default_value = "table")]
    pub format: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_eval() {
        let cli = Cli::try_parse_from([
            "parley",
            "eval",
            "-t",
            "integration_tests,integration_tests:multiturnCandidate",
            "--num-epochs",
            "0.5",
            "--aggregate-micro",
            "-b",
            "16",
        ])
        .unwrap();

        match cli.command {
            Commands::Eval(args) => {
                assert_eq!(args.num_epochs, Some(0.5));
                assert_eq!(args.batchsize, Some(16));
                assert_eq!(args.aggregate_micro, Some(true));
                assert_eq!(args.format, "table");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_aggregate_micro_values() {
        let parse = |extra: &[&str]| {
            let argv = ["parley", "eval"].iter().chain(extra).copied().collect::<Vec<_>>();
            match Cli::try_parse_from(argv).unwrap().command {
                Commands::Eval(args) => args.aggregate_micro,
                other => panic!("unexpected command {other:?}"),
            }
        };
        assert_eq!(parse(&[]), None);
        assert_eq!(parse(&["--aggregate-micro"]), Some(true));
        assert_eq!(parse(&["--aggregate-micro", "false"]), Some(false));
        assert_eq!(parse(&["--aggregate-micro=true"]), Some(true));
    }

    #[test]
    fn test_parse_list() {
        let cli = Cli::try_parse_from(["parley", "list"]).unwrap();
        assert!(matches!(cli.command, Commands::List));
    }
}
