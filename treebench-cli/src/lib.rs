//! Treebench CLI Library
//!
//! CLI infrastructure for harness binaries. Call `treebench::run()` from
//! your binary's `main` to get the full front-end over your registered
//! suites:
//!
//! ```ignore
//! use treebench::prelude::*;
//!
//! fn parser_suite(s: &Scope) {
//!     s.time_it("small input", || parse(SMALL));
//! }
//! treebench::suite!("parser", parser_suite);
//!
//! fn main() -> anyhow::Result<()> {
//!     treebench::run()
//! }
//! ```

mod config;

pub use config::{HarnessConfig, OutputConfig, RunnerConfig};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use treebench_core::{suites, CmdlineOverrides, Session};
use treebench_eval::EvalState;
use treebench_report::{eval_run, get_data_for_baseline, BaseRecord, ReportRecord, ReportSink};

/// Exit code for unexpected engine errors.
pub const EXIT_ENGINE_ERROR: i32 = 1;
/// Exit code for an eval run with failing statistics.
pub const EXIT_EVAL_FAILED: i32 = 2;
/// Exit code for an eval run with missing statistics under `--strict`.
pub const EXIT_EVAL_MISSING: i32 = 3;

/// Treebench CLI arguments
#[derive(Parser, Debug)]
#[command(name = "treebench")]
#[command(author, version, about = "treebench - declarative tree-structured perf harness")]
pub struct Cli {
    /// Optional subcommand; defaults to running the given paths
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Tree paths to run, `suite|context|case` form; empty runs every suite
    pub paths: Vec<String>,

    /// Append report records to this log file (repeatable)
    #[arg(long = "log", value_name = "PATH")]
    pub log: Vec<PathBuf>,

    /// Override the repeat count of every case
    #[arg(long)]
    pub repeat: Option<u32>,

    /// Override the (reserved) per-case timeout in milliseconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Include raw per-run results in report records
    #[arg(long)]
    pub full_results: bool,

    /// Verbose engine diagnostics
    #[arg(short, long)]
    pub verbose: bool,

    /// Internal: run as an isolated child (used by the fork channel)
    #[arg(long, hide = true)]
    pub tree_child: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run tree paths (default)
    Run {
        /// Tree paths, `suite|context|case` form; empty runs every suite
        paths: Vec<String>,
    },
    /// List all registered suites
    List,
    /// Print the context/case tree of a suite as JSON
    Tree {
        /// Suite name
        suite: String,
    },
    /// Print baseline data extracted from a report log
    Baseline {
        /// Report log to read
        log: PathBuf,
    },
    /// Compare an eval report log against a baseline log
    Eval {
        /// Baseline report log
        base: PathBuf,
        /// Eval report log
        eval: PathBuf,
        /// Also fail (exit 3) when baseline statistics are missing
        #[arg(long)]
        strict: bool,
    },
}

/// Run the treebench CLI. This is the main entry point for harness
/// binaries.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the treebench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    // Child mode first, before any other initialization: the parent is
    // waiting on the pipe.
    if cli.tree_child {
        return treebench_core::child_main()
            .map_err(|e| anyhow::anyhow!("isolated child failed: {e}"));
    }

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("treebench=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("treebench=info")
            .init();
    }

    // Discover treebench.toml (CLI flags override)
    let config = HarnessConfig::discover().unwrap_or_default();
    let overrides = build_overrides(&cli, &config);
    let log_paths = resolve_log_paths(&cli, &config);

    match cli.command {
        Some(Commands::List) => list_suites(),
        Some(Commands::Tree { ref suite }) => show_tree(suite, &log_paths),
        Some(Commands::Baseline { ref log }) => show_baseline(log, &log_paths),
        Some(Commands::Eval {
            ref base,
            ref eval,
            strict,
        }) => eval_logs(&config, base, eval, strict, &log_paths),
        Some(Commands::Run { ref paths }) => run_paths(paths, overrides, &log_paths),
        None => run_paths(&cli.paths, overrides, &log_paths),
    }
}

/// Layer config-file defaults under CLI flags.
fn build_overrides(cli: &Cli, config: &HarnessConfig) -> CmdlineOverrides {
    CmdlineOverrides {
        repeat: cli.repeat.or(config.runner.repeat),
        timeout: cli.timeout.or(config.runner.timeout),
        report_full_results: if cli.full_results {
            Some(true)
        } else {
            config.runner.report_full_results
        },
    }
}

fn resolve_log_paths(cli: &Cli, config: &HarnessConfig) -> Vec<PathBuf> {
    if cli.log.is_empty() {
        config.output.log.clone()
    } else {
        cli.log.clone()
    }
}

/// Split a `suite|context|case` argument into a tree path.
fn parse_tree_path(arg: &str) -> Vec<String> {
    arg.split('|')
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Write the fatal error everywhere it belongs and exit non-zero.
fn fail_engine(session: Option<&Session>, sinks: &[PathBuf], message: &str) -> ! {
    eprintln!("treebench: {message}");
    match session {
        Some(session) => session.report_error(message),
        None => {
            if let Ok(mut sink) = ReportSink::open(sinks) {
                sink.append_error(message);
            }
        }
    }
    std::process::exit(EXIT_ENGINE_ERROR);
}

fn run_paths(
    paths: &[String],
    overrides: CmdlineOverrides,
    log_paths: &[PathBuf],
) -> anyhow::Result<()> {
    let sink = match ReportSink::open(log_paths) {
        Ok(sink) => sink,
        Err(e) => fail_engine(None, &[], &e.to_string()),
    };
    let session = Session::new(overrides, sink);

    let outcome = if paths.is_empty() {
        session.run_all()
    } else {
        paths
            .iter()
            .try_for_each(|path| session.run(&parse_tree_path(path)))
    };

    if let Err(e) = outcome {
        fail_engine(Some(&session), log_paths, &e.to_string());
    }
    Ok(())
}

fn list_suites() -> anyhow::Result<()> {
    let mut total = 0;
    for suite in suites() {
        println!("{}", suite.name);
        total += 1;
    }
    println!("{total} suites registered.");
    Ok(())
}

fn show_tree(suite: &str, log_paths: &[PathBuf]) -> anyhow::Result<()> {
    let session = Session::new(CmdlineOverrides::default(), ReportSink::none());
    match session.show_tree(suite) {
        Ok(tree) => {
            println!("{}", serde_json::to_string_pretty(&tree)?);
            Ok(())
        }
        Err(e) => fail_engine(Some(&session), log_paths, &e.to_string()),
    }
}

fn show_baseline(log: &PathBuf, log_paths: &[PathBuf]) -> anyhow::Result<()> {
    let data = match get_data_for_baseline(log) {
        Ok(data) => data,
        Err(e) => fail_engine(None, log_paths, &e.to_string()),
    };
    println!("{}", serde_json::to_string_pretty(&data)?);

    let mut sink = ReportSink::open(log_paths)?;
    sink.append(&ReportRecord::Base(BaseRecord { data }))?;
    Ok(())
}

fn eval_logs(
    config: &HarnessConfig,
    base: &PathBuf,
    eval: &PathBuf,
    strict: bool,
    log_paths: &[PathBuf],
) -> anyhow::Result<()> {
    let record = match eval_run(&config.eval, base, eval) {
        Ok(record) => record,
        Err(e) => fail_engine(None, log_paths, &e.to_string()),
    };

    for (tree_path, case) in &record.data {
        println!("{tree_path}");
        for entries in case.values() {
            for entry in entries {
                let state = match entry.eval {
                    Some(EvalState::Success) => "ok     ",
                    Some(EvalState::Failed) => "FAILED ",
                    Some(EvalState::Skipped) => "skipped",
                    Some(EvalState::Missing) => "missing",
                    None => "-      ",
                };
                let change = entry
                    .change
                    .map(|c| format!(" ({c:+.2}%)"))
                    .unwrap_or_default();
                let value = entry
                    .value
                    .map(|v| format!("{v:.4}"))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "  {state} {stat}: {base:.4} -> {value}{change}",
                    stat = entry.stat,
                    base = entry.base
                );
            }
        }
    }
    let summary = record.summary;
    println!(
        "\neval: {} ok, {} failed, {} skipped, {} missing",
        summary.success, summary.failed, summary.skipped, summary.missing
    );

    let mut sink = ReportSink::open(log_paths)?;
    sink.append(&ReportRecord::Eval(record))?;

    if summary.has_failures() {
        std::process::exit(EXIT_EVAL_FAILED);
    }
    if strict && summary.has_missing() {
        std::process::exit(EXIT_EVAL_MISSING);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tree_path() {
        assert_eq!(
            parse_tree_path("suite|ctx|case#1"),
            vec!["suite", "ctx", "case#1"]
        );
        assert_eq!(parse_tree_path("suite"), vec!["suite"]);
        assert!(parse_tree_path("").is_empty());
    }

    #[test]
    fn test_cli_default_run_paths() {
        let cli = Cli::try_parse_from(["treebench", "suiteA|caseB", "--repeat", "5"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.paths, vec!["suiteA|caseB"]);
        assert_eq!(cli.repeat, Some(5));
    }

    #[test]
    fn test_cli_eval_subcommand() {
        let cli =
            Cli::try_parse_from(["treebench", "eval", "base.log", "new.log", "--strict"]).unwrap();
        match cli.command {
            Some(Commands::Eval { strict, .. }) => assert!(strict),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_hidden_child_flag() {
        let cli = Cli::try_parse_from(["treebench", "--tree-child"]).unwrap();
        assert!(cli.tree_child);
    }

    #[test]
    fn test_overrides_cli_wins_over_config() {
        let cli = Cli::try_parse_from(["treebench", "--repeat", "3"]).unwrap();
        let config = HarnessConfig {
            runner: RunnerConfig {
                repeat: Some(10),
                timeout: Some(500),
                report_full_results: Some(true),
            },
            ..Default::default()
        };
        let overrides = build_overrides(&cli, &config);
        assert_eq!(overrides.repeat, Some(3));
        assert_eq!(overrides.timeout, Some(500));
        assert_eq!(overrides.report_full_results, Some(true));
    }

    #[test]
    fn test_log_paths_cli_replaces_config() {
        let cli = Cli::try_parse_from(["treebench", "--log", "cli.log"]).unwrap();
        let config = HarnessConfig {
            output: OutputConfig {
                log: vec![PathBuf::from("config.log")],
            },
            ..Default::default()
        };
        assert_eq!(resolve_log_paths(&cli, &config), vec![PathBuf::from("cli.log")]);

        let bare = Cli::try_parse_from(["treebench"]).unwrap();
        assert_eq!(
            resolve_log_paths(&bare, &config),
            vec![PathBuf::from("config.log")]
        );
    }
}
