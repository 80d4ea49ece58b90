//! Report Sink and Log Loading
//!
//! The sink appends newline-delimited JSON records to every configured
//! destination. Loading reads them back for baseline extraction and eval
//! runs; an `Error` record in a log aborts the load, partial eval against
//! corrupted data being worse than no eval.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::record::{EvalRecord, ReportRecord};
use treebench_eval::{BaselineData, EvalConfig, EvalSummary, create_baseline_data, evaluate};

/// Errors raised by the report layer.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Log destination could not be opened or written
    #[error("report log {path}: {source}")]
    Io {
        /// Affected destination
        path: PathBuf,
        /// Underlying failure
        source: std::io::Error,
    },

    /// A record failed to encode or decode
    #[error("report record: {0}")]
    Serde(#[from] serde_json::Error),

    /// Line `line` of the log is not a valid report record
    #[error("{path}:{line}: malformed report record: {message}")]
    MalformedRecord {
        /// Log file
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// Parser message
        message: String,
    },

    /// The log contains an `Error` record and must not feed an eval
    #[error("{path} contains an error record: {error}")]
    ErrorRecord {
        /// Log file
        path: PathBuf,
        /// Message carried by the record
        error: String,
    },
}

/// A set of JSON-lines log destinations.
///
/// With no destinations configured every append is a no-op, which is what
/// isolated children run with (their results travel over the channel).
pub struct ReportSink {
    targets: Vec<(PathBuf, File)>,
}

impl ReportSink {
    /// A sink with no destinations.
    pub fn none() -> Self {
        Self {
            targets: Vec::new(),
        }
    }

    /// Open (append-mode) every given destination.
    pub fn open(paths: &[PathBuf]) -> Result<Self, ReportError> {
        let mut targets = Vec::with_capacity(paths.len());
        for path in paths {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| ReportError::Io {
                    path: path.clone(),
                    source,
                })?;
            targets.push((path.clone(), file));
        }
        Ok(Self { targets })
    }

    /// Whether any destination is configured.
    pub fn is_active(&self) -> bool {
        !self.targets.is_empty()
    }

    /// Append one record to every destination.
    pub fn append(&mut self, record: &ReportRecord) -> Result<(), ReportError> {
        if self.targets.is_empty() {
            return Ok(());
        }
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        for (path, file) in &mut self.targets {
            file.write_all(line.as_bytes())
                .and_then(|_| file.flush())
                .map_err(|source| ReportError::Io {
                    path: path.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Append an `Error` record to every destination, ignoring sink
    /// failures: this runs on the way out of a failing engine and must not
    /// mask the original error.
    pub fn append_error(&mut self, message: &str) {
        let _ = self.append(&ReportRecord::error(message));
    }
}

/// Load all records of a newline-delimited report log.
///
/// Encountering an `Error` record aborts the load with
/// [`ReportError::ErrorRecord`].
pub fn load_records(path: &Path) -> Result<Vec<ReportRecord>, ReportError> {
    let file = File::open(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ReportRecord =
            serde_json::from_str(&line).map_err(|e| ReportError::MalformedRecord {
                path: path.to_path_buf(),
                line: index + 1,
                message: e.to_string(),
            })?;
        if let ReportRecord::Error(err) = &record {
            return Err(ReportError::ErrorRecord {
                path: path.to_path_buf(),
                error: err.error.clone(),
            });
        }
        records.push(record);
    }
    Ok(records)
}

/// Fold every `PerfCase` record of a log into baseline data keyed by case
/// path string. Later records for the same case replace earlier ones.
pub fn get_data_for_baseline(path: &Path) -> Result<BaselineData, ReportError> {
    let mut data = BaselineData::new();
    for record in load_records(path)? {
        if let ReportRecord::PerfCase(case) = record {
            data.insert(case.path_string.clone(), create_baseline_data(&case.summary));
        }
    }
    Ok(data)
}

/// Run an eval: load baseline and eval logs, classify every statistic and
/// return the annotated record.
pub fn eval_run(
    config: &EvalConfig,
    baseline_path: &Path,
    eval_path: &Path,
) -> Result<EvalRecord, ReportError> {
    let mut baseline = get_data_for_baseline(baseline_path)?;
    let current = get_data_for_baseline(eval_path)?;
    let summary: EvalSummary = evaluate(config, &mut baseline, &current);
    Ok(EvalRecord {
        data: baseline,
        summary,
    })
}
