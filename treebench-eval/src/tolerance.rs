//! Tolerance Configuration
//!
//! Tolerance bounds are attached to statistics by glob patterns matched
//! against the full statistic path `<treePath>#<dataPath>`. Rules are kept
//! in declaration order; the last matching rule wins. Skip patterns always
//! win over tolerance rules.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Global fallback bounds when no tolerance rule matches.
pub const DEFAULT_TOLERANCE: [f64; 2] = [0.25, 4.0];

/// One ordered tolerance rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToleranceRule {
    /// Glob pattern matched against `<treePath>#<dataPath>`
    pub pattern: String,
    /// Lower ratio bound (inclusive)
    pub low: f64,
    /// Upper ratio bound (inclusive)
    pub high: f64,
}

/// Tolerance and skip configuration for eval runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Ordered tolerance rules; last match wins
    pub tolerance: Vec<ToleranceRule>,
    /// Statistics matching any of these patterns are always skipped
    pub skip: Vec<String>,
}

impl EvalConfig {
    /// Resolve the tolerance bounds for one statistic.
    ///
    /// Returns `None` if the statistic is skipped, otherwise the bounds of
    /// the last matching rule or [`DEFAULT_TOLERANCE`].
    pub fn tolerance_for(&self, tree_path: &str, data_path: &str) -> Option<[f64; 2]> {
        let full = format!("{tree_path}#{data_path}");

        if self.skip.iter().any(|p| glob_match(p, &full)) {
            return None;
        }

        let mut bounds = DEFAULT_TOLERANCE;
        for rule in &self.tolerance {
            if glob_match(&rule.pattern, &full) {
                bounds = [rule.low, rule.high];
            }
        }
        Some(bounds)
    }
}

/// Match `text` against a tolerance glob: `*` matches one or more
/// characters, every other character (including `.` and `|`) is literal.
fn glob_match(pattern: &str, text: &str) -> bool {
    let escaped = regex::escape(pattern).replace(r"\*", ".+");
    match Regex::new(&format!("^{escaped}$")) {
        Ok(re) => re.is_match(text),
        Err(_) => false,
    }
}
