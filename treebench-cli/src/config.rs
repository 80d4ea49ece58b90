//! Configuration loading from treebench.toml
//!
//! Harness configuration lives in a `treebench.toml` discovered by walking
//! up from the current directory. Command-line flags override it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use treebench_eval::EvalConfig;

/// Treebench configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HarnessConfig {
    /// Default override values for every case
    pub runner: RunnerConfig,
    /// Report log destinations
    pub output: OutputConfig,
    /// Tolerance and skip rules for eval runs
    pub eval: EvalConfig,
}

/// Default case overrides applied to every run
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RunnerConfig {
    /// Override the repeat count of every case
    pub repeat: Option<u32>,
    /// Override the (reserved) per-case timeout, in milliseconds
    pub timeout: Option<u64>,
    /// Include raw per-run results in report records
    pub report_full_results: Option<bool>,
}

/// Report output configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OutputConfig {
    /// Report log destinations, appended to in order
    pub log: Vec<PathBuf>,
}

impl HarnessConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from the
    /// current directory
    pub fn discover() -> Option<Self> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join("treebench.toml");
            if config_path.exists() {
                return Self::load(&config_path).ok();
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# Treebench Configuration

[runner]
# Override the repeat count of every case (uncomment to enable)
# repeat = 10
# Reserved per-case timeout in milliseconds (parsed, not enforced)
# timeout = 60000
# Include raw per-run results in report records
# report_full_results = true

[output]
# Report log destinations (JSON lines, appended in order)
log = ["treebench.log"]

[eval]
# Statistics matching any skip pattern are never compared
skip = []

# Tolerance rules for eval runs; later rules override earlier ones.
# Patterns match "<treePath>#<dataPath>", `*` = one or more characters.
[[eval.tolerance]]
pattern = "*"
low = 0.25
high = 4.0
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HarnessConfig::default();
        assert!(config.runner.repeat.is_none());
        assert!(config.output.log.is_empty());
        assert!(config.eval.tolerance.is_empty());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [runner]
            repeat = 5

            [output]
            log = ["a.log", "b.log"]

            [eval]
            skip = ["root|noisy#*"]

            [[eval.tolerance]]
            pattern = "*"
            low = 0.5
            high = 2.0

            [[eval.tolerance]]
            pattern = "root|slow#*"
            low = 0.1
            high = 10.0
        "#;

        let config: HarnessConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.runner.repeat, Some(5));
        assert_eq!(config.output.log.len(), 2);
        // rule order must survive the TOML round-trip
        assert_eq!(config.eval.tolerance[0].pattern, "*");
        assert_eq!(config.eval.tolerance[1].pattern, "root|slow#*");
        assert_eq!(config.eval.skip, vec!["root|noisy#*".to_string()]);
    }

    #[test]
    fn test_default_toml_parses() {
        let config: HarnessConfig = toml::from_str(&HarnessConfig::default_toml()).unwrap();
        assert_eq!(config.output.log, vec![PathBuf::from("treebench.log")]);
        assert_eq!(config.eval.tolerance.len(), 1);
    }
}
