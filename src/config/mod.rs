use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};
use crate::finding::Severity;
use crate::scanner::ScannerKind;

/// Top-level configuration from `.tfgate.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub scanners: ScannerConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Minimum severity that fails the gate. Absent = report only.
    #[serde(default)]
    pub fail_on: Option<Severity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Scanners to run. Defaults to all three.
    #[serde(default = "default_enabled")]
    pub enabled: Vec<ScannerKind>,
    /// Per-scanner wall-clock budget in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_enabled() -> Vec<ScannerKind> {
    ScannerKind::ALL.to_vec()
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ScannerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load config from a TOML file. Returns default if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Reject settings that would make a run meaningless. Duplicate
    /// scanner entries collapse to the first occurrence.
    pub fn validate(&mut self) -> Result<()> {
        if self.scanners.timeout_secs == 0 {
            return Err(GateError::Config(
                "scanners.timeout_secs must be positive".to_string(),
            ));
        }
        let mut seen: Vec<ScannerKind> = Vec::new();
        self.scanners.enabled.retain(|kind| {
            if seen.contains(kind) {
                false
            } else {
                seen.push(*kind);
                true
            }
        });
        if self.scanners.enabled.is_empty() {
            return Err(GateError::Config("no scanners enabled".to_string()));
        }
        Ok(())
    }

    /// Generate a starter config file.
    pub fn starter_toml() -> &'static str {
        r#"# tfgate configuration
# See https://github.com/limaronaldo/tfgate for documentation.

[policy]
# Minimum severity that fails the gate (low, medium, high, critical).
# Comment out to report without gating.
fail_on = "high"

[scanners]
# Scanners to run.
enabled = ["checkov", "tfsec", "terrascan"]

# Per-scanner wall-clock budget in seconds.
timeout_secs = 300
"#
    }
}
