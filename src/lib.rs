//! tfgate: a security gate for Terraform.
//!
//! Drives checkov, tfsec and terrascan against a Terraform tree, merges
//! their findings into one scored report, and fails CI builds when
//! findings reach a configured severity.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use tfgate::{analyze, AnalyzeOptions};
//!
//! let options = AnalyzeOptions::default();
//! let report = analyze(Path::new("./infra"), &options).unwrap();
//! println!(
//!     "score {}/100, gate passed: {}",
//!     report.security.score.score, report.gate.passed
//! );
//! ```

pub mod config;
pub mod error;
pub mod finding;
pub mod normalize;
pub mod policy;
pub mod report;
pub mod scanner;
pub mod score;
pub mod terraform;

use std::path::{Path, PathBuf};

use config::Config;
use error::{GateError, Result};
use finding::Severity;
use policy::Gate;
use report::ScanReport;
use scanner::ScannerKind;
use terraform::ResourceMatcher;

/// Options for one `analyze` invocation. CLI flags override config file
/// values field by field.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Explicit config file (defaults to `.tfgate.toml` in the scan root).
    pub config_path: Option<PathBuf>,
    /// Gate threshold override.
    pub fail_on: Option<Severity>,
    /// Enabled scanner set override.
    pub scanners: Option<Vec<ScannerKind>>,
    /// Per-scanner timeout override, in seconds.
    pub timeout_secs: Option<u64>,
}

/// Run the full pipeline: extract resources, fan out the scanners,
/// normalize their output, score, gate, assemble the artifact.
///
/// Individual scanner failures degrade the report. Only a run where no
/// scanner produced a usable payload is an error.
pub fn analyze(path: &Path, options: &AnalyzeOptions) -> Result<ScanReport> {
    let target = terraform::parse_target(path)?;

    let config_path = options
        .config_path
        .clone()
        .unwrap_or_else(|| target.root.join(".tfgate.toml"));
    let mut config = Config::load(&config_path)?;
    if let Some(fail_on) = options.fail_on {
        config.policy.fail_on = Some(fail_on);
    }
    if let Some(scanners) = &options.scanners {
        config.scanners.enabled = scanners.clone();
    }
    if let Some(secs) = options.timeout_secs {
        config.scanners.timeout_secs = secs;
    }
    config.validate()?;

    tracing::info!(
        root = %target.root.display(),
        resources = target.resources.len(),
        scanners = ?config.scanners.enabled,
        timeout_secs = config.scanners.timeout_secs,
        "starting scan"
    );

    let results = scanner::run_all(
        &target.root,
        &config.scanners.enabled,
        config.scanners.timeout(),
    );
    let matcher = ResourceMatcher::new(&target.resources);
    let scan = normalize::normalize_all(&results, &matcher);

    if scan.usable_scanners() == 0 {
        let detail = scan
            .statuses
            .iter()
            .map(|s| {
                format!(
                    "{}: {}",
                    s.name,
                    s.detail.as_deref().unwrap_or("unusable payload")
                )
            })
            .collect::<Vec<_>>()
            .join("; ");
        return Err(GateError::AllScannersFailed(detail));
    }

    let verdict = Gate::new(config.policy.fail_on).evaluate(&scan.findings);
    Ok(report::build(target.resources, scan, verdict))
}
