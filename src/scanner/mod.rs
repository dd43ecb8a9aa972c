pub mod exec;

use std::path::Path;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use exec::{CommandOutput, ExecError};

/// The external scanners this tool drives. A closed set: adding one means
/// adding a normalizer for its payload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerKind {
    Checkov,
    Tfsec,
    Terrascan,
}

impl ScannerKind {
    pub const ALL: [ScannerKind; 3] = [
        ScannerKind::Checkov,
        ScannerKind::Tfsec,
        ScannerKind::Terrascan,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Checkov => "checkov",
            Self::Tfsec => "tfsec",
            Self::Terrascan => "terrascan",
        }
    }

    pub fn binary(&self) -> &'static str {
        self.name()
    }

    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "checkov" => Some(Self::Checkov),
            "tfsec" => Some(Self::Tfsec),
            "terrascan" => Some(Self::Terrascan),
            _ => None,
        }
    }

    /// Command line for scanning `dir`. All three are told to emit JSON.
    pub fn args(&self, dir: &Path) -> Vec<String> {
        let dir = dir.display().to_string();
        match self {
            Self::Checkov => vec![
                "-d".into(),
                dir,
                "--framework".into(),
                "terraform".into(),
                "--output".into(),
                "json".into(),
                "--quiet".into(),
            ],
            Self::Tfsec => vec![dir, "--format".into(), "json".into(), "--no-color".into()],
            Self::Terrascan => vec![
                "scan".into(),
                "-d".into(),
                dir,
                "-i".into(),
                "terraform".into(),
                "-o".into(),
                "json".into(),
            ],
        }
    }

    /// Exit codes that mean "the scan ran; findings may be present".
    /// checkov and tfsec exit 1 when they find violations. terrascan
    /// exits 3 for violations and 4 for violations plus scan errors,
    /// and both still carry a usable payload.
    pub fn benign_exit(&self, code: i32) -> bool {
        match self {
            Self::Checkov | Self::Tfsec => matches!(code, 0 | 1),
            Self::Terrascan => matches!(code, 0 | 3 | 4),
        }
    }

    /// Run this scanner against `dir`. Never fails: every outcome is a
    /// `RawScanResult`, with `failure` set when no usable payload exists.
    pub fn invoke(&self, dir: &Path, timeout: Duration) -> RawScanResult {
        let args = self.args(dir);
        tracing::debug!(scanner = %self, ?args, "invoking scanner");

        let output = match exec::run_command(self.binary(), &args, timeout) {
            Ok(output) => output,
            Err(ExecError::NotFound) => {
                return RawScanResult::failed(
                    *self,
                    ScanFailure::Unavailable {
                        binary: self.binary().to_string(),
                    },
                );
            }
            Err(ExecError::TimedOut) => {
                return RawScanResult::failed(
                    *self,
                    ScanFailure::TimedOut {
                        limit_secs: timeout.as_secs(),
                    },
                );
            }
            Err(ExecError::Io(e)) => {
                return RawScanResult::failed(
                    *self,
                    ScanFailure::Crashed {
                        exit_code: None,
                        detail: e.to_string(),
                    },
                );
            }
        };

        self.classify(output)
    }

    /// Turn a finished process into a result: crash on a non-benign exit,
    /// otherwise require a JSON document on stdout.
    fn classify(&self, output: CommandOutput) -> RawScanResult {
        let benign = output.exit_code.is_some_and(|code| self.benign_exit(code));
        let payload = if benign {
            rescue_json(&output.stdout)
        } else {
            None
        };

        let failure = if !benign {
            Some(ScanFailure::Crashed {
                exit_code: output.exit_code,
                detail: short_detail(&output.stderr, &output.stdout),
            })
        } else if payload.is_none() {
            Some(ScanFailure::Crashed {
                exit_code: output.exit_code,
                detail: "no JSON document on stdout".to_string(),
            })
        } else {
            None
        };

        RawScanResult {
            source: *self,
            exit_status: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            payload,
            failure,
        }
    }
}

impl std::fmt::Display for ScannerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Why one scanner produced no usable payload. Soft: recorded in the
/// report, never aborts the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanFailure {
    Unavailable { binary: String },
    TimedOut { limit_secs: u64 },
    Crashed { exit_code: Option<i32>, detail: String },
}

impl std::fmt::Display for ScanFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable { binary } => write!(f, "binary '{binary}' not found on PATH"),
            Self::TimedOut { limit_secs } => write!(f, "timed out after {limit_secs}s"),
            Self::Crashed {
                exit_code: Some(code),
                detail,
            } => write!(f, "exited with code {code}: {detail}"),
            Self::Crashed {
                exit_code: None,
                detail,
            } => write!(f, "died without an exit code: {detail}"),
        }
    }
}

/// What came back from one scanner invocation, before normalization.
#[derive(Debug, Clone)]
pub struct RawScanResult {
    pub source: ScannerKind,
    pub exit_status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Parsed JSON document, when stdout contained one.
    pub payload: Option<serde_json::Value>,
    pub failure: Option<ScanFailure>,
}

impl RawScanResult {
    fn failed(source: ScannerKind, failure: ScanFailure) -> Self {
        tracing::warn!(scanner = %source, error = %failure, "scanner failed, continuing without it");
        Self {
            source,
            exit_status: None,
            stdout: String::new(),
            stderr: String::new(),
            payload: None,
            failure: Some(failure),
        }
    }
}

/// Run every requested scanner against `dir`, one thread per scanner.
/// A scanner that fails in any way (missing binary, timeout, crash,
/// even a panic in its own thread) degrades to a failure result; the
/// others are unaffected. Results come back in `kinds` order.
pub fn run_all(dir: &Path, kinds: &[ScannerKind], timeout: Duration) -> Vec<RawScanResult> {
    thread::scope(|scope| {
        let handles: Vec<_> = kinds
            .iter()
            .map(|&kind| (kind, scope.spawn(move || kind.invoke(dir, timeout))))
            .collect();

        handles
            .into_iter()
            .map(|(kind, handle)| {
                handle.join().unwrap_or_else(|_| {
                    RawScanResult::failed(
                        kind,
                        ScanFailure::Crashed {
                            exit_code: None,
                            detail: "scanner thread panicked".to_string(),
                        },
                    )
                })
            })
            .collect()
    })
}

/// Parse stdout as JSON. Scanners wrap their documents in progress noise
/// often enough that a failed whole-string parse retries on the slice
/// from the first `{` to the last `}`.
pub fn rescue_json(stdout: &str) -> Option<serde_json::Value> {
    let text = stdout.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

fn short_detail(stderr: &str, stdout: &str) -> String {
    let text = if stderr.trim().is_empty() { stdout } else { stderr };
    let line = text
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim();
    if line.is_empty() {
        return "no diagnostic output".to_string();
    }
    line.chars().take(200).collect()
}
