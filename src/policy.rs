//! The policy gate.
//!
//! CI callers pick a severity threshold; any finding at or above it
//! blocks the pipeline. The gate only decides pass/fail, it never
//! filters the report.

use serde::Serialize;

use crate::finding::{Finding, Severity};

#[derive(Debug, Clone, Copy)]
pub struct Gate {
    fail_on: Option<Severity>,
}

impl Gate {
    /// `None` means no gate: the scan reports but never fails the build.
    pub fn new(fail_on: Option<Severity>) -> Self {
        Self { fail_on }
    }

    pub fn evaluate(&self, findings: &[Finding]) -> GateVerdict {
        let Some(threshold) = self.fail_on else {
            return GateVerdict {
                passed: true,
                blocking_count: 0,
                threshold: None,
            };
        };
        let blocking_count = findings
            .iter()
            .filter(|f| f.severity >= threshold)
            .count();
        GateVerdict {
            passed: blocking_count == 0,
            blocking_count,
            threshold: Some(threshold),
        }
    }
}

/// Outcome of the gate, embedded verbatim in the report artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GateVerdict {
    pub passed: bool,
    pub blocking_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<Severity>,
}
