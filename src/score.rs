//! Severity-weighted scoring.
//!
//! Every finding subtracts its severity weight from a perfect 100; the
//! floor is 0. The table is monotonic, so a report can never score
//! higher by gaining findings.

use serde::Serialize;

use crate::finding::{Finding, Severity};

const WEIGHT_CRITICAL: u64 = 20;
const WEIGHT_HIGH: u64 = 12;
const WEIGHT_MEDIUM: u64 = 6;
const WEIGHT_LOW: u64 = 2;

/// Finding counts per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    pub fn tally(findings: &[Finding]) -> Self {
        let mut counts = Self::default();
        for finding in findings {
            match finding.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }

    fn penalty(&self) -> u64 {
        WEIGHT_CRITICAL * self.critical as u64
            + WEIGHT_HIGH * self.high as u64
            + WEIGHT_MEDIUM * self.medium as u64
            + WEIGHT_LOW * self.low as u64
    }
}

/// The score plus the counts it was derived from.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScoreBreakdown {
    pub score: u8,
    pub by_severity: SeverityCounts,
}

pub fn score(findings: &[Finding]) -> ScoreBreakdown {
    let by_severity = SeverityCounts::tally(findings);
    let score = 100u64.saturating_sub(by_severity.penalty()) as u8;
    ScoreBreakdown { score, by_severity }
}

/// One-line report summary. `usable_scanners` counts adapters whose
/// payload the normalizer could read.
pub fn summary(counts: &SeverityCounts, usable_scanners: usize) -> String {
    if counts.total() == 0 {
        return "No security findings.".to_string();
    }
    format!(
        "{} critical, {} high, {} medium, {} low findings across {} scanner(s).",
        counts.critical, counts.high, counts.medium, counts.low, usable_scanners
    )
}
