use std::fmt::Write as _;

use super::ScanReport;
use crate::finding::{Finding, Severity};

/// Render the artifact as a Markdown document, grouped by severity.
/// Meant for CI artifact upload or PR comments.
pub fn render(report: &ScanReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# Terraform security report");
    let _ = writeln!(out);
    let _ = writeln!(out, "- Score: **{}/100**", report.security.score.score);
    let _ = writeln!(out, "- {}", report.security.summary);
    let _ = writeln!(out, "- Resources scanned: {}", report.resource_count);
    let _ = writeln!(out, "- Generated: {}", report.generated_at);
    let _ = writeln!(out, "- Scan id: `{}`", report.scan_id);
    match report.gate.threshold {
        Some(threshold) if !report.gate.passed => {
            let _ = writeln!(
                out,
                "- Gate: **failed** ({} finding(s) at or above {threshold})",
                report.gate.blocking_count
            );
        }
        Some(threshold) => {
            let _ = writeln!(out, "- Gate: passed (fail-on: {threshold})");
        }
        None => {
            let _ = writeln!(out, "- Gate: not configured");
        }
    }

    let counts = &report.security.score.by_severity;
    let _ = writeln!(out);
    let _ = writeln!(out, "| Severity | Count |");
    let _ = writeln!(out, "|---|---|");
    for severity in Severity::DESCENDING {
        let count = match severity {
            Severity::Critical => counts.critical,
            Severity::High => counts.high,
            Severity::Medium => counts.medium,
            Severity::Low => counts.low,
        };
        let _ = writeln!(out, "| {severity} | {count} |");
    }

    if report.security.findings.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "_No findings._");
    }

    for severity in Severity::DESCENDING {
        let group: Vec<&Finding> = report
            .security
            .findings
            .iter()
            .filter(|f| f.severity == severity)
            .collect();
        if group.is_empty() {
            continue;
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "## {severity} ({})", group.len());
        let _ = writeln!(out);
        let _ = writeln!(out, "| Rule | Resource | Source | Issue | Recommendation |");
        let _ = writeln!(out, "|---|---|---|---|---|");
        for f in group {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} |",
                cell(&f.rule_id),
                cell(f.resource_key.as_deref().unwrap_or("-")),
                f.source_library,
                cell(&f.issue),
                cell(&f.recommendation),
            );
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "## Scanners");
    let _ = writeln!(out);
    let _ = writeln!(out, "| Scanner | Status | Detail |");
    let _ = writeln!(out, "|---|---|---|");
    for scanner in &report.security.scanners {
        let detail = scanner.detail.as_deref().unwrap_or("-");
        let _ = writeln!(out, "| {} | {} | {} |", scanner.name, scanner.status, cell(detail));
    }

    out
}

/// Table cells must not break the row: escape pipes, flatten newlines.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
