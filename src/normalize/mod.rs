mod checkov;
mod terrascan;
mod tfsec;

use std::collections::BTreeSet;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::finding::{Category, Finding, Severity};
use crate::scanner::{RawScanResult, ScanFailure, ScannerKind};
use crate::terraform::ResourceMatcher;

pub(crate) const DEFAULT_ISSUE: &str = "Policy violation";
pub(crate) const DEFAULT_RECOMMENDATION: &str = "Review and remediate this policy violation.";

/// Per-scanner outcome surfaced in the report.
#[derive(Debug, Clone, Serialize)]
pub struct ScannerStatus {
    pub name: ScannerKind,
    pub status: ScannerState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScannerState {
    Ok,
    Unavailable,
    TimedOut,
    Failed,
}

impl std::fmt::Display for ScannerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::TimedOut => write!(f, "timed_out"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of normalizing every raw result: findings in arrival order
/// plus one status row per scanner.
#[derive(Debug, Clone)]
pub struct NormalizedScan {
    pub findings: Vec<Finding>,
    pub statuses: Vec<ScannerStatus>,
}

impl NormalizedScan {
    /// Scanners that produced a usable payload.
    pub fn usable_scanners(&self) -> usize {
        self.statuses
            .iter()
            .filter(|s| s.status == ScannerState::Ok)
            .count()
    }
}

/// Map every raw result through its tool-specific normalizer. Pure:
/// identical raw results yield identical findings, ids included.
pub fn normalize_all(results: &[RawScanResult], matcher: &ResourceMatcher) -> NormalizedScan {
    let mut findings = Vec::new();
    let mut statuses = Vec::new();

    for raw in results {
        if let Some(failure) = &raw.failure {
            statuses.push(ScannerStatus {
                name: raw.source,
                status: match failure {
                    ScanFailure::Unavailable { .. } => ScannerState::Unavailable,
                    ScanFailure::TimedOut { .. } => ScannerState::TimedOut,
                    ScanFailure::Crashed { .. } => ScannerState::Failed,
                },
                detail: Some(failure.to_string()),
            });
            continue;
        }

        let Some(payload) = &raw.payload else {
            statuses.push(ScannerStatus {
                name: raw.source,
                status: ScannerState::Failed,
                detail: Some("empty payload".to_string()),
            });
            continue;
        };

        let mapped = match raw.source {
            ScannerKind::Checkov => checkov::normalize(payload, matcher),
            ScannerKind::Tfsec => tfsec::normalize(payload, matcher),
            ScannerKind::Terrascan => terrascan::normalize(payload, matcher),
        };

        match mapped {
            Ok(tool_findings) => {
                findings.extend(tool_findings);
                statuses.push(ScannerStatus {
                    name: raw.source,
                    status: ScannerState::Ok,
                    detail: None,
                });
            }
            Err(shape) => {
                tracing::warn!(scanner = %raw.source, error = %shape, "unusable payload shape");
                statuses.push(ScannerStatus {
                    name: raw.source,
                    status: ScannerState::Failed,
                    detail: Some(shape),
                });
            }
        }
    }

    NormalizedScan { findings, statuses }
}

/// Deterministic finding id: the tool name plus a digest over the fields
/// that identify the finding within that tool's output. One tool's ids
/// never change because another tool was unavailable.
pub(crate) fn synth_id(
    source: ScannerKind,
    rule_id: &str,
    resource_key: Option<&str>,
    issue: &str,
    ordinal: usize,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.name().as_bytes());
    hasher.update([0]);
    hasher.update(rule_id.as_bytes());
    hasher.update([0]);
    hasher.update(resource_key.unwrap_or("").as_bytes());
    hasher.update([0]);
    hasher.update(issue.as_bytes());
    hasher.update([0]);
    hasher.update(ordinal.to_le_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}-{}", source.name(), &digest[..12])
}

/// Category detection works on the resource type plus the issue text.
pub(crate) fn categorize(resource_key: Option<&str>, issue: &str) -> Category {
    let rtype = resource_key
        .and_then(|key| key.split('.').next())
        .unwrap_or("");
    Category::detect(&format!("{rtype} {issue}"))
}

/// First candidate with non-whitespace content, trimmed.
pub(crate) fn first_nonempty<I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    candidates
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

/// Keep only well-formed http(s) URLs.
pub(crate) fn valid_links<I>(candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    candidates
        .into_iter()
        .filter(|c| {
            url::Url::parse(c)
                .map(|u| matches!(u.scheme(), "http" | "https"))
                .unwrap_or(false)
        })
        .collect()
}

pub(crate) fn unknown_rule_id(source: ScannerKind) -> String {
    format!("{}.UNKNOWN", source.name().to_uppercase())
}

/// Minimal finding for an item the tool-specific mapper could not read.
/// A scanner emitting one malformed item must not lose its readable ones.
pub(crate) fn degraded_finding(source: ScannerKind, ordinal: usize) -> Finding {
    let issue = format!("unparsed finding from {source}");
    let rule_id = unknown_rule_id(source);
    Finding {
        id: synth_id(source, &rule_id, None, &issue, ordinal),
        severity: Severity::Low,
        source_library: source,
        rule_id,
        resource_key: None,
        category: Category::General,
        issue,
        recommendation: "Inspect the raw scanner output for details.".to_string(),
        links: Vec::new(),
        compliance_tags: BTreeSet::new(),
    }
}
