pub mod json;
pub mod markdown;

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::finding::Finding;
use crate::normalize::{NormalizedScan, ScannerStatus};
use crate::policy::GateVerdict;
use crate::score::{self, ScoreBreakdown};
use crate::terraform::ResourceRecord;

/// The security half of the artifact: score, findings, per-scanner
/// outcomes.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityReport {
    pub score: ScoreBreakdown,
    pub summary: String,
    pub findings_count: usize,
    pub findings: Vec<Finding>,
    pub findings_by_resource: BTreeMap<String, Vec<Finding>>,
    pub scanners: Vec<ScannerStatus>,
}

/// The whole report artifact. Field order here is the key order in the
/// JSON output; the maps inside are `BTreeMap`s, so serializing the same
/// scan twice yields byte-identical documents apart from `scan_id` and
/// `generated_at`.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub scan_id: String,
    pub generated_at: String,
    pub resource_count: usize,
    pub resource_types: Vec<String>,
    pub resources: Vec<ResourceRecord>,
    pub security: SecurityReport,
    pub gate: GateVerdict,
}

/// Assemble the artifact. Sorting and grouping happen once, here, so the
/// JSON and Markdown writers always agree on order.
pub fn build(
    resources: Vec<ResourceRecord>,
    scan: NormalizedScan,
    verdict: GateVerdict,
) -> ScanReport {
    let usable = scan.usable_scanners();
    let NormalizedScan {
        mut findings,
        statuses,
    } = scan;
    sort_findings(&mut findings);

    let breakdown = score::score(&findings);
    let summary = score::summary(&breakdown.by_severity, usable);
    let findings_by_resource = index_by_resource(&findings);

    let resource_types: Vec<String> = resources
        .iter()
        .map(|r| r.resource_type.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    ScanReport {
        scan_id: Uuid::new_v4().to_string(),
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        resource_count: resources.len(),
        resource_types,
        resources,
        security: SecurityReport {
            score: breakdown,
            summary,
            findings_count: findings.len(),
            findings_by_resource,
            findings,
            scanners: statuses,
        },
        gate: verdict,
    }
}

/// Severity descending, then source name; ties keep the scanners' own
/// emit order (the sort is stable).
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by_key(|f| (Reverse(f.severity), f.source_library.name()));
}

/// Group findings by resolved resource. Findings without a resource key
/// appear only in the flat list.
pub fn index_by_resource(findings: &[Finding]) -> BTreeMap<String, Vec<Finding>> {
    let mut index: BTreeMap<String, Vec<Finding>> = BTreeMap::new();
    for finding in findings {
        if let Some(key) = &finding.resource_key {
            index.entry(key.clone()).or_default().push(finding.clone());
        }
    }
    index
}

pub fn write_json(report: &ScanReport, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    fs::write(path, json::render(report)?)?;
    Ok(())
}

pub fn write_markdown(report: &ScanReport, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    fs::write(path, markdown::render(report))?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{Category, Severity};
    use crate::normalize::{ScannerState, ScannerStatus};
    use crate::policy::Gate;
    use crate::scanner::ScannerKind;
    use pretty_assertions::assert_eq;

    fn finding(severity: Severity, source: ScannerKind, resource: Option<&str>, id: &str) -> Finding {
        Finding {
            id: id.to_string(),
            severity,
            source_library: source,
            rule_id: format!("{}-rule", source.name()),
            resource_key: resource.map(str::to_string),
            category: Category::General,
            issue: "issue".to_string(),
            recommendation: "fix".to_string(),
            links: Vec::new(),
            compliance_tags: Default::default(),
        }
    }

    fn resource(rtype: &str, rname: &str) -> ResourceRecord {
        ResourceRecord {
            resource_type: rtype.to_string(),
            resource_name: rname.to_string(),
            file_path: "main.tf".to_string(),
            config: Default::default(),
        }
    }

    fn ok_status(kind: ScannerKind) -> ScannerStatus {
        ScannerStatus {
            name: kind,
            status: ScannerState::Ok,
            detail: None,
        }
    }

    #[test]
    fn sort_is_severity_desc_then_source_then_stable() {
        let mut findings = vec![
            finding(Severity::Low, ScannerKind::Tfsec, None, "a"),
            finding(Severity::Critical, ScannerKind::Tfsec, None, "b"),
            finding(Severity::Critical, ScannerKind::Checkov, None, "c"),
            finding(Severity::Critical, ScannerKind::Checkov, None, "d"),
        ];
        sort_findings(&mut findings);
        let ids: Vec<&str> = findings.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d", "b", "a"]);
    }

    #[test]
    fn index_skips_unmatched_findings() {
        let findings = vec![
            finding(Severity::High, ScannerKind::Checkov, Some("aws_s3_bucket.logs"), "a"),
            finding(Severity::Low, ScannerKind::Tfsec, None, "b"),
            finding(Severity::Low, ScannerKind::Tfsec, Some("aws_s3_bucket.logs"), "c"),
        ];
        let index = index_by_resource(&findings);
        assert_eq!(index.len(), 1);
        let group = &index["aws_s3_bucket.logs"];
        assert_eq!(group.len(), 2);
        assert_eq!(group[0].id, "a");
        assert_eq!(group[1].id, "c");
    }

    #[test]
    fn build_assembles_the_artifact() {
        let resources = vec![
            resource("aws_s3_bucket", "logs"),
            resource("aws_instance", "web"),
        ];
        let scan = NormalizedScan {
            findings: vec![
                finding(Severity::Low, ScannerKind::Tfsec, Some("aws_s3_bucket.logs"), "a"),
                finding(Severity::Critical, ScannerKind::Checkov, Some("aws_s3_bucket.logs"), "b"),
                finding(Severity::High, ScannerKind::Checkov, None, "c"),
            ],
            statuses: vec![
                ok_status(ScannerKind::Checkov),
                ok_status(ScannerKind::Tfsec),
                ScannerStatus {
                    name: ScannerKind::Terrascan,
                    status: ScannerState::Unavailable,
                    detail: Some("binary 'terrascan' not found on PATH".to_string()),
                },
            ],
        };
        let verdict = Gate::new(Some(Severity::Critical)).evaluate(&scan.findings);

        let report = build(resources, scan, verdict);

        assert_eq!(report.resource_count, 2);
        assert_eq!(
            report.resource_types,
            vec!["aws_instance".to_string(), "aws_s3_bucket".to_string()]
        );
        assert_eq!(report.security.findings_count, 3);
        assert_eq!(report.security.score.score, 100 - 20 - 12 - 2);
        assert_eq!(
            report.security.summary,
            "1 critical, 1 high, 0 medium, 1 low findings across 2 scanner(s)."
        );

        // sorted globally, and the per-resource group preserves that order
        let ids: Vec<&str> = report.security.findings.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        let group = &report.security.findings_by_resource["aws_s3_bucket.logs"];
        assert_eq!(group[0].id, "b");
        assert_eq!(group[1].id, "a");

        assert!(!report.gate.passed);
        assert_eq!(report.gate.blocking_count, 1);
        assert!(chrono::DateTime::parse_from_rfc3339(&report.generated_at).is_ok());
    }

    #[test]
    fn scan_ids_differ_between_builds() {
        let make = || {
            build(
                Vec::new(),
                NormalizedScan {
                    findings: Vec::new(),
                    statuses: Vec::new(),
                },
                Gate::new(None).evaluate(&[]),
            )
        };
        assert_ne!(make().scan_id, make().scan_id);
    }

    #[test]
    fn writers_create_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let report = build(
            Vec::new(),
            NormalizedScan {
                findings: Vec::new(),
                statuses: vec![ok_status(ScannerKind::Checkov)],
            },
            Gate::new(None).evaluate(&[]),
        );

        let json_path = dir.path().join("nested/artifacts/report.json");
        write_json(&report, &json_path).unwrap();
        let raw = fs::read_to_string(&json_path).unwrap();
        assert!(serde_json::from_str::<serde_json::Value>(&raw).is_ok());

        let md_path = dir.path().join("nested/artifacts/report.md");
        write_markdown(&report, &md_path).unwrap();
        assert!(fs::read_to_string(&md_path).unwrap().contains("# Terraform security report"));
    }
}
