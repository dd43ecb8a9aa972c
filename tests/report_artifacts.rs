#![cfg(unix)]

//! Artifact content checks: the JSON and Markdown reports written by
//! `--out-json` / `--out-md`, produced against fake scanners on PATH.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;

const TF_FIXTURE: &str = r#"resource "aws_s3_bucket" "logs" {
  bucket = "corp-logs"
  acl    = "private"
}

resource "aws_security_group" "web" {
  name = "web"
}
"#;

const CHECKOV_FINDINGS: &str = r#"{"results": {"failed_checks": [
  {"check_id": "CKV_AWS_18", "check_name": "Ensure the S3 bucket has access logging enabled", "severity": "HIGH", "resource": "aws_s3_bucket.logs", "guideline": "https://docs.example.com/ckv/18"},
  {"check_id": "CKV_AWS_21", "check_name": "Ensure the S3 bucket has versioning enabled", "severity": "MEDIUM", "resource": "aws_s3_bucket.logs"}
]}}"#;

const TFSEC_FINDINGS: &str = r#"{"results": [
  {"long_id": "aws-ec2-no-public-ingress-sgr", "rule_id": "AVD-AWS-0107", "description": "Security group rule allows inbound traffic from 0.0.0.0/0.", "resolution": "Restrict the CIDR range.", "severity": "CRITICAL", "resource": "aws_security_group.web"}
]}"#;

const TERRASCAN_FINDINGS: &str = r#"{"results": {"violations": [
  {"rule_id": "AWS.S3.LOW.0001", "rule_name": "s3Versioning", "description": "S3 bucket versioning is disabled.", "severity": "LOW", "resource_name": "logs", "resource_type": "aws_s3_bucket"}
], "count": {"low": 1}}}"#;

const CHECKOV_CLEAN: &str = r#"{"results": {"failed_checks": []}, "summary": {"passed": 4, "failed": 0}}"#;
const TERRASCAN_CLEAN: &str = r#"{"results": {"violations": null, "count": {}}}"#;

fn shim_script(json: &str, exit_code: i32) -> String {
    format!("#!/bin/sh\nprintf '%s' '{json}'\nexit {exit_code}\n")
}

fn hang_script() -> String {
    "#!/bin/sh\nwhile :; do :; done\n".to_string()
}

fn write_shim(bin_dir: &Path, name: &str, script: &str) {
    let path = bin_dir.join(name);
    fs::write(&path, script).expect("write shim");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod shim");
}

fn fixture(shims: &[(&str, String)]) -> (tempfile::TempDir, PathBuf, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let scan_dir = dir.path().join("infra");
    let bin_dir = dir.path().join("bin");
    fs::create_dir_all(&scan_dir).expect("scan dir");
    fs::create_dir_all(&bin_dir).expect("bin dir");
    fs::write(scan_dir.join("main.tf"), TF_FIXTURE).expect("write tf");
    for (name, script) in shims {
        write_shim(&bin_dir, name, script);
    }
    (dir, scan_dir, bin_dir)
}

fn all_finding_shims() -> Vec<(&'static str, String)> {
    vec![
        ("checkov", shim_script(CHECKOV_FINDINGS, 1)),
        ("tfsec", shim_script(TFSEC_FINDINGS, 1)),
        ("terrascan", shim_script(TERRASCAN_FINDINGS, 3)),
    ]
}

fn tfgate(bin_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tfgate"))
        .args(args)
        .env("PATH", bin_dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("run tfgate")
}

fn load_json(path: &Path) -> Value {
    let text = fs::read_to_string(path).expect("read report");
    assert!(text.ends_with('\n'), "report should end with a newline");
    serde_json::from_str(&text).expect("parse report")
}

fn str_field<'a>(value: &'a Value, field: &str) -> &'a str {
    value[field].as_str().unwrap_or_else(|| panic!("missing {field}"))
}

#[test]
fn json_report_captures_score_and_ordering() {
    let (_guard, scan_dir, bin_dir) = fixture(&all_finding_shims());
    let report_path = scan_dir.join("out/report.json");
    let out = tfgate(
        &bin_dir,
        &[
            "scan",
            scan_dir.to_str().unwrap(),
            "--fail-on",
            "high",
            "--out-json",
            report_path.to_str().unwrap(),
        ],
    );
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stdout).contains("Wrote JSON report: "));

    let report = load_json(&report_path);

    uuid::Uuid::parse_str(str_field(&report, "scan_id")).expect("scan_id is a uuid");
    chrono::DateTime::parse_from_rfc3339(str_field(&report, "generated_at"))
        .expect("generated_at is RFC 3339");

    assert_eq!(report["resource_count"], 2);
    assert_eq!(
        report["resource_types"],
        serde_json::json!(["aws_s3_bucket", "aws_security_group"])
    );

    let security = &report["security"];
    assert_eq!(security["score"]["score"], 60);
    assert_eq!(
        security["score"]["by_severity"],
        serde_json::json!({"critical": 1, "high": 1, "medium": 1, "low": 1})
    );
    assert_eq!(security["findings_count"], 4);
    assert_eq!(
        security["summary"],
        "1 critical, 1 high, 1 medium, 1 low findings across 3 scanner(s)."
    );

    let findings = security["findings"].as_array().expect("findings array");
    let severities: Vec<&str> = findings.iter().map(|f| str_field(f, "severity")).collect();
    assert_eq!(severities, vec!["critical", "high", "medium", "low"]);
    let sources: Vec<&str> = findings
        .iter()
        .map(|f| str_field(f, "source_library"))
        .collect();
    assert_eq!(sources, vec!["tfsec", "checkov", "checkov", "terrascan"]);
    assert_eq!(findings[0]["rule_id"], "aws-ec2-no-public-ingress-sgr");
    assert_eq!(findings[0]["resource_key"], "aws_security_group.web");

    let by_resource = security["findings_by_resource"]
        .as_object()
        .expect("findings_by_resource map");
    assert_eq!(by_resource["aws_s3_bucket.logs"].as_array().unwrap().len(), 3);
    assert_eq!(
        by_resource["aws_security_group.web"].as_array().unwrap().len(),
        1
    );

    let scanners = security["scanners"].as_array().expect("scanners array");
    assert_eq!(scanners.len(), 3);
    assert!(scanners.iter().all(|s| s["status"] == "ok"));

    assert_eq!(report["gate"]["passed"], false);
    assert_eq!(report["gate"]["blocking_count"], 2);
    assert_eq!(report["gate"]["threshold"], "high");
}

#[test]
fn finding_ids_are_stable_across_runs() {
    let (_guard, scan_dir, bin_dir) = fixture(&all_finding_shims());
    let first_path = scan_dir.join("first.json");
    let second_path = scan_dir.join("second.json");

    let out = tfgate(
        &bin_dir,
        &[
            "scan",
            scan_dir.to_str().unwrap(),
            "--out-json",
            first_path.to_str().unwrap(),
        ],
    );
    assert_eq!(out.status.code(), Some(0));
    let out = tfgate(
        &bin_dir,
        &[
            "scan",
            scan_dir.to_str().unwrap(),
            "--out-json",
            second_path.to_str().unwrap(),
        ],
    );
    assert_eq!(out.status.code(), Some(0));

    let first = load_json(&first_path);
    let second = load_json(&second_path);

    let ids = |report: &Value| -> Vec<String> {
        report["security"]["findings"]
            .as_array()
            .expect("findings")
            .iter()
            .map(|f| str_field(f, "id").to_string())
            .collect()
    };
    assert_eq!(ids(&first), ids(&second));
    assert_ne!(first["scan_id"], second["scan_id"]);
}

#[test]
fn markdown_report_groups_findings_by_severity() {
    let (_guard, scan_dir, bin_dir) = fixture(&all_finding_shims());
    let report_path = scan_dir.join("out/report.md");
    let out = tfgate(
        &bin_dir,
        &[
            "scan",
            scan_dir.to_str().unwrap(),
            "--fail-on",
            "high",
            "--out-md",
            report_path.to_str().unwrap(),
        ],
    );
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stdout).contains("Wrote Markdown report: "));

    let text = fs::read_to_string(&report_path).expect("read markdown");
    assert!(text.starts_with("# Terraform security report"));
    assert!(text.contains("- Score: **60/100**"));
    assert!(text.contains("- Gate: **failed** (2 finding(s) at or above high)"));

    let critical = text.find("## critical (1)").expect("critical section");
    let high = text.find("## high (1)").expect("high section");
    let medium = text.find("## medium (1)").expect("medium section");
    let low = text.find("## low (1)").expect("low section");
    assert!(critical < high && high < medium && medium < low);

    assert!(text.contains("| Rule | Resource | Source | Issue | Recommendation |"));
    assert!(text.contains("aws-ec2-no-public-ingress-sgr"));
    assert!(text.contains("| Scanner | Status | Detail |"));
    assert!(text.contains("| checkov | ok | - |"));
}

#[test]
fn missing_scanner_surfaces_in_the_scanner_table() {
    let shims = vec![
        ("checkov", shim_script(CHECKOV_FINDINGS, 1)),
        ("tfsec", shim_script(TFSEC_FINDINGS, 1)),
    ];
    let (_guard, scan_dir, bin_dir) = fixture(&shims);
    let report_path = scan_dir.join("report.json");
    let out = tfgate(
        &bin_dir,
        &[
            "scan",
            scan_dir.to_str().unwrap(),
            "--out-json",
            report_path.to_str().unwrap(),
        ],
    );
    assert_eq!(out.status.code(), Some(0));

    let report = load_json(&report_path);
    let scanners = report["security"]["scanners"].as_array().expect("scanners");
    let terrascan = scanners
        .iter()
        .find(|s| s["name"] == "terrascan")
        .expect("terrascan entry");
    assert_eq!(terrascan["status"], "unavailable");
    assert!(str_field(terrascan, "detail").contains("not found on PATH"));

    // the available pair still reports its findings
    assert_eq!(report["security"]["findings_count"], 3);
}

#[test]
fn timed_out_scanner_is_marked_in_the_report() {
    let shims = vec![
        ("checkov", shim_script(CHECKOV_CLEAN, 0)),
        ("tfsec", hang_script()),
        ("terrascan", shim_script(TERRASCAN_FINDINGS, 3)),
    ];
    let (_guard, scan_dir, bin_dir) = fixture(&shims);
    let report_path = scan_dir.join("report.json");
    let out = tfgate(
        &bin_dir,
        &[
            "scan",
            scan_dir.to_str().unwrap(),
            "--timeout-secs",
            "1",
            "--out-json",
            report_path.to_str().unwrap(),
        ],
    );
    assert_eq!(out.status.code(), Some(0));

    let report = load_json(&report_path);
    let scanners = report["security"]["scanners"].as_array().expect("scanners");
    let tfsec = scanners
        .iter()
        .find(|s| s["name"] == "tfsec")
        .expect("tfsec entry");
    assert_eq!(tfsec["status"], "timed_out");
    assert!(str_field(tfsec, "detail").contains("timed out after 1s"));

    let severities: Vec<&str> = report["security"]["findings"]
        .as_array()
        .expect("findings")
        .iter()
        .map(|f| str_field(f, "severity"))
        .collect();
    assert_eq!(severities, vec!["low"]);
}

#[test]
fn single_file_target_scans_its_parent() {
    let shims = vec![
        ("checkov", shim_script(CHECKOV_CLEAN, 0)),
        ("tfsec", shim_script(TFSEC_FINDINGS, 1)),
        ("terrascan", shim_script(TERRASCAN_CLEAN, 0)),
    ];
    let (_guard, scan_dir, bin_dir) = fixture(&shims);
    let tf_file = scan_dir.join("main.tf");
    let report_path = scan_dir.join("report.json");
    let out = tfgate(
        &bin_dir,
        &[
            "scan",
            tf_file.to_str().unwrap(),
            "--out-json",
            report_path.to_str().unwrap(),
        ],
    );
    assert_eq!(out.status.code(), Some(0));

    let report = load_json(&report_path);
    assert_eq!(report["resource_count"], 2);
    assert_eq!(
        report["security"]["findings"][0]["resource_key"],
        "aws_security_group.web"
    );
}
