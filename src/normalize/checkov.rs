use serde::Deserialize;
use serde_json::Value;

use crate::finding::{Finding, Severity};
use crate::scanner::ScannerKind;
use crate::terraform::ResourceMatcher;

const SOURCE: ScannerKind = ScannerKind::Checkov;

/// The subset of a checkov `failed_checks` item this tool reads.
#[derive(Debug, Deserialize)]
struct Check {
    check_id: Option<String>,
    check_name: Option<String>,
    guideline: Option<String>,
    details: Option<Value>,
    resource: Option<String>,
    severity: Option<String>,
}

pub(super) fn normalize(payload: &Value, matcher: &ResourceMatcher) -> Result<Vec<Finding>, String> {
    let items = failed_checks(payload)?;
    let mut findings = Vec::with_capacity(items.len());
    for (ordinal, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<Check>(item) {
            Ok(check) => findings.push(map_check(check, ordinal, matcher)),
            Err(e) => {
                tracing::debug!(scanner = %SOURCE, ordinal, error = %e, "unreadable item, degrading");
                findings.push(super::degraded_finding(SOURCE, ordinal));
            }
        }
    }
    Ok(findings)
}

/// checkov emits one run document, or an array of per-framework runs;
/// either way the findings live at `results.failed_checks`.
fn failed_checks(payload: &Value) -> Result<Vec<Value>, String> {
    match payload {
        Value::Object(map) => {
            if let Some(results) = map.get("results") {
                return Ok(checks_of(results));
            }
            if map.is_empty() || map.contains_key("summary") {
                return Ok(Vec::new());
            }
            Err("unrecognized checkov payload shape".to_string())
        }
        Value::Array(runs) => {
            let mut items = Vec::new();
            let mut saw_run = false;
            for run in runs {
                if let Some(results) = run.get("results") {
                    saw_run = true;
                    items.extend(checks_of(results));
                }
            }
            if saw_run || runs.is_empty() {
                Ok(items)
            } else {
                Err("unrecognized checkov payload shape".to_string())
            }
        }
        _ => Err("unrecognized checkov payload shape".to_string()),
    }
}

fn checks_of(results: &Value) -> Vec<Value> {
    results
        .get("failed_checks")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn map_check(check: Check, ordinal: usize, matcher: &ResourceMatcher) -> Finding {
    let severity = map_severity(check.severity.as_deref());
    let rule_id = check
        .check_id
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| super::unknown_rule_id(SOURCE));
    let issue = super::first_nonempty([check.check_name, check.check_id])
        .unwrap_or_else(|| super::DEFAULT_ISSUE.to_string());
    let recommendation = details_text(check.details.as_ref())
        .unwrap_or_else(|| super::DEFAULT_RECOMMENDATION.to_string());
    let links = super::valid_links(check.guideline);
    let resource_key = check
        .resource
        .as_deref()
        .and_then(|addr| matcher.resolve(addr));
    let category = super::categorize(resource_key.as_deref(), &issue);

    Finding {
        id: super::synth_id(SOURCE, &rule_id, resource_key.as_deref(), &issue, ordinal),
        severity,
        source_library: SOURCE,
        rule_id,
        resource_key,
        category,
        issue,
        recommendation,
        links,
        compliance_tags: Default::default(),
    }
}

/// checkov's platform builds tag checks with uppercase severities; the
/// OSS build omits the field entirely. Missing or unknown means low.
fn map_severity(raw: Option<&str>) -> Severity {
    match raw.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
        Some("CRITICAL") => Severity::Critical,
        Some("HIGH") => Severity::High,
        Some("MEDIUM") => Severity::Medium,
        Some("LOW") => Severity::Low,
        _ => Severity::Low,
    }
}

/// `details` is usually a list of strings, occasionally a single string.
fn details_text(details: Option<&Value>) -> Option<String> {
    let text = match details? {
        Value::String(s) => s.trim().to_string(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        _ => String::new(),
    };
    (!text.is_empty()).then_some(text)
}
