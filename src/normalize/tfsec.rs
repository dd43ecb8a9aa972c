use serde::Deserialize;
use serde_json::Value;

use crate::finding::{Finding, Severity};
use crate::scanner::ScannerKind;
use crate::terraform::ResourceMatcher;

const SOURCE: ScannerKind = ScannerKind::Tfsec;

/// The subset of a tfsec result item this tool reads.
#[derive(Debug, Deserialize)]
struct TfsecResult {
    rule_id: Option<String>,
    long_id: Option<String>,
    rule_description: Option<String>,
    description: Option<String>,
    resolution: Option<String>,
    links: Option<Vec<String>>,
    resource: Option<String>,
    severity: Option<String>,
}

pub(super) fn normalize(payload: &Value, matcher: &ResourceMatcher) -> Result<Vec<Finding>, String> {
    let items = result_items(payload)?;
    let mut findings = Vec::with_capacity(items.len());
    for (ordinal, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<TfsecResult>(item) {
            Ok(result) => findings.push(map_result(result, ordinal, matcher)),
            Err(e) => {
                tracing::debug!(scanner = %SOURCE, ordinal, error = %e, "unreadable item, degrading");
                findings.push(super::degraded_finding(SOURCE, ordinal));
            }
        }
    }
    Ok(findings)
}

/// tfsec emits a single `{"results": [...]}` document; on a clean run
/// the array is JSON null rather than empty.
fn result_items(payload: &Value) -> Result<Vec<Value>, String> {
    let Value::Object(map) = payload else {
        return Err("unrecognized tfsec payload shape".to_string());
    };
    match map.get("results") {
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(_) => Err("unrecognized tfsec payload shape".to_string()),
    }
}

fn map_result(item: TfsecResult, ordinal: usize, matcher: &ResourceMatcher) -> Finding {
    let severity = map_severity(item.severity.as_deref());
    let rule_id = super::first_nonempty([item.long_id, item.rule_id])
        .unwrap_or_else(|| super::unknown_rule_id(SOURCE));
    let issue = super::first_nonempty([item.description, item.rule_description])
        .unwrap_or_else(|| super::DEFAULT_ISSUE.to_string());
    let recommendation = super::first_nonempty([item.resolution])
        .unwrap_or_else(|| super::DEFAULT_RECOMMENDATION.to_string());
    let links = super::valid_links(item.links.unwrap_or_default());
    let resource_key = item
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

/// tfsec moved to CRITICAL..LOW; ERROR and WARNING survive from the old
/// scheme in older binaries.
fn map_severity(raw: Option<&str>) -> Severity {
    match raw.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
        Some("CRITICAL") => Severity::Critical,
        Some("HIGH") | Some("ERROR") => Severity::High,
        Some("MEDIUM") | Some("WARNING") => Severity::Medium,
        Some("LOW") => Severity::Low,
        _ => Severity::Low,
    }
}
