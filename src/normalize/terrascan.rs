use serde::Deserialize;
use serde_json::Value;

use crate::finding::{Finding, Severity};
use crate::scanner::ScannerKind;
use crate::terraform::ResourceMatcher;

const SOURCE: ScannerKind = ScannerKind::Terrascan;

/// The subset of a terrascan violation this tool reads.
#[derive(Debug, Deserialize)]
struct Violation {
    rule_name: Option<String>,
    rule_id: Option<String>,
    description: Option<String>,
    resolution: Option<String>,
    severity: Option<String>,
    resource_name: Option<String>,
    resource_type: Option<String>,
}

pub(super) fn normalize(payload: &Value, matcher: &ResourceMatcher) -> Result<Vec<Finding>, String> {
    let items = violations(payload)?;
    let mut findings = Vec::with_capacity(items.len());
    for (ordinal, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<Violation>(item) {
            Ok(violation) => findings.push(map_violation(violation, ordinal, matcher)),
            Err(e) => {
                tracing::debug!(scanner = %SOURCE, ordinal, error = %e, "unreadable item, degrading");
                findings.push(super::degraded_finding(SOURCE, ordinal));
            }
        }
    }
    Ok(findings)
}

/// terrascan nests its findings at `results.violations`; a clean run
/// reports `"violations": null`.
fn violations(payload: &Value) -> Result<Vec<Value>, String> {
    let Value::Object(map) = payload else {
        return Err("unrecognized terrascan payload shape".to_string());
    };
    let results = match map.get("results") {
        Some(Value::Object(results)) => results,
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(_) => return Err("unrecognized terrascan payload shape".to_string()),
    };
    match results.get("violations") {
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(_) => Err("unrecognized terrascan payload shape".to_string()),
    }
}

fn map_violation(violation: Violation, ordinal: usize, matcher: &ResourceMatcher) -> Finding {
    let severity = map_severity(violation.severity.as_deref());
    let rule_id = super::first_nonempty([violation.rule_id, violation.rule_name.clone()])
        .unwrap_or_else(|| super::unknown_rule_id(SOURCE));
    let issue = super::first_nonempty([violation.description, violation.rule_name])
        .unwrap_or_else(|| super::DEFAULT_ISSUE.to_string());
    let recommendation = super::first_nonempty([violation.resolution])
        .unwrap_or_else(|| super::DEFAULT_RECOMMENDATION.to_string());
    let resource_key = resolve_resource(
        violation.resource_type.as_deref(),
        violation.resource_name.as_deref(),
        matcher,
    );
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
        links: Vec::new(),
        compliance_tags: Default::default(),
    }
}

/// terrascan reports type and name as separate fields. Try the composed
/// address first, then the bare name.
fn resolve_resource(
    resource_type: Option<&str>,
    resource_name: Option<&str>,
    matcher: &ResourceMatcher,
) -> Option<String> {
    let name = resource_name.map(str::trim).filter(|n| !n.is_empty())?;
    if let Some(rtype) = resource_type.map(str::trim).filter(|t| !t.is_empty()) {
        if let Some(key) = matcher.resolve(&format!("{rtype}.{name}")) {
            return Some(key);
        }
    }
    matcher.resolve(name)
}

fn map_severity(raw: Option<&str>) -> Severity {
    match raw.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
        Some("CRITICAL") => Severity::Critical,
        Some("HIGH") => Severity::High,
        Some("MEDIUM") | Some("MODERATE") => Severity::Medium,
        Some("LOW") => Severity::Low,
        _ => Severity::Low,
    }
}
