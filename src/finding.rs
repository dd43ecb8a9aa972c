use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::scanner::ScannerKind;

/// A normalized security finding, merged from whichever scanner produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Deterministic id: tool name plus a digest of the identifying fields.
    pub id: String,
    /// Severity after per-tool translation.
    pub severity: Severity,
    /// Which scanner produced the finding.
    pub source_library: ScannerKind,
    /// The tool's own rule identifier (e.g. "CKV_AWS_18").
    pub rule_id: String,
    /// Canonical `type.name` address of the owning resource, or null when
    /// the reported address matches no managed resource.
    pub resource_key: Option<String>,
    pub category: Category,
    /// Human-readable description of the violation.
    pub issue: String,
    /// Suggested remediation.
    pub recommendation: String,
    /// Documentation links (validated http/https URLs).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
    /// Compliance framework tags, when a scanner supplies them.
    #[serde(default)]
    pub compliance_tags: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Descending, the order reports group findings in.
    pub const DESCENDING: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Coarse infrastructure domain of a finding, keyword-detected from the
/// resource type and the issue text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Identity,
    Network,
    Storage,
    Compute,
    Monitoring,
    General,
}

impl Category {
    /// First keyword group that matches wins; identity outranks network
    /// outranks storage and so on, so an IAM finding that mentions a
    /// bucket still lands in identity.
    pub fn detect(text: &str) -> Self {
        let key = text.to_lowercase();
        let hit = |needles: &[&str]| needles.iter().any(|n| key.contains(n));

        if hit(&["role", "identity", "rbac", "iam", "principal"]) {
            Self::Identity
        } else if hit(&["nsg", "network", "inbound", "egress", "firewall", "public ip"]) {
            Self::Network
        } else if hit(&["storage", "blob", "s3", "bucket"]) {
            Self::Storage
        } else if hit(&["vm", "compute", "container", "kubernetes", "disk"]) {
            Self::Compute
        } else if hit(&["monitor", "log", "diagnostic", "alert"]) {
            Self::Monitoring
        } else {
            Self::General
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Identity => write!(f, "identity"),
            Self::Network => write!(f, "network"),
            Self::Storage => write!(f, "storage"),
            Self::Compute => write!(f, "compute"),
            Self::Monitoring => write!(f, "monitoring"),
            Self::General => write!(f, "general"),
        }
    }
}
