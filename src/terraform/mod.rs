pub mod matcher;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{GateError, Result};

pub use matcher::ResourceMatcher;

/// One `resource` block extracted from a `.tf` file.
///
/// The extractor is deliberately shallow: scanners read the raw files
/// themselves, so these records only need enough structure for reporting
/// and for matching scanner findings back to their resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Terraform resource type, e.g. `aws_s3_bucket`.
    pub resource_type: String,
    pub resource_name: String,
    /// Path relative to the scan root.
    pub file_path: String,
    /// Top-level scalar attributes of the block. Nested blocks and
    /// multi-line collections are not captured.
    pub config: BTreeMap<String, serde_json::Value>,
}

impl ResourceRecord {
    /// Canonical `type.name` address.
    pub fn key(&self) -> String {
        format!("{}.{}", self.resource_type, self.resource_name)
    }
}

/// A prepared scan target: the directory handed to the scanners plus the
/// resources extracted from it.
#[derive(Debug, Clone)]
pub struct ScanTarget {
    /// Directory passed to the scanners (the parent for a single-file target).
    pub root: PathBuf,
    pub resources: Vec<ResourceRecord>,
}

/// Resolve `path` into a scan target. Accepts a directory or a single
/// `.tf` file; anything else is an input error, as is a tree with no
/// `.tf` files at all.
pub fn parse_target(path: &Path) -> Result<ScanTarget> {
    if !path.exists() {
        return Err(GateError::Input(format!(
            "path does not exist: {}",
            path.display()
        )));
    }

    let (root, files) = if path.is_dir() {
        (path.to_path_buf(), discover_tf_files(path))
    } else if path.extension().is_some_and(|ext| ext == "tf") {
        let root = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        (root, vec![path.to_path_buf()])
    } else {
        return Err(GateError::Input(format!(
            "not a Terraform directory or .tf file: {}",
            path.display()
        )));
    };

    if files.is_empty() {
        return Err(GateError::Input(format!(
            "no .tf files under {}",
            path.display()
        )));
    }

    let mut resources = Vec::new();
    for file in &files {
        let content = fs::read_to_string(file)?;
        let rel = file
            .strip_prefix(&root)
            .unwrap_or(file.as_path())
            .to_string_lossy()
            .into_owned();
        resources.extend(parse_resources(&rel, &content));
    }

    Ok(ScanTarget { root, resources })
}

/// All `.tf` files under `root`, sorted by path. Hidden directories
/// (notably `.terraform/` module caches) are skipped.
pub fn discover_tf_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry))
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "tf"))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

static RESOURCE_HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*resource\s+"([^"]+)"\s+"([^"]+)"\s*\{"#).unwrap()
});

static ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.+)$").unwrap());

/// Extract `resource "type" "name" { ... }` blocks. Declaration order is
/// preserved within a file.
pub fn parse_resources(file_path: &str, content: &str) -> Vec<ResourceRecord> {
    let mut records = Vec::new();

    for cap in RESOURCE_HEADER_RE.captures_iter(content) {
        let (Some(whole), Some(rtype), Some(rname)) = (cap.get(0), cap.get(1), cap.get(2)) else {
            continue;
        };
        let open = whole.end() - 1;
        match find_block_end(content, open) {
            Some(close) => {
                let body = &content[open + 1..close];
                records.push(ResourceRecord {
                    resource_type: rtype.as_str().to_string(),
                    resource_name: rname.as_str().to_string(),
                    file_path: file_path.to_string(),
                    config: parse_scalar_attrs(body),
                });
            }
            None => {
                tracing::warn!(
                    file = %file_path,
                    resource = %format!("{}.{}", rtype.as_str(), rname.as_str()),
                    "unterminated resource block, skipping"
                );
            }
        }
    }

    records
}

/// Byte offset of the `}` closing the brace at `open`, honoring strings
/// and line comments.
fn find_block_end(src: &str, open: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut in_comment = false;
    let mut i = open;

    while i < bytes.len() {
        let b = bytes[i];
        if in_comment {
            if b == b'\n' {
                in_comment = false;
            }
        } else if in_string {
            match b {
                b'\\' => i += 1,
                b'"' => in_string = false,
                _ => {}
            }
        } else {
            match b {
                b'"' => in_string = true,
                b'#' => in_comment = true,
                b'/' if bytes.get(i + 1) == Some(&b'/') => in_comment = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }

    None
}

/// Top-level `name = value` pairs in a block body. Nested blocks are
/// skipped; values that open a collection are skipped too.
fn parse_scalar_attrs(body: &str) -> BTreeMap<String, serde_json::Value> {
    let mut attrs = BTreeMap::new();
    let mut depth = 0usize;

    for line in body.lines() {
        let code = strip_line_comment(line).trim();
        if code.is_empty() {
            continue;
        }
        if depth == 0 {
            if let Some(cap) = ATTR_RE.captures(code) {
                if let (Some(name), Some(value)) = (cap.get(1), cap.get(2)) {
                    let raw = value.as_str().trim();
                    if !raw.starts_with('{') && !raw.starts_with('[') {
                        attrs.insert(name.as_str().to_string(), scalar_value(raw));
                    }
                }
            }
        }
        depth = update_depth(code, depth);
    }

    attrs
}

/// Brace depth after this line, ignoring braces inside strings so that
/// `"${var.x}"` interpolations do not skew nesting.
fn update_depth(code: &str, mut depth: usize) -> usize {
    let mut in_string = false;
    let mut escaped = false;
    for b in code.bytes() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
        } else {
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
    }
    depth
}

fn strip_line_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut in_string = false;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            match b {
                b'\\' => i += 1,
                b'"' => in_string = false,
                _ => {}
            }
        } else {
            match b {
                b'"' => in_string = true,
                b'#' => return &line[..i],
                b'/' if bytes.get(i + 1) == Some(&b'/') => return &line[..i],
                _ => {}
            }
        }
        i += 1;
    }
    line
}

fn scalar_value(raw: &str) -> serde_json::Value {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return serde_json::Value::String(raw[1..raw.len() - 1].to_string());
    }
    match raw {
        "true" => return serde_json::Value::Bool(true),
        "false" => return serde_json::Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = raw.parse::<i64>() {
        return serde_json::Value::Number(n.into());
    }
    if let Ok(f) = raw.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return serde_json::Value::Number(n);
        }
    }
    // expressions (var.x, locals, function calls) stay as raw text
    serde_json::Value::String(raw.to_string())
}
