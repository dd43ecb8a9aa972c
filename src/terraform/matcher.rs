use std::collections::HashMap;

use super::ResourceRecord;

/// Resolves the resource addresses scanners report back to the canonical
/// `type.name` of a parsed resource.
///
/// Scanners disagree about addressing: module prefixes
/// (`module.net.aws_vpc.main`), count indexes (`aws_instance.web[0]`),
/// or just a bare name. Resolution is best-effort; an address that names
/// no managed resource yields `None` rather than a fabricated key.
pub struct ResourceMatcher {
    keys: Vec<String>,
    by_name: HashMap<String, Vec<String>>,
}

impl ResourceMatcher {
    pub fn new(resources: &[ResourceRecord]) -> Self {
        let mut keys = Vec::with_capacity(resources.len());
        let mut by_name: HashMap<String, Vec<String>> = HashMap::new();
        for record in resources {
            let key = record.key();
            by_name
                .entry(record.resource_name.clone())
                .or_default()
                .push(key.clone());
            keys.push(key);
        }
        Self { keys, by_name }
    }

    pub fn resolve(&self, address: &str) -> Option<String> {
        let addr = strip_index(address.trim());
        if addr.is_empty() {
            return None;
        }

        if self.keys.iter().any(|key| key == addr) {
            return Some(addr.to_string());
        }

        // module-prefixed address ending in a known key, on a dot boundary
        for key in &self.keys {
            if addr.ends_with(key.as_str()) && addr[..addr.len() - key.len()].ends_with('.') {
                return Some(key.clone());
            }
        }

        if !addr.contains('.') {
            return self.unique_by_name(addr);
        }

        let parts: Vec<&str> = addr.split('.').collect();
        if parts.iter().any(|part| *part == "data") {
            // data sources are not managed resources
            return None;
        }

        // last segment as a bare name, when it is unambiguous
        if let Some(name) = parts.last() {
            if let Some(key) = self.unique_by_name(name) {
                return Some(key);
            }
        }

        // a plausible type.name tail names a real resource the extractor
        // may simply not have seen (modules pulled from elsewhere)
        let tail_type = parts[parts.len() - 2];
        let tail_name = parts[parts.len() - 1];
        if looks_like_resource_type(tail_type) && !tail_name.is_empty() {
            return Some(format!("{tail_type}.{tail_name}"));
        }

        None
    }

    fn unique_by_name(&self, name: &str) -> Option<String> {
        match self.by_name.get(name) {
            Some(keys) if keys.len() == 1 => Some(keys[0].clone()),
            _ => None,
        }
    }
}

fn strip_index(addr: &str) -> &str {
    if addr.ends_with(']') {
        if let Some(open) = addr.rfind('[') {
            return &addr[..open];
        }
    }
    addr
}

fn looks_like_resource_type(s: &str) -> bool {
    s.contains('_')
        && s.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
