use super::ScanReport;
use crate::error::Result;

/// Render the artifact as pretty-printed JSON with a trailing newline.
pub fn render(report: &ScanReport) -> Result<String> {
    let mut json = serde_json::to_string_pretty(report)?;
    json.push('\n');
    Ok(json)
}
