//! JSON output formatter

use anyhow::Result;
use ragpipe_core::PipelineReport;

pub fn format_report(report: &PipelineReport) -> Result<String> {
    let mut output = serde_json::to_string_pretty(report)?;
    output.push('\n');
    Ok(output)
}
