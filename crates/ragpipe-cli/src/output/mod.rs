//! Output formatters

pub mod json;
pub mod terminal;

use crate::app::OutputFormat;
use anyhow::Result;
use ragpipe_core::PipelineReport;

/// Format options
pub struct ReportOptions {
    /// List the retrieved chunks under each query
    pub sources: bool,
}

/// Format a session report
pub fn format_report(
    report: &PipelineReport,
    format: OutputFormat,
    options: &ReportOptions,
) -> Result<String> {
    match format {
        OutputFormat::Json => json::format_report(report),
        OutputFormat::Cli => Ok(terminal::format_report(report, options)),
    }
}
