use anyhow::Result;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::orchestrator::ExtractionOutcome;

/// Render an outcome in the requested format
pub fn format_outcome(outcome: &ExtractionOutcome, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(format_as_text(outcome)),
        OutputFormat::Json => format_as_json(outcome),
    }
}

fn format_as_text(outcome: &ExtractionOutcome) -> String {
    match outcome {
        ExtractionOutcome::Success { transcript, .. } => transcript.clone(),
        ExtractionOutcome::Failure { message, kind } => {
            format!("extraction failed ({}): {}", kind, message)
        }
    }
}

fn format_as_json(outcome: &ExtractionOutcome) -> Result<String> {
    Ok(serde_json::to_string_pretty(outcome)?)
}

/// Save an outcome to file
pub async fn save_to_file(
    outcome: &ExtractionOutcome,
    path: &Path,
    format: &OutputFormat,
) -> Result<()> {
    let content = format_outcome(outcome, format)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print an outcome to the console
pub fn print_to_console(outcome: &ExtractionOutcome, format: &OutputFormat) -> Result<()> {
    println!("{}", format_outcome(outcome, format)?);
    Ok(())
}
