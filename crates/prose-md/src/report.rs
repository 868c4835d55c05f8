use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt::Display;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

const BANNER_WIDTH: usize = 50;

/// Outcome of one conversion attempt. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub success: bool,
    pub source_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_path: Option<PathBuf>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ConversionResult {
    pub fn succeeded(source_path: &str, destination_path: PathBuf, title: &str) -> Self {
        let message = format!("Converted {} -> {}", source_path, destination_path.display());
        Self {
            success: true,
            source_path: source_path.to_string(),
            destination_path: Some(destination_path),
            title: title.to_string(),
            error: None,
            message: Some(message),
        }
    }

    pub fn failed(source_path: &str, title: &str, error: impl Display) -> Self {
        Self {
            success: false,
            source_path: source_path.to_string(),
            destination_path: None,
            title: title.to_string(),
            error: Some(error.to_string()),
            message: None,
        }
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u128(duration.as_millis())
}

/// Aggregate over one directory run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionReport {
    /// Number of results, one per document attempt or unreadable source file.
    pub total_files: usize,
    /// Number of JSON files discovered under the source directory.
    pub source_files: usize,
    pub successful_conversions: usize,
    pub failed_conversions: usize,
    pub results: Vec<ConversionResult>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(rename = "durationMs", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl ConversionReport {
    pub fn new(
        results: Vec<ConversionResult>,
        source_files: usize,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        let successful_conversions = results.iter().filter(|r| r.success).count();
        Self {
            total_files: results.len(),
            source_files,
            successful_conversions,
            failed_conversions: results.len() - successful_conversions,
            results,
            start_time,
            end_time,
            duration,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &ConversionResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn write_summary<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let rule = "=".repeat(BANNER_WIDTH);
        writeln!(out)?;
        writeln!(out, "{rule}")?;
        writeln!(out, "{:^width$}", "Conversion Report", width = BANNER_WIDTH)?;
        writeln!(out, "{rule}")?;
        writeln!(out, "{:<28}{:>22}", "Total files:", self.total_files)?;
        writeln!(out, "{:<28}{:>22}", "Successful conversions:", self.successful_conversions)?;
        writeln!(out, "{:<28}{:>22}", "Failed conversions:", self.failed_conversions)?;
        writeln!(
            out,
            "{:<28}{:>22}",
            "Duration:",
            format!("{}ms", self.duration.as_millis())
        )?;
        writeln!(out, "{rule}")?;

        if self.failed_conversions > 0 {
            writeln!(out, "Failures:")?;
            for failure in self.failures() {
                writeln!(
                    out,
                    "  {}: {}",
                    failure.source_path,
                    failure.error.as_deref().unwrap_or("unknown error")
                )?;
            }
        }
        Ok(())
    }
}
