//! Run telemetry: one JSON line per written document.

use crate::document::DocumentReport;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionOutcome {
    Passed,
    Exhausted,
    Aborted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionTelemetry {
    pub index: usize,
    pub outcome: SectionOutcome,
    pub iterations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevancy_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redundancy_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTelemetry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    pub title: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: i64,
    pub total_iterations: u32,
    pub success_count: usize,
    pub exhausted_count: usize,
    pub failed_count: usize,
    pub sections: Vec<SectionTelemetry>,
}

impl RunTelemetry {
    pub fn from_report(report: &DocumentReport, document_id: Option<&str>) -> Self {
        let mut sections: Vec<SectionTelemetry> = report
            .sections
            .iter()
            .map(|s| SectionTelemetry {
                index: s.index,
                outcome: if s.exhausted {
                    SectionOutcome::Exhausted
                } else {
                    SectionOutcome::Passed
                },
                iterations: s.iterations,
                relevancy_score: Some(s.relevancy_score),
                redundancy_score: Some(s.redundancy_score),
            })
            .chain(report.failed_sections.iter().map(|f| SectionTelemetry {
                index: f.index,
                outcome: SectionOutcome::Aborted,
                iterations: f.iterations,
                relevancy_score: None,
                redundancy_score: None,
            }))
            .collect();
        sections.sort_by_key(|s| s.index);

        Self {
            document_id: document_id.map(String::from),
            title: report.title.clone(),
            started_at: report.started_at,
            finished_at: report.finished_at,
            elapsed_ms: (report.finished_at - report.started_at).num_milliseconds(),
            total_iterations: report.total_iterations,
            success_count: report.success_count,
            exhausted_count: report.exhausted_count,
            failed_count: report.failed_sections.len(),
            sections,
        }
    }

    /// Append as one line to the JSONL file at `path`.
    pub fn append_jsonl(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self).context("Failed to serialize run telemetry")?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open telemetry file {}", path.display()))?;
        writeln!(file, "{json}")
            .with_context(|| format!("Failed to append telemetry to {}", path.display()))?;
        info!(path = %path.display(), "Appended run telemetry");
        Ok(())
    }

    pub fn read_jsonl(path: &Path) -> Result<Vec<Self>> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open telemetry file {}", path.display()))?;
        let mut runs = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let run: Self = serde_json::from_str(&line)
                .with_context(|| format!("Bad telemetry line {} in {}", idx + 1, path.display()))?;
            runs.push(run);
        }
        Ok(runs)
    }
}
