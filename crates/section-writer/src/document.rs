//! Document Coordinator — runs the Section Loop over every outline in order.
//!
//! Sections are strictly sequential: each section's redundancy gate compares
//! against everything accepted before it. An aborted section is recorded and
//! the coordinator moves on; a partial document is always returned.

use crate::config::LoopParams;
use crate::section_loop::{SectionLoop, SectionResult};
use crate::state_machine::SectionState;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use gating::{History, HistoryError, HistoryStore, InstructionSet};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// A document plan: title, ordered outlines, optional system guidance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRequest {
    pub title: String,
    pub outlines: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_preamble: Option<String>,
}

impl DocumentRequest {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let request: Self = toml::from_str(raw).context("Failed to parse document plan TOML")?;
        if request.outlines.is_empty() {
            anyhow::bail!("document plan has no outlines");
        }
        Ok(request)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read document plan {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("Invalid document plan {}", path.display()))
    }
}

/// An accepted section (passed or exhausted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSummary {
    /// 1-based position in the plan
    pub index: usize,
    pub outline: String,
    pub content: String,
    pub iterations: u32,
    pub exhausted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub relevancy_score: f64,
    pub redundancy_score: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}

/// A section whose loop was aborted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedSection {
    pub index: usize,
    pub outline: String,
    pub error: String,
    pub iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub title: String,
    pub sections: Vec<SectionSummary>,
    pub failed_sections: Vec<FailedSection>,
    /// Accepted sections, exhausted ones included
    pub success_count: usize,
    pub exhausted_count: usize,
    /// Generation calls across all sections, aborted ones included
    pub total_iterations: u32,
    pub history: History,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DocumentReport {
    fn new(title: &str, history: History) -> Self {
        let now = Utc::now();
        Self {
            title: title.to_string(),
            sections: Vec::new(),
            failed_sections: Vec::new(),
            success_count: 0,
            exhausted_count: 0,
            total_iterations: 0,
            history,
            started_at: now,
            finished_at: now,
        }
    }

    fn record(&mut self, index: usize, outline: &str, result: SectionResult) {
        self.total_iterations += result.iterations;

        if result.final_state == SectionState::Aborted {
            let error = result
                .error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "section aborted".into());
            self.failed_sections.push(FailedSection {
                index,
                outline: outline.to_string(),
                error,
                iterations: result.iterations,
            });
            return;
        }

        let (relevancy_score, redundancy_score) = result
            .verification()
            .map(|v| (v.relevancy_score(), v.redundancy_score()))
            .unwrap_or_default();

        self.success_count += 1;
        if result.exhausted {
            self.exhausted_count += 1;
        }
        self.sections.push(SectionSummary {
            index,
            outline: outline.to_string(),
            content: result.draft.unwrap_or_default(),
            iterations: result.iterations,
            exhausted: result.exhausted,
            warning: result.warning,
            relevancy_score,
            redundancy_score,
            issues: result
                .failure_analysis
                .map(|a| a.issues)
                .unwrap_or_default(),
        });
    }

    /// True when every outline produced an accepted section.
    pub fn is_complete(&self) -> bool {
        self.failed_sections.is_empty()
    }

    /// Accepted sections under the title, in plan order.
    pub fn render_markdown(&self) -> String {
        let mut out = format!("# {}\n\n", self.title.trim());
        for section in &self.sections {
            out.push_str(&format!("## {}\n\n", section.outline.trim()));
            out.push_str(section.content.trim());
            out.push_str("\n\n");
        }
        out
    }
}

pub struct DocumentCoordinator {
    section_loop: SectionLoop,
}

impl DocumentCoordinator {
    pub fn new(section_loop: SectionLoop) -> Self {
        Self { section_loop }
    }

    /// Write the whole document against a fresh in-memory history.
    pub async fn run_document(
        &self,
        request: &DocumentRequest,
        params: &LoopParams,
    ) -> DocumentReport {
        self.run_inner(request, params, History::new(), |_, _| {})
            .await
    }

    /// Like [`run_document`](Self::run_document), but seeds the history from
    /// `store` and persists each accepted section to it.
    ///
    /// Persist failures are logged; the in-memory history and the report
    /// stay authoritative for the rest of the run.
    pub async fn run_document_with_store(
        &self,
        document_id: &str,
        request: &DocumentRequest,
        params: &LoopParams,
        store: &mut dyn HistoryStore,
    ) -> Result<DocumentReport, HistoryError> {
        let seeded = store.load(document_id)?;
        info!(document_id, seeded = seeded.len(), "Seeded history from store");

        let report = self
            .run_inner(request, params, seeded, |index, section| {
                let metadata = serde_json::json!({
                    "section_index": index,
                    "iterations": section.iterations,
                    "relevancy_score": section.relevancy_score,
                    "redundancy_score": section.redundancy_score,
                    "exhausted": section.exhausted,
                });
                if let Err(e) = store.append(document_id, &section.content, metadata) {
                    warn!(document_id, index, error = %e, "Failed to persist section");
                }
            })
            .await;
        Ok(report)
    }

    async fn run_inner(
        &self,
        request: &DocumentRequest,
        params: &LoopParams,
        history: History,
        mut on_accept: impl FnMut(usize, &SectionSummary),
    ) -> DocumentReport {
        let total = request.outlines.len();
        let mut report = DocumentReport::new(&request.title, history);
        info!(title = %request.title, sections = total, "Document started");

        for (i, outline) in request.outlines.iter().enumerate() {
            let index = i + 1;
            let initial =
                InstructionSet::initial(outline, request.system_preamble.as_deref(), index, total);
            let result = self
                .section_loop
                .run_section(outline, initial, &mut report.history, params)
                .await;

            let accepted_before = report.sections.len();
            report.record(index, outline, result);
            if let Some(section) = report.sections.get(accepted_before) {
                on_accept(index, section);
            }
        }

        report.finished_at = Utc::now();
        info!(
            title = %request.title,
            accepted = report.success_count,
            exhausted = report.exhausted_count,
            failed = report.failed_sections.len(),
            total_iterations = report.total_iterations,
            "Document finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_from_toml() {
        let plan = DocumentRequest::from_toml_str(
            r#"
title = "Photosynthesis"
system_preamble = "Write for high-school students."
outlines = ["What it is", "Why it matters"]
"#,
        )
        .unwrap();
        assert_eq!(plan.outlines.len(), 2);
        assert_eq!(
            plan.system_preamble.as_deref(),
            Some("Write for high-school students.")
        );
    }

    #[test]
    fn test_plan_requires_outlines() {
        assert!(DocumentRequest::from_toml_str("title = \"x\"\noutlines = []\n").is_err());
        assert!(DocumentRequest::from_toml_str("title = \"x\"\n").is_err());
    }

    #[test]
    fn test_render_markdown_skips_failed_sections() {
        let mut report = DocumentReport::new("Doc", History::new());
        report.sections.push(SectionSummary {
            index: 1,
            outline: "Intro".into(),
            content: "Intro text.".into(),
            iterations: 1,
            exhausted: false,
            warning: None,
            relevancy_score: 0.9,
            redundancy_score: 0.0,
            issues: Vec::new(),
        });
        report.failed_sections.push(FailedSection {
            index: 2,
            outline: "Middle".into(),
            error: "boom".into(),
            iterations: 1,
        });
        let md = report.render_markdown();
        assert_eq!(md, "# Doc\n\n## Intro\n\nIntro text.\n\n");
        assert!(!report.is_complete());
    }
}
