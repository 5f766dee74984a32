//! Per-section failure analysis over the attempt record.

use crate::verifier::{FailureKind, VerificationResult};
use serde::{Deserialize, Serialize};

/// Average relevancy below this is reported as a systemic relevancy issue.
const LOW_RELEVANCY: f64 = 0.5;
/// Average redundancy above this is reported as a systemic redundancy issue.
const HIGH_REDUNDANCY: f64 = 0.6;

/// One generation attempt and its verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based attempt index within the section
    pub attempt: u32,
    pub draft: String,
    pub verification: VerificationResult,
}

impl IterationRecord {
    pub fn new(attempt: u32, draft: impl Into<String>, verification: VerificationResult) -> Self {
        Self {
            attempt,
            draft: draft.into(),
            verification,
        }
    }
}

/// Totals, trends and averages over a section's attempts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureAnalysis {
    pub total_attempts: usize,
    pub relevancy_failures: usize,
    pub redundancy_failures: usize,
    pub relevancy_trend: Vec<f64>,
    pub redundancy_trend: Vec<f64>,
    pub avg_relevancy: f64,
    pub avg_redundancy: f64,
    /// Human-readable systemic problems, empty when none were found
    pub issues: Vec<String>,
}

impl FailureAnalysis {
    pub fn from_records(records: &[IterationRecord]) -> Self {
        Self::from_verifications(records.iter().map(|r| &r.verification))
    }

    pub fn from_verifications<'a>(
        verifications: impl IntoIterator<Item = &'a VerificationResult>,
    ) -> Self {
        let mut analysis = Self::default();
        for v in verifications {
            analysis.total_attempts += 1;
            if v.has_failure(FailureKind::Relevancy) {
                analysis.relevancy_failures += 1;
            }
            if v.has_failure(FailureKind::Redundancy) {
                analysis.redundancy_failures += 1;
            }
            analysis.relevancy_trend.push(v.relevancy_score());
            analysis.redundancy_trend.push(v.redundancy_score());
        }

        if analysis.total_attempts == 0 {
            return analysis;
        }

        let n = analysis.total_attempts as f64;
        analysis.avg_relevancy = analysis.relevancy_trend.iter().sum::<f64>() / n;
        analysis.avg_redundancy = analysis.redundancy_trend.iter().sum::<f64>() / n;

        if analysis.avg_relevancy < LOW_RELEVANCY {
            analysis.issues.push(format!(
                "Low average relevancy ({:.3}): drafts keep missing the outline",
                analysis.avg_relevancy
            ));
        }
        if analysis.avg_redundancy > HIGH_REDUNDANCY {
            analysis.issues.push(format!(
                "High average redundancy ({:.3}): drafts keep repeating earlier sections",
                analysis.avg_redundancy
            ));
        }
        analysis
    }

    /// True when relevancy rose from the first attempt to the last.
    pub fn relevancy_improved(&self) -> bool {
        match (self.relevancy_trend.first(), self.relevancy_trend.last()) {
            (Some(first), Some(last)) => last > first,
            _ => false,
        }
    }
}
