//! Verification Result, the structured verdict for one draft
//!
//! Created fresh per attempt and never mutated afterwards; fields are read
//! through accessors. This is the only input the refinement strategy sees
//! about why a draft failed.

use crate::scoring::ScoreBreakdown;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Feedback when both gates hold.
pub const FEEDBACK_OK: &str = "Content looks good.";
/// Feedback when relevancy misses its threshold.
pub const FEEDBACK_OFF_TOPIC: &str =
    "Content is deviating from the outline. Add more focus on the section mission.";
/// Feedback when redundancy exceeds its threshold. Wins over the relevancy message.
pub const FEEDBACK_REDUNDANT: &str =
    "Content is redundant with previous sections. Provide new information.";

/// Which gate a draft failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Relevancy score below threshold
    Relevancy,
    /// Redundancy score above threshold
    Redundancy,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Relevancy => write!(f, "relevancy"),
            Self::Redundancy => write!(f, "redundancy"),
        }
    }
}

/// The two gate thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Minimum relevancy (inclusive)
    pub relevancy: f64,
    /// Maximum redundancy (inclusive)
    pub redundancy: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            relevancy: 0.6,
            redundancy: 0.7,
        }
    }
}

impl Thresholds {
    pub fn new(relevancy: f64, redundancy: f64) -> Self {
        Self {
            relevancy,
            redundancy,
        }
    }

    /// Both thresholds must lie in [0, 1].
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.relevancy) {
            return Err(format!("relevancy threshold {} outside [0, 1]", self.relevancy));
        }
        if !(0.0..=1.0).contains(&self.redundancy) {
            return Err(format!(
                "redundancy threshold {} outside [0, 1]",
                self.redundancy
            ));
        }
        Ok(())
    }
}

/// Verdict for a single draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    relevancy_score: f64,
    redundancy_score: f64,
    passed: bool,
    feedback: String,
    relevancy_breakdown: ScoreBreakdown,
    redundancy_breakdown: ScoreBreakdown,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    failures: Vec<FailureKind>,
    thresholds: Thresholds,
    verified_at: DateTime<Utc>,
}

impl VerificationResult {
    /// Build a verdict from the two scores. Pass/fail, the failure list and
    /// the feedback line are all derived here so they cannot disagree.
    pub fn from_scores(
        relevancy_score: f64,
        relevancy_breakdown: ScoreBreakdown,
        redundancy_score: f64,
        redundancy_breakdown: ScoreBreakdown,
        thresholds: Thresholds,
    ) -> Self {
        let mut failures = Vec::new();
        if relevancy_score < thresholds.relevancy {
            failures.push(FailureKind::Relevancy);
        }
        if redundancy_score > thresholds.redundancy {
            failures.push(FailureKind::Redundancy);
        }

        let feedback = if failures.contains(&FailureKind::Redundancy) {
            FEEDBACK_REDUNDANT
        } else if failures.contains(&FailureKind::Relevancy) {
            FEEDBACK_OFF_TOPIC
        } else {
            FEEDBACK_OK
        };

        Self {
            relevancy_score,
            redundancy_score,
            passed: failures.is_empty(),
            feedback: feedback.to_string(),
            relevancy_breakdown,
            redundancy_breakdown,
            failures,
            thresholds,
            verified_at: Utc::now(),
        }
    }

    pub fn relevancy_score(&self) -> f64 {
        self.relevancy_score
    }

    pub fn redundancy_score(&self) -> f64 {
        self.redundancy_score
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    /// Single-line human feedback (redundancy message wins when both fail).
    pub fn feedback(&self) -> &str {
        &self.feedback
    }

    pub fn relevancy_breakdown(&self) -> &ScoreBreakdown {
        &self.relevancy_breakdown
    }

    pub fn redundancy_breakdown(&self) -> &ScoreBreakdown {
        &self.redundancy_breakdown
    }

    /// Every gate that failed, in (relevancy, redundancy) order.
    pub fn failures(&self) -> &[FailureKind] {
        &self.failures
    }

    pub fn has_failure(&self, kind: FailureKind) -> bool {
        self.failures.contains(&kind)
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn verified_at(&self) -> DateTime<Utc> {
        self.verified_at
    }

    /// Compact summary for logging
    pub fn summary(&self) -> String {
        let failed: Vec<String> = self.failures.iter().map(|f| f.to_string()).collect();
        format!(
            "[{}] relevancy {:.4} (>= {}) redundancy {:.4} (<= {}){}",
            if self.passed { "PASS" } else { "FAIL" },
            self.relevancy_score,
            self.thresholds.relevancy,
            self.redundancy_score,
            self.thresholds.redundancy,
            if failed.is_empty() {
                String::new()
            } else {
                format!(" failed: {}", failed.join(", "))
            }
        )
    }
}
