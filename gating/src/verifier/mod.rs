//! Verifier Module — the two-gate Decision Policy
//!
//! A draft passes only when BOTH gates hold:
//!
//! ```text
//! relevancy_score >= rel_threshold   AND   redundancy_score <= red_threshold
//! ```
//!
//! Boundary values pass on both sides. Failures are not mutually exclusive:
//! every failed gate is recorded in [`VerificationResult::failures`], while
//! the single feedback line follows a fixed precedence (redundancy message
//! over relevancy message, neutral message when nothing failed).
//!
//! # Usage
//!
//! ```rust,ignore
//! use gating::verifier::{DecisionPolicy, Thresholds};
//!
//! let policy = DecisionPolicy::default();
//! let result = policy.verify(draft, outline, history.entries(), Thresholds::default())?;
//! println!("{}", result.summary());
//! ```

pub mod policy;
pub mod report;

pub use policy::DecisionPolicy;
pub use report::{
    FailureKind, Thresholds, VerificationResult, FEEDBACK_OFF_TOPIC, FEEDBACK_OK,
    FEEDBACK_REDUNDANT,
};
