//! Draft Gating Library
//!
//! Deterministic quality gates for section-by-section long-form generation:
//! - Scoring engine: relevancy of a draft to its outline, redundancy against
//!   previously accepted sections, each explained by named signals
//! - Decision policy: two independent thresholds → pass/fail verdict with a
//!   structured failure classification and a single feedback line
//! - Refinement strategy: failure diagnosis → freshly composed instruction set
//!   with corrective blocks and a negative exemplar
//! - History: the ordered, append-only record of accepted drafts and the
//!   storage collaborator contract behind it
//!
//! # Flow
//!
//! ```text
//! draft ─→ ScoringEngine ─→ DecisionPolicy ─→ VerificationResult ─→ refine() ─→ InstructionSet
//!              ↑                                                      ↑
//!           History ──────────────────────────────────────────────────┘
//! ```
//!
//! Nothing in this crate performs I/O against a generation backend; the
//! retry loop that drives these pieces lives in `section-writer`.

#![allow(clippy::uninlined_format_args)]

pub mod feedback;
pub mod history;
pub mod scoring;
pub mod verifier;

// Re-export scoring types
pub use scoring::{
    AxisScore, Bm25Similarity, EmbeddingSimilarity, EmbeddingSource, HashedEmbedding,
    LazyEmbedding, ScoreBreakdown, ScoringEngine, ScoringError, ScoringWeights,
    SimilaritySignal, Tokenizer, WordTokenizer,
};

// Re-export decision policy types
pub use verifier::{DecisionPolicy, FailureKind, Thresholds, VerificationResult};

// Re-export refinement types
pub use feedback::{
    refine, BaseConstraints, CorrectiveBlock, FailureAnalysis, InstructionSet,
    IterationRecord,
};

// Re-export history types
pub use history::{
    History, HistoryEntry, HistoryError, HistoryStatistics, HistoryStore, InMemoryHistoryStore,
    JsonlHistoryStore,
};
