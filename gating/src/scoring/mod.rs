//! Scoring Engine — interpretable relevancy and redundancy scores
//!
//! Both axes are weighted sums of named, independently inspectable signals,
//! never a single opaque distance, so a failed draft can be diagnosed.
//!
//! # Relevancy (draft vs. outline)
//!
//! ```text
//! keyword_coverage × w₁ + similarity × w₂ + length_score × w₃
//! ```
//!
//! # Redundancy (draft vs. history)
//!
//! ```text
//! token_overlap × w₄ + bigram_overlap × w₅      (0.0 when history is empty)
//! ```
//!
//! Weights live in [`ScoringWeights`]; the similarity signal and tokenizer
//! are pluggable ([`SimilaritySignal`], [`Tokenizer`]).

pub mod engine;
pub mod similarity;
pub mod tokenize;
pub mod weights;

pub use engine::ScoringEngine;
pub use similarity::{
    cosine_similarity, Bm25Similarity, EmbeddingSimilarity, EmbeddingSource, HashedEmbedding,
    LazyEmbedding, SimilaritySignal,
};
pub use tokenize::{bigrams, is_qualifying, qualifying_tokens, Tokenizer, WordTokenizer};
pub use weights::ScoringWeights;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from the scoring engine or its signal sources
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("Embedding source failed: {0}")]
    Embedding(String),

    #[error("Invalid scoring weights: {0}")]
    InvalidWeights(String),
}

/// Named signal → value in [0,1].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreBreakdown(BTreeMap<String, f64>);

impl ScoreBreakdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a signal value.
    pub fn insert(&mut self, signal: impl Into<String>, value: f64) {
        self.0.insert(signal.into(), value);
    }

    /// Value of a signal, if recorded.
    pub fn get(&self, signal: &str) -> Option<f64> {
        self.0.get(signal).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ScoreBreakdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(k, v)| format!("{}={:.3}", k, v))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// A top-level score plus the signals that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisScore {
    /// Weighted sum, rounded to 4 decimals
    pub score: f64,
    /// Contributing signals (unrounded)
    pub breakdown: ScoreBreakdown,
}

/// Round to 4 decimal places.
pub(crate) fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
