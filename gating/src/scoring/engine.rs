//! The scoring engine: pure (draft, outline, history) → two explained scores.

use super::similarity::{Bm25Similarity, SimilaritySignal};
use super::tokenize::{bigrams, qualifying_tokens, Tokenizer, WordTokenizer};
use super::weights::ScoringWeights;
use super::{round4, AxisScore, ScoreBreakdown, ScoringError};
use std::collections::HashSet;

/// Computes relevancy and redundancy from pluggable primitives.
pub struct ScoringEngine {
    tokenizer: Box<dyn Tokenizer>,
    similarity: Box<dyn SimilaritySignal>,
    weights: ScoringWeights,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self {
            tokenizer: Box::new(WordTokenizer),
            similarity: Box::new(Bm25Similarity::default()),
            weights: ScoringWeights::default(),
        }
    }
}

impl std::fmt::Debug for ScoringEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringEngine")
            .field("similarity", &self.similarity.name())
            .field("weights", &self.weights)
            .finish()
    }
}

impl ScoringEngine {
    /// Create an engine with the default tokenizer and BM25 similarity.
    pub fn new(weights: ScoringWeights) -> Result<Self, ScoringError> {
        weights.validate()?;
        Ok(Self {
            weights,
            ..Self::default()
        })
    }

    /// Swap the draft↔outline similarity signal.
    pub fn with_similarity(mut self, similarity: Box<dyn SimilaritySignal>) -> Self {
        self.similarity = similarity;
        self
    }

    /// Swap the tokenizer used by every signal.
    pub fn with_tokenizer(mut self, tokenizer: Box<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Name of the active similarity signal.
    pub fn similarity_name(&self) -> &'static str {
        self.similarity.name()
    }

    /// How well `draft` covers `outline`.
    ///
    /// An outline with no qualifying tokens has keyword coverage 0.0: with
    /// nothing to check against, relevance is not verified.
    pub fn score_relevancy(&self, draft: &str, outline: &str) -> Result<AxisScore, ScoringError> {
        let outline_terms: HashSet<String> = qualifying_tokens(self.tokenizer.as_ref(), outline)
            .into_iter()
            .collect();
        let draft_terms: HashSet<String> = qualifying_tokens(self.tokenizer.as_ref(), draft)
            .into_iter()
            .collect();

        let keyword_coverage = if outline_terms.is_empty() {
            0.0
        } else {
            outline_terms.intersection(&draft_terms).count() as f64 / outline_terms.len() as f64
        };

        let similarity = self
            .similarity
            .similarity(self.tokenizer.as_ref(), draft, outline)?;

        let outline_len = outline.chars().count().max(1) as f64;
        let length_score = (draft.chars().count() as f64 / outline_len).min(1.0);

        let score = keyword_coverage * self.weights.keyword_coverage
            + similarity * self.weights.lexical_similarity
            + length_score * self.weights.length_adequacy;

        let mut breakdown = ScoreBreakdown::new();
        breakdown.insert("keyword_coverage", keyword_coverage);
        breakdown.insert(self.similarity.name(), similarity);
        breakdown.insert("length_score", length_score);

        tracing::trace!(score, %breakdown, "Relevancy scored");

        Ok(AxisScore {
            score: round4(score),
            breakdown,
        })
    }

    /// How much of `draft` is already said in `history`.
    ///
    /// Empty history is exactly 0.0 and returns before any tokenization.
    /// History bigrams are collected per entry, never across two entries.
    pub fn score_redundancy(&self, draft: &str, history: &[String]) -> AxisScore {
        let mut breakdown = ScoreBreakdown::new();
        if history.is_empty() {
            breakdown.insert("token_overlap", 0.0);
            breakdown.insert("bigram_overlap", 0.0);
            return AxisScore {
                score: 0.0,
                breakdown,
            };
        }

        let draft_tokens = qualifying_tokens(self.tokenizer.as_ref(), draft);
        let draft_set: HashSet<&String> = draft_tokens.iter().collect();
        let draft_pairs = bigrams(&draft_tokens);

        let mut history_set: HashSet<String> = HashSet::new();
        let mut history_pairs = HashSet::new();
        for entry in history {
            let tokens = qualifying_tokens(self.tokenizer.as_ref(), entry);
            history_pairs.extend(bigrams(&tokens));
            history_set.extend(tokens);
        }

        let token_overlap = if draft_set.is_empty() {
            0.0
        } else {
            draft_set.iter().filter(|t| history_set.contains(**t)).count() as f64
                / draft_set.len() as f64
        };

        let bigram_overlap = if draft_pairs.is_empty() {
            0.0
        } else {
            draft_pairs.intersection(&history_pairs).count() as f64 / draft_pairs.len() as f64
        };

        let score =
            token_overlap * self.weights.token_overlap + bigram_overlap * self.weights.bigram_overlap;

        breakdown.insert("token_overlap", token_overlap);
        breakdown.insert("bigram_overlap", bigram_overlap);

        tracing::trace!(score, %breakdown, "Redundancy scored");

        AxisScore {
            score: round4(score),
            breakdown,
        }
    }
}
