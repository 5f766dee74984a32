//! Signal weights for both scoring axes.
//!
//! Every weight is configuration, not a constant. Defaults:
//!
//! | weight | default | axis |
//! |---|---|---|
//! | `keyword_coverage` | 0.5 | relevancy |
//! | `lexical_similarity` | 0.3 | relevancy |
//! | `length_adequacy` | 0.2 | relevancy |
//! | `token_overlap` | 0.6 | redundancy |
//! | `bigram_overlap` | 0.4 | redundancy |

use super::ScoringError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const SUM_TOLERANCE: f64 = 1e-6;

/// Weights applied to the named signals of each axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Fraction of outline terms found in the draft
    pub keyword_coverage: f64,
    /// Draft↔outline similarity signal (BM25 or embedding)
    pub lexical_similarity: f64,
    /// Draft/outline length ratio, capped at 1.0
    pub length_adequacy: f64,
    /// Fraction of draft tokens already present in history
    pub token_overlap: f64,
    /// Fraction of draft bigrams already present in history
    pub bigram_overlap: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            keyword_coverage: 0.5,
            lexical_similarity: 0.3,
            length_adequacy: 0.2,
            token_overlap: 0.6,
            bigram_overlap: 0.4,
        }
    }
}

impl ScoringWeights {
    /// Check ranges and per-axis sums.
    pub fn validate(&self) -> Result<(), ScoringError> {
        for (name, value) in self.as_table() {
            if !(0.0..=1.0).contains(&value) {
                return Err(ScoringError::InvalidWeights(format!(
                    "{} = {} is outside [0, 1]",
                    name, value
                )));
            }
        }

        let relevancy = self.keyword_coverage + self.lexical_similarity + self.length_adequacy;
        if (relevancy - 1.0).abs() > SUM_TOLERANCE {
            return Err(ScoringError::InvalidWeights(format!(
                "relevancy weights sum to {:.4}, expected 1.0",
                relevancy
            )));
        }

        let redundancy = self.token_overlap + self.bigram_overlap;
        if (redundancy - 1.0).abs() > SUM_TOLERANCE {
            return Err(ScoringError::InvalidWeights(format!(
                "redundancy weights sum to {:.4}, expected 1.0",
                redundancy
            )));
        }

        Ok(())
    }

    /// The `{weight_name: value}` table.
    pub fn as_table(&self) -> BTreeMap<&'static str, f64> {
        BTreeMap::from([
            ("keyword_coverage", self.keyword_coverage),
            ("lexical_similarity", self.lexical_similarity),
            ("length_adequacy", self.length_adequacy),
            ("token_overlap", self.token_overlap),
            ("bigram_overlap", self.bigram_overlap),
        ])
    }

    /// Parse from a TOML document and validate.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let weights: Self = toml::from_str(raw).context("Failed to parse scoring weights")?;
        weights.validate()?;
        Ok(weights)
    }

    /// Load from a TOML file and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read weights file {}", path.display()))?;
        Self::from_toml_str(&raw)
    }
}
