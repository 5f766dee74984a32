//! Decision Policy: turns scores into a verdict.

use super::report::{Thresholds, VerificationResult};
use crate::scoring::{ScoringEngine, ScoringError};

/// Wraps a [`ScoringEngine`] and applies the two thresholds.
#[derive(Debug, Default)]
pub struct DecisionPolicy {
    engine: ScoringEngine,
}

impl DecisionPolicy {
    pub fn new(engine: ScoringEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    /// Score `draft` on both axes and decide.
    ///
    /// Passes iff `relevancy >= thresholds.relevancy` and
    /// `redundancy <= thresholds.redundancy`. Only a failing similarity
    /// signal (e.g. an embedding backend) produces an error.
    pub fn verify(
        &self,
        draft: &str,
        outline: &str,
        history: &[String],
        thresholds: Thresholds,
    ) -> Result<VerificationResult, ScoringError> {
        let relevancy = self.engine.score_relevancy(draft, outline)?;
        let redundancy = self.engine.score_redundancy(draft, history);

        let result = VerificationResult::from_scores(
            relevancy.score,
            relevancy.breakdown,
            redundancy.score,
            redundancy.breakdown,
            thresholds,
        );

        tracing::debug!(
            passed = result.passed(),
            relevancy = result.relevancy_score(),
            redundancy = result.redundancy_score(),
            history_len = history.len(),
            "Draft verified"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{EmbeddingSimilarity, EmbeddingSource};
    use crate::verifier::FailureKind;

    #[test]
    fn test_photosynthesis_short_draft_fails_relevancy() {
        let policy = DecisionPolicy::default();
        let r = policy
            .verify(
                "Plants make food.",
                "Explain photosynthesis",
                &[],
                Thresholds::new(0.6, 0.7),
            )
            .unwrap();
        assert!(!r.passed());
        assert_eq!(r.failures(), &[FailureKind::Relevancy]);
        assert!(r.feedback().contains("deviating from the outline"));
        assert_eq!(r.redundancy_score(), 0.0);
    }

    #[test]
    fn test_cats_draft_fails_redundancy() {
        let policy = DecisionPolicy::default();
        let history = vec!["Cats are mammals.".to_string(), "Cats have fur.".to_string()];
        let r = policy
            .verify(
                "Cats are mammals with fur.",
                "Describe cats",
                &history,
                Thresholds::new(0.0, 0.5),
            )
            .unwrap();
        assert!(r.has_failure(FailureKind::Redundancy));
        assert!(r.feedback().contains("redundant with previous sections"));
        assert!(r.redundancy_breakdown().get("token_overlap").unwrap() >= 0.8);
    }

    #[test]
    fn test_exact_threshold_scores_pass() {
        let policy = DecisionPolicy::default();
        let history = vec!["Cats are mammals.".to_string(), "Cats have fur.".to_string()];
        let draft = "Cats are mammals with fur.";
        let outline = "Cats are mammals";
        let probe = policy
            .verify(draft, outline, &history, Thresholds::default())
            .unwrap();

        let exact = Thresholds::new(probe.relevancy_score(), probe.redundancy_score());
        let r = policy.verify(draft, outline, &history, exact).unwrap();
        assert!(r.passed(), "{}", r.summary());
    }

    struct BrokenEmbedding;

    impl EmbeddingSource for BrokenEmbedding {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, ScoringError> {
            Err(ScoringError::Embedding("backend unreachable".into()))
        }

        fn dimension(&self) -> usize {
            0
        }
    }

    #[test]
    fn test_signal_failure_is_an_error_not_a_verdict() {
        let engine = ScoringEngine::default()
            .with_similarity(Box::new(EmbeddingSimilarity::new(BrokenEmbedding)));
        let policy = DecisionPolicy::new(engine);
        let err = policy
            .verify("draft", "outline", &[], Thresholds::default())
            .unwrap_err();
        assert!(err.to_string().contains("backend unreachable"));
    }
}
