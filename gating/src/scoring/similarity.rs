//! Pluggable draft↔outline similarity signals.
//!
//! The relevancy axis needs one "how alike are these two texts" number in
//! [0,1]. Two families are provided behind [`SimilaritySignal`]:
//! - [`Bm25Similarity`]: lexical ranking, no model required
//! - [`EmbeddingSimilarity`]: |cosine| of sentence embeddings from any
//!   [`EmbeddingSource`]; wrap a heavyweight source in [`LazyEmbedding`] to
//!   defer loading it until the first score is requested

use super::tokenize::{qualifying_tokens, Tokenizer};
use super::ScoringError;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

/// A named similarity signal between a draft and its outline.
pub trait SimilaritySignal: Send + Sync {
    /// Key under which the signal appears in the relevancy breakdown.
    fn name(&self) -> &'static str;

    /// Similarity in [0,1].
    fn similarity(
        &self,
        tokenizer: &dyn Tokenizer,
        draft: &str,
        outline: &str,
    ) -> Result<f64, ScoringError>;
}

/// Okapi BM25 over the two-document corpus {outline, draft}.
///
/// The draft's qualifying tokens form the query. The outline's score is
/// normalized by the best score in the corpus, so an outline that matches
/// the draft as well as the draft matches itself scores 1.0.
#[derive(Debug, Clone, Copy)]
pub struct Bm25Similarity {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Similarity {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

impl Bm25Similarity {
    fn score_document(
        &self,
        query: &[String],
        doc_freqs: &HashMap<&str, usize>,
        doc_len: usize,
        avg_len: f64,
        idf: &HashMap<&str, f64>,
    ) -> f64 {
        let norm = 1.0 - self.b + self.b * (doc_len as f64 / avg_len.max(f64::EPSILON));
        query
            .iter()
            .map(|term| {
                let tf = doc_freqs.get(term.as_str()).copied().unwrap_or(0) as f64;
                if tf == 0.0 {
                    return 0.0;
                }
                let weight = idf.get(term.as_str()).copied().unwrap_or(0.0);
                weight * (tf * (self.k1 + 1.0)) / (tf + self.k1 * norm)
            })
            .sum()
    }
}

fn term_frequencies(tokens: &[String]) -> HashMap<&str, usize> {
    let mut freqs = HashMap::new();
    for token in tokens {
        *freqs.entry(token.as_str()).or_insert(0) += 1;
    }
    freqs
}

impl SimilaritySignal for Bm25Similarity {
    fn name(&self) -> &'static str {
        "bm25_similarity"
    }

    fn similarity(
        &self,
        tokenizer: &dyn Tokenizer,
        draft: &str,
        outline: &str,
    ) -> Result<f64, ScoringError> {
        let outline_tokens = qualifying_tokens(tokenizer, outline);
        let draft_tokens = qualifying_tokens(tokenizer, draft);
        if outline_tokens.is_empty() || draft_tokens.is_empty() {
            return Ok(0.0);
        }

        let outline_freqs = term_frequencies(&outline_tokens);
        let draft_freqs = term_frequencies(&draft_tokens);
        let avg_len = (outline_tokens.len() + draft_tokens.len()) as f64 / 2.0;

        // idf = ln(1 + (N - n + 0.5) / (n + 0.5)), N = 2
        let mut idf = HashMap::new();
        for term in outline_freqs.keys().chain(draft_freqs.keys()) {
            let n = outline_freqs.contains_key(term) as usize
                + draft_freqs.contains_key(term) as usize;
            let value = (1.0 + (2.0 - n as f64 + 0.5) / (n as f64 + 0.5)).ln();
            idf.insert(*term, value);
        }

        let outline_score = self.score_document(
            &draft_tokens,
            &outline_freqs,
            outline_tokens.len(),
            avg_len,
            &idf,
        );
        let draft_score =
            self.score_document(&draft_tokens, &draft_freqs, draft_tokens.len(), avg_len, &idf);

        let max = outline_score.max(draft_score);
        if max <= 0.0 {
            return Ok(0.0);
        }
        Ok((outline_score / max).clamp(0.0, 1.0))
    }
}

/// Source of sentence embeddings.
pub trait EmbeddingSource: Send + Sync {
    /// Embed `text` into a fixed-dimension vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, ScoringError>;

    /// Vector dimension.
    fn dimension(&self) -> usize;
}

/// Cosine similarity of two vectors. Mismatched or zero vectors score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        tracing::warn!(
            "cosine_similarity dimension mismatch: a={}, b={}",
            a.len(),
            b.len()
        );
        return 0.0;
    }
    if a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Embedding-backed similarity: |cosine(draft, outline)|.
///
/// The absolute value keeps opposed vectors from producing a negative
/// relevancy contribution.
pub struct EmbeddingSimilarity<E> {
    source: E,
}

impl<E: EmbeddingSource> EmbeddingSimilarity<E> {
    pub fn new(source: E) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &E {
        &self.source
    }
}

impl<E: EmbeddingSource> SimilaritySignal for EmbeddingSimilarity<E> {
    fn name(&self) -> &'static str {
        "semantic_similarity"
    }

    fn similarity(
        &self,
        _tokenizer: &dyn Tokenizer,
        draft: &str,
        outline: &str,
    ) -> Result<f64, ScoringError> {
        let draft_vec = self.source.embed(draft)?;
        let outline_vec = self.source.embed(outline)?;
        let raw = cosine_similarity(&draft_vec, &outline_vec) as f64;
        Ok(raw.abs().clamp(0.0, 1.0))
    }
}

/// Feature-hashing embedding. Deterministic, model-free, unit-normalized.
///
/// Each lower-cased word contributes to four hashed dimensions. Useful as a
/// stand-in wherever a real sentence encoder is not available.
#[derive(Debug, Clone)]
pub struct HashedEmbedding {
    dimension: usize,
}

impl HashedEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for HashedEmbedding {
    fn default() -> Self {
        Self::new(384)
    }
}

impl EmbeddingSource for HashedEmbedding {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ScoringError> {
        let mut embedding = vec![0.0f32; self.dimension];
        for word in text.split_whitespace() {
            let word = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if word.is_empty() {
                continue;
            }
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            let hash = hasher.finish();
            for j in 0..4 {
                let idx = (hash >> (j * 16)) as usize % self.dimension;
                embedding[idx] += 1.0;
            }
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

type Loader<E> = Box<dyn Fn() -> Result<E, ScoringError> + Send + Sync>;

/// Defers construction of an expensive embedding source to its first use.
///
/// A failed load is not cached; the next call tries again.
pub struct LazyEmbedding<E> {
    loader: Loader<E>,
    cell: OnceLock<E>,
    dimension: usize,
}

impl<E: EmbeddingSource> LazyEmbedding<E> {
    pub fn new(
        dimension: usize,
        loader: impl Fn() -> Result<E, ScoringError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            loader: Box::new(loader),
            cell: OnceLock::new(),
            dimension,
        }
    }

    /// Whether the underlying source has been constructed.
    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    fn get(&self) -> Result<&E, ScoringError> {
        if let Some(source) = self.cell.get() {
            return Ok(source);
        }
        tracing::info!("Loading embedding source on first use");
        let source = (self.loader)()?;
        Ok(self.cell.get_or_init(|| source))
    }
}

impl<E: EmbeddingSource> EmbeddingSource for LazyEmbedding<E> {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ScoringError> {
        self.get()?.embed(text)
    }

    fn dimension(&self) -> usize {
        self.cell
            .get()
            .map(|s| s.dimension())
            .unwrap_or(self.dimension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::WordTokenizer;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_bm25_identical_texts_score_one() {
        let sim = Bm25Similarity::default()
            .similarity(&WordTokenizer, "solar panels convert light", "solar panels convert light")
            .unwrap();
        assert!((sim - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_bm25_disjoint_texts_score_zero() {
        let sim = Bm25Similarity::default()
            .similarity(&WordTokenizer, "Plants make food.", "Explain photosynthesis")
            .unwrap();
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn test_bm25_partial_overlap_in_unit_range() {
        let sim = Bm25Similarity::default()
            .similarity(
                &WordTokenizer,
                "Photosynthesis lets plants turn sunlight into sugar.",
                "Explain photosynthesis in plants",
            )
            .unwrap();
        assert!(sim > 0.0 && sim < 1.0, "got {sim}");
    }

    #[test]
    fn test_cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    struct FixedEmbedding(Vec<(String, Vec<f32>)>);

    impl EmbeddingSource for FixedEmbedding {
        fn embed(&self, text: &str) -> Result<Vec<f32>, ScoringError> {
            self.0
                .iter()
                .find(|(k, _)| k == text)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| ScoringError::Embedding(format!("no vector for {text}")))
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    #[test]
    fn test_embedding_similarity_uses_absolute_cosine() {
        let source = FixedEmbedding(vec![
            ("up".to_string(), vec![1.0, 0.0]),
            ("down".to_string(), vec![-1.0, 0.0]),
        ]);
        let signal = EmbeddingSimilarity::new(source);
        let sim = signal.similarity(&WordTokenizer, "up", "down").unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
        assert_eq!(signal.name(), "semantic_similarity");
    }

    #[test]
    fn test_embedding_failure_propagates() {
        let signal = EmbeddingSimilarity::new(FixedEmbedding(vec![]));
        let err = signal.similarity(&WordTokenizer, "a", "b").unwrap_err();
        assert!(matches!(err, ScoringError::Embedding(_)));
    }

    #[test]
    fn test_hashed_embedding_is_unit_and_deterministic() {
        let source = HashedEmbedding::new(64);
        let a = source.embed("Cats have fur").unwrap();
        let b = source.embed("cats have fur!").unwrap();
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert_eq!(source.dimension(), 64);
    }

    #[test]
    fn test_lazy_embedding_loads_once_on_first_use() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let lazy = LazyEmbedding::new(32, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(HashedEmbedding::new(32))
        });

        assert!(!lazy.is_loaded());
        assert_eq!(loads.load(Ordering::SeqCst), 0);

        lazy.embed("first").unwrap();
        lazy.embed("second").unwrap();
        assert!(lazy.is_loaded());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lazy_embedding_retries_after_failed_load() {
        let lazy: LazyEmbedding<HashedEmbedding> =
            LazyEmbedding::new(8, || Err(ScoringError::Embedding("model missing".into())));
        assert!(lazy.embed("x").is_err());
        assert!(!lazy.is_loaded());
        assert_eq!(lazy.dimension(), 8);
    }
}
