//! Writer configuration.
//!
//! Defaults come from `WRITER_*` environment variables (unset or unparsable
//! values keep the built-in default); a TOML file can then overlay
//! thresholds, scoring weights, the similarity signal and loop limits.

use anyhow::{Context, Result};
use gating::{ScoringWeights, Thresholds};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2000;
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 60;

/// Per-section loop parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopParams {
    /// Generation calls allowed per section. 0 is treated as 1.
    pub max_attempts: u32,
    /// Pass/fail gates applied to every draft.
    pub thresholds: Thresholds,
    /// Output budget passed to the generation capability per call.
    pub max_output_tokens: u32,
    /// Bound on every single collaborator call.
    pub call_timeout: Duration,
}

impl Default for LoopParams {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            thresholds: Thresholds::default(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
        }
    }
}

impl LoopParams {
    pub fn effective_max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }
}

/// Draft↔outline similarity signal used by the in-process verifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityKind {
    #[default]
    Bm25,
    /// Cosine over feature-hashed embeddings, built on first use
    HashedEmbedding,
}

impl std::str::FromStr for SimilarityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bm25" => Ok(Self::Bm25),
            "hashed_embedding" | "embedding" => Ok(Self::HashedEmbedding),
            other => Err(format!("unknown similarity signal: {other}")),
        }
    }
}

/// Generation endpoint (OpenAI-compatible).
#[derive(Debug, Clone, PartialEq)]
pub struct LlmEndpoint {
    /// Base URL; `/chat/completions` is appended.
    pub url: String,
    pub model: String,
    /// Sent as a bearer token when set.
    pub api_key: Option<String>,
}

/// Top-level writer configuration.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub llm: LlmEndpoint,
    /// Remote verifier base URL. `None` scores in-process.
    pub verifier_url: Option<String>,
    pub loop_params: LoopParams,
    /// Signal weights for the in-process verifier.
    pub weights: ScoringWeights,
    pub similarity: SimilarityKind,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

impl WriterConfig {
    /// Build from a variable lookup (the process environment in `Default`).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut loop_params = LoopParams::default();
        if let Some(v) = parsed("WRITER_MAX_ATTEMPTS").and_then(|v| v.parse::<u32>().ok()) {
            loop_params.max_attempts = v;
        }
        if let Some(v) = parsed("WRITER_REL_THRESHOLD").and_then(|v| v.parse::<f64>().ok()) {
            loop_params.thresholds.relevancy = v;
        }
        if let Some(v) = parsed("WRITER_RED_THRESHOLD").and_then(|v| v.parse::<f64>().ok()) {
            loop_params.thresholds.redundancy = v;
        }
        if let Some(v) = parsed("WRITER_CALL_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
        {
            loop_params.call_timeout = Duration::from_secs(v);
        }
        if let Some(v) = parsed("WRITER_MAX_OUTPUT_TOKENS")
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|v| *v > 0)
        {
            loop_params.max_output_tokens = v;
        }

        Self {
            llm: LlmEndpoint {
                url: parsed("WRITER_LLM_URL").unwrap_or_else(|| "http://localhost:8000/v1".into()),
                model: parsed("WRITER_LLM_MODEL").unwrap_or_else(|| "default".into()),
                api_key: parsed("WRITER_LLM_API_KEY"),
            },
            verifier_url: parsed("WRITER_VERIFIER_URL"),
            loop_params,
            weights: ScoringWeights::default(),
            similarity: parsed("WRITER_SIMILARITY")
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
        }
    }

    /// Overlay `[thresholds]`, `[weights]` and `[loop]` tables from TOML.
    pub fn apply_toml_str(&mut self, raw: &str) -> Result<()> {
        let overlay: ConfigOverlay =
            toml::from_str(raw).context("Failed to parse writer config TOML")?;

        if let Some(t) = overlay.thresholds {
            self.loop_params.thresholds = t;
        }
        if let Some(w) = overlay.weights {
            self.weights = w;
        }
        if let Some(kind) = overlay.similarity {
            self.similarity = kind;
        }
        if let Some(l) = overlay.r#loop {
            if let Some(v) = l.max_attempts {
                self.loop_params.max_attempts = v;
            }
            if let Some(v) = l.max_output_tokens {
                self.loop_params.max_output_tokens = v;
            }
            if let Some(v) = l.call_timeout_secs {
                self.loop_params.call_timeout = Duration::from_secs(v);
            }
        }
        self.validate()
    }

    pub fn apply_toml_file(&mut self, path: &Path) -> Result<()> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read writer config {}", path.display()))?;
        self.apply_toml_str(&raw)
            .with_context(|| format!("Invalid writer config {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        self.loop_params
            .thresholds
            .validate()
            .map_err(anyhow::Error::msg)
            .context("Invalid thresholds")?;
        self.weights.validate().context("Invalid scoring weights")?;
        if self.loop_params.call_timeout.is_zero() {
            anyhow::bail!("call timeout must be positive");
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigOverlay {
    thresholds: Option<Thresholds>,
    weights: Option<ScoringWeights>,
    similarity: Option<SimilarityKind>,
    r#loop: Option<LoopOverlay>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoopOverlay {
    max_attempts: Option<u32>,
    max_output_tokens: Option<u32>,
    call_timeout_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> WriterConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WriterConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults_without_env() {
        let config = config_from(&[]);
        assert_eq!(config.loop_params, LoopParams::default());
        assert_eq!(config.llm.url, "http://localhost:8000/v1");
        assert!(config.llm.api_key.is_none());
        assert!(config.verifier_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = config_from(&[
            ("WRITER_LLM_URL", "http://gpu:9000/v1"),
            ("WRITER_MAX_ATTEMPTS", "3"),
            ("WRITER_REL_THRESHOLD", "0.5"),
            ("WRITER_RED_THRESHOLD", "0.4"),
            ("WRITER_CALL_TIMEOUT_SECS", "15"),
            ("WRITER_VERIFIER_URL", "http://verifier:8000"),
        ]);
        assert_eq!(config.llm.url, "http://gpu:9000/v1");
        assert_eq!(config.loop_params.max_attempts, 3);
        assert_eq!(config.loop_params.thresholds, Thresholds::new(0.5, 0.4));
        assert_eq!(config.loop_params.call_timeout, Duration::from_secs(15));
        assert_eq!(config.verifier_url.as_deref(), Some("http://verifier:8000"));
    }

    #[test]
    fn test_similarity_selection() {
        assert_eq!(config_from(&[]).similarity, SimilarityKind::Bm25);
        let config = config_from(&[("WRITER_SIMILARITY", "Embedding")]);
        assert_eq!(config.similarity, SimilarityKind::HashedEmbedding);
        let config = config_from(&[("WRITER_SIMILARITY", "word2vec")]);
        assert_eq!(config.similarity, SimilarityKind::Bm25);

        let mut config = config_from(&[]);
        config
            .apply_toml_str("similarity = \"hashed_embedding\"\n")
            .unwrap();
        assert_eq!(config.similarity, SimilarityKind::HashedEmbedding);
    }

    #[test]
    fn test_unparsable_env_falls_back() {
        let config = config_from(&[
            ("WRITER_MAX_ATTEMPTS", "many"),
            ("WRITER_CALL_TIMEOUT_SECS", "0"),
            ("WRITER_LLM_API_KEY", "  "),
        ]);
        assert_eq!(config.loop_params.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(
            config.loop_params.call_timeout,
            Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS)
        );
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        let params = LoopParams::default().with_max_attempts(0);
        assert_eq!(params.effective_max_attempts(), 1);
    }

    #[test]
    fn test_toml_overlay() {
        let mut config = config_from(&[]);
        config
            .apply_toml_str(
                r#"
[thresholds]
relevancy = 0.55

[loop]
max_attempts = 2
call_timeout_secs = 5
"#,
            )
            .unwrap();
        assert_eq!(config.loop_params.thresholds.relevancy, 0.55);
        assert_eq!(config.loop_params.thresholds.redundancy, 0.7);
        assert_eq!(config.loop_params.max_attempts, 2);
        assert_eq!(config.loop_params.call_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_overlay_rejects_bad_values() {
        let mut config = config_from(&[]);
        assert!(config
            .apply_toml_str("[thresholds]\nrelevancy = 1.5\n")
            .is_err());
        let mut config = config_from(&[]);
        assert!(config
            .apply_toml_str("[weights]\nkeyword_coverage = 0.9\n")
            .is_err());
        let mut config = config_from(&[]);
        assert!(config.apply_toml_str("[unknown]\nx = 1\n").is_err());
    }

    #[test]
    fn test_overlay_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("writer.toml");
        std::fs::write(&path, "[loop]\nmax_output_tokens = 800\n").unwrap();
        let mut config = config_from(&[]);
        config.apply_toml_file(&path).unwrap();
        assert_eq!(config.loop_params.max_output_tokens, 800);

        let err = config
            .apply_toml_file(&dir.path().join("missing.toml"))
            .unwrap_err();
        assert!(err.to_string().contains("missing.toml"));
    }
}
