//! Scoring collaborator: the loop's view of the Decision Policy.
//!
//! [`LocalVerifier`] runs the gates in-process. [`RemoteVerifier`] calls a
//! verifier service over HTTP (`POST <url>/verify`) and rebuilds the verdict
//! locally from the returned scores, so pass/fail and feedback always follow
//! the same rules whichever side computed the numbers.

use crate::generator::CollaboratorError;
use async_trait::async_trait;
use gating::{DecisionPolicy, ScoreBreakdown, Thresholds, VerificationResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[async_trait]
pub trait DraftVerifier: Send + Sync {
    async fn verify(
        &self,
        draft: &str,
        outline: &str,
        history: &[String],
        thresholds: Thresholds,
    ) -> Result<VerificationResult, CollaboratorError>;
}

/// In-process verifier backed by [`DecisionPolicy`].
#[derive(Debug, Default)]
pub struct LocalVerifier {
    policy: DecisionPolicy,
}

impl LocalVerifier {
    pub fn new(policy: DecisionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }
}

#[async_trait]
impl DraftVerifier for LocalVerifier {
    async fn verify(
        &self,
        draft: &str,
        outline: &str,
        history: &[String],
        thresholds: Thresholds,
    ) -> Result<VerificationResult, CollaboratorError> {
        Ok(self.policy.verify(draft, outline, history, thresholds)?)
    }
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    draft: &'a str,
    outline: &'a str,
    history: &'a [String],
    rel_threshold: f64,
    red_threshold: f64,
}

/// Body returned by the verifier service.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyResponse {
    pub is_passed: bool,
    pub relevancy_index: f64,
    pub redundancy_index: f64,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub raw_data: RawData,
}

/// Per-axis signal breakdowns. The service sends a placeholder string
/// instead of a map when there is nothing to compare against; anything that
/// is not a map of numbers reads as an empty breakdown.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawData {
    #[serde(default, deserialize_with = "lenient_breakdown")]
    pub relevancy: BTreeMap<String, f64>,
    #[serde(default, deserialize_with = "lenient_breakdown")]
    pub redundancy: BTreeMap<String, f64>,
}

fn lenient_breakdown<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let map = match value {
        serde_json::Value::Object(entries) => entries
            .into_iter()
            .filter_map(|(name, v)| v.as_f64().map(|score| (name, score)))
            .collect(),
        _ => BTreeMap::new(),
    };
    Ok(map)
}

impl VerifyResponse {
    /// Rebuild a [`VerificationResult`] under `thresholds`.
    pub fn into_result(self, thresholds: Thresholds) -> VerificationResult {
        let result = VerificationResult::from_scores(
            self.relevancy_index,
            to_breakdown(self.raw_data.relevancy),
            self.redundancy_index,
            to_breakdown(self.raw_data.redundancy),
            thresholds,
        );
        if result.passed() != self.is_passed {
            tracing::warn!(
                remote = self.is_passed,
                local = result.passed(),
                "Remote verdict disagrees with scores; using scores"
            );
        }
        result
    }
}

fn to_breakdown(map: BTreeMap<String, f64>) -> ScoreBreakdown {
    let mut breakdown = ScoreBreakdown::new();
    for (name, value) in map {
        breakdown.insert(name, value);
    }
    breakdown
}

const SERVICE: &str = "verifier";

/// HTTP client for a remote verifier service.
#[derive(Debug, Clone)]
pub struct RemoteVerifier {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteVerifier {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Use a preconfigured client (timeouts, proxies, TLS).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/verify", self.base_url)
    }
}

#[async_trait]
impl DraftVerifier for RemoteVerifier {
    async fn verify(
        &self,
        draft: &str,
        outline: &str,
        history: &[String],
        thresholds: Thresholds,
    ) -> Result<VerificationResult, CollaboratorError> {
        let request = VerifyRequest {
            draft,
            outline,
            history,
            rel_threshold: thresholds.relevancy,
            red_threshold: thresholds.redundancy,
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| CollaboratorError::Transport {
                service: SERVICE,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        let body: VerifyResponse =
            response
                .json()
                .await
                .map_err(|e| CollaboratorError::Malformed {
                    service: SERVICE,
                    message: e.to_string(),
                })?;

        Ok(body.into_result(thresholds))
    }
}
