//! Section Loop — bounded generate → score → refine cycle for one outline.
//!
//! Attempts run strictly one after another: each attempt's instructions are
//! derived from the previous attempt's verdict. Every collaborator call is
//! bounded by [`LoopParams::call_timeout`]; a timeout is handled exactly like
//! a transport error and aborts the section.

use crate::config::LoopParams;
use crate::generator::{CollaboratorError, DraftGenerator, GenerationRequest};
use crate::state_machine::{
    IllegalTransition, SectionState, SectionStateMachine, TransitionRecord,
};
use crate::verification::DraftVerifier;
use gating::{
    refine, FailureAnalysis, History, InstructionSet, IterationRecord, VerificationResult,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn, Instrument};

/// Collaborator call that ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStage {
    Generation,
    Verification,
}

impl std::fmt::Display for CallStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generation => write!(f, "generation"),
            Self::Verification => write!(f, "verification"),
        }
    }
}

/// Why a section was aborted.
#[derive(Debug, Error)]
pub enum SectionError {
    /// The generation capability reported `success = false`.
    #[error("Generation failed: {0}")]
    Generation(String),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("{stage} call timed out after {}s", .after.as_secs_f64())]
    Timeout { stage: CallStage, after: Duration },

    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
}

/// Outcome of one Section Loop run.
#[derive(Debug)]
pub struct SectionResult {
    /// True for `Passed` and for the soft success of `Exhausted`.
    pub success: bool,
    pub exhausted: bool,
    /// Set when the section was accepted without passing verification.
    pub warning: Option<String>,
    /// Accepted draft; `None` when aborted.
    pub draft: Option<String>,
    /// Generation calls made, including a call that aborted the section.
    pub iterations: u32,
    pub final_state: SectionState,
    pub records: Vec<IterationRecord>,
    pub error: Option<SectionError>,
    /// Present on exhausted sections.
    pub failure_analysis: Option<FailureAnalysis>,
    pub transitions: Vec<TransitionRecord>,
    pub elapsed_ms: u64,
}

impl SectionResult {
    /// Verdict of the last scored attempt.
    pub fn verification(&self) -> Option<&VerificationResult> {
        self.final_record().map(|r| &r.verification)
    }

    pub fn final_record(&self) -> Option<&IterationRecord> {
        self.records.last()
    }

    pub fn is_aborted(&self) -> bool {
        self.final_state == SectionState::Aborted
    }
}

enum Accepted {
    Passed(String),
    Exhausted(String),
}

/// Drives one outline through the state machine.
#[derive(Clone)]
pub struct SectionLoop {
    generator: Arc<dyn DraftGenerator>,
    verifier: Arc<dyn DraftVerifier>,
}

impl SectionLoop {
    pub fn new(generator: Arc<dyn DraftGenerator>, verifier: Arc<dyn DraftVerifier>) -> Self {
        Self {
            generator,
            verifier,
        }
    }

    /// Run the loop for `outline`.
    ///
    /// On `Passed` or `Exhausted` the accepted draft is pushed onto `history`
    /// exactly once; on `Aborted` history is left untouched.
    pub async fn run_section(
        &self,
        outline: &str,
        initial: InstructionSet,
        history: &mut History,
        params: &LoopParams,
    ) -> SectionResult {
        let span = tracing::info_span!(
            "section",
            outline = %preview(outline),
            max_attempts = params.effective_max_attempts(),
            history_len = history.len(),
            outcome = tracing::field::Empty,
        );

        let started = Instant::now();
        let mut sm = SectionStateMachine::new();
        let mut records = Vec::new();

        let outcome = self
            .drive(outline, initial, history, params, &mut sm, &mut records)
            .instrument(span.clone())
            .await;

        let iterations = sm.attempt();
        let mut result = SectionResult {
            success: false,
            exhausted: false,
            warning: None,
            draft: None,
            iterations,
            final_state: sm.current(),
            records: Vec::new(),
            error: None,
            failure_analysis: None,
            transitions: Vec::new(),
            elapsed_ms: 0,
        };

        match outcome {
            Ok(Accepted::Passed(draft)) => {
                history.push(draft.clone());
                info!(parent: &span, iterations, "Section passed");
                result.success = true;
                result.draft = Some(draft);
            }
            Ok(Accepted::Exhausted(draft)) => {
                history.push(draft.clone());
                let analysis = FailureAnalysis::from_records(&records);
                let last = records
                    .last()
                    .map(|r| r.verification.summary())
                    .unwrap_or_default();
                let warning = format!(
                    "No draft passed verification in {} attempts; last draft accepted {}",
                    iterations, last
                );
                warn!(parent: &span, iterations, issues = ?analysis.issues, "Section exhausted");
                result.success = true;
                result.exhausted = true;
                result.warning = Some(warning);
                result.draft = Some(draft);
                result.failure_analysis = Some(analysis);
            }
            Err(e) => {
                if !sm.is_terminal() {
                    let _ = sm.abort(&e.to_string());
                }
                warn!(parent: &span, iterations, error = %e, "Section aborted");
                result.error = Some(e);
            }
        }

        span.record("outcome", tracing::field::display(sm.current()));
        result.final_state = sm.current();
        result.records = records;
        result.transitions = sm.into_transitions();
        result.elapsed_ms = started.elapsed().as_millis() as u64;
        result
    }

    async fn drive(
        &self,
        outline: &str,
        initial: InstructionSet,
        history: &History,
        params: &LoopParams,
        sm: &mut SectionStateMachine,
        records: &mut Vec<IterationRecord>,
    ) -> Result<Accepted, SectionError> {
        let max_attempts = params.effective_max_attempts();
        let mut instructions = initial;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            sm.set_attempt(attempt);
            sm.advance(SectionState::Generating, None)?;

            let request = GenerationRequest::new(&instructions, params.max_output_tokens);
            let response =
                tokio::time::timeout(params.call_timeout, self.generator.generate(request))
                    .await
                    .map_err(|_| SectionError::Timeout {
                        stage: CallStage::Generation,
                        after: params.call_timeout,
                    })??;
            if !response.success {
                return Err(SectionError::Generation(
                    response
                        .error
                        .unwrap_or_else(|| "generation capability reported failure".into()),
                ));
            }
            let draft = response.text;

            sm.advance(SectionState::Scoring, None)?;
            let verification = tokio::time::timeout(
                params.call_timeout,
                self.verifier
                    .verify(&draft, outline, history.entries(), params.thresholds),
            )
            .await
            .map_err(|_| SectionError::Timeout {
                stage: CallStage::Verification,
                after: params.call_timeout,
            })??;

            info!(
                attempt,
                passed = verification.passed(),
                relevancy = verification.relevancy_score(),
                redundancy = verification.redundancy_score(),
                feedback = verification.feedback(),
                "Draft scored"
            );
            records.push(IterationRecord::new(attempt, draft.clone(), verification.clone()));

            if verification.passed() {
                sm.advance(SectionState::Passed, Some(verification.feedback()))?;
                return Ok(Accepted::Passed(draft));
            }
            if attempt >= max_attempts {
                sm.advance(SectionState::Exhausted, Some(verification.feedback()))?;
                return Ok(Accepted::Exhausted(draft));
            }

            sm.advance(SectionState::Refining, Some(verification.feedback()))?;
            instructions = refine(
                &instructions,
                &draft,
                &verification,
                outline,
                history.entries(),
                attempt,
            );
        }
    }
}

/// First 60 characters of an outline for span fields.
fn preview(outline: &str) -> String {
    let trimmed = outline.trim();
    match trimmed.char_indices().nth(60) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
