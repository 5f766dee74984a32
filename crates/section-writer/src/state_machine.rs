//! Section State Machine — explicit states and legal transition guards.
//!
//! Every section runs through:
//!
//! ```text
//! Init → Generating → Scoring → Passed
//!                        │
//!                        ├→ Refining → Generating (next attempt)
//!                        └→ Exhausted (attempt budget spent, draft kept)
//!
//! any non-terminal state → Aborted (collaborator failure)
//! ```
//!
//! The loop calls [`SectionStateMachine::advance`] for each move; illegal
//! edges are rejected and every accepted edge is logged for the report.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionState {
    /// Instructions prepared, nothing generated yet.
    Init,
    /// Waiting on the generation capability.
    Generating,
    /// Waiting on the verifier.
    Scoring,
    /// Composing the next instruction set after a failed verdict.
    Refining,
    /// Draft accepted by both gates. Terminal.
    Passed,
    /// Attempt budget spent; last draft accepted with a warning. Terminal.
    Exhausted,
    /// A collaborator failed; nothing appended. Terminal.
    Aborted,
}

impl SectionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Passed | Self::Exhausted | Self::Aborted)
    }
}

impl fmt::Display for SectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "Init"),
            Self::Generating => write!(f, "Generating"),
            Self::Scoring => write!(f, "Scoring"),
            Self::Refining => write!(f, "Refining"),
            Self::Passed => write!(f, "Passed"),
            Self::Exhausted => write!(f, "Exhausted"),
            Self::Aborted => write!(f, "Aborted"),
        }
    }
}

fn is_legal_transition(from: SectionState, to: SectionState) -> bool {
    use SectionState::*;

    if to == Aborted && !from.is_terminal() {
        return true;
    }

    matches!(
        (from, to),
        (Init, Generating)
            | (Generating, Scoring)
            | (Scoring, Passed)
            | (Scoring, Refining)
            | (Scoring, Exhausted)
            | (Refining, Generating)
    )
}

/// A single recorded state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: SectionState,
    pub to: SectionState,
    /// Attempt number at the time of transition (0 before the first call).
    pub attempt: u32,
    /// Milliseconds since the section started.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: SectionState,
    pub to: SectionState,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Illegal state transition: {} → {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

/// Per-section state machine with a full transition log.
#[derive(Debug)]
pub struct SectionStateMachine {
    current: SectionState,
    attempt: u32,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl SectionStateMachine {
    pub fn new() -> Self {
        Self {
            current: SectionState::Init,
            attempt: 0,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> SectionState {
        self.current
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn set_attempt(&mut self, attempt: u32) {
        self.attempt = attempt;
    }

    pub fn advance(
        &mut self,
        to: SectionState,
        reason: Option<&str>,
    ) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }

        tracing::debug!(
            from = %self.current,
            to = %to,
            attempt = self.attempt,
            "Section state transition"
        );

        self.transitions.push(TransitionRecord {
            from: self.current,
            to,
            attempt: self.attempt,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        });
        self.current = to;
        Ok(())
    }

    /// Move to `Aborted`; legal from any non-terminal state.
    pub fn abort(&mut self, reason: &str) -> Result<(), IllegalTransition> {
        self.advance(SectionState::Aborted, Some(reason))
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    pub fn into_transitions(self) -> Vec<TransitionRecord> {
        self.transitions
    }

    /// e.g. `Init → Passed (3 transitions) [Generating → Scoring → Passed]`
    pub fn summary(&self) -> String {
        let states: Vec<String> = self.transitions.iter().map(|t| t.to.to_string()).collect();
        let mut out = format!(
            "{} → {} ({} transitions)",
            SectionState::Init,
            self.current,
            self.transitions.len()
        );
        if !states.is_empty() {
            out.push_str(&format!(" [{}]", states.join(" → ")));
        }
        out
    }
}

impl Default for SectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
