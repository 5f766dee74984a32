//! Section Writer
//!
//! Writes a document one section at a time, from a hand-written plan or
//! from an outline planned by the generation capability. Each section runs
//! a bounded generate → score → refine loop; the gates and the refinement
//! strategy come from the `gating` crate, generation and (optionally)
//! scoring are external collaborators reached over HTTP.

#![allow(clippy::uninlined_format_args)]

pub mod config;
pub mod document;
pub mod generator;
pub mod outliner;
pub mod section_loop;
pub mod state_machine;
pub mod telemetry;
pub mod verification;

pub use config::{LlmEndpoint, LoopParams, SimilarityKind, WriterConfig};
pub use document::{
    DocumentCoordinator, DocumentReport, DocumentRequest, FailedSection, SectionSummary,
};
pub use generator::{
    CollaboratorError, DraftGenerator, GenerationRequest, GenerationResponse,
    OpenAiCompatGenerator,
};
pub use outliner::{DocumentStructure, OutlineError, OutlineRequest, Outliner};
pub use section_loop::{CallStage, SectionError, SectionLoop, SectionResult};
pub use state_machine::{IllegalTransition, SectionState, SectionStateMachine, TransitionRecord};
pub use telemetry::{RunTelemetry, SectionOutcome, SectionTelemetry};
pub use verification::{DraftVerifier, LocalVerifier, RemoteVerifier};
