//! Refinement Module
//!
//! Turns a failed verdict into the next attempt's instructions:
//!
//! 1. [`InstructionSet::initial`] for the first attempt (base constraints only)
//! 2. [`refine`] after every failed attempt, composing a brand-new set with
//!    corrective blocks, the verifier's feedback line and the failed draft as
//!    a negative exemplar
//! 3. [`FailureAnalysis`] summarising what went wrong across a section

pub mod analysis;
pub mod instructions;
pub mod refinement;

pub use analysis::{FailureAnalysis, IterationRecord};
pub use instructions::{
    context_excerpt, key_terms, BaseConstraints, CorrectiveBlock, InstructionSet, CONTEXT_TOP_K,
    MAX_ENTITY_TERMS,
};
pub use refinement::{
    exemplar, negative_constraints, refine, EXEMPLAR_MAX_CHARS, MAX_NEGATIVE_CONSTRAINTS,
};
