//! Refinement Strategy: failed verdict in, fresh instruction set out.
//!
//! The new instruction set is composed from scratch every time. Only the
//! preamble is carried over from the previous set; base constraints are
//! re-derived from the outline, so they can never be lost across iterations.

use super::instructions::{
    context_excerpt, BaseConstraints, CorrectiveBlock, InstructionSet, CONTEXT_TOP_K,
};
use crate::verifier::{FailureKind, VerificationResult};

/// Character cap on the failed draft quoted as a negative exemplar.
pub const EXEMPLAR_MAX_CHARS: usize = 500;
/// Sentences from the failed draft turned into "do not repeat" constraints.
pub const MAX_NEGATIVE_CONSTRAINTS: usize = 2;
/// Sentences at or below this length are too short to be worth forbidding.
const MIN_SENTENCE_CHARS: usize = 10;

/// Compose the instructions for the next attempt.
///
/// `iteration` is the 1-based index of this refinement; it is stamped on
/// the result and echoed in the text.
pub fn refine(
    previous: &InstructionSet,
    failed_draft: &str,
    verification: &VerificationResult,
    outline: &str,
    history: &[String],
    iteration: u32,
) -> InstructionSet {
    let outline = outline.trim();
    let constraints = BaseConstraints::derive(outline);

    let mut blocks = Vec::new();
    if verification.has_failure(FailureKind::Redundancy) {
        blocks.push(CorrectiveBlock::Redundancy);
    }
    if verification.has_failure(FailureKind::Relevancy) {
        blocks.push(CorrectiveBlock::Relevancy);
    }
    if blocks.is_empty() {
        blocks.push(CorrectiveBlock::MinorAdjustment);
    }

    let mut text = String::new();
    text.push_str("## Task\n\nWrite content for the outline below.\n\n");
    text.push_str("## Outline\n\n");
    text.push_str(outline);
    text.push_str("\n\n");

    if let Some(preamble) = previous.preamble() {
        text.push_str("## System Guidance\n\n");
        text.push_str(preamble);
        text.push_str("\n\n");
    }

    text.push_str("## Background Context\n\n");
    text.push_str(&context_excerpt(history, CONTEXT_TOP_K));
    text.push_str("\n\n");

    text.push_str("## Base Constraints\n\n");
    text.push_str(&constraints.render());
    text.push('\n');

    text.push_str(&format!("## Revision Requirements (revision {})\n\n", iteration));
    for block in &blocks {
        match block {
            CorrectiveBlock::Redundancy => push_redundancy_block(&mut text, failed_draft),
            CorrectiveBlock::Relevancy => push_relevancy_block(&mut text, outline),
            CorrectiveBlock::MinorAdjustment => push_minor_block(&mut text),
        }
    }

    text.push_str("## Verifier Feedback\n\n");
    text.push_str(verification.feedback());
    text.push_str("\n\n");

    text.push_str("## Previous Draft (rejected, do not reproduce)\n\n---\n");
    text.push_str(&exemplar(failed_draft));
    text.push_str("\n---\n\n");

    text.push_str(
        "Regenerate the passage following the guidance above. It should:\n\
         1. Be of moderate length (200-500 words)\n\
         2. Be logically clear and precise\n\
         3. Differ completely from the previous attempt\n\
         4. Balance relevance to the outline with new information\n",
    );

    tracing::debug!(
        iteration,
        blocks = ?blocks,
        chars = text.len(),
        "Composed refined instructions"
    );

    InstructionSet::from_parts(
        text,
        iteration,
        previous.preamble().map(String::from),
        blocks,
    )
}

fn push_redundancy_block(text: &mut String, failed_draft: &str) {
    text.push_str("### Redundancy Problem\n\n");
    let negatives = negative_constraints(failed_draft);
    if negatives.is_empty() {
        text.push_str("The previous draft repeated material from earlier sections.\n\n");
    } else {
        let quoted: Vec<String> = negatives.iter().map(|s| format!("\"{}\"", s)).collect();
        text.push_str(&format!(
            "Do not repeat the following points in any wording: {}\n\n",
            quoted.join("; ")
        ));
    }
    text.push_str(
        "### Fix\n\n\
         - Avoid restating anything already covered\n\
         - Approach the topic from a new angle with fresh examples\n\
         - Do not reuse key phrases from earlier sections\n\
         - When a known concept must be referenced, express it differently\n\n",
    );
}

fn push_relevancy_block(text: &mut String, outline: &str) {
    text.push_str("### Relevancy Problem\n\n");
    text.push_str(&format!(
        "The previous draft drifted away from the outline and did not focus on \"{}\".\n\n",
        outline
    ));
    text.push_str(&format!(
        "### Fix\n\n\
         - Build the passage strictly around \"{}\"\n\
         - Every sentence must relate directly to the topic\n\
         - Do not wander into unrelated subjects\n\n",
        outline
    ));
}

fn push_minor_block(text: &mut String) {
    text.push_str(
        "### Minor Adjustment\n\n\
         - Keep the current topic and quality\n\
         - Add a few new details or angles\n\n",
    );
}

/// Up to [`MAX_NEGATIVE_CONSTRAINTS`] sentences from the failed draft that
/// are long enough to be worth forbidding.
pub fn negative_constraints(draft: &str) -> Vec<String> {
    draft
        .split(['.', '!', '?', '。', '！', '？'])
        .map(str::trim)
        .filter(|s| s.chars().count() > MIN_SENTENCE_CHARS)
        .take(MAX_NEGATIVE_CONSTRAINTS)
        .map(String::from)
        .collect()
}

/// The failed draft truncated to [`EXEMPLAR_MAX_CHARS`] characters, with an
/// ellipsis when anything was cut.
pub fn exemplar(draft: &str) -> String {
    match draft.char_indices().nth(EXEMPLAR_MAX_CHARS) {
        Some((cut, _)) => format!("{}...", &draft[..cut]),
        None => draft.to_string(),
    }
}
