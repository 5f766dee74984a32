//! Instruction sets and the base constraints every one of them carries.

use serde::{Deserialize, Serialize};

/// Most recent history entries embedded as background context.
pub const CONTEXT_TOP_K: usize = 3;
/// Outline terms listed in the entity-coverage constraint.
pub const MAX_ENTITY_TERMS: usize = 5;

/// Issue-specific block appended to a refined instruction set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectiveBlock {
    /// Negative constraints + diversification guidance
    Redundancy,
    /// Outline restated as the required focus
    Relevancy,
    /// Neither gate failed; small nudge only
    MinorAdjustment,
}

impl std::fmt::Display for CorrectiveBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Redundancy => write!(f, "redundancy"),
            Self::Relevancy => write!(f, "relevancy"),
            Self::MinorAdjustment => write!(f, "minor_adjustment"),
        }
    }
}

/// The three constraints re-derived from the outline on every composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseConstraints {
    /// Salient outline terms must all appear
    pub entity_coverage: String,
    /// Follow the outline's own logic
    pub structural_fidelity: String,
    /// Ground everything in the outline and context
    pub grounding: String,
}

impl BaseConstraints {
    pub fn derive(outline: &str) -> Self {
        let terms = key_terms(outline);
        let entity_coverage = if terms.is_empty() {
            "Stay strictly on the outline topic.".to_string()
        } else {
            format!(
                "You must include all of the following terms to keep the content factually \
                 relevant: {}",
                terms.join(", ")
            )
        };

        Self {
            entity_coverage,
            structural_fidelity: format!(
                "Follow the logical structure of the outline \"{}\" and do not drift from it.",
                outline.trim()
            ),
            grounding: "Base the content only on the outline and the background provided. If \
                        information is missing, stay objective; never invent facts."
                .to_string(),
        }
    }

    /// The constraints as a numbered list.
    pub fn render(&self) -> String {
        format!(
            "1. {}\n2. {}\n3. {}\n",
            self.entity_coverage, self.structural_fidelity, self.grounding
        )
    }
}

/// Outline words longer than three characters, punctuation stripped,
/// first occurrence order, at most [`MAX_ENTITY_TERMS`].
pub fn key_terms(outline: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in outline.split_whitespace() {
        let word =
            word.trim_matches(|c: char| c.is_ascii_punctuation() || "，。；：！？".contains(c));
        if word.chars().count() > 3 && !terms.iter().any(|t| t == word) {
            terms.push(word.to_string());
        }
        if terms.len() == MAX_ENTITY_TERMS {
            break;
        }
    }
    terms
}

/// Position-biased background: the most recent `top_k` accepted sections.
pub fn context_excerpt(history: &[String], top_k: usize) -> String {
    if history.is_empty() {
        return "No previous content.".to_string();
    }
    let start = history.len().saturating_sub(top_k);
    history[start..].join("\n\n")
}

/// Full text handed to the generation capability.
///
/// Regenerated, never patched, at every refinement step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionSet {
    text: String,
    iteration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preamble: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    blocks: Vec<CorrectiveBlock>,
}

impl InstructionSet {
    pub(crate) fn from_parts(
        text: String,
        iteration: u32,
        preamble: Option<String>,
        blocks: Vec<CorrectiveBlock>,
    ) -> Self {
        Self {
            text,
            iteration,
            preamble,
            blocks,
        }
    }

    /// Instructions for the first attempt: base constraints only.
    pub fn initial(
        outline: &str,
        preamble: Option<&str>,
        section_number: usize,
        total_sections: usize,
    ) -> Self {
        let preamble = preamble
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from);
        let constraints = BaseConstraints::derive(outline);

        let mut text = String::new();
        text.push_str("## Task\n\n");
        text.push_str(&format!(
            "Write section {}/{} of the document.\n\n",
            section_number, total_sections
        ));
        text.push_str("## Section Topic\n\n");
        text.push_str(outline.trim());
        text.push_str("\n\n");

        if let Some(p) = &preamble {
            text.push_str("## System Guidance\n\n");
            text.push_str(p);
            text.push_str("\n\n");
        }

        text.push_str("## Base Constraints\n\n");
        text.push_str(&constraints.render());
        text.push('\n');

        text.push_str("## Output\n\n");
        text.push_str(&format!(
            "Write one coherent passage about \"{}\". Keep it clear and precise, of moderate \
             length (200-500 words), and do not repeat earlier sections.\n",
            outline.trim()
        ));

        Self::from_parts(text, 0, preamble, Vec::new())
    }

    /// Wrap caller-supplied instruction text verbatim.
    pub fn raw(text: impl Into<String>) -> Self {
        Self::from_parts(text.into(), 0, None, Vec::new())
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// 0 for initial instructions, n for the n-th refinement.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// System-level guidance carried across refinements.
    pub fn preamble(&self) -> Option<&str> {
        self.preamble.as_deref()
    }

    pub fn blocks(&self) -> &[CorrectiveBlock] {
        &self.blocks
    }

    pub fn has_block(&self, block: CorrectiveBlock) -> bool {
        self.blocks.contains(&block)
    }
}

impl std::fmt::Display for InstructionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_terms_strip_punctuation_and_cap() {
        let terms = key_terms(
            "Discuss the impact of AI on modern healthcare, medical diagnosis, and drug discovery.",
        );
        assert_eq!(
            terms,
            vec!["Discuss", "impact", "modern", "healthcare", "medical"]
        );
    }

    #[test]
    fn test_entity_constraint_falls_back_without_terms() {
        let c = BaseConstraints::derive("AI in war");
        assert_eq!(c.entity_coverage, "Stay strictly on the outline topic.");
    }

    #[test]
    fn test_context_excerpt_prefers_recent_entries() {
        let history: Vec<String> = (1..=5).map(|i| format!("section {i}")).collect();
        let ctx = context_excerpt(&history, CONTEXT_TOP_K);
        assert!(!ctx.contains("section 2"));
        assert!(ctx.contains("section 3"));
        assert!(ctx.ends_with("section 5"));
        assert_eq!(context_excerpt(&[], 3), "No previous content.");
    }

    #[test]
    fn test_initial_has_base_constraints_and_no_blocks() {
        let set = InstructionSet::initial("Explain photosynthesis", Some("Formal tone."), 2, 4);
        let constraints = BaseConstraints::derive("Explain photosynthesis");
        assert!(set.as_str().contains("section 2/4"));
        assert!(set.as_str().contains(&constraints.entity_coverage));
        assert!(set.as_str().contains(&constraints.structural_fidelity));
        assert!(set.as_str().contains(&constraints.grounding));
        assert!(set.as_str().contains("Formal tone."));
        assert!(set.blocks().is_empty());
        assert_eq!(set.iteration(), 0);
        assert_eq!(set.preamble(), Some("Formal tone."));
    }

    #[test]
    fn test_blank_preamble_is_dropped() {
        let set = InstructionSet::initial("Explain photosynthesis", Some("   "), 1, 1);
        assert!(set.preamble().is_none());
        assert!(!set.as_str().contains("System Guidance"));
    }
}
