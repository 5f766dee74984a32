//! Outline planning: turns a topic brief into a [`DocumentRequest`].
//!
//! The generation capability is asked for a JSON document structure
//! (`title`, `sections[].subsections[]`). Every subsection becomes one
//! outline for the Document Coordinator, in reading order; the brief itself
//! is carried as the system preamble so every section sees it.

use crate::document::DocumentRequest;
use crate::generator::{CollaboratorError, DraftGenerator, GenerationRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_MAX_SECTIONS: usize = 5;
pub const DEFAULT_MAX_SUBSECTIONS: usize = 4;
pub const OUTLINE_MAX_OUTPUT_TOKENS: u32 = 4000;

const SERVICE: &str = "outliner";

#[derive(Debug, Error)]
pub enum OutlineError {
    /// The generation capability reported `success = false`.
    #[error("Outline generation failed: {0}")]
    Generation(String),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("Outline generation timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("Generated structure has no subsections")]
    Empty,
}

/// What the user wants written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineRequest {
    pub background: String,
    pub requirements: String,
    pub max_sections: usize,
    pub max_subsections: usize,
}

impl OutlineRequest {
    pub fn new(background: impl Into<String>, requirements: impl Into<String>) -> Self {
        Self {
            background: background.into(),
            requirements: requirements.into(),
            max_sections: DEFAULT_MAX_SECTIONS,
            max_subsections: DEFAULT_MAX_SUBSECTIONS,
        }
    }

    pub fn with_limits(mut self, max_sections: usize, max_subsections: usize) -> Self {
        self.max_sections = max_sections.max(1);
        self.max_subsections = max_subsections.max(1);
        self
    }

    /// Prompt asking for the JSON structure.
    pub fn prompt(&self) -> String {
        format!(
            "You are a document structure designer. Plan a document from the brief below.\n\n\
             ## Background\n{background}\n\n\
             ## Requirements\n{requirements}\n\n\
             ## Task\n\
             1. Give the document a clear title.\n\
             2. Split it into about {sections} sections.\n\
             3. Give each section about {subsections} subsections.\n\
             4. Give each subsection a title and a one or two sentence description of what it must cover.\n\n\
             ## Output\n\
             Reply with JSON only, no commentary:\n\
             {{\"title\": \"...\", \"sections\": [{{\"id\": \"section_1\", \"title\": \"...\", \
             \"subsections\": [{{\"id\": \"subsection_1_1\", \"title\": \"...\", \"description\": \"...\"}}]}}]}}\n",
            background = self.background.trim(),
            requirements = self.requirements.trim(),
            sections = self.max_sections,
            subsections = self.max_subsections,
        )
    }

    fn preamble(&self) -> Option<String> {
        let mut parts = Vec::new();
        if !self.background.trim().is_empty() {
            parts.push(format!("Background: {}", self.background.trim()));
        }
        if !self.requirements.trim().is_empty() {
            parts.push(format!("Requirements: {}", self.requirements.trim()));
        }
        (!parts.is_empty()).then(|| parts.join("\n"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subsection {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureSection {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub subsections: Vec<Subsection>,
}

/// Structure returned by the generation capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStructure {
    pub title: String,
    #[serde(default)]
    pub sections: Vec<StructureSection>,
}

impl DocumentStructure {
    /// One outline per subsection, in reading order.
    pub fn outlines(&self) -> Vec<String> {
        self.sections
            .iter()
            .flat_map(|section| {
                section.subsections.iter().map(move |sub| {
                    let mut outline = format!("{}: {}", section.title.trim(), sub.title.trim());
                    if !sub.description.trim().is_empty() {
                        outline.push_str(" - ");
                        outline.push_str(sub.description.trim());
                    }
                    outline
                })
            })
            .collect()
    }

    pub fn into_request(self, brief: &OutlineRequest) -> Result<DocumentRequest, OutlineError> {
        let outlines = self.outlines();
        if outlines.is_empty() {
            return Err(OutlineError::Empty);
        }
        Ok(DocumentRequest {
            title: self.title,
            outlines,
            system_preamble: brief.preamble(),
        })
    }
}

/// Pull the JSON object out of a reply that may be fenced or wrapped in prose.
fn extract_json_block(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let json_start = start + 7;
        if let Some(end) = text[json_start..].find("```") {
            return Some(text[json_start..json_start + end].trim());
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

pub fn parse_structure(text: &str) -> Result<DocumentStructure, CollaboratorError> {
    let json = extract_json_block(text).ok_or_else(|| CollaboratorError::Malformed {
        service: SERVICE,
        message: "no JSON object in outline reply".into(),
    })?;
    serde_json::from_str(json).map_err(|e| CollaboratorError::Malformed {
        service: SERVICE,
        message: format!("unreadable document structure: {e}"),
    })
}

/// Plans documents through a [`DraftGenerator`].
#[derive(Clone)]
pub struct Outliner {
    generator: Arc<dyn DraftGenerator>,
    call_timeout: Duration,
}

impl Outliner {
    pub fn new(generator: Arc<dyn DraftGenerator>, call_timeout: Duration) -> Self {
        Self {
            generator,
            call_timeout,
        }
    }

    pub async fn structure(
        &self,
        brief: &OutlineRequest,
    ) -> Result<DocumentStructure, OutlineError> {
        let request = GenerationRequest {
            instructions: brief.prompt(),
            max_output_tokens: OUTLINE_MAX_OUTPUT_TOKENS,
        };
        let response = tokio::time::timeout(self.call_timeout, self.generator.generate(request))
            .await
            .map_err(|_| OutlineError::Timeout(self.call_timeout))??;
        if !response.success {
            return Err(OutlineError::Generation(
                response
                    .error
                    .unwrap_or_else(|| "generation capability reported failure".into()),
            ));
        }

        let structure = parse_structure(&response.text)?;
        info!(
            title = %structure.title,
            sections = structure.sections.len(),
            "Document structure planned"
        );
        Ok(structure)
    }

    /// Plan a document ready for the coordinator.
    pub async fn plan(&self, brief: &OutlineRequest) -> Result<DocumentRequest, OutlineError> {
        self.structure(brief).await?.into_request(brief)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::GenerationResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const STRUCTURE: &str = r#"{
        "title": "Plants",
        "sections": [
            {"id": "section_1", "title": "Energy", "subsections": [
                {"id": "subsection_1_1", "title": "Photosynthesis", "description": "How leaves make sugar."},
                {"id": "subsection_1_2", "title": "Respiration", "description": ""}
            ]},
            {"id": "section_2", "title": "Storage", "subsections": [
                {"id": "subsection_2_1", "title": "Starch"}
            ]}
        ]
    }"#;

    struct Canned {
        reply: GenerationResponse,
        prompts: Mutex<Vec<GenerationRequest>>,
    }

    #[async_trait]
    impl DraftGenerator for Canned {
        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<GenerationResponse, CollaboratorError> {
            self.prompts.lock().unwrap().push(request);
            Ok(self.reply.clone())
        }
    }

    fn canned_outliner(reply: GenerationResponse) -> (Outliner, Arc<Canned>) {
        let canned = Arc::new(Canned {
            reply,
            prompts: Mutex::new(Vec::new()),
        });
        (Outliner::new(canned.clone(), Duration::from_secs(5)), canned)
    }

    #[test]
    fn test_outlines_follow_reading_order() {
        let structure = parse_structure(STRUCTURE).unwrap();
        assert_eq!(
            structure.outlines(),
            vec![
                "Energy: Photosynthesis - How leaves make sugar.",
                "Energy: Respiration",
                "Storage: Starch",
            ]
        );
    }

    #[test]
    fn test_fenced_and_wrapped_replies_parse() {
        let fenced = format!("```json\n{STRUCTURE}\n```");
        assert_eq!(parse_structure(&fenced).unwrap().title, "Plants");
        let wrapped = format!("Here is the plan:\n{STRUCTURE}\nGood luck.");
        assert_eq!(parse_structure(&wrapped).unwrap().sections.len(), 2);
    }

    #[test]
    fn test_unparsable_reply_is_malformed() {
        assert!(matches!(
            parse_structure("I cannot help with that."),
            Err(CollaboratorError::Malformed { .. })
        ));
        assert!(matches!(
            parse_structure("{\"sections\": []}"),
            Err(CollaboratorError::Malformed { .. })
        ));
    }

    #[test]
    fn test_prompt_carries_brief_and_limits() {
        let brief = OutlineRequest::new("Biology class", "Cover plant energy").with_limits(3, 0);
        let prompt = brief.prompt();
        assert!(prompt.contains("Biology class"));
        assert!(prompt.contains("Cover plant energy"));
        assert!(prompt.contains("about 3 sections"));
        assert!(prompt.contains("about 1 subsections"));
    }

    #[tokio::test]
    async fn test_plan_builds_document_request() {
        let (outliner, canned) = canned_outliner(GenerationResponse::ok(STRUCTURE));
        let brief = OutlineRequest::new("Biology class", "Cover plant energy");
        let request = outliner.plan(&brief).await.unwrap();

        assert_eq!(request.title, "Plants");
        assert_eq!(request.outlines.len(), 3);
        assert_eq!(
            request.system_preamble.as_deref(),
            Some("Background: Biology class\nRequirements: Cover plant energy")
        );
        let prompts = canned.prompts.lock().unwrap();
        assert_eq!(prompts[0].max_output_tokens, OUTLINE_MAX_OUTPUT_TOKENS);
    }

    #[test]
    fn test_planned_request_saves_as_plan_file() {
        let brief = OutlineRequest::new("Biology class", "");
        let request = parse_structure(STRUCTURE)
            .unwrap()
            .into_request(&brief)
            .unwrap();
        let saved = toml::to_string(&request).unwrap();
        assert_eq!(DocumentRequest::from_toml_str(&saved).unwrap(), request);
        assert_eq!(request.system_preamble.as_deref(), Some("Background: Biology class"));
    }

    #[tokio::test]
    async fn test_structure_without_subsections_is_empty() {
        let (outliner, _) =
            canned_outliner(GenerationResponse::ok(r#"{"title": "Bare", "sections": []}"#));
        let err = outliner
            .plan(&OutlineRequest::new("", "anything"))
            .await
            .unwrap_err();
        assert!(matches!(err, OutlineError::Empty));
    }

    #[tokio::test]
    async fn test_capability_failure_and_garbage() {
        let (outliner, _) = canned_outliner(GenerationResponse::failed("quota exceeded"));
        let err = outliner
            .plan(&OutlineRequest::new("b", "r"))
            .await
            .unwrap_err();
        assert!(matches!(err, OutlineError::Generation(ref m) if m == "quota exceeded"));

        let (outliner, _) = canned_outliner(GenerationResponse::ok("not json at all"));
        let err = outliner
            .plan(&OutlineRequest::new("b", "r"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OutlineError::Collaborator(CollaboratorError::Malformed { .. })
        ));
    }
}
