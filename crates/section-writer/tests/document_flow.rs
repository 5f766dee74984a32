//! Document-level scenarios against a mocked generation capability and the
//! in-process verifier.

use async_trait::async_trait;
use gating::{HistoryStore, InMemoryHistoryStore, JsonlHistoryStore};
use mockall::mock;
use section_writer::{
    CollaboratorError, DocumentCoordinator, DocumentRequest, DraftGenerator, GenerationRequest,
    GenerationResponse, LocalVerifier, LoopParams, RunTelemetry, SectionLoop, SectionOutcome,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

mock! {
    pub Generator {}

    #[async_trait]
    impl DraftGenerator for Generator {
        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<GenerationResponse, CollaboratorError>;
    }
}

const BASICS: &str = "Photosynthesis basics: green leaves capture sunlight and convert carbon \
                      dioxide into sugar.";
const STORAGE: &str = "Glucose storage happens in starch granules inside roots and seeds.";

fn plan() -> DocumentRequest {
    DocumentRequest {
        title: "Plants".into(),
        outlines: vec![
            "Photosynthesis basics".into(),
            "Chlorophyll pigments".into(),
            "Glucose storage".into(),
        ],
        system_preamble: Some("Write for high-school students.".into()),
    }
}

fn coordinator(generator: MockGenerator) -> DocumentCoordinator {
    DocumentCoordinator::new(SectionLoop::new(
        Arc::new(generator),
        Arc::new(LocalVerifier::default()),
    ))
}

/// Answers by section position; section 2 is refused by the capability.
fn scripted_generator() -> MockGenerator {
    let mut generator = MockGenerator::new();
    generator.expect_generate().times(3).returning(|request| {
        if request.instructions.contains("section 1/3") {
            Ok(GenerationResponse::ok(BASICS))
        } else if request.instructions.contains("section 2/3") {
            Ok(GenerationResponse::failed("model overloaded"))
        } else {
            Ok(GenerationResponse::ok(STORAGE))
        }
    });
    generator
}

#[tokio::test]
async fn failed_section_does_not_stop_the_document() {
    let report = coordinator(scripted_generator())
        .run_document(&plan(), &LoopParams::default())
        .await;

    assert_eq!(report.success_count, 2);
    assert_eq!(report.exhausted_count, 0);
    assert_eq!(report.failed_sections.len(), 1);
    assert_eq!(report.failed_sections[0].index, 2);
    assert!(report.failed_sections[0].error.contains("model overloaded"));

    let indices: Vec<usize> = report.sections.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![1, 3]);
    assert_eq!(report.total_iterations, 3);
    assert_eq!(
        report.history.entries(),
        &[BASICS.to_string(), STORAGE.to_string()]
    );

    let md = report.render_markdown();
    assert!(md.starts_with("# Plants\n\n## Photosynthesis basics"));
    assert!(!md.contains("Chlorophyll pigments"));

    let telemetry = RunTelemetry::from_report(&report, None);
    assert_eq!(telemetry.sections[1].outcome, SectionOutcome::Aborted);
}

#[tokio::test]
async fn always_off_topic_drafts_exhaust_as_soft_success() {
    let mut generator = MockGenerator::new();
    generator
        .expect_generate()
        .times(2)
        .returning(|_| Ok(GenerationResponse::ok("Plants make food.")));

    let request = DocumentRequest {
        title: "Photosynthesis".into(),
        outlines: vec!["Explain photosynthesis".into()],
        system_preamble: None,
    };
    let params = LoopParams::default().with_max_attempts(2);
    let report = coordinator(generator).run_document(&request, &params).await;

    assert_eq!(report.success_count, 1);
    assert_eq!(report.exhausted_count, 1);
    let section = &report.sections[0];
    assert!(section.exhausted);
    assert!(section.warning.is_some());
    assert_eq!(section.iterations, 2);
    assert!(!section.issues.is_empty());
    assert_eq!(report.history.len(), 1);
}

#[tokio::test]
async fn loop_never_exceeds_max_attempts() {
    for max_attempts in [1u32, 2, 4] {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut generator = MockGenerator::new();
        generator.expect_generate().returning(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok(GenerationResponse::ok(format!("Unrelated draft number {n} about trains.")))
        });

        let request = DocumentRequest {
            title: "T".into(),
            outlines: vec!["Explain photosynthesis".into()],
            system_preamble: None,
        };
        let params = LoopParams::default().with_max_attempts(max_attempts);
        let report = coordinator(generator).run_document(&request, &params).await;

        assert_eq!(calls.load(Ordering::SeqCst), max_attempts as usize);
        assert_eq!(report.total_iterations, max_attempts);
    }
}

#[tokio::test]
async fn store_is_seeded_and_appended_once_per_section() {
    let mut store = InMemoryHistoryStore::new();
    store
        .append("doc-1", "An earlier unrelated chapter about trains.", serde_json::json!({}))
        .unwrap();

    let report = coordinator(scripted_generator())
        .run_document_with_store("doc-1", &plan(), &LoopParams::default(), &mut store)
        .await
        .unwrap();

    assert_eq!(report.history.len(), 3);
    let stored = store.entries("doc-1").unwrap();
    assert_eq!(stored.len(), 3);
    assert_eq!(stored[1].content, BASICS);
    assert_eq!(stored[1].metadata["section_index"], 1);
    assert_eq!(stored[2].metadata["section_index"], 3);
    assert_eq!(stored[2].metadata["exhausted"], false);
}

#[tokio::test]
async fn jsonl_store_persists_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.jsonl");

    let mut generator = MockGenerator::new();
    generator
        .expect_generate()
        .times(1)
        .returning(|_| Ok(GenerationResponse::ok(BASICS)));
    let request = DocumentRequest {
        title: "Plants".into(),
        outlines: vec!["Photosynthesis basics".into()],
        system_preamble: None,
    };

    let mut store = JsonlHistoryStore::new(&path);
    let report = coordinator(generator)
        .run_document_with_store("doc-2", &request, &LoopParams::default(), &mut store)
        .await
        .unwrap();
    assert_eq!(report.success_count, 1);

    let reopened = JsonlHistoryStore::new(&path);
    assert_eq!(reopened.read_all("doc-2").unwrap(), vec![BASICS.to_string()]);
    assert_eq!(reopened.statistics("doc-2").unwrap().sections, vec![1]);
}
