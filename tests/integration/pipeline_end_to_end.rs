//! End-to-end generation through the document pipeline.

use crate::integration::test_utils::{
    lenient_settings, pipeline_with, proposal_registry, text, FakeBackend, Reply,
};
use folio::error::GenerationError;
use folio::fallback::{
    FallbackStrategySelector, SinglePromptStrategy, Strategy, StrategyOutcome,
};
use folio::generator::SectionGenerator;
use folio::orchestrator::GenerationOrchestrator;
use folio::plan::{PlanRegistry, SectionDescriptor, SectionPlan};
use folio::prompt::STRUCTURE_MARKER;
use folio::request::GenerationRequest;
use folio::store::{DocumentStatus, DocumentStore};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn request() -> GenerationRequest {
    GenerationRequest::new("Library System", "proposal", "u1")
}

fn selector(backend: Arc<FakeBackend>, registry: PlanRegistry) -> FallbackStrategySelector {
    let settings = lenient_settings();
    let plans = Arc::new(registry);
    let generator = Arc::new(SectionGenerator::new(backend.clone(), &settings));
    let orchestrator = Arc::new(GenerationOrchestrator::new(
        plans.clone(),
        generator,
        settings.max_concurrent_sections,
    ));
    FallbackStrategySelector::new(
        orchestrator,
        SinglePromptStrategy::new(backend, plans, settings.min_content_chars),
    )
}

#[tokio::test]
async fn proposal_assembles_headings_in_order() {
    let backend = FakeBackend::failing()
        .section("Intro", text("Intro text."))
        .section("Methodology", text("Method text."));
    let test = pipeline_with(backend, proposal_registry());

    let report = test.pipeline.produce_document(&request()).await.unwrap();

    assert_eq!(
        report.content(),
        "INTRO\n\nIntro text.\n\nMETHODOLOGY\n\nMethod text."
    );
    assert_eq!(report.strategy, Strategy::Structured);
    assert!(report.per_section_status.iter().all(|s| s.succeeded));

    let stored = test.store.get(&report.document.id, "u1").unwrap().unwrap();
    assert_eq!(stored.status, DocumentStatus::Complete);
    assert_eq!(stored.content, report.content());
    assert_eq!(stored.sections.len(), 2);
}

#[tokio::test]
async fn methodology_sees_intro_in_context() {
    let backend = FakeBackend::failing()
        .section("Intro", text("Intro text."))
        .section("Methodology", text("Method text."));
    let test = pipeline_with(backend, proposal_registry());

    test.pipeline.produce_document(&request()).await.unwrap();

    assert_eq!(
        test.backend
            .calls_matching("INTRO:\nIntro text."),
        1,
        "only the dependent section receives the intro as context"
    );
}

#[tokio::test]
async fn one_failed_dependent_section_still_completes() {
    let mut registry = proposal_registry();
    registry.insert(
        SectionPlan::new(
            "proposal",
            vec![
                SectionDescriptor::new("intro", "Intro", 1, true),
                SectionDescriptor::new("methodology", "Methodology", 2, false),
                SectionDescriptor::new("results", "Results", 3, false),
            ],
            None,
        )
        .unwrap(),
    );
    let backend = FakeBackend::failing()
        .section("Intro", text("Intro text."))
        .section("Methodology", Reply::Fail("503".to_string()))
        .section("Results", text("Result text."));
    let test = pipeline_with(backend, registry);

    let report = test.pipeline.produce_document(&request()).await.unwrap();

    assert_eq!(report.strategy, Strategy::Structured);
    assert_eq!(
        report.content(),
        "INTRO\n\nIntro text.\n\nRESULTS\n\nResult text."
    );
    let failed: Vec<&str> = report
        .per_section_status
        .iter()
        .filter(|s| !s.succeeded)
        .map(|s| s.key.as_str())
        .collect();
    assert_eq!(failed, vec!["methodology"]);
    assert_eq!(test.backend.calls_matching(STRUCTURE_MARKER), 0);
}

#[tokio::test]
async fn all_sections_failing_tries_single_prompt_once() {
    let backend = Arc::new(FakeBackend::failing());
    let selector = selector(backend.clone(), proposal_registry());

    match selector.select(&request()).await {
        StrategyOutcome::Unavailable { structured, .. } => {
            assert!(matches!(
                structured,
                GenerationError::NoContentGenerated { failed: 2 }
            ));
        }
        other => panic!("expected unavailable, got {:?}", other),
    }
    assert_eq!(backend.calls_matching(STRUCTURE_MARKER), 1);
}

#[tokio::test]
async fn single_prompt_rescues_failed_structured_run() {
    let backend = FakeBackend::failing().rule(
        STRUCTURE_MARKER,
        text("## Intro\n\nA **whole** document in one go."),
    );
    let test = pipeline_with(backend, proposal_registry());

    let report = test.pipeline.produce_document(&request()).await.unwrap();

    assert_eq!(report.strategy, Strategy::SinglePrompt);
    assert_eq!(report.content(), "Intro\n\nA whole document in one go.");
    assert!(report.per_section_status.is_empty());
    let stored = test.store.get(&report.document.id, "u1").unwrap().unwrap();
    assert_eq!(stored.metadata["strategy"], "single_prompt");
}

#[tokio::test]
async fn unknown_document_type_skips_fallback() {
    let test = pipeline_with(FakeBackend::failing(), proposal_registry());
    let request = GenerationRequest::new("Library System", "thesis", "u1");

    let err = test.pipeline.produce_document(&request).await.unwrap_err();

    assert!(matches!(err, GenerationError::UnknownDocumentType(t) if t == "thesis"));
    assert_eq!(test.backend.calls_matching(STRUCTURE_MARKER), 0);
}

fn wide_registry() -> PlanRegistry {
    let mut registry = PlanRegistry::empty();
    registry.insert(
        SectionPlan::new(
            "proposal",
            vec![
                SectionDescriptor::new("a", "Alpha", 1, true),
                SectionDescriptor::new("b", "Beta", 2, false),
                SectionDescriptor::new("c", "Gamma", 3, true),
                SectionDescriptor::new("d", "Delta", 4, true),
                SectionDescriptor::new("e", "Epsilon", 5, false),
                SectionDescriptor::new("f", "Zeta", 6, true),
            ],
            None,
        )
        .unwrap(),
    );
    registry
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn assembly_order_ignores_completion_order(delays in prop::collection::vec(0u64..200, 4)) {
        let independent = ["Alpha", "Gamma", "Delta", "Zeta"];
        let mut backend = FakeBackend::failing()
            .section("Beta", text("Beta text."))
            .section("Epsilon", text("Epsilon text."));
        for (name, delay) in independent.iter().zip(&delays) {
            backend = backend.section(
                name,
                Reply::Delayed(Duration::from_millis(*delay), format!("{} text.", name)),
            );
        }
        let selector = selector(Arc::new(backend), wide_registry());

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        let produced = runtime.block_on(selector.produce(&request())).unwrap();

        let keys: Vec<&str> = produced
            .document
            .sections
            .iter()
            .map(|s| s.key.as_str())
            .collect();
        prop_assert_eq!(keys, vec!["a", "b", "c", "d", "e", "f"]);
        prop_assert!(produced
            .document
            .content
            .starts_with("ALPHA\n\nAlpha text.\n\nBETA\n\nBeta text.\n\nGAMMA"));
    }
}
