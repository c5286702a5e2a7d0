//! Event stream properties of `produce_document_stream`.

use crate::integration::test_utils::{pipeline_with, proposal_registry, text, FakeBackend, Reply};
use folio::fallback::Strategy;
use folio::orchestrator::StreamEvent;
use folio::pipeline::StreamOutcome;
use folio::request::GenerationRequest;
use folio::store::DocumentStore;
use std::collections::HashMap;

fn request() -> GenerationRequest {
    GenerationRequest::new("Library System", "proposal", "u1")
}

fn streaming_backend() -> FakeBackend {
    FakeBackend::failing()
        .section("Intro", text("Intro text."))
        .section(
            "Methodology",
            Reply::Fragments(vec![
                "## Approach\n".to_string(),
                "We **interview** lib".to_string(),
                "rarians.\n\n\n".to_string(),
                "Then we `build`.".to_string(),
            ]),
        )
}

#[tokio::test]
async fn fragments_concatenate_to_section_content() {
    let test = pipeline_with(streaming_backend(), proposal_registry());

    let (events, outcome) = test.pipeline.produce_document_stream(request()).finish().await;

    let mut streamed: HashMap<String, String> = HashMap::new();
    let mut completed: HashMap<String, String> = HashMap::new();
    for event in &events {
        match event {
            StreamEvent::Fragment { section, fragment, .. } => {
                streamed.entry(section.clone()).or_default().push_str(fragment);
            }
            StreamEvent::SectionCompleted { section, content, .. } => {
                completed.insert(section.clone(), content.clone());
            }
            _ => {}
        }
    }

    assert_eq!(
        completed["methodology"],
        "Approach\nWe interview librarians.\n\nThen we build."
    );
    assert_eq!(streamed["methodology"], completed["methodology"]);
    assert!(!streamed.contains_key("intro"), "independent sections arrive whole");
    assert!(matches!(
        outcome,
        StreamOutcome::Completed {
            strategy: Strategy::Structured,
            ..
        }
    ));
}

#[tokio::test]
async fn progress_is_monotonic_and_reaches_100_last() {
    let test = pipeline_with(streaming_backend(), proposal_registry());

    let (events, _) = test.pipeline.produce_document_stream(request()).finish().await;

    let progress: Vec<u8> = events.iter().filter_map(StreamEvent::progress).collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{:?}", progress);
    let (last, rest) = progress.split_last().unwrap();
    assert_eq!(*last, 100);
    assert!(rest.iter().all(|p| *p < 100));
    assert!(events.last().unwrap().is_terminal());
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
}

#[tokio::test]
async fn completed_event_matches_stored_document() {
    let test = pipeline_with(streaming_backend(), proposal_registry());

    let (events, outcome) = test.pipeline.produce_document_stream(request()).finish().await;

    let StreamOutcome::Completed { document_id, .. } = outcome else {
        panic!("expected completion, got {:?}", outcome);
    };
    let Some(StreamEvent::Completed {
        content,
        document_id: event_id,
        per_section_status,
        ..
    }) = events.last()
    else {
        panic!("last event should be Completed");
    };
    assert_eq!(event_id.as_deref(), Some(document_id.as_str()));
    assert_eq!(per_section_status.len(), 2);
    let stored = test.store.get(&document_id, "u1").unwrap().unwrap();
    assert_eq!(&stored.content, content);
    assert!(content.starts_with("INTRO\n\nIntro text.\n\nMETHODOLOGY\n\nApproach"));
}

#[tokio::test]
async fn failed_section_is_reported_and_skipped() {
    let backend = FakeBackend::failing().section("Intro", text("Intro text."));
    let test = pipeline_with(backend, proposal_registry());

    let (events, outcome) = test.pipeline.produce_document_stream(request()).finish().await;

    assert!(events.iter().any(|e| matches!(
        e,
        StreamEvent::SectionFailed { section, .. } if section == "methodology"
    )));
    match events.last() {
        Some(StreamEvent::Completed { content, .. }) => {
            assert_eq!(content, "INTRO\n\nIntro text.");
        }
        other => panic!("expected Completed, got {:?}", other),
    }
    assert!(matches!(outcome, StreamOutcome::Completed { .. }));
}

#[tokio::test]
async fn total_failure_ends_with_failed_event() {
    let test = pipeline_with(FakeBackend::failing(), proposal_registry());

    let (events, outcome) = test.pipeline.produce_document_stream(request()).finish().await;

    assert!(matches!(events.last(), Some(StreamEvent::Failed { .. })));
    let StreamOutcome::Failed { error } = outcome else {
        panic!("expected failure");
    };
    assert!(error.contains("Generation unavailable"), "{}", error);
    assert_eq!(test.store.list("u1", 1, 10).unwrap().total, 0);
}
