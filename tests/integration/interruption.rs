//! Partial persistence when a streaming consumer goes away mid-run.

use crate::integration::test_utils::{pipeline_with, proposal_registry, text, FakeBackend, Reply};
use folio::orchestrator::StreamEvent;
use folio::pipeline::StreamOutcome;
use folio::request::GenerationRequest;
use folio::store::{DocumentStatus, DocumentStore};
use futures::StreamExt;

fn request() -> GenerationRequest {
    GenerationRequest::new("Library System", "proposal", "u1").with_instructions("Keep it short.")
}

#[tokio::test]
async fn cancelled_stream_saves_completed_sections_as_partial() {
    let backend = FakeBackend::failing()
        .section("Intro", text("Intro text."))
        .section("Methodology", Reply::Hang);
    let test = pipeline_with(backend, proposal_registry());

    let mut stream = test.pipeline.produce_document_stream(request());
    loop {
        match stream.next().await {
            Some(StreamEvent::SectionCompleted { section, .. }) if section == "intro" => break,
            Some(_) => continue,
            None => panic!("stream ended before intro completed"),
        }
    }

    let StreamOutcome::Interrupted {
        partial_id: Some(id),
    } = stream.cancel().await
    else {
        panic!("expected an interrupted run with a partial record");
    };

    let stored = test.store.get(&id, "u1").unwrap().unwrap();
    assert_eq!(stored.status, DocumentStatus::Partial);
    assert_eq!(stored.content, "INTRO\n\nIntro text.");
    assert_eq!(stored.sections.len(), 1);
    assert_eq!(stored.metadata["instructions"], "Keep it short.");
    assert!(stored.metadata.contains_key("interrupted"));

    let page = test.store.list("u1", 1, 10).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.documents[0].status, DocumentStatus::Partial);
}

#[tokio::test]
async fn cancel_before_any_section_saves_nothing() {
    let backend = FakeBackend::new(Reply::Hang);
    let test = pipeline_with(backend, proposal_registry());

    let stream = test.pipeline.produce_document_stream(request());
    tokio::task::yield_now().await;

    let outcome = stream.cancel().await;

    assert_eq!(outcome, StreamOutcome::Interrupted { partial_id: None });
    assert_eq!(test.store.list("u1", 1, 10).unwrap().total, 0);
}

#[tokio::test]
async fn partial_documents_are_scoped_to_their_owner() {
    let backend = FakeBackend::failing()
        .section("Intro", text("Intro text."))
        .section("Methodology", Reply::Hang);
    let test = pipeline_with(backend, proposal_registry());

    let mut stream = test.pipeline.produce_document_stream(request());
    while let Some(event) = stream.next().await {
        if matches!(event, StreamEvent::SectionCompleted { .. }) {
            break;
        }
    }
    let StreamOutcome::Interrupted {
        partial_id: Some(id),
    } = stream.cancel().await
    else {
        panic!("expected partial record");
    };

    assert!(test.store.get(&id, "u2").unwrap().is_none());
    assert!(!test.store.delete(&id, "u2").unwrap());
    assert!(test.store.delete(&id, "u1").unwrap());
    assert!(test.store.get(&id, "u1").unwrap().is_none());
}
