//! Persistence coordinator: commits generated documents to the store.

use crate::error::GenerationError;
use crate::fallback::{ProducedDocument, Strategy};
use crate::generator::SectionResult;
use crate::orchestrator::{section_statuses, AssembledDocument};
use crate::request::GenerationRequest;
use crate::store::{DocumentStore, NewDocument, StoredDocument, StoredSection};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

pub struct PersistenceCoordinator {
    store: Arc<dyn DocumentStore>,
}

impl PersistenceCoordinator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Store a finished document as one atomic record
    pub fn save(
        &self,
        request: &GenerationRequest,
        produced: &ProducedDocument,
    ) -> Result<StoredDocument, GenerationError> {
        let mut metadata = base_metadata(request);
        metadata.insert("strategy".to_string(), produced.strategy.to_string());
        let failed = produced
            .per_section_status
            .iter()
            .filter(|s| !s.succeeded)
            .count();
        metadata.insert("failed_sections".to_string(), failed.to_string());

        let document = NewDocument {
            owner_id: request.user_id.clone(),
            title: request.title.clone(),
            document_type: request.document_type.clone(),
            content: produced.document.content.clone(),
            sections: stored_sections(&produced.document),
            section_status: produced.per_section_status.clone(),
            requirements: request.requirements.clone(),
            metadata,
        };
        let stored = self.store.create(document)?;
        info!(
            id = %stored.id,
            document_type = %stored.document_type,
            strategy = %produced.strategy,
            "Document saved"
        );
        Ok(stored)
    }

    /// Store whatever sections finished before a run was interrupted.
    ///
    /// Returns `None` when nothing usable completed; an empty partial record would only
    /// hide the failure.
    pub fn save_under_interruption(
        &self,
        request: &GenerationRequest,
        completed: &[SectionResult],
        reason: &str,
    ) -> Result<Option<StoredDocument>, GenerationError> {
        let document = AssembledDocument::assemble(completed);
        if document.sections.is_empty() {
            warn!(
                document_type = %request.document_type,
                reason,
                "Interrupted before any section completed; nothing to save"
            );
            return Ok(None);
        }

        let mut metadata = base_metadata(request);
        metadata.insert("strategy".to_string(), Strategy::Structured.to_string());
        metadata.insert("interrupted".to_string(), reason.to_string());

        let new_document = NewDocument {
            owner_id: request.user_id.clone(),
            title: request.title.clone(),
            document_type: request.document_type.clone(),
            content: document.content.clone(),
            sections: stored_sections(&document),
            section_status: section_statuses(completed),
            requirements: request.requirements.clone(),
            metadata,
        };
        let stored = self.store.create_partial(new_document)?;
        info!(
            id = %stored.id,
            sections = stored.sections.len(),
            reason,
            "Partial document saved"
        );
        Ok(Some(stored))
    }
}

fn base_metadata(request: &GenerationRequest) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    if let Some(instructions) = request.instructions() {
        metadata.insert("instructions".to_string(), instructions.to_string());
    }
    metadata
}

fn stored_sections(document: &AssembledDocument) -> Vec<StoredSection> {
    document
        .sections
        .iter()
        .map(|s| StoredSection {
            key: s.key.clone(),
            display_name: s.display_name.clone(),
            order: s.order,
            content: s.content.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::SectionDescriptor;
    use crate::store::{DocumentStatus, SledDocumentStore};

    fn coordinator() -> PersistenceCoordinator {
        PersistenceCoordinator::new(Arc::new(SledDocumentStore::temporary().unwrap()))
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new("Library System", "proposal", "u1").with_instructions("Be brief.")
    }

    #[test]
    fn save_stores_complete_document_with_strategy() {
        let coordinator = coordinator();
        let intro = SectionDescriptor::new("intro", "Intro", 1, true);
        let results = vec![SectionResult::success(&intro, "Intro text.".to_string())];
        let produced = ProducedDocument {
            strategy: Strategy::Structured,
            document: AssembledDocument::assemble(&results),
            per_section_status: section_statuses(&results),
        };

        let stored = coordinator.save(&request(), &produced).unwrap();
        assert_eq!(stored.status, DocumentStatus::Complete);
        assert_eq!(stored.content, "INTRO\n\nIntro text.");
        assert_eq!(stored.metadata["strategy"], "structured");
        assert_eq!(stored.metadata["instructions"], "Be brief.");
        assert_eq!(stored.sections.len(), 1);
    }

    #[test]
    fn interrupted_run_keeps_completed_sections_only() {
        let coordinator = coordinator();
        let intro = SectionDescriptor::new("intro", "Intro", 1, true);
        let scope = SectionDescriptor::new("scope", "Scope", 2, true);
        let completed = vec![
            SectionResult::failure(&scope, &GenerationError::Backend("503".to_string())),
            SectionResult::success(&intro, "Intro text.".to_string()),
        ];

        let stored = coordinator
            .save_under_interruption(&request(), &completed, "consumer disconnected")
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, DocumentStatus::Partial);
        assert_eq!(stored.content, "INTRO\n\nIntro text.");
        assert_eq!(stored.section_status.len(), 2);
        assert_eq!(stored.metadata["interrupted"], "consumer disconnected");
    }

    #[test]
    fn interruption_with_nothing_completed_saves_nothing() {
        let coordinator = coordinator();
        let saved = coordinator
            .save_under_interruption(&request(), &[], "cancelled")
            .unwrap();
        assert!(saved.is_none());
        assert_eq!(coordinator.store().list("u1", 1, 10).unwrap().total, 0);
    }
}
