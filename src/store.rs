//! Document store
//!
//! Durable storage for generated documents, scoped by owner. Records are written in a
//! single atomic step so a document is never observable half-written.

pub mod persistence;

pub use persistence::SledDocumentStore;

use crate::error::StorageError;
use crate::orchestrator::SectionStatus;
use crate::request::FormattingRequirements;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether a stored document is the full result of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Complete,
    /// Saved from an interrupted run; holds only the sections finished before it stopped
    Partial,
}

/// One generated section as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSection {
    pub key: String,
    pub display_name: String,
    pub order: u32,
    pub content: String,
}

/// Everything needed to create a record; the store assigns id and timestamps
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub owner_id: String,
    pub title: String,
    pub document_type: String,
    pub content: String,
    pub sections: Vec<StoredSection>,
    pub section_status: Vec<SectionStatus>,
    pub requirements: FormattingRequirements,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub document_type: String,
    pub content: String,
    pub status: DocumentStatus,
    pub sections: Vec<StoredSection>,
    pub section_status: Vec<SectionStatus>,
    pub requirements: FormattingRequirements,
    pub metadata: BTreeMap<String, String>,
    /// Milliseconds since the Unix epoch
    pub created_at: i64,
    pub updated_at: i64,
}

/// Listing entry without the document body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,
    pub title: String,
    pub document_type: String,
    pub status: DocumentStatus,
    pub created_at: i64,
}

impl From<&StoredDocument> for DocumentSummary {
    fn from(doc: &StoredDocument) -> Self {
        Self {
            id: doc.id.clone(),
            title: doc.title.clone(),
            document_type: doc.document_type.clone(),
            status: doc.status,
            created_at: doc.created_at,
        }
    }
}

/// One page of an owner's documents, newest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPage {
    pub documents: Vec<DocumentSummary>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// Document store interface
pub trait DocumentStore: Send + Sync {
    /// Atomically create a complete document
    fn create(&self, document: NewDocument) -> Result<StoredDocument, StorageError>;

    /// Atomically create a partial document from an interrupted run
    fn create_partial(&self, document: NewDocument) -> Result<StoredDocument, StorageError>;

    /// Fetch a document owned by `owner_id`; documents of other owners are not found
    fn get(&self, id: &str, owner_id: &str) -> Result<Option<StoredDocument>, StorageError>;

    /// List an owner's documents, newest first. `page` starts at 1.
    fn list(&self, owner_id: &str, page: usize, limit: usize) -> Result<DocumentPage, StorageError>;

    /// Delete a document owned by `owner_id`; returns false if there was nothing to delete
    fn delete(&self, id: &str, owner_id: &str) -> Result<bool, StorageError>;
}
