//! Sled-backed document store

use crate::error::StorageError;
use crate::store::{
    DocumentPage, DocumentStatus, DocumentStore, DocumentSummary, NewDocument, StoredDocument,
};
use std::path::Path;
use tracing::debug;

const DOC_PREFIX: &[u8] = b"doc:";
const OWNER_PREFIX: &[u8] = b"owner:";

fn doc_key(id: &str) -> Vec<u8> {
    [DOC_PREFIX, id.as_bytes()].concat()
}

/// Prefix of every index key for `owner_id`; the NUL keeps "u1" from matching "u10"
fn owner_prefix(owner_id: &str) -> Vec<u8> {
    [OWNER_PREFIX, owner_id.as_bytes(), b"\0"].concat()
}

/// Index key sorting an owner's documents by creation time, then id
fn owner_key(owner_id: &str, created_at: i64, id: &str) -> Vec<u8> {
    let mut key = owner_prefix(owner_id);
    key.extend_from_slice(&(created_at.max(0) as u64).to_be_bytes());
    key.extend_from_slice(id.as_bytes());
    key
}

/// Sled-based implementation of DocumentStore
pub struct SledDocumentStore {
    db: sled::Db,
}

impl SledDocumentStore {
    /// Open (or create) a store at the given directory
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to open sled database: {}", e),
            ))
        })?;
        Ok(Self { db })
    }

    /// Temporary in-memory store, removed on drop
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    fn insert(&self, document: NewDocument, status: DocumentStatus) -> Result<StoredDocument, StorageError> {
        let id = format!("{:016x}", self.db.generate_id()?);
        let now = chrono::Utc::now().timestamp_millis();
        let record = StoredDocument {
            id,
            owner_id: document.owner_id,
            title: document.title,
            document_type: document.document_type,
            content: document.content,
            status,
            sections: document.sections,
            section_status: document.section_status,
            requirements: document.requirements,
            metadata: document.metadata,
            created_at: now,
            updated_at: now,
        };

        let value = bincode::serialize(&record)?;
        let mut batch = sled::Batch::default();
        batch.insert(doc_key(&record.id), value);
        batch.insert(
            owner_key(&record.owner_id, record.created_at, &record.id),
            record.id.as_bytes(),
        );
        self.db.apply_batch(batch)?;
        self.db.flush()?;

        debug!(id = %record.id, owner = %record.owner_id, status = ?status, "Document stored");
        Ok(record)
    }

    fn load(&self, id: &str) -> Result<Option<StoredDocument>, StorageError> {
        match self.db.get(doc_key(id))? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }
}

impl DocumentStore for SledDocumentStore {
    fn create(&self, document: NewDocument) -> Result<StoredDocument, StorageError> {
        self.insert(document, DocumentStatus::Complete)
    }

    fn create_partial(&self, document: NewDocument) -> Result<StoredDocument, StorageError> {
        self.insert(document, DocumentStatus::Partial)
    }

    fn get(&self, id: &str, owner_id: &str) -> Result<Option<StoredDocument>, StorageError> {
        Ok(self.load(id)?.filter(|doc| doc.owner_id == owner_id))
    }

    fn list(&self, owner_id: &str, page: usize, limit: usize) -> Result<DocumentPage, StorageError> {
        let page = page.max(1);
        let limit = limit.max(1);

        let mut ids = Vec::new();
        for item in self.db.scan_prefix(owner_prefix(owner_id)).rev() {
            let (_, value) = item?;
            ids.push(String::from_utf8_lossy(&value).into_owned());
        }

        let total = ids.len();
        let mut documents = Vec::new();
        let offset = (page - 1).saturating_mul(limit);
        for id in ids.iter().skip(offset).take(limit) {
            match self.load(id)? {
                Some(doc) => documents.push(DocumentSummary::from(&doc)),
                None => return Err(StorageError::NotFound(id.clone())),
            }
        }

        Ok(DocumentPage {
            documents,
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit),
        })
    }

    fn delete(&self, id: &str, owner_id: &str) -> Result<bool, StorageError> {
        let Some(doc) = self.get(id, owner_id)? else {
            return Ok(false);
        };
        let mut batch = sled::Batch::default();
        batch.remove(doc_key(&doc.id));
        batch.remove(owner_key(&doc.owner_id, doc.created_at, &doc.id));
        self.db.apply_batch(batch)?;
        self.db.flush()?;
        debug!(id, owner = owner_id, "Document deleted");
        Ok(true)
    }
}
