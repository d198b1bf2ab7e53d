//! # contract: interfaces of the collaborators around the publishing pipeline
//!
//! The pipeline itself only formats, renders, names and routes. Storing documents,
//! turning them into fixed-layout bytes and talking to remote storage are done by
//! implementors of the traits below:
//!
//! - [`DocumentStore`]: duplicates templates and hands out editable [`Document`] bodies.
//! - [`FormatConverter`]: turns a [`Document`] into artifact bytes (PDF by default).
//! - [`StorageBackend`]: the remote folder/file API. It reports raw statuses so the
//!   publisher can decide what counts as success (a folder conflict does).
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall`, exported under the default
//!   `test-export-mocks` feature so integration tests can use the mocks too.

use async_trait::async_trait;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::document::Document;

/// Opaque id of a document owned by a [`DocumentStore`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentHandle(pub String);

impl std::fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no template with id {0}")]
    TemplateNotFound(String),
    #[error("no document with handle {0}")]
    DocumentNotFound(DocumentHandle),
    #[error("{0}")]
    Backend(String),
}

/// Error type for converters and storage transports (simple boxed error, like the uploaders).
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// Status and body of a storage call that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendReply {
    pub status: u16,
    pub body: String,
}

impl BackendReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The distinguished "already exists" answer to a folder creation.
    pub fn is_conflict(&self) -> bool {
        self.status == 409
    }
}

/// Stores templates and the working copies rendered from them.
///
/// Each run duplicates the template and edits only its copy, so concurrent runs
/// over one template never see each other's edits.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Copy a template under a new name and return the copy's handle.
    async fn duplicate_template(
        &self,
        template_id: &str,
        copy_name: &str,
    ) -> Result<DocumentHandle, StoreError>;

    /// Current body of a document, detached for editing.
    async fn open_document(&self, handle: &DocumentHandle) -> Result<Document, StoreError>;

    /// Replace the stored body with an edited one.
    async fn save_document(
        &self,
        handle: &DocumentHandle,
        document: Document,
    ) -> Result<(), StoreError>;

    /// Throw a working copy away.
    async fn dispose(&self, handle: &DocumentHandle) -> Result<(), StoreError>;
}

/// Converts a rendered document to a fixed-layout artifact.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait FormatConverter: Send + Sync {
    /// File extension of the produced artifact, without the dot.
    fn extension(&self) -> &'static str;

    /// Must not depend on anything but `document`: same input, same bytes.
    async fn convert(&self, document: &Document) -> Result<Vec<u8>, CollaboratorError>;
}

/// Remote file storage.
///
/// `Err` means the request produced no status at all; refusals come back as a
/// [`BackendReply`] with a non-success status.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Create one folder, without auto-renaming.
    async fn create_folder(&self, path: &str) -> Result<BackendReply, CollaboratorError>;

    /// Add a file at `path`; the backend renames on collision and never overwrites.
    async fn upload(&self, path: &str, content: Vec<u8>) -> Result<BackendReply, CollaboratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_classification() {
        assert!(BackendReply::new(200, "").is_success());
        assert!(!BackendReply::new(409, "").is_success());
        assert!(BackendReply::new(409, "").is_conflict());
        assert!(!BackendReply::new(300, "").is_success());
    }

    #[tokio::test]
    async fn every_collaborator_has_a_mock() {
        let mut converter = MockFormatConverter::new();
        converter.expect_extension().return_const("pdf");
        let mut backend = MockStorageBackend::new();
        backend
            .expect_create_folder()
            .returning(|_| Ok(BackendReply::new(409, "")));
        let store = MockDocumentStore::new();

        assert_eq!(converter.extension(), "pdf");
        assert!(backend.create_folder("/x").await.unwrap().is_conflict());
        let _: &dyn DocumentStore = &store;
    }
}
