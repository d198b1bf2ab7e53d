//! # Artifact publishing
//!
//! Names the artifact, converts the rendered working copy and routes the bytes to
//! `{base_folder}/{submitter}/{file_name}` on the storage backend.
//!
//! - File names are `{DocTitle} - {SanitizedName} - {YYYY-MM-DD_HHMM}.{ext}`, with the
//!   time taken from the submission, so a replay lands on the same name.
//! - [`ArtifactPublisher::ensure_folder`] accepts the backend's conflict answer as
//!   success; calling it twice for one path succeeds both times.
//! - [`ArtifactPublisher::upload`] is a single attempt. The backend renames on
//!   collision, nothing is ever overwritten.

use chrono::NaiveDateTime;
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use crate::contract::{DocumentHandle, DocumentStore, FormatConverter, StorageBackend};
use crate::error::{PublishError, Result};
use crate::text::{format_date_for_filename, sanitize_path_segment};

pub fn artifact_file_name(
    doc_title: &str,
    submitter_name: &str,
    submitted_at: &NaiveDateTime,
    extension: &str,
) -> String {
    format!(
        "{} - {} - {}.{}",
        doc_title,
        sanitize_path_segment(submitter_name),
        format_date_for_filename(submitted_at),
        extension
    )
}

/// Per-submitter folder under the base folder.
pub fn remote_folder(base_folder: &str, submitter_name: &str) -> String {
    format!(
        "{}/{}",
        base_folder.trim_end_matches('/'),
        sanitize_path_segment(submitter_name)
    )
}

pub fn remote_path(folder: &str, file_name: &str) -> String {
    format!("{}/{}", folder.trim_end_matches('/'), file_name)
}

/// Converted bytes and the name they are published under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    /// Hex SHA-256 of the bytes.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        format!("{:x}", hasher.finalize())
    }
}

/// Convert the document behind `handle` without touching the stored copy.
pub async fn convert_to_artifact<S, C>(
    store: &S,
    converter: &C,
    handle: &DocumentHandle,
    file_name: &str,
) -> Result<Artifact>
where
    S: DocumentStore + ?Sized,
    C: FormatConverter + ?Sized,
{
    let document = store.open_document(handle).await.map_err(|e| {
        error!(%handle, error = %e, "Failed to open rendered document for conversion");
        PublishError::Store(e.to_string())
    })?;
    let bytes = converter.convert(&document).await.map_err(|e| {
        error!(%handle, file_name, error = %e, "Conversion failed");
        PublishError::Conversion(e.to_string())
    })?;
    info!(%handle, file_name, size = bytes.len(), "Converted rendered document");
    Ok(Artifact {
        file_name: file_name.to_string(),
        bytes,
    })
}

pub struct ArtifactPublisher<'a, B: StorageBackend + ?Sized> {
    backend: &'a B,
}

impl<'a, B: StorageBackend + ?Sized> ArtifactPublisher<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Create `path` unless it already exists.
    pub async fn ensure_folder(&self, path: &str) -> Result<()> {
        let reply = self.backend.create_folder(path).await.map_err(|e| {
            error!(path, error = %e, "Folder request did not reach the backend");
            PublishError::Transport {
                operation: "create_folder".into(),
                message: e.to_string(),
            }
        })?;

        if reply.is_success() {
            info!(path, status = reply.status, "Created folder");
            Ok(())
        } else if reply.is_conflict() {
            warn!(path, "Folder already exists; continuing");
            Ok(())
        } else {
            error!(path, status = reply.status, body = %reply.body, "Folder creation refused");
            Err(PublishError::FolderProvision {
                path: path.to_string(),
                status: reply.status,
                message: reply.body,
            })
        }
    }

    /// Upload `artifact` into `folder` and return the requested remote path.
    pub async fn upload(&self, folder: &str, artifact: &Artifact) -> Result<String> {
        let path = remote_path(folder, &artifact.file_name);
        let reply = self
            .backend
            .upload(&path, artifact.bytes.clone())
            .await
            .map_err(|e| {
                error!(path = %path, error = %e, "Upload request did not reach the backend");
                PublishError::Transport {
                    operation: "upload".into(),
                    message: e.to_string(),
                }
            })?;

        if !reply.is_success() {
            error!(path = %path, status = reply.status, body = %reply.body, "Upload refused");
            return Err(PublishError::Upload {
                path,
                status: reply.status,
                message: reply.body,
            });
        }
        info!(
            path = %path,
            size = artifact.bytes.len(),
            content_hash = %artifact.content_hash(),
            "Uploaded artifact"
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{BackendReply, MockDocumentStore, MockFormatConverter, MockStorageBackend};
    use crate::document::Document;
    use chrono::NaiveDate;
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn file_name_uses_submission_time_and_sanitized_name() {
        assert_eq!(
            artifact_file_name("Submitted Residency Form", "Jane Doe", &at(2024, 3, 5, 10, 15), "pdf"),
            "Submitted Residency Form - Jane Doe - 2024-03-05_1015.pdf"
        );
        assert_eq!(
            artifact_file_name("Form", "a/b:c", &at(2024, 12, 1, 7, 3), "pdf"),
            "Form - a-b-c - 2024-12-01_0703.pdf"
        );
    }

    #[test]
    fn folders_never_get_an_empty_segment() {
        assert_eq!(remote_folder("/Forms/2024/", ""), "/Forms/2024/Unknown");
        assert_eq!(remote_folder("/Forms", "  /  "), "/Forms/-");
        assert_eq!(remote_path("/Forms/Jane/", "a.pdf"), "/Forms/Jane/a.pdf");
    }

    #[test]
    fn content_hash_is_sha256_hex() {
        let a = Artifact {
            file_name: "x".into(),
            bytes: b"abc".to_vec(),
        };
        assert_eq!(
            a.content_hash(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn ensure_folder_twice_succeeds_both_times() {
        let mut backend = MockStorageBackend::new();
        let mut seq = Sequence::new();
        backend
            .expect_create_folder()
            .with(eq("/Forms/Jane Doe"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(BackendReply::new(200, "{}")));
        backend
            .expect_create_folder()
            .with(eq("/Forms/Jane Doe"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(BackendReply::new(409, "path/conflict/folder/")));

        let publisher = ArtifactPublisher::new(&backend);
        publisher.ensure_folder("/Forms/Jane Doe").await.unwrap();
        publisher.ensure_folder("/Forms/Jane Doe").await.unwrap();
    }

    #[tokio::test]
    async fn ensure_folder_reports_status_and_message() {
        let mut backend = MockStorageBackend::new();
        backend
            .expect_create_folder()
            .returning(|_| Ok(BackendReply::new(401, "invalid_access_token")));

        let err = ArtifactPublisher::new(&backend)
            .ensure_folder("/Forms/Jane")
            .await
            .unwrap_err();
        match err {
            PublishError::FolderProvision {
                path,
                status,
                message,
            } => {
                assert_eq!(path, "/Forms/Jane");
                assert_eq!(status, 401);
                assert_eq!(message, "invalid_access_token");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn ensure_folder_transport_failure() {
        let mut backend = MockStorageBackend::new();
        backend
            .expect_create_folder()
            .returning(|_| Err("connection refused".into()));
        let err = ArtifactPublisher::new(&backend)
            .ensure_folder("/x")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "transport");
    }

    #[tokio::test]
    async fn upload_is_attempted_once_and_fails_on_non_success() {
        let mut backend = MockStorageBackend::new();
        backend
            .expect_upload()
            .with(eq("/Forms/Jane/a.pdf"), eq(b"bytes".to_vec()))
            .times(1)
            .returning(|_, _| Ok(BackendReply::new(507, "insufficient_space")));

        let artifact = Artifact {
            file_name: "a.pdf".into(),
            bytes: b"bytes".to_vec(),
        };
        let err = ArtifactPublisher::new(&backend)
            .upload("/Forms/Jane", &artifact)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Upload { status: 507, .. }));
    }

    #[tokio::test]
    async fn upload_returns_remote_path() {
        let mut backend = MockStorageBackend::new();
        backend
            .expect_upload()
            .returning(|_, _| Ok(BackendReply::new(200, "{}")));
        let artifact = Artifact {
            file_name: "a.pdf".into(),
            bytes: vec![1, 2, 3],
        };
        let path = ArtifactPublisher::new(&backend)
            .upload("/Forms/Jane", &artifact)
            .await
            .unwrap();
        assert_eq!(path, "/Forms/Jane/a.pdf");
    }

    #[tokio::test]
    async fn conversion_reads_but_never_saves() {
        let mut store = MockDocumentStore::new();
        store
            .expect_open_document()
            .times(1)
            .returning(|_| Ok(Document::from_template_text("t", "body")));
        store.expect_save_document().never();
        let mut converter = MockFormatConverter::new();
        converter
            .expect_convert()
            .withf(|doc: &Document| doc.plain_text() == "body")
            .returning(|_| Ok(b"%PDF-1.7".to_vec()));

        let artifact = convert_to_artifact(&store, &converter, &DocumentHandle("h".into()), "a.pdf")
            .await
            .unwrap();
        assert_eq!(artifact.file_name, "a.pdf");
        assert_eq!(artifact.bytes, b"%PDF-1.7");
    }

    #[tokio::test]
    async fn conversion_failure_maps_to_conversion_error() {
        let mut store = MockDocumentStore::new();
        store
            .expect_open_document()
            .returning(|_| Ok(Document::new("t")));
        let mut converter = MockFormatConverter::new();
        converter
            .expect_convert()
            .returning(|_| Err("renderer crashed".into()));

        let err = convert_to_artifact(&store, &converter, &DocumentHandle("h".into()), "a.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Conversion(m) if m.contains("renderer crashed")));
    }
}
