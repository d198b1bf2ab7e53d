//! Template store backed by a directory of plain-text templates.
//!
//! A template `residency` lives in `<dir>/residency.txt`; see
//! [`Document::from_template_text`] for the line format. Working copies are held
//! in memory until disposed.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::contract::{DocumentHandle, DocumentStore, StoreError};
use crate::document::Document;

pub const TEMPLATE_EXTENSION: &str = "txt";

struct WorkingCopy {
    name: String,
    document: Document,
}

pub struct TemplateDirStore {
    dir: PathBuf,
    copies: Mutex<HashMap<DocumentHandle, WorkingCopy>>,
}

impl TemplateDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            copies: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn template_path(&self, template_id: &str) -> Option<PathBuf> {
        let plain = !template_id.is_empty()
            && !template_id.contains(['/', '\\'])
            && template_id != "."
            && template_id != "..";
        plain.then(|| self.dir.join(format!("{template_id}.{TEMPLATE_EXTENSION}")))
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<DocumentHandle, WorkingCopy>>, StoreError> {
        self.copies
            .lock()
            .map_err(|_| StoreError::Backend("working copy table poisoned".into()))
    }

    /// Number of working copies not yet disposed.
    pub fn live_copies(&self) -> usize {
        self.copies.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Names of the working copies not yet disposed.
    pub fn live_copy_names(&self) -> Vec<String> {
        self.copies
            .lock()
            .map(|c| c.values().map(|w| w.name.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for TemplateDirStore {
    async fn duplicate_template(
        &self,
        template_id: &str,
        copy_name: &str,
    ) -> Result<DocumentHandle, StoreError> {
        let Some(path) = self.template_path(template_id) else {
            warn!(template_id, "Rejected template id that is not a plain name");
            return Err(StoreError::TemplateNotFound(template_id.to_string()));
        };
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::TemplateNotFound(template_id.to_string()));
            }
            Err(e) => {
                return Err(StoreError::Backend(format!(
                    "failed to read template {}: {e}",
                    path.display()
                )));
            }
        };

        let handle = DocumentHandle(Uuid::new_v4().to_string());
        let document = Document::from_template_text(copy_name, &text);
        debug!(
            template = %path.display(),
            paragraphs = document.paragraphs.len(),
            "Loaded template"
        );
        self.lock()?.insert(
            handle.clone(),
            WorkingCopy {
                name: copy_name.to_string(),
                document,
            },
        );
        info!(template_id, copy_name, %handle, "Created working copy");
        Ok(handle)
    }

    async fn open_document(&self, handle: &DocumentHandle) -> Result<Document, StoreError> {
        self.lock()?
            .get(handle)
            .map(|w| w.document.clone())
            .ok_or_else(|| StoreError::DocumentNotFound(handle.clone()))
    }

    async fn save_document(
        &self,
        handle: &DocumentHandle,
        document: Document,
    ) -> Result<(), StoreError> {
        match self.lock()?.get_mut(handle) {
            Some(copy) => {
                copy.document = document;
                Ok(())
            }
            None => Err(StoreError::DocumentNotFound(handle.clone())),
        }
    }

    async fn dispose(&self, handle: &DocumentHandle) -> Result<(), StoreError> {
        match self.lock()?.remove(handle) {
            Some(copy) => {
                info!(%handle, name = %copy.name, "Disposed working copy");
                Ok(())
            }
            None => Err(StoreError::DocumentNotFound(handle.clone())),
        }
    }
}
