//! # Publishing pipeline
//!
//! One run takes one [`SubmissionRecord`] through
//! `Received → FieldsExtracted → Rendered → Converted → FolderEnsured → Uploaded → Cleaned`.
//! Any failing step ends the run in `Failed` with the step's error.
//!
//! The working copy made from the template is disposed on every path once it exists,
//! including failed renders, conversions and uploads. A failed dispose is logged and
//! never replaces the error that ended the run.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, error, info, warn};

use crate::answers::format_answers;
use crate::config::PublishConfig;
use crate::contract::{DocumentHandle, DocumentStore, FormatConverter, StorageBackend};
use crate::error::Result;
use crate::publish::{artifact_file_name, convert_to_artifact, remote_folder, ArtifactPublisher};
use crate::render::{scalar_placeholders, DocumentRenderer};
use crate::submission::{ExtractedFields, SubmissionRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    FieldsExtracted,
    Rendered,
    Converted,
    FolderEnsured,
    Uploaded,
    Cleaned,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::FieldsExtracted => "fields_extracted",
            Self::Rendered => "rendered",
            Self::Converted => "converted",
            Self::FolderEnsured => "folder_ensured",
            Self::Uploaded => "uploaded",
            Self::Cleaned => "cleaned",
            Self::Failed => "failed",
        }
    }
}

/// What a successful run published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub file_name: String,
    pub remote_path: String,
    pub bytes: usize,
    pub content_hash: String,
    /// Stages passed, in order. Ends in `Uploaded` when the copy could not be disposed.
    pub stages: Vec<PipelineStage>,
}

struct StageLog {
    stages: Vec<PipelineStage>,
}

impl StageLog {
    fn new() -> Self {
        info!(stage = PipelineStage::Received.as_str(), "[PIPELINE] Received submission");
        Self {
            stages: vec![PipelineStage::Received],
        }
    }

    fn advance(&mut self, stage: PipelineStage) {
        debug!(stage = stage.as_str(), "[PIPELINE] Stage reached");
        self.stages.push(stage);
    }

    fn current(&self) -> PipelineStage {
        self.stages
            .last()
            .copied()
            .unwrap_or(PipelineStage::Received)
    }
}

/// Ties the renderer, converter and publisher together for one configuration.
pub struct Pipeline<'a> {
    config: &'a PublishConfig,
    store: &'a dyn DocumentStore,
    converter: &'a dyn FormatConverter,
    backend: &'a dyn StorageBackend,
}

impl<'a> Pipeline<'a> {
    /// Validates `config` up front so a bad configuration never reaches a collaborator.
    pub fn new(
        config: &'a PublishConfig,
        store: &'a dyn DocumentStore,
        converter: &'a dyn FormatConverter,
        backend: &'a dyn StorageBackend,
    ) -> Result<Self> {
        config.validate().map_err(|e| {
            error!(error = %e, "[PIPELINE] Refusing invalid configuration");
            e
        })?;
        Ok(Self {
            config,
            store,
            converter,
            backend,
        })
    }

    pub async fn run(&self, record: &SubmissionRecord) -> Result<PublishReport> {
        self.run_at(record, Utc::now()).await
    }

    /// Run with an explicit "now", used for the working copy name and a missing timestamp.
    pub async fn run_at(
        &self,
        record: &SubmissionRecord,
        now: DateTime<Utc>,
    ) -> Result<PublishReport> {
        let mut log = StageLog::new();

        let fields = ExtractedFields::extract(record, &self.config.key_fields, now);
        log.advance(PipelineStage::FieldsExtracted);
        info!(
            name = %fields.name,
            timestamp = %fields.timestamp_raw,
            fields = record.len(),
            "[PIPELINE] Extracted key fields"
        );

        let renderer = DocumentRenderer::new(self.store, self.config.layout);
        let copy_name = format!(
            "TEMP - {} - {}",
            fields.name,
            now.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
        let handle = match renderer.duplicate(&self.config.template_id, &copy_name).await {
            Ok(handle) => handle,
            Err(e) => {
                error!(
                    failed_after = log.current().as_str(),
                    kind = e.kind(),
                    error = %e,
                    "[PIPELINE][ERROR] Run failed before a working copy existed"
                );
                log.advance(PipelineStage::Failed);
                return Err(e);
            }
        };

        let outcome = self
            .publish_copy(&renderer, &handle, record, &fields, &mut log)
            .await;
        let disposed = self.dispose(&handle).await;

        match outcome {
            Ok(mut report) => {
                if disposed {
                    log.advance(PipelineStage::Cleaned);
                }
                report.stages = log.stages;
                info!(
                    file_name = %report.file_name,
                    remote_path = %report.remote_path,
                    bytes = report.bytes,
                    "[PIPELINE] Run complete"
                );
                Ok(report)
            }
            Err(e) => {
                error!(
                    failed_after = log.current().as_str(),
                    kind = e.kind(),
                    error = %e,
                    disposed,
                    "[PIPELINE][ERROR] Run failed"
                );
                log.advance(PipelineStage::Failed);
                Err(e)
            }
        }
    }

    async fn publish_copy(
        &self,
        renderer: &DocumentRenderer<'_, dyn DocumentStore + 'a>,
        handle: &DocumentHandle,
        record: &SubmissionRecord,
        fields: &ExtractedFields,
        log: &mut StageLog,
    ) -> Result<PublishReport> {
        let placeholders = scalar_placeholders(&self.config.doc_title, fields);
        let rows = format_answers(record, &self.config.answers, &self.config.key_fields);
        renderer.render_into(handle, &placeholders, &rows).await?;
        log.advance(PipelineStage::Rendered);

        let file_name = artifact_file_name(
            &self.config.doc_title,
            &fields.name,
            &fields.submitted_at,
            self.converter.extension(),
        );
        let artifact = convert_to_artifact(self.store, self.converter, handle, &file_name).await?;
        log.advance(PipelineStage::Converted);

        let publisher = ArtifactPublisher::new(self.backend);
        let folder = remote_folder(&self.config.storage.base_folder, &fields.name);
        publisher.ensure_folder(&folder).await?;
        log.advance(PipelineStage::FolderEnsured);

        let remote_path = publisher.upload(&folder, &artifact).await?;
        log.advance(PipelineStage::Uploaded);

        Ok(PublishReport {
            content_hash: artifact.content_hash(),
            bytes: artifact.bytes.len(),
            file_name,
            remote_path,
            stages: Vec::new(),
        })
    }

    async fn dispose(&self, handle: &DocumentHandle) -> bool {
        match self.store.dispose(handle).await {
            Ok(()) => {
                debug!(%handle, "[PIPELINE] Disposed working copy");
                true
            }
            Err(e) => {
                warn!(%handle, error = %e, "[PIPELINE] Could not dispose working copy");
                false
            }
        }
    }
}
