//! Error types for form-publish.
//!
//! Library code returns [`PublishError`]; the binary wraps it with `anyhow` at the
//! CLI boundary.

/// Every way a publishing run can fail.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The configured template id does not resolve in the document store.
    #[error("template not found: {template_id}")]
    TemplateNotFound { template_id: String },

    /// The template has no `{{ANSWERS}}` anchor paragraph.
    #[error("{{{{ANSWERS}}}} placeholder not found in template")]
    AnswersPlaceholderMissing,

    /// The storage backend refused to create the destination folder.
    #[error("create folder failed for {path}: {status} {message}")]
    FolderProvision {
        path: String,
        status: u16,
        message: String,
    },

    /// The storage backend refused the artifact upload.
    #[error("upload failed for {path}: {status} {message}")]
    Upload {
        path: String,
        status: u16,
        message: String,
    },

    /// The replay adapter was pointed at the header row or a row with no data.
    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    /// Document store failure other than a missing template.
    #[error("document store error: {0}")]
    Store(String),

    /// Rendered document could not be converted to an artifact.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// A storage request never produced a status (connection, TLS, body read).
    #[error("storage transport error during {operation}: {message}")]
    Transport { operation: String, message: String },

    /// Configuration is missing or invalid.
    #[error("config error: {0}")]
    Config(String),

    /// The tabular export used for replays could not be read.
    #[error("tabular source error: {0}")]
    Tabular(String),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, PublishError>;

impl PublishError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn io(path: impl Into<std::path::PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short machine-friendly name of the failure kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TemplateNotFound { .. } => "template_not_found",
            Self::AnswersPlaceholderMissing => "answers_placeholder_missing",
            Self::FolderProvision { .. } => "folder_provision",
            Self::Upload { .. } => "upload",
            Self::InvalidSelection(_) => "invalid_selection",
            Self::Store(_) => "store",
            Self::Conversion(_) => "conversion",
            Self::Transport { .. } => "transport",
            Self::Config(_) => "config",
            Self::Tabular(_) => "tabular",
            Self::Io { .. } => "io",
        }
    }
}
