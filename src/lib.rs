//! Turns form submissions into rendered documents and files them in remote storage,
//! one folder per submitter.
//!
//! A run duplicates a template, fills its placeholders, inserts one question/answer
//! block per answered field, converts the result to PDF and uploads it. See
//! [`pipeline::Pipeline`] for the entry point and [`contract`] for the collaborator
//! traits.

pub mod answers;
pub mod cli;
pub mod config;
pub mod contract;
pub mod document;
pub mod dropbox;
pub mod error;
pub mod load_config;
pub mod pdf;
pub mod pipeline;
pub mod publish;
pub mod render;
pub mod replay;
pub mod store;
pub mod submission;
pub mod text;

pub use error::{PublishError, Result};
pub use pipeline::{Pipeline, PipelineStage, PublishReport};
pub use submission::SubmissionRecord;
