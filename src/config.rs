use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::{PublishError, Result};

pub const DEFAULT_API_URL: &str = "https://api.dropboxapi.com";
pub const DEFAULT_CONTENT_URL: &str = "https://content.dropboxapi.com";
pub const DEFAULT_BLANK_ANSWER_TEXT: &str = "User did not answer this question.";

/// Everything a publishing run needs, loaded once at start-up and read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    pub template_id: String,
    /// Directory the template store reads `<template_id>.txt` files from.
    pub templates_dir: PathBuf,
    pub doc_title: String,
    pub storage: StorageConfig,
    pub key_fields: KeyFields,
    #[serde(default)]
    pub answers: FormattingPolicy,
    #[serde(default)]
    pub layout: AnswerLayout,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Remote folder that holds one sub-folder per submitter.
    pub base_folder: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_content_url")]
    pub content_url: String,
    /// Bearer token. Injected from the environment, never read from the config file.
    #[serde(skip)]
    pub token: String,
}

// Keep the token out of debug logs.
impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("base_folder", &self.base_folder)
            .field("api_url", &self.api_url)
            .field("content_url", &self.content_url)
            .field("token_set", &!self.token.is_empty())
            .finish()
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_content_url() -> String {
    DEFAULT_CONTENT_URL.to_string()
}

/// Labels of the fields that get special treatment. They must match the form headers exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFields {
    pub name: String,
    pub email: String,
    pub lor_contact: String,
}

impl KeyFields {
    pub fn labels(&self) -> [&str; 3] {
        [&self.name, &self.email, &self.lor_contact]
    }
}

/// Which answers appear in the Q&A section and how blanks are shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattingPolicy {
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default = "default_true")]
    pub include_blank: bool,
    #[serde(default = "default_blank_text")]
    pub blank_text: String,
}

fn default_true() -> bool {
    true
}

fn default_blank_text() -> String {
    DEFAULT_BLANK_ANSWER_TEXT.to_string()
}

impl Default for FormattingPolicy {
    fn default() -> Self {
        Self {
            exclude: vec!["Timestamp".to_string()],
            include_blank: true,
            blank_text: default_blank_text(),
        }
    }
}

impl FormattingPolicy {
    /// Labels left out of the answers section: explicit exclusions plus every key field.
    pub fn exclusions(&self, key_fields: &KeyFields) -> HashSet<String> {
        self.exclude
            .iter()
            .map(String::as_str)
            .chain(key_fields.labels())
            .map(str::to_string)
            .collect()
    }

    pub fn blank_text(&self) -> &str {
        if self.blank_text.is_empty() {
            DEFAULT_BLANK_ANSWER_TEXT
        } else {
            &self.blank_text
        }
    }
}

/// Paragraph styling for inserted question/answer pairs, in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerLayout {
    pub question_heading: u8,
    pub question_spacing_before: f32,
    pub question_spacing_after: f32,
    pub answer_indent: f32,
    pub answer_spacing_after: f32,
}

impl Default for AnswerLayout {
    fn default() -> Self {
        Self {
            question_heading: 3,
            question_spacing_before: 10.0,
            question_spacing_after: 2.0,
            answer_indent: 18.0,
            answer_spacing_after: 10.0,
        }
    }
}

impl PublishConfig {
    /// Fail fast on anything a run would trip over later.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("template_id", self.template_id.as_str()),
            ("doc_title", self.doc_title.as_str()),
            ("storage.base_folder", self.storage.base_folder.as_str()),
            ("storage.token", self.storage.token.as_str()),
            ("key_fields.name", self.key_fields.name.as_str()),
            ("key_fields.email", self.key_fields.email.as_str()),
            ("key_fields.lor_contact", self.key_fields.lor_contact.as_str()),
        ];
        if let Some((key, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(PublishError::config(format!("{key} must not be empty")));
        }

        let distinct: HashSet<&str> = self.key_fields.labels().into_iter().collect();
        if distinct.len() != 3 {
            return Err(PublishError::config(
                "key_fields labels must be distinct",
            ));
        }

        if !(1..=6).contains(&self.layout.question_heading) {
            return Err(PublishError::config(
                "layout.question_heading must be between 1 and 6",
            ));
        }
        Ok(())
    }

    pub fn trace_loaded(&self) {
        info!(
            template_id = %self.template_id,
            base_folder = %self.storage.base_folder,
            excluded = self.answers.exclude.len(),
            include_blank = self.answers.include_blank,
            "Loaded PublishConfig"
        );
        debug!(?self, "PublishConfig loaded (full debug)");
    }
}
