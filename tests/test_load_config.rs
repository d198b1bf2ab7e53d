use chrono::{Datelike, Utc};
use serial_test::serial;
use std::env;
use std::fs::write;
use tempfile::NamedTempFile;

const CONFIG_YAML: &str = r#"
template_id: residency
templates_dir: ./templates
doc_title: Submitted Residency Form
storage:
  base_folder: "/Residency/{year}"
key_fields:
  name: Name
  email: Email
  lor_contact: LOR Contact
answers:
  exclude: [Timestamp, Consent]
  include_blank: false
layout:
  answer_indent: 24
"#;

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

/// A static config plus the token from the environment produces a validated PublishConfig.
#[test]
#[serial]
fn test_load_config_success_injects_token_and_year() {
    let file = config_file(CONFIG_YAML);
    env::set_var("DROPBOX_TOKEN", "top-secret-test-token");

    let config = form_publish::load_config::load_config(file.path()).expect("Config should load");

    assert_eq!(config.template_id, "residency");
    assert_eq!(config.storage.token, "top-secret-test-token");
    assert_eq!(
        config.storage.base_folder,
        format!("/Residency/{}", Utc::now().year())
    );
    assert_eq!(config.storage.api_url, form_publish::config::DEFAULT_API_URL);
    assert_eq!(config.key_fields.lor_contact, "LOR Contact");
    assert!(!config.answers.include_blank);
    assert_eq!(config.answers.exclude, ["Timestamp", "Consent"]);
    assert_eq!(
        config.answers.blank_text(),
        form_publish::config::DEFAULT_BLANK_ANSWER_TEXT
    );
    assert_eq!(config.layout.answer_indent, 24.0);
    assert_eq!(config.layout.question_spacing_before, 10.0);
    assert_eq!(
        config.templates_dir,
        file.path().parent().unwrap().join("./templates")
    );
}

/// A missing token makes the loader fail and name the variable.
#[test]
#[serial]
fn test_load_config_errors_on_missing_token() {
    let file = config_file(CONFIG_YAML);
    env::remove_var("DROPBOX_TOKEN");

    let err = form_publish::load_config::load_config(file.path()).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("DROPBOX_TOKEN"), "Must error for missing env var, got: {msg}");
}

#[test]
#[serial]
fn test_load_config_errors_for_invalid_file() {
    let file = config_file("template_id: [unterminated");
    env::set_var("DROPBOX_TOKEN", "tok");

    let err = form_publish::load_config::load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config YAML"));
}

#[test]
#[serial]
fn test_load_config_rejects_duplicate_key_labels() {
    let yaml = CONFIG_YAML.replace("email: Email", "email: Name");
    let file = config_file(&yaml);
    env::set_var("DROPBOX_TOKEN", "tok");

    let err = form_publish::load_config::load_config(file.path()).unwrap_err();
    let chain = format!("{err:#}");
    assert!(chain.contains("distinct"), "unexpected error: {chain}");
}

#[test]
#[serial]
fn test_load_config_errors_for_missing_file() {
    env::set_var("DROPBOX_TOKEN", "tok");
    let err = form_publish::load_config::load_config("/definitely/not/here.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}
