//! Submission records and key-field extraction.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::KeyFields;
use crate::text::{parse_submission_timestamp, safe_text};

/// Header names probed, in order, for the submission time.
pub const TIMESTAMP_HEADERS: &[&str] = &["Timestamp", "Submitted at"];

/// One set of form answers: label → raw values, in the form's own question order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionRecord {
    fields: IndexMap<String, FieldValues>,
}

/// Values of one field. Checkbox questions carry several.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawValues", into = "Vec<String>")]
pub struct FieldValues(pub Vec<String>);

/// Accepts either `"answer"` or `["a", "b"]` in submission files.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawValues {
    One(String),
    Many(Vec<String>),
}

impl From<RawValues> for FieldValues {
    fn from(raw: RawValues) -> Self {
        match raw {
            RawValues::One(v) => FieldValues(vec![v]),
            RawValues::Many(vs) => FieldValues(vs),
        }
    }
}

impl From<FieldValues> for Vec<String> {
    fn from(values: FieldValues) -> Self {
        values.0
    }
}

impl SubmissionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field. A repeated label keeps its first position and takes the new values.
    pub fn insert(&mut self, label: impl Into<String>, values: Vec<String>) {
        self.fields.insert(label.into(), FieldValues(values));
    }

    pub fn with(mut self, label: impl Into<String>, values: &[&str]) -> Self {
        self.insert(label, values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn get(&self, label: &str) -> Option<&[String]> {
        self.fields.get(label).map(|v| v.0.as_slice())
    }

    /// First value of a field, if the field exists and has one.
    pub fn first(&self, label: &str) -> Option<&str> {
        self.get(label).and_then(|vs| vs.first()).map(String::as_str)
    }

    /// Fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.0.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, Vec<String>)> for SubmissionRecord {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        let mut record = SubmissionRecord::new();
        for (label, values) in iter {
            record.insert(label, values);
        }
        record
    }
}

/// The scalar values the pipeline pulls out of a record before rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFields {
    pub name: String,
    pub email: String,
    pub lor_contact: String,
    /// Timestamp text as submitted, substituted verbatim into the document.
    pub timestamp_raw: String,
    /// Wall-clock fields used for the artifact file name.
    pub submitted_at: NaiveDateTime,
}

impl ExtractedFields {
    /// Pull key fields out of `record`. `now` stands in for a missing or unreadable timestamp.
    pub fn extract(record: &SubmissionRecord, key_fields: &KeyFields, now: DateTime<Utc>) -> Self {
        let name = safe_text(record.first(&key_fields.name)).trim().to_string();
        let name = if name.is_empty() {
            "Unknown".to_string()
        } else {
            name
        };
        let email = safe_text(record.first(&key_fields.email)).trim().to_string();
        let lor_contact = safe_text(record.first(&key_fields.lor_contact));

        let supplied = TIMESTAMP_HEADERS
            .iter()
            .filter_map(|h| record.first(h))
            .find(|v| !v.is_empty());

        let (timestamp_raw, submitted_at) = match supplied {
            Some(raw) => {
                let parsed = parse_submission_timestamp(raw).unwrap_or_else(|| {
                    warn!(timestamp = raw, "Unreadable submission timestamp, using run time for file name");
                    now.naive_utc()
                });
                (raw.to_string(), parsed)
            }
            None => {
                debug!("No timestamp field in submission, using run time");
                (
                    now.to_rfc3339_opts(SecondsFormat::Millis, true),
                    now.naive_utc(),
                )
            }
        };

        ExtractedFields {
            name,
            email,
            lor_contact,
            timestamp_raw,
            submitted_at,
        }
    }
}
