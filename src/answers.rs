//! Question/answer rows derived from a submission.
//!
//! Both the plain-text block and the structured rows come from [`format_answers`],
//! so exclusion and blank handling cannot drift apart between the two views.

use crate::config::{FormattingPolicy, KeyFields};
use crate::submission::SubmissionRecord;
use crate::text::safe_text;

/// One question and the answer shown for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRow {
    pub label: String,
    pub answer: String,
}

/// Join a field's values: each trimmed, empties dropped, separated by `", "`.
pub fn join_values(values: &[String]) -> String {
    values
        .iter()
        .map(|v| safe_text(Some(v)).trim().to_string())
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Rows in the record's own field order, minus excluded labels and, unless the
/// policy keeps them, minus blank answers.
pub fn format_answers(
    record: &SubmissionRecord,
    policy: &FormattingPolicy,
    key_fields: &KeyFields,
) -> Vec<AnswerRow> {
    let exclude = policy.exclusions(key_fields);

    record
        .iter()
        .filter(|(label, _)| !exclude.contains(*label))
        .filter_map(|(label, values)| {
            let answer = join_values(values);
            if answer.is_empty() && !policy.include_blank {
                return None;
            }
            let answer = if answer.is_empty() {
                policy.blank_text().to_string()
            } else {
                answer
            };
            Some(AnswerRow {
                label: label.to_string(),
                answer,
            })
        })
        .collect()
}

/// `Label: answer` per line.
pub fn answers_as_text(
    record: &SubmissionRecord,
    policy: &FormattingPolicy,
    key_fields: &KeyFields,
) -> String {
    format_answers(record, policy, key_fields)
        .iter()
        .map(|row| format!("{}: {}", row.label, row.answer))
        .collect::<Vec<_>>()
        .join("\n")
}
