//! Document rendering: template copy → placeholders filled → Q&A blocks inserted.
//!
//! Rendering happens on a working copy owned by the caller. The renderer never
//! disposes of that copy; the pipeline does, on every exit path.

use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, error, info};

use crate::answers::AnswerRow;
use crate::config::AnswerLayout;
use crate::contract::{DocumentHandle, DocumentStore, StoreError};
use crate::document::{Document, LinkSpan, Paragraph, ParagraphStyle};
use crate::error::{PublishError, Result};
use crate::submission::ExtractedFields;
use crate::text::safe_text;

pub const ANSWERS_TOKEN: &str = "{{ANSWERS}}";

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("URL pattern compiles"));

/// Scalar tokens and their replacement text.
pub fn scalar_placeholders(doc_title: &str, fields: &ExtractedFields) -> Vec<(&'static str, String)> {
    vec![
        ("{{DOC_TITLE}}", safe_text(Some(doc_title))),
        ("{{NAME}}", safe_text(Some(&fields.name))),
        ("{{EMAIL}}", safe_text(Some(&fields.email))),
        ("{{TIMESTAMP}}", safe_text(Some(&fields.timestamp_raw))),
        ("{{LOR_CONTACT}}", safe_text(Some(&fields.lor_contact))),
    ]
}

/// Every `http(s)://…` run in `text`, as inclusive character ranges.
pub fn url_spans(text: &str) -> Vec<LinkSpan> {
    URL_PATTERN
        .find_iter(text)
        .map(|m| {
            let start = text[..m.start()].chars().count();
            let len = m.as_str().chars().count();
            LinkSpan {
                start,
                end: start + len - 1,
                url: m.as_str().to_string(),
            }
        })
        .collect()
}

/// Attach a link over each URL in the paragraph. The text is left as is.
pub fn link_urls(paragraph: &mut Paragraph) -> usize {
    let spans = url_spans(&paragraph.text);
    let count = spans.len();
    for span in spans {
        paragraph.set_link(span.start, span.end, span.url);
    }
    count
}

/// Insert a heading + body pair per row right after `anchor`, in row order.
/// Returns the index just past the last inserted paragraph.
pub fn insert_answers(
    doc: &mut Document,
    anchor: usize,
    rows: &[AnswerRow],
    layout: &AnswerLayout,
) -> usize {
    let mut cursor = anchor + 1;
    for row in rows {
        let question = doc.insert_paragraph(
            cursor,
            Paragraph::styled(&row.label, ParagraphStyle::Heading(layout.question_heading)),
        );
        question.spacing_before = layout.question_spacing_before;
        question.spacing_after = layout.question_spacing_after;
        cursor += 1;

        let answer = doc.insert_paragraph(cursor, Paragraph::new(&row.answer));
        answer.indent_start = layout.answer_indent;
        answer.spacing_before = 0.0;
        answer.spacing_after = layout.answer_spacing_after;
        let links = link_urls(answer);
        if links > 0 {
            debug!(label = %row.label, links, "Linked URLs in answer");
        }
        cursor += 1;
    }
    cursor
}

fn store_error(template_id: &str, e: StoreError) -> PublishError {
    match e {
        StoreError::TemplateNotFound(_) => PublishError::TemplateNotFound {
            template_id: template_id.to_string(),
        },
        other => PublishError::Store(other.to_string()),
    }
}

/// Fills working copies of a template through a [`DocumentStore`].
pub struct DocumentRenderer<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    layout: AnswerLayout,
}

impl<'a, S: DocumentStore + ?Sized> DocumentRenderer<'a, S> {
    pub fn new(store: &'a S, layout: AnswerLayout) -> Self {
        Self { store, layout }
    }

    /// Make the working copy. The caller owns the returned handle.
    pub async fn duplicate(&self, template_id: &str, copy_name: &str) -> Result<DocumentHandle> {
        match self.store.duplicate_template(template_id, copy_name).await {
            Ok(handle) => {
                info!(template_id, copy_name, %handle, "Duplicated template");
                Ok(handle)
            }
            Err(e) => {
                error!(template_id, error = %e, "Failed to duplicate template");
                Err(store_error(template_id, e))
            }
        }
    }

    /// Substitute scalar placeholders and insert the answer rows into the copy.
    pub async fn render_into(
        &self,
        handle: &DocumentHandle,
        placeholders: &[(&'static str, String)],
        rows: &[AnswerRow],
    ) -> Result<()> {
        let mut doc = self
            .store
            .open_document(handle)
            .await
            .map_err(|e| PublishError::Store(e.to_string()))?;

        // Locate and clear the anchor before substitution so submitted text can neither
        // pose as it nor be removed with it.
        let Some(anchor) = doc.find_text(ANSWERS_TOKEN) else {
            error!(%handle, "Template has no answers placeholder");
            return Err(PublishError::AnswersPlaceholderMissing);
        };
        let anchor_text = doc.paragraphs[anchor].text.replace(ANSWERS_TOKEN, "");
        doc.paragraphs[anchor].text = anchor_text;

        for (token, value) in placeholders {
            let hits = doc.replace_text(token, value);
            debug!(token, hits, "Replaced placeholder");
        }

        let end = insert_answers(&mut doc, anchor, rows, &self.layout);
        info!(%handle, rows = rows.len(), paragraphs = end - anchor - 1, "Inserted answers");

        self.store
            .save_document(handle, doc)
            .await
            .map_err(|e| PublishError::Store(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::MockDocumentStore;
    use chrono::NaiveDate;

    fn rows() -> Vec<AnswerRow> {
        vec![
            AnswerRow {
                label: "Q1".into(),
                answer: "A1".into(),
            },
            AnswerRow {
                label: "Q2".into(),
                answer: "see https://example.com/x for details".into(),
            },
        ]
    }

    fn fields() -> ExtractedFields {
        ExtractedFields {
            name: "Jane Doe".into(),
            email: "j@x.com".into(),
            lor_contact: "A, a@x.com".into(),
            timestamp_raw: "2024-03-05T10:15:00Z".into(),
            submitted_at: NaiveDate::from_ymd_opt(2024, 3, 5)
                .unwrap()
                .and_hms_opt(10, 15, 0)
                .unwrap(),
        }
    }

    #[test]
    fn url_span_covers_exactly_the_url() {
        let text = "see https://example.com/x for details";
        let spans = url_spans(text);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].start, 4);
        assert_eq!(spans[0].end, 4 + "https://example.com/x".len() - 1);
        let covered: String = text
            .chars()
            .skip(spans[0].start)
            .take(spans[0].end - spans[0].start + 1)
            .collect();
        assert_eq!(covered, "https://example.com/x");
    }

    #[test]
    fn url_spans_handle_none_and_many() {
        assert!(url_spans("no links here, ftp://nope").is_empty());
        let spans = url_spans("http://a.io and https://b.io/path?q=1\nhttps://c.io");
        let urls: Vec<_> = spans.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, ["http://a.io", "https://b.io/path?q=1", "https://c.io"]);
    }

    #[test]
    fn url_spans_count_characters_not_bytes() {
        let spans = url_spans("café → https://x.fr");
        assert_eq!(spans[0].start, 7);
        assert_eq!(spans[0].end, 7 + "https://x.fr".len() - 1);
    }

    #[test]
    fn link_pass_keeps_text() {
        let mut p = Paragraph::new("see https://example.com/x for details");
        assert_eq!(link_urls(&mut p), 1);
        assert_eq!(p.text, "see https://example.com/x for details");
        assert_eq!(p.links[0].url, "https://example.com/x");
    }

    #[test]
    fn answers_are_inserted_in_order_below_anchor() {
        let mut doc = Document::from_template_text("t", "intro\n\nfooter");
        let layout = AnswerLayout::default();
        let end = insert_answers(&mut doc, 1, &rows(), &layout);
        assert_eq!(end, 6);
        let texts: Vec<_> = doc.paragraphs.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(
            texts,
            [
                "intro",
                "",
                "Q1",
                "A1",
                "Q2",
                "see https://example.com/x for details",
                "footer"
            ]
        );
        let q = &doc.paragraphs[2];
        assert_eq!(q.style, ParagraphStyle::Heading(3));
        assert_eq!(q.spacing_before, 10.0);
        assert_eq!(q.spacing_after, 2.0);
        let a = &doc.paragraphs[3];
        assert_eq!(a.style, ParagraphStyle::Normal);
        assert_eq!(a.indent_start, 18.0);
        assert_eq!(a.spacing_after, 10.0);
        assert_eq!(doc.paragraphs[5].links.len(), 1);
    }

    #[tokio::test]
    async fn render_fills_placeholders_and_saves() {
        let mut store = MockDocumentStore::new();
        store.expect_open_document().returning(|_| {
            Ok(Document::from_template_text(
                "t",
                "% {{DOC_TITLE}}\n{{NAME}} <{{EMAIL}}> at {{TIMESTAMP}}\nLOR: {{LOR_CONTACT}}\nAnswers:{{ANSWERS}}\nEnd {{NAME}}",
            ))
        });
        store
            .expect_save_document()
            .withf(|_, doc: &Document| {
                let texts: Vec<_> = doc.paragraphs.iter().map(|p| p.text.as_str()).collect();
                texts
                    == [
                        "Submitted Residency Form",
                        "Jane Doe <j@x.com> at 2024-03-05T10:15:00Z",
                        "LOR: A, a@x.com",
                        "Answers:",
                        "Q1",
                        "A1",
                        "Q2",
                        "see https://example.com/x for details",
                        "End Jane Doe",
                    ]
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let renderer = DocumentRenderer::new(&store, AnswerLayout::default());
        let handle = DocumentHandle("copy-1".into());
        let placeholders = scalar_placeholders("Submitted Residency Form", &fields());
        renderer
            .render_into(&handle, &placeholders, &rows())
            .await
            .expect("render should succeed");
    }

    #[tokio::test]
    async fn missing_anchor_fails_without_saving() {
        let mut store = MockDocumentStore::new();
        store
            .expect_open_document()
            .returning(|_| Ok(Document::from_template_text("t", "{{NAME}} only")));
        store.expect_save_document().never();

        let renderer = DocumentRenderer::new(&store, AnswerLayout::default());
        let err = renderer
            .render_into(&DocumentHandle("c".into()), &[], &rows())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::AnswersPlaceholderMissing));
    }

    #[tokio::test]
    async fn submitted_text_cannot_forge_the_anchor() {
        let mut store = MockDocumentStore::new();
        store
            .expect_open_document()
            .returning(|_| Ok(Document::from_template_text("t", "{{NAME}}\n{{ANSWERS}}")));
        store
            .expect_save_document()
            .withf(|_, doc: &Document| doc.paragraphs[0].text == "{{ANSWERS}}" && doc.paragraphs[2].text == "Q1")
            .returning(|_, _| Ok(()));

        let renderer = DocumentRenderer::new(&store, AnswerLayout::default());
        let placeholders = vec![("{{NAME}}", "{{ANSWERS}}".to_string())];
        renderer
            .render_into(&DocumentHandle("c".into()), &placeholders, &rows())
            .await
            .expect("render should succeed");
    }

    #[tokio::test]
    async fn submitted_token_in_the_anchor_paragraph_is_kept() {
        let mut store = MockDocumentStore::new();
        store
            .expect_open_document()
            .returning(|_| Ok(Document::from_template_text("t", "Name: {{NAME}} {{ANSWERS}}")));
        store
            .expect_save_document()
            .withf(|_, doc: &Document| {
                doc.paragraphs[0].text == "Name: {{ANSWERS}} " && doc.paragraphs[1].text == "Q1"
            })
            .returning(|_, _| Ok(()));

        let renderer = DocumentRenderer::new(&store, AnswerLayout::default());
        let placeholders = vec![("{{NAME}}", "{{ANSWERS}}".to_string())];
        renderer
            .render_into(&DocumentHandle("c".into()), &placeholders, &rows())
            .await
            .expect("render should succeed");
    }

    #[tokio::test]
    async fn unknown_template_maps_to_template_not_found() {
        let mut store = MockDocumentStore::new();
        store
            .expect_duplicate_template()
            .returning(|id, _| Err(StoreError::TemplateNotFound(id.to_string())));

        let renderer = DocumentRenderer::new(&store, AnswerLayout::default());
        let err = renderer.duplicate("missing", "TEMP - x").await.unwrap_err();
        assert!(matches!(err, PublishError::TemplateNotFound { template_id } if template_id == "missing"));
    }
}
