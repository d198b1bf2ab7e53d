//! In-memory rich-text document: an ordered list of styled paragraphs.
//!
//! This is the editable body the document store hands out. Link spans use
//! inclusive character offsets into the paragraph text.

use serde::{Deserialize, Serialize};

/// Paragraph style. `Heading(n)` runs 1..=6.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParagraphStyle {
    Title,
    Heading(u8),
    #[default]
    Normal,
}

/// A hyperlink over `start..=end` (character offsets) of a paragraph's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpan {
    pub start: usize,
    pub end: usize,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub text: String,
    pub style: ParagraphStyle,
    /// Left indent in points.
    pub indent_start: f32,
    pub spacing_before: f32,
    pub spacing_after: f32,
    pub links: Vec<LinkSpan>,
}

impl Paragraph {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn styled(text: impl Into<String>, style: ParagraphStyle) -> Self {
        Self {
            text: text.into(),
            style,
            ..Self::default()
        }
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Attach a link over `start..=end`. Out-of-range spans are rejected.
    pub fn set_link(&mut self, start: usize, end: usize, url: impl Into<String>) -> bool {
        if start > end || end >= self.char_len() {
            return false;
        }
        self.links.push(LinkSpan {
            start,
            end,
            url: url.into(),
        });
        true
    }

    /// Link covering the character at `index`, if any.
    pub fn link_at(&self, index: usize) -> Option<&LinkSpan> {
        self.links
            .iter()
            .find(|l| (l.start..=l.end).contains(&index))
    }
}

/// A whole document body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub paragraphs: Vec<Paragraph>,
}

impl Document {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            paragraphs: Vec::new(),
        }
    }

    /// Parse template text: one paragraph per line, `#`..`######` prefixes mark
    /// headings, a single `%` prefix marks the title.
    pub fn from_template_text(title: impl Into<String>, text: &str) -> Self {
        let paragraphs = text
            .lines()
            .map(|line| {
                let hashes = line.chars().take_while(|c| *c == '#').count();
                if (1..=6).contains(&hashes) && line[hashes..].starts_with(' ') {
                    Paragraph::styled(&line[hashes + 1..], ParagraphStyle::Heading(hashes as u8))
                } else if let Some(rest) = line.strip_prefix("% ") {
                    Paragraph::styled(rest, ParagraphStyle::Title)
                } else {
                    Paragraph::new(line)
                }
            })
            .collect();
        Self {
            title: title.into(),
            paragraphs,
        }
    }

    /// Replace every occurrence of `token` in every paragraph. Returns the number of replacements.
    pub fn replace_text(&mut self, token: &str, replacement: &str) -> usize {
        if token.is_empty() {
            return 0;
        }
        let mut count = 0;
        for p in &mut self.paragraphs {
            let hits = p.text.matches(token).count();
            if hits > 0 {
                p.text = p.text.replace(token, replacement);
                count += hits;
            }
        }
        count
    }

    /// Index of the first paragraph containing `token`.
    pub fn find_text(&self, token: &str) -> Option<usize> {
        self.paragraphs.iter().position(|p| p.text.contains(token))
    }

    /// Insert at `index` (clamped to the end) and return the paragraph for styling.
    pub fn insert_paragraph(&mut self, index: usize, paragraph: Paragraph) -> &mut Paragraph {
        let index = index.min(self.paragraphs.len());
        self.paragraphs.insert(index, paragraph);
        &mut self.paragraphs[index]
    }

    /// Full text, one paragraph per line.
    pub fn plain_text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
