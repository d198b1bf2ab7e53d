//! PDF conversion of rendered documents (printpdf, built-in Helvetica faces).
//!
//! Conversion runs in two steps: [`layout`] places every wrapped line on a page,
//! then the placed lines and links are emitted as printpdf operations. Layout is a
//! pure function of the document, and the trailer `/ID` is derived from the file
//! content, so the same document always converts to the same bytes.

use async_trait::async_trait;
use printpdf::{
    Actions, BorderArray, BuiltinFont, LinkAnnotation, Mm, Op, PdfDocument, PdfPage,
    PdfSaveOptions, Point, Pt, Rect, TextItem,
};
use sha2::{Digest, Sha256};
use std::ops::Range;
use tracing::{debug, info, warn};

use crate::contract::{CollaboratorError, FormatConverter};
use crate::document::{Document, Paragraph, ParagraphStyle};

const MM_TO_PT: f32 = 72.0 / 25.4;

/// Page geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSetup {
    pub width_mm: f32,
    pub height_mm: f32,
    pub margin_pt: f32,
}

impl Default for PageSetup {
    /// A4 with 2cm margins.
    fn default() -> Self {
        Self {
            width_mm: 210.0,
            height_mm: 297.0,
            margin_pt: 56.7,
        }
    }
}

impl PageSetup {
    fn width_pt(&self) -> f32 {
        self.width_mm * MM_TO_PT
    }

    fn height_pt(&self) -> f32 {
        self.height_mm * MM_TO_PT
    }
}

/// One line of text at a fixed position (baseline, in points from the bottom-left).
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub bold: bool,
    pub text: String,
}

/// Clickable area over part of a placed line (bottom-left corner, in points).
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLink {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaidOutPage {
    pub lines: Vec<PlacedLine>,
    pub links: Vec<PlacedLink>,
}

fn font_for(style: ParagraphStyle) -> (f32, bool) {
    match style {
        ParagraphStyle::Title => (20.0, true),
        ParagraphStyle::Heading(1) => (18.0, true),
        ParagraphStyle::Heading(2) => (15.0, true),
        ParagraphStyle::Heading(3) => (13.0, true),
        ParagraphStyle::Heading(_) => (11.5, true),
        ParagraphStyle::Normal => (11.0, false),
    }
}

/// Rough Helvetica advance: half an em per character, a little more for bold.
fn advance(size: f32, bold: bool) -> f32 {
    size * if bold { 0.55 } else { 0.5 }
}

fn chars_per_line(width_pt: f32, size: f32, bold: bool) -> usize {
    ((width_pt / advance(size, bold)).floor() as usize).max(1)
}

/// Greedy word wrap on character counts; words longer than a line are split.
///
/// Each line is returned as the character range it covers in `text`, so spacing
/// inside a line is kept as written.
pub fn wrap(text: &str, max_chars: usize) -> Vec<Range<usize>> {
    let chars: Vec<char> = text.chars().collect();
    let mut lines = Vec::new();
    let mut line_start = 0;
    for raw_line in chars.split(|c| *c == '\n') {
        let line_end = line_start + raw_line.len();
        let mut current: Option<Range<usize>> = None;
        let mut i = line_start;
        while i < line_end {
            if chars[i].is_whitespace() {
                i += 1;
                continue;
            }
            let mut word_start = i;
            while i < line_end && !chars[i].is_whitespace() {
                i += 1;
            }
            while i - word_start > max_chars {
                if let Some(line) = current.take() {
                    lines.push(line);
                }
                lines.push(word_start..word_start + max_chars);
                word_start += max_chars;
            }
            current = match current {
                Some(line) if i - line.start <= max_chars => Some(line.start..i),
                Some(line) => {
                    lines.push(line);
                    Some(word_start..i)
                }
                None => Some(word_start..i),
            };
        }
        lines.push(current.unwrap_or(line_end..line_end));
        line_start = line_end + 1;
    }
    lines
}

/// Place every paragraph of `document` on pages.
pub fn layout(document: &Document, setup: &PageSetup) -> Vec<LaidOutPage> {
    let top = setup.height_pt() - setup.margin_pt;
    let bottom = setup.margin_pt;
    let mut pages = vec![LaidOutPage::default()];
    let mut y = top;

    for paragraph in &document.paragraphs {
        let Paragraph {
            text,
            style,
            indent_start,
            spacing_before,
            spacing_after,
            links,
        } = paragraph;
        let (size, bold) = font_for(*style);
        let line_height = size * 1.25;
        let x = setup.margin_pt + indent_start;
        let width = (setup.width_pt() - setup.margin_pt - x).max(size);

        // Spacing never carries over to the top of a fresh page.
        if y < top {
            y -= spacing_before;
        }
        let chars: Vec<char> = text.chars().collect();
        let step = advance(size, bold);
        for range in wrap(text, chars_per_line(width, size, bold)) {
            if y - line_height < bottom {
                pages.push(LaidOutPage::default());
                y = top;
            }
            y -= line_height;
            if range.is_empty() {
                continue;
            }
            let Some(page) = pages.last_mut() else {
                continue;
            };
            for link in links {
                let from = link.start.max(range.start);
                let to = (link.end + 1).min(range.end);
                if from >= to {
                    continue;
                }
                page.links.push(PlacedLink {
                    x: x + (from - range.start) as f32 * step,
                    y: y - size * 0.25,
                    width: (to - from) as f32 * step,
                    height: size * 1.1,
                    url: link.url.clone(),
                });
            }
            page.lines.push(PlacedLine {
                x,
                y,
                size,
                bold,
                text: chars[range].iter().collect(),
            });
        }
        y -= spacing_after;
    }
    pages
}

fn page_ops(page: &LaidOutPage) -> Vec<Op> {
    let mut ops = Vec::with_capacity(page.lines.len() * 5);
    for line in &page.lines {
        let font = if line.bold {
            BuiltinFont::HelveticaBold
        } else {
            BuiltinFont::Helvetica
        };
        ops.push(Op::StartTextSection);
        ops.push(Op::SetTextCursor {
            pos: Point {
                x: Pt(line.x),
                y: Pt(line.y),
            },
        });
        ops.push(Op::SetFontSizeBuiltinFont {
            size: Pt(line.size),
            font,
        });
        ops.push(Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(line.text.clone())],
            font,
        });
        ops.push(Op::EndTextSection);
    }
    for link in &page.links {
        ops.push(Op::LinkAnnotation {
            link: LinkAnnotation::new(
                Rect {
                    x: Pt(link.x),
                    y: Pt(link.y),
                    width: Pt(link.width),
                    height: Pt(link.height),
                },
                Actions::Uri(link.url.clone()),
                Some(BorderArray::Solid([0.0, 0.0, 0.0])),
                None,
                None,
            ),
        });
    }
    ops
}

/// Content spans of the strings in the last `/ID [..]` array of `bytes`.
fn trailer_id_spans(bytes: &[u8]) -> Vec<Range<usize>> {
    let skip_ws = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        i
    };
    let Some(array_start) = bytes
        .windows(3)
        .enumerate()
        .rev()
        .filter(|(_, w)| *w == b"/ID")
        .map(|(at, _)| skip_ws(at + 3))
        .find(|&i| bytes.get(i) == Some(&b'['))
    else {
        return Vec::new();
    };

    let mut spans = Vec::new();
    let mut i = array_start + 1;
    loop {
        i = skip_ws(i);
        let close = match bytes.get(i) {
            Some(b'(') => b')',
            Some(b'<') => b'>',
            _ => break,
        };
        let start = i + 1;
        let mut end = start;
        while end < bytes.len() && bytes[end] != close {
            end += if bytes[end] == b'\\' { 2 } else { 1 };
        }
        if end >= bytes.len() {
            break;
        }
        spans.push(start..end);
        i = end + 1;
    }
    spans
}

/// Replace the trailer `/ID` strings with a digest of the rest of the file.
///
/// The strings keep their length, so cross-reference offsets stay valid.
fn stamp_document_id(bytes: &mut [u8]) -> bool {
    let spans = trailer_id_spans(bytes);
    if spans.is_empty() {
        return false;
    }
    for span in &spans {
        bytes[span.clone()].fill(b'0');
    }
    let digest = format!("{:X}", Sha256::digest(&*bytes));
    for span in spans {
        for (slot, digit) in bytes[span].iter_mut().zip(digest.bytes().cycle()) {
            *slot = digit;
        }
    }
    true
}

/// [`FormatConverter`] producing PDF.
#[derive(Debug, Clone, Default)]
pub struct PdfConverter {
    pub setup: PageSetup,
}

impl PdfConverter {
    pub fn new(setup: PageSetup) -> Self {
        Self { setup }
    }

    /// Synchronous conversion for tests and internal use.
    pub fn convert_sync(&self, document: &Document) -> Vec<u8> {
        let laid_out = layout(document, &self.setup);
        debug!(pages = laid_out.len(), "Laid out document");
        let pages: Vec<PdfPage> = laid_out
            .iter()
            .map(|p| {
                PdfPage::new(
                    Mm(self.setup.width_mm),
                    Mm(self.setup.height_mm),
                    page_ops(p),
                )
            })
            .collect();

        let mut pdf = PdfDocument::new(&document.title);
        let mut warnings = Vec::new();
        let mut bytes = pdf
            .with_pages(pages)
            .save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            warn!(count = warnings.len(), "PDF serialisation produced warnings");
        }
        if !stamp_document_id(&mut bytes) {
            warn!(size = bytes.len(), "PDF output has no trailer ID to stamp");
        }
        bytes
    }
}

#[async_trait]
impl FormatConverter for PdfConverter {
    fn extension(&self) -> &'static str {
        "pdf"
    }

    async fn convert(&self, document: &Document) -> Result<Vec<u8>, CollaboratorError> {
        let bytes = self.convert_sync(document);
        if bytes.is_empty() {
            return Err("PDF serialisation produced no bytes".into());
        }
        info!(size = bytes.len(), title = %document.title, "Converted document to PDF");
        Ok(bytes)
    }
}
