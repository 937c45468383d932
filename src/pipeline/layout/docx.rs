//! Word-processor paragraph extraction.
//!
//! Reads `word/document.xml` out of the .docx container and emits one line per
//! body paragraph. Table rows are emitted as a single line with their cell
//! paragraphs joined, since SOF tables put the event and its time in
//! neighbouring cells.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use super::types::{BoundingBox, DocumentKind, LayoutStrategy, Line, ParseMode};
use super::LayoutError;

const DOCUMENT_PART: &str = "word/document.xml";

pub struct DocxStrategy;

impl LayoutStrategy for DocxStrategy {
    fn mode(&self) -> ParseMode {
        ParseMode::Docx
    }

    fn applies_to(&self, kind: DocumentKind) -> bool {
        kind == DocumentKind::WordProcessor
    }

    fn extract(&self, bytes: &[u8]) -> Result<Vec<Line>, LayoutError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| LayoutError::WordProcessor(format!("Not a .docx container: {e}")))?;

        let mut xml = String::new();
        archive
            .by_name(DOCUMENT_PART)
            .map_err(|e| LayoutError::WordProcessor(format!("Missing {DOCUMENT_PART}: {e}")))?
            .read_to_string(&mut xml)?;

        let paragraphs = parse_document_xml(&xml)?;
        tracing::debug!(paragraphs = paragraphs.len(), "Parsed word-processor body");

        // Word-processor files have no fixed pagination at this level: page 1.
        Ok(paragraphs
            .into_iter()
            .enumerate()
            .map(|(i, text)| Line::new(text, 1, BoundingBox::default(), i + 1))
            .collect())
    }
}

/// Extract paragraph texts from a WordprocessingML body, in document order.
pub fn parse_document_xml(xml: &str) -> Result<Vec<String>, LayoutError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    // One entry per open table row; holds that row's cell paragraphs.
    let mut rows: Vec<Vec<String>> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:p" => current.clear(),
                b"w:t" => in_text = true,
                b"w:tr" => rows.push(Vec::new()),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => current.push(' '),
                b"w:br" | b"w:cr" => current.push(' '),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t
                    .unescape()
                    .map_err(|e| LayoutError::WordProcessor(format!("Bad text run: {e}")))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    let text = current.trim().to_string();
                    current.clear();
                    if text.is_empty() {
                        continue;
                    }
                    match rows.last_mut() {
                        Some(row) => row.push(text),
                        None => paragraphs.push(text),
                    }
                }
                b"w:tr" => {
                    if let Some(cells) = rows.pop() {
                        let joined = cells.join(" ");
                        if joined.is_empty() {
                            continue;
                        }
                        match rows.last_mut() {
                            Some(outer) => outer.push(joined),
                            None => paragraphs.push(joined),
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(LayoutError::WordProcessor(format!(
                    "XML error at position {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
    }

    Ok(paragraphs)
}
