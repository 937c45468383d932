use super::types::{BoundingBox, DocumentKind, LayoutStrategy, Line, ParseMode};
use super::LayoutError;

/// Bytes inspected by the text heuristic.
const SNIFF_LEN: usize = 4096;

/// Last-resort strategy: the whole payload becomes a single line.
///
/// `lenient` applies to unrecognized extensions and always decodes (lossy).
/// `strict` applies to PDF / word-processor kinds and only when the bytes
/// look like text, so binary containers never surface as garbage.
pub struct PlainTextStrategy {
    strict: bool,
}

impl PlainTextStrategy {
    pub fn lenient() -> Self {
        Self { strict: false }
    }

    pub fn strict() -> Self {
        Self { strict: true }
    }
}

impl LayoutStrategy for PlainTextStrategy {
    fn mode(&self) -> ParseMode {
        ParseMode::PlainText
    }

    fn applies_to(&self, kind: DocumentKind) -> bool {
        match kind {
            DocumentKind::Other => !self.strict,
            DocumentKind::Pdf | DocumentKind::WordProcessor => self.strict,
        }
    }

    fn extract(&self, bytes: &[u8]) -> Result<Vec<Line>, LayoutError> {
        if self.strict && !is_likely_text(bytes) {
            return Ok(Vec::new());
        }
        let text = String::from_utf8_lossy(bytes);
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Line::new(text.into_owned(), 1, BoundingBox::default(), 1)])
    }
}

/// Check if a payload is likely plain text (valid UTF-8, mostly printable).
pub fn is_likely_text(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(SNIFF_LEN)];
    if head.is_empty() {
        return false;
    }

    let text = match std::str::from_utf8(head) {
        Ok(t) => t,
        // A multi-byte char cut at the sniff boundary is still text.
        Err(e) if e.error_len().is_none() => match std::str::from_utf8(&head[..e.valid_up_to()]) {
            Ok(t) => t,
            Err(_) => return false,
        },
        Err(_) => return false,
    };

    // At least 80% printable characters (or whitespace)
    let printable = text
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .count();
    let ratio = printable as f64 / text.chars().count().max(1) as f64;
    ratio > 0.80
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_wraps_whole_payload() {
        let lines = PlainTextStrategy::lenient()
            .extract(b"Vessel: ORION\nNOR tendered 0600")
            .unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "Vessel: ORION\nNOR tendered 0600");
        assert_eq!((lines[0].page, lines[0].line_no), (1, 1));
    }

    #[test]
    fn lenient_decodes_invalid_utf8_lossily() {
        let lines = PlainTextStrategy::lenient().extract(b"Berthed \xFF 1015").unwrap();
        assert!(lines[0].text.starts_with("Berthed"));
        assert!(lines[0].text.ends_with("1015"));
    }

    #[test]
    fn strict_refuses_binary() {
        let binary: Vec<u8> = (0u8..32).cycle().take(512).collect();
        assert!(PlainTextStrategy::strict().extract(&binary).unwrap().is_empty());
    }

    #[test]
    fn strict_accepts_text_disguised_as_pdf() {
        let lines = PlainTextStrategy::strict().extract(b"Commenced loading 0730").unwrap();
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn applicability_splits_by_kind() {
        assert!(PlainTextStrategy::lenient().applies_to(DocumentKind::Other));
        assert!(!PlainTextStrategy::lenient().applies_to(DocumentKind::Pdf));
        assert!(PlainTextStrategy::strict().applies_to(DocumentKind::Pdf));
        assert!(PlainTextStrategy::strict().applies_to(DocumentKind::WordProcessor));
        assert!(!PlainTextStrategy::strict().applies_to(DocumentKind::Other));
    }

    #[test]
    fn blank_payload_yields_nothing() {
        assert!(PlainTextStrategy::lenient().extract(b"  \n ").unwrap().is_empty());
    }

    #[test]
    fn text_sniffing() {
        assert!(is_likely_text("Port: KOH SICHANG".as_bytes()));
        assert!(!is_likely_text(b""));
        assert!(!is_likely_text(&[0u8, 1, 2, 3, 4, 5]));
        // 'é' split across the sniff boundary
        let mut cut = vec![b'a'; SNIFF_LEN - 1];
        cut.extend_from_slice("é".as_bytes());
        assert!(is_likely_text(&cut));
    }
}
