/// Sanitize one extracted line before it leaves the parser.
/// Strips control characters (OCR and text-layer noise), maps tabs and
/// non-breaking spaces to plain spaces, and trims the ends.
pub fn sanitize_line(raw: &str) -> String {
    raw.chars()
        .filter_map(|c| match c {
            '\t' | '\u{00A0}' | '\u{2007}' | '\u{202F}' => Some(' '),
            '\n' => Some('\n'),
            '\r' => None,
            c if c.is_control() => None,
            '\u{FEFF}' | '\u{200B}' => None,
            c => Some(c),
        })
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_null_and_control_bytes() {
        let clean = sanitize_line("Commenced\x00 loading\x01 0730");
        assert_eq!(clean, "Commenced loading 0730");
    }

    #[test]
    fn tabs_and_nbsp_become_spaces() {
        assert_eq!(sanitize_line("Port:\tKOH\u{00A0}SICHANG"), "Port: KOH SICHANG");
    }

    #[test]
    fn trims_and_drops_bom() {
        assert_eq!(sanitize_line("\u{FEFF}  Vessel: ORION  "), "Vessel: ORION");
    }

    #[test]
    fn keeps_time_punctuation() {
        assert_eq!(sanitize_line("23:50-00:10 / 12.45"), "23:50-00:10 / 12.45");
    }

    #[test]
    fn keeps_internal_newlines_for_plaintext() {
        assert_eq!(sanitize_line("a\r\nb"), "a\nb");
    }

    #[test]
    fn blank_input_is_empty() {
        assert!(sanitize_line(" \t\x02 ").is_empty());
    }
}
