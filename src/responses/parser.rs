//! Line parser for response definition files
//!
//! Each data line yields zero or one candidate entry. Problems never abort
//! parsing, they are pushed onto the caller's warning list.

use super::{ParseWarning, WarningKind};

/// Comment marker at line start
const COMMENT: char = ';';
/// Token separating compare bytes from response bytes
const SEPARATOR: &str = ":";

/// Entry candidate parsed from one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Candidate {
    pub compare: Vec<u8>,
    pub response: Vec<u8>,
    pub line: usize,
}

/// Parse one line of a definition file
///
/// Returns `None` for comments, blank lines and lines lacking either
/// compare or response bytes.
pub(super) fn parse_line(
    text: &str,
    line: usize,
    warnings: &mut Vec<ParseWarning>,
) -> Option<Candidate> {
    if text.starts_with(COMMENT) || text.chars().count() < 2 {
        return None;
    }

    let mut compare = Vec::new();
    let mut response = Vec::new();
    let mut in_response = false;

    for token in text.split_whitespace() {
        if token == SEPARATOR {
            in_response = true;
            continue;
        }
        match parse_hex_byte(token) {
            Some(b) if in_response => response.push(b),
            Some(b) => compare.push(b),
            None => warnings.push(ParseWarning {
                line,
                kind: WarningKind::InvalidToken {
                    token: token.to_string(),
                },
            }),
        }
    }

    if compare.is_empty() || response.is_empty() {
        if !compare.is_empty() || !response.is_empty() {
            warnings.push(ParseWarning {
                line,
                kind: WarningKind::IncompleteLine,
            });
        }
        return None;
    }

    Some(Candidate {
        compare,
        response,
        line,
    })
}

/// Longest accepted hex token (a 32-bit value)
const MAX_HEX_DIGITS: usize = 8;

/// Parse a hex byte token, with or without `0x` prefix
///
/// Only hex digits are accepted, no sign. Values wider than a byte (up to
/// 32 bits) are truncated to their low byte, so `100` yields `0x00`.
fn parse_hex_byte(token: &str) -> Option<u8> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    if digits.is_empty()
        || digits.len() > MAX_HEX_DIGITS
        || !digits.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return None;
    }
    u32::from_str_radix(digits, 16).ok().map(|v| v as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_token_rules() {
        assert_eq!(parse_hex_byte("3e"), Some(0x3E));
        assert_eq!(parse_hex_byte("0xF1"), Some(0xF1));
        assert_eq!(parse_hex_byte("0X1a"), Some(0x1A));
        assert_eq!(parse_hex_byte("100"), Some(0x00));
        assert_eq!(parse_hex_byte("1A2"), Some(0xA2));
        assert_eq!(parse_hex_byte("+1"), None);
        assert_eq!(parse_hex_byte("-1"), None);
        assert_eq!(parse_hex_byte("0x"), None);
        assert_eq!(parse_hex_byte("123456789"), None);
    }

    fn parse(text: &str) -> (Option<Candidate>, Vec<ParseWarning>) {
        let mut warnings = Vec::new();
        let candidate = parse_line(text, 1, &mut warnings);
        (candidate, warnings)
    }

    #[test]
    fn test_compare_and_response() {
        let (c, w) = parse("82 10 F1 3F : A1 02 00 61");
        let c = c.unwrap();
        assert_eq!(c.compare, vec![0x82, 0x10, 0xF1, 0x3F]);
        assert_eq!(c.response, vec![0xA1, 0x02, 0x00, 0x61]);
        assert!(w.is_empty());
    }

    #[test]
    fn test_comment_and_short_lines_skipped() {
        assert_eq!(parse("; 82 10 F1 : 00").0, None);
        assert_eq!(parse("").0, None);
        assert_eq!(parse("A").0, None);
        assert!(parse("; 82 10 F1 : 00").1.is_empty());
    }

    #[test]
    fn test_invalid_tokens_discarded() {
        let (c, w) = parse("82 zz 10\tF1 : A1 0x02 +1 61");
        let c = c.unwrap();
        assert_eq!(c.compare, vec![0x82, 0x10, 0xF1]);
        assert_eq!(c.response, vec![0xA1, 0x02, 0x61]);
        assert_eq!(w.len(), 2);
        assert_eq!(
            w[0].kind,
            WarningKind::InvalidToken {
                token: "zz".into()
            }
        );
    }

    #[test]
    fn test_missing_response_rejected() {
        let (c, w) = parse("82 10 F1 3F");
        assert!(c.is_none());
        assert_eq!(w[0].kind, WarningKind::IncompleteLine);
    }

    #[test]
    fn test_missing_compare_rejected() {
        let (c, _) = parse(": A1 02");
        assert!(c.is_none());
    }
}
