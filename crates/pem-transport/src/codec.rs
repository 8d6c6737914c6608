//! Single-line transport encoding for PEM text
//!
//! Service bindings only carry string-valued credentials, so certificates and
//! keys travel as one physical line: each line terminator becomes the literal
//! two-character sequence `\n` and every `"` is escaped as `\"`, which keeps
//! the value intact inside a double-quoted JSON or shell literal.
//!
//! ```text
//! -----BEGIN CERTIFICATE-----\n      -----BEGIN CERTIFICATE-----\nMIIB...\n-----END CERTIFICATE-----
//! MIIB...\n                  ──▶
//! -----END CERTIFICATE-----\n
//! ```
//!
//! Decoding restores the line terminators. Material that lacked a final
//! newline gains one; nothing else about the text changes.

use crate::error::CodecError;

/// Literal escape that stands in for a line terminator
pub const ESCAPED_NEWLINE: &str = "\\n";

/// Literal escape that stands in for a double quote
pub const ESCAPED_QUOTE: &str = "\\\"";

/// Encode PEM text into a single-line credential string.
///
/// Every source line is followed by a literal `\n` except the last one, and
/// double quotes are backslash-escaped. Empty input encodes to an empty
/// string. Backslash sequences already present in the text are left alone.
///
/// # Example
///
/// ```
/// use pem_transport::encode;
///
/// let encoded = encode("-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n");
/// assert_eq!(encoded, r"-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----");
/// ```
pub fn encode(pem: &str) -> String {
    let mut encoded = String::with_capacity(pem.len() + pem.len() / 16);

    for line in pem.split_terminator('\n') {
        for ch in line.chars() {
            if ch == '"' {
                encoded.push('\\');
            }
            encoded.push(ch);
        }
        encoded.push_str(ESCAPED_NEWLINE);
    }

    // The last line carries no dangling escape
    if encoded.ends_with(ESCAPED_NEWLINE) {
        encoded.truncate(encoded.len() - ESCAPED_NEWLINE.len());
    }

    encoded
}

/// Encode raw file bytes, rejecting content that is not UTF-8 text.
pub fn encode_bytes(pem: &[u8]) -> Result<String, CodecError> {
    Ok(encode(std::str::from_utf8(pem)?))
}

/// Decode a single-line credential string back into PEM text.
///
/// Literal `\n` sequences become line terminators and `\"` becomes `"`.
/// Real line feeds pass through unchanged, so a value whose escapes were
/// already resolved by a JSON parser decodes to the same text. The result
/// always ends with a line terminator unless it is empty.
///
/// The output is not validated as PEM; a malformed value only surfaces when
/// the TLS layer parses the file.
pub fn decode(encoded: &str) -> String {
    if encoded.is_empty() {
        return String::new();
    }

    let mut pem = String::with_capacity(encoded.len() + 1);
    let mut rest = encoded;

    while let Some(pos) = rest.find('\\') {
        pem.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if tail.starts_with(ESCAPED_NEWLINE) {
            pem.push('\n');
            rest = &tail[ESCAPED_NEWLINE.len()..];
        } else if tail.starts_with(ESCAPED_QUOTE) {
            pem.push('"');
            rest = &tail[ESCAPED_QUOTE.len()..];
        } else {
            pem.push('\\');
            rest = &tail[1..];
        }
    }
    pem.push_str(rest);

    if !pem.ends_with('\n') {
        pem.push('\n');
    }

    pem
}

#[cfg(test)]
mod tests {
    use super::*;

    const CERT: &str = "-----BEGIN CERTIFICATE-----\n\
                        MIIBszCCAVmgAwIBAgIUQ2Vyd+/=\n\
                        -----END CERTIFICATE-----\n";

    #[test]
    fn test_encode_produces_single_line() {
        let encoded = encode(CERT);
        assert!(!encoded.contains('\n'));
        assert_eq!(
            encoded,
            "-----BEGIN CERTIFICATE-----\\nMIIBszCCAVmgAwIBAgIUQ2Vyd+/=\\n-----END CERTIFICATE-----"
        );
    }

    #[test]
    fn test_encode_strips_only_the_final_escape() {
        assert_eq!(encode("a\nb\n"), "a\\nb");
        assert_eq!(encode("a\nb"), "a\\nb");
    }

    #[test]
    fn test_encode_keeps_internal_blank_lines() {
        assert_eq!(encode("a\n\nb\n"), "a\\n\\nb");
        assert_eq!(decode(&encode("a\n\nb\n")), "a\n\nb\n");
    }

    #[test]
    fn test_encode_escapes_quotes() {
        assert_eq!(encode("Proc-Type: \"x\"\n"), "Proc-Type: \\\"x\\\"");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(encode(""), "");
        assert_eq!(decode(""), "");
    }

    #[test]
    fn test_round_trip_exact() {
        assert_eq!(decode(&encode(CERT)), CERT);
    }

    #[test]
    fn test_round_trip_adds_missing_final_newline() {
        let without = CERT.trim_end_matches('\n');
        assert_eq!(decode(&encode(without)), CERT);
    }

    #[test]
    fn test_whitespace_and_padding_survive() {
        let pem = "-----BEGIN X-----\n  AAAA\tBBBB==  \n-----END X-----\n";
        assert_eq!(decode(&encode(pem)), pem);
    }

    #[test]
    fn test_carriage_returns_are_not_touched() {
        let pem = "-----BEGIN X-----\r\nAAAA\r\n-----END X-----\r\n";
        let encoded = encode(pem);
        assert!(encoded.contains("\r\\n"));
        assert_eq!(decode(&encoded), pem);
    }

    #[test]
    fn test_decode_accepts_real_line_feeds() {
        // A JSON parser has already turned the escapes into line feeds
        let ingested = "-----BEGIN X-----\nAAAA\n-----END X-----";
        assert_eq!(decode(ingested), "-----BEGIN X-----\nAAAA\n-----END X-----\n");
    }

    #[test]
    fn test_decode_accepts_unescaped_quotes() {
        assert_eq!(decode("say \"hi\""), "say \"hi\"\n");
        assert_eq!(decode("say \\\"hi\\\""), "say \"hi\"\n");
    }

    #[test]
    fn test_decode_keeps_other_backslashes() {
        assert_eq!(decode("a\\tb\\"), "a\\tb\\\n");
    }

    #[test]
    fn test_literal_backslash_n_is_ambiguous() {
        // A body that already contains the two characters `\n` cannot be told
        // apart from an encoded terminator.
        let pem = "comment: a\\nb\n";
        assert_eq!(decode(&encode(pem)), "comment: a\nb\n");
    }

    #[test]
    fn test_encode_bytes_rejects_binary() {
        assert!(encode_bytes(&[0x30, 0x82, 0xff, 0x00]).is_err());
        assert_eq!(encode_bytes(b"x\ny\n").unwrap(), "x\\ny");
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    // Printable ASCII without backslash, which the encoding cannot represent
    // unambiguously.
    fn arb_line() -> impl Strategy<Value = String> {
        "[ -\\[\\]-~]{0,72}"
    }

    // Trailing blank lines do not survive the trip, PEM never ends with one
    fn arb_pem() -> impl Strategy<Value = String> {
        (
            prop::collection::vec(arb_line(), 0..24),
            "[ -\\[\\]-~]{1,72}",
        )
            .prop_map(|(mut lines, last)| {
                lines.push(last);
                let mut pem = lines.join("\n");
                pem.push('\n');
                pem
            })
    }

    proptest! {
        #[test]
        fn round_trip_identity(pem in arb_pem()) {
            prop_assert_eq!(decode(&encode(&pem)), pem);
        }

        #[test]
        fn round_trip_appends_one_newline(pem in arb_pem()) {
            let trimmed = pem.strip_suffix('\n').unwrap_or(&pem);
            prop_assert_eq!(decode(&encode(trimmed)), format!("{trimmed}\n"));
        }

        #[test]
        fn encoded_is_single_line(pem in arb_pem()) {
            prop_assert!(!encode(&pem).contains('\n'));
        }

        #[test]
        fn no_unescaped_quotes(pem in arb_pem()) {
            let encoded = encode(&pem);
            let bytes = encoded.as_bytes();
            for (i, b) in bytes.iter().enumerate() {
                if *b == b'"' {
                    prop_assert!(i > 0 && bytes[i - 1] == b'\\');
                }
            }
        }

        #[test]
        fn encoding_is_deterministic(pem in arb_pem()) {
            prop_assert_eq!(encode(&pem), encode(&pem));
        }
    }
}
