//! Byte input to text, reporting invalid UTF-8.

use std::borrow::Cow;

use tsk_ir::{SourcePos, Span};

use crate::LexError;

/// Validate `bytes` as UTF-8. Each invalid sequence is reported at its
/// byte position in the original input and replaced with U+FFFD.
pub fn decode_source(bytes: &[u8]) -> (Cow<'_, str>, Vec<LexError>) {
    let mut errors = Vec::new();
    let mut offset = 0;
    let mut line = 1u32;
    let mut line_start = 0usize;

    while offset < bytes.len() {
        match std::str::from_utf8(&bytes[offset..]) {
            Ok(_) => break,
            Err(err) => {
                let bad_at = offset + err.valid_up_to();
                let len = err.error_len().unwrap_or(bytes.len() - bad_at);
                for (i, &b) in bytes[offset..bad_at].iter().enumerate() {
                    if b == b'\n' {
                        line += 1;
                        line_start = offset + i + 1;
                    }
                }
                let column = String::from_utf8_lossy(&bytes[line_start..bad_at])
                    .chars()
                    .count();
                let span = Span::saturating_from_range(bad_at..bad_at + len);
                let pos = SourcePos::new(
                    line,
                    u32::try_from(column + 1).unwrap_or(u32::MAX),
                    span.start,
                );
                errors.push(LexError::invalid_utf8(span, pos, len));
                offset = bad_at + len;
            }
        }
    }

    (String::from_utf8_lossy(bytes), errors)
}
