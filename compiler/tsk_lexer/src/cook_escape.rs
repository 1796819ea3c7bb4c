//! Escape processing for string literals.

/// A bad escape found while cooking, as a byte range relative to the
/// literal body.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum EscapeProblem {
    Invalid { start: usize, end: usize, ch: char },
    BadUnicode { start: usize, end: usize },
}

/// Apply escapes in `body` (the literal without its quotes).
///
/// Bad escapes are reported and kept verbatim so the rest of the literal
/// still cooks.
pub(crate) fn unescape(body: &str, problems: &mut Vec<EscapeProblem>) -> String {
    if !body.contains('\\') {
        return body.to_owned();
    }

    let mut out = String::with_capacity(body.len());
    let mut chars = body.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some((j, esc)) = chars.next() else {
            // A lone trailing backslash only occurs in unterminated literals.
            out.push('\\');
            break;
        };
        match esc {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            'u' => {
                let rest = &body[j + 1..];
                match parse_unicode(rest) {
                    Some((ch, consumed)) => {
                        out.push(ch);
                        let stop = j + 1 + consumed;
                        while chars.peek().is_some_and(|&(k, _)| k < stop) {
                            chars.next();
                        }
                    }
                    None => {
                        problems.push(EscapeProblem::BadUnicode {
                            start: i,
                            end: j + 1,
                        });
                        out.push('\\');
                        out.push('u');
                    }
                }
            }
            other => {
                problems.push(EscapeProblem::Invalid {
                    start: i,
                    end: j + other.len_utf8(),
                    ch: other,
                });
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}

/// Parse `{XXXX}` at the start of `rest`. Returns the char and the bytes
/// consumed.
fn parse_unicode(rest: &str) -> Option<(char, usize)> {
    let inner = rest.strip_prefix('{')?;
    let close = inner.find('}')?;
    let hex = &inner[..close];
    if hex.is_empty() || hex.len() > 6 {
        return None;
    }
    let code = u32::from_str_radix(hex, 16).ok()?;
    Some((char::from_u32(code)?, close + 2))
}
