//! Plain-text rendering of diagnostics against their source.
//!
//! ```text
//! error [E1002]: expected a value, found end of line
//!   --> app.tsk:3:7
//!    |
//!  3 | port =
//!    |       ^ value missing here
//!    = note: in section `db`
//! ```

use std::fmt::Write as _;
use std::io::{self, Write};

use tsk_ir::LineIndex;

use crate::Diagnostic;

/// Renders diagnostics for one source file.
pub struct Emitter<'a> {
    path: &'a str,
    source: &'a str,
    lines: LineIndex,
}

impl<'a> Emitter<'a> {
    pub fn new(path: &'a str, source: &'a str) -> Self {
        Emitter {
            path,
            source,
            lines: LineIndex::new(source),
        }
    }

    pub fn render(&self, diag: &Diagnostic) -> String {
        let mut out = String::new();
        let pos = diag.pos;
        let gutter = pos.line.to_string().len();
        let pad = " ".repeat(gutter);

        // Writing to a String cannot fail.
        let _ = writeln!(out, "{diag}");
        let _ = writeln!(out, "{pad}--> {}:{}:{}", self.path, pos.line, pos.column);

        if let Some(text) = self.lines.line_text(self.source, pos.line) {
            let width = self.caret_width(diag, text);
            let _ = writeln!(out, "{pad} |");
            let _ = writeln!(out, "{} | {text}", pos.line);
            let _ = write!(
                out,
                "{pad} | {}{}",
                " ".repeat(pos.column.saturating_sub(1) as usize),
                "^".repeat(width)
            );
            if let Some(label) = &diag.label {
                let _ = write!(out, " {label}");
            }
            out.push('\n');
        }
        for note in &diag.notes {
            let _ = writeln!(out, "{pad} = note: {note}");
        }
        for suggestion in &diag.suggestions {
            let _ = writeln!(out, "{pad} = help: {suggestion}");
        }
        out
    }

    pub fn emit_all(&self, diags: &[Diagnostic], writer: &mut impl Write) -> io::Result<()> {
        for diag in diags {
            writeln!(writer, "{}", self.render(diag))?;
        }
        let errors = diags.iter().filter(|d| d.is_error()).count();
        let warnings = diags.len() - errors;
        if !diags.is_empty() {
            writeln!(
                writer,
                "{}: {errors} error{}, {warnings} warning{}",
                self.path,
                plural_s(errors),
                plural_s(warnings)
            )?;
        }
        Ok(())
    }

    /// Span width in characters, clipped to the rest of the line, at least 1.
    fn caret_width(&self, diag: &Diagnostic, line_text: &str) -> usize {
        let start = diag.span.start as usize;
        let end = (diag.span.end as usize).min(self.source.len());
        let span_chars = self
            .source
            .get(start..end)
            .map_or(0, |s| s.chars().take_while(|&c| c != '\n').count());
        let remaining = line_text
            .chars()
            .count()
            .saturating_sub(diag.pos.column.saturating_sub(1) as usize);
        span_chars.min(remaining).max(1)
    }
}

#[inline]
fn plural_s(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}
