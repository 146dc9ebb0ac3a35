//! Diagnostic messages and source excerpt rendering

use crate::source::SourceBuffer;
use crate::span::Span;
use std::fmt;
use std::fmt::Write as _;

/// Severity level for diagnostic messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// A diagnostic message anchored to a source span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self { severity: Severity::Error, message: message.into(), span }
    }

    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self { severity: Severity::Warning, message: message.into(), span }
    }

    /// Render `file:line: message` followed by a two-line (or, for spans that
    /// cross lines, multi-line) source excerpt with a carat underline.
    pub fn render(&self, source: &SourceBuffer) -> String {
        let location = source.location(self.span.start);
        let mut out = format!("{}:{}: {}\n", source.name(), location.line, self.message);
        render_excerpt(&mut out, source, self.span);
        out
    }
}

/// Write a column-accurate excerpt for `span` into `out`.
///
/// Single-line spans produce the quoted line plus an underline row; spans that
/// cross lines render the first and last line with a continuation bar across
/// the rows in between.
pub fn render_excerpt(out: &mut String, source: &SourceBuffer, span: Span) {
    let start = source.location(span.start);
    let end = source.location(span.end.max(span.start + 1));
    let width = digits(end.line);

    if start.line == end.line {
        let line = source.line_at(span.start);
        let _ = writeln!(out, " {:>width$} |     {}", start.line, line, width = width as usize);
        let dashes = "-".repeat(4 + start.column as usize - 1);
        let carats = "^".repeat((end.column.saturating_sub(start.column)).max(1) as usize);
        let _ = writeln!(out, " {:>width$} | {}{}", "", dashes, carats, width = width as usize);
    } else {
        let first = source.line_at(span.start);
        let _ = writeln!(out, " {:>width$} |     {}", start.line, first, width = width as usize);
        let _ = writeln!(
            out,
            " {:>width$} | ----{}",
            "",
            "^".repeat(first.len().max(1)),
            width = width as usize
        );
        for row in start.line + 1..end.line {
            let _ = writeln!(out, " {:>width$} | |", row, width = width as usize);
        }
        let last = source.line_at(span.end.saturating_sub(1));
        let _ = writeln!(out, " {:>width$} | |   {}", end.line, last, width = width as usize);
        let _ = writeln!(
            out,
            " {:>width$} | ----{}",
            "",
            "^".repeat(last.len().max(1)),
            width = width as usize
        );
    }
}

fn digits(mut n: u32) -> u32 {
    let mut count = 1;
    while n >= 10 {
        count += 1;
        n /= 10;
    }
    count
}

/// Collection of diagnostic messages
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub messages: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.messages.push(diagnostic);
    }

    pub fn error(&mut self, message: impl Into<String>, span: Span) {
        self.add(Diagnostic::error(message, span));
    }

    pub fn warning(&mut self, message: impl Into<String>, span: Span) {
        self.add(Diagnostic::warning(message, span));
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.messages.iter().filter(|d| d.severity == Severity::Error).count()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Log every collected diagnostic under the given group target.
    pub fn emit(&self, source: &SourceBuffer, group: &str) {
        for diagnostic in &self.messages {
            let rendered = diagnostic.render(source);
            match diagnostic.severity {
                Severity::Error => log::error!(target: group, "{rendered}"),
                Severity::Warning => log::warn!(target: group, "{rendered}"),
                Severity::Info => log::info!(target: group, "{rendered}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn single_line_excerpt_points_at_span() {
        let source = SourceBuffer::new("<test>", "a := 1\nb ** 2\n");
        let diagnostic = Diagnostic::error("unknown operator", Span::new(9, 11));
        let rendered = diagnostic.render(&source);
        assert_eq!(
            rendered,
            "<test>:2: unknown operator\n 2 |     b ** 2\n   | ------^^\n",
        );
    }

    #[test]
    fn multi_line_excerpt_has_continuation_bars() {
        let source = SourceBuffer::new("<test>", "one\ntwo\nthree\nfour\n");
        let diagnostic = Diagnostic::error("spans lines", Span::new(0, 15));
        let rendered = diagnostic.render(&source);
        assert!(rendered.contains(" 2 | |"));
        assert!(rendered.contains(" 4 | |   "));
    }

    #[test]
    fn diagnostics_counts_errors() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.warning("w", Span::single(0));
        assert!(!diagnostics.has_errors());
        diagnostics.error("e", Span::single(0));
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.error_count(), 1);
    }
}
