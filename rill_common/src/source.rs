//! Immutable named source buffers

use crate::span::{Location, Span};

/// An immutable source text with the name used in diagnostics.
///
/// All spans produced by the pipeline index into `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBuffer {
    name: String,
    text: String,
}

impl SourceBuffer {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self { name: name.into(), text: text.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn location(&self, offset: u32) -> Location {
        Location::of(&self.text, offset)
    }

    /// The full line containing `offset`, without its trailing newline.
    pub fn line_at(&self, offset: u32) -> &str {
        let bytes = self.text.as_bytes();
        let offset = (offset as usize).min(bytes.len());
        let start = bytes[..offset]
            .iter()
            .rposition(|b| *b == b'\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        let end = bytes[offset..]
            .iter()
            .position(|b| *b == b'\n')
            .map(|i| offset + i)
            .unwrap_or(bytes.len());
        &self.text[start..end]
    }

    pub fn slice(&self, span: Span) -> &str {
        let start = (span.start as usize).min(self.text.len());
        let end = (span.end as usize).min(self.text.len());
        &self.text[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_at_finds_enclosing_line() {
        let src = SourceBuffer::new("<test>", "one\ntwo\nthree");
        assert_eq!(src.line_at(0), "one");
        assert_eq!(src.line_at(5), "two");
        assert_eq!(src.line_at(12), "three");
    }

    #[test]
    fn line_at_clamps() {
        let src = SourceBuffer::new("<test>", "only");
        assert_eq!(src.line_at(100), "only");
    }
}
