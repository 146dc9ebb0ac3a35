//! Source location tracking for the Rill compiler

use serde::{Deserialize, Serialize};
use std::fmt;

/// A half-open byte range into a source buffer.
///
/// Line and column information is not tracked here; it is computed on demand
/// from the buffer when a diagnostic is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn single(offset: u32) -> Self {
        Self { start: offset, end: offset + 1 }
    }

    pub fn combine(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A 1-based line/column pair resolved from a byte offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    /// Resolve the line and column of a byte offset within `text`.
    ///
    /// Offsets past the end of the buffer resolve to the position just after
    /// the last byte.
    pub fn of(text: &str, offset: u32) -> Location {
        let offset = (offset as usize).min(text.len());
        let mut line = 1;
        let mut column = 1;
        for byte in text.as_bytes()[..offset].iter() {
            if *byte == b'\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Location { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_of_start_is_one_one() {
        assert_eq!(Location::of("abc", 0), Location { line: 1, column: 1 });
    }

    #[test]
    fn location_tracks_newlines() {
        let text = "ab\ncd\nef";
        assert_eq!(Location::of(text, 3), Location { line: 2, column: 1 });
        assert_eq!(Location::of(text, 7), Location { line: 3, column: 2 });
    }

    #[test]
    fn location_clamps_past_end() {
        assert_eq!(Location::of("a", 99), Location { line: 1, column: 2 });
    }

    #[test]
    fn combine_spans() {
        let a = Span::new(4, 6);
        let b = Span::new(1, 5);
        assert_eq!(a.combine(b), Span::new(1, 6));
    }
}
