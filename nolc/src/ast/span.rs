//! Source location tracking

use serde::{Deserialize, Serialize};

/// A line/column position in a source file (both 1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Byte offset of this position inside `source`, clamped to its length
    pub fn offset_in(&self, source: &str) -> usize {
        let mut offset = 0;
        for (idx, line) in source.split_inclusive('\n').enumerate() {
            if idx + 1 == self.line {
                let col = self.column.saturating_sub(1);
                return offset + col.min(line.trim_end_matches('\n').len());
            }
            offset += line.len();
        }
        source.len()
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A span in the source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Span covering `start_line:start_column` to `end_line:end_column`
    pub fn from_coords(start_line: usize, start_column: usize, end_line: usize, end_column: usize) -> Self {
        Self::new(
            Position::new(start_line, start_column),
            Position::new(end_line, end_column),
        )
    }

    /// Span of a whole single source line
    pub fn line(line: usize) -> Self {
        Self::from_coords(line, 1, line, 1)
    }

    /// Smallest span covering both. An unset (default) span is ignored.
    pub fn merge(self, other: Span) -> Span {
        if self == Span::default() {
            return other;
        }
        if other == Span::default() {
            return self;
        }
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Byte range of this span inside `source`
    pub fn byte_range(&self, source: &str) -> std::ops::Range<usize> {
        let start = self.start.offset_in(source);
        let end = self.end.offset_in(source).max(start);
        start..end
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
