//! Byte positions, spans, and the line index.
//!
//! Positions are byte offsets into one source file, stored as `u32` newtypes.
//! `Pos::NONE` is the invalid sentinel used wherever the original syntax had
//! nothing to point at (a missing init statement, an unset shadow window end).

use std::fmt;

/// A byte offset into the analyzed source file.
///
/// Uses `u32` to save space; source files above 4 GiB are not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Pos(u32);

impl Pos {
    /// The invalid position sentinel.
    pub const NONE: Self = Self(u32::MAX);

    #[must_use]
    pub fn new(offset: u32) -> Self {
        Self(offset)
    }

    #[must_use]
    pub fn from_usize(offset: usize) -> Self {
        Self(u32::try_from(offset).expect("source file exceeds u32 offsets"))
    }

    /// Whether this is a real position rather than the `NONE` sentinel.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self != Self::NONE
    }

    #[must_use]
    pub fn offset(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// The position `n` bytes further into the file.
    #[must_use]
    pub fn add(self, n: u32) -> Self {
        debug_assert!(self.is_valid());
        Self(self.0 + n)
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "-")
        }
    }
}

/// A half-open byte range `[start, end)` within one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Span {
    pub start: Pos,
    pub end: Pos,
}

impl Span {
    pub const NONE: Self = Self {
        start: Pos::NONE,
        end: Pos::NONE,
    };

    #[must_use]
    pub fn new(start: Pos, end: Pos) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn is_valid(self) -> bool {
        self.start.is_valid() && self.end.is_valid()
    }

    #[must_use]
    pub fn contains(self, pos: Pos) -> bool {
        self.start <= pos && pos < self.end
    }

    #[must_use]
    pub fn len(self) -> u32 {
        self.end.offset() - self.start.offset()
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.start == self.end
    }

    /// The source text this span covers.
    #[must_use]
    pub fn text(self, src: &str) -> &str {
        &src[self.start.index()..self.end.index()]
    }
}

/// A 1-based line/column pair produced by [`LineIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LineCol {
    pub line: u32,
    pub column: u32,
}

/// Maps byte positions to 1-based line and column numbers.
///
/// Built once per file from the raw source; lookups are binary searches over
/// the recorded line-start offsets.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<u32>,
}

impl LineIndex {
    #[must_use]
    pub fn new(src: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in src.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(u32::try_from(i + 1).expect("source file exceeds u32 offsets"));
            }
        }
        Self { line_starts }
    }

    /// The 1-based line number containing `pos`.
    #[must_use]
    pub fn line(&self, pos: Pos) -> u32 {
        let offset = pos.offset();
        let line = self.line_starts.partition_point(|&start| start <= offset);
        u32::try_from(line).expect("line count exceeds u32")
    }

    /// The 1-based line and column of `pos`. Columns count bytes.
    #[must_use]
    pub fn line_col(&self, pos: Pos) -> LineCol {
        let line = self.line(pos);
        let start = self.line_starts[(line - 1) as usize];
        LineCol {
            line,
            column: pos.offset() - start + 1,
        }
    }

    /// Byte offset of the first character of the line containing `pos`.
    #[must_use]
    pub fn line_start(&self, pos: Pos) -> Pos {
        let line = self.line(pos);
        Pos::new(self.line_starts[(line - 1) as usize])
    }

    /// Number of source lines a span touches.
    #[must_use]
    pub fn line_span(&self, span: Span) -> u32 {
        self.line(span.end) - self.line(span.start) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_index_maps_positions() {
        let index = LineIndex::new("ab\ncd\n\nef");
        assert_eq!(index.line_col(Pos::new(0)), LineCol { line: 1, column: 1 });
        assert_eq!(index.line_col(Pos::new(4)), LineCol { line: 2, column: 2 });
        assert_eq!(index.line_col(Pos::new(6)), LineCol { line: 3, column: 1 });
        assert_eq!(index.line_col(Pos::new(8)), LineCol { line: 4, column: 2 });
    }

    #[test]
    fn line_span_counts_touched_lines() {
        let index = LineIndex::new("a\nb\nc\n");
        assert_eq!(index.line_span(Span::new(Pos::new(0), Pos::new(1))), 1);
        assert_eq!(index.line_span(Span::new(Pos::new(0), Pos::new(4))), 3);
    }

    #[test]
    fn invalid_pos_is_not_valid() {
        assert!(!Pos::NONE.is_valid());
        assert!(Pos::new(0).is_valid());
    }
}
