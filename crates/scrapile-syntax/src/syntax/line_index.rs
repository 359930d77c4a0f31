//! Byte offset to line/column mapping.

use text_size::{TextRange, TextSize};

/// A zero-based line/column position. Columns count bytes, not characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Point {
    /// Zero-based line number.
    pub row: u32,
    /// Zero-based byte column within the line.
    pub column: u32,
}

impl Point {
    /// Creates a point.
    #[must_use]
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

/// A half-open point range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PointRange {
    /// Start position (inclusive).
    pub start: Point,
    /// End position (exclusive).
    pub end: Point,
}

/// Maps byte offsets to [`Point`]s for one text buffer.
///
/// Built once per parse and shared by the resulting tree; lookups are a
/// binary search over line start offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    /// Byte offset of the start of each line. The first entry is always 0.
    line_starts: Vec<TextSize>,
    len: TextSize,
}

impl LineIndex {
    /// Builds the index for `text`.
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![TextSize::from(0)];
        for (offset, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(TextSize::from(offset as u32 + 1));
            }
        }
        Self {
            line_starts,
            len: TextSize::from(text.len() as u32),
        }
    }

    /// Total length of the indexed text.
    #[must_use]
    pub fn len(&self) -> TextSize {
        self.len
    }

    /// Returns `true` if the indexed text is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == TextSize::from(0)
    }

    /// The point at a byte offset. Offsets past the end clamp to the end.
    #[must_use]
    pub fn point(&self, offset: TextSize) -> Point {
        let offset = offset.min(self.len);
        let row = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let line_start = self.line_starts[row];
        Point {
            row: row as u32,
            column: u32::from(offset) - u32::from(line_start),
        }
    }

    /// The point range covering a byte range.
    #[must_use]
    pub fn point_range(&self, range: TextRange) -> PointRange {
        PointRange {
            start: self.point(range.start()),
            end: self.point(range.end()),
        }
    }
}
