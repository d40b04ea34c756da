//! Source positions and byte-offset conversion.
//!
//! Positions are 1-based lines and 1-based byte columns, matching what the Go
//! toolchain prints in its diagnostics.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// A 1-based `(line, column)` pair. Columns count bytes.
#[derive(
    Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[display("{line}:{column}")]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Line index for a text buffer.
///
/// Caches line start offsets so offset/position conversion is a binary search.
#[derive(Clone, Debug)]
pub struct LineIndex {
    /// Byte offset of the start of each line (0-indexed).
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            line_starts,
            len: text.len(),
        }
    }

    /// Number of lines, counting a trailing empty line after a final newline.
    pub fn line_count(&self) -> u32 {
        self.line_starts.len() as u32
    }

    /// Convert a byte offset to a position. Offsets past the end clamp to it.
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.len);
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let column = offset - self.line_starts[line];
        Position::new(line as u32 + 1, column as u32 + 1)
    }

    /// Convert a position back to a byte offset.
    ///
    /// A column one past the end of the line (pointing at the newline) is valid.
    pub fn offset(&self, position: Position) -> Option<usize> {
        let line = (position.line as usize).checked_sub(1)?;
        let column = (position.column as usize).checked_sub(1)?;
        let start = *self.line_starts.get(line)?;
        let end = self.line_end(line);
        (start + column <= end).then_some(start + column)
    }

    /// Byte range of a 1-based line, excluding its newline.
    pub fn line_range(&self, line: u32) -> Option<std::ops::Range<usize>> {
        let index = (line as usize).checked_sub(1)?;
        let start = *self.line_starts.get(index)?;
        Some(start..self.line_end(index))
    }

    fn line_end(&self, index: usize) -> usize {
        self.line_starts
            .get(index + 1)
            .map(|next| next - 1)
            .unwrap_or(self.len)
    }
}

/// Position reached after appending `text` starting at `start`.
pub fn advance(start: Position, text: &str) -> Position {
    match text.rfind('\n') {
        Some(last) => Position::new(
            start.line + text.matches('\n').count() as u32,
            (text.len() - last) as u32,
        ),
        None => Position::new(start.line, start.column + text.len() as u32),
    }
}
