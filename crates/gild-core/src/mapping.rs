//! Position correspondence between Gild source and generated Go.
//!
//! ```text
//! original ──(text rewriters create)──► Mapping ──(printer splices shift)──► final
//! ```
//!
//! Mappings are created while the text rewriters run. After that they are only
//! ever moved: whole-line shifts when the printer inserts lines, and same-line
//! column moves when a splice changes the length of a line.

use serde::{Deserialize, Serialize};

use crate::position::{Position, advance};

/// Extra columns past the end of a mapping that still resolve through it.
pub const POSITION_SLACK: u32 = 1;

/// What kind of source text a mapping anchors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingKind {
    /// Source text copied through unchanged.
    Identity,
    Keyword,
    Identifier,
    Expression,
    /// A whole rewritten construct (enum declaration, match arm, ...).
    Construct,
    /// Single-point anchor for a token whose generated span is discontiguous.
    Marker,
}

impl MappingKind {
    /// Rank used to break ties between equally distant fallback candidates.
    /// Larger syntactic spans rank higher.
    pub fn span_rank(self) -> u8 {
        match self {
            MappingKind::Construct => 5,
            MappingKind::Expression => 4,
            MappingKind::Identity => 3,
            MappingKind::Identifier => 2,
            MappingKind::Keyword => 1,
            MappingKind::Marker => 0,
        }
    }
}

/// One original ↔ generated correspondence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mapping {
    pub original_line: u32,
    pub original_column: u32,
    pub generated_line: u32,
    pub generated_column: u32,
    pub length: u32,
    pub kind: MappingKind,
}

impl Mapping {
    pub fn new(original: Position, generated: Position, length: u32, kind: MappingKind) -> Self {
        Self {
            original_line: original.line,
            original_column: original.column,
            generated_line: generated.line,
            generated_column: generated.column,
            length,
            kind,
        }
    }

    pub fn marker(original: Position, generated: Position) -> Self {
        Self::new(original, generated, 1, MappingKind::Marker)
    }

    pub fn original(&self) -> Position {
        Position::new(self.original_line, self.original_column)
    }

    pub fn generated(&self) -> Position {
        Position::new(self.generated_line, self.generated_column)
    }

    pub fn is_marker(&self) -> bool {
        self.kind == MappingKind::Marker && self.length == 1
    }
}

/// Ordered collection of mappings for one file.
///
/// Kept sorted by generated position so per-line lookups are a binary search.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MappingStore {
    mappings: Vec<Mapping>,
}

impl MappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// One identity mapping per line of `source`.
    pub fn identity(source: &str) -> Self {
        let mappings = source
            .split('\n')
            .enumerate()
            .map(|(index, line)| {
                let line_no = index as u32 + 1;
                let length = line.strip_suffix('\r').unwrap_or(line).len() as u32;
                Mapping::new(
                    Position::new(line_no, 1),
                    Position::new(line_no, 1),
                    length,
                    MappingKind::Identity,
                )
            })
            .collect();
        Self { mappings }
    }

    pub fn record_original(&mut self, mapping: Mapping) {
        let key = (mapping.generated_line, mapping.generated_column);
        let at = self
            .mappings
            .partition_point(|m| (m.generated_line, m.generated_column) <= key);
        self.mappings.insert(at, mapping);
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mapping> {
        self.mappings.iter()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Mappings whose generated position lies on `line`.
    pub fn on_generated_line(&self, line: u32) -> &[Mapping] {
        let start = self.mappings.partition_point(|m| m.generated_line < line);
        let end = self.mappings.partition_point(|m| m.generated_line <= line);
        &self.mappings[start..end]
    }

    /// Move every mapping strictly below `from_gen_line` by `by_lines`.
    ///
    /// Mappings on `from_gen_line` itself never move.
    pub fn shift(&mut self, from_gen_line: u32, by_lines: i32) {
        if by_lines == 0 {
            return;
        }
        for mapping in &mut self.mappings {
            if mapping.generated_line > from_gen_line {
                let line = i64::from(mapping.generated_line) + i64::from(by_lines);
                mapping.generated_line = line.max(1) as u32;
            }
        }
        if by_lines < 0 {
            self.sort();
        }
    }

    /// Move everything at or after `old_end` so that `old_end` lands on `new_end`.
    ///
    /// Lines below `old_end` move as in [`shift`](Self::shift); the tail of
    /// `old_end`'s own line moves with it.
    pub fn relocate(&mut self, old_end: Position, new_end: Position) {
        if old_end == new_end {
            return;
        }
        let by_lines = i64::from(new_end.line) - i64::from(old_end.line);
        for mapping in &mut self.mappings {
            if mapping.generated_line > old_end.line {
                let line = i64::from(mapping.generated_line) + by_lines;
                mapping.generated_line = line.max(1) as u32;
            } else if mapping.generated_line == old_end.line
                && mapping.generated_column >= old_end.column
            {
                mapping.generated_line = new_end.line;
                mapping.generated_column =
                    mapping.generated_column - old_end.column + new_end.column;
            }
        }
        self.sort();
    }

    /// Account for `replacement` being printed in place of the generated range
    /// `start..end`.
    ///
    /// Mappings that began inside the replaced text no longer point at
    /// anything and are dropped. One anchored at `start` stays.
    pub fn apply_splice(&mut self, start: Position, end: Position, replacement: &str) {
        self.mappings.retain(|m| {
            let at = m.generated();
            at <= start || at >= end
        });
        self.relocate(end, advance(start, replacement));
    }

    /// Translate a generated position back to the original source.
    pub fn map_to_original(&self, generated: Position) -> Position {
        let candidates = self
            .on_generated_line(generated.line)
            .iter()
            .map(|m| Anchor {
                from: m.generated(),
                to: m.original(),
                length: m.length,
                kind: m.kind,
            });
        translate(generated, candidates)
    }

    /// Translate an original position to where it ended up in generated code.
    pub fn map_to_generated(&self, original: Position) -> Position {
        let candidates = self
            .mappings
            .iter()
            .filter(|m| m.original_line == original.line)
            .map(|m| Anchor {
                from: m.original(),
                to: m.generated(),
                length: m.length,
                kind: m.kind,
            });
        translate(original, candidates)
    }

    fn sort(&mut self) {
        self.mappings
            .sort_by_key(|m| (m.generated_line, m.generated_column));
    }
}

impl FromIterator<Mapping> for MappingStore {
    fn from_iter<I: IntoIterator<Item = Mapping>>(iter: I) -> Self {
        let mut store = Self {
            mappings: iter.into_iter().collect(),
        };
        store.sort();
        store
    }
}

/// One side-agnostic view of a mapping: `from` is the side being queried.
#[derive(Clone, Copy)]
struct Anchor {
    from: Position,
    to: Position,
    length: u32,
    kind: MappingKind,
}

impl Anchor {
    fn contains(&self, column: u32) -> bool {
        column >= self.from.column && column < self.from.column + self.length
    }

    fn offset(&self, column: u32) -> Position {
        Position::new(self.to.line, self.to.column + (column - self.from.column))
    }
}

fn translate(query: Position, candidates: impl Iterator<Item = Anchor> + Clone) -> Position {
    // Narrowest containing range wins; stale wide ranges can overlap precise ones.
    if let Some(exact) = candidates
        .clone()
        .filter(|a| a.contains(query.column))
        .min_by_key(|a| a.length)
    {
        return exact.offset(query.column);
    }

    let nearest = candidates.min_by(|a, b| {
        let distance = |x: &Anchor| x.from.column.abs_diff(query.column);
        distance(a)
            .cmp(&distance(b))
            .then_with(|| b.kind.span_rank().cmp(&a.kind.span_rank()))
            .then_with(|| b.length.cmp(&a.length))
            .then_with(|| a.from.column.cmp(&b.from.column))
    });

    match nearest {
        Some(anchor) if anchor.kind == MappingKind::Marker && anchor.length == 1 => anchor.to,
        Some(anchor)
            if query.column >= anchor.from.column
                && query.column - anchor.from.column < anchor.length + POSITION_SLACK =>
        {
            anchor.offset(query.column)
        }
        _ => query,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: u32, column: u32) -> Position {
        Position::new(line, column)
    }

    fn store(mappings: &[Mapping]) -> MappingStore {
        mappings.iter().copied().collect()
    }

    #[test]
    fn test_exact_match_applies_offset() {
        let store = store(&[Mapping::new(
            pos(3, 5),
            pos(10, 9),
            6,
            MappingKind::Identifier,
        )]);
        for delta in 0..6 {
            assert_eq!(
                store.map_to_original(pos(10, 9 + delta)),
                pos(3, 5 + delta)
            );
        }
    }

    #[test]
    fn test_fallback_marker_returns_original_verbatim() {
        let store = store(&[Mapping::marker(pos(4, 12), pos(7, 2))]);
        assert_eq!(store.map_to_original(pos(7, 20)), pos(4, 12));
    }

    #[test]
    fn test_fallback_within_slack() {
        let store = store(&[Mapping::new(pos(2, 3), pos(5, 1), 4, MappingKind::Keyword)]);
        // One past the end still resolves through the mapping.
        assert_eq!(store.map_to_original(pos(5, 5)), pos(2, 7));
        // Far past the end falls back to identity.
        assert_eq!(store.map_to_original(pos(5, 30)), pos(5, 30));
    }

    #[test]
    fn test_identity_when_line_has_no_mapping() {
        let store = store(&[Mapping::new(pos(1, 1), pos(1, 1), 3, MappingKind::Identity)]);
        assert_eq!(store.map_to_original(pos(9, 4)), pos(9, 4));
    }

    #[test]
    fn test_tie_break_prefers_larger_span() {
        let store = store(&[
            Mapping::new(pos(20, 1), pos(6, 1), 4, MappingKind::Expression),
            Mapping::marker(pos(10, 1), pos(6, 9)),
        ]);
        // Column 5 is equidistant from both; the expression wins over the marker.
        assert_eq!(store.map_to_original(pos(6, 5)), pos(20, 5));
    }

    #[test]
    fn test_shift_boundary() {
        let mut store = store(&[
            Mapping::new(pos(1, 1), pos(4, 1), 5, MappingKind::Identity),
            Mapping::new(pos(2, 1), pos(5, 1), 5, MappingKind::Identity),
            Mapping::new(pos(3, 1), pos(6, 1), 5, MappingKind::Identity),
        ]);
        store.shift(5, 3);
        let lines: Vec<u32> = store.iter().map(|m| m.generated_line).collect();
        assert_eq!(lines, vec![4, 5, 9]);
        assert!(store.iter().all(|m| m.original_column == 1));
    }

    #[test]
    fn test_shift_keeps_original_side() {
        let mut store = MappingStore::identity("a\nb\nc\nd\n");
        let before: Vec<Position> = store.iter().map(Mapping::original).collect();
        store.shift(2, 3);
        let after: Vec<Position> = store.iter().map(Mapping::original).collect();
        assert_eq!(before, after);
        assert_eq!(store.map_to_original(pos(6, 1)), pos(3, 1));
        assert_eq!(store.map_to_original(pos(2, 1)), pos(2, 1));
    }

    #[test]
    fn test_relocate_moves_same_line_tail() {
        let mut store = store(&[
            Mapping::new(pos(1, 1), pos(1, 1), 4, MappingKind::Identity),
            Mapping::new(pos(1, 10), pos(1, 10), 3, MappingKind::Identifier),
            Mapping::new(pos(2, 1), pos(2, 1), 2, MappingKind::Identity),
        ]);
        // Columns 5..10 of line 1 were replaced by two lines of text.
        store.apply_splice(pos(1, 5), pos(1, 10), "xx\nyyy\nz");
        assert_eq!(store.mappings()[0].generated(), pos(1, 1));
        assert_eq!(store.mappings()[1].generated(), pos(3, 2));
        assert_eq!(store.mappings()[2].generated(), pos(4, 1));
        assert_eq!(store.map_to_original(pos(3, 3)), pos(1, 11));
    }

    #[test]
    fn test_splice_drops_mappings_inside_replaced_range() {
        let mut store = store(&[
            Mapping::new(pos(1, 1), pos(1, 1), 30, MappingKind::Identity),
            Mapping::new(pos(1, 8), pos(1, 8), 4, MappingKind::Expression),
            Mapping::new(pos(1, 13), pos(1, 13), 1, MappingKind::Identifier),
            Mapping::new(pos(1, 16), pos(1, 16), 2, MappingKind::Identifier),
        ]);
        // `Some(x)` at columns 8..15 becomes a much longer composite literal.
        store.apply_splice(pos(1, 8), pos(1, 15), "Option_int{tag: OptionTagSome, some0: &x}");
        let generated: Vec<Position> = store.iter().map(Mapping::generated).collect();
        assert_eq!(generated, vec![pos(1, 1), pos(1, 8), pos(1, 50)]);
        // Nothing claims the middle of the new text for `x`.
        assert!(store.iter().all(|m| m.original() != pos(1, 13)));
        assert_eq!(store.map_to_original(pos(1, 50)), pos(1, 16));
    }

    #[test]
    fn test_splice_drops_lines_inside_multiline_range() {
        let mut store = MappingStore::identity("a {
	b
	c
}
d
");
        store.apply_splice(pos(1, 3), pos(4, 2), "{}");
        let originals: Vec<u32> = store.iter().map(|m| m.original_line).collect();
        assert_eq!(originals, vec![1, 5, 6]);
        assert_eq!(store.map_to_original(pos(2, 1)), pos(5, 1));
    }

    #[test]
    fn test_map_to_generated_inverse() {
        let store = store(&[
            Mapping::new(pos(3, 5), pos(10, 9), 6, MappingKind::Identifier),
            Mapping::marker(pos(4, 1), pos(12, 1)),
        ]);
        assert_eq!(store.map_to_generated(pos(3, 7)), pos(10, 11));
        assert_eq!(store.map_to_generated(pos(4, 9)), pos(12, 1));
        assert_eq!(store.map_to_generated(pos(40, 2)), pos(40, 2));
    }

    #[test]
    fn test_identity_store() {
        let store = MappingStore::identity("package main\n\nfunc main() {}\n");
        assert_eq!(store.len(), 4);
        assert_eq!(store.mappings()[1].length, 0);
        assert_eq!(store.map_to_original(pos(3, 6)), pos(3, 6));
    }
}
