//! Byte-range edits and mapping composition.
//!
//! A rewriter describes its output as a set of non-overlapping [`Edit`]s over
//! its input. [`apply_edits`] produces the new text and the new mapping store:
//!
//! ```text
//! incoming mappings ──split around edits──► surviving identity fragments ┐
//! edit anchors ──resolved through incoming──► new construct mappings     ├─► MappingStore
//! ```

use std::ops::Range;

use gild_core::{LineIndex, Mapping, MappingKind, MappingStore, Position};

use crate::error::RewriteError;

/// Links a span of replacement text back to a byte offset of the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Anchor {
    /// Offset into the rewriter's input.
    pub source: usize,
    /// Offset into the edit's replacement text.
    pub output: usize,
    pub length: u32,
    pub kind: MappingKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edit {
    pub range: Range<usize>,
    pub replacement: String,
    pub anchors: Vec<Anchor>,
}

impl Edit {
    pub fn replace(range: Range<usize>, replacement: impl Into<String>) -> Self {
        Self {
            range,
            replacement: replacement.into(),
            anchors: Vec::new(),
        }
    }

    pub fn delete(range: Range<usize>) -> Self {
        Self::replace(range, "")
    }
}

/// Builds replacement text while recording anchors.
#[derive(Debug, Default)]
pub struct Emitter {
    text: String,
    anchors: Vec<Anchor>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generated scaffolding with no source counterpart.
    pub fn push(&mut self, text: &str) -> &mut Self {
        self.text.push_str(text);
        self
    }

    /// Text copied from the input at `source`.
    pub fn copy(&mut self, text: &str, source: usize, kind: MappingKind) -> &mut Self {
        self.mapped(text, source, text.len(), kind)
    }

    /// Text standing in for `source_len` bytes of input at `source`.
    pub fn mapped(&mut self, text: &str, source: usize, source_len: usize, kind: MappingKind) -> &mut Self {
        self.anchors.push(Anchor {
            source,
            output: self.text.len(),
            length: text.len().min(source_len) as u32,
            kind,
        });
        self.text.push_str(text);
        self
    }

    /// Single-point anchor at the current output position.
    pub fn marker(&mut self, source: usize) -> &mut Self {
        self.anchors.push(Anchor {
            source,
            output: self.text.len(),
            length: 1,
            kind: MappingKind::Marker,
        });
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn finish(self, range: Range<usize>) -> Edit {
        Edit {
            range,
            replacement: self.text,
            anchors: self.anchors,
        }
    }
}

/// Untouched input bytes and where they landed in the output.
struct Segment {
    input: Range<usize>,
    output_start: usize,
}

impl Segment {
    fn output_of(&self, input_offset: usize) -> usize {
        self.output_start + (input_offset - self.input.start)
    }
}

/// Apply `edits` to `input`, composing `incoming` into the new mapping store.
pub fn apply_edits(
    input: &str,
    mut edits: Vec<Edit>,
    incoming: &MappingStore,
) -> Result<(String, MappingStore), RewriteError> {
    edits.sort_by_key(|edit| edit.range.start);

    let mut output = String::with_capacity(input.len());
    let mut segments = Vec::with_capacity(edits.len() + 1);
    let mut edit_starts = Vec::with_capacity(edits.len());
    let mut cursor = 0;
    for edit in &edits {
        if edit.range.start < cursor {
            return Err(RewriteError::syntax(
                edit.range.start,
                "overlapping rewrites of the same source text",
            ));
        }
        segments.push(Segment {
            input: cursor..edit.range.start,
            output_start: output.len(),
        });
        output.push_str(&input[cursor..edit.range.start]);
        edit_starts.push(output.len());
        output.push_str(&edit.replacement);
        cursor = edit.range.end;
    }
    segments.push(Segment {
        input: cursor..input.len(),
        output_start: output.len(),
    });
    output.push_str(&input[cursor..]);

    let input_index = LineIndex::new(input);
    let output_index = LineIndex::new(&output);
    let mut mappings = Vec::with_capacity(incoming.len() + edits.len() * 4);

    for mapping in incoming.iter() {
        let Some(start) = input_index.offset(mapping.generated()) else {
            continue;
        };
        if mapping.length == 0 {
            let surviving = segments.iter().find(|s| {
                s.input.contains(&start) || (start == input.len() && s.input.end == start)
            });
            if let Some(segment) = surviving {
                let generated = output_index.position(segment.output_of(start));
                mappings.push(Mapping::new(mapping.original(), generated, 0, mapping.kind));
            }
            continue;
        }
        let end = start + mapping.length as usize;
        let first = segments.partition_point(|s| s.input.end <= start);
        for segment in segments[first..].iter().take_while(|s| s.input.start < end) {
            let from = start.max(segment.input.start);
            let to = end.min(segment.input.end);
            if from >= to {
                continue;
            }
            let original = Position::new(
                mapping.original_line,
                mapping.original_column + (from - start) as u32,
            );
            let generated = output_index.position(segment.output_of(from));
            mappings.push(Mapping::new(original, generated, (to - from) as u32, mapping.kind));
        }
    }

    for (edit, &edit_start) in edits.iter().zip(&edit_starts) {
        for anchor in &edit.anchors {
            let original = incoming.map_to_original(input_index.position(anchor.source));
            let at = edit_start + anchor.output;
            let line_end = output[at..].find('\n').map_or(output.len(), |nl| at + nl);
            let length = if anchor.kind == MappingKind::Marker {
                1
            } else {
                (anchor.length as usize).min(line_end - at) as u32
            };
            mappings.push(Mapping::new(
                original,
                output_index.position(at),
                length,
                anchor.kind,
            ));
        }
    }

    Ok((output, mappings.into_iter().collect()))
}
