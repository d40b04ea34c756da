//! Naming scheme and marker comments shared by both stages.
//!
//! The enum rewriter leaves a `// gild:enum` comment in front of every
//! generated union. The match rewriter reads it to resolve bare variant names,
//! and the tree stage reads it to learn the legal tags of each union.

use serde::{Deserialize, Serialize};

pub const ENUM_MARKER_PREFIX: &str = "// gild:enum ";

/// The generated layout of one tagged union.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumMarker {
    pub name: String,
    /// Variants in declaration order with their payload arity.
    pub variants: Vec<(String, usize)>,
}

impl EnumMarker {
    pub fn new(name: impl Into<String>, variants: Vec<(String, usize)>) -> Self {
        Self {
            name: name.into(),
            variants,
        }
    }

    /// `Option` and `Result`, which exist without a declaration.
    pub fn builtins() -> [EnumMarker; 2] {
        [
            EnumMarker::new("Option", vec![("Some".into(), 1), ("None".into(), 0)]),
            EnumMarker::new("Result", vec![("Ok".into(), 1), ("Err".into(), 1)]),
        ]
    }

    pub fn render(&self) -> String {
        let mut line = format!("{ENUM_MARKER_PREFIX}{}", self.name);
        for (variant, arity) in &self.variants {
            line.push_str(&format!(" {variant}/{arity}"));
        }
        line
    }

    /// Parse one marker line; leading indentation is allowed.
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.trim_start().strip_prefix(ENUM_MARKER_PREFIX)?;
        let mut words = rest.split_whitespace();
        let name = words.next()?.to_string();
        let variants = words
            .map(|word| {
                let (variant, arity) = word.split_once('/')?;
                Some((variant.to_string(), arity.parse().ok()?))
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Self { name, variants })
    }

    /// Every marker in `text`, in order of appearance.
    pub fn scan(text: &str) -> Vec<EnumMarker> {
        text.lines().filter_map(EnumMarker::parse).collect()
    }

    pub fn arity(&self, variant: &str) -> Option<usize> {
        self.variants
            .iter()
            .find(|(name, _)| name == variant)
            .map(|(_, arity)| *arity)
    }
}

/// `ShapeTag`
pub fn tag_type(union: &str) -> String {
    format!("{union}Tag")
}

/// `ShapeTagCircle`
pub fn tag_const(union: &str, variant: &str) -> String {
    format!("{union}Tag{variant}")
}

/// `ShapeCircle`
pub fn constructor_name(union: &str, variant: &str) -> String {
    format!("{union}{variant}")
}

/// `circle0`: the struct field holding payload `index` of `variant`.
pub fn payload_field(variant: &str, index: usize) -> String {
    let mut chars = variant.chars();
    let head: String = chars.next().map(|c| c.to_lowercase().collect()).unwrap_or_default();
    format!("{head}{}{index}", chars.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_roundtrip() {
        let marker = EnumMarker::new("Shape", vec![("Circle".into(), 1), ("Empty".into(), 0)]);
        let line = marker.render();
        assert_eq!(line, "// gild:enum Shape Circle/1 Empty/0");
        assert_eq!(EnumMarker::parse(&format!("\t{line}")), Some(marker));
    }

    #[test]
    fn test_marker_rejects_malformed() {
        assert_eq!(EnumMarker::parse("// gild:enum Shape Circle"), None);
        assert_eq!(EnumMarker::parse("// enum Shape"), None);
    }

    #[test]
    fn test_naming() {
        assert_eq!(tag_const("Shape", "Circle"), "ShapeTagCircle");
        assert_eq!(payload_field("Rect", 1), "rect1");
        assert_eq!(payload_field("Some", 0), "some0");
        assert_eq!(constructor_name("Shape", "Rect"), "ShapeRect");
    }
}
