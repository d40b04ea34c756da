//! Type facts for the tree stage.
//!
//! [`TypeFactCache`] answers `type_of(node)` once per node per file. It asks
//! the optional [`TypeOracle`] first (run lazily, at most once) and falls back
//! to structural heuristics. It also owns the [`SyntheticRegistry`] of unions,
//! tag constants and constructors produced by the rewrite stage.

mod oracle;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use gild_core::marker::{constructor_name, tag_const, tag_type};
use gild_core::{EnumMarker, PassError};
use gild_syntax::{NodeId, SyntaxTree};

pub use oracle::{ScopeOracle, TypeFacts, TypeOracle};

/// A Go type, as far as the transpiler needs to know it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GoType {
    /// `int`, `Shape`, `pkg.T`
    Named(String),
    Pointer(Box<GoType>),
    Slice(Box<GoType>),
    Array(String, Box<GoType>),
    Map(Box<GoType>, Box<GoType>),
    /// `Option[int]`, `Result[T, E]`
    Generic(String, Vec<GoType>),
    /// Function, channel, interface and struct types, kept verbatim.
    Other(String),
}

const BASIC: &[&str] = &[
    "bool", "string", "int", "int8", "int16", "int32", "int64", "uint", "uint8", "uint16", "uint32",
    "uint64", "uintptr", "float32", "float64", "complex64", "complex128", "byte", "rune", "error", "any",
];

impl GoType {
    pub fn named(name: impl Into<String>) -> Self {
        GoType::Named(name.into())
    }

    pub fn pointer(inner: GoType) -> Self {
        GoType::Pointer(Box::new(inner))
    }

    /// Read a type expression node.
    pub fn from_node(tree: &SyntaxTree, node: NodeId) -> GoType {
        let text = || tree.text(node);
        let field = |name| tree.child_by_field(node, name).map(|n| GoType::from_node(tree, n));
        match tree.kind(node) {
            "type_identifier" | "identifier" | "qualified_type" => GoType::Named(text()),
            "pointer_type" => match tree.named_children(node).next() {
                Some(inner) => GoType::pointer(GoType::from_node(tree, inner)),
                None => GoType::Other(text()),
            },
            "slice_type" => match field("element") {
                Some(element) => GoType::Slice(Box::new(element)),
                None => GoType::Other(text()),
            },
            "array_type" => match (tree.child_by_field(node, "length"), field("element")) {
                (Some(length), Some(element)) => GoType::Array(tree.text(length), Box::new(element)),
                _ => GoType::Other(text()),
            },
            "map_type" => match (field("key"), field("value")) {
                (Some(key), Some(value)) => GoType::Map(Box::new(key), Box::new(value)),
                _ => GoType::Other(text()),
            },
            "parenthesized_type" | "type_elem" => match tree.named_children(node).next() {
                Some(inner) => GoType::from_node(tree, inner),
                None => GoType::Other(text()),
            },
            "generic_type" => {
                let (Some(base), Some(args)) = (
                    tree.child_by_field(node, "type"),
                    tree.child_by_field(node, "type_arguments"),
                ) else {
                    return GoType::Other(text());
                };
                let args = tree
                    .named_children(args)
                    .map(|arg| GoType::from_node(tree, arg))
                    .collect();
                GoType::Generic(tree.text(base), args)
            }
            _ => GoType::Other(text()),
        }
    }

    pub fn is_basic(&self) -> bool {
        matches!(self, GoType::Named(name) if BASIC.contains(&name.as_str()))
    }

    /// `Option[T]` or `Result[T, E]`.
    pub fn family(&self) -> Option<(&str, &[GoType])> {
        match self {
            GoType::Generic(name, args)
                if (name == "Option" && args.len() == 1) || (name == "Result" && args.len() == 2) =>
            {
                Some((name.as_str(), args.as_slice()))
            }
            _ => None,
        }
    }

    /// Identifier-safe spelling: `ptr_T`, `slice_T`, `map_K_V`, `pkg_T`, `Option_T`.
    pub fn mangle(&self) -> String {
        match self {
            GoType::Named(name) => name.replace('.', "_"),
            GoType::Pointer(inner) => format!("ptr_{}", inner.mangle()),
            GoType::Slice(inner) => format!("slice_{}", inner.mangle()),
            GoType::Array(length, inner) => format!("arr{length}_{}", inner.mangle()),
            GoType::Map(key, value) => format!("map_{}_{}", key.mangle(), value.mangle()),
            GoType::Generic(name, args) => {
                let mut out = name.clone();
                for arg in args {
                    out.push('_');
                    out.push_str(&arg.mangle());
                }
                out
            }
            GoType::Other(text) => text
                .chars()
                .map(|c| if c.is_alphanumeric() { c } else { '_' })
                .collect(),
        }
    }

    /// Payload type of `variant` in an `Option`/`Result` instantiation.
    pub fn payload(&self, variant: &str) -> Option<&GoType> {
        match (self.family()?, variant) {
            (("Option", [inner]), "Some") => Some(inner),
            (("Result", [ok, _]), "Ok") => Some(ok),
            (("Result", [_, err]), "Err") => Some(err),
            _ => None,
        }
    }
}

/// Go spelling, with `Option`/`Result` instantiations written as their generated names.
impl fmt::Display for GoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoType::Named(name) | GoType::Other(name) => f.write_str(name),
            GoType::Pointer(inner) => write!(f, "*{inner}"),
            GoType::Slice(inner) => write!(f, "[]{inner}"),
            GoType::Array(length, inner) => write!(f, "[{length}]{inner}"),
            GoType::Map(key, value) => write!(f, "map[{key}]{value}"),
            GoType::Generic(..) if self.family().is_some() => f.write_str(&self.mangle()),
            GoType::Generic(name, args) => {
                write!(f, "{name}[")?;
                for (index, arg) in args.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Unions known in this file and the names generated for them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyntheticRegistry {
    unions: Vec<EnumMarker>,
    /// `ShapeTagCircle` → (`Shape`, `Circle`)
    tag_consts: HashMap<String, (String, String)>,
    /// `ShapeCircle` → `Shape`
    constructors: HashMap<String, String>,
    builtin: Vec<String>,
}

impl SyntheticRegistry {
    /// Register a union declared in this file. A later declaration of the same name wins.
    pub fn register_union(&mut self, marker: EnumMarker) {
        self.unions.retain(|u| u.name != marker.name);
        self.builtin.retain(|name| *name != marker.name);
        for (variant, _) in &marker.variants {
            self.tag_consts.insert(
                tag_const(&marker.name, variant),
                (marker.name.clone(), variant.clone()),
            );
            self.constructors
                .insert(constructor_name(&marker.name, variant), marker.name.clone());
        }
        self.unions.push(marker);
    }

    /// Register `Option` and `Result` unless the file declares unions of those names.
    pub fn register_builtins(&mut self) {
        for marker in EnumMarker::builtins() {
            if self.union(&marker.name).is_none() {
                let name = marker.name.clone();
                self.register_union(marker);
                self.builtin.push(name);
            }
        }
    }

    pub fn union(&self, name: &str) -> Option<&EnumMarker> {
        self.unions.iter().find(|u| u.name == name)
    }

    pub fn unions(&self) -> &[EnumMarker] {
        &self.unions
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtin.iter().any(|b| b == name)
    }

    /// (union, variant) named by a tag constant.
    pub fn tag_const(&self, name: &str) -> Option<(&str, &str)> {
        self.tag_consts
            .get(name)
            .map(|(union, variant)| (union.as_str(), variant.as_str()))
    }

    /// The union a generated constructor function builds.
    pub fn constructor(&self, name: &str) -> Option<&str> {
        self.constructors.get(name).map(String::as_str)
    }
}

/// Memoised per-file type queries.
pub struct TypeFactCache {
    oracle: Option<Arc<dyn TypeOracle>>,
    facts: Option<TypeFacts>,
    oracle_ran: bool,
    memo: HashMap<NodeId, Option<GoType>>,
    registry: SyntheticRegistry,
}

impl TypeFactCache {
    pub fn new(oracle: Option<Arc<dyn TypeOracle>>) -> Self {
        Self {
            oracle,
            facts: None,
            oracle_ran: false,
            memo: HashMap::new(),
            registry: SyntheticRegistry::default(),
        }
    }

    pub fn registry(&self) -> &SyntheticRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SyntheticRegistry {
        &mut self.registry
    }

    fn facts(&mut self, tree: &SyntaxTree) -> Option<&TypeFacts> {
        if !self.oracle_ran {
            self.oracle_ran = true;
            self.facts = self.oracle.as_ref().and_then(|oracle| oracle.check(tree));
            tracing::debug!(available = self.facts.is_some(), "type oracle");
        }
        self.facts.as_ref()
    }

    /// True when `name` names a constant or a generated tag.
    pub fn is_constant(&mut self, tree: &SyntaxTree, name: &str) -> bool {
        self.registry.tag_const(name).is_some()
            || self.facts(tree).is_some_and(|facts| facts.is_constant(name))
    }

    /// True when `name` names a function declared in the file or a generated constructor.
    pub fn is_function(&mut self, tree: &SyntaxTree, name: &str) -> bool {
        self.registry.constructor(name).is_some()
            || self.facts(tree).is_some_and(|facts| facts.is_function(name))
    }

    pub fn type_of(&mut self, tree: &SyntaxTree, node: NodeId) -> Option<GoType> {
        if let Some(known) = self.memo.get(&node) {
            return known.clone();
        }
        let found = self.compute(tree, node);
        self.memo.insert(node, found.clone());
        found
    }

    pub fn require_type(&mut self, tree: &SyntaxTree, node: NodeId) -> Result<GoType, PassError> {
        self.type_of(tree, node)
            .ok_or_else(|| PassError::TypeUnavailable(tree.text(node)))
    }

    fn compute(&mut self, tree: &SyntaxTree, node: NodeId) -> Option<GoType> {
        let offset = tree.span(node).map(|span| span.start);
        match tree.kind(node) {
            "int_literal" => Some(GoType::named("int")),
            "float_literal" => Some(GoType::named("float64")),
            "imaginary_literal" => Some(GoType::named("complex128")),
            "rune_literal" => Some(GoType::named("rune")),
            "interpreted_string_literal" | "raw_string_literal" => Some(GoType::named("string")),
            "true" | "false" => Some(GoType::named("bool")),
            "composite_literal" => tree
                .child_by_field(node, "type")
                .map(|ty| GoType::from_node(tree, ty)),
            "parenthesized_expression" => {
                let inner = tree.named_children(node).next()?;
                self.type_of(tree, inner)
            }
            "identifier" => {
                let name = tree.text(node);
                if let Some((union, _)) = self.registry.tag_const(&name) {
                    return Some(GoType::Named(tag_type(union)));
                }
                let offset = offset?;
                self.facts(tree)?.lookup(&name, offset).cloned()
            }
            "unary_expression" => {
                let operator = tree.child_by_field(node, "operator").map(|op| tree.text(op))?;
                let operand = tree.child_by_field(node, "operand")?;
                match operator.as_str() {
                    "!" => Some(GoType::named("bool")),
                    "&" => self.type_of(tree, operand).map(GoType::pointer),
                    "*" => match self.type_of(tree, operand)? {
                        GoType::Pointer(inner) => Some(*inner),
                        _ => None,
                    },
                    "-" | "+" | "^" => self.type_of(tree, operand),
                    _ => None,
                }
            }
            "binary_expression" => {
                let operator = tree.child_by_field(node, "operator").map(|op| tree.text(op))?;
                match operator.as_str() {
                    "==" | "!=" | "<" | "<=" | ">" | ">=" | "&&" | "||" => Some(GoType::named("bool")),
                    "<<" | ">>" => self.type_of(tree, tree.child_by_field(node, "left")?),
                    _ => {
                        let left = tree.child_by_field(node, "left")?;
                        let right = tree.child_by_field(node, "right")?;
                        self.type_of(tree, left).or_else(|| self.type_of(tree, right))
                    }
                }
            }
            "index_expression" => {
                let operand = tree.child_by_field(node, "operand")?;
                match self.type_of(tree, operand)? {
                    GoType::Slice(element) | GoType::Array(_, element) => Some(*element),
                    GoType::Map(_, value) => Some(*value),
                    GoType::Named(name) if name == "string" => Some(GoType::named("byte")),
                    _ => None,
                }
            }
            "call_expression" => self.call_type(tree, node),
            _ => None,
        }
    }

    fn call_type(&mut self, tree: &SyntaxTree, node: NodeId) -> Option<GoType> {
        let function = tree.child_by_field(node, "function")?;
        let arguments = tree.child_by_field(node, "arguments")?;
        let first_argument = tree.named_children(arguments).next();
        match tree.kind(function) {
            "identifier" => {
                let name = tree.text(function);
                match name.as_str() {
                    "new" => Some(GoType::pointer(GoType::from_node(tree, first_argument?))),
                    "len" | "cap" | "copy" => Some(GoType::named("int")),
                    _ if BASIC.contains(&name.as_str()) => Some(GoType::Named(name.clone())),
                    _ => {
                        if let Some(union) = self.registry.constructor(&name) {
                            return Some(GoType::named(union));
                        }
                        self.facts(tree)?.function(&name).cloned()
                    }
                }
            }
            // Conversions: `[]byte(s)`, `(*T)(p)`, `map[K]V(m)`.
            "parenthesized_expression" | "slice_type" | "array_type" | "map_type" | "pointer_type" => {
                let ty = match tree.kind(function) {
                    "parenthesized_expression" => tree.named_children(function).next()?,
                    _ => function,
                };
                match tree.kind(ty) {
                    "identifier" | "type_identifier" | "unary_expression" | "pointer_type" | "slice_type"
                    | "array_type" | "map_type" | "qualified_type" => {
                        let text = tree.text(ty);
                        match text.strip_prefix('*') {
                            Some(inner) => Some(GoType::pointer(GoType::Named(inner.trim().to_string()))),
                            None => Some(GoType::from_node(tree, ty)),
                        }
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }
}
