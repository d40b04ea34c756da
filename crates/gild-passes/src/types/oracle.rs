use std::collections::{HashMap, HashSet};
use std::ops::Range;

use gild_syntax::{NodeId, ParentIndex, SyntaxTree};

use super::GoType;

/// A source of declared types for one file.
///
/// An oracle may decline (return `None`), in which case callers fall back to
/// structural heuristics.
pub trait TypeOracle: Send + Sync {
    fn check(&self, tree: &SyntaxTree) -> Option<TypeFacts>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Binding {
    name: String,
    /// Bytes where the name is in scope.
    visible: Range<usize>,
    ty: GoType,
}

/// Declared names, constants and function result types.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypeFacts {
    bindings: Vec<Binding>,
    constants: HashSet<String>,
    /// Declared functions and their single non-error result, if any.
    functions: HashMap<String, Option<GoType>>,
}

impl TypeFacts {
    pub fn bind(&mut self, name: impl Into<String>, visible: Range<usize>, ty: GoType) {
        self.bindings.push(Binding {
            name: name.into(),
            visible,
            ty,
        });
    }

    pub fn add_constant(&mut self, name: impl Into<String>) {
        self.constants.insert(name.into());
    }

    pub fn add_function(&mut self, name: impl Into<String>, result: Option<GoType>) {
        self.functions.insert(name.into(), result);
    }

    /// The type of `name` as seen at `offset`; the innermost binding wins.
    pub fn lookup(&self, name: &str, offset: usize) -> Option<&GoType> {
        self.bindings
            .iter()
            .filter(|b| b.name == name && b.visible.contains(&offset))
            .max_by_key(|b| b.visible.start)
            .map(|b| &b.ty)
    }

    pub fn is_constant(&self, name: &str) -> bool {
        self.constants.contains(name)
    }

    pub fn is_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// The single non-error result of a declared function.
    pub fn function(&self, name: &str) -> Option<&GoType> {
        self.functions.get(name)?.as_ref()
    }
}

/// Declaration-scan oracle: parameters, named results, `var`/`const` specs,
/// literal short variable declarations and top-level function results.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScopeOracle;

impl TypeOracle for ScopeOracle {
    fn check(&self, tree: &SyntaxTree) -> Option<TypeFacts> {
        let parents = ParentIndex::build(tree);
        let mut facts = TypeFacts::default();
        for node in tree.pre_order(tree.root()) {
            match tree.kind(node) {
                "function_declaration" | "method_declaration" | "func_literal" => {
                    scan_function(tree, node, &mut facts)
                }
                "var_spec" | "const_spec" => scan_spec(tree, &parents, node, &mut facts),
                "short_var_declaration" => scan_short_var(tree, &parents, node, &mut facts),
                _ => {}
            }
        }
        Some(facts)
    }
}

/// Bytes from `node` to the end of its innermost enclosing block.
fn visibility(tree: &SyntaxTree, parents: &ParentIndex, node: NodeId) -> Option<Range<usize>> {
    let start = tree.span(node)?.start;
    let end = parents
        .ancestors(node)
        .find(|&a| tree.kind(a) == "block")
        .and_then(|block| tree.span(block))
        .map_or(tree.source().len(), |span| span.end);
    Some(start..end)
}

fn scan_function(tree: &SyntaxTree, node: NodeId, facts: &mut TypeFacts) {
    let Some(body) = tree.child_by_field(node, "body").and_then(|b| tree.span(b)) else {
        return;
    };
    let lists = ["receiver", "parameters", "result"]
        .into_iter()
        .filter_map(|field| tree.child_by_field(node, field))
        .filter(|&list| tree.kind(list) == "parameter_list");
    for list in lists {
        for param in tree.named_children(list) {
            let Some(ty) = tree.child_by_field(param, "type") else {
                continue;
            };
            let ty = GoType::from_node(tree, ty);
            for name in tree.children_by_field(param, "name") {
                facts.bind(tree.text(name), body.clone(), ty.clone());
            }
        }
    }

    if tree.kind(node) != "function_declaration" {
        return;
    }
    let Some(name) = tree.child_by_field(node, "name") else {
        return;
    };
    let result = tree
        .child_by_field(node, "result")
        .and_then(|result| single_result(tree, result));
    facts.add_function(tree.text(name), result);
}

/// `T` for a result list of `T` or `(T, error)`.
fn single_result(tree: &SyntaxTree, result: NodeId) -> Option<GoType> {
    match tree.kind(result) {
        "parameter_list" => {
            let types: Vec<GoType> = tree
                .named_children(result)
                .flat_map(|param| {
                    let names = tree.children_by_field(param, "name").count().max(1);
                    let ty = tree.child_by_field(param, "type").map(|t| GoType::from_node(tree, t));
                    std::iter::repeat_n(ty, names)
                })
                .collect::<Option<_>>()
                .unwrap_or_default();
            match types.as_slice() {
                [single] => Some(single.clone()),
                [single, last] if *last == GoType::named("error") => Some(single.clone()),
                _ => None,
            }
        }
        _ => Some(GoType::from_node(tree, result)),
    }
}

fn scan_spec(tree: &SyntaxTree, parents: &ParentIndex, node: NodeId, facts: &mut TypeFacts) {
    let constant = tree.kind(node) == "const_spec";
    let declared = tree.child_by_field(node, "type").map(|t| GoType::from_node(tree, t));
    let values: Vec<NodeId> = tree
        .child_by_field(node, "value")
        .map(|list| tree.named_children(list).collect())
        .unwrap_or_default();
    let Some(visible) = visibility(tree, parents, node) else {
        return;
    };
    for (index, name) in tree.children_by_field(node, "name").enumerate() {
        let name = tree.text(name);
        if constant {
            facts.add_constant(name.clone());
        }
        let ty = declared
            .clone()
            .or_else(|| values.get(index).and_then(|&v| literal_type(tree, v)));
        if let Some(ty) = ty {
            facts.bind(name, visible.clone(), ty);
        }
    }
}

fn scan_short_var(tree: &SyntaxTree, parents: &ParentIndex, node: NodeId, facts: &mut TypeFacts) {
    let (Some(left), Some(right)) = (
        tree.child_by_field(node, "left"),
        tree.child_by_field(node, "right"),
    ) else {
        return;
    };
    let names: Vec<NodeId> = tree.named_children(left).collect();
    let values: Vec<NodeId> = tree.named_children(right).collect();
    let Some(visible) = visibility(tree, parents, node) else {
        return;
    };
    if names.len() != values.len() {
        return;
    }
    for (name, value) in names.into_iter().zip(values) {
        if let Some(ty) = literal_type(tree, value) {
            facts.bind(tree.text(name), visible.clone(), ty);
        }
    }
}

/// Types that are evident from the spelling of a value.
fn literal_type(tree: &SyntaxTree, node: NodeId) -> Option<GoType> {
    match tree.kind(node) {
        "int_literal" => Some(GoType::named("int")),
        "float_literal" => Some(GoType::named("float64")),
        "rune_literal" => Some(GoType::named("rune")),
        "interpreted_string_literal" | "raw_string_literal" => Some(GoType::named("string")),
        "true" | "false" => Some(GoType::named("bool")),
        "composite_literal" => tree
            .child_by_field(node, "type")
            .map(|t| GoType::from_node(tree, t)),
        "unary_expression" => {
            let operand = tree.child_by_field(node, "operand")?;
            let is_address = tree
                .child_by_field(node, "operator")
                .is_some_and(|op| tree.text(op) == "&");
            match tree.kind(operand) {
                "composite_literal" if is_address => literal_type(tree, operand).map(GoType::pointer),
                _ => None,
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gild_syntax::{GoSyntax, StructuralParse};

    const SOURCE: &str = "package p

const Limit = 10

var names []string

func load(path string) (*Config, error) {
\tcount := 1
\tvar ratio float64
\t_ = ratio
\treturn nil, nil
}

func other(count string) {
\t_ = count
}
";

    fn facts() -> TypeFacts {
        ScopeOracle.check(&GoSyntax.parse(SOURCE).unwrap()).unwrap()
    }

    #[test]
    fn test_parameters_are_scoped_to_the_body() {
        let facts = facts();
        let inside_load = SOURCE.find("count := 1").unwrap() + 12;
        assert_eq!(facts.lookup("path", inside_load), Some(&GoType::named("string")));
        assert_eq!(facts.lookup("path", 0), None);
        let inside_other = SOURCE.find("_ = count").unwrap();
        assert_eq!(facts.lookup("count", inside_other), Some(&GoType::named("string")));
        assert_eq!(facts.lookup("count", inside_load), Some(&GoType::named("int")));
    }

    #[test]
    fn test_declarations() {
        let facts = facts();
        assert!(facts.is_constant("Limit"));
        assert!(!facts.is_constant("names"));
        let end = SOURCE.len() - 1;
        assert_eq!(
            facts.lookup("names", end),
            Some(&GoType::Slice(Box::new(GoType::named("string"))))
        );
        assert_eq!(facts.lookup("Limit", end), Some(&GoType::named("int")));
        let after_ratio = SOURCE.find("_ = ratio").unwrap();
        assert_eq!(facts.lookup("ratio", after_ratio), Some(&GoType::named("float64")));
    }

    #[test]
    fn test_function_results_drop_the_error() {
        let facts = facts();
        assert_eq!(
            facts.function("load"),
            Some(&GoType::pointer(GoType::named("Config")))
        );
        assert_eq!(facts.function("other"), None);
        assert!(facts.is_function("other"));
        assert!(!facts.is_function("count"));
    }
}
