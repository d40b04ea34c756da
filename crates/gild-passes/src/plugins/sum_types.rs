//! Lowering of the built-in `Option` and `Result` families.
//!
//! `Option[T]` and `Result[T, E]` spellings become generated struct names, the
//! bare constructors `Some`, `None`, `Ok` and `Err` become composite literals of
//! the instantiation their context asks for, and every instantiation used in
//! the file gets its declarations injected.

use std::collections::{BTreeMap, HashMap, HashSet};

use gild_core::marker::{payload_field, tag_const, tag_type};
use gild_core::{EnumMarker, PassError};
use gild_syntax::{Declaration, NodeId, SyntaxTree};

use crate::addressability::address_of;
use crate::context::PipelineContext;
use crate::plugin::{PassFailure, Plugin, Rewrite, SharedContext};
use crate::types::GoType;

pub const NAME: &str = "sum-types";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Constructor {
    Some,
    None,
    Ok,
    Err,
}

impl Constructor {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "Some" => Some(Constructor::Some),
            "None" => Some(Constructor::None),
            "Ok" => Some(Constructor::Ok),
            "Err" => Some(Constructor::Err),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Constructor::Some => "Some",
            Constructor::None => "None",
            Constructor::Ok => "Ok",
            Constructor::Err => "Err",
        }
    }

    fn family(self) -> &'static str {
        match self {
            Constructor::Some | Constructor::None => "Option",
            Constructor::Ok | Constructor::Err => "Result",
        }
    }
}

/// A parsed node, identified by its span and kind so it can be found again
/// after the tree has been edited.
type Key = (usize, usize, &'static str);

fn key(tree: &SyntaxTree, node: NodeId) -> Option<Key> {
    tree.span(node).map(|span| (span.start, span.end, tree.kind(node)))
}

/// The constructor `node` spells, if any: `Some(x)`, `Ok(x)`, `Err(x)` calls
/// with one argument, or a bare `None`.
fn constructor_at(tree: &SyntaxTree, node: NodeId) -> Option<Constructor> {
    match tree.kind(node) {
        "call_expression" => {
            let function = tree.child_by_field(node, "function")?;
            if tree.kind(function) != "identifier" {
                return None;
            }
            let constructor = Constructor::from_name(&tree.text(function))?;
            let arguments = tree.child_by_field(node, "arguments")?;
            let with_payload = constructor != Constructor::None;
            (with_payload && tree.named_children(arguments).count() == 1).then_some(constructor)
        }
        "identifier" if tree.text(node) == "None" => Some(Constructor::None),
        _ => None,
    }
}

fn payload(tree: &SyntaxTree, call: NodeId) -> Option<NodeId> {
    let arguments = tree.child_by_field(call, "arguments")?;
    tree.named_children(arguments).next()
}

/// Result types of the function enclosing `node`, one per value.
fn enclosing_results(ctx: &PipelineContext<'_>, node: NodeId) -> Option<Vec<GoType>> {
    let tree = ctx.tree();
    let function = ctx.ancestors(node).find(|&a| {
        matches!(
            tree.kind(a),
            "function_declaration" | "method_declaration" | "func_literal"
        )
    })?;
    let result = tree.child_by_field(function, "result")?;
    if tree.kind(result) != "parameter_list" {
        return Some(vec![GoType::from_node(tree, result)]);
    }
    let mut types = Vec::new();
    for param in tree.named_children(result) {
        let ty = GoType::from_node(tree, tree.child_by_field(param, "type")?);
        let names = tree.children_by_field(param, "name").count().max(1);
        types.extend(std::iter::repeat_n(ty, names));
    }
    Some(types)
}

/// A composite literal cannot open an `if`, `for` or `switch` header unparenthesised.
fn in_statement_header(ctx: &PipelineContext<'_>, node: NodeId) -> bool {
    let tree = ctx.tree();
    for ancestor in ctx.ancestors(node) {
        match tree.kind(ancestor) {
            "block" | "func_literal" | "literal_value" | "argument_list" => return false,
            "if_statement" | "for_statement" | "expression_switch_statement" | "type_switch_statement" => {
                return true;
            }
            _ => {}
        }
    }
    false
}

#[derive(Debug, Default)]
pub struct SumTypes {
    /// `Option[T]` / `Result[T, E]` spellings to replace.
    types: HashMap<Key, GoType>,
    /// Constructor sites and the instantiation each builds.
    sites: HashMap<Key, (Constructor, GoType)>,
    /// Every instantiation the file needs, by generated name.
    instantiations: BTreeMap<String, GoType>,
    families: Vec<EnumMarker>,
}

impl SumTypes {
    /// Remember `ty` and every family instantiation nested in it.
    fn note(&mut self, ty: &GoType) {
        match ty {
            GoType::Pointer(inner) | GoType::Slice(inner) | GoType::Array(_, inner) => self.note(inner),
            GoType::Map(key, value) => {
                self.note(key);
                self.note(value);
            }
            GoType::Generic(_, args) => {
                if ty.family().is_some() {
                    self.instantiations.insert(ty.mangle(), ty.clone());
                }
                for arg in args {
                    self.note(arg);
                }
            }
            GoType::Named(_) | GoType::Other(_) => {}
        }
    }

    fn is_builtin(ctx: &PipelineContext<'_>, constructor: Constructor) -> bool {
        ctx.registry().is_builtin(constructor.family())
    }

    fn resolve(
        &mut self,
        ctx: &mut PipelineContext<'_>,
        node: NodeId,
        constructor: Constructor,
        resolving: &mut HashSet<Key>,
    ) -> Result<GoType, PassFailure> {
        let tree = ctx.tree();
        let (Some(key), Some(span)) = (key(tree, node), tree.span(node)) else {
            return Err(PassError::invalid("constructor without a source span").into());
        };
        if let Some((_, ty)) = self.sites.get(&key) {
            return Ok(ty.clone());
        }
        if !resolving.insert(key) {
            return Err(PassFailure::at(span.start, PassError::TypeUnavailable(tree.text(node))));
        }
        let resolved = self.infer(ctx, node, constructor, resolving);
        resolving.remove(&key);
        let ty = resolved.map_err(|failure| PassFailure {
            at: failure.at.or(Some(span.start)),
            ..failure
        })?;
        tracing::trace!(constructor = constructor.name(), %ty, "constructor instantiation");
        self.note(&ty);
        self.sites.insert(key, (constructor, ty.clone()));
        Ok(ty)
    }

    fn infer(
        &mut self,
        ctx: &mut PipelineContext<'_>,
        node: NodeId,
        constructor: Constructor,
        resolving: &mut HashSet<Key>,
    ) -> Result<GoType, PassFailure> {
        match self.expected(ctx, node, resolving)? {
            Some(ty) if ty.family().is_some_and(|(family, _)| family == constructor.family()) => Ok(ty),
            Some(ty) if ty.family().is_some() => Err(PassError::invalid(format!(
                "`{}` cannot build a value of type `{ty}`",
                constructor.name()
            ))
            .into()),
            _ => self.from_payload(ctx, node, constructor, resolving),
        }
    }

    /// The type the surrounding code expects at `node`.
    fn expected(
        &mut self,
        ctx: &mut PipelineContext<'_>,
        node: NodeId,
        resolving: &mut HashSet<Key>,
    ) -> Result<Option<GoType>, PassFailure> {
        let Some(parent) = ctx.parent(node) else {
            return Ok(None);
        };
        match ctx.tree().kind(parent) {
            "parenthesized_expression" => self.expected(ctx, parent, resolving),
            "argument_list" => {
                let Some(call) = ctx.parent(parent) else {
                    return Ok(None);
                };
                let outer = match constructor_at(ctx.tree(), call) {
                    Some(outer) if Self::is_builtin(ctx, outer) => outer,
                    _ => return Ok(None),
                };
                // The outer constructor may itself be waiting on this payload.
                Ok(self
                    .resolve(ctx, call, outer, resolving)
                    .ok()
                    .and_then(|ty| ty.payload(outer.name()).cloned()))
            }
            "binary_expression" => {
                let tree = ctx.tree();
                let comparison = tree
                    .child_by_field(parent, "operator")
                    .is_some_and(|op| matches!(tree.text(op).as_str(), "==" | "!="));
                let other = ["left", "right"]
                    .into_iter()
                    .filter_map(|field| tree.child_by_field(parent, field))
                    .find(|&side| side != node);
                match (comparison, other) {
                    (true, Some(other)) => Ok(ctx.type_of(other)),
                    _ => Ok(None),
                }
            }
            "expression_list" => {
                let tree = ctx.tree();
                let Some(index) = tree.named_children(parent).position(|c| c == node) else {
                    return Ok(None);
                };
                let Some(statement) = ctx.parent(parent) else {
                    return Ok(None);
                };
                match tree.kind(statement) {
                    "return_statement" => Ok(enclosing_results(ctx, statement)
                        .and_then(|results| results.get(index).cloned())),
                    "var_spec" => Ok(tree
                        .child_by_field(statement, "type")
                        .map(|ty| GoType::from_node(tree, ty))),
                    "assignment_statement" if tree.child_by_field(statement, "right") == Some(parent) => {
                        let target = tree
                            .child_by_field(statement, "left")
                            .and_then(|left| tree.named_children(left).nth(index));
                        Ok(target.and_then(|target| ctx.type_of(target)))
                    }
                    _ => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    /// The instantiation implied by the payload alone.
    fn from_payload(
        &mut self,
        ctx: &mut PipelineContext<'_>,
        node: NodeId,
        constructor: Constructor,
        resolving: &mut HashSet<Key>,
    ) -> Result<GoType, PassFailure> {
        let argument = match constructor {
            Constructor::Some | Constructor::Ok => payload(ctx.tree(), node),
            Constructor::None | Constructor::Err => None,
        };
        let Some(argument) = argument else {
            return Err(PassError::TypeUnavailable(ctx.tree().text(node)).into());
        };
        let inner = match constructor_at(ctx.tree(), argument) {
            Some(nested) if Self::is_builtin(ctx, nested) => self.resolve(ctx, argument, nested, resolving)?,
            _ => ctx.require_type(argument)?,
        };
        Ok(match constructor {
            Constructor::Ok => GoType::Generic("Result".into(), vec![inner, GoType::named("error")]),
            _ => GoType::Generic("Option".into(), vec![inner]),
        })
    }

    fn family(&self, name: &str) -> Option<&EnumMarker> {
        self.families.iter().find(|marker| marker.name == name)
    }
}

impl Plugin for SumTypes {
    fn discover(&mut self, ctx: &mut PipelineContext<'_>) -> Result<(), PassFailure> {
        let nodes = ctx.tree().pre_order(ctx.tree().root());
        for &node in &nodes {
            let tree = ctx.tree();
            if tree.kind(node) != "generic_type" {
                continue;
            }
            let ty = GoType::from_node(tree, node);
            let builtin = ty
                .family()
                .is_some_and(|(family, _)| ctx.registry().is_builtin(family));
            if let (true, Some(key)) = (builtin, key(tree, node)) {
                self.note(&ty);
                self.types.insert(key, ty);
            }
        }

        let mut resolving = HashSet::new();
        for node in nodes {
            let Some(constructor) = constructor_at(ctx.tree(), node) else {
                continue;
            };
            if Self::is_builtin(ctx, constructor) {
                self.resolve(ctx, node, constructor, &mut resolving)?;
            }
        }
        tracing::debug!(
            types = self.types.len(),
            constructors = self.sites.len(),
            instantiations = self.instantiations.len(),
            "sum types discovered"
        );
        Ok(())
    }

    fn receive_context(&mut self, shared: &SharedContext<'_>) {
        self.families = EnumMarker::builtins()
            .into_iter()
            .filter(|marker| shared.registry.is_builtin(&marker.name))
            .collect();
    }

    fn transform(&mut self, ctx: &mut PipelineContext<'_>, node: NodeId) -> Result<Rewrite, PassFailure> {
        let Some(key) = key(ctx.tree(), node) else {
            return Ok(Rewrite::Unchanged);
        };
        if let Some(ty) = self.types.get(&key) {
            let name = ctx.synthetic("type_identifier", ty.mangle())?;
            ctx.replace(node, name)?;
            return Ok(Rewrite::Replaced(name));
        }
        let Some((constructor, ty)) = self.sites.get(&key).cloned() else {
            return Ok(Rewrite::Unchanged);
        };

        let family = constructor.family();
        let tag = tag_const(family, constructor.name());
        let literal = match constructor {
            Constructor::None => format!("{ty}{{tag: {tag}}}"),
            _ => {
                let (Some(argument), Some(payload_ty)) =
                    (payload(ctx.tree(), node), ty.payload(constructor.name()))
                else {
                    return Err(PassError::invalid(format!("`{}` needs one payload", constructor.name())).into());
                };
                let address = address_of(ctx, argument, payload_ty)?;
                let field = payload_field(constructor.name(), 0);
                format!("{ty}{{tag: {tag}, {field}: {address}}}")
            }
        };
        let literal = if in_statement_header(ctx, node) {
            format!("({literal})")
        } else {
            literal
        };
        let replacement = ctx.synthetic("composite_literal", literal)?;
        ctx.replace(node, replacement)?;
        Ok(Rewrite::Replaced(replacement))
    }

    fn declarations(&mut self, _ctx: &mut PipelineContext<'_>) -> Result<Vec<Declaration>, PassFailure> {
        let mut out = Vec::new();
        for marker in &self.families {
            if self.instantiations.values().any(|ty| ty.family().is_some_and(|(f, _)| f == marker.name)) {
                out.push(family_declaration(marker));
            }
        }
        for ty in self.instantiations.values() {
            let Some((family, _)) = ty.family() else {
                continue;
            };
            let marker = self
                .family(family)
                .ok_or_else(|| PassError::invalid(format!("`{family}` is not a built-in family here")))?;
            out.push(instance_declaration(marker, ty));
        }
        Ok(out)
    }
}

/// `type OptionTag uint8` and its tag constants.
fn family_declaration(marker: &EnumMarker) -> Declaration {
    let tag = tag_type(&marker.name);
    let mut text = format!("type {tag} uint8\n\nconst (\n");
    for (index, (variant, _)) in marker.variants.iter().enumerate() {
        let name = tag_const(&marker.name, variant);
        if index == 0 {
            text.push_str(&format!("\t{name} {tag} = iota\n"));
        } else {
            text.push_str(&format!("\t{name}\n"));
        }
    }
    text.push(')');
    Declaration::new(tag, text)
}

/// The struct, predicates and accessors of one instantiation.
fn instance_declaration(marker: &EnumMarker, ty: &GoType) -> Declaration {
    let name = ty.mangle();
    let tag = tag_type(&marker.name);
    let payloads: Vec<(&str, String, &GoType)> = marker
        .variants
        .iter()
        .filter(|(_, arity)| *arity == 1)
        .filter_map(|(variant, _)| {
            ty.payload(variant)
                .map(|payload| (variant.as_str(), payload_field(variant, 0), payload))
        })
        .collect();

    let mut text = format!("type {name} struct {{\n\ttag {tag}\n");
    for (_, field, payload) in &payloads {
        text.push_str(&format!("\t{field} *{payload}\n"));
    }
    text.push('}');

    for (variant, _) in &marker.variants {
        text.push_str(&format!(
            "\n\nfunc (v {name}) Is{variant}() bool {{\n\treturn v.tag == {}\n}}",
            tag_const(&marker.name, variant)
        ));
    }

    let accessors = ["Unwrap", "UnwrapErr"];
    for (index, (variant, field, payload)) in payloads.iter().enumerate() {
        let (Some(accessor), Some(other)) = (
            accessors.get(index),
            marker.variants.iter().map(|(v, _)| v).find(|v| v != variant),
        ) else {
            continue;
        };
        text.push_str(&format!(
            "\n\nfunc (v {name}) {accessor}() {payload} {{\n\tif v.tag != {} {{\n\t\tpanic(\"gild: {accessor} on {other}\")\n\t}}\n\treturn *v.{field}\n}}",
            tag_const(&marker.name, variant)
        ));
    }
    Declaration::new(name, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gild_core::{MappingStore, TranspileConfig, TranspileErrorKind};
    use gild_syntax::{GoSyntax, StructuralParse, StructuralPrint};

    use crate::pipeline::TreePipeline;
    use crate::types::ScopeOracle;

    fn lower(source: &str) -> Result<String, gild_core::TranspileError> {
        let config = TranspileConfig::default();
        let mappings = MappingStore::identity(source);
        let tree = GoSyntax.parse(source).unwrap();
        let out = TreePipeline::standard()?.run(
            tree,
            &config,
            &mappings,
            Some(std::sync::Arc::new(ScopeOracle)),
            &GoSyntax,
        )?;
        Ok(GoSyntax.print(&out.tree, &out.declarations).text)
    }

    #[test]
    fn test_option_lowering() {
        let out = lower("package p\n\nfunc find(xs []int) Option[int] {\n\tif len(xs) == 0 {\n\t\treturn None\n\t}\n\treturn Some(xs[0])\n}\n").unwrap();
        insta::assert_snapshot!(out, @r#"
        package p

        type OptionTag uint8

        const (
        	OptionTagSome OptionTag = iota
        	OptionTagNone
        )

        type Option_int struct {
        	tag OptionTag
        	some0 *int
        }

        func (v Option_int) IsSome() bool {
        	return v.tag == OptionTagSome
        }

        func (v Option_int) IsNone() bool {
        	return v.tag == OptionTagNone
        }

        func (v Option_int) Unwrap() int {
        	if v.tag != OptionTagSome {
        		panic("gild: Unwrap on None")
        	}
        	return *v.some0
        }

        func find(xs []int) Option_int {
        	if len(xs) == 0 {
        		return Option_int{tag: OptionTagNone}
        	}
        	return Option_int{tag: OptionTagSome, some0: &xs[0]}
        }
        "#);
    }

    #[test]
    fn test_result_from_return_type() {
        let out = lower("package p\n\nfunc parse(s string) Result[int, error] {\n\tif s == \"\" {\n\t\treturn Err(errEmpty)\n\t}\n\treturn Ok(len(s))\n}\n").unwrap();
        assert!(out.contains("return Result_int_error{tag: ResultTagErr, err0: &errEmpty}"));
        assert!(out.contains("return Result_int_error{tag: ResultTagOk, ok0: func() *int { __addr0 := len(s); return &__addr0 }()}"));
        assert!(out.contains("func (v Result_int_error) UnwrapErr() error {\n\tif v.tag != ResultTagErr {\n\t\tpanic(\"gild: UnwrapErr on Ok\")"));
        assert!(out.contains("type ResultTag uint8"));
        assert!(!out.contains("OptionTag"));
    }

    #[test]
    fn test_nested_constructors_from_payload() {
        let out = lower("package p\n\nvar v = Some(Some(1.5))\n").unwrap();
        assert!(out.contains(
            "var v = Option_Option_float64{tag: OptionTagSome, some0: func() *Option_float64 { __addr1 := Option_float64{tag: OptionTagSome, some0: func() *float64 { __addr0 := float64(1.5); return &__addr0 }()}; return &__addr1 }()}"
        ));
        assert!(out.contains("type Option_float64 struct"));
        assert!(out.contains("type Option_Option_float64 struct {\n\ttag OptionTag\n\tsome0 *Option_float64\n}"));
    }

    #[test]
    fn test_typed_var_and_header_parentheses() {
        let out = lower("package p\n\nvar empty Option[string] = None\n\nfunc f(o Option[string]) {\n\tif o == None {\n\t}\n}\n").unwrap();
        assert!(out.contains("var empty Option_string = Option_string{tag: OptionTagNone}"));
        assert!(out.contains("func f(o Option_string) {\n\tif o == (Option_string{tag: OptionTagNone}) {"));
    }

    #[test]
    fn test_unknown_instantiation_fails() {
        let err = lower("package p\n\nfunc f() {\n\tg(None)\n}\n").unwrap_err();
        assert!(matches!(
            err.kind(),
            TranspileErrorKind::Discovery { plugin, cause: PassError::TypeUnavailable(name), .. }
                if plugin == NAME && name == "None"
        ));
        assert_eq!(err.position(), Some(gild_core::Position::new(4, 4)));
    }

    #[test]
    fn test_user_union_named_option_is_left_alone() {
        let source = "package p\n\n// gild:enum Option Present/1 Absent/0\ntype OptionTag uint8\n\nvar o Option[int]\n";
        let out = lower(source).unwrap();
        assert!(out.contains("var o Option[int]"));
        assert!(!out.contains("Option_int"));
    }
}
