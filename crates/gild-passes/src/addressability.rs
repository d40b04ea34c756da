//! Addressability of constructor payloads.
//!
//! Union payload fields are pointers, so a payload expression is stored by
//! address. Addressable operands are taken with `&`; everything else is first
//! copied into a fresh local by an immediately invoked closure, which keeps
//! the expression evaluated exactly once and in place.

use gild_core::PassError;
use gild_syntax::{NodeId, SyntaxTree};

use crate::context::PipelineContext;
use crate::types::{GoType, TypeFactCache};

const PREDECLARED_VALUES: &[&str] = &["_", "nil", "true", "false", "iota"];

/// True when `&node` is legal Go.
pub fn classify(tree: &SyntaxTree, node: NodeId, types: &mut TypeFactCache) -> bool {
    match tree.kind(node) {
        "identifier" => {
            let name = tree.text(node);
            !PREDECLARED_VALUES.contains(&name.as_str())
                && !types.is_constant(tree, &name)
                && !types.is_function(tree, &name)
        }
        "unary_expression" => tree
            .child_by_field(node, "operator")
            .is_some_and(|op| tree.text(op) == "*"),
        "selector_expression" => tree
            .child_by_field(node, "operand")
            .is_some_and(|operand| classify(tree, operand, types)),
        "index_expression" => {
            let Some(operand) = tree.child_by_field(node, "operand") else {
                return false;
            };
            match types.type_of(tree, operand) {
                Some(GoType::Slice(_)) => true,
                Some(GoType::Array(..)) => classify(tree, operand, types),
                _ => false,
            }
        }
        "parenthesized_expression" => tree
            .named_children(node)
            .next()
            .is_some_and(|inner| classify(tree, inner, types)),
        _ => false,
    }
}

/// An untyped constant needs a conversion before `:=` gives it type `T`.
fn is_untyped_constant(tree: &SyntaxTree, node: NodeId, types: &mut TypeFactCache) -> bool {
    match tree.kind(node) {
        "int_literal" | "float_literal" | "imaginary_literal" | "rune_literal"
        | "interpreted_string_literal" | "raw_string_literal" | "true" | "false" => true,
        "identifier" => types.is_constant(tree, &tree.text(node)),
        "parenthesized_expression" | "unary_expression" | "binary_expression" => tree
            .named_children(node)
            .all(|child| is_untyped_constant(tree, child, types)),
        _ => false,
    }
}

fn conversion(ty: &GoType, expr: &str) -> String {
    let ty = ty.to_string();
    let needs_parens = ["*", "func", "<-", "chan"].iter().any(|p| ty.starts_with(p));
    if needs_parens {
        format!("({ty})({expr})")
    } else {
        format!("{ty}({expr})")
    }
}

/// Go text for a `*T` pointing at the value of `node`.
pub fn address_of(ctx: &mut PipelineContext<'_>, node: NodeId, ty: &GoType) -> Result<String, PassError> {
    let (tree, types) = ctx.types();
    let text = tree.text(node);
    if text.is_empty() {
        return Err(PassError::invalid("empty constructor payload"));
    }
    if classify(tree, node, types) {
        return Ok(format!("&{text}"));
    }
    let value = if is_untyped_constant(tree, node, types) {
        conversion(ty, &text)
    } else {
        text
    };
    let name = ctx.fresh_name("addr");
    tracing::trace!(%name, "payload copied to a temporary");
    Ok(format!("func() *{ty} {{ {name} := {value}; return &{name} }}()"))
}
