//! Exhaustiveness verification of lowered `match` statements.
//!
//! The rewrite stage turns every `match` into a tagless switch whose
//! initializer binds `__matchN` scrutinees and whose cases test
//! `__matchN.tag == UnionTagVariant`. This plugin reads those switches back
//! into pattern rows, checks them against the registered unions and makes
//! verified matches terminating statements.

use std::collections::HashMap;

use gild_core::{
    CompilationPhase, Diagnostic, ExhaustivenessMode, PassError, Position, TranspileConfig,
};
use gild_syntax::{NodeId, SyntaxTree};

use crate::context::PipelineContext;
use crate::exhaustiveness::{self, ExhaustivenessRequirement, Pattern, Row, TupleMatchSpec, Verdict};
use crate::plugin::{PassFailure, Plugin, Rewrite, SharedContext};

pub const NAME: &str = "match-exhaustiveness";

const SCRUTINEE_PREFIX: &str = "__match";
const UNREACHABLE: &str = "default: panic(\"gild: unreachable match arm\")";

/// What a column's tag tests say about its union.
#[derive(Clone, Debug, PartialEq, Eq)]
enum ColumnUnion {
    Untested,
    Known(String),
    /// Some test names a tag that no registered union declares.
    Foreign,
}

#[derive(Debug)]
struct LoweredMatch {
    spec: TupleMatchSpec,
    requirement: ExhaustivenessRequirement,
    /// Has an unguarded arm matching everything.
    catch_all: bool,
    /// Indentation of the case lines, or `None` when the switch sits on one line.
    case_indent: Option<String>,
}

#[derive(Debug, Default)]
pub struct MatchExhaustiveness {
    matches: HashMap<(usize, usize), LoweredMatch>,
    config: TranspileConfig,
}

/// Scrutinee names of a switch produced by the rewrite stage.
fn scrutinees(tree: &SyntaxTree, switch: NodeId) -> Option<Vec<String>> {
    if tree.child_by_field(switch, "value").is_some() {
        return None;
    }
    let initializer = tree.child_by_field(switch, "initializer")?;
    if !matches!(tree.kind(initializer), "short_var_declaration" | "assignment_statement") {
        return None;
    }
    let left = tree.child_by_field(initializer, "left")?;
    let names: Vec<String> = tree.named_children(left).map(|n| tree.text(n)).collect();
    let lowered = names
        .iter()
        .all(|name| name == "_" || name.starts_with(SCRUTINEE_PREFIX));
    lowered.then_some(names)
}

/// `a && b && c` as `[a, b, c]`.
fn conjuncts(tree: &SyntaxTree, node: NodeId, out: &mut Vec<NodeId>) {
    if tree.kind(node) == "binary_expression"
        && tree
            .child_by_field(node, "operator")
            .is_some_and(|op| tree.text(op) == "&&")
    {
        if let (Some(left), Some(right)) = (
            tree.child_by_field(node, "left"),
            tree.child_by_field(node, "right"),
        ) {
            conjuncts(tree, left, out);
            conjuncts(tree, right, out);
            return;
        }
    }
    out.push(node);
}

/// `__matchK.tag == CONST` as (K, CONST).
fn tag_test(tree: &SyntaxTree, node: NodeId, names: &[String]) -> Option<(usize, String)> {
    if tree.kind(node) != "binary_expression" {
        return None;
    }
    let operator = tree.child_by_field(node, "operator")?;
    if tree.text(operator) != "==" {
        return None;
    }
    let left = tree.child_by_field(node, "left")?;
    let right = tree.child_by_field(node, "right")?;
    if tree.kind(left) != "selector_expression" || tree.kind(right) != "identifier" {
        return None;
    }
    let operand = tree.child_by_field(left, "operand")?;
    let field = tree.child_by_field(left, "field")?;
    if tree.text(field) != "tag" {
        return None;
    }
    let operand = tree.text(operand);
    let column = names.iter().position(|name| *name == operand)?;
    Some((column, tree.text(right)))
}

/// Leading whitespace of the line holding `offset`.
fn indent_at(source: &str, offset: usize) -> &str {
    let start = source[..offset].rfind('\n').map_or(0, |nl| nl + 1);
    let line = &source[start..];
    let width = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..width]
}

/// The unreachable arm placed right after a case ending at the end of `before`.
/// A case may already carry its own terminator.
fn default_arm(before: &str, case_indent: Option<&str>) -> String {
    match (before.chars().next_back(), case_indent) {
        (Some('\n'), Some(indent)) => format!("{indent}{UNREACHABLE}\n"),
        (Some('\n'), None) => format!("{UNREACHABLE}\n"),
        (Some(';'), _) => format!(" {UNREACHABLE};"),
        (_, Some(indent)) => format!("\n{indent}{UNREACHABLE}"),
        (_, None) => format!("; {UNREACHABLE}"),
    }
}

impl MatchExhaustiveness {
    fn read_match(ctx: &PipelineContext<'_>, switch: NodeId, names: &[String]) -> LoweredMatch {
        let tree = ctx.tree();
        let registry = ctx.registry();
        let arity = names.len();
        let mut unions = vec![ColumnUnion::Untested; arity];
        let mut rows = Vec::new();
        let mut first_case = None;

        for case in tree.children(switch) {
            let kind = tree.kind(case);
            if kind != "expression_case" && kind != "default_case" {
                continue;
            }
            first_case.get_or_insert(case);
            let position = ctx.node_position(case);
            let mut patterns = vec![Pattern::Wildcard; arity];
            let mut guarded = false;

            let values: Vec<NodeId> = tree
                .child_by_field(case, "value")
                .map(|list| tree.named_children(list).collect())
                .unwrap_or_default();
            if values.len() > 1 {
                guarded = true;
            }
            let mut parts = Vec::new();
            for value in values {
                conjuncts(tree, value, &mut parts);
            }
            for part in parts {
                if tree.kind(part) == "true" {
                    continue;
                }
                let Some((column, constant)) = tag_test(tree, part, names) else {
                    guarded = true;
                    continue;
                };
                if patterns[column] != Pattern::Wildcard {
                    guarded = true;
                    continue;
                }
                let pattern = match registry.tag_const(&constant) {
                    Some((union, variant)) => {
                        if unions[column] == ColumnUnion::Untested {
                            unions[column] = ColumnUnion::Known(union.to_string());
                        }
                        variant.to_string()
                    }
                    None => {
                        unions[column] = ColumnUnion::Foreign;
                        constant
                    }
                };
                patterns[column] = Pattern::Tag(pattern);
            }

            let mut row = Row::new(patterns).at(position);
            row.guarded = guarded;
            rows.push(row);
        }

        let columns = unions
            .into_iter()
            .map(|union| match union {
                ColumnUnion::Known(name) => registry
                    .union(&name)
                    .map(|union| union.variants.iter().map(|(v, _)| v.clone()).collect()),
                ColumnUnion::Untested | ColumnUnion::Foreign => None,
            })
            .collect();
        let catch_all = rows
            .iter()
            .any(|row| !row.guarded && row.patterns.iter().all(|p| *p == Pattern::Wildcard));

        let switch_start = tree.span(switch).map_or(0, |span| span.start);
        let case_start = first_case
            .and_then(|case| tree.span(case))
            .map_or(switch_start, |span| span.start);
        let source = tree.source();
        let case_indent = source[switch_start..case_start]
            .contains('\n')
            .then(|| indent_at(source, case_start).to_string());

        LoweredMatch {
            spec: TupleMatchSpec { rows },
            requirement: ExhaustivenessRequirement { columns },
            catch_all,
            case_indent,
        }
    }

    fn warn(&self, ctx: &mut PipelineContext<'_>, position: Position, message: String) {
        tracing::warn!(%position, "{message}");
        ctx.report(Diagnostic::warning(CompilationPhase::Transform, Some(position), message));
    }
}

impl Plugin for MatchExhaustiveness {
    fn discover(&mut self, ctx: &mut PipelineContext<'_>) -> Result<(), PassFailure> {
        let tree = ctx.tree();
        for node in tree.pre_order(tree.root()) {
            if tree.kind(node) != "expression_switch_statement" {
                continue;
            }
            let (Some(names), Some(span)) = (scrutinees(tree, node), tree.span(node)) else {
                continue;
            };
            let lowered = Self::read_match(ctx, node, &names);
            self.matches.insert((span.start, span.end), lowered);
        }
        tracing::debug!(matches = self.matches.len(), "lowered matches discovered");
        Ok(())
    }

    fn receive_context(&mut self, shared: &SharedContext<'_>) {
        self.config = shared.config.clone();
    }

    fn transform(&mut self, ctx: &mut PipelineContext<'_>, node: NodeId) -> Result<Rewrite, PassFailure> {
        let Some(span) = ctx.tree().span(node) else {
            return Ok(Rewrite::Unchanged);
        };
        if ctx.tree().kind(node) != "expression_switch_statement" {
            return Ok(Rewrite::Unchanged);
        }
        let Some(lowered) = self.matches.get(&(span.start, span.end)) else {
            return Ok(Rewrite::Unchanged);
        };
        let position = ctx.node_position(node);

        match exhaustiveness::check(&lowered.spec, &lowered.requirement, self.config.combination_ceiling)? {
            Verdict::Exhaustive => {
                if lowered.catch_all || !self.config.unreachable_default {
                    return Ok(Rewrite::Unchanged);
                }
                let children: Vec<NodeId> = ctx.tree().children(node).collect();
                // The arm follows the last case so the gap before `}` keeps its layout.
                let Some(last_case) = children
                    .iter()
                    .rposition(|&c| matches!(ctx.tree().kind(c), "expression_case" | "default_case"))
                else {
                    return Ok(Rewrite::Unchanged);
                };
                let case_end = ctx.tree().span(children[last_case]).map_or(span.start, |s| s.end);
                let text = default_arm(&ctx.tree().source()[..case_end], lowered.case_indent.as_deref());
                let arm = ctx.synthetic("default_case", text)?;
                ctx.insert_child(node, last_case + 1, arm)?;
                Ok(Rewrite::Edited)
            }
            Verdict::Missing {
                combination,
                guarded_row,
            } => {
                let cause = PassError::Exhaustiveness {
                    missing: combination,
                    guarded: guarded_row,
                };
                match self.config.exhaustiveness {
                    ExhaustivenessMode::Error => Err(cause.into()),
                    ExhaustivenessMode::Warn => {
                        self.warn(ctx, position, cause.to_string());
                        Ok(Rewrite::Unchanged)
                    }
                }
            }
            Verdict::Unverifiable { column } => {
                let message = format!(
                    "cannot verify that the match is exhaustive: column {} matches a union not declared in this file",
                    column + 1
                );
                self.warn(ctx, position, message);
                Ok(Rewrite::Unchanged)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gild_core::{DiagnosticSeverity, MappingStore, TranspileErrorKind};
    use gild_syntax::{GoSyntax, StructuralParse, StructuralPrint};

    use crate::pipeline::{TreeOutput, TreePipeline};

    const SHAPES: &str = "package p

// gild:enum Shape Circle/1 Rect/2 Empty/0
type ShapeTag uint8

";

    fn run(body: &str, config: &TranspileConfig) -> gild_core::TranspileResult<(String, TreeOutput)> {
        let source = format!("{SHAPES}{body}");
        let mappings = MappingStore::identity(&source);
        let tree = GoSyntax.parse(&source).unwrap();
        let out = TreePipeline::standard()?.run(tree, config, &mappings, None, &GoSyntax)?;
        let text = GoSyntax.print(&out.tree, &out.declarations).text;
        Ok((text, out))
    }

    #[test]
    fn test_exhaustive_match_gets_unreachable_default() {
        let body = "func f(s Shape) int {
\tswitch __match0 := s; {
\t\tcase __match0.tag == ShapeTagCircle: return 1
\t\tcase __match0.tag == ShapeTagRect: return 2
\t\tcase __match0.tag == ShapeTagEmpty: return 3
\t}
}
";
        let (text, _) = run(body, &TranspileConfig::default()).unwrap();
        assert!(text.contains(
            "\t\tcase __match0.tag == ShapeTagEmpty: return 3\n\t\tdefault: panic(\"gild: unreachable match arm\")\n\t}\n}"
        ));
    }

    #[test]
    fn test_default_arm_follows_case_terminator() {
        assert_eq!(
            default_arm("\t\tcase x: return 3\n", Some("\t\t")),
            format!("\t\t{UNREACHABLE}\n")
        );
        assert_eq!(
            default_arm("\t\tcase x: return 3", Some("\t\t")),
            format!("\n\t\t{UNREACHABLE}")
        );
        assert_eq!(default_arm("case x: d();", None), format!(" {UNREACHABLE};"));
        assert_eq!(default_arm("case x: d()", None), format!("; {UNREACHABLE}"));
    }

    #[test]
    fn test_default_arm_leaves_no_blank_line() {
        let body = "func f(s Shape) int {\n\tswitch __match0 := s; {\n\tcase __match0.tag == ShapeTagCircle: return 1\n\tcase __match0.tag == ShapeTagRect: return 2\n\tcase __match0.tag == ShapeTagEmpty: return 3\n\t}\n}\n";
        let (text, _) = run(body, &TranspileConfig::default()).unwrap();
        assert!(!text.contains("\n\n\tdefault:"));
        assert!(text.contains("return 3\n\tdefault: panic(\"gild: unreachable match arm\")\n\t}\n}"));
    }

    #[test]
    fn test_catch_all_needs_no_default() {
        let body = "func f(s Shape) { switch __match0 := s; { case __match0.tag == ShapeTagCircle: a(); case true: b() } }\n";
        let (text, out) = run(body, &TranspileConfig::default()).unwrap();
        assert!(!text.contains("default:"));
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_single_line_switch_stays_on_one_line() {
        let body = "func f(s Shape) { switch __match0 := s; { case __match0.tag == ShapeTagCircle: a(); case __match0.tag != ShapeTagCircle && true: b(); case __match0.tag == ShapeTagRect: c(); case __match0.tag == ShapeTagEmpty: d() } }\n";
        let (text, _) = run(body, &TranspileConfig::default()).unwrap();
        assert!(text.contains("d(); default: panic(\"gild: unreachable match arm\") } }"));
    }

    #[test]
    fn test_missing_variant_is_an_error() {
        let body = "func f(s Shape) {\n\tswitch __match0 := s; {\n\tcase __match0.tag == ShapeTagCircle: a()\n\tcase __match0.tag == ShapeTagEmpty && ready(): b()\n\t}\n}\n";
        let err = run(body, &TranspileConfig::default()).unwrap_err();
        assert!(matches!(err.kind(), TranspileErrorKind::Transform { plugin, .. } if plugin == NAME));
        assert_eq!(err.position(), Some(Position::new(7, 2)));
        assert_eq!(
            err.pass_error().unwrap().to_string(),
            "non-exhaustive match: missing Rect"
        );
    }

    #[test]
    fn test_guarded_arm_is_reported_in_warn_mode() {
        let body = "func f(s Shape) {\n\tswitch __match0 := s; {\n\tcase __match0.tag == ShapeTagCircle: a()\n\tcase __match0.tag == ShapeTagRect && wide(): b()\n\tcase __match0.tag == ShapeTagRect: b()\n\tcase __match0.tag == ShapeTagEmpty && ready(): c()\n\t}\n}\n";
        let config = TranspileConfig {
            exhaustiveness: ExhaustivenessMode::Warn,
            ..TranspileConfig::default()
        };
        let (text, out) = run(body, &config).unwrap();
        assert!(!text.contains("default:"));
        let [diagnostic] = out.diagnostics.as_slice() else {
            panic!("expected one diagnostic, got {:?}", out.diagnostics);
        };
        assert_eq!(diagnostic.severity, DiagnosticSeverity::Warning);
        assert_eq!(
            diagnostic.message,
            "non-exhaustive match: missing Empty (the arm at 11:2 has a guard and does not count)"
        );
    }

    #[test]
    fn test_tuple_match() {
        let body = "func f(a, b Option_int) {\n\tswitch __match0, __match1 := a, b; {\n\tcase __match0.tag == OptionTagSome && __match1.tag == OptionTagSome: x()\n\tcase __match0.tag == OptionTagNone: y()\n\t}\n}\n";
        let err = run(body, &TranspileConfig::default()).unwrap_err();
        assert_eq!(
            err.pass_error().unwrap().to_string(),
            "non-exhaustive match: missing (Some, None)"
        );
    }

    #[test]
    fn test_foreign_union_is_unverifiable() {
        let body = "func f(t Token) {\n\tswitch __match0 := t; {\n\tcase __match0.tag == TokenTagIdent: a()\n\t}\n}\n";
        let (text, out) = run(body, &TranspileConfig::default()).unwrap();
        assert!(!text.contains("default:"));
        assert_eq!(out.diagnostics.len(), 1);
        assert!(out.diagnostics[0].message.starts_with("cannot verify"));
    }

    #[test]
    fn test_user_switches_are_ignored() {
        let body = "func f(x int) {\n\tswitch y := x; {\n\tcase y > 1: a()\n\t}\n\tswitch x {\n\tcase 1: b()\n\t}\n}\n";
        let (text, out) = run(body, &TranspileConfig::default()).unwrap();
        assert!(!text.contains("default:"));
        assert!(out.diagnostics.is_empty());
    }
}
