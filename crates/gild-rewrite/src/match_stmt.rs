//! `match` statements.
//!
//! ```text
//! match shape {                        switch __match0 := shape; {
//!     Circle(r) => area(r)       ─►        case __match0.tag == ShapeTagCircle: r := *__match0.circle0; _ = r; area(r)
//!     _ => 0                               case true: 0
//! }                                    }
//! ```
//!
//! Tuple scrutinees `match (a, b)` bind one `__matchN` per element and join
//! the per-column tag tests with `&&`. A bare `_` or a lone name in a tuple
//! match covers every column. Variant names are resolved against the
//! `// gild:enum` markers in the file plus the builtin `Option` and `Result`.

use std::ops::Range;

use gild_core::marker::{EnumMarker, payload_field, tag_type};
use gild_core::{FreshNames, MappingKind};

use crate::edit::{Edit, Emitter};
use crate::error::RewriteError;
use crate::pipeline::Rewriter;
use crate::scan::Scan;

pub const DEFAULT_MAX_ARITY: usize = 6;

pub struct MatchRewriter {
    max_arity: usize,
}

impl MatchRewriter {
    pub fn new(max_arity: usize) -> Self {
        Self { max_arity }
    }
}

impl Default for MatchRewriter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ARITY)
    }
}

/// Unions visible to one file.
struct Unions {
    markers: Vec<EnumMarker>,
}

impl Unions {
    fn from_source(src: &str) -> Self {
        let mut markers = EnumMarker::scan(src);
        for builtin in EnumMarker::builtins() {
            if !markers.iter().any(|m| m.name == builtin.name) {
                markers.push(builtin);
            }
        }
        Self { markers }
    }

    fn get(&self, name: &str) -> Option<&EnumMarker> {
        self.markers.iter().find(|m| m.name == name)
    }

    fn declaring(&self, variant: &str) -> Vec<&EnumMarker> {
        self.markers
            .iter()
            .filter(|m| m.arity(variant).is_some())
            .collect()
    }
}

enum Pattern {
    Wildcard,
    /// A lowercase name bound to the whole scrutinee.
    Bind(Range<usize>),
    Variant {
        union: String,
        variant: Range<usize>,
        binders: Vec<Range<usize>>,
    },
}

struct Arm {
    start: usize,
    patterns: Vec<Pattern>,
    guard: Option<Range<usize>>,
    body_start: usize,
    comma: Option<usize>,
}

struct MatchStmt {
    keyword: usize,
    open: usize,
    columns: Vec<Range<usize>>,
    arms: Vec<Arm>,
}

impl Rewriter for MatchRewriter {
    fn name(&self) -> &'static str {
        "match"
    }

    fn edits(&self, source: &str) -> Result<Vec<Edit>, RewriteError> {
        let scan = Scan::new(source)?;
        let unions = Unions::from_source(source);
        let mut names = FreshNames::new(scan.identifiers().into_iter().filter(|i| i.starts_with("__")));
        let mut edits = Vec::new();
        for keyword in scan.keywords("match") {
            if !scan.at_statement_start(keyword) {
                continue;
            }
            let Some(stmt) = self.parse_match(&scan, &unions, keyword)? else {
                continue;
            };
            emit_match(&scan, &stmt, &mut names, &mut edits);
        }
        Ok(edits)
    }
}

impl MatchRewriter {
    fn parse_match(
        &self,
        scan: &Scan<'_>,
        unions: &Unions,
        keyword: usize,
    ) -> Result<Option<MatchStmt>, RewriteError> {
        let src = scan.source();
        let start = scan.skip_space(keyword + 5);
        match src.as_bytes().get(start) {
            None => return Ok(None),
            Some(b) if b":=.,;)]}\n\r+/%|^".contains(b) => return Ok(None),
            Some(_) => {}
        }
        let line_end = src[start..].find('\n').map_or(src.len(), |nl| start + nl);
        let Some(open) = scan.find_top_level(start..line_end, "{") else {
            return Ok(None);
        };
        let scrutinee = scan.trim(start..open);
        if scrutinee.is_empty() {
            return Ok(None);
        }
        let close = scan.matching_close(open)?;

        let columns = tuple_elements(scan, scrutinee.clone())?.unwrap_or_else(|| vec![scrutinee]);
        if let Some(empty) = columns.iter().find(|c| c.is_empty()) {
            return Err(RewriteError::syntax(empty.start, "empty scrutinee element"));
        }
        if columns.len() > self.max_arity {
            return Err(RewriteError::Limit {
                offset: keyword,
                what: "match arity",
                limit: self.max_arity,
                actual: columns.len(),
            });
        }

        let mut arms = Vec::new();
        let mut pos = open + 1;
        loop {
            pos = scan.skip_trivia(pos, close, b",;");
            if pos >= close {
                break;
            }
            let arm = parse_arm(scan, unions, pos, close, columns.len())?;
            pos = match arm.comma {
                Some(comma) => comma + 1,
                None => arm_end(scan, arm.body_start, close)?,
            };
            arms.push(arm);
        }
        if arms.is_empty() {
            return Err(RewriteError::syntax(keyword, "`match` has no arms"));
        }
        check_columns(src, &arms)?;

        Ok(Some(MatchStmt {
            keyword,
            open,
            columns,
            arms,
        }))
    }
}

/// The elements of `(a, b, ...)`, or `None` when `range` is not a tuple.
fn tuple_elements(scan: &Scan<'_>, range: Range<usize>) -> Result<Option<Vec<Range<usize>>>, RewriteError> {
    let src = scan.source();
    if src.as_bytes().get(range.start) != Some(&b'(') || scan.matching_close(range.start)? + 1 != range.end {
        return Ok(None);
    }
    let parts = scan.split_top_level(range.start + 1..range.end - 1, b',');
    Ok((parts.len() > 1).then_some(parts))
}

fn find_keyword_top_level(scan: &Scan<'_>, range: Range<usize>, keyword: &str) -> Option<usize> {
    let mut from = range.start;
    while let Some(at) = scan.find_top_level(from..range.end, keyword) {
        if scan.is_keyword_at(at, keyword) {
            return Some(at);
        }
        from = at + 1;
    }
    None
}

fn parse_arm(
    scan: &Scan<'_>,
    unions: &Unions,
    start: usize,
    close: usize,
    columns: usize,
) -> Result<Arm, RewriteError> {
    let src = scan.source();
    let arrow = scan
        .find_top_level(start..close, "=>")
        .ok_or_else(|| RewriteError::syntax(start, "expected `=>` after the pattern"))?;
    if scan.find_top_level(start..arrow, "\n").is_some() {
        return Err(RewriteError::syntax(start, "expected `=>` after the pattern"));
    }
    let (pattern, guard) = match find_keyword_top_level(scan, start..arrow, "if") {
        Some(at) => {
            let guard = scan.trim(at + 2..arrow);
            if guard.is_empty() {
                return Err(RewriteError::syntax(at, "empty guard"));
            }
            (scan.trim(start..at), Some(guard))
        }
        None => (scan.trim(start..arrow), None),
    };
    if pattern.is_empty() {
        return Err(RewriteError::syntax(start, "expected a pattern"));
    }

    let elements = if columns == 1 {
        vec![pattern]
    } else {
        match tuple_elements(scan, pattern.clone())? {
            Some(elements) if elements.len() == columns => elements,
            // A bare `_` or a lone name matches the whole row.
            None if whole_row_wildcard(scan, unions, &pattern) => Vec::new(),
            Some(elements) => {
                return Err(RewriteError::syntax(
                    pattern.start,
                    format!(
                        "tuple pattern has {} elements but the scrutinee has {columns}",
                        elements.len()
                    ),
                ));
            }
            None => {
                return Err(RewriteError::syntax(
                    pattern.start,
                    format!("expected a tuple pattern with {columns} elements"),
                ));
            }
        }
    };
    let patterns = if elements.is_empty() {
        (0..columns).map(|_| Pattern::Wildcard).collect()
    } else {
        elements
            .into_iter()
            .map(|element| parse_pattern(scan, unions, element))
            .collect::<Result<Vec<_>, _>>()?
    };

    let body_start = scan.skip_trivia(arrow + 2, close, &[]);
    if body_start >= close || matches!(src.as_bytes()[body_start], b',' | b';') {
        return Err(RewriteError::syntax(arrow, "missing arm body"));
    }
    let body_end = arm_end(scan, body_start, close)?;
    let after = scan.skip_space(body_end);
    let comma = (after < close && src.as_bytes()[after] == b',').then_some(after);

    Ok(Arm {
        start,
        patterns,
        guard,
        body_start,
        comma,
    })
}

/// End of the arm body starting at `body_start`: a whole block, or an
/// expression running to the first depth-zero newline, `,` or `;`.
fn arm_end(scan: &Scan<'_>, body_start: usize, close: usize) -> Result<usize, RewriteError> {
    if scan.source().as_bytes()[body_start] == b'{' {
        return Ok(scan.matching_close(body_start)? + 1);
    }
    let mut depth = 0usize;
    for (at, b) in scan.code_bytes(body_start..close) {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b'\n' | b',' | b';' if depth == 0 => return Ok(scan.trim(body_start..at).end),
            _ => {}
        }
    }
    Ok(scan.trim(body_start..close).end)
}

fn whole_row_wildcard(scan: &Scan<'_>, unions: &Unions, pattern: &Range<usize>) -> bool {
    matches!(
        parse_pattern(scan, unions, pattern.clone()),
        Ok(Pattern::Wildcard | Pattern::Bind(_))
    )
}

fn parse_pattern(scan: &Scan<'_>, unions: &Unions, range: Range<usize>) -> Result<Pattern, RewriteError> {
    let src = scan.source();
    if &src[range.clone()] == "_" {
        return Ok(Pattern::Wildcard);
    }
    let unsupported = || RewriteError::syntax(range.start, format!("unsupported pattern `{}`", &src[range.clone()]));
    let head = scan.ident_at(range.start).ok_or_else(unsupported)?;

    let (qualifier, variant) = if src.as_bytes().get(head.end) == Some(&b'.') {
        let variant = scan.ident_at(head.end + 1).ok_or_else(unsupported)?;
        (Some(head), variant)
    } else {
        (None, head)
    };

    let binders = match src.as_bytes().get(variant.end) {
        _ if variant.end == range.end => Vec::new(),
        Some(b'(') => {
            let close = scan.matching_close(variant.end)?;
            if close + 1 != range.end {
                return Err(unsupported());
            }
            scan.split_top_level(variant.end + 1..close, b',')
                .into_iter()
                .filter(|b| !b.is_empty())
                .collect()
        }
        _ => return Err(unsupported()),
    };

    let variant_name = &src[variant.clone()];
    let (union, arity) = match qualifier {
        Some(qualifier) => {
            let union = &src[qualifier];
            match unions.get(union) {
                Some(marker) => {
                    let arity = marker.arity(variant_name).ok_or_else(|| {
                        RewriteError::syntax(
                            variant.start,
                            format!("`{union}` has no variant `{variant_name}`"),
                        )
                    })?;
                    (union.to_string(), Some(arity))
                }
                // Declared in another file of the package.
                None => (union.to_string(), None),
            }
        }
        None => match unions.declaring(variant_name).as_slice() {
            [] if binders.is_empty() && variant_name.starts_with(|c: char| c.is_lowercase()) => {
                return Ok(Pattern::Bind(variant));
            }
            [] => {
                return Err(RewriteError::syntax(
                    variant.start,
                    format!("unknown variant `{variant_name}`; qualify it as `Enum.{variant_name}`"),
                ));
            }
            [marker] => (marker.name.clone(), marker.arity(variant_name)),
            several => {
                let candidates: Vec<&str> = several.iter().map(|m| m.name.as_str()).collect();
                return Err(RewriteError::syntax(
                    variant.start,
                    format!(
                        "variant `{variant_name}` is ambiguous between {}",
                        candidates.join(", ")
                    ),
                ));
            }
        },
    };

    if let Some(arity) = arity.filter(|&arity| arity != binders.len()) {
        return Err(RewriteError::syntax(
            variant.start,
            format!(
                "`{union}.{variant_name}` has {arity} payload(s) but the pattern binds {}",
                binders.len()
            ),
        ));
    }
    for binder in &binders {
        let name = &src[binder.clone()];
        let plain = scan.ident_at(binder.start).as_ref() == Some(binder);
        if !plain || (name != "_" && !unions.declaring(name).is_empty()) {
            return Err(RewriteError::syntax(
                binder.start,
                "nested patterns are not supported; bind the payload and match on it",
            ));
        }
    }

    Ok(Pattern::Variant {
        union,
        variant,
        binders,
    })
}

/// Every concrete pattern in a column must come from the same union.
fn check_columns(src: &str, arms: &[Arm]) -> Result<(), RewriteError> {
    let columns = arms.first().map_or(0, |arm| arm.patterns.len());
    for column in 0..columns {
        let mut seen: Option<&str> = None;
        for arm in arms {
            if let Pattern::Variant { union, variant, .. } = &arm.patterns[column] {
                match seen {
                    Some(first) if first != union => {
                        return Err(RewriteError::syntax(
                            variant.start,
                            format!(
                                "`{}` belongs to `{union}` but this column matches `{first}`",
                                &src[variant.clone()]
                            ),
                        ));
                    }
                    Some(_) => {}
                    None => seen = Some(union),
                }
            }
        }
    }
    Ok(())
}

/// `r := *__match0.circle0; _ = r;` for every binder of the arm.
fn bindings(src: &str, scrutinees: &[String], patterns: &[Pattern]) -> Vec<(Range<usize>, String)> {
    let mut out = Vec::new();
    for (scrutinee, pattern) in scrutinees.iter().zip(patterns) {
        match pattern {
            Pattern::Wildcard => {}
            Pattern::Bind(name) => out.push((name.clone(), scrutinee.clone())),
            Pattern::Variant { variant, binders, .. } => {
                let variant_name = &src[variant.clone()];
                for (index, binder) in binders.iter().enumerate() {
                    if &src[binder.clone()] != "_" {
                        let field = payload_field(variant_name, index);
                        out.push((binder.clone(), format!("*{scrutinee}.{field}")));
                    }
                }
            }
        }
    }
    out
}

fn emit_match(scan: &Scan<'_>, stmt: &MatchStmt, names: &mut FreshNames, edits: &mut Vec<Edit>) {
    let src = scan.source();
    // Columns no arm tests or binds are assigned to `_` so Go sees no unused variable.
    let scrutinees: Vec<String> = (0..stmt.columns.len())
        .map(|column| {
            let used = stmt
                .arms
                .iter()
                .any(|arm| !matches!(arm.patterns[column], Pattern::Wildcard));
            if used { names.fresh("match") } else { "_".to_string() }
        })
        .collect();
    let operator = if scrutinees.iter().any(|s| s != "_") { ":=" } else { "=" };

    let mut header = Emitter::new();
    header
        .mapped("switch", stmt.keyword, 5, MappingKind::Keyword)
        .push(&format!(" {} {operator} ", scrutinees.join(", ")));
    for (index, column) in stmt.columns.iter().enumerate() {
        if index > 0 {
            header.push(", ");
        }
        header.copy(&src[column.clone()], column.start, MappingKind::Expression);
    }
    header.push("; {");
    edits.push(header.finish(stmt.keyword..stmt.open + 1));

    for arm in &stmt.arms {
        let bound = bindings(src, &scrutinees, &arm.patterns);
        let mut e = Emitter::new();
        e.marker(arm.start).push("case ");
        let mut tests = 0;
        for (scrutinee, pattern) in scrutinees.iter().zip(&arm.patterns) {
            if let Pattern::Variant { union, variant, .. } = pattern {
                if tests > 0 {
                    e.push(" && ");
                }
                e.push(&format!("{scrutinee}.tag == {}", tag_type(union)))
                    .copy(&src[variant.clone()], variant.start, MappingKind::Identifier);
                tests += 1;
            }
        }
        if let Some(guard) = &arm.guard {
            if tests > 0 {
                e.push(" && ");
            }
            let guard_text = &src[guard.clone()];
            if bound.is_empty() {
                e.push("(").copy(guard_text, guard.start, MappingKind::Expression).push(")");
            } else {
                e.push("func() bool {");
                for (binder, value) in &bound {
                    let name = &src[binder.clone()];
                    e.push(&format!(" {name} := {value}; _ = {name};"));
                }
                e.push(" return ")
                    .copy(guard_text, guard.start, MappingKind::Expression)
                    .push(" }()");
            }
            tests += 1;
        }
        if tests == 0 {
            e.push("true");
        }
        e.push(":");
        for (binder, value) in &bound {
            let name = &src[binder.clone()];
            e.push(" ")
                .copy(name, binder.start, MappingKind::Identifier)
                .push(&format!(" := {value}; _ = {name};"));
        }
        e.push(" ");
        edits.push(e.finish(arm.start..arm.body_start));

        if let Some(comma) = arm.comma {
            edits.push(if scan.rest_of_line_is_blank(comma + 1) {
                Edit::delete(comma..comma + 1)
            } else {
                Edit::replace(comma..comma + 1, ";")
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RewritePipeline;
    use gild_core::Position;

    const SHAPES: &str = "// gild:enum Shape Circle/1 Rect/2 Empty/0\n";

    fn rewrite(src: &str) -> String {
        RewritePipeline::new()
            .add_rewriter(MatchRewriter::default())
            .run(src)
            .unwrap()
            .text
    }

    fn error(src: &str) -> RewriteError {
        MatchRewriter::default().edits(src).err().unwrap()
    }

    #[test]
    fn test_single_scrutinee() {
        let src = format!(
            "{SHAPES}func area(s Shape) float64 {{\n\tmatch s {{\n\t\tCircle(r) => return r * r\n\t\tRect(w, _) => return w\n\t\t_ => return 0\n\t}}\n}}\n"
        );
        insta::assert_snapshot!(rewrite(&src), @r"
        // gild:enum Shape Circle/1 Rect/2 Empty/0
        func area(s Shape) float64 {
        	switch __match0 := s; {
        		case __match0.tag == ShapeTagCircle: r := *__match0.circle0; _ = r; return r * r
        		case __match0.tag == ShapeTagRect: w := *__match0.rect0; _ = w; return w
        		case true: return 0
        	}
        }
        ");
    }

    #[test]
    fn test_tuple_scrutinee_and_guard() {
        let src = format!(
            "{SHAPES}match (a, b) {{\n\t(Circle(r), Empty) if r > 1 => big()\n\t(x, _) => other(x)\n}}\n"
        );
        let out = rewrite(&src);
        assert!(out.contains("switch __match0, __match1 := a, b; {"));
        assert!(out.contains(
            "case __match0.tag == ShapeTagCircle && __match1.tag == ShapeTagEmpty && func() bool { r := *__match0.circle0; _ = r; return r > 1 }(): r := *__match0.circle0; _ = r; big()"
        ));
        assert!(out.contains("case true: x := __match0; _ = x; other(x)"));
    }

    #[test]
    fn test_commas_between_arms() {
        let src = "match opt { Some(v) => use(v), None => skip() }\n";
        let out = rewrite(src);
        assert_eq!(
            out,
            "switch __match0 := opt; { case __match0.tag == OptionTagSome: v := *__match0.some0; _ = v; use(v); case __match0.tag == OptionTagNone: skip() }\n"
        );
    }

    #[test]
    fn test_block_bodies_and_trailing_comma() {
        let src = "match res {\n\tOk(v) => {\n\t\tuse(v)\n\t},\n\tErr(e) => fail(e),\n}\n";
        let out = rewrite(src);
        assert!(out.contains("case __match0.tag == ResultTagOk: v := *__match0.ok0; _ = v; {\n\t\tuse(v)\n\t}\n"));
        assert!(out.contains("case __match0.tag == ResultTagErr: e := *__match0.err0; _ = e; fail(e)\n}"));
    }

    #[test]
    fn test_keyword_maps_back() {
        let src = format!("{SHAPES}\tmatch s {{\n\t\tEmpty => f()\n\t}}\n");
        let out = RewritePipeline::new()
            .add_rewriter(MatchRewriter::default())
            .run(&src)
            .unwrap();
        assert_eq!(out.mappings.map_to_original(Position::new(2, 2)), Position::new(2, 2));
        // The scrutinee copy `s` sits after `switch __match0 := `.
        assert_eq!(out.mappings.map_to_original(Position::new(2, 21)), Position::new(2, 8));
        // `case` points at the pattern it replaced.
        assert_eq!(out.mappings.map_to_original(Position::new(3, 3)), Position::new(3, 3));
    }

    #[test]
    fn test_match_as_identifier_is_left_alone() {
        let src = "match := 1\nmatch = 2\nx := match + 1\n";
        assert_eq!(rewrite(src), src);
    }

    #[test]
    fn test_untested_columns_are_discarded() {
        let out = rewrite(&format!("{SHAPES}match (a, b) {{\n\t(Empty, _) => f()\n\t_ => g()\n}}\n"));
        assert!(out.contains("switch __match0, _ := a, b; {"));
        let out = rewrite("match x {\n\t_ => f()\n}\n");
        assert!(out.contains("switch _ = x; {\n\tcase true: f()\n}"));
    }

    #[test]
    fn test_bare_wildcard_covers_every_column() {
        let out = rewrite("match (a, b) { (Some(x), _) => return x; _ => return 0 }\n");
        assert!(out.starts_with("switch __match0, _ := a, b; {"));
        assert!(out.contains("case __match0.tag == OptionTagSome: x := *__match0.some0; _ = x; return x"));
        assert!(out.contains("case true: return 0 }"));
        let out = rewrite("match (a, b) {\n\t(None, _) => f()\n\trest => g()\n}\n");
        assert!(out.contains("\tcase true: g()\n}"));
        let err = error("match (a, b) {\n\tNone => f()\n}\n");
        assert!(err.to_string().contains("expected a tuple pattern with 2 elements"));
    }

    #[test]
    fn test_arity_limit() {
        let src = "match (a, b, c) {\n\t_ => f()\n}\n";
        let err = MatchRewriter::new(2).edits(src).err().unwrap();
        assert!(matches!(err, RewriteError::Limit { limit: 2, actual: 3, .. }));
        assert_eq!(err.offset(), 0);
    }

    #[test]
    fn test_unknown_bare_variant() {
        let err = error("match s {\n\tTriangle => f()\n}\n");
        assert_eq!(err.offset(), 11);
        assert_eq!(
            err.to_string(),
            "unknown variant `Triangle`; qualify it as `Enum.Triangle`"
        );
    }

    #[test]
    fn test_ambiguous_variant() {
        let src = "// gild:enum A Both/0\n// gild:enum B Both/0\nmatch x {\n\tBoth => f()\n}\n";
        assert!(error(src).to_string().contains("ambiguous between A, B"));
    }

    #[test]
    fn test_qualified_variant_from_other_file() {
        let out = rewrite("match t {\n\tToken.Ident(n) => f(n)\n}\n");
        assert!(out.contains("case __match0.tag == TokenTagIdent: n := *__match0.ident0; _ = n; f(n)"));
    }

    #[test]
    fn test_payload_count_mismatch() {
        let err = error(&format!("{SHAPES}match s {{\n\tRect(w) => f()\n}}\n"));
        assert!(err.to_string().contains("has 2 payload(s) but the pattern binds 1"));
    }

    #[test]
    fn test_nested_pattern_rejected() {
        let err = error("match o {\n\tSome(Some(x)) => f(x)\n}\n");
        assert!(err.to_string().starts_with("nested patterns are not supported"));
    }

    #[test]
    fn test_missing_body() {
        let err = error("match o {\n\tNone =>\n}\n");
        assert!(err.to_string().contains("missing arm body"));
    }

    #[test]
    fn test_tuple_element_count() {
        let err = error("match (a, b) {\n\t(_, _, _) => f()\n}\n");
        assert!(err.to_string().contains("has 3 elements but the scrutinee has 2"));
    }
}
