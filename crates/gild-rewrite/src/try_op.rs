//! The postfix `?` operator.
//!
//! ```text
//! x := load(path)?          x, __err0 := load(path)
//!                     ─►    if __err0 != nil {
//!                               return 0, __err0
//!                           }
//! ```
//!
//! `?` must end its statement. The zero values returned alongside the error
//! come from the result list of the innermost enclosing function, whose last
//! result has to be `error`.

use std::ops::Range;

use gild_core::{FreshNames, MappingKind};

use crate::edit::{Edit, Emitter};
use crate::error::RewriteError;
use crate::params::parse_params;
use crate::pipeline::Rewriter;
use crate::scan::Scan;

pub struct TryRewriter;

/// A function declaration or literal with a body.
struct Signature {
    results: Vec<String>,
    /// `{` through `}` inclusive.
    body: Range<usize>,
}

enum Form {
    /// `return f()?`
    Return(Range<usize>),
    /// `a, b := f()?`
    Define { lhs: Range<usize>, rhs: Range<usize> },
    /// `a, b = f()?`
    Assign { lhs: Range<usize>, rhs: Range<usize> },
    /// `f()?`
    Bare(Range<usize>),
}

impl Rewriter for TryRewriter {
    fn name(&self) -> &'static str {
        "try"
    }

    fn edits(&self, source: &str) -> Result<Vec<Edit>, RewriteError> {
        let scan = Scan::new(source)?;
        let questions: Vec<usize> = scan
            .code_bytes(0..source.len())
            .filter(|&(_, b)| b == b'?')
            .map(|(at, _)| at)
            .collect();
        if questions.is_empty() {
            return Ok(Vec::new());
        }
        let functions: Vec<Signature> = scan
            .keywords("func")
            .into_iter()
            .filter_map(|keyword| parse_signature(&scan, keyword))
            .collect();
        let mut names = FreshNames::new(scan.identifiers().into_iter().filter(|i| i.starts_with("__")));

        let mut edits = Vec::with_capacity(questions.len());
        for question in questions {
            edits.push(rewrite_one(&scan, &functions, &mut names, question)?);
        }
        Ok(edits)
    }
}

fn rewrite_one(
    scan: &Scan<'_>,
    functions: &[Signature],
    names: &mut FreshNames,
    question: usize,
) -> Result<Edit, RewriteError> {
    let src = scan.source();
    let after = scan.skip_space(question + 1);
    let terminated = match src.as_bytes().get(after) {
        None | Some(b'\n' | b'\r' | b';' | b'}') => true,
        Some(b'/') => !scan.is_code(after),
        Some(_) => false,
    };
    if !terminated {
        return Err(RewriteError::syntax(question, "`?` must end a statement"));
    }

    let start = statement_start(scan, question);
    let stmt = scan.trim(start..question);
    if stmt.is_empty() {
        return Err(RewriteError::syntax(question, "`?` needs an expression"));
    }
    let function = functions
        .iter()
        .filter(|f| f.body.contains(&question))
        .max_by_key(|f| f.body.start)
        .ok_or_else(|| RewriteError::syntax(question, "`?` used outside a function"))?;
    let Some((_, values)) = function.results.split_last().filter(|(last, _)| *last == "error") else {
        return Err(RewriteError::syntax(
            question,
            "`?` requires the enclosing function to return `error` as its last result",
        ));
    };

    let binding = scan
        .is_keyword_at(stmt.start, "let")
        .then(|| scan.find_assign(stmt.clone()))
        .flatten();
    let form = if scan.is_keyword_at(stmt.start, "return") {
        Form::Return(scan.trim(stmt.start + 6..stmt.end))
    } else if let Some(assign) = binding {
        // `let a, b = f()?` declares like `:=`; the `let` itself is dropped.
        let lhs = scan.trim(stmt.start + 3..assign);
        let typed = scan
            .split_top_level(lhs.clone(), b',')
            .iter()
            .any(|name| scan.ident_at(name.start).as_ref() != Some(name));
        if typed {
            return Err(RewriteError::syntax(
                stmt.start,
                "`?` cannot initialize a `let` with a type; use `let x = f()?`",
            ));
        }
        Form::Define {
            lhs,
            rhs: scan.trim(assign + 1..stmt.end),
        }
    } else if let Some(define) = scan.find_top_level(stmt.clone(), ":=") {
        Form::Define {
            lhs: scan.trim(stmt.start..define),
            rhs: scan.trim(define + 2..stmt.end),
        }
    } else if let Some(assign) = scan.find_assign(stmt.clone()) {
        Form::Assign {
            lhs: scan.trim(stmt.start..assign),
            rhs: scan.trim(assign + 1..stmt.end),
        }
    } else {
        Form::Bare(stmt.clone())
    };
    match &form {
        Form::Return(expr) | Form::Bare(expr) | Form::Define { rhs: expr, .. } | Form::Assign { rhs: expr, .. }
            if expr.is_empty() =>
        {
            return Err(RewriteError::syntax(question, "`?` needs an expression"));
        }
        Form::Define { lhs, .. } | Form::Assign { lhs, .. } if lhs.is_empty() => {
            return Err(RewriteError::syntax(stmt.start, "missing assignment target"));
        }
        Form::Return(_) if values.len() > 1 => {
            return Err(RewriteError::syntax(
                stmt.start,
                "`return f()?` needs a function returning at most one value besides `error`",
            ));
        }
        _ => {}
    }
    let indent = scan.indent_of(stmt.start);
    let err = names.fresh("err");
    let mut e = Emitter::new();
    let mut value = None;
    match &form {
        Form::Define { lhs, rhs } => {
            e.copy(&src[lhs.clone()], lhs.start, MappingKind::Expression)
                .push(&format!(", {err} := "))
                .copy(&src[rhs.clone()], rhs.start, MappingKind::Expression);
        }
        Form::Assign { lhs, rhs } => {
            e.push(&format!("var {err} error\n{indent}"))
                .copy(&src[lhs.clone()], lhs.start, MappingKind::Expression)
                .push(&format!(", {err} = "))
                .copy(&src[rhs.clone()], rhs.start, MappingKind::Expression);
        }
        Form::Bare(expr) => {
            e.push(&format!("{err} := "))
                .copy(&src[expr.clone()], expr.start, MappingKind::Expression);
        }
        Form::Return(expr) => {
            if !values.is_empty() {
                let tmp = names.fresh("try");
                e.push(&format!("{tmp}, "));
                value = Some(tmp);
            }
            e.push(&format!("{err} := "))
                .copy(&src[expr.clone()], expr.start, MappingKind::Expression);
        }
    }

    let zeros: Vec<String> = values.iter().map(|ty| zero_value(ty)).collect();
    let mut returned = zeros.join(", ");
    if !returned.is_empty() {
        returned.push_str(", ");
    }
    e.push(&format!("\n{indent}"))
        .marker(question)
        .push(&format!("if {err} != nil {{\n{indent}\t"))
        .marker(question)
        .push(&format!("return {returned}{err}\n{indent}}}"));
    if let Form::Return(_) = form {
        e.push(&format!("\n{indent}"))
            .mapped("return", stmt.start, 6, MappingKind::Keyword);
        match value {
            Some(tmp) => e.push(&format!(" {tmp}, nil")),
            None => e.push(" nil"),
        };
    }
    Ok(e.finish(stmt.start..question + 1))
}

/// Start of the statement containing `offset`, found by walking back to a
/// depth-zero newline, `;`, case colon or unmatched opening delimiter.
fn statement_start(scan: &Scan<'_>, offset: usize) -> usize {
    let bytes = scan.source().as_bytes();
    let mut depth = 0usize;
    let mut at = offset;
    while at > 0 {
        let prev = at - 1;
        if scan.is_code(prev) {
            match bytes[prev] {
                b')' | b']' | b'}' => depth += 1,
                b'(' | b'[' | b'{' if depth == 0 => break,
                b'(' | b'[' | b'{' => depth -= 1,
                b'\n' | b';' if depth == 0 => break,
                b':' if depth == 0 && bytes.get(prev + 1) != Some(&b'=') => break,
                _ => {}
            }
        }
        at = prev;
    }
    at
}

fn parse_signature(scan: &Scan<'_>, keyword: usize) -> Option<Signature> {
    let src = scan.source();
    let bytes = src.as_bytes();
    let declaration = scan.at_statement_start(keyword);
    let mut at = scan.skip_space(keyword + 4);

    // Receiver, name and type parameters of a declaration.
    if declaration {
        if bytes.get(at) == Some(&b'(') {
            at = scan.skip_space(scan.matching_close(at).ok()? + 1);
        }
        at = scan.skip_space(scan.ident_at(at)?.end);
        if bytes.get(at) == Some(&b'[') {
            at = scan.skip_space(scan.matching_close(at).ok()? + 1);
        }
    }
    if bytes.get(at) != Some(&b'(') {
        return None;
    }
    at = scan.skip_space(scan.matching_close(at).ok()? + 1);

    let (results, open) = match bytes.get(at)? {
        b'{' => (Vec::new(), at),
        b'(' => {
            let close = scan.matching_close(at).ok()?;
            let results = parse_params(scan, at + 1..close)
                .ok()?
                .into_iter()
                .map(|param| src[param.ty].to_string())
                .collect();
            let open = scan.skip_space(close + 1);
            if bytes.get(open) != Some(&b'{') {
                return None;
            }
            (results, open)
        }
        _ => {
            let mut open = at;
            loop {
                open = scan.find_top_level(open..src.len(), "{")?;
                let before = src[at..open].trim_end();
                if before.ends_with("interface") || before.ends_with("struct") {
                    open = scan.matching_close(open).ok()? + 1;
                    continue;
                }
                break;
            }
            let result = src[at..open].trim();
            // A function type inside a parameter list runs into the enclosing `)`.
            if result.contains('\n') || result.matches('(').count() != result.matches(')').count() {
                return None;
            }
            (vec![result.to_string()], open)
        }
    };
    let close = scan.matching_close(open).ok()?;
    Some(Signature {
        results,
        body: open..close + 1,
    })
}

const NUMERIC: &[&str] = &[
    "int", "int8", "int16", "int32", "int64", "uint", "uint8", "uint16", "uint32", "uint64", "uintptr",
    "float32", "float64", "complex64", "complex128", "byte", "rune",
];

const NIL_PREFIXES: &[&str] = &["*", "[]", "map[", "chan ", "chan<-", "<-chan", "func(", "interface{"];

/// The Go zero value of a result type.
fn zero_value(ty: &str) -> String {
    match ty {
        _ if NUMERIC.contains(&ty) => "0".to_string(),
        "string" => "\"\"".to_string(),
        "bool" => "false".to_string(),
        "error" | "any" => "nil".to_string(),
        _ if NIL_PREFIXES.iter().any(|prefix| ty.starts_with(prefix)) => "nil".to_string(),
        _ => format!("*new({ty})"),
    }
}
