//! `let` bindings.
//!
//! `let x = e` and `let a, b = f()` become short variable declarations.
//! A binding with a type, `let n int = 3` or `let buf []byte`, becomes a
//! `var` declaration.

use gild_core::MappingKind;

use crate::edit::{Edit, Emitter};
use crate::error::RewriteError;
use crate::pipeline::Rewriter;
use crate::scan::Scan;

pub struct LetRewriter;

impl Rewriter for LetRewriter {
    fn name(&self) -> &'static str {
        "let"
    }

    fn edits(&self, source: &str) -> Result<Vec<Edit>, RewriteError> {
        let scan = Scan::new(source)?;
        let mut edits = Vec::new();
        for keyword in scan.keywords("let") {
            if scan.at_statement_start(keyword) {
                rewrite_let(&scan, keyword, &mut edits)?;
            }
        }
        Ok(edits)
    }
}

fn rewrite_let(scan: &Scan<'_>, keyword: usize, edits: &mut Vec<Edit>) -> Result<(), RewriteError> {
    let src = scan.source();
    let bytes = src.as_bytes();
    if !matches!(bytes.get(keyword + 3), Some(b' ' | b'\t')) {
        return Ok(());
    }
    let head_start = scan.skip_space(keyword + 3);
    if bytes.get(head_start) == Some(&b'(') {
        return Err(RewriteError::syntax(
            head_start,
            "destructuring `let` patterns are not supported",
        ));
    }
    // `let := 1` and `let = 2` use `let` as a plain identifier.
    if scan.ident_at(head_start).is_none() {
        return Ok(());
    }

    let line_end = src[head_start..].find('\n').map_or(src.len(), |nl| head_start + nl);
    let statement_end = [";", "}"]
        .iter()
        .filter_map(|end| scan.find_top_level(head_start..line_end, end))
        .min()
        .unwrap_or(line_end);
    let assign = scan.find_assign(head_start..statement_end);
    let head = scan.trim(head_start..assign.unwrap_or(statement_end));
    let untyped = scan
        .split_top_level(head, b',')
        .iter()
        .all(|name| scan.ident_at(name.start).as_ref() == Some(name));

    if !untyped {
        let mut e = Emitter::new();
        e.mapped("var", keyword, 3, MappingKind::Keyword);
        edits.push(e.finish(keyword..keyword + 3));
        return Ok(());
    }
    let Some(assign) = assign else {
        return Err(RewriteError::syntax(
            keyword,
            "`let` without a type needs an initializer",
        ));
    };
    edits.push(Edit::delete(keyword..head_start));
    let mut e = Emitter::new();
    e.mapped(":=", assign, 1, MappingKind::Keyword);
    edits.push(e.finish(assign..assign + 1));
    Ok(())
}
