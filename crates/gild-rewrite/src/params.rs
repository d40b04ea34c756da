//! Go parameter lists: `a int`, `w, h float64`, `int, error`.

use std::ops::Range;

use crate::error::RewriteError;
use crate::scan::Scan;

/// Type keywords that may start an unnamed parameter containing whitespace.
const TYPE_KEYWORDS: &[&str] = &["chan", "func", "map", "struct", "interface"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub name: Option<Range<usize>>,
    pub ty: Range<usize>,
}

/// Parse the inside of a parenthesized parameter list.
///
/// Either every entry is a bare type, or names are grouped Go-style and an
/// entry without a type takes the type of the next typed entry.
pub fn parse_params(scan: &Scan<'_>, range: Range<usize>) -> Result<Vec<Param>, RewriteError> {
    let src = scan.source();
    let items: Vec<Range<usize>> = scan
        .split_top_level(range, b',')
        .into_iter()
        .filter(|r| !r.is_empty())
        .collect();

    let split = |item: &Range<usize>| -> Option<(Range<usize>, Range<usize>)> {
        let name = scan.ident_at(item.start)?;
        let ty = scan.trim(name.end..item.end);
        let separated = src[name.end..item.end].starts_with([' ', '\t']);
        (separated && !ty.is_empty() && !TYPE_KEYWORDS.contains(&&src[name.clone()]))
            .then_some((name, ty))
    };

    if !items.iter().any(|item| split(item).is_some()) {
        return Ok(items
            .into_iter()
            .map(|ty| Param { name: None, ty })
            .collect());
    }

    let mut params = Vec::with_capacity(items.len());
    let mut pending = Vec::new();
    for item in items {
        match split(&item) {
            Some((name, ty)) => {
                params.extend(pending.drain(..).map(|waiting| Param {
                    name: Some(waiting),
                    ty: ty.clone(),
                }));
                params.push(Param {
                    name: Some(name),
                    ty,
                });
            }
            None => pending.push(item),
        }
    }
    match pending.first() {
        Some(missing) => Err(RewriteError::syntax(
            missing.start,
            format!("`{}` has no type", &src[missing.clone()]),
        )),
        None => Ok(params),
    }
}
