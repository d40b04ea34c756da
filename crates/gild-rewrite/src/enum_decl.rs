//! `enum` declarations.
//!
//! ```text
//! enum Shape {                    // gild:enum Shape Circle/1 Empty/0
//!     Circle(radius float64)  ─►  type ShapeTag uint8
//!     Empty                       const ( ShapeTagCircle ShapeTag = iota ... )
//! }                               type Shape struct { tag ShapeTag; circle0 *float64 }
//!                                 func ShapeCircle(radius float64) Shape { ... }
//!                                 func (v Shape) IsCircle() bool { ... }
//! ```

use std::ops::Range;

use gild_core::MappingKind;
use gild_core::marker::{EnumMarker, payload_field, tag_const, tag_type};

use crate::edit::{Edit, Emitter};
use crate::error::RewriteError;
use crate::params::{Param, parse_params};
use crate::pipeline::Rewriter;
use crate::scan::Scan;

pub struct EnumRewriter;

struct Variant {
    name: Range<usize>,
    fields: Vec<Param>,
}

struct EnumDecl {
    keyword: usize,
    name: Range<usize>,
    end: usize,
    variants: Vec<Variant>,
}

impl Rewriter for EnumRewriter {
    fn name(&self) -> &'static str {
        "enum"
    }

    fn edits(&self, source: &str) -> Result<Vec<Edit>, RewriteError> {
        let scan = Scan::new(source)?;
        let mut edits = Vec::new();
        for keyword in scan.keywords("enum") {
            if !scan.at_statement_start(keyword) {
                continue;
            }
            if let Some(decl) = parse_enum(&scan, keyword)? {
                edits.push(emit_enum(source, &decl));
            }
        }
        Ok(edits)
    }
}

fn parse_enum(scan: &Scan<'_>, keyword: usize) -> Result<Option<EnumDecl>, RewriteError> {
    let src = scan.source();
    let Some(name) = scan.ident_at(scan.skip_space(keyword + 4)) else {
        return Ok(None);
    };
    let after_name = scan.skip_space(name.end);
    match src.as_bytes().get(after_name) {
        Some(b'{') => {}
        Some(b'[') => {
            return Err(RewriteError::syntax(
                after_name,
                "generic enums are not supported",
            ));
        }
        _ => return Ok(None),
    }
    let close = scan.matching_close(after_name)?;

    let mut variants: Vec<Variant> = Vec::new();
    let mut pos = after_name + 1;
    loop {
        pos = scan.skip_trivia(pos, close, b",;");
        if pos >= close {
            break;
        }
        let variant = scan
            .ident_at(pos)
            .ok_or_else(|| RewriteError::syntax(pos, "expected a variant name"))?;
        if variants.iter().any(|v| src[v.name.clone()] == src[variant.clone()]) {
            return Err(RewriteError::syntax(
                variant.start,
                format!("duplicate variant `{}`", &src[variant.clone()]),
            ));
        }
        pos = scan.skip_space(variant.end);
        let mut fields = Vec::new();
        if src.as_bytes().get(pos) == Some(&b'(') {
            let fields_end = scan.matching_close(pos)?;
            fields = parse_params(scan, pos + 1..fields_end)?;
            pos = scan.skip_space(fields_end + 1);
        }
        if pos < close && !matches!(src.as_bytes()[pos], b'\n' | b'\r' | b',' | b';' | b'/') {
            return Err(RewriteError::syntax(
                pos,
                "expected a newline or `,` after the variant",
            ));
        }
        variants.push(Variant {
            name: variant,
            fields,
        });
    }
    if variants.is_empty() {
        return Err(RewriteError::syntax(name.start, "enum declares no variants"));
    }
    Ok(Some(EnumDecl {
        keyword,
        name,
        end: close + 1,
        variants,
    }))
}

fn emit_enum(src: &str, decl: &EnumDecl) -> Edit {
    let name = &src[decl.name.clone()];
    let tag = tag_type(name);
    let marker = EnumMarker::new(
        name,
        decl.variants
            .iter()
            .map(|v| (src[v.name.clone()].to_string(), v.fields.len()))
            .collect(),
    );

    let mut e = Emitter::new();
    e.marker(decl.keyword).push(&marker.render()).push("\n");
    e.mapped("type", decl.keyword, 4, MappingKind::Keyword)
        .push(" ")
        .copy(name, decl.name.start, MappingKind::Identifier)
        .push("Tag uint8\n\nconst (\n");
    for (index, variant) in decl.variants.iter().enumerate() {
        let variant_name = &src[variant.name.clone()];
        e.push("\t")
            .push(&tag)
            .copy(variant_name, variant.name.start, MappingKind::Identifier);
        if index == 0 {
            e.push(&format!(" {tag} = iota"));
        }
        e.push("\n");
    }
    e.push(")\n\ntype ")
        .copy(name, decl.name.start, MappingKind::Identifier)
        .push(" struct {\n\ttag ")
        .push(&tag)
        .push("\n");
    for variant in &decl.variants {
        let variant_name = &src[variant.name.clone()];
        for (index, field) in variant.fields.iter().enumerate() {
            e.push(&format!("\t{} *", payload_field(variant_name, index)))
                .copy(&src[field.ty.clone()], field.ty.start, MappingKind::Expression)
                .push("\n");
        }
    }
    e.push("}\n");

    for variant in &decl.variants {
        let variant_name = &src[variant.name.clone()];
        let params: Vec<String> = variant
            .fields
            .iter()
            .enumerate()
            .map(|(index, field)| match &field.name {
                Some(field_name) => src[field_name.clone()].to_string(),
                None => format!("v{index}"),
            })
            .collect();
        e.push("\nfunc ")
            .push(name)
            .copy(variant_name, variant.name.start, MappingKind::Identifier)
            .push("(");
        for (index, (param, field)) in params.iter().zip(&variant.fields).enumerate() {
            if index > 0 {
                e.push(", ");
            }
            e.push(param).push(" ").copy(&src[field.ty.clone()], field.ty.start, MappingKind::Expression);
        }
        e.push(&format!(") {name} {{\n\treturn {name}{{tag: {}", tag_const(name, variant_name)));
        for (index, param) in params.iter().enumerate() {
            e.push(&format!(", {}: &{param}", payload_field(variant_name, index)));
        }
        e.push("}\n}\n");
    }

    for (index, variant) in decl.variants.iter().enumerate() {
        let variant_name = &src[variant.name.clone()];
        e.push(&format!("\nfunc (v {name}) Is"))
            .copy(variant_name, variant.name.start, MappingKind::Identifier)
            .push(&format!(
                "() bool {{\n\treturn v.tag == {}\n}}",
                tag_const(name, variant_name)
            ));
        if index + 1 < decl.variants.len() {
            e.push("\n");
        }
    }

    e.finish(decl.keyword..decl.end)
}
