//! tree-sitter-go front end and the splice printer.

use std::cell::RefCell;

use derive_more::Display;
use tree_sitter::{Parser, TreeCursor};

use crate::tree::{Splice, SyntaxTree, TreeBuilder, apply_splices};

thread_local! {
    static PARSER: RefCell<Option<Parser>> = const { RefCell::new(None) };
}

#[derive(Clone, Debug, Display, PartialEq, Eq)]
#[display("{message}")]
pub struct ParseError {
    /// Byte offset into the parsed text.
    pub offset: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

impl std::error::Error for ParseError {}

/// A top-level declaration merged into the file at print time.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Declaration {
    /// The name it declares, used to reject duplicates.
    pub name: String,
    pub text: String,
}

impl Declaration {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// Printed output plus the splices that produced it from the parsed text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Printed {
    pub text: String,
    /// Sorted by start offset into the parsed text.
    pub splices: Vec<Splice>,
}

pub trait StructuralParse: Send + Sync {
    fn parse(&self, text: &str) -> Result<SyntaxTree, ParseError>;
}

pub trait StructuralPrint: Send + Sync {
    fn print(&self, tree: &SyntaxTree, declarations: &[Declaration]) -> Printed;
}

/// Go parsing through tree-sitter-go; printing by splicing edits over the parsed text.
#[derive(Clone, Copy, Debug, Default)]
pub struct GoSyntax;

fn with_parser<R>(f: impl FnOnce(&mut Parser) -> R) -> Result<R, ParseError> {
    PARSER.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            let mut parser = Parser::new();
            parser
                .set_language(&tree_sitter_go::LANGUAGE.into())
                .map_err(|e| ParseError::new(0, format!("cannot load the Go grammar: {e}")))?;
            *slot = Some(parser);
        }
        match slot.as_mut() {
            Some(parser) => Ok(f(parser)),
            None => Err(ParseError::new(0, "no parser available")),
        }
    })
}

fn build(cursor: &mut TreeCursor<'_>, builder: &mut TreeBuilder) {
    let node = cursor.node();
    builder.start_node(node.kind(), node.is_named(), node.byte_range(), cursor.field_name());
    if cursor.goto_first_child() {
        loop {
            build(cursor, builder);
            if !cursor.goto_next_sibling() {
                break;
            }
        }
        cursor.goto_parent();
    }
    builder.finish_node();
}

/// The first ERROR or MISSING node, in source order.
fn first_error(root: tree_sitter::Node<'_>, text: &str) -> ParseError {
    let mut cursor = root.walk();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_missing() {
            return ParseError::new(node.start_byte(), format!("missing `{}`", node.kind()));
        }
        if node.is_error() {
            let snippet: String = text[node.byte_range()].chars().take(20).collect();
            return ParseError::new(node.start_byte(), format!("unexpected `{}`", snippet.trim()));
        }
        if node.has_error() {
            let children: Vec<_> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
    }
    ParseError::new(0, "syntax error")
}

impl StructuralParse for GoSyntax {
    fn parse(&self, text: &str) -> Result<SyntaxTree, ParseError> {
        let tree = with_parser(|parser| parser.parse(text, None))?
            .ok_or_else(|| ParseError::new(0, "parser produced no tree"))?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(first_error(root, text));
        }
        let mut builder = TreeBuilder::new();
        build(&mut tree.walk(), &mut builder);
        let tree = builder.finish(text);
        tracing::trace!(nodes = tree.len(), "parsed");
        Ok(tree)
    }
}

/// Where injected declarations go: after the last import, else after the package clause.
fn declaration_anchor(tree: &SyntaxTree) -> Option<usize> {
    let root = tree.root();
    let last_import = tree
        .children(root)
        .filter(|&c| tree.kind(c) == "import_declaration")
        .last();
    last_import
        .or_else(|| tree.child_of_kind(root, "package_clause"))
        .and_then(|node| tree.span(node))
        .map(|span| span.end)
}

impl StructuralPrint for GoSyntax {
    fn print(&self, tree: &SyntaxTree, declarations: &[Declaration]) -> Printed {
        let mut splices = Vec::new();
        tree.collect_splices(tree.root(), &mut splices);

        if !declarations.is_empty() {
            let body = declarations
                .iter()
                .map(|d| d.text.trim_end())
                .collect::<Vec<_>>()
                .join("\n\n");
            let splice = match declaration_anchor(tree) {
                Some(at) => Splice {
                    start: at,
                    end: at,
                    replacement: format!("\n\n{body}"),
                },
                None => Splice {
                    start: 0,
                    end: 0,
                    replacement: format!("{body}\n\n"),
                },
            };
            let index = splices.partition_point(|s| s.start < splice.start);
            splices.insert(index, splice);
        }

        Printed {
            text: apply_splices(tree.source(), 0, &splices),
            splices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ParentIndex;

    fn parse(text: &str) -> SyntaxTree {
        GoSyntax.parse(text).unwrap()
    }

    #[test]
    fn test_parse_structure() {
        let tree = parse("package main\n\nfunc f(a int) int {\n\treturn a + 1\n}\n");
        let root = tree.root();
        assert_eq!(tree.kind(root), "source_file");
        let func = tree.child_of_kind(root, "function_declaration").unwrap();
        let name = tree.child_by_field(func, "name").unwrap();
        assert_eq!(tree.source_text(name), Some("f"));
        assert!(tree.child_by_field(func, "body").is_some());
    }

    #[test]
    fn test_parse_error_offset() {
        let err = GoSyntax.parse("package main\n\nfunc f() {\n\tx := )\n}\n").unwrap_err();
        assert!(err.offset >= 24, "offset {}", err.offset);
    }

    #[test]
    fn test_unedited_tree_prints_verbatim() {
        let text = "package main\n\n// hello\nfunc main() {}\n";
        let printed = GoSyntax.print(&parse(text), &[]);
        assert_eq!(printed.text, text);
        assert!(printed.splices.is_empty());
    }

    #[test]
    fn test_print_replacement_and_declarations() {
        let text = "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tfmt.Println(1)\n}\n";
        let mut tree = parse(text);
        let parents = ParentIndex::build(&tree);
        let literal = tree
            .pre_order(tree.root())
            .into_iter()
            .find(|&n| tree.kind(n) == "int_literal")
            .unwrap();
        let parent = parents.parent(literal).unwrap();
        let replacement = tree.synthetic("call_expression", "two()");
        assert!(tree.replace_child(&parents, parent, literal, replacement));

        let printed = GoSyntax.print(&tree, &[Declaration::new("two", "func two() int {\n\treturn 2\n}\n")]);
        insta::assert_snapshot!(printed.text, @r#"
        package main

        import "fmt"

        func two() int {
        	return 2
        }

        func main() {
        	fmt.Println(two())
        }
        "#);
        assert_eq!(printed.splices.len(), 2);
        assert_eq!(printed.splices[0].start, 26);
    }

    #[test]
    fn test_declarations_without_imports() {
        let printed = GoSyntax.print(&parse("package p\n"), &[Declaration::new("T", "type T int")]);
        assert_eq!(printed.text, "package p\n\ntype T int\n");
    }
}
