//! Structural view of rewritten Go text.
//!
//! [`GoSyntax`] parses with tree-sitter-go into an editable [`SyntaxTree`]
//! and prints it back by splicing edits over the parsed text, reporting every
//! splice so position mappings can follow the edits.

mod go;
mod tree;

pub use go::{Declaration, GoSyntax, ParseError, Printed, StructuralParse, StructuralPrint};
pub use tree::{NodeId, ParentIndex, Splice, SyntaxTree, TreeBuilder, apply_splices};
