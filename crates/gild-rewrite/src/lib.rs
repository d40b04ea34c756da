//! Stage one of the Gild transpiler: text-level rewrites.
//!
//! Each rewriter turns one piece of Gild surface syntax into plain Go text,
//! composing the mapping store so that every generated position still
//! resolves to the original source.

mod edit;
mod enum_decl;
mod error;
mod let_binding;
mod match_stmt;
mod params;
mod pipeline;
mod scan;
mod try_op;

pub use edit::{Anchor, Edit, Emitter, apply_edits};
pub use enum_decl::EnumRewriter;
pub use error::RewriteError;
pub use let_binding::LetRewriter;
pub use match_stmt::{DEFAULT_MAX_ARITY, MatchRewriter};
pub use pipeline::{RewritePipeline, Rewritten, Rewriter};
pub use scan::Scan;
pub use try_op::TryRewriter;
