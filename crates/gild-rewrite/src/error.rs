//! Rewriter errors, located by byte offset into the rewriter's input.

use derive_more::Display;
use gild_core::{LineIndex, MappingStore, TranspileError};

#[derive(Clone, Debug, Display, PartialEq, Eq)]
pub enum RewriteError {
    #[display("{message}")]
    Syntax { offset: usize, message: String },

    #[display("{what} limit exceeded ({actual} > {limit})")]
    Limit {
        offset: usize,
        what: &'static str,
        limit: usize,
        actual: usize,
    },
}

impl RewriteError {
    pub fn syntax(offset: usize, message: impl Into<String>) -> Self {
        RewriteError::Syntax {
            offset,
            message: message.into(),
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            RewriteError::Syntax { offset, .. } | RewriteError::Limit { offset, .. } => *offset,
        }
    }

    /// Resolve the offset through `mappings` so the error names an original position.
    pub fn into_transpile_error(self, input: &str, mappings: &MappingStore) -> TranspileError {
        let position = mappings.map_to_original(LineIndex::new(input).position(self.offset()));
        match self {
            RewriteError::Syntax { message, .. } => TranspileError::syntax_rewrite(position, message),
            RewriteError::Limit {
                what,
                limit,
                actual,
                ..
            } => TranspileError::limit_exceeded(position, what, limit, actual),
        }
    }
}
