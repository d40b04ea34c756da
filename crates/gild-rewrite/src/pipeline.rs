//! The text rewrite stage.
//!
//! ```text
//! source ─► enum ─► match ─► ? ─► let ─► Go text
//!   └─ identity mappings ─────────────────► composed mappings
//! ```
//!
//! Rewriters run strictly in registration order. `match` relies on the
//! `// gild:enum` markers left by `enum`, and `let` runs last so that the
//! bindings produced by `match` and `?` already exist when it normalizes.

use gild_core::{MappingStore, TranspileConfig, TranspileResult};

use crate::edit::{Edit, apply_edits};
use crate::error::RewriteError;
use crate::{EnumRewriter, LetRewriter, MatchRewriter, TryRewriter};

/// Output of one rewriter or of the whole pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rewritten {
    pub text: String,
    pub mappings: MappingStore,
}

/// A stage-1 rewriter: input text to byte-range edits.
///
/// Rewriters hold no per-file state; one instance serves every file.
pub trait Rewriter: Send + Sync {
    fn name(&self) -> &'static str;

    /// The edits this rewriter makes to `source`. Empty when nothing matches.
    fn edits(&self, source: &str) -> Result<Vec<Edit>, RewriteError>;

    /// Apply [`edits`](Rewriter::edits), composing `mappings`.
    fn rewrite(&self, source: &str, mappings: &MappingStore) -> TranspileResult<Rewritten> {
        let edits = self
            .edits(source)
            .map_err(|e| e.into_transpile_error(source, mappings))?;
        tracing::debug!(rewriter = self.name(), edits = edits.len(), "rewrite");
        if edits.is_empty() {
            return Ok(Rewritten {
                text: source.to_string(),
                mappings: mappings.clone(),
            });
        }
        let (text, mappings) =
            apply_edits(source, edits, mappings).map_err(|e| e.into_transpile_error(source, mappings))?;
        Ok(Rewritten { text, mappings })
    }
}

/// Ordered rewriters folded over one file.
#[derive(Default)]
pub struct RewritePipeline {
    rewriters: Vec<Box<dyn Rewriter>>,
}

impl RewritePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard Gild surface: `enum`, `match`, `?`, `let`.
    pub fn standard(config: &TranspileConfig) -> Self {
        Self::new()
            .add_rewriter(EnumRewriter)
            .add_rewriter(MatchRewriter::new(config.max_match_arity))
            .add_rewriter(TryRewriter)
            .add_rewriter(LetRewriter)
    }

    pub fn add_rewriter(mut self, rewriter: impl Rewriter + 'static) -> Self {
        self.rewriters.push(Box::new(rewriter));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.rewriters.iter().map(|r| r.name()).collect()
    }

    pub fn run(&self, source: &str) -> TranspileResult<Rewritten> {
        let initial = Rewritten {
            text: source.to_string(),
            mappings: MappingStore::identity(source),
        };
        self.rewriters.iter().try_fold(initial, |current, rewriter| {
            rewriter.rewrite(&current.text, &current.mappings)
        })
    }
}
