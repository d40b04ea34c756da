//! The whole transpiler for one file.
//!
//! ```text
//! Gild source
//!     │
//!     ▼
//! RewritePipeline (enum, match, ?, let) ─► Go text + mappings
//!     │
//!     ▼
//! StructuralParse ─► SyntaxTree
//!     │
//!     ▼
//! TreePipeline (Discovery ─► Transform ─► Inject)
//!     │
//!     ▼
//! StructuralPrint ─► Go source, mappings adjusted for every splice
//! ```
//!
//! Every stage is immutable once built, so one [`Transpiler`] can serve many
//! files from many threads. Per-file state lives only inside
//! [`Transpiler::transpile`].

use std::sync::Arc;

use gild_core::{
    Diagnostic, LineIndex, MappingStore, TranspileConfig, TranspileError, TranspileResult,
};
use gild_passes::{ScopeOracle, TreePipeline, TypeOracle};
use gild_rewrite::{RewritePipeline, Rewritten};
use gild_syntax::{GoSyntax, StructuralParse, StructuralPrint};

/// Generated Go for one file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranspileOutput {
    pub code: String,
    /// Generated positions back to the Gild source, and the reverse.
    pub mappings: MappingStore,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct Transpiler {
    config: TranspileConfig,
    rewrite: RewritePipeline,
    tree: Arc<TreePipeline>,
    parser: Arc<dyn StructuralParse>,
    printer: Arc<dyn StructuralPrint>,
    oracle: Option<Arc<dyn TypeOracle>>,
}

impl Transpiler {
    /// The standard rewriters and plugins, tree-sitter-go and the scope oracle.
    pub fn new(config: TranspileConfig) -> TranspileResult<Self> {
        let syntax = Arc::new(GoSyntax);
        let oracle: Option<Arc<dyn TypeOracle>> = config
            .type_oracle
            .then(|| Arc::new(ScopeOracle) as Arc<dyn TypeOracle>);
        Ok(Self {
            rewrite: RewritePipeline::standard(&config),
            tree: TreePipeline::standard()?,
            parser: syntax.clone(),
            printer: syntax,
            oracle,
            config,
        })
    }

    /// Replace the tree stage, e.g. with extra plugins registered.
    pub fn with_tree_pipeline(mut self, tree: Arc<TreePipeline>) -> Self {
        self.tree = tree;
        self
    }

    pub fn with_syntax<S>(mut self, syntax: S) -> Self
    where
        S: StructuralParse + StructuralPrint + 'static,
    {
        let syntax = Arc::new(syntax);
        self.parser = syntax.clone();
        self.printer = syntax;
        self
    }

    /// Use `oracle` for type facts. Ignored when the configuration turns the
    /// oracle off.
    pub fn with_oracle(mut self, oracle: Arc<dyn TypeOracle>) -> Self {
        if self.config.type_oracle {
            self.oracle = Some(oracle);
        }
        self
    }

    pub fn config(&self) -> &TranspileConfig {
        &self.config
    }

    pub fn transpile(&self, source: &str) -> TranspileResult<TranspileOutput> {
        let Rewritten { text, mut mappings } = self.rewrite.run(source)?;
        let lines = LineIndex::new(&text);

        let tree = self.parser.parse(&text).map_err(|err| {
            let position = mappings.map_to_original(lines.position(err.offset));
            TranspileError::parse(position, err.message)
        })?;

        let output = self.tree.run(
            tree,
            &self.config,
            &mappings,
            self.oracle.clone(),
            self.parser.as_ref(),
        )?;
        let printed = self.printer.print(&output.tree, &output.declarations);

        // Back to front, so each splice's positions are still those of the parsed text.
        for splice in printed.splices.iter().rev() {
            mappings.apply_splice(
                lines.position(splice.start),
                lines.position(splice.end),
                &splice.replacement,
            );
        }

        tracing::debug!(
            splices = printed.splices.len(),
            declarations = output.declarations.len(),
            diagnostics = output.diagnostics.len(),
            "transpiled"
        );
        Ok(TranspileOutput {
            code: printed.text,
            mappings,
            diagnostics: output.diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gild_core::{ExhaustivenessMode, PassError, Position, TranspileErrorKind};

    fn transpile(source: &str) -> TranspileResult<TranspileOutput> {
        Transpiler::new(TranspileConfig::default())?.transpile(source)
    }

    #[test]
    fn test_plain_go_is_untouched() {
        let source = "package main\n\nfunc main() {\n\tprintln(1)\n}\n";
        let out = transpile(source).unwrap();
        assert_eq!(out.code, source);
        assert!(out.diagnostics.is_empty());
        assert_eq!(
            out.mappings.map_to_original(Position::new(4, 2)),
            Position::new(4, 2)
        );
    }

    #[test]
    fn test_let_and_option() {
        let source = "package main\n\nfunc find(xs []int) Option[int] {\n\tlet n = len(xs)\n\tif n == 0 {\n\t\treturn None\n\t}\n\treturn Some(xs[0])\n}\n";
        let out = transpile(source).unwrap();
        assert!(out.code.contains("func find(xs []int) Option_int {"));
        assert!(out.code.contains("\tn := len(xs)\n"));
        assert!(out.code.contains("return Option_int{tag: OptionTagNone}"));
        assert!(out.code.contains("type Option_int struct {"));
        // `return Some(..)` keeps pointing at its source line after the
        // declarations were injected above it.
        let generated = out
            .code
            .lines()
            .position(|line| line.starts_with("\treturn Option_int{tag: OptionTagSome"))
            .unwrap() as u32
            + 1;
        assert_eq!(
            out.mappings.map_to_original(Position::new(generated, 2)).line,
            8
        );
    }

    #[test]
    fn test_parse_error_points_at_original_source() {
        let source = "package main\n\nenum Bit {\n\tZero\n\tOne\n}\n\nfunc main() {\n\tvar x int = = 2\n}\n";
        let err = transpile(source).unwrap_err();
        assert!(matches!(err.kind(), TranspileErrorKind::Parse { .. }));
        // The enum expanded to many more lines; the error still names line 9,
        // inside `var x int = = 2`.
        let position = err.position().unwrap();
        assert_eq!(position.line, 9);
        assert!((2..=16).contains(&position.column), "column {}", position.column);
    }

    #[test]
    fn test_non_exhaustive_match_fails_or_warns() {
        let source = "package main\n\nenum Shape {\n\tCircle(r float64)\n\tRect(w, h float64)\n}\n\nfunc area(s Shape) float64 {\n\tmatch s {\n\t\tCircle(r) => return r\n\t}\n\treturn 0\n}\n";
        let err = transpile(source).unwrap_err();
        assert_eq!(
            err.pass_error(),
            Some(&PassError::Exhaustiveness {
                missing: vec!["Rect".to_string()],
                guarded: None,
            })
        );
        assert_eq!(err.position().map(|p| p.line), Some(9));

        let config = TranspileConfig {
            exhaustiveness: ExhaustivenessMode::Warn,
            ..TranspileConfig::default()
        };
        let out = Transpiler::new(config).unwrap().transpile(source).unwrap();
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].position.map(|p| p.line), Some(9));
    }
}
