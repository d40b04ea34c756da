//! The three-phase tree pipeline: Discovery, Transform, Inject.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use gild_core::{
    CompilationPhase, Diagnostic, MappingStore, Position, TranspileConfig, TranspileError,
    TranspileResult,
};
use gild_syntax::{Declaration, NodeId, StructuralParse, SyntaxTree};

use crate::context::PipelineContext;
use crate::plugin::{PassFailure, Plugin, PluginDescriptor, Rewrite, SharedContext};
use crate::plugins;
use crate::schedule::schedule;
use crate::types::TypeOracle;

/// Result of running the tree stage over one file.
#[derive(Debug)]
pub struct TreeOutput {
    pub tree: SyntaxTree,
    /// Top-level declarations to merge into the file when printing.
    pub declarations: Vec<Declaration>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Registered plugins in dependency order. Immutable once built.
#[derive(Debug)]
pub struct TreePipeline {
    plugins: Vec<PluginDescriptor>,
}

static STANDARD: LazyLock<TranspileResult<Arc<TreePipeline>>> =
    LazyLock::new(|| TreePipeline::new(plugins::standard()).map(Arc::new));

impl TreePipeline {
    pub fn new(plugins: Vec<PluginDescriptor>) -> TranspileResult<Self> {
        let order = schedule(&plugins)?;
        let mut slots: Vec<Option<PluginDescriptor>> = plugins.into_iter().map(Some).collect();
        let plugins = order.into_iter().filter_map(|index| slots[index].take()).collect();
        Ok(Self { plugins })
    }

    /// The built-in plugins, scheduled once per process.
    pub fn standard() -> TranspileResult<Arc<TreePipeline>> {
        STANDARD.clone()
    }

    /// Plugin names in the order they run.
    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name).collect()
    }

    pub fn run(
        &self,
        tree: SyntaxTree,
        config: &TranspileConfig,
        mappings: &MappingStore,
        oracle: Option<Arc<dyn TypeOracle>>,
        parser: &dyn StructuralParse,
    ) -> TranspileResult<TreeOutput> {
        let mut ctx = PipelineContext::new(tree, config, mappings, oracle);
        let mut active: Vec<(&PluginDescriptor, Box<dyn Plugin>)> =
            self.plugins.iter().map(|d| (d, d.instantiate())).collect();

        ctx.enter(CompilationPhase::Discovery);
        for (descriptor, plugin) in &mut active {
            plugin.discover(&mut ctx).map_err(|failure| {
                let position = failure.at.map_or(Position::new(1, 1), |at| ctx.original_position(at));
                TranspileError::discovery(descriptor.name, position, failure.cause)
            })?;
        }
        tracing::debug!(plugins = active.len(), "discovery finished");

        let shared = SharedContext {
            registry: ctx.registry(),
            config,
        };
        for (_, plugin) in active.iter_mut().filter(|(d, _)| d.capabilities.shared_context) {
            plugin.receive_context(&shared);
        }

        ctx.enter(CompilationPhase::Transform);
        for (descriptor, plugin) in active.iter_mut().filter(|(d, _)| d.capabilities.transform) {
            transform(&mut ctx, descriptor.name, plugin.as_mut())?;
        }

        ctx.enter(CompilationPhase::Inject);
        let declarations = inject(&mut ctx, &mut active, parser)?;

        let (tree, diagnostics) = ctx.into_parts();
        Ok(TreeOutput {
            tree,
            declarations,
            diagnostics,
        })
    }
}

fn transform(ctx: &mut PipelineContext<'_>, name: &str, plugin: &mut dyn Plugin) -> TranspileResult<()> {
    ctx.reindex();
    let nodes: Vec<NodeId> = ctx.tree().post_order();
    let (mut replaced, mut edited) = (0usize, 0usize);
    for node in nodes {
        match plugin.transform(ctx, node) {
            Ok(Rewrite::Unchanged) => {}
            Ok(Rewrite::Edited) => edited += 1,
            Ok(Rewrite::Replaced(new)) => {
                tracing::trace!(plugin = name, %node, %new, "replaced");
                replaced += 1;
            }
            Err(PassFailure { cause, at }) => {
                let position = match at {
                    Some(offset) => ctx.original_position(offset),
                    None => ctx.node_position(node),
                };
                return Err(TranspileError::transform(name, position, cause));
            }
        }
    }
    tracing::debug!(plugin = name, replaced, edited, "transform finished");
    Ok(())
}

/// Names declared at the top level of the parsed file.
fn top_level_names(tree: &SyntaxTree) -> HashSet<String> {
    let mut names = HashSet::new();
    for decl in tree.children(tree.root()) {
        match tree.kind(decl) {
            "function_declaration" => names.extend(tree.child_by_field(decl, "name").map(|n| tree.text(n))),
            "type_declaration" | "var_declaration" | "const_declaration" => {
                for node in tree.pre_order(decl) {
                    if matches!(tree.kind(node), "type_spec" | "type_alias" | "var_spec" | "const_spec") {
                        names.extend(tree.children_by_field(node, "name").map(|n| tree.text(n)));
                    }
                }
            }
            _ => {}
        }
    }
    names
}

fn inject(
    ctx: &mut PipelineContext<'_>,
    active: &mut [(&PluginDescriptor, Box<dyn Plugin>)],
    parser: &dyn StructuralParse,
) -> TranspileResult<Vec<Declaration>> {
    let mut taken = top_level_names(ctx.tree());
    let mut declarations = Vec::new();
    for (descriptor, plugin) in active.iter_mut().filter(|(d, _)| d.capabilities.declarations) {
        let provided = plugin
            .declarations(ctx)
            .map_err(|failure| TranspileError::inject(descriptor.name, "*", failure.cause))?;
        for declaration in provided {
            if !taken.insert(declaration.name.clone()) {
                return Err(TranspileError::inject(
                    descriptor.name,
                    &declaration.name,
                    "the name is already declared",
                ));
            }
            parser
                .parse(&format!("package p\n\n{}\n", declaration.text))
                .map_err(|err| TranspileError::inject(descriptor.name, &declaration.name, err))?;
            declarations.push(declaration);
        }
        tracing::debug!(plugin = descriptor.name, total = declarations.len(), "declarations collected");
    }
    Ok(declarations)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use gild_core::{PassError, TranspileErrorKind};
    use gild_syntax::GoSyntax;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Logs its phases and optionally misbehaves.
    struct Probe {
        name: &'static str,
        log: Log,
        declaration: Option<Declaration>,
        mutate_in_discovery: bool,
    }

    impl Plugin for Probe {
        fn discover(&mut self, ctx: &mut PipelineContext<'_>) -> Result<(), PassFailure> {
            self.log.lock().unwrap().push(format!("discover {}", self.name));
            if self.mutate_in_discovery {
                ctx.tree_mut()?;
            }
            Ok(())
        }

        fn transform(&mut self, ctx: &mut PipelineContext<'_>, node: NodeId) -> Result<Rewrite, PassFailure> {
            if ctx.tree().kind(node) == "int_literal" && ctx.tree().text(node) == "1" {
                self.log.lock().unwrap().push(format!("transform {}", self.name));
                let two = ctx.synthetic("int_literal", "2")?;
                ctx.replace(node, two)?;
                return Ok(Rewrite::Replaced(two));
            }
            if ctx.tree().text(node) == "boom" {
                return Err(PassError::invalid("boom").into());
            }
            Ok(Rewrite::Unchanged)
        }

        fn declarations(&mut self, _ctx: &mut PipelineContext<'_>) -> Result<Vec<Declaration>, PassFailure> {
            Ok(self.declaration.iter().cloned().collect())
        }
    }

    fn recorder(name: &'static str, log: &Log) -> PluginDescriptor {
        let log = log.clone();
        PluginDescriptor::new(name, move || Probe {
            name,
            log: log.clone(),
            declaration: None,
            mutate_in_discovery: false,
        })
    }

    fn run(pipeline: &TreePipeline, source: &str) -> TranspileResult<TreeOutput> {
        let config = TranspileConfig::default();
        let mappings = MappingStore::identity(source);
        let tree = GoSyntax.parse(source).unwrap();
        pipeline.run(tree, &config, &mappings, None, &GoSyntax)
    }

    #[test]
    fn test_dependencies_discover_first() {
        let log = Log::default();
        let pipeline = TreePipeline::new(vec![
            recorder("b", &log).depends_on("a").with_transform(),
            recorder("a", &log).with_transform(),
        ])
        .unwrap();
        assert_eq!(pipeline.names(), ["a", "b"]);

        let out = run(&pipeline, "package p\n\nvar x = 1\n").unwrap();
        // The replacement made by `a` is not offered to `b` as a `1`.
        assert_eq!(
            *log.lock().unwrap(),
            ["discover a", "discover b", "transform a"]
        );
        assert_eq!(out.tree.text(out.tree.root()), "package p\n\nvar x = 2\n");
    }

    #[test]
    fn test_transform_failure_names_plugin_and_position() {
        let log = Log::default();
        let pipeline = TreePipeline::new(vec![recorder("p", &log).with_transform()]).unwrap();
        let err = run(&pipeline, "package p\n\nvar x = boom\n").unwrap_err();
        assert_eq!(err.to_string(), "3:9: [p] boom");
    }

    #[test]
    fn test_discovery_cannot_mutate() {
        let log = Log::default();
        let log2 = log.clone();
        let pipeline = TreePipeline::new(vec![PluginDescriptor::new("m", move || Probe {
            name: "m",
            log: log2.clone(),
            declaration: None,
            mutate_in_discovery: true,
        })])
        .unwrap();
        let err = run(&pipeline, "package p\n").unwrap_err();
        assert_eq!(err.pass_error(), Some(&PassError::PhaseViolation));
    }

    #[test]
    fn test_injected_declarations_are_validated() {
        let with = |declaration: Declaration| {
            PluginDescriptor::new("decl", move || Probe {
                name: "decl",
                log: Log::default(),
                declaration: Some(declaration.clone()),
                mutate_in_discovery: false,
            })
            .with_declarations()
        };

        let good = TreePipeline::new(vec![with(Declaration::new("T", "type T int"))]).unwrap();
        let out = run(&good, "package p\n").unwrap();
        assert_eq!(out.declarations, [Declaration::new("T", "type T int")]);

        let broken = TreePipeline::new(vec![with(Declaration::new("T", "type T = ="))]).unwrap();
        let err = run(&broken, "package p\n").unwrap_err();
        assert!(matches!(err.kind(), TranspileErrorKind::Inject { declaration, .. } if declaration == "T"));

        let clash = TreePipeline::new(vec![with(Declaration::new("T", "type T int"))]).unwrap();
        let err = run(&clash, "package p\n\nfunc T() {}\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "[decl] cannot inject `T`: the name is already declared"
        );
    }

    #[test]
    fn test_standard_schedule() {
        let pipeline = TreePipeline::standard().unwrap();
        assert_eq!(pipeline.names(), ["enum-registry", "sum-types", "match-exhaustiveness"]);
    }
}
