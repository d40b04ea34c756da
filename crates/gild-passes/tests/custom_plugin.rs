//! Registering a plugin next to the built-in ones.

use gild_core::{MappingStore, PassError, TranspileConfig, TranspileErrorKind};
use gild_passes::{PassFailure, PipelineContext, Plugin, PluginDescriptor, Rewrite, TreePipeline, plugins};
use gild_syntax::{Declaration, GoSyntax, NodeId, StructuralParse, StructuralPrint};

/// Replaces `todo()` calls with a panic naming the enclosing function.
#[derive(Default)]
struct Todo {
    seen: usize,
}

impl Plugin for Todo {
    fn discover(&mut self, ctx: &mut PipelineContext<'_>) -> Result<(), PassFailure> {
        let tree = ctx.tree();
        self.seen = tree
            .pre_order(tree.root())
            .into_iter()
            .filter(|&n| tree.kind(n) == "call_expression" && tree.text(n) == "todo()")
            .count();
        Ok(())
    }

    fn transform(&mut self, ctx: &mut PipelineContext<'_>, node: NodeId) -> Result<Rewrite, PassFailure> {
        if ctx.tree().kind(node) != "call_expression" || ctx.tree().text(node) != "todo()" {
            return Ok(Rewrite::Unchanged);
        }
        let function = ctx
            .ancestors(node)
            .find(|&a| ctx.tree().kind(a) == "function_declaration")
            .and_then(|f| ctx.tree().child_by_field(f, "name"))
            .map(|name| ctx.tree().text(name))
            .ok_or_else(|| PassError::invalid("`todo()` outside a function"))?;
        let panic = ctx.synthetic("call_expression", format!("gildTodo({function:?})"))?;
        ctx.replace(node, panic)?;
        Ok(Rewrite::Replaced(panic))
    }

    fn declarations(&mut self, _ctx: &mut PipelineContext<'_>) -> Result<Vec<Declaration>, PassFailure> {
        if self.seen == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![Declaration::new(
            "gildTodo",
            "func gildTodo(name string) {\n\tpanic(\"not implemented: \" + name)\n}",
        )])
    }
}

fn pipeline() -> TreePipeline {
    let mut registered = vec![
        PluginDescriptor::new("todo", Todo::default)
            .depends_on("sum-types")
            .with_transform()
            .with_declarations(),
    ];
    registered.extend(plugins::standard());
    TreePipeline::new(registered).unwrap()
}

fn lower(pipeline: &TreePipeline, source: &str) -> gild_core::TranspileResult<String> {
    let config = TranspileConfig::default();
    let mappings = MappingStore::identity(source);
    let tree = GoSyntax.parse(source).unwrap();
    let out = pipeline.run(tree, &config, &mappings, None, &GoSyntax)?;
    Ok(GoSyntax.print(&out.tree, &out.declarations).text)
}

#[test]
fn test_custom_plugin_runs_after_its_dependency() {
    assert_eq!(
        pipeline().names(),
        ["enum-registry", "sum-types", "todo", "match-exhaustiveness"]
    );
}

#[test]
fn test_custom_plugin_output() {
    let source = "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tfmt.Println(1)\n\ttodo()\n}\n";
    let out = lower(&pipeline(), source).unwrap();
    insta::assert_snapshot!(out, @r#"
    package main

    import "fmt"

    func gildTodo(name string) {
    	panic("not implemented: " + name)
    }

    func main() {
    	fmt.Println(1)
    	gildTodo("main")
    }
    "#);
}

#[test]
fn test_plugin_failure_aborts_the_file() {
    let source = "package main\n\nvar x = todo()\n";
    let err = lower(&pipeline(), source).unwrap_err();
    assert!(matches!(err.kind(), TranspileErrorKind::Transform { plugin, .. } if plugin == "todo"));
    assert_eq!(err.to_string(), "3:9: [todo] `todo()` outside a function");
}
