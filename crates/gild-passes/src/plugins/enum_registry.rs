use gild_core::EnumMarker;

use crate::context::PipelineContext;
use crate::plugin::{PassFailure, Plugin};

pub const NAME: &str = "enum-registry";

/// Reads the `// gild:enum` markers left by the rewrite stage into the
/// synthetic registry, then adds the built-in families the file does not
/// redefine.
#[derive(Debug, Default)]
pub struct EnumRegistry;

impl Plugin for EnumRegistry {
    fn discover(&mut self, ctx: &mut PipelineContext<'_>) -> Result<(), PassFailure> {
        let tree = ctx.tree();
        let markers: Vec<EnumMarker> = tree
            .pre_order(tree.root())
            .into_iter()
            .filter(|&node| tree.kind(node) == "comment")
            .filter_map(|node| EnumMarker::parse(&tree.text(node)))
            .collect();
        let count = markers.len();
        let registry = ctx.registry_mut()?;
        for marker in markers {
            registry.register_union(marker);
        }
        registry.register_builtins();
        tracing::debug!(unions = count, "registered unions");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gild_core::{MappingStore, TranspileConfig};
    use gild_syntax::{GoSyntax, StructuralParse};

    #[test]
    fn test_markers_and_builtins() {
        let source = "package p\n\n// gild:enum Shape Circle/1 Empty/0\ntype ShapeTag uint8\n\n// gild:enum Option Present/1 Absent/0\ntype OptionTag uint8\n";
        let config = TranspileConfig::default();
        let mappings = MappingStore::identity(source);
        let mut ctx = PipelineContext::new(GoSyntax.parse(source).unwrap(), &config, &mappings, None);
        EnumRegistry.discover(&mut ctx).unwrap();

        let registry = ctx.registry();
        assert_eq!(registry.union("Shape").unwrap().arity("Circle"), Some(1));
        assert_eq!(registry.tag_const("ShapeTagEmpty"), Some(("Shape", "Empty")));
        assert!(!registry.is_builtin("Option"));
        assert_eq!(registry.union("Option").unwrap().arity("Present"), Some(1));
        assert!(registry.is_builtin("Result"));
    }
}
