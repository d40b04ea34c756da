//! Dependency ordering of plugins.

use std::collections::{BTreeSet, HashMap};

use gild_core::{TranspileError, TranspileResult};

use crate::plugin::PluginDescriptor;

/// Order `plugins` so every plugin runs after its dependencies.
///
/// Kahn's algorithm; among plugins that are ready at the same time the one
/// registered first goes first. Returns indices into `plugins`.
pub fn schedule(plugins: &[PluginDescriptor]) -> TranspileResult<Vec<usize>> {
    let mut index_of = HashMap::with_capacity(plugins.len());
    for (index, plugin) in plugins.iter().enumerate() {
        if index_of.insert(plugin.name, index).is_some() {
            return Err(TranspileError::plugin_dependency(
                vec![plugin.name.to_string()],
                format!("plugin `{}` is registered twice", plugin.name),
            ));
        }
    }

    let mut in_degree = vec![0usize; plugins.len()];
    let mut dependents = vec![Vec::new(); plugins.len()];
    for (index, plugin) in plugins.iter().enumerate() {
        for dependency in &plugin.depends_on {
            let Some(&target) = index_of.get(dependency) else {
                return Err(TranspileError::plugin_dependency(
                    vec![plugin.name.to_string(), dependency.to_string()],
                    format!("plugin `{}` depends on unknown plugin `{dependency}`", plugin.name),
                ));
            };
            in_degree[index] += 1;
            dependents[target].push(index);
        }
    }

    let mut ready: BTreeSet<usize> = (0..plugins.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(plugins.len());
    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &dependent in &dependents[next] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() < plugins.len() {
        let stuck: Vec<String> = (0..plugins.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| plugins[i].name.to_string())
            .collect();
        return Err(TranspileError::plugin_dependency(
            stuck.clone(),
            format!("dependency cycle among {}", stuck.join(", ")),
        ));
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PipelineContext;
    use crate::plugin::{PassFailure, Plugin};
    use gild_core::TranspileErrorKind;

    struct Noop;

    impl Plugin for Noop {
        fn discover(&mut self, _ctx: &mut PipelineContext<'_>) -> Result<(), PassFailure> {
            Ok(())
        }
    }

    fn plugin(name: &'static str, deps: &[&'static str]) -> PluginDescriptor {
        deps.iter()
            .fold(PluginDescriptor::new(name, || Noop), |d, &dep| d.depends_on(dep))
    }

    fn names(plugins: &[PluginDescriptor]) -> Vec<&'static str> {
        schedule(plugins)
            .unwrap()
            .into_iter()
            .map(|i| plugins[i].name)
            .collect()
    }

    #[test]
    fn test_dependency_runs_first() {
        let plugins = [plugin("b", &["a"]), plugin("a", &[])];
        assert_eq!(names(&plugins), ["a", "b"]);
    }

    #[test]
    fn test_ties_follow_registration() {
        let plugins = [
            plugin("c", &["root"]),
            plugin("root", &[]),
            plugin("a", &["root"]),
            plugin("z", &[]),
        ];
        assert_eq!(names(&plugins), ["root", "c", "a", "z"]);
    }

    #[test]
    fn test_cycle_names_the_plugins() {
        let plugins = [plugin("x", &["y"]), plugin("y", &["x"]), plugin("free", &[])];
        let err = schedule(&plugins).unwrap_err();
        let TranspileErrorKind::PluginDependency { plugins, .. } = err.kind() else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(plugins, &["x", "y"]);
        assert_eq!(err.to_string(), "plugin dependency error: dependency cycle among x, y");
    }

    #[test]
    fn test_missing_dependency() {
        let err = schedule(&[plugin("x", &["ghost"])]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "plugin dependency error: plugin `x` depends on unknown plugin `ghost`"
        );
    }

    #[test]
    fn test_duplicate_name() {
        let err = schedule(&[plugin("x", &[]), plugin("x", &[])]).unwrap_err();
        assert!(matches!(err.kind(), TranspileErrorKind::PluginDependency { .. }));
    }
}
