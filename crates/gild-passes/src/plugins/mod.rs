//! The built-in tree plugins.

mod enum_registry;
mod match_check;
mod sum_types;

pub use enum_registry::EnumRegistry;
pub use match_check::MatchExhaustiveness;
pub use sum_types::SumTypes;

use crate::plugin::PluginDescriptor;

/// The standard plugin set, in registration order.
pub fn standard() -> Vec<PluginDescriptor> {
    vec![
        PluginDescriptor::new(enum_registry::NAME, EnumRegistry::default),
        PluginDescriptor::new(sum_types::NAME, SumTypes::default)
            .depends_on(enum_registry::NAME)
            .with_transform()
            .with_declarations()
            .with_shared_context(),
        PluginDescriptor::new(match_check::NAME, MatchExhaustiveness::default)
            .depends_on(enum_registry::NAME)
            .with_transform()
            .with_shared_context(),
    ]
}
