//! The tree transform stage.
//!
//! A [`TreePipeline`] runs registered plugins over a parsed file in three
//! phases: Discovery records facts on a read-only tree, Transform rewrites
//! nodes bottom-up one plugin at a time, and Inject collects the top-level
//! declarations the plugins need. The built-in plugins lower `Option` and
//! `Result` and verify that lowered `match` statements are exhaustive.

pub mod addressability;
mod context;
pub mod exhaustiveness;
mod pipeline;
mod plugin;
pub mod plugins;
mod schedule;
pub mod types;

pub use context::PipelineContext;
pub use pipeline::{TreeOutput, TreePipeline};
pub use plugin::{Capabilities, PassFailure, Plugin, PluginDescriptor, Rewrite, SharedContext};
pub use schedule::schedule;
pub use types::{GoType, ScopeOracle, SyntheticRegistry, TypeFactCache, TypeFacts, TypeOracle};
