//! The plugin interface of the tree stage.
//!
//! A plugin is registered through a [`PluginDescriptor`] that names it, lists
//! the plugins it depends on and declares which optional phases it takes
//! part in. The pipeline builds a fresh plugin object from the descriptor's
//! factory for every file, so plugin state never leaks between files.

use std::fmt;
use std::sync::Arc;

use gild_core::{PassError, TranspileConfig};
use gild_syntax::{Declaration, NodeId};

use crate::context::PipelineContext;
use crate::types::SyntheticRegistry;

/// What a plugin did with a node offered during Transform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rewrite {
    Unchanged,
    /// Children were inserted or replaced below the node.
    Edited,
    /// The node was replaced (through [`PipelineContext::replace`]) by this one.
    Replaced(NodeId),
}

/// A plugin failure, optionally pinned to a byte offset in the parsed text.
///
/// Without an offset the pipeline reports the position of the node being
/// processed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassFailure {
    pub cause: PassError,
    pub at: Option<usize>,
}

impl PassFailure {
    pub fn at(offset: usize, cause: PassError) -> Self {
        Self {
            cause,
            at: Some(offset),
        }
    }
}

impl From<PassError> for PassFailure {
    fn from(cause: PassError) -> Self {
        Self { cause, at: None }
    }
}

/// Read-only view shared with plugins once Discovery has finished.
#[derive(Clone, Copy)]
pub struct SharedContext<'a> {
    pub registry: &'a SyntheticRegistry,
    pub config: &'a TranspileConfig,
}

pub trait Plugin {
    /// Record facts about the file. The tree is read-only here.
    fn discover(&mut self, ctx: &mut PipelineContext<'_>) -> Result<(), PassFailure>;

    fn receive_context(&mut self, _shared: &SharedContext<'_>) {}

    fn transform(&mut self, _ctx: &mut PipelineContext<'_>, _node: NodeId) -> Result<Rewrite, PassFailure> {
        Ok(Rewrite::Unchanged)
    }

    fn declarations(&mut self, _ctx: &mut PipelineContext<'_>) -> Result<Vec<Declaration>, PassFailure> {
        Ok(Vec::new())
    }
}

/// The optional phases a plugin takes part in. Discovery is always run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub transform: bool,
    pub declarations: bool,
    pub shared_context: bool,
}

type PluginFactory = Arc<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

#[derive(Clone)]
pub struct PluginDescriptor {
    pub name: &'static str,
    pub depends_on: Vec<&'static str>,
    pub capabilities: Capabilities,
    factory: PluginFactory,
}

impl PluginDescriptor {
    pub fn new<P, F>(name: &'static str, factory: F) -> Self
    where
        P: Plugin + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        Self {
            name,
            depends_on: Vec::new(),
            capabilities: Capabilities::default(),
            factory: Arc::new(move || Box::new(factory()) as Box<dyn Plugin>),
        }
    }

    pub fn depends_on(mut self, name: &'static str) -> Self {
        self.depends_on.push(name);
        self
    }

    pub fn with_transform(mut self) -> Self {
        self.capabilities.transform = true;
        self
    }

    pub fn with_declarations(mut self) -> Self {
        self.capabilities.declarations = true;
        self
    }

    pub fn with_shared_context(mut self) -> Self {
        self.capabilities.shared_context = true;
        self
    }

    pub fn instantiate(&self) -> Box<dyn Plugin> {
        (self.factory)()
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("depends_on", &self.depends_on)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}
