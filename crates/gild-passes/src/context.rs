//! Per-file state handed to tree plugins.

use std::sync::Arc;

use gild_core::{
    CompilationPhase, Diagnostic, FreshNames, LineIndex, MappingStore, PassError, Position,
    TranspileConfig,
};
use gild_syntax::{NodeId, ParentIndex, SyntaxTree};

use crate::types::{GoType, SyntheticRegistry, TypeFactCache, TypeOracle};

/// Everything a plugin may see or touch while one file is transformed.
///
/// Built fresh for each file. The tree may only be mutated during the
/// Transform phase; every other phase sees it read-only.
pub struct PipelineContext<'a> {
    tree: SyntaxTree,
    parents: ParentIndex,
    types: TypeFactCache,
    config: &'a TranspileConfig,
    diagnostics: Vec<Diagnostic>,
    names: FreshNames,
    mappings: &'a MappingStore,
    lines: LineIndex,
    phase: CompilationPhase,
}

impl<'a> PipelineContext<'a> {
    pub fn new(
        tree: SyntaxTree,
        config: &'a TranspileConfig,
        mappings: &'a MappingStore,
        oracle: Option<Arc<dyn TypeOracle>>,
    ) -> Self {
        let parents = ParentIndex::build(&tree);
        let names = FreshNames::new(tree.identifiers());
        let lines = LineIndex::new(tree.source());
        Self {
            tree,
            parents,
            types: TypeFactCache::new(oracle),
            config,
            diagnostics: Vec::new(),
            names,
            mappings,
            lines,
            phase: CompilationPhase::Discovery,
        }
    }

    pub fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> Result<&mut SyntaxTree, PassError> {
        self.check_transform()?;
        Ok(&mut self.tree)
    }

    pub fn config(&self) -> &TranspileConfig {
        self.config
    }

    pub fn phase(&self) -> CompilationPhase {
        self.phase
    }

    pub(crate) fn enter(&mut self, phase: CompilationPhase) {
        tracing::trace!(?phase, "entering phase");
        self.phase = phase;
    }

    fn check_transform(&self) -> Result<(), PassError> {
        match self.phase {
            CompilationPhase::Transform => Ok(()),
            _ => Err(PassError::PhaseViolation),
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.parents.parent(node)
    }

    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.parents.ancestors(node)
    }

    /// Rebuild parent links after the tree changed shape.
    pub(crate) fn reindex(&mut self) {
        self.parents = ParentIndex::build(&self.tree);
    }

    /// A detached node carrying `text`, to be placed with [`replace`](Self::replace).
    pub fn synthetic(&mut self, kind: &'static str, text: impl Into<String>) -> Result<NodeId, PassError> {
        self.check_transform()?;
        Ok(self.tree.synthetic(kind, text))
    }

    /// Put `new` where `old` sits in the tree.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> Result<(), PassError> {
        self.check_transform()?;
        let parent = self
            .parents
            .parent(old)
            .ok_or_else(|| PassError::invalid(format!("node {old} has no parent")))?;
        if !self.tree.replace_child(&self.parents, parent, old, new) {
            return Err(PassError::invalid(format!("node {old} is not a child of {parent}")));
        }
        Ok(())
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, new: NodeId) -> Result<(), PassError> {
        self.check_transform()?;
        self.tree.insert_child(&self.parents, parent, index, new);
        Ok(())
    }

    pub fn type_of(&mut self, node: NodeId) -> Option<GoType> {
        self.types.type_of(&self.tree, node)
    }

    pub fn require_type(&mut self, node: NodeId) -> Result<GoType, PassError> {
        self.types.require_type(&self.tree, node)
    }

    pub fn types(&mut self) -> (&SyntaxTree, &mut TypeFactCache) {
        (&self.tree, &mut self.types)
    }

    pub fn registry(&self) -> &SyntheticRegistry {
        self.types.registry()
    }

    /// The registry is filled during Discovery only.
    pub fn registry_mut(&mut self) -> Result<&mut SyntheticRegistry, PassError> {
        match self.phase {
            CompilationPhase::Discovery => Ok(self.types.registry_mut()),
            _ => Err(PassError::PhaseViolation),
        }
    }

    pub fn fresh_name(&mut self, prefix: &str) -> String {
        self.names.fresh(prefix)
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Original-source position of a byte offset in the parsed text.
    pub fn original_position(&self, offset: usize) -> Position {
        self.mappings.map_to_original(self.lines.position(offset))
    }

    /// Original-source position of a parsed node; synthetic nodes report their
    /// nearest parsed ancestor.
    pub fn node_position(&self, node: NodeId) -> Position {
        std::iter::once(node)
            .chain(self.parents.ancestors(node))
            .find_map(|n| self.tree.span(n))
            .map_or(Position::new(1, 1), |span| self.original_position(span.start))
    }

    pub(crate) fn into_parts(self) -> (SyntaxTree, Vec<Diagnostic>) {
        (self.tree, self.diagnostics)
    }
}
