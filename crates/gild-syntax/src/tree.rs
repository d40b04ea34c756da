//! An editable, arena-allocated concrete syntax tree.
//!
//! Parsed nodes keep the byte span they cover in [`SyntaxTree::source`].
//! Plugins edit the tree by swapping a child for a *synthetic* node, a leaf
//! that carries its own text, or by inserting synthetic children. Nothing is
//! ever re-lexed: printing splices synthetic text over the original spans.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Child {
    pub(crate) node: NodeId,
    pub(crate) field: Option<&'static str>,
    /// The source span this child occupied when parsed. `None` for inserted children.
    pub(crate) slot: Option<Range<usize>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct NodeData {
    pub(crate) kind: &'static str,
    pub(crate) named: bool,
    pub(crate) span: Option<Range<usize>>,
    /// Text of a synthetic node.
    pub(crate) text: Option<String>,
    pub(crate) children: Vec<Child>,
    /// Set when some descendant slot holds different content than was parsed.
    pub(crate) edited: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntaxTree {
    source: String,
    nodes: Vec<NodeData>,
    root: NodeId,
}

/// Starts and finishes nodes in pre-order; used by parsers to fill a tree.
pub struct TreeBuilder {
    nodes: Vec<NodeData>,
    stack: Vec<(NodeId, Option<&'static str>)>,
    root: Option<NodeId>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            stack: Vec::new(),
            root: None,
        }
    }

    pub fn start_node(&mut self, kind: &'static str, named: bool, span: Range<usize>, field: Option<&'static str>) {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            kind,
            named,
            span: Some(span),
            text: None,
            children: Vec::new(),
            edited: false,
        });
        self.stack.push((id, field));
    }

    pub fn finish_node(&mut self) {
        let Some((id, field)) = self.stack.pop() else {
            return;
        };
        match self.stack.last() {
            Some(&(parent, _)) => {
                let slot = self.nodes[id.index()].span.clone();
                self.nodes[parent.index()].children.push(Child { node: id, field, slot });
            }
            None => self.root = Some(id),
        }
    }

    /// Finish the tree. The root always spans the whole source.
    pub fn finish(mut self, source: impl Into<String>) -> SyntaxTree {
        let source = source.into();
        while !self.stack.is_empty() {
            self.finish_node();
        }
        let root = match self.root {
            Some(root) => root,
            None => {
                self.start_node("source_file", true, 0..source.len(), None);
                self.finish_node();
                NodeId(self.nodes.len() as u32 - 1)
            }
        };
        self.nodes[root.index()].span = Some(0..source.len());
        SyntaxTree {
            source,
            nodes: self.nodes,
            root,
        }
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntaxTree {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &'static str {
        self.data(id).kind
    }

    pub fn is_named(&self, id: NodeId) -> bool {
        self.data(id).named
    }

    pub fn is_synthetic(&self, id: NodeId) -> bool {
        self.data(id).text.is_some()
    }

    /// Byte span in [`source`](Self::source); `None` for synthetic nodes.
    pub fn span(&self, id: NodeId) -> Option<Range<usize>> {
        self.data(id).span.clone()
    }

    /// Source text of a parsed node as it was parsed, ignoring later edits.
    pub fn source_text(&self, id: NodeId) -> Option<&str> {
        self.data(id).span.clone().map(|span| &self.source[span])
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.data(id).children.iter().map(|c| c.node)
    }

    pub fn named_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id).filter(|&c| self.is_named(c) && self.kind(c) != "comment")
    }

    pub fn child_by_field(&self, id: NodeId, field: &str) -> Option<NodeId> {
        self.children_by_field(id, field).next()
    }

    pub fn children_by_field<'a>(&'a self, id: NodeId, field: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.data(id)
            .children
            .iter()
            .filter(move |c| c.field == Some(field))
            .map(|c| c.node)
    }

    /// The first child of kind `kind`.
    pub fn child_of_kind(&self, id: NodeId, kind: &str) -> Option<NodeId> {
        self.children(id).find(|&c| self.kind(c) == kind)
    }

    /// Every node reachable from `id`, parents before children.
    pub fn pre_order(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            let children = &self.data(node).children;
            stack.extend(children.iter().rev().map(|c| c.node));
        }
        out
    }

    /// Every node reachable from the root, children before parents.
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root, false)];
        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                out.push(node);
                continue;
            }
            stack.push((node, true));
            let children = &self.data(node).children;
            stack.extend(children.iter().rev().map(|c| (c.node, false)));
        }
        out
    }

    /// Identifier spellings anywhere in the parsed source.
    pub fn identifiers(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| n.kind.ends_with("identifier"))
            .filter_map(|n| n.span.clone().map(|span| &self.source[span]))
            .collect()
    }

    /// The current text of `id`, with every edit below it applied.
    pub fn text(&self, id: NodeId) -> String {
        let data = self.data(id);
        if let Some(text) = &data.text {
            return text.clone();
        }
        let Some(span) = data.span.clone() else {
            return String::new();
        };
        if !data.edited {
            return self.source[span].to_string();
        }
        let mut splices = Vec::new();
        self.collect_splices(id, &mut splices);
        apply_splices(&self.source[span.clone()], span.start, &splices)
    }

    /// Replacements that turn the parsed text of `id` into its current text.
    pub(crate) fn collect_splices(&self, id: NodeId, out: &mut Vec<Splice>) {
        let data = self.data(id);
        let Some(span) = data.span.clone() else {
            return;
        };
        if !data.edited {
            return;
        }
        let mut cursor = span.start;
        for child in &data.children {
            match &child.slot {
                Some(slot) if self.span(child.node).as_ref() == Some(slot) => {
                    self.collect_splices(child.node, out);
                    cursor = slot.end;
                }
                Some(slot) => {
                    out.push(Splice {
                        start: slot.start,
                        end: slot.end,
                        replacement: self.text(child.node),
                    });
                    cursor = slot.end;
                }
                None => out.push(Splice {
                    start: cursor,
                    end: cursor,
                    replacement: self.text(child.node),
                }),
            }
        }
    }

    /// A detached leaf carrying `text`.
    pub fn synthetic(&mut self, kind: &'static str, text: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            kind,
            named: true,
            span: None,
            text: Some(text.into()),
            children: Vec::new(),
            edited: false,
        });
        id
    }

    /// Put `new` in the slot `old` occupies under `parent`. Returns false when
    /// `old` is not a child of `parent`.
    pub fn replace_child(&mut self, parents: &ParentIndex, parent: NodeId, old: NodeId, new: NodeId) -> bool {
        let Some(child) = self.nodes[parent.index()]
            .children
            .iter_mut()
            .find(|c| c.node == old)
        else {
            return false;
        };
        child.node = new;
        self.mark_edited(parents, parent);
        true
    }

    /// Insert `new` as the child at `index` of `parent`.
    pub fn insert_child(&mut self, parents: &ParentIndex, parent: NodeId, index: usize, new: NodeId) {
        let children = &mut self.nodes[parent.index()].children;
        let index = index.min(children.len());
        children.insert(
            index,
            Child {
                node: new,
                field: None,
                slot: None,
            },
        );
        self.mark_edited(parents, parent);
    }

    fn mark_edited(&mut self, parents: &ParentIndex, from: NodeId) {
        let mut current = Some(from);
        while let Some(node) = current {
            if self.nodes[node.index()].edited {
                break;
            }
            self.nodes[node.index()].edited = true;
            current = parents.parent(node);
        }
    }
}

/// A replacement of the source bytes `start..end`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Splice {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
}

/// Apply `splices` (sorted, non-overlapping, offsets relative to `base`) to `text`.
pub fn apply_splices(text: &str, base: usize, splices: &[Splice]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for splice in splices {
        let start = splice.start - base;
        out.push_str(&text[last..start]);
        out.push_str(&splice.replacement);
        last = splice.end - base;
    }
    out.push_str(&text[last..]);
    out
}

/// Child → parent links for the current shape of a tree.
#[derive(Clone, Debug, Default)]
pub struct ParentIndex {
    parents: HashMap<NodeId, NodeId>,
}

impl ParentIndex {
    pub fn build(tree: &SyntaxTree) -> Self {
        let mut parents = HashMap::with_capacity(tree.len());
        for node in tree.pre_order(tree.root()) {
            for child in tree.children(node) {
                parents.insert(child, node);
            }
        }
        Self { parents }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(&id).copied()
    }

    /// Parents of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), |&node| self.parent(node))
    }
}
