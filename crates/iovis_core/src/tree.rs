//! The collection tree the scheduler and regrouper work on.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Detaching a node unlinks it from its parent but keeps it
//! in the arena, so ids stay valid for the whole pass.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::paths;
use crate::template::{TemplateSet, TestTemplate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// What a node is.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Session,
    Directory,
    /// An explicit test file.
    Module,
    /// A named grouping of items inside a module or an artifact.
    Group,
    /// The synthetic collector generated for an artifact file.
    Artifact { templates: TemplateSet },
    Item(ItemSpec),
}

impl NodeKind {
    pub fn is_collector(&self) -> bool {
        !matches!(self, NodeKind::Item(_))
    }

    pub fn is_artifact(&self) -> bool {
        matches!(self, NodeKind::Artifact { .. })
    }
}

/// The runnable part of an item: which template to invoke, and which member of a group template.
#[derive(Debug, Clone)]
pub struct ItemSpec {
    pub template: TestTemplate,
    pub member: Option<Arc<str>>,
}

impl ItemSpec {
    pub fn function(template: TestTemplate) -> Self {
        Self { template, member: None }
    }

    pub fn member(template: TestTemplate, member: Arc<str>) -> Self {
        Self {
            template,
            member: Some(member),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    kind: NodeKind,
    name: String,
    path: Option<PathBuf>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    claim: Option<PathBuf>,
    nodeid: String,
}

impl Node {
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Filesystem path, for directories, modules and artifacts.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// The artifact this node explicitly claims, if any.
    pub fn claim(&self) -> Option<&Path> {
        self.claim.as_deref()
    }

    /// `a/b.ipynb`, `a/test_x.toml::Suite::test_y`, ... Relative to the session root.
    pub fn nodeid(&self) -> &str {
        &self.nodeid
    }
}

/// One collector's report: the collector and the children it yielded, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectReport {
    pub collector: NodeId,
    pub result: Vec<NodeId>,
}

impl CollectReport {
    pub fn new(collector: NodeId, result: Vec<NodeId>) -> Self {
        Self { collector, result }
    }
}

#[derive(Debug)]
pub struct CollectionTree {
    root: PathBuf,
    nodes: Vec<Node>,
}

impl CollectionTree {
    /// A tree holding only the session node, rooted at directory `root`.
    pub fn new(root: &Path) -> Self {
        let root = paths::normalize(root);
        let session = Node {
            kind: NodeKind::Session,
            name: String::new(),
            path: Some(root.clone()),
            parent: None,
            children: Vec::new(),
            claim: None,
            nodeid: String::new(),
        };
        Self {
            root,
            nodes: vec![session],
        }
    }

    pub fn session(&self) -> NodeId {
        NodeId(0)
    }

    pub fn root_dir(&self) -> &Path {
        &self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn nodeid(&self, id: NodeId) -> &str {
        &self.nodes[id.0].nodeid
    }

    // ---------------------------------------------------------------------
    // Construction
    // ---------------------------------------------------------------------

    pub fn add_directory(&mut self, parent: NodeId, path: &Path) -> NodeId {
        self.add_path_node(parent, NodeKind::Directory, path)
    }

    pub fn add_module(&mut self, parent: NodeId, path: &Path) -> NodeId {
        self.add_path_node(parent, NodeKind::Module, path)
    }

    pub fn add_artifact(&mut self, parent: NodeId, path: &Path, templates: TemplateSet) -> NodeId {
        self.add_path_node(parent, NodeKind::Artifact { templates }, path)
    }

    pub fn add_group(&mut self, parent: NodeId, name: impl Into<String>) -> NodeId {
        self.push(parent, NodeKind::Group, name.into(), None)
    }

    pub fn add_item(&mut self, parent: NodeId, name: impl Into<String>, spec: ItemSpec) -> NodeId {
        self.push(parent, NodeKind::Item(spec), name.into(), None)
    }

    /// Attach an artifact claim to a node.
    pub fn set_claim(&mut self, id: NodeId, claim: &Path) {
        self.nodes[id.0].claim = Some(paths::normalize(claim));
    }

    fn add_path_node(&mut self, parent: NodeId, kind: NodeKind, path: &Path) -> NodeId {
        let path = paths::normalize(path);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.push(parent, kind, name, Some(path))
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind, name: String, path: Option<PathBuf>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let nodeid = self.compute_nodeid(Some(parent), &kind, &name, path.as_deref());
        self.nodes.push(Node {
            kind,
            name,
            path,
            parent: Some(parent),
            children: Vec::new(),
            claim: None,
            nodeid,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    fn compute_nodeid(&self, parent: Option<NodeId>, kind: &NodeKind, name: &str, path: Option<&Path>) -> String {
        match kind {
            NodeKind::Session => String::new(),
            NodeKind::Directory | NodeKind::Module | NodeKind::Artifact { .. } => match path {
                Some(path) => paths::display_relative(path, &self.root),
                None => name.to_string(),
            },
            NodeKind::Group | NodeKind::Item(_) => match parent.map(|p| self.nodeid(p)) {
                Some(prefix) if !prefix.is_empty() => format!("{prefix}::{name}"),
                _ => name.to_string(),
            },
        }
    }

    // ---------------------------------------------------------------------
    // Restructuring
    // ---------------------------------------------------------------------

    /// Unlink `id` from its parent. The node and its subtree stay in the arena.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Move `id` under `new_parent` as its last child, recomputing node ids of the moved subtree.
    pub fn reparent(&mut self, id: NodeId, new_parent: NodeId) {
        self.detach(id);
        self.nodes[id.0].parent = Some(new_parent);
        self.nodes[new_parent.0].children.push(id);

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &self.nodes[current.0];
            let nodeid = self.compute_nodeid(node.parent, &node.kind, &node.name, node.path.as_deref());
            self.nodes[current.0].nodeid = nodeid;
            stack.extend(self.nodes[current.0].children.iter().rev().copied());
        }
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// `id` and its ancestors, innermost first.
    pub fn ancestors_or_self(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), |&n| self.parent(n))
    }

    /// The nearest artifact collector containing `id`, `id` included.
    pub fn enclosing_artifact(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors_or_self(id).find(|&n| self.kind(n).is_artifact())
    }

    /// The artifact an item runs against: its own claim, else its nearest artifact collector's path.
    pub fn artifact_for(&self, id: NodeId) -> Option<&Path> {
        if let Some(claim) = self.node(id).claim() {
            return Some(claim);
        }
        self.enclosing_artifact(id).and_then(|a| self.node(a).path())
    }

    /// Every item reachable from the session, depth first in child order.
    pub fn items(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.session()];
        while let Some(id) = stack.pop() {
            if !self.kind(id).is_collector() {
                out.push(id);
            }
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> CollectionTree {
        CollectionTree::new(Path::new("/p"))
    }

    fn item(name: &str) -> ItemSpec {
        ItemSpec::function(TestTemplate::function(name))
    }

    #[test]
    fn test_nodeids_follow_paths_and_names() {
        let mut t = tree();
        let dir = t.add_directory(t.session(), Path::new("/p/tests"));
        let module = t.add_module(dir, Path::new("/p/tests/test_a.toml"));
        let group = t.add_group(module, "Suite");
        let leaf = t.add_item(group, "test_x", item("nothing"));

        assert_eq!(t.nodeid(dir), "tests");
        assert_eq!(t.nodeid(module), "tests/test_a.toml");
        assert_eq!(t.nodeid(group), "tests/test_a.toml::Suite");
        assert_eq!(t.nodeid(leaf), "tests/test_a.toml::Suite::test_x");
        assert_eq!(t.node(module).name(), "test_a.toml");
    }

    #[test]
    fn test_reparent_recomputes_subtree() {
        let mut t = tree();
        let module = t.add_module(t.session(), Path::new("/p/test_a.toml"));
        let group = t.add_group(module, "Suite");
        let leaf = t.add_item(group, "test_x", item("nothing"));
        let artifact = t.add_artifact(t.session(), Path::new("/p/nb/a.ipynb"), TemplateSet::empty());

        t.reparent(group, artifact);

        assert!(t.children(module).is_empty());
        assert_eq!(t.children(artifact), &[group]);
        assert_eq!(t.nodeid(leaf), "nb/a.ipynb::Suite::test_x");
    }

    #[test]
    fn test_detached_nodes_leave_items() {
        let mut t = tree();
        let module = t.add_module(t.session(), Path::new("/p/test_a.toml"));
        let a = t.add_item(module, "test_a", item("nothing"));
        let b = t.add_item(module, "test_b", item("nothing"));
        assert_eq!(t.items(), vec![a, b]);

        t.detach(a);
        assert_eq!(t.items(), vec![b]);
        assert_eq!(t.parent(a), None);
    }

    #[test]
    fn test_artifact_for_prefers_claim() {
        let mut t = tree();
        let artifact = t.add_artifact(t.session(), Path::new("/p/a.ipynb"), TemplateSet::empty());
        let generated = t.add_item(artifact, "nothing", item("nothing"));
        let module = t.add_module(t.session(), Path::new("/p/test_a.toml"));
        let explicit = t.add_item(module, "test_a", item("nothing"));
        t.set_claim(explicit, Path::new("/p/./b.ipynb"));
        let unclaimed = t.add_item(module, "test_b", item("nothing"));

        assert_eq!(t.artifact_for(generated), Some(Path::new("/p/a.ipynb")));
        assert_eq!(t.artifact_for(explicit), Some(Path::new("/p/b.ipynb")));
        assert_eq!(t.artifact_for(unclaimed), None);
        assert_eq!(t.enclosing_artifact(generated), Some(artifact));
    }
}
