//! Grouping of claimed items by artifact.
//!
//! Turns
//!
//! ```text
//! <Module tests/test_x.toml>
//!   <Test test_a>            claims nb/foo.ipynb
//!   <Suite Good>
//!     <Test test_b>          claims nb/foo.ipynb
//!     <Test test_b>          claims nb/bar.ipynb
//!   <Suite Plain>
//!     <Test test_c>
//! ```
//!
//! into
//!
//! ```text
//! <Notebook nb/foo.ipynb>
//!   <Test test_a>
//!   <Suite Good>
//!     <Test test_b>
//! <Notebook nb/bar.ipynb>
//!   <Suite Good>
//!     <Test test_b>
//! <Module tests/test_x.toml>
//!   <Suite Plain>
//!     <Test test_c>
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use crate::errors::RegroupError;
use crate::template::TemplateSet;
use crate::tree::{CollectionTree, NodeId, NodeKind};

/// Reparent every claimed item in `items` under a per-artifact container and return the new item order.
///
/// Unclaimed items keep their relative order and come first. Moved items follow, stably sorted by their new
/// parent's node id so the members of a recreated group stay contiguous.
#[tracing::instrument(skip_all, fields(item_count = items.len()))]
pub fn regroup(tree: &mut CollectionTree, items: Vec<NodeId>) -> Result<Vec<NodeId>, RegroupError> {
    let (mut claimed, mut untouched): (Vec<NodeId>, Vec<NodeId>) =
        items.into_iter().partition(|&id| tree.node(id).claim().is_some());

    if claimed.is_empty() {
        return Ok(untouched);
    }

    let mut roots: HashMap<PathBuf, NodeId> = HashMap::new();
    let mut groups: HashMap<(PathBuf, NodeId), NodeId> = HashMap::new();

    for &item in &claimed {
        let node = tree.node(item);
        let (Some(path), Some(parent)) = (node.claim().map(PathBuf::from), node.parent()) else {
            return Err(RegroupError::NoParent {
                nodeid: node.nodeid().to_string(),
            });
        };

        let session = tree.session();
        let root = *roots
            .entry(path.clone())
            .or_insert_with(|| tree.add_artifact(session, &path, TemplateSet::empty()));

        let new_parent = if matches!(tree.kind(parent), NodeKind::Module) {
            root
        } else if matches!(tree.kind(parent), NodeKind::Group) {
            let name = tree.node(parent).name().to_string();
            *groups
                .entry((path, parent))
                .or_insert_with(|| tree.add_group(root, name))
        } else {
            return Err(RegroupError::NoParent {
                nodeid: tree.nodeid(item).to_string(),
            });
        };

        tree.reparent(item, new_parent);
    }

    claimed.sort_by(|&a, &b| parent_nodeid(tree, a).cmp(parent_nodeid(tree, b)));
    tracing::debug!(moved = claimed.len(), artifacts = roots.len(), "claimed items regrouped");

    untouched.append(&mut claimed);
    Ok(untouched)
}

fn parent_nodeid(tree: &CollectionTree, id: NodeId) -> &str {
    tree.parent(id).map(|p| tree.nodeid(p)).unwrap_or("")
}
