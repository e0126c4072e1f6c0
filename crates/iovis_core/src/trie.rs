//! Ordered prefix trie over normalized path segments.
//!
//! Each node stores at most one payload. The root always carries one, so a longest-prefix lookup is total.
//! There is no removal: keys are written once per pass and the whole trie is dropped with its owner.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::Path;

use crate::paths;

/// What [`PathTrie::insert`] had to do to reach the insertion point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// At least one segment node was created: the key was new and is the deepest node on its branch.
    Leaf,
    /// The whole segment chain already existed: the key was already present or is an ancestor of a deeper key.
    Prefix,
}

#[derive(Debug)]
struct Node<T> {
    payload: Option<T>,
    children: BTreeMap<OsString, Node<T>>,
}

impl<T> Node<T> {
    fn empty() -> Self {
        Self {
            payload: None,
            children: BTreeMap::new(),
        }
    }
}

/// A trie keyed by the segments of absolute paths.
#[derive(Debug)]
pub struct PathTrie<T> {
    root: T,
    children: BTreeMap<OsString, Node<T>>,
    len: usize,
}

impl<T> PathTrie<T> {
    /// Create a trie whose root carries `root_payload`.
    pub fn new(root_payload: T) -> Self {
        Self {
            root: root_payload,
            children: BTreeMap::new(),
            len: 0,
        }
    }

    /// The payload stored at the root.
    pub fn root(&self) -> &T {
        &self.root
    }

    /// Number of payloads stored below the root.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Store `payload` at `path`, creating intermediate nodes as needed.
    ///
    /// Only a new key is written. When the node for `path` already exists, or `path` is empty and so addresses the
    /// root, the trie is left as it was and [`InsertOutcome::Prefix`] is returned.
    pub fn insert(&mut self, path: &Path, payload: T) -> InsertOutcome {
        let segments = paths::segments(path);
        if segments.is_empty() || self.has_node(path) {
            return InsertOutcome::Prefix;
        }

        let mut node = &mut self.children;
        let mut slot = None;
        for segment in segments {
            let child = node.entry(segment).or_insert_with(Node::empty);
            node = &mut child.children;
            slot = Some(&mut child.payload);
        }
        if let Some(slot) = slot {
            *slot = Some(payload);
            self.len += 1;
        }
        InsertOutcome::Leaf
    }

    /// Payload of the deepest ancestor-or-self of `path` that has one. Falls back to the root.
    pub fn longest_common_prefix(&self, path: &Path) -> &T {
        let mut result = &self.root;
        let mut children = &self.children;

        for segment in paths::segments(path) {
            let Some(node) = children.get(&segment) else {
                break;
            };
            if let Some(payload) = &node.payload {
                result = payload;
            }
            children = &node.children;
        }

        result
    }

    /// Whether the exact node for `path` exists and carries a payload.
    pub fn contains(&self, path: &Path) -> bool {
        self.node(path).is_some_and(|n| n.payload.is_some())
    }

    /// Whether any node exists for `path`, with or without a payload.
    ///
    /// Inserting at such a path would report [`InsertOutcome::Prefix`].
    pub fn has_node(&self, path: &Path) -> bool {
        self.node(path).is_some()
    }

    fn node(&self, path: &Path) -> Option<&Node<T>> {
        let segments = paths::segments(path);
        let (first, rest) = segments.split_first()?;
        let mut node = self.children.get(first)?;
        for segment in rest {
            node = node.children.get(segment)?;
        }
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_trie_resolves_to_root() {
        let trie = PathTrie::new("root");
        assert_eq!(*trie.longest_common_prefix(Path::new("/a/b/c")), "root");
        assert!(trie.is_empty());
    }

    #[test]
    fn test_insert_new_path_is_leaf() {
        let mut trie = PathTrie::new(0);
        assert_eq!(trie.insert(Path::new("/a/b"), 1), InsertOutcome::Leaf);
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn test_insert_ancestor_of_existing_is_prefix() {
        let mut trie = PathTrie::new(0);
        trie.insert(Path::new("/a/b/c"), 1);
        assert_eq!(trie.insert(Path::new("/a/b"), 2), InsertOutcome::Prefix);
        assert!(!trie.contains(Path::new("/a/b")));
        assert_eq!(*trie.longest_common_prefix(Path::new("/a/b/x")), 0);
    }

    #[test]
    fn test_insert_same_path_twice_is_prefix() {
        let mut trie = PathTrie::new(0);
        trie.insert(Path::new("/a"), 1);
        assert_eq!(trie.insert(Path::new("/a"), 2), InsertOutcome::Prefix);
        assert_eq!(trie.len(), 1);
        assert_eq!(*trie.longest_common_prefix(Path::new("/a/x")), 1);
    }

    #[test]
    fn test_insert_sibling_is_leaf() {
        let mut trie = PathTrie::new(0);
        trie.insert(Path::new("/a/b"), 1);
        assert_eq!(trie.insert(Path::new("/a/c"), 2), InsertOutcome::Leaf);
    }

    #[test]
    fn test_longest_prefix_picks_deepest_payload() {
        let mut trie = PathTrie::new(0);
        trie.insert(Path::new("/a"), 1);
        trie.insert(Path::new("/a/b/c"), 3);

        assert_eq!(*trie.longest_common_prefix(Path::new("/a/b/c/d.ipynb")), 3);
        assert_eq!(*trie.longest_common_prefix(Path::new("/a/b/x.ipynb")), 1);
        assert_eq!(*trie.longest_common_prefix(Path::new("/z")), 0);
    }

    #[test]
    fn test_longest_prefix_stops_at_missing_child() {
        let mut trie = PathTrie::new(0);
        trie.insert(Path::new("/a/b"), 2);
        assert_eq!(*trie.longest_common_prefix(Path::new("/a/bb/c")), 0);
    }

    #[test]
    fn test_contains_requires_payload() {
        let mut trie = PathTrie::new(0);
        trie.insert(Path::new("/a/b"), 1);
        assert!(trie.contains(Path::new("/a/b")));
        assert!(!trie.contains(Path::new("/a")));
        assert!(trie.has_node(Path::new("/a")));
        assert!(!trie.has_node(Path::new("/q")));
    }

    #[test]
    fn test_equivalent_spellings_share_a_key() {
        let mut trie = PathTrie::new(0);
        trie.insert(Path::new("/a/./b/../b"), 7);
        assert!(trie.contains(Path::new("/a/b")));
    }

    #[test]
    fn test_empty_path_leaves_root_alone() {
        let mut trie = PathTrie::new(0);
        assert_eq!(trie.insert(Path::new(""), 9), InsertOutcome::Prefix);
        assert_eq!(trie.insert(Path::new("."), 9), InsertOutcome::Prefix);
        assert_eq!(*trie.root(), 0);
        assert!(trie.is_empty());
    }
}
