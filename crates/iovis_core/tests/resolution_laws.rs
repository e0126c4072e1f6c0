//! Resolution laws: inheritance, disable, abstain, override precedence, and the longest-prefix property.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use iovis_core::hooks::{file_fn, scope_fn};
use iovis_core::{InsertOutcome, PathTrie, ScopeHook, ScopeResolver, TemplateSet, TestTemplate};
use proptest::prelude::*;

fn answer(names: &'static [&'static str]) -> impl ScopeHook {
    scope_fn(move |_, _| Ok(Some(names.iter().copied().map(TestTemplate::function).collect())))
}

fn extend(name: &'static str) -> impl ScopeHook {
    scope_fn(move |inherited, _| {
        let mut out = inherited.to_vec();
        out.push(TestTemplate::function(name));
        Ok(Some(out))
    })
}

fn abstain() -> impl ScopeHook {
    scope_fn(|_, _| Ok(None))
}

fn names(set: TemplateSet) -> Vec<String> {
    set.iter().map(|t| t.name().to_string()).collect()
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn extension_in_subdirectory() {
    let mut resolver = ScopeResolver::initialize(&answer(&["A"])).expect("global hook");
    resolver.ingest_scope(Path::new("/proj/d"), &extend("B")).expect("ingest d");
    assert_eq!(names(resolver.resolve(Path::new("/proj/d/x.ipynb"))), vec!["A", "B"]);
}

#[test]
fn disable_then_extend() {
    let mut resolver = ScopeResolver::initialize(&answer(&["A"])).expect("global hook");
    resolver.ingest_scope(Path::new("/proj/a"), &answer(&[])).expect("ingest a");
    resolver.ingest_scope(Path::new("/proj/a/b"), &extend("C")).expect("ingest a/b");

    assert_eq!(names(resolver.resolve(Path::new("/proj/a/b/y.ipynb"))), vec!["C"]);
    assert!(resolver.resolve(Path::new("/proj/a/z.ipynb")).is_empty());
}

#[test]
fn disable_applies_to_whole_subtree() {
    let mut resolver = ScopeResolver::initialize(&answer(&["A", "B"])).expect("global hook");
    resolver.ingest_scope(Path::new("/proj/off"), &answer(&[])).expect("ingest off");
    resolver.ingest_scope(Path::new("/proj/off/deeper"), &abstain()).expect("ingest deeper");

    for p in ["/proj/off/x.ipynb", "/proj/off/deeper/y.ipynb", "/proj/off/deeper/z/w.ipynb"] {
        assert!(resolver.resolve(Path::new(p)).is_empty(), "{p} should resolve to ()");
    }
    assert_eq!(names(resolver.resolve(Path::new("/proj/on/x.ipynb"))), vec!["A", "B"]);
}

#[test]
fn abstaining_scope_is_invisible() {
    let build = |with_abstainer: bool| {
        let mut resolver = ScopeResolver::initialize(&answer(&["A"])).expect("global hook");
        resolver.ingest_scope(Path::new("/proj"), &extend("B")).expect("ingest proj");
        if with_abstainer {
            resolver.ingest_scope(Path::new("/proj/q"), &abstain()).expect("ingest q");
        }
        resolver.ingest_scope(Path::new("/proj/q/r"), &extend("C")).expect("ingest r");
        resolver
    };

    let with = build(true);
    let without = build(false);
    for p in ["/proj/q/x.ipynb", "/proj/q/r/y.ipynb", "/proj/z.ipynb"] {
        assert_eq!(with.resolve(Path::new(p)), without.resolve(Path::new(p)));
    }
}

#[test]
fn unrelated_branches_in_any_order() {
    let mut left_first = ScopeResolver::initialize(&answer(&["A"])).expect("global hook");
    left_first.ingest_scope(Path::new("/proj/left"), &extend("L")).expect("left");
    left_first.ingest_scope(Path::new("/proj/right"), &extend("R")).expect("right");

    let mut right_first = ScopeResolver::initialize(&answer(&["A"])).expect("global hook");
    right_first.ingest_scope(Path::new("/proj/right"), &extend("R")).expect("right");
    right_first.ingest_scope(Path::new("/proj/left"), &extend("L")).expect("left");

    for p in ["/proj/left/x.ipynb", "/proj/right/x.ipynb"] {
        assert_eq!(left_first.resolve(Path::new(p)), right_first.resolve(Path::new(p)));
    }
}

#[test]
fn file_override_beats_enclosing_scopes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    fs::create_dir_all(root.join("a/b")).expect("mkdir");
    let target = root.join("a/b/x.ipynb");
    fs::write(&target, "{}").expect("write");

    let mut resolver = ScopeResolver::initialize(&answer(&["A"])).expect("global hook");
    resolver
        .ingest_scope(
            root,
            &scope_fn(|inherited, overrides| {
                overrides
                    .override_for("a/b/x.ipynb")?
                    .set(file_fn(|_| Ok(vec![TestTemplate::function("only_this")])));
                Ok(Some(inherited.to_vec()))
            }),
        )
        .expect("ingest root");
    resolver.ingest_scope(&root.join("a"), &answer(&["X"])).expect("ingest a");
    resolver.ingest_scope(&root.join("a/b"), &extend("Y")).expect("ingest a/b");

    assert_eq!(names(resolver.resolve_artifact(&target).expect("artifact")), vec!["only_this"]);
    assert_eq!(
        names(resolver.resolve_artifact(&root.join("a/b/other.ipynb")).expect("artifact")),
        vec!["X", "Y"]
    );
}

#[test]
fn deepest_declaring_scope_wins_for_same_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    fs::create_dir_all(root.join("a")).expect("mkdir");
    let target = root.join("a/x.ipynb");
    fs::write(&target, "{}").expect("write");

    let declare = |name: &'static str| {
        let target = target.clone();
        scope_fn(move |_, overrides| {
            overrides
                .override_for(&target)?
                .set(file_fn(move |_| Ok(vec![TestTemplate::function(name)])));
            Ok(None)
        })
    };

    let mut resolver = ScopeResolver::initialize(&answer(&[])).expect("global hook");
    resolver.ingest_scope(root, &declare("from_root")).expect("root");
    resolver.ingest_scope(&root.join("a"), &declare("from_a")).expect("a");

    assert_eq!(names(resolver.resolve_artifact(&target).expect("artifact")), vec!["from_a"]);
}

// =============================================================================
// Longest-prefix property
// =============================================================================

fn path_of(segments: &[&str]) -> PathBuf {
    let mut p = PathBuf::from("/");
    p.extend(segments);
    p
}

fn segments_strategy(max: usize) -> impl Strategy<Value = Vec<&'static str>> {
    prop::collection::vec(prop::sample::select(vec!["a", "b", "c"]), 0..max)
}

proptest! {
    #[test]
    fn longest_prefix_is_deepest_inserted_ancestor(
        keys in prop::collection::vec(segments_strategy(4), 0..8),
        query in segments_strategy(5),
    ) {
        let mut trie = PathTrie::new(usize::MAX);
        let mut expected_by_key: HashMap<PathBuf, usize> = HashMap::new();
        for (i, key) in keys.iter().enumerate() {
            if key.is_empty() {
                continue;
            }
            let path = path_of(key);
            // A key that already exists, or is an ancestor of one, is refused and leaves the trie untouched.
            let known = expected_by_key.keys().any(|k| k.starts_with(&path));
            let outcome = trie.insert(&path, i);
            prop_assert_eq!(outcome == InsertOutcome::Leaf, !known);
            if !known {
                expected_by_key.insert(path, i);
            }
        }

        let query = path_of(&query);
        let expected = expected_by_key
            .iter()
            .filter(|(key, _)| query.starts_with(key))
            .max_by_key(|(key, _)| key.components().count())
            .map(|(_, &i)| i)
            .unwrap_or(usize::MAX);

        prop_assert_eq!(*trie.longest_common_prefix(&query), expected);
    }
}
