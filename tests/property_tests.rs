//! Property-based tests for discovery
//!
//! These tests use proptest to verify invariants across many randomly
//! generated project layouts.

use std::fs;

use iovis::discovery::{DiscoveryOptions, collect};
use iovis::templates::TemplateRegistry;
use proptest::prelude::*;

// =============================================================================
// Claim Properties
// =============================================================================

/// Lay out `claims.len()` notebooks across two directories and one test file claiming the flagged ones.
fn build(claims: &[bool]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let mut test_file = String::new();
    for (i, &claimed) in claims.iter().enumerate() {
        let rel = format!("{}/nb{i}.ipynb", if i % 2 == 0 { "even" } else { "odd" });
        let path = dir.path().join(&rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{"cells": [], "nbformat": 4}"#).unwrap();
        if claimed {
            test_file.push_str(&format!(
                "[[test]]\nname = \"test_claim\"\ntemplate = \"valid_notebook\"\nnotebooks = [\"{rel}\"]\n\n"
            ));
        }
    }
    fs::write(dir.path().join("test_claims.toml"), test_file).unwrap();
    dir
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: every artifact is tested exactly once, either by its claimants or by the generated templates
    #[test]
    fn artifact_tested_by_claimants_xor_templates(claims in prop::collection::vec(any::<bool>(), 1..6)) {
        let dir = build(&claims);
        let collection = collect(dir.path(), &DiscoveryOptions::default(), &TemplateRegistry::builtin()).unwrap();
        prop_assert!(collection.errors.is_empty());

        let ids: Vec<&str> = collection.items.iter().map(|&id| collection.tree.nodeid(id)).collect();
        for (i, &claimed) in claims.iter().enumerate() {
            let prefix = format!("{}/nb{i}.ipynb::", if i % 2 == 0 { "even" } else { "odd" });
            let mine: Vec<&str> = ids.iter().copied().filter(|id| id.starts_with(&prefix)).collect();
            let expected = if claimed { "test_claim" } else { "nothing" };
            prop_assert_eq!(mine, vec![format!("{prefix}{expected}")]);
        }
    }

    /// Property: claimed items always come after every generated item
    #[test]
    fn claimed_items_run_last(claims in prop::collection::vec(any::<bool>(), 1..6)) {
        let dir = build(&claims);
        let collection = collect(dir.path(), &DiscoveryOptions::default(), &TemplateRegistry::builtin()).unwrap();

        let ids: Vec<&str> = collection.items.iter().map(|&id| collection.tree.nodeid(id)).collect();
        let first_claimed = ids.iter().position(|id| id.ends_with("::test_claim")).unwrap_or(ids.len());
        prop_assert!(ids[first_claimed..].iter().all(|id| id.ends_with("::test_claim")));
    }
}
