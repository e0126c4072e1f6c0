//! Explicit test files (`test_*.toml`, `*_test.toml`).
//!
//! ```toml
//! [[test]]
//! name = "test_outputs"
//! template = "no_error_outputs"
//! notebooks = ["nb/a.ipynb"]
//!
//! [[suite]]
//! name = "TestReports"
//! notebooks = ["nb/b.ipynb"]
//! [[suite.test]]
//! name = "test_valid"
//! template = "valid_notebook"
//! ```
//!
//! `notebooks` entries are claims, relative to the file's directory. A test fans out into one item per distinct
//! claimed path, suite claims first.

use std::fs;
use std::path::{Path, PathBuf};

use iovis_core::paths;
use iovis_core::{CollectionTree, ItemSpec, NodeId};
use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::templates::TemplateRegistry;

/// Whether `name` is an explicit test file name.
pub fn is_test_file(name: &str) -> bool {
    name.ends_with(".toml") && (name.starts_with("test_") || name.ends_with("_test.toml"))
}

#[derive(Debug, Error, Diagnostic)]
pub enum ClaimError {
    #[error("{test}: claimed notebook '{}' is not a file", target.display())]
    #[diagnostic(code(iovis::claim::not_a_file), help("claims are resolved relative to the test file's directory"))]
    NotAFile { test: String, target: PathBuf },

    #[error("{test}: unknown test template '{name}'")]
    #[diagnostic(code(iovis::claim::unknown_template), help("run `iovis templates` to list the available templates"))]
    UnknownTemplate { test: String, name: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestFile {
    #[serde(default, rename = "test")]
    pub tests: Vec<TestDecl>,
    #[serde(default, rename = "suite")]
    pub suites: Vec<SuiteDecl>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestDecl {
    pub name: String,
    pub template: String,
    #[serde(default)]
    pub notebooks: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteDecl {
    pub name: String,
    #[serde(default)]
    pub notebooks: Vec<String>,
    #[serde(default, rename = "test")]
    pub tests: Vec<TestDecl>,
}

impl TestFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Add the items declared by `file` beneath `module`.
///
/// Tests whose claims or template are invalid are left out and reported; the rest of the file is still collected.
pub fn populate(tree: &mut CollectionTree, module: NodeId, file: &TestFile, registry: &TemplateRegistry) -> Vec<ClaimError> {
    let base = tree
        .node(module)
        .path()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let mut errors = Vec::new();

    for test in &file.tests {
        if let Err(e) = add_test(tree, module, &base, &[], test, registry) {
            errors.push(e);
        }
    }

    for suite in &file.suites {
        let group = tree.add_group(module, suite.name.as_str());
        for test in &suite.tests {
            if let Err(e) = add_test(tree, group, &base, &suite.notebooks, test, registry) {
                errors.push(e);
            }
        }
    }

    errors
}

fn add_test(
    tree: &mut CollectionTree,
    parent: NodeId,
    base: &Path,
    inherited_claims: &[String],
    test: &TestDecl,
    registry: &TemplateRegistry,
) -> Result<(), ClaimError> {
    let template = registry.template(&test.template).ok_or_else(|| ClaimError::UnknownTemplate {
        test: test.name.clone(),
        name: test.template.clone(),
    })?;

    let claims = resolve_claims(base, inherited_claims.iter().chain(&test.notebooks), &test.name)?;
    if claims.is_empty() {
        tree.add_item(parent, test.name.as_str(), ItemSpec::function(template));
        return Ok(());
    }

    for claim in &claims {
        let item = tree.add_item(parent, test.name.as_str(), ItemSpec::function(template.clone()));
        tree.set_claim(item, claim);
    }
    Ok(())
}

/// Resolve and validate claims, keeping the first occurrence of each path.
fn resolve_claims<'a>(
    base: &Path,
    claims: impl Iterator<Item = &'a String>,
    test: &str,
) -> Result<Vec<PathBuf>, ClaimError> {
    let mut out: Vec<PathBuf> = Vec::new();
    for claim in claims {
        let target = paths::resolve_against(base, Path::new(claim));
        if !target.is_file() {
            return Err(ClaimError::NotAFile {
                test: test.to_string(),
                target,
            });
        }
        if !out.contains(&target) {
            out.push(target);
        }
    }
    Ok(out)
}
