//! Scope declaration files (`iovis.toml`).
//!
//! Any directory may hold one. The `[tests]` table is the directory's scope hook, `[files."…"]` tables are per-file
//! overrides, and `[project]` carries walk settings when the file sits in the session root.
//!
//! A template runs at most once per artifact: with `inherit = true`, names already inherited are not added again,
//! and a name repeated in `templates` counts once.
//!
//! ```toml
//! [tests]
//! inherit = true
//! templates = ["valid_notebook"]
//!
//! [files."sub/x.ipynb"]
//! templates = ["notebook_runs"]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use iovis_core::hooks::file_fn;
use iovis_core::{HookResult, OverrideRegistrar, ScopeError, ScopeHook, TemplateSet, TestTemplate};
use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

use crate::templates::TemplateRegistry;

pub const SCOPE_FILE_NAME: &str = "iovis.toml";

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read '{}': {source}", path.display())]
    #[diagnostic(code(iovis::config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration in '{}': {source}", path.display())]
    #[diagnostic(code(iovis::config::parse))]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("'{}': `disable = true` cannot be combined with `templates`", path.display())]
    #[diagnostic(
        code(iovis::config::disable_with_templates),
        help("drop `disable` to set templates, or drop `templates` to disable the scope")
    )]
    DisableWithTemplates { path: PathBuf },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Scope(#[from] ScopeError),
}

// ---------------------------------------------------------------------------
// File shape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScopeFile {
    /// Absent: the scope abstains.
    #[serde(default)]
    pub tests: Option<TestsTable>,
    #[serde(default)]
    pub files: BTreeMap<String, FileTable>,
    #[serde(default)]
    pub project: Option<ProjectTable>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestsTable {
    #[serde(default)]
    pub inherit: bool,
    #[serde(default)]
    pub templates: Vec<String>,
    #[serde(default)]
    pub disable: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileTable {
    #[serde(default)]
    pub inherit: bool,
    #[serde(default)]
    pub templates: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectTable {
    pub extensions: Option<Vec<String>>,
    pub ignore: Option<Vec<String>>,
    pub templates: Option<Vec<String>>,
}

impl ScopeFile {
    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let file: ScopeFile = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if file.tests.as_ref().is_some_and(|t| t.disable && !t.templates.is_empty()) {
            return Err(ConfigError::DisableWithTemplates {
                path: path.to_path_buf(),
            });
        }
        Ok(file)
    }
}

// ---------------------------------------------------------------------------
// Project settings
// ---------------------------------------------------------------------------

/// Walk settings taken from the root `[project]` table.
#[derive(Debug, Clone)]
pub struct ProjectSettings {
    /// Artifact file extensions, without the dot.
    pub extensions: Vec<String>,
    /// Directory names the walk never enters. Hidden directories are skipped regardless.
    pub ignore: Vec<String>,
    /// Global templates contributed by the project.
    pub templates: Option<Vec<String>>,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            extensions: vec!["ipynb".to_string()],
            ignore: [".git", "target", "node_modules", ".ipynb_checkpoints"]
                .into_iter()
                .map(String::from)
                .collect(),
            templates: None,
        }
    }
}

impl ProjectSettings {
    pub fn from_table(table: Option<&ProjectTable>) -> Self {
        let mut settings = Self::default();
        if let Some(table) = table {
            if let Some(extensions) = &table.extensions {
                settings.extensions = extensions.iter().map(|e| e.trim_start_matches('.').to_string()).collect();
            }
            if let Some(ignore) = &table.ignore {
                settings.ignore = ignore.clone();
            }
            settings.templates = table.templates.clone();
        }
        settings
    }

    pub fn is_artifact(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.iter().any(|x| x == e))
    }

    pub fn is_ignored_dir(&self, name: &str) -> bool {
        name.starts_with('.') || self.ignore.iter().any(|i| i == name)
    }
}

// ---------------------------------------------------------------------------
// Scope declarations
// ---------------------------------------------------------------------------

/// A parsed `iovis.toml` bound to its directory.
#[derive(Debug, Clone)]
pub struct ScopeDeclaration {
    pub dir: PathBuf,
    pub source: PathBuf,
    pub file: ScopeFile,
}

impl ScopeDeclaration {
    /// Load the declaration of `dir`, if it has one.
    pub fn load(dir: &Path) -> Result<Option<Self>, ConfigError> {
        let source = dir.join(SCOPE_FILE_NAME);
        let text = match fs::read_to_string(&source) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source_err) => {
                return Err(ConfigError::Io {
                    path: source,
                    source: source_err,
                });
            }
        };
        let file = ScopeFile::parse(&text, &source)?;
        Ok(Some(Self {
            dir: dir.to_path_buf(),
            source,
            file,
        }))
    }

    /// This declaration as a scope hook, resolving template names through `registry`.
    pub fn bind<'a>(&'a self, registry: &'a TemplateRegistry) -> BoundScope<'a> {
        BoundScope { decl: self, registry }
    }
}

pub struct BoundScope<'a> {
    decl: &'a ScopeDeclaration,
    registry: &'a TemplateRegistry,
}

impl ScopeHook for BoundScope<'_> {
    fn set_tests(&self, inherited: &TemplateSet, overrides: &mut OverrideRegistrar) -> HookResult {
        let decl = self.decl;

        for (target, table) in &decl.file.files {
            let templates = self.registry.resolve(&table.templates, &decl.source)?;
            let inherit = table.inherit;
            overrides
                .override_for(target)?
                .set(file_fn(move |current| Ok(compose(inherit.then_some(current), &templates))));
        }

        let Some(tests) = &decl.file.tests else {
            return Ok(None);
        };
        if tests.disable {
            return Ok(Some(Vec::new()));
        }
        let templates = self.registry.resolve(&tests.templates, &decl.source)?;
        Ok(Some(compose(tests.inherit.then_some(inherited), &templates)))
    }
}

/// `base` followed by `extra`, skipping names already present. Item node ids are built from template names, so a
/// repeated name would collide.
fn compose(base: Option<&TemplateSet>, extra: &[TestTemplate]) -> Vec<TestTemplate> {
    let mut out = base.map(TemplateSet::to_vec).unwrap_or_default();
    for template in extra {
        if out.contains(template) {
            tracing::debug!(template = template.name(), "template already in effect, not adding it again");
        } else {
            out.push(template.clone());
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<ScopeFile, ConfigError> {
        ScopeFile::parse(text, Path::new("/p/iovis.toml"))
    }

    fn names(v: &[TestTemplate]) -> Vec<&str> {
        v.iter().map(TestTemplate::name).collect()
    }

    #[test]
    fn test_absent_tests_table_abstains() {
        let file = parse("").unwrap();
        assert!(file.tests.is_none());
    }

    #[test]
    fn test_empty_tests_table_is_empty_tuple() {
        let decl = ScopeDeclaration {
            dir: PathBuf::from("/p"),
            source: PathBuf::from("/p/iovis.toml"),
            file: parse("[tests]\n").unwrap(),
        };
        let registry = TemplateRegistry::builtin();
        let inherited: TemplateSet = vec![TestTemplate::function("nothing")].into();
        let mut overrides = OverrideRegistrar::detached();
        let answer = decl.bind(&registry).set_tests(&inherited, &mut overrides).unwrap();
        assert_eq!(answer, Some(vec![]));
    }

    #[test]
    fn test_inherit_appends() {
        let decl = ScopeDeclaration {
            dir: PathBuf::from("/p"),
            source: PathBuf::from("/p/iovis.toml"),
            file: parse("[tests]\ninherit = true\ntemplates = [\"valid_notebook\", \"nothing\"]\n").unwrap(),
        };
        let registry = TemplateRegistry::builtin();
        let inherited: TemplateSet = vec![TestTemplate::function("nothing")].into();
        let mut overrides = OverrideRegistrar::detached();
        let answer = decl.bind(&registry).set_tests(&inherited, &mut overrides).unwrap().unwrap();
        assert_eq!(names(&answer), vec!["nothing", "valid_notebook"]);
    }

    #[test]
    fn test_repeated_template_name_counts_once() {
        let decl = ScopeDeclaration {
            dir: PathBuf::from("/p"),
            source: PathBuf::from("/p/iovis.toml"),
            file: parse("[tests]\ntemplates = [\"valid_notebook\", \"nothing\", \"valid_notebook\"]\n").unwrap(),
        };
        let registry = TemplateRegistry::builtin();
        let mut overrides = OverrideRegistrar::detached();
        let answer = decl
            .bind(&registry)
            .set_tests(&TemplateSet::empty(), &mut overrides)
            .unwrap()
            .unwrap();
        assert_eq!(names(&answer), vec!["valid_notebook", "nothing"]);
    }

    #[test]
    fn test_disable_with_templates_rejected() {
        let err = parse("[tests]\ndisable = true\ntemplates = [\"nothing\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::DisableWithTemplates { .. }));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = parse("[tests]\ninherits = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_unknown_template_names_the_file() {
        let decl = ScopeDeclaration {
            dir: PathBuf::from("/p"),
            source: PathBuf::from("/p/iovis.toml"),
            file: parse("[tests]\ntemplates = [\"missing\"]\n").unwrap(),
        };
        let registry = TemplateRegistry::builtin();
        let mut overrides = OverrideRegistrar::detached();
        let err = decl
            .bind(&registry)
            .set_tests(&TemplateSet::empty(), &mut overrides)
            .unwrap_err();
        assert!(err.to_string().contains("/p/iovis.toml"));
    }

    #[test]
    fn test_project_settings() {
        let file = parse("[project]\nextensions = [\".ipynb\", \"qmd\"]\ntemplates = [\"nothing\"]\n").unwrap();
        let settings = ProjectSettings::from_table(file.project.as_ref());
        assert!(settings.is_artifact(Path::new("a.qmd")));
        assert!(settings.is_artifact(Path::new("a.ipynb")));
        assert!(!settings.is_artifact(Path::new("a.py")));
        assert!(settings.is_ignored_dir("target"));
        assert!(settings.is_ignored_dir(".venv"));
        assert_eq!(settings.templates, Some(vec!["nothing".to_string()]));
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ScopeDeclaration::load(dir.path()).unwrap().is_none());
    }
}
