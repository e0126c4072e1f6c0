//! Incremental scope resolution.
//!
//! The resolver is fed scopes in whatever order the host discovers them, with one guarantee: along any single
//! branch a directory is ingested before its subdirectories. Under that guarantee every `resolve` call returns the
//! same answer a single top-down evaluation would have produced, because each scope's inherited templates are
//! already memoized in the trie when its hook runs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::errors::ScopeError;
use crate::hooks::{FileHook, HookResult, ScopeHook};
use crate::overrides::{FileOverrideRegistry, OverrideRegistrar};
use crate::paths;
use crate::template::{TemplateSet, TestTemplate};
use crate::trie::{InsertOutcome, PathTrie};

/// What [`ScopeResolver::ingest_scope`] did with a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeIngest {
    /// The hook answered and its templates now govern the scope's subtree.
    Inserted(TemplateSet),
    /// The hook returned `None`; the subtree keeps resolving through the ancestors.
    Abstained,
    /// The scope had been ingested before. The hook was not run.
    AlreadyKnown,
}

/// Owns the template trie and the pending file overrides for one discovery pass.
#[derive(Debug)]
pub struct ScopeResolver {
    trie: PathTrie<TemplateSet>,
    overrides: FileOverrideRegistry,
    abstained: HashSet<PathBuf>,
}

impl ScopeResolver {
    /// Run the global hook once with nothing inherited and store its answer at the root.
    ///
    /// A global hook that abstains leaves the root with the empty tuple. Overrides registered by the global hook are
    /// discarded, since it has no directory to scope them to.
    pub fn initialize(global: &dyn ScopeHook) -> Result<Self, ScopeError> {
        let mut detached = OverrideRegistrar::detached();
        let root: TemplateSet = global
            .set_tests(&TemplateSet::empty(), &mut detached)?
            .map(TemplateSet::from)
            .unwrap_or_default();
        tracing::debug!(templates = ?root.names(), "global templates");
        Ok(Self::with_root(root))
    }

    /// A resolver whose root payload is `root`.
    pub fn with_root(root: TemplateSet) -> Self {
        Self {
            trie: PathTrie::new(root),
            overrides: FileOverrideRegistry::new(),
            abstained: HashSet::new(),
        }
    }

    /// The global default templates.
    pub fn root(&self) -> &TemplateSet {
        self.trie.root()
    }

    /// Ingest the scope declared for directory `path`.
    ///
    /// The hook receives the templates currently resolved at `path` and may register overrides for files beneath
    /// it. Registered overrides are committed only when the whole ingestion succeeds.
    ///
    /// ## Errors
    ///
    /// - [`ScopeError::RelativeScope`] when `path` is not absolute. The hook is not run.
    /// - [`ScopeError::ConsistencyViolation`] when the hook answers for `path` but a deeper scope beneath it was
    ///   already resolved. An abstaining hook is never a violation.
    /// - Whatever the hook itself returns, including override validation failures.
    #[tracing::instrument(skip_all, fields(scope = %path.display()))]
    pub fn ingest_scope(&mut self, path: &Path, hook: &dyn ScopeHook) -> Result<ScopeIngest, ScopeError> {
        let path = paths::normalize(path);
        if !path.is_absolute() {
            return Err(ScopeError::RelativeScope { path });
        }
        if self.trie.contains(&path) || self.abstained.contains(&path) {
            tracing::debug!("scope already ingested");
            return Ok(ScopeIngest::AlreadyKnown);
        }

        let inherited = self.resolve(&path);
        let mut registrar = OverrideRegistrar::scoped(&path);
        let answer = hook.set_tests(&inherited, &mut registrar)?;
        if answer.is_some() && self.trie.has_node(&path) {
            return Err(ScopeError::ConsistencyViolation { path });
        }

        for staged in registrar.into_staged() {
            self.overrides.register(staged.target, staged.declared_by, staged.hook);
        }

        self.insert(path, answer)
    }

    fn insert(&mut self, path: PathBuf, answer: Option<Vec<TestTemplate>>) -> Result<ScopeIngest, ScopeError> {
        let Some(templates) = answer else {
            tracing::debug!("scope abstained");
            self.abstained.insert(path);
            return Ok(ScopeIngest::Abstained);
        };

        let templates = TemplateSet::from(templates);
        match self.trie.insert(&path, templates.clone()) {
            InsertOutcome::Leaf => {
                tracing::debug!(templates = ?templates.names(), "scope resolved");
                Ok(ScopeIngest::Inserted(templates))
            }
            InsertOutcome::Prefix => Err(ScopeError::ConsistencyViolation { path }),
        }
    }

    /// Templates in effect at `path`: the payload of its deepest resolved ancestor-or-self, else the root.
    pub fn resolve(&self, path: &Path) -> TemplateSet {
        self.trie.longest_common_prefix(path).clone()
    }

    /// Resolve an artifact file, first realizing the override registered for it, if any.
    pub fn resolve_artifact(&mut self, path: &Path) -> Result<TemplateSet, ScopeError> {
        if let Some(pending) = self.overrides.take(path) {
            tracing::debug!(
                artifact = %path.display(),
                declared_by = %pending.declared_by().display(),
                "applying file override"
            );
            let hook = FileScope(pending.into_hook());
            self.ingest_scope(path, &hook)?;
        }
        Ok(self.resolve(path))
    }

    /// End the pass. Returns the targets of overrides whose file was never visited, sorted.
    pub fn finish(self) -> Vec<PathBuf> {
        let unconsumed: Vec<PathBuf> = self.overrides.unconsumed().into_iter().map(Path::to_path_buf).collect();
        tracing::debug!(count = unconsumed.len(), "unconsumed file overrides");
        unconsumed
    }
}

/// Presents a file override as a one-file scope that always answers.
struct FileScope(Box<dyn FileHook>);

impl ScopeHook for FileScope {
    fn set_tests(&self, inherited: &TemplateSet, _overrides: &mut OverrideRegistrar) -> HookResult {
        Ok(Some(self.0.set_tests(inherited)?))
    }
}
