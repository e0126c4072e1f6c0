//! Per-file overrides declared by directory scopes.
//!
//! A scope declares an override with `overrides.override_for(path)?.set(callback)`. The callback is not invoked
//! then: it waits in the [`FileOverrideRegistry`] until the discovery walk visits that exact file, at which point the
//! resolver pops it and ingests it as a one-file scope.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::ScopeError;
use crate::hooks::FileHook;
use crate::paths;

/// An override waiting for its file to be visited.
pub struct PendingOverride {
    declared_by: PathBuf,
    hook: Box<dyn FileHook>,
}

impl PendingOverride {
    /// Directory of the scope that registered the override.
    pub fn declared_by(&self) -> &Path {
        &self.declared_by
    }

    pub(crate) fn into_hook(self) -> Box<dyn FileHook> {
        self.hook
    }
}

impl fmt::Debug for PendingOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingOverride")
            .field("declared_by", &self.declared_by)
            .finish_non_exhaustive()
    }
}

/// Pending overrides keyed by absolute file path.
#[derive(Debug, Default)]
pub struct FileOverrideRegistry {
    pending: HashMap<PathBuf, PendingOverride>,
}

impl FileOverrideRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an override for `target`.
    ///
    /// When the file already has one, the override declared by the more deeply nested scope is kept; between two
    /// declarations from the same depth the later one wins. The loser is dropped without notice to the user.
    pub fn register(&mut self, target: PathBuf, declared_by: PathBuf, hook: Box<dyn FileHook>) {
        let incoming = PendingOverride { declared_by, hook };
        match self.pending.get(&target) {
            Some(existing) if depth(&existing.declared_by) > depth(&incoming.declared_by) => {
                tracing::debug!(
                    target = %target.display(),
                    kept = %existing.declared_by.display(),
                    dropped = %incoming.declared_by.display(),
                    "override shadowed by a deeper scope"
                );
            }
            Some(existing) => {
                tracing::debug!(
                    target = %target.display(),
                    kept = %incoming.declared_by.display(),
                    dropped = %existing.declared_by.display(),
                    "override replaced"
                );
                self.pending.insert(target, incoming);
            }
            None => {
                self.pending.insert(target, incoming);
            }
        }
    }

    /// Pop the override for `path`, if any. An override is consumed at most once.
    pub fn take(&mut self, path: &Path) -> Option<PendingOverride> {
        self.pending.remove(&paths::normalize(path))
    }

    /// Paths whose override was never consumed, sorted. Used at the end of a pass to warn about them.
    pub fn unconsumed(&self) -> Vec<&Path> {
        let mut out: Vec<&Path> = self.pending.keys().map(PathBuf::as_path).collect();
        out.sort();
        out
    }
}

fn depth(path: &Path) -> usize {
    path.components().count()
}

pub(crate) struct StagedOverride {
    pub(crate) target: PathBuf,
    pub(crate) declared_by: PathBuf,
    pub(crate) hook: Box<dyn FileHook>,
}

/// The `override_for` capability handed to a scope hook.
///
/// Registrations are staged and only reach the registry when the hook returns successfully, so a hook that fails
/// halfway leaves nothing behind.
pub struct OverrideRegistrar {
    scope: Option<PathBuf>,
    staged: Vec<StagedOverride>,
}

impl OverrideRegistrar {
    pub(crate) fn scoped(scope: &Path) -> Self {
        Self {
            scope: Some(paths::normalize(scope)),
            staged: Vec::new(),
        }
    }

    /// A registrar that accepts and discards every registration. Handed to the global hook.
    pub fn detached() -> Self {
        Self {
            scope: None,
            staged: Vec::new(),
        }
    }

    /// Directory of the declaring scope, if any.
    pub fn scope(&self) -> Option<&Path> {
        self.scope.as_deref()
    }

    /// Start an override for `target`, relative to the declaring scope unless absolute.
    ///
    /// ## Errors
    ///
    /// - [`ScopeError::OverrideOutsideScope`] when `target` is not beneath the scope's directory.
    /// - [`ScopeError::OverrideNotAFile`] when `target` does not exist or is not a regular file.
    pub fn override_for(&mut self, target: impl AsRef<Path>) -> Result<OverrideSlot<'_>, ScopeError> {
        let target = target.as_ref();
        let Some(scope) = &self.scope else {
            return Ok(OverrideSlot {
                registrar: self,
                target: paths::normalize(target),
            });
        };

        let resolved = paths::resolve_against(scope, target);
        if !paths::is_strict_descendant(&resolved, scope) {
            return Err(ScopeError::OverrideOutsideScope {
                scope: scope.clone(),
                target: resolved,
            });
        }
        if !resolved.is_file() {
            return Err(ScopeError::OverrideNotAFile {
                scope: scope.clone(),
                target: resolved,
            });
        }

        Ok(OverrideSlot {
            registrar: self,
            target: resolved,
        })
    }

    pub(crate) fn into_staged(self) -> Vec<StagedOverride> {
        self.staged
    }
}

/// A validated override target waiting for its callback.
pub struct OverrideSlot<'r> {
    registrar: &'r mut OverrideRegistrar,
    target: PathBuf,
}

impl OverrideSlot<'_> {
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Attach the callback. It runs when the file is visited, with the templates in effect there.
    pub fn set(self, hook: impl FileHook + 'static) {
        let Some(scope) = &self.registrar.scope else {
            tracing::debug!(target = %self.target.display(), "override from a detached hook ignored");
            return;
        };
        let declared_by = scope.clone();
        self.registrar.staged.push(StagedOverride {
            target: self.target,
            declared_by,
            hook: Box::new(hook),
        });
    }
}
