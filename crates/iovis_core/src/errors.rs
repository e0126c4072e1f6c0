//! Errors raised while resolving scopes and regrouping items.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// A scope could not be ingested.
///
/// All variants abort only the ingestion of the scope that raised them. Scopes resolved earlier are untouched.
#[derive(Debug, Error, Diagnostic)]
pub enum ScopeError {
    /// An override targeted a path outside the declaring scope's subtree.
    #[error(
        "override_for({}) from scope '{}': path must be a subpath of the declaring scope's directory",
        target.display(),
        scope.display()
    )]
    #[diagnostic(
        code(iovis::scope::override_outside_scope),
        help("declare the override from a scope whose directory contains the file")
    )]
    OverrideOutsideScope { scope: PathBuf, target: PathBuf },

    /// An override targeted something that is not an existing regular file.
    #[error("override_for({}) from scope '{}': Not a file: {}", target.display(), scope.display(), target.display())]
    #[diagnostic(code(iovis::scope::override_not_a_file))]
    OverrideNotAFile { scope: PathBuf, target: PathBuf },

    /// A scope was ingested at a path that already is an ancestor of a resolved scope.
    ///
    /// This means scopes were delivered bottom-up along a branch, which the discovery walk never does.
    #[error("scope '{}' was declared after a deeper scope beneath it had already been resolved", path.display())]
    #[diagnostic(code(iovis::scope::consistency_violation))]
    ConsistencyViolation { path: PathBuf },

    /// A scope was given a path that does not name a directory from the filesystem root.
    #[error("scope path '{}' is not absolute", path.display())]
    #[diagnostic(code(iovis::scope::relative_scope), help("scopes are keyed by absolute, normalized directory paths"))]
    RelativeScope { path: PathBuf },

    /// A declaration named a template nobody provides.
    #[error("unknown test template '{name}' in scope '{}'", scope.display())]
    #[diagnostic(code(iovis::scope::unknown_template), help("run `iovis templates` to list the available templates"))]
    UnknownTemplate { scope: PathBuf, name: String },

    /// A hook failed for a reason of its own.
    #[error("scope hook '{hook}' failed: {message}")]
    #[diagnostic(code(iovis::scope::hook))]
    Hook { hook: String, message: String },
}

/// The regrouping pass found a claimed item it cannot place.
#[derive(Debug, Error, Diagnostic)]
pub enum RegroupError {
    #[error("unable to determine a new parent for '{nodeid}'")]
    #[diagnostic(code(iovis::regroup::no_parent))]
    NoParent { nodeid: String },
}
