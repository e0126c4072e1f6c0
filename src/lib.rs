#![forbid(unsafe_code)]
//! iovis: auto-generated tests for notebooks and other data artifacts.
//!
//! A project tree is walked like a test suite. Every artifact file (by default `*.ipynb`) gets the test templates
//! configured for its directory through `iovis.toml` scope files, unless a hand-written test file claims the artifact,
//! in which case only the claiming tests run against it. Scope resolution and the collection barrier live in the
//! `iovis_core` crate; this crate is the host around them.
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod notebook;
pub mod templates;

pub use config::{ConfigError, ProjectSettings, ScopeDeclaration, ScopeFile};
pub use discovery::{Collection, DiscoveryError, DiscoveryOptions, collect};
pub use notebook::{ExecutionError, Notebook, NotebookError};
pub use templates::TemplateRegistry;
