//! Scope resolution and deferred collection for auto-generated artifact tests.
//!
//! A host test runner walks a project tree. Along the way it finds *scope declarations* (per-directory
//! configuration) and *artifacts* (data files such as notebooks). This crate decides which test templates apply
//! to each artifact and holds the generated collectors back until it is known that no hand-written test already
//! claims the artifact.
//!
//! ## Pieces
//!
//! - [`trie::PathTrie`]: longest-prefix index over normalized path segments.
//! - [`resolver::ScopeResolver`]: ingests scopes as they are discovered and answers `resolve(path)`.
//! - [`overrides::FileOverrideRegistry`]: per-file overrides, realized when the file is visited.
//! - [`hooks::HookChain`]: ordered contributors with first-non-null aggregation.
//! - [`scheduler::CollectionScheduler`]: barrier that releases artifact collectors once ordinary collection is done.
//! - [`regroup::regroup`]: reparents claimed items under per-artifact containers.
//!
//! ## Notes
//!
//! - Everything here is single-pass and single-threaded. Build fresh instances for every discovery pass.
//! - The only filesystem access is the regular-file check performed when an override is registered.

pub mod errors;
pub mod hooks;
pub mod overrides;
pub mod paths;
pub mod regroup;
pub mod resolver;
pub mod scheduler;
pub mod template;
pub mod tree;
pub mod trie;

pub use errors::{RegroupError, ScopeError};
pub use hooks::{Contributor, ContributorId, FileHook, HookChain, HookResult, ScopeHook, first_non_null};
pub use overrides::{FileOverrideRegistry, OverrideRegistrar, OverrideSlot};
pub use resolver::{ScopeIngest, ScopeResolver};
pub use scheduler::{BarrierRelease, CollectionScheduler};
pub use template::{TemplateSet, TemplateShape, TestTemplate};
pub use tree::{CollectReport, CollectionTree, ItemSpec, Node, NodeId, NodeKind};
pub use trie::{InsertOutcome, PathTrie};
