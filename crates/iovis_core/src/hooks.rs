//! Scope hooks and first-result aggregation.
//!
//! A scope hook receives the templates inherited from its nearest resolved ancestor and answers with one of:
//!
//! - `Some(templates)` that ignore `inherited`: full replacement,
//! - `Some(inherited + extra)`: extension,
//! - `Some(vec![])`: explicit disable,
//! - `None`: no opinion, as if the scope had never been declared.
//!
//! `None` and an empty vector are **not** interchangeable.
//!
//! Several contributors can answer the same question. [`HookChain`] asks them in priority order and keeps the first
//! non-`None` answer, with a fixed fallback that always answers last.

use std::fmt;

use crate::errors::ScopeError;
use crate::overrides::OverrideRegistrar;
use crate::template::{TemplateSet, TestTemplate};

/// What a scope hook returns.
pub type HookResult = Result<Option<Vec<TestTemplate>>, ScopeError>;

/// The hook attached to a directory scope.
pub trait ScopeHook {
    /// Compute this scope's templates from the inherited ones.
    ///
    /// `overrides` lets the scope attach file-level overrides for files beneath it.
    fn set_tests(&self, inherited: &TemplateSet, overrides: &mut OverrideRegistrar) -> HookResult;
}

impl<F> ScopeHook for F
where
    F: Fn(&TemplateSet, &mut OverrideRegistrar) -> HookResult,
{
    fn set_tests(&self, inherited: &TemplateSet, overrides: &mut OverrideRegistrar) -> HookResult {
        self(inherited, overrides)
    }
}

/// The callback attached to a single file by [`OverrideRegistrar::override_for`].
///
/// Unlike a scope hook it always answers and cannot register further overrides.
pub trait FileHook {
    fn set_tests(&self, current: &TemplateSet) -> Result<Vec<TestTemplate>, ScopeError>;
}

impl<F> FileHook for F
where
    F: Fn(&TemplateSet) -> Result<Vec<TestTemplate>, ScopeError>,
{
    fn set_tests(&self, current: &TemplateSet) -> Result<Vec<TestTemplate>, ScopeError> {
        self(current)
    }
}

/// Pin a closure to the [`ScopeHook`] signature so its argument types are inferred.
pub fn scope_fn<F>(f: F) -> F
where
    F: Fn(&TemplateSet, &mut OverrideRegistrar) -> HookResult,
{
    f
}

/// Pin a closure to the [`FileHook`] signature so its argument types are inferred.
pub fn file_fn<F>(f: F) -> F
where
    F: Fn(&TemplateSet) -> Result<Vec<TestTemplate>, ScopeError>,
{
    f
}

/// Identity of a contributor inside one [`HookChain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContributorId(u32);

/// A named hook registered with a chain.
pub struct Contributor {
    id: ContributorId,
    name: String,
    hook: Box<dyn ScopeHook>,
}

impl Contributor {
    pub fn id(&self) -> ContributorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Contributor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contributor")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ask `contributors` in order and return the first non-`None` answer.
pub fn first_non_null<'a, I>(contributors: I, inherited: &TemplateSet, overrides: &mut OverrideRegistrar) -> HookResult
where
    I: IntoIterator<Item = &'a Contributor>,
{
    for contributor in contributors {
        if let Some(templates) = contributor.hook.set_tests(inherited, overrides)? {
            tracing::debug!(contributor = %contributor.name, count = templates.len(), "hook answered");
            return Ok(Some(templates));
        }
    }
    Ok(None)
}

/// Ordered contributors plus a fixed lowest-priority fallback.
#[derive(Debug)]
pub struct HookChain {
    contributors: Vec<Contributor>,
    fallback: Contributor,
    next_id: u32,
}

impl HookChain {
    /// Create a chain whose fallback is `hook`. The fallback is always asked last and cannot be excluded.
    pub fn new(fallback_name: impl Into<String>, hook: impl ScopeHook + 'static) -> Self {
        Self {
            contributors: Vec::new(),
            fallback: Contributor {
                id: ContributorId(0),
                name: fallback_name.into(),
                hook: Box::new(hook),
            },
            next_id: 1,
        }
    }

    /// Register a contributor with lower priority than every contributor registered before it.
    pub fn register(&mut self, name: impl Into<String>, hook: impl ScopeHook + 'static) -> ContributorId {
        let id = ContributorId(self.next_id);
        self.next_id += 1;
        self.contributors.push(Contributor {
            id,
            name: name.into(),
            hook: Box::new(hook),
        });
        id
    }

    /// Look up a contributor (the fallback included) by name.
    pub fn find(&self, name: &str) -> Option<ContributorId> {
        self.iter().find(|c| c.name == name).map(Contributor::id)
    }

    /// All contributors in the order they are asked.
    pub fn iter(&self) -> impl Iterator<Item = &Contributor> {
        self.contributors.iter().chain(std::iter::once(&self.fallback))
    }

    /// A view of this chain that skips `excluded`. The fallback is never skipped.
    pub fn without<'a>(&'a self, excluded: &'a [ContributorId]) -> ChainView<'a> {
        ChainView { chain: self, excluded }
    }
}

impl ScopeHook for HookChain {
    fn set_tests(&self, inherited: &TemplateSet, overrides: &mut OverrideRegistrar) -> HookResult {
        first_non_null(self.iter(), inherited, overrides)
    }
}

/// A [`HookChain`] minus some contributors.
#[derive(Debug, Clone, Copy)]
pub struct ChainView<'a> {
    chain: &'a HookChain,
    excluded: &'a [ContributorId],
}

impl ScopeHook for ChainView<'_> {
    fn set_tests(&self, inherited: &TemplateSet, overrides: &mut OverrideRegistrar) -> HookResult {
        let fallback = self.chain.fallback.id;
        let contributors = self
            .chain
            .iter()
            .filter(|c| c.id == fallback || !self.excluded.contains(&c.id));
        first_non_null(contributors, inherited, overrides)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn answer(names: &'static [&'static str]) -> impl ScopeHook + 'static {
        scope_fn(move |_, _| Ok(Some(names.iter().copied().map(TestTemplate::function).collect())))
    }

    fn abstain() -> impl ScopeHook + 'static {
        scope_fn(|_, _| Ok(None))
    }

    fn ask(hook: &dyn ScopeHook) -> Option<Vec<String>> {
        let mut overrides = OverrideRegistrar::detached();
        hook.set_tests(&TemplateSet::empty(), &mut overrides)
            .unwrap()
            .map(|v| v.iter().map(|t| t.name().to_string()).collect())
    }

    #[test]
    fn test_fallback_answers_when_everyone_abstains() {
        let mut chain = HookChain::new("fallback", answer(&["nothing"]));
        chain.register("a", abstain());
        chain.register("b", abstain());
        assert_eq!(ask(&chain), Some(vec!["nothing".to_string()]));
    }

    #[test]
    fn test_first_registered_wins() {
        let mut chain = HookChain::new("fallback", answer(&["nothing"]));
        chain.register("a", answer(&["a"]));
        chain.register("b", answer(&["b"]));
        assert_eq!(ask(&chain), Some(vec!["a".to_string()]));
    }

    #[test]
    fn test_empty_answer_is_not_skipped() {
        let mut chain = HookChain::new("fallback", answer(&["nothing"]));
        chain.register("disable", answer(&[]));
        assert_eq!(ask(&chain), Some(vec![]));
    }

    #[test]
    fn test_without_skips_excluded() {
        let mut chain = HookChain::new("fallback", answer(&["nothing"]));
        let a = chain.register("a", answer(&["a"]));
        chain.register("b", answer(&["b"]));
        assert_eq!(ask(&chain.without(&[a])), Some(vec!["b".to_string()]));
    }

    #[test]
    fn test_without_never_skips_fallback() {
        let chain = HookChain::new("fallback", answer(&["nothing"]));
        let fallback = chain.find("fallback").unwrap();
        assert_eq!(ask(&chain.without(&[fallback])), Some(vec!["nothing".to_string()]));
    }

    #[test]
    fn test_error_stops_the_chain() {
        let mut chain = HookChain::new("fallback", answer(&["nothing"]));
        chain.register(
            "broken",
            scope_fn(|_, _| {
                Err(ScopeError::Hook {
                    hook: "broken".into(),
                    message: "boom".into(),
                })
            }),
        );
        let mut overrides = OverrideRegistrar::detached();
        assert!(chain.set_tests(&TemplateSet::empty(), &mut overrides).is_err());
    }

    #[test]
    fn test_order_of_iteration() {
        let mut chain = HookChain::new("fallback", abstain());
        chain.register("a", abstain());
        chain.register("b", abstain());
        let names: Vec<&str> = chain.iter().map(Contributor::name).collect();
        assert_eq!(names, vec!["a", "b", "fallback"]);
    }
}
