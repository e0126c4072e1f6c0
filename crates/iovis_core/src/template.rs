//! Test templates and ordered template sets.
//!
//! A template is identified by its name. It is either a single function or a named group of functions; the host
//! owns the bodies and looks them up by name when it runs an item. Order inside a [`TemplateSet`] is significant:
//! it is the emission order of the generated items.

use std::fmt;
use std::sync::Arc;

/// Shape of a template: one generated item, or a group of them under a shared container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateShape {
    Function,
    /// Member function names, in emission order.
    Group(Arc<[Arc<str>]>),
}

/// A named, invocable unit used to generate test items for an artifact.
#[derive(Debug, Clone)]
pub struct TestTemplate {
    name: Arc<str>,
    shape: TemplateShape,
}

impl TestTemplate {
    pub fn function(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            shape: TemplateShape::Function,
        }
    }

    pub fn group<I, S>(name: impl Into<Arc<str>>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self {
            name: name.into(),
            shape: TemplateShape::Group(members.into_iter().map(Into::into).collect()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &TemplateShape {
        &self.shape
    }

    pub fn is_group(&self) -> bool {
        matches!(self.shape, TemplateShape::Group(_))
    }
}

// Identity is the name.
impl PartialEq for TestTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for TestTemplate {}

impl fmt::Display for TestTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// An immutable, cheaply clonable, ordered tuple of templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateSet(Arc<[TestTemplate]>);

impl TemplateSet {
    /// The empty tuple. Distinct from "no opinion", which hooks express with `None`.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TestTemplate> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[TestTemplate] {
        &self.0
    }

    /// Copy out the templates, e.g. to extend an inherited set.
    pub fn to_vec(&self) -> Vec<TestTemplate> {
        self.0.to_vec()
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(TestTemplate::name).collect()
    }
}

impl From<Vec<TestTemplate>> for TemplateSet {
    fn from(templates: Vec<TestTemplate>) -> Self {
        Self(templates.into())
    }
}

impl FromIterator<TestTemplate> for TemplateSet {
    fn from_iter<I: IntoIterator<Item = TestTemplate>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a TemplateSet {
    type Item = &'a TestTemplate;
    type IntoIter = std::slice::Iter<'a, TestTemplate>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
