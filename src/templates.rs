//! Built-in test templates.
//!
//! The core only knows templates by name and shape. This registry owns their bodies and runs them.

use std::path::Path;

use iovis_core::{ItemSpec, ScopeError, TemplateShape, TestTemplate};

use crate::cli::test_interfaces::{ArtifactExecutor, RunOptions, TestError};
use crate::notebook::Notebook;

/// Everything a template body can use.
pub struct TestContext<'a> {
    pub nodeid: &'a str,
    pub artifact: Option<&'a Path>,
    pub executor: &'a dyn ArtifactExecutor,
    pub options: &'a RunOptions,
}

impl<'a> TestContext<'a> {
    /// The artifact under test. Fails for explicit tests that claim no notebook.
    pub fn notebook_path(&self) -> Result<&'a Path, TestError> {
        self.artifact.ok_or(TestError::MissingClaim)
    }

    pub fn notebook(&self) -> Result<Notebook, TestError> {
        Ok(Notebook::load(self.notebook_path()?)?)
    }
}

pub type TemplateFn = fn(&TestContext<'_>) -> Result<(), TestError>;

pub enum TemplateBody {
    Function(TemplateFn),
    Group(Vec<(&'static str, TemplateFn)>),
}

pub struct RegisteredTemplate {
    template: TestTemplate,
    summary: &'static str,
    body: TemplateBody,
}

impl RegisteredTemplate {
    fn function(name: &'static str, summary: &'static str, f: TemplateFn) -> Self {
        Self {
            template: TestTemplate::function(name),
            summary,
            body: TemplateBody::Function(f),
        }
    }

    fn group(name: &'static str, summary: &'static str, members: Vec<(&'static str, TemplateFn)>) -> Self {
        Self {
            template: TestTemplate::group(name, members.iter().map(|(m, _)| *m)),
            summary,
            body: TemplateBody::Group(members),
        }
    }

    pub fn template(&self) -> &TestTemplate {
        &self.template
    }

    pub fn summary(&self) -> &'static str {
        self.summary
    }

    pub fn body(&self) -> &TemplateBody {
        &self.body
    }
}

pub struct TemplateRegistry {
    entries: Vec<RegisteredTemplate>,
}

impl TemplateRegistry {
    pub const NOTHING: &'static str = "nothing";
    pub const NOTEBOOK_RUNS: &'static str = "notebook_runs";

    pub fn builtin() -> Self {
        Self {
            entries: vec![
                RegisteredTemplate::function(Self::NOTHING, "Do nothing.", nothing),
                RegisteredTemplate::function(
                    Self::NOTEBOOK_RUNS,
                    "Validates that the notebook runs without raising exceptions.",
                    notebook_runs,
                ),
                RegisteredTemplate::function(
                    "valid_notebook",
                    "The file parses as an nbformat 4 notebook.",
                    valid_notebook,
                ),
                RegisteredTemplate::function(
                    "no_error_outputs",
                    "No stored cell output is an error.",
                    no_error_outputs,
                ),
                RegisteredTemplate::group(
                    "Hygiene",
                    "Basic notebook hygiene checks.",
                    vec![
                        ("test_has_cells", has_cells as TemplateFn),
                        ("test_kernelspec_declared", kernelspec_declared as TemplateFn),
                    ],
                ),
            ],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredTemplate> {
        self.entries.iter()
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTemplate> {
        self.entries.iter().find(|e| e.template.name() == name)
    }

    pub fn template(&self, name: &str) -> Option<TestTemplate> {
        self.get(name).map(|e| e.template.clone())
    }

    /// Look up `names` in order. `source` names the declaring file in the error.
    pub fn resolve(&self, names: &[String], source: &Path) -> Result<Vec<TestTemplate>, ScopeError> {
        names
            .iter()
            .map(|name| {
                self.template(name).ok_or_else(|| ScopeError::UnknownTemplate {
                    scope: source.to_path_buf(),
                    name: name.clone(),
                })
            })
            .collect()
    }

    /// Run one item. A group template without a member runs every member in order.
    pub fn run(&self, spec: &ItemSpec, ctx: &TestContext<'_>) -> Result<(), TestError> {
        let entry = self
            .get(spec.template.name())
            .ok_or_else(|| TestError::UnknownTemplate(spec.template.name().to_string()))?;

        match (&entry.body, &spec.member) {
            (TemplateBody::Function(f), _) => f(ctx),
            (TemplateBody::Group(members), Some(member)) => {
                let (_, f) = members
                    .iter()
                    .find(|(name, _)| *name == &**member)
                    .ok_or_else(|| TestError::UnknownTemplate(format!("{}::{member}", entry.template)))?;
                f(ctx)
            }
            (TemplateBody::Group(members), None) => members.iter().try_for_each(|(_, f)| f(ctx)),
        }
    }
}

/// Member names of a template, or none for a function template.
pub fn members(template: &TestTemplate) -> &[std::sync::Arc<str>] {
    match template.shape() {
        TemplateShape::Function => &[],
        TemplateShape::Group(members) => members,
    }
}

// ============================================================================
// Bodies
// ============================================================================

fn nothing(ctx: &TestContext<'_>) -> Result<(), TestError> {
    ctx.notebook_path()?;
    Ok(())
}

fn notebook_runs(ctx: &TestContext<'_>) -> Result<(), TestError> {
    ctx.executor.execute(ctx.notebook_path()?, ctx.options)
}

fn valid_notebook(ctx: &TestContext<'_>) -> Result<(), TestError> {
    ctx.notebook()?;
    Ok(())
}

fn no_error_outputs(ctx: &TestContext<'_>) -> Result<(), TestError> {
    match ctx.notebook()?.first_error() {
        Some(err) => Err(TestError::Execution(err)),
        None => Ok(()),
    }
}

fn has_cells(ctx: &TestContext<'_>) -> Result<(), TestError> {
    if ctx.notebook()?.cells.is_empty() {
        return Err(TestError::Assertion("notebook has no cells".to_string()));
    }
    Ok(())
}

fn kernelspec_declared(ctx: &TestContext<'_>) -> Result<(), TestError> {
    if ctx.notebook()?.metadata.kernelspec.is_none() {
        return Err(TestError::Assertion("notebook metadata declares no kernelspec".to_string()));
    }
    Ok(())
}
