//! Project discovery: the directory walk that feeds the resolver and the scheduler.
//!
//! The walk is depth first. Every collector is collected, reported to the [`CollectionScheduler`], and then its
//! surviving children are visited in report order, so artifact collectors come last and claimed ones never run.
//! Directory scopes are ingested when their directory is collected, which is always before anything beneath it.
//!
//! A pass always starts at the project root, even when it was asked for a subdirectory or a single file. The walk
//! then only descends along the way to the requested path, so every enclosing scope is ingested on the way down.

pub mod suite_file;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use iovis_core::hooks::scope_fn;
use iovis_core::regroup::regroup;
use iovis_core::{
    CollectReport, CollectionScheduler, CollectionTree, HookChain, ItemSpec, NodeId, NodeKind, RegroupError,
    ScopeError, ScopeResolver, TemplateShape, TestTemplate,
};
use miette::Diagnostic;
use thiserror::Error;

use crate::config::{ConfigError, ProjectSettings, SCOPE_FILE_NAME, ScopeDeclaration};
use crate::templates::TemplateRegistry;

use self::suite_file::TestFile;

/// Names of the global contributors, in priority order.
pub const CLI_CONTRIBUTOR: &str = "cli";
pub const PROJECT_CONTRIBUTOR: &str = "project";
pub const ENGINE_CONTRIBUTOR: &str = "notebook-runner";
pub const FALLBACK_CONTRIBUTOR: &str = "fallback";

#[derive(Debug, Error, Diagnostic)]
pub enum DiscoveryError {
    #[error("cannot collect '{}': {source}", path.display())]
    #[diagnostic(code(iovis::discovery::path))]
    Path {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unknown contributor '{name}'")]
    #[diagnostic(code(iovis::discovery::unknown_contributor), help("known contributors: {known}"))]
    UnknownContributor { name: String, known: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Scope(#[from] ScopeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Regroup(#[from] RegroupError),
}

/// Inputs of one discovery pass that do not come from the project itself.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    /// Template names given on the command line.
    pub templates: Vec<String>,
    /// Global contributors to leave out of the chain.
    pub without: Vec<String>,
    /// Whether the execution engine contributes `notebook_runs`.
    pub engine_available: bool,
}

/// A problem confined to one collector. The walk carries on without it.
#[derive(Debug)]
pub struct CollectionError {
    /// Node id of the collector, or its path when it never became a node.
    pub location: String,
    pub report: miette::Report,
}

/// The outcome of a discovery pass.
#[derive(Debug)]
pub struct Collection {
    pub tree: CollectionTree,
    /// Items in run order.
    pub items: Vec<NodeId>,
    pub errors: Vec<CollectionError>,
    /// Overrides whose file was never collected.
    pub unconsumed_overrides: Vec<PathBuf>,
}

/// Build the global contributor chain.
///
/// Unknown template names are resolved eagerly so a typo fails the pass before anything is walked.
pub fn global_chain(
    options: &DiscoveryOptions,
    settings: &ProjectSettings,
    registry: &TemplateRegistry,
    project_source: &Path,
) -> Result<HookChain, ScopeError> {
    let mut chain = HookChain::new(
        FALLBACK_CONTRIBUTOR,
        scope_fn(|_, _| Ok(Some(vec![TestTemplate::function(TemplateRegistry::NOTHING)]))),
    );

    let from_cli = registry.resolve(&options.templates, Path::new("<command line>"))?;
    let from_cli = (!from_cli.is_empty()).then_some(from_cli);
    chain.register(CLI_CONTRIBUTOR, scope_fn(move |_, _| Ok(from_cli.clone())));

    let from_project = match &settings.templates {
        Some(names) => Some(registry.resolve(names, project_source)?),
        None => None,
    };
    chain.register(PROJECT_CONTRIBUTOR, scope_fn(move |_, _| Ok(from_project.clone())));

    let from_engine = options
        .engine_available
        .then(|| registry.template(TemplateRegistry::NOTEBOOK_RUNS))
        .flatten()
        .map(|t| vec![t]);
    chain.register(ENGINE_CONTRIBUTOR, scope_fn(move |_, _| Ok(from_engine.clone())));

    Ok(chain)
}

/// Find the directory a pass over `start` is rooted at.
///
/// The nearest ancestor-or-self whose `iovis.toml` has a `[project]` table wins. Without one, the outermost
/// ancestor-or-self holding an `iovis.toml` is used, and without any, `start` itself.
pub fn project_root(start: &Path) -> PathBuf {
    let mut outermost = None;
    for dir in start.ancestors() {
        match ScopeDeclaration::load(dir) {
            Ok(Some(decl)) if decl.file.project.is_some() => return dir.to_path_buf(),
            Ok(Some(_)) | Err(ConfigError::Parse { .. } | ConfigError::DisableWithTemplates { .. }) => {
                outermost = Some(dir);
            }
            Ok(None) => {}
            Err(e) => tracing::debug!(dir = %dir.display(), error = %e, "skipping unreadable scope file"),
        }
    }
    outermost.unwrap_or(start).to_path_buf()
}

/// Collect everything under `path`.
///
/// `path` may be a directory or a single file. Either way the pass is rooted at [`project_root`], node ids are
/// relative to it, and only `path` and what lies beneath it is collected.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn collect(path: &Path, options: &DiscoveryOptions, registry: &TemplateRegistry) -> Result<Collection, DiscoveryError> {
    let path = fs::canonicalize(path).map_err(|source| DiscoveryError::Path {
        path: path.to_path_buf(),
        source,
    })?;
    let start = match path.parent() {
        Some(parent) if path.is_file() => parent,
        _ => path.as_path(),
    };
    let root = project_root(start);
    let selection = (path != root).then(|| path.clone());
    tracing::debug!(root = %root.display(), "project root");

    let root_decl = ScopeDeclaration::load(&root)?;
    let settings = ProjectSettings::from_table(root_decl.as_ref().and_then(|d| d.file.project.as_ref()));
    let chain = global_chain(options, &settings, registry, &root.join(SCOPE_FILE_NAME))?;

    let mut excluded = Vec::new();
    for name in &options.without {
        let id = chain.find(name).ok_or_else(|| DiscoveryError::UnknownContributor {
            name: name.clone(),
            known: chain.iter().map(|c| c.name().to_string()).collect::<Vec<_>>().join(", "),
        })?;
        excluded.push(id);
    }
    let resolver = ScopeResolver::initialize(&chain.without(&excluded))?;

    let mut walker = Walker {
        registry,
        settings: &settings,
        selection,
        root_decl,
        tree: CollectionTree::new(&root),
        resolver,
        scheduler: CollectionScheduler::new(),
        items: Vec::new(),
        errors: Vec::new(),
    };
    let session = walker.tree.session();
    walker.collect(session);

    let Walker {
        selection,
        mut tree,
        resolver,
        mut scheduler,
        items,
        errors,
        ..
    } = walker;
    if scheduler.remaining() > 0 {
        tracing::warn!(remaining = scheduler.remaining(), "walk ended with collectors still unreported");
    }
    scheduler.finish();
    // Overrides aimed outside a partial run are expected to stay unused.
    let unconsumed_overrides: Vec<PathBuf> = resolver
        .finish()
        .into_iter()
        .filter(|target| selection.as_ref().is_none_or(|s| target.starts_with(s)))
        .collect();
    for target in &unconsumed_overrides {
        tracing::warn!(path = %target.display(), "file override was never applied: the file was not collected");
    }
    let items = regroup(&mut tree, items)?;

    tracing::debug!(items = items.len(), errors = errors.len(), "collection finished");
    Ok(Collection {
        tree,
        items,
        errors,
        unconsumed_overrides,
    })
}

struct Walker<'a> {
    registry: &'a TemplateRegistry,
    settings: &'a ProjectSettings,
    selection: Option<PathBuf>,
    root_decl: Option<ScopeDeclaration>,
    tree: CollectionTree,
    resolver: ScopeResolver,
    scheduler: CollectionScheduler,
    items: Vec<NodeId>,
    errors: Vec<CollectionError>,
}

impl Walker<'_> {
    fn collect(&mut self, collector: NodeId) {
        let result = match self.tree.kind(collector).clone() {
            NodeKind::Session | NodeKind::Directory => self.collect_directory(collector),
            NodeKind::Module => self.collect_module(collector),
            NodeKind::Artifact { .. } => self.collect_artifact(collector),
            NodeKind::Group => self.tree.children(collector).to_vec(),
            NodeKind::Item(_) => return,
        };

        let mut report = CollectReport::new(collector, result);
        if let Some(release) = self.scheduler.on_report(&mut self.tree, &mut report) {
            for &dropped in &release.dropped {
                tracing::debug!(artifact = %self.tree.nodeid(dropped), "artifact claimed by an explicit test");
            }
        }

        for child in report.result {
            if self.tree.kind(child).is_collector() {
                self.collect(child);
            } else {
                self.items.push(child);
            }
        }
    }

    fn collect_directory(&mut self, collector: NodeId) -> Vec<NodeId> {
        let dir = match self.tree.node(collector).path() {
            Some(path) => path.to_path_buf(),
            None => self.tree.root_dir().to_path_buf(),
        };

        self.ingest_scope(collector, &dir);

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(source) => {
                self.error(collector, ConfigError::Io { path: dir, source });
                return Vec::new();
            }
        };
        let (mut dirs, mut files): (Vec<PathBuf>, Vec<PathBuf>) =
            entries.filter_map(Result::ok).map(|e| e.path()).partition(|p| p.is_dir());
        files.sort();
        dirs.sort();

        for file in files {
            if !self.selected(&file) {
                continue;
            }
            let name = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            if name == SCOPE_FILE_NAME {
                continue;
            }
            if suite_file::is_test_file(&name) {
                self.tree.add_module(collector, &file);
            } else if self.settings.is_artifact(&file) {
                match self.resolver.resolve_artifact(&file) {
                    Ok(templates) => {
                        self.tree.add_artifact(collector, &file, templates);
                    }
                    Err(e) => self.error_at(file.display().to_string(), e),
                }
            }
        }

        for sub in dirs {
            let name = sub.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            if !self.selected(&sub) || (self.settings.is_ignored_dir(&name) && !self.leads_to_selection(&sub)) {
                continue;
            }
            if sub.is_symlink() {
                tracing::debug!(dir = %sub.display(), "not following symlinked directory");
                continue;
            }
            self.tree.add_directory(collector, &sub);
        }

        self.tree.children(collector).to_vec()
    }

    fn ingest_scope(&mut self, collector: NodeId, dir: &Path) {
        let decl = if collector == self.tree.session() {
            Ok(self.root_decl.take())
        } else {
            ScopeDeclaration::load(dir)
        };
        match decl {
            Ok(Some(decl)) => {
                if decl.file.project.is_some() && collector != self.tree.session() {
                    tracing::warn!(file = %decl.source.display(), "[project] is only read from the root iovis.toml");
                }
                if let Err(e) = self.resolver.ingest_scope(dir, &decl.bind(self.registry)) {
                    self.error(collector, ConfigError::from(e));
                }
            }
            Ok(None) => {}
            Err(e) => self.error(collector, e),
        }
    }

    fn collect_module(&mut self, collector: NodeId) -> Vec<NodeId> {
        let Some(path) = self.tree.node(collector).path().map(Path::to_path_buf) else {
            return Vec::new();
        };
        let file = match TestFile::load(&path) {
            Ok(file) => file,
            Err(e) => {
                self.error(collector, e);
                return Vec::new();
            }
        };
        for e in suite_file::populate(&mut self.tree, collector, &file, self.registry) {
            self.error(collector, e);
        }
        self.tree.children(collector).to_vec()
    }

    fn collect_artifact(&mut self, collector: NodeId) -> Vec<NodeId> {
        let NodeKind::Artifact { templates } = self.tree.kind(collector).clone() else {
            return Vec::new();
        };
        for template in templates.iter() {
            match template.shape() {
                TemplateShape::Function => {
                    self.tree
                        .add_item(collector, template.name(), ItemSpec::function(template.clone()));
                }
                TemplateShape::Group(members) => {
                    let group = self.tree.add_group(collector, template.name());
                    for member in members.iter() {
                        self.tree
                            .add_item(group, &**member, ItemSpec::member(template.clone(), member.clone()));
                    }
                }
            }
        }
        self.tree.children(collector).to_vec()
    }

    /// Whether `path` lies on the way down to the requested path or inside it.
    fn selected(&self, path: &Path) -> bool {
        self.selection
            .as_ref()
            .is_none_or(|selection| selection.starts_with(path) || path.starts_with(selection))
    }

    /// Whether `path` is the requested path or one of its ancestors. These are entered even when ignored.
    fn leads_to_selection(&self, path: &Path) -> bool {
        self.selection.as_ref().is_some_and(|selection| selection.starts_with(path))
    }

    fn error(&mut self, collector: NodeId, err: impl Diagnostic + Send + Sync + 'static) {
        let location = self.tree.nodeid(collector).to_string();
        self.error_at(location, err);
    }

    fn error_at(&mut self, location: String, err: impl Diagnostic + Send + Sync + 'static) {
        tracing::debug!(location = %location, error = %err, "collection error");
        self.errors.push(CollectionError {
            location,
            report: miette::Report::new(err),
        });
    }
}
