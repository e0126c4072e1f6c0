//! Test runner implementation (pytest-style)
//!
//! ## TestReporter Trait
//!
//! The test runner uses a `TestReporter` trait to separate reporting from
//! execution. This allows for custom output formats (JSON, TAP, etc.) by
//! implementing the trait.
//!
//! ## I/O Boundaries
//!
//! Artifact execution goes through [`ArtifactExecutor`] (see `test_interfaces.rs`), so a run can be driven
//! without an execution engine installed.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use iovis_core::{CollectionTree, ItemSpec, NodeId, NodeKind};

use super::test_interfaces::{ArtifactExecutor, RunOptions, TestError};
use super::{CliError, CliResult, ExitCode};
use crate::discovery::{self, CollectionError, DiscoveryOptions};
use crate::templates::{TemplateRegistry, TestContext};

// ============================================================================
// Test Reporter Trait
// ============================================================================

/// Trait for reporting test execution results.
///
/// Implement this trait to customize test output format (JSON, TAP, etc.)
pub trait TestReporter {
    /// Called for every collector that failed to collect
    fn on_collection_error(&mut self, error: &CollectionError);

    /// Called when test collection is complete
    fn on_collection_complete(&mut self, test_count: usize, deselected: usize);

    /// Called when a test run begins
    fn on_test_start(&mut self, test: &TestInfo);

    /// Called when a test completes
    fn on_test_complete(&mut self, test: &TestInfo, result: &TestResult);

    /// Called when all tests have completed
    fn on_run_complete(&mut self, summary: &TestSummary);
}

/// Summary of test run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub deselected: usize,
    pub collection_errors: usize,
    pub duration: Duration,
}

impl TestSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.errors == 0 && self.collection_errors == 0
    }

    /// `2 passed, 1 failed` style summary, without timing.
    pub fn parts(&self) -> Vec<String> {
        let mut parts = Vec::new();
        if self.passed > 0 {
            parts.push(format!("{} passed", self.passed));
        }
        if self.failed > 0 {
            parts.push(format!("{} failed", self.failed));
        }
        if self.errors > 0 {
            parts.push(format!("{} error(s)", self.errors));
        }
        if self.deselected > 0 {
            parts.push(format!("{} deselected", self.deselected));
        }
        if self.collection_errors > 0 {
            parts.push(format!("{} collection error(s)", self.collection_errors));
        }
        if parts.is_empty() {
            parts.push("no tests ran".to_string());
        }
        parts
    }
}

/// Default console reporter (pytest-style)
#[derive(Default)]
pub struct ConsoleReporter {
    pub verbose: bool,
    failures: Vec<(String, String)>,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            failures: Vec::new(),
        }
    }
}

impl TestReporter for ConsoleReporter {
    fn on_collection_error(&mut self, error: &CollectionError) {
        println!("\x1b[1;31mERROR collecting {}\x1b[0m", error.location);
        println!("{:?}", error.report);
    }

    fn on_collection_complete(&mut self, test_count: usize, deselected: usize) {
        println!("\x1b[1m=================== test session starts ===================\x1b[0m");
        if deselected > 0 {
            println!("collected {} item(s) / {} deselected", test_count + deselected, deselected);
        } else {
            println!("collected {} item(s)", test_count);
        }
        println!();
    }

    fn on_test_start(&mut self, test: &TestInfo) {
        if self.verbose {
            print!("{} ", test.nodeid);
        }
    }

    fn on_test_complete(&mut self, test: &TestInfo, result: &TestResult) {
        let status = match result {
            TestResult::Passed(d) => {
                if self.verbose {
                    format!("\x1b[32mPASSED\x1b[0m ({:.0}ms)", d.as_millis())
                } else {
                    "\x1b[32m.\x1b[0m".to_string()
                }
            }
            TestResult::Failed(d, _) => {
                if self.verbose {
                    format!("\x1b[31mFAILED\x1b[0m ({:.0}ms)", d.as_millis())
                } else {
                    "\x1b[31mF\x1b[0m".to_string()
                }
            }
            TestResult::Error(d, _) => {
                if self.verbose {
                    format!("\x1b[31mERROR\x1b[0m ({:.0}ms)", d.as_millis())
                } else {
                    "\x1b[31mE\x1b[0m".to_string()
                }
            }
        };

        if self.verbose {
            println!("{}", status);
        } else {
            print!("{}", status);
        }

        if let TestResult::Failed(_, msg) | TestResult::Error(_, msg) = result {
            self.failures.push((test.nodeid.clone(), msg.clone()));
        }
    }

    fn on_run_complete(&mut self, summary: &TestSummary) {
        if !self.verbose {
            println!();
        }

        if !self.failures.is_empty() {
            println!();
            println!("\x1b[1;31m=================== FAILURES ===================\x1b[0m");
            for (nodeid, msg) in &self.failures {
                println!();
                println!("\x1b[1m___________ {} ___________\x1b[0m", nodeid);
                println!();
                for line in msg.lines() {
                    println!("    {}", line);
                }
            }
        }

        println!();
        let summary_color = if summary.is_success() { "\x1b[1;32m" } else { "\x1b[1;31m" };
        println!(
            "{}=================== {} in {:.2}s ===================\x1b[0m",
            summary_color,
            summary.parts().join(", "),
            summary.duration.as_secs_f64()
        );
    }
}

/// Information about a collected test
#[derive(Debug, Clone)]
pub struct TestInfo {
    pub nodeid: String,
    /// The artifact the test runs against, if it has one.
    pub artifact: Option<PathBuf>,
    pub spec: ItemSpec,
}

impl TestInfo {
    fn from_item(tree: &CollectionTree, id: NodeId) -> Option<Self> {
        let NodeKind::Item(spec) = tree.kind(id) else {
            return None;
        };
        Some(Self {
            nodeid: tree.nodeid(id).to_string(),
            artifact: tree.artifact_for(id).map(Path::to_path_buf),
            spec: spec.clone(),
        })
    }
}

/// Result of running a single test
#[derive(Debug)]
pub enum TestResult {
    Passed(Duration),
    Failed(Duration, String),
    /// The test could not be set up, e.g. it needs a notebook and claims none.
    Error(Duration, String),
}

/// Everything `iovis test` was asked to do.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub discovery: DiscoveryOptions,
    pub run: RunOptions,
    /// Keep only items whose node id contains this.
    pub filter: Option<String>,
    pub stop_on_fail: bool,
    pub collect_only: bool,
}

/// Collect and run everything under `path`.
pub fn run_tests(
    path: &Path,
    config: &RunConfig,
    registry: &TemplateRegistry,
    executor: &dyn ArtifactExecutor,
    reporter: &mut dyn TestReporter,
) -> CliResult<ExitCode> {
    let start_time = Instant::now();

    let collection = discovery::collect(path, &config.discovery, registry).map_err(CliError::diagnostic)?;
    for error in &collection.errors {
        reporter.on_collection_error(error);
    }

    let (selected, deselected): (Vec<NodeId>, Vec<NodeId>) = collection
        .items
        .iter()
        .copied()
        .partition(|&id| config.filter.as_deref().is_none_or(|k| collection.tree.nodeid(id).contains(k)));

    if config.collect_only {
        print!("{}", render_collection(&collection.tree, &selected));
        return Ok(if collection.errors.is_empty() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    reporter.on_collection_complete(selected.len(), deselected.len());

    let mut summary = TestSummary {
        deselected: deselected.len(),
        collection_errors: collection.errors.len(),
        ..TestSummary::default()
    };

    for id in selected {
        let Some(test) = TestInfo::from_item(&collection.tree, id) else {
            continue;
        };
        reporter.on_test_start(&test);
        let result = run_single_test(&test, registry, executor, &config.run);
        summary.total += 1;
        match &result {
            TestResult::Passed(_) => summary.passed += 1,
            TestResult::Failed(_, _) => summary.failed += 1,
            TestResult::Error(_, _) => summary.errors += 1,
        }
        reporter.on_test_complete(&test, &result);

        if config.stop_on_fail && !matches!(result, TestResult::Passed(_)) {
            break;
        }
    }

    summary.duration = start_time.elapsed();
    reporter.on_run_complete(&summary);

    if summary.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        // Summary already printed
        Err(CliError::new("", ExitCode::FAILURE))
    }
}

fn run_single_test(
    test: &TestInfo,
    registry: &TemplateRegistry,
    executor: &dyn ArtifactExecutor,
    options: &RunOptions,
) -> TestResult {
    let start = Instant::now();
    let ctx = TestContext {
        nodeid: &test.nodeid,
        artifact: test.artifact.as_deref(),
        executor,
        options,
    };
    match registry.run(&test.spec, &ctx) {
        Ok(()) => TestResult::Passed(start.elapsed()),
        Err(e @ (TestError::MissingClaim | TestError::UnknownTemplate(_))) => {
            TestResult::Error(start.elapsed(), e.longrepr(&test.nodeid))
        }
        Err(e) => TestResult::Failed(start.elapsed(), e.longrepr(&test.nodeid)),
    }
}

/// Render the collected tree the way `--collect-only` prints it.
///
/// Only collectors leading to at least one of `items` are shown.
pub fn render_collection(tree: &CollectionTree, items: &[NodeId]) -> String {
    let session = tree.session();
    let mut printed = HashSet::new();
    let mut out = String::new();

    for &item in items {
        let mut chain: Vec<NodeId> = tree.ancestors_or_self(item).take_while(|&n| n != session).collect();
        chain.reverse();
        for (depth, node) in chain.into_iter().enumerate() {
            if !printed.insert(node) {
                continue;
            }
            let label = match tree.kind(node) {
                NodeKind::Session => continue,
                NodeKind::Directory => "Dir",
                NodeKind::Module => "Module",
                NodeKind::Artifact { .. } => "Notebook",
                NodeKind::Group => "Suite",
                NodeKind::Item(_) => "Test",
            };
            let _ = writeln!(out, "{}<{} {}>", "  ".repeat(depth), label, tree.node(node).name());
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use iovis_core::{TemplateSet, TestTemplate};

    use super::*;

    #[test]
    fn test_render_collection_shows_only_item_chains() {
        let mut tree = CollectionTree::new(Path::new("/p"));
        let session = tree.session();
        let nb = tree.add_directory(session, Path::new("/p/nb"));
        tree.add_directory(session, Path::new("/p/empty"));
        let artifact = tree.add_artifact(nb, Path::new("/p/nb/a.ipynb"), TemplateSet::empty());
        let item = tree.add_item(artifact, "nothing", ItemSpec::function(TestTemplate::function("nothing")));

        assert_eq!(
            render_collection(&tree, &[item]),
            "<Dir nb>\n  <Notebook a.ipynb>\n    <Test nothing>\n"
        );
    }

    #[test]
    fn test_summary_parts() {
        let summary = TestSummary {
            passed: 2,
            failed: 1,
            deselected: 3,
            ..TestSummary::default()
        };
        assert_eq!(summary.parts(), vec!["2 passed", "1 failed", "3 deselected"]);
        assert!(!summary.is_success());
        assert_eq!(TestSummary::default().parts(), vec!["no tests ran"]);
    }
}
