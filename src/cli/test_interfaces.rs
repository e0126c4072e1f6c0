//! Test runner I/O boundary interfaces
//!
//! Artifact execution is abstracted behind [`ArtifactExecutor`] so the runner and the built-in templates can be
//! exercised without an execution engine installed. [`PapermillExecutor`] is the default implementation and shells
//! out to the `papermill` CLI.

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

use crate::notebook::{ExecutionError, Notebook, NotebookError};

/// Errors raised by a running test item.
#[derive(Debug, Error)]
pub enum TestError {
    #[error("fixture 'notebook' requested from a test without a notebook claim")]
    MissingClaim,

    #[error("unknown test template '{0}'")]
    UnknownTemplate(String),

    #[error(transparent)]
    Notebook(#[from] NotebookError),

    /// The artifact itself raised while executing.
    #[error("notebook execution failed: {0}")]
    Execution(ExecutionError),

    #[error("execution engine failed: {0}")]
    Engine(String),

    #[error("{0}")]
    Assertion(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TestError {
    /// The failure text shown for the item `nodeid`.
    ///
    /// Execution failures are shortened to the notebook traceback and a `path:cell N: Name` line.
    pub fn longrepr(&self, nodeid: &str) -> String {
        match self {
            TestError::Execution(err) => {
                let node_path = nodeid.split("::").next().unwrap_or(nodeid);
                let mut out = err.traceback.join("\n");
                out.push_str(&format!("\n\n{node_path}:cell {}: {}", err.cell_index + 1, err.ename));
                out
            }
            other => other.to_string(),
        }
    }
}

/// Options forwarded to every artifact execution.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// `-p NAME VALUE` pairs, in command-line order.
    pub parameters: Vec<(String, String)>,
    /// Keep executed notebooks here instead of a scratch directory.
    pub keep_outputs: Option<PathBuf>,
}

// ============================================================================
// Artifact Executor Interface
// ============================================================================

/// Run an artifact and report the first error it raised.
pub trait ArtifactExecutor {
    /// Whether the engine can be used at all.
    fn is_available(&self) -> bool;

    /// Execute `artifact` from its own directory.
    fn execute(&self, artifact: &Path, options: &RunOptions) -> Result<(), TestError>;
}

/// Executes notebooks with the `papermill` command-line tool.
#[derive(Debug, Clone)]
pub struct PapermillExecutor {
    program: PathBuf,
    available: bool,
}

impl PapermillExecutor {
    /// Probe `papermill --version` once and remember the answer.
    pub fn probe() -> Self {
        Self::probe_program(PathBuf::from("papermill"))
    }

    pub fn probe_program(program: PathBuf) -> Self {
        let available = Command::new(&program)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);
        if !available {
            tracing::info!(program = %program.display(), "execution engine not found, notebook_runs disabled");
        }
        Self { program, available }
    }

    fn output_path(dir: &Path, artifact: &Path) -> PathBuf {
        let stem = artifact.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        dir.join(format!("{stem}.output.ipynb"))
    }
}

impl ArtifactExecutor for PapermillExecutor {
    fn is_available(&self) -> bool {
        self.available
    }

    fn execute(&self, artifact: &Path, options: &RunOptions) -> Result<(), TestError> {
        if !self.available {
            return Err(TestError::Engine(format!("'{}' is not installed", self.program.display())));
        }

        let scratch;
        let out_dir = match &options.keep_outputs {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                dir.clone()
            }
            None => {
                scratch = tempfile::tempdir()?;
                scratch.path().to_path_buf()
            }
        };
        let output = Self::output_path(&out_dir, artifact);

        let mut cmd = Command::new(&self.program);
        cmd.arg(artifact).arg(&output);
        if let Some(cwd) = artifact.parent() {
            cmd.arg("--cwd").arg(cwd);
        }
        for (name, value) in &options.parameters {
            cmd.arg("-p").arg(name).arg(value);
        }

        tracing::debug!(artifact = %artifact.display(), output = %output.display(), "executing notebook");
        let result = cmd
            .output()
            .map_err(|e| TestError::Engine(format!("failed to run {}: {e}", self.program.display())))?;
        if result.status.success() {
            return Ok(());
        }

        // The executed copy carries the error output of the failing cell.
        if let Some(err) = Notebook::load(&output).ok().and_then(|nb| nb.first_error()) {
            return Err(TestError::Execution(err));
        }

        let stderr = String::from_utf8_lossy(&result.stderr);
        Err(TestError::Engine(format!("{}\n{}", result.status, stderr.trim_end())))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_longrepr() {
        let err = TestError::Execution(ExecutionError {
            cell_index: 1,
            ename: "ZeroDivisionError".into(),
            evalue: "division by zero".into(),
            traceback: vec!["Traceback".into(), "  1/0".into()],
        });
        assert_eq!(
            err.longrepr("nb/a.ipynb::notebook_runs"),
            "Traceback\n  1/0\n\nnb/a.ipynb:cell 2: ZeroDivisionError"
        );
    }

    #[test]
    fn test_missing_claim_message() {
        let msg = TestError::MissingClaim.longrepr("test_x.toml::test_a");
        assert!(msg.contains("requested from a test without a notebook claim"));
    }

    #[test]
    fn test_output_path() {
        assert_eq!(
            PapermillExecutor::output_path(Path::new("/tmp/out"), Path::new("/p/nb/a.ipynb")),
            PathBuf::from("/tmp/out/a.output.ipynb")
        );
    }

    #[test]
    fn test_missing_engine_is_unavailable() {
        let executor = PapermillExecutor::probe_program(PathBuf::from("/nonexistent/papermill-for-tests"));
        assert!(!executor.is_available());
        let err = executor.execute(Path::new("/p/a.ipynb"), &RunOptions::default()).unwrap_err();
        assert!(matches!(err, TestError::Engine(_)));
    }
}
