//! Jupyter notebook documents.
//!
//! Only the parts the built-in templates look at are modelled. Unknown fields are ignored.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

/// Oldest nbformat major version that is accepted.
pub const MIN_NBFORMAT: u32 = 4;

#[derive(Debug, Error, Diagnostic)]
pub enum NotebookError {
    #[error("failed to read notebook '{}': {source}", path.display())]
    #[diagnostic(code(iovis::notebook::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{}' is not a valid notebook: {source}", path.display())]
    #[diagnostic(code(iovis::notebook::json), help("notebooks are nbformat JSON documents with a `cells` array"))]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("'{}' uses nbformat {nbformat}, at least {} is required", path.display(), MIN_NBFORMAT)]
    #[diagnostic(code(iovis::notebook::nbformat))]
    UnsupportedFormat { path: PathBuf, nbformat: u32 },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Notebook {
    pub cells: Vec<Cell>,
    #[serde(default)]
    pub metadata: Metadata,
    pub nbformat: u32,
    #[serde(default)]
    pub nbformat_minor: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub kernelspec: Option<KernelSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KernelSpec {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cell {
    pub cell_type: String,
    #[serde(default)]
    pub outputs: Vec<Output>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Output {
    pub output_type: String,
    #[serde(default)]
    pub ename: Option<String>,
    #[serde(default)]
    pub evalue: Option<String>,
    #[serde(default)]
    pub traceback: Vec<String>,
}

/// The first error a notebook raised while executing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionError {
    /// Zero-based index into the notebook's cells.
    pub cell_index: usize,
    pub ename: String,
    pub evalue: String,
    pub traceback: Vec<String>,
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell {}: {}: {}", self.cell_index + 1, self.ename, self.evalue)
    }
}

impl Notebook {
    pub fn load(path: &Path) -> Result<Self, NotebookError> {
        let text = fs::read_to_string(path).map_err(|source| NotebookError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Parse notebook JSON. `path` is only used in error messages.
    pub fn parse(text: &str, path: &Path) -> Result<Self, NotebookError> {
        let notebook: Notebook = serde_json::from_str(text).map_err(|source| NotebookError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        if notebook.nbformat < MIN_NBFORMAT {
            return Err(NotebookError::UnsupportedFormat {
                path: path.to_path_buf(),
                nbformat: notebook.nbformat,
            });
        }
        Ok(notebook)
    }

    /// The first stored output of type `error`, in cell order.
    pub fn first_error(&self) -> Option<ExecutionError> {
        self.cells.iter().enumerate().find_map(|(cell_index, cell)| {
            cell.outputs
                .iter()
                .find(|o| o.output_type == "error")
                .map(|o| ExecutionError {
                    cell_index,
                    ename: o.ename.clone().unwrap_or_default(),
                    evalue: o.evalue.clone().unwrap_or_default(),
                    traceback: o.traceback.clone(),
                })
        })
    }
}
