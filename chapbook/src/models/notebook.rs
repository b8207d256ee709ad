//! Jupyter notebook models

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ChapError;
use crate::filesys::file::File;

/// Notebook record as returned by the Jupyter contents API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotebookRecord {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub last_modified: Option<String>,

    #[serde(default)]
    pub created: Option<String>,

    #[serde(default)]
    pub content: Option<NotebookContent>,
}

/// Notebook document (the `.ipynb` body)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotebookContent {
    #[serde(default)]
    pub cells: Vec<Cell>,
}

/// A single notebook cell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub cell_type: String,

    #[serde(default)]
    pub execution_count: Option<i64>,

    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub source: CellSource,
}

/// Cell source; nbformat allows a string or a list of lines
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellSource {
    Text(String),
    Lines(Vec<String>),
}

impl Default for CellSource {
    fn default() -> Self {
        CellSource::Text(String::new())
    }
}

impl CellSource {
    pub fn text(&self) -> String {
        match self {
            CellSource::Text(text) => text.clone(),
            // list entries keep their own trailing newlines
            CellSource::Lines(lines) => lines.concat(),
        }
    }
}

impl NotebookRecord {
    /// Parse a local `.ipynb` file
    pub async fn from_ipynb_file(path: &Path) -> Result<Self, ChapError> {
        let content: NotebookContent = File::new(path).read_json().await?;
        Ok(Self {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            path: path.to_string_lossy().to_string(),
            content: Some(content),
            ..Default::default()
        })
    }

    /// Sources of all code cells, in notebook order
    pub fn cell_sources(&self) -> Vec<String> {
        self.content
            .as_ref()
            .map(|c| {
                c.cells
                    .iter()
                    .filter(|cell| cell.cell_type == "code")
                    .map(|cell| cell.source.text())
                    .collect()
            })
            .unwrap_or_default()
    }
}
