//! Workflow models

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Descriptor file looked up in every workflow directory
pub const DESCRIPTOR_FILE: &str = "chap.yaml";

/// Pipeline body file used when a descriptor does not name one
pub const DEFAULT_PIPELINE_FILE: &str = "pipeline.yaml";

/// A CHAP workflow, parsed from a `chap.yaml` descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Workflow name, unique within a snapshot
    pub name: String,

    /// Workflow type
    #[serde(rename = "type", default)]
    pub workflow_type: String,

    /// Workflow group
    #[serde(default)]
    pub group: String,

    /// Workflow version
    #[serde(default)]
    pub version: String,

    /// Workflow description
    #[serde(default)]
    pub description: String,

    /// Reference URL
    #[serde(default)]
    pub reference: String,

    /// Owner user name
    #[serde(default)]
    pub user_name: String,

    /// Owner user id
    #[serde(default)]
    pub user_id: String,

    /// Pipeline body file, relative to the workflow directory
    #[serde(rename = "config", default = "default_pipeline_file")]
    pub config_file: String,

    /// Free-form metadata
    #[serde(default)]
    pub meta_data: BTreeMap<String, serde_json::Value>,

    /// Directory the descriptor was found in; set by the scanner
    #[serde(default)]
    pub directory: PathBuf,
}

fn default_pipeline_file() -> String {
    DEFAULT_PIPELINE_FILE.to_string()
}

impl Workflow {
    /// Path of the pipeline body spliced into generated configs
    pub fn config_path(&self) -> PathBuf {
        self.directory.join(&self.config_file)
    }
}

/// An immutable view of all known workflows
#[derive(Debug)]
pub struct WorkflowSnapshot {
    workflows: Vec<Workflow>,
    refreshed_at: DateTime<Utc>,
    expires_at: Instant,
}

impl WorkflowSnapshot {
    pub fn new(workflows: Vec<Workflow>, expires_at: Instant) -> Self {
        Self {
            workflows,
            refreshed_at: Utc::now(),
            expires_at,
        }
    }

    /// Workflows in scan order
    pub fn workflows(&self) -> &[Workflow] {
        &self.workflows
    }

    /// Find a workflow by name
    pub fn find(&self, name: &str) -> Option<&Workflow> {
        self.workflows.iter().find(|w| w.name == name)
    }

    /// Workflow names in scan order
    pub fn names(&self) -> Vec<&str> {
        self.workflows.iter().map(|w| w.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    pub fn refreshed_at(&self) -> DateTime<Utc> {
        self.refreshed_at
    }

    /// Whether the snapshot is still valid at `now`
    pub fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}
