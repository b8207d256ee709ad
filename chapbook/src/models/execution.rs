//! Pipeline execution models

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Captured outcome of one external pipeline invocation
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// Unique run id
    pub run_id: String,

    pub user: String,

    pub workflow: String,

    /// Scratch config file handed to the pipeline tool
    pub config_path: PathBuf,

    /// Command line, for display
    pub command: String,

    /// Whether the run was submitted in batch mode
    pub batch: bool,

    /// Exit code; `None` if the process was terminated by a signal
    pub exit_code: Option<i32>,

    pub stdout: String,

    pub stderr: String,

    pub started_at: DateTime<Utc>,

    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

impl ExecutionResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Generated processor source for one user and workflow
#[derive(Debug, Clone, Serialize)]
pub struct UserCodeArtifact {
    pub user: String,
    pub workflow: String,
    pub module: String,
    pub processor: String,
    /// Generated `.py` file
    pub path: PathBuf,
    /// Whether the notebook already held the processor class
    pub verbatim: bool,
    /// sha256 of the written content
    pub digest: String,
}

/// Status of a run request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
}

/// Everything a user needs to diagnose a run: the attempted configuration,
/// the generated code and the captured output or error.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub user: String,
    pub workflow: String,
    pub config: String,
    pub code: Option<UserCodeArtifact>,
    pub result: Option<ExecutionResult>,
    pub error: Option<String>,
    /// Output captured before a failure
    pub stdout: String,
    pub stderr: String,
}

/// Outcome of a commit or publish script
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseReport {
    /// `commit` or `publish`
    pub action: String,
    pub user: String,
    /// Repository the user code goes to
    pub repo: String,
    pub stdout: String,
    pub stderr: String,
    /// Latest DOI badge link, after a publish
    pub doi_link: Option<String>,
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }
}
