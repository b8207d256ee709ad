//! Settings file management

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::ChapError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// chapbook settings, read from a JSON configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file prefix; file logging is off when empty
    #[serde(default)]
    pub log_file: String,

    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Emit JSON log lines on stdout
    #[serde(default)]
    pub log_json: bool,

    /// Root of the user code areas (usually ends with `/users`)
    #[serde(default)]
    pub user_dir: PathBuf,

    /// CHAP install area
    #[serde(default)]
    pub chap_dir: PathBuf,

    /// Location of the `chap.sh`, `commit.sh` and `publish.sh` scripts
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: PathBuf,

    /// Directory holding one subdirectory per workflow
    #[serde(default)]
    pub workflows_root: PathBuf,

    /// CHAP documentation directory, used for the component catalog
    #[serde(default)]
    pub doc_dir: PathBuf,

    /// Jupyter server address
    #[serde(default)]
    pub jupyter_host: String,

    /// Jupyter server token
    #[serde(default)]
    pub jupyter_token: String,

    /// Jupyter root directory
    #[serde(default)]
    pub jupyter_root: PathBuf,

    /// Repository receiving committed user code, e.g. `CHAPUsers/CHAPBook`
    #[serde(default)]
    pub user_repo: String,

    /// File holding the GitHub token used for publication
    #[serde(default)]
    pub github_token: PathBuf,

    /// Zenodo DOI reference of the user repository
    #[serde(default)]
    pub doi: String,

    /// Wall-clock budget of a single pipeline run in seconds
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,

    /// Lifetime of the workflow registry snapshot in seconds
    #[serde(default = "default_workflow_ttl")]
    pub workflow_ttl_secs: u64,

    /// Development mode
    #[serde(default, rename = "development_mode")]
    pub dev_mode: bool,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("scripts")
}

fn default_run_timeout() -> u64 {
    3600
}

fn default_workflow_ttl() -> u64 {
    3600
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_file: String::new(),
            log_dir: default_log_dir(),
            log_json: false,
            user_dir: PathBuf::new(),
            chap_dir: PathBuf::new(),
            scripts_dir: default_scripts_dir(),
            workflows_root: PathBuf::new(),
            doc_dir: PathBuf::new(),
            jupyter_host: String::new(),
            jupyter_token: String::new(),
            jupyter_root: PathBuf::new(),
            user_repo: String::new(),
            github_token: PathBuf::new(),
            doi: String::new(),
            run_timeout_secs: default_run_timeout(),
            workflow_ttl_secs: default_workflow_ttl(),
            dev_mode: false,
        }
    }
}

impl Settings {
    /// Read and validate a settings file
    pub async fn load(path: &Path) -> Result<Self, ChapError> {
        let settings: Settings = File::new(path).read_json().await.map_err(|e| {
            ChapError::ConfigError(format!("unable to load {}: {}", path.display(), e))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check required entries
    pub fn validate(&self) -> Result<(), ChapError> {
        if self.user_dir.as_os_str().is_empty() {
            return Err(ChapError::ConfigError(
                "empty user_dir, please adjust your configuration".to_string(),
            ));
        }
        if self.chap_dir.as_os_str().is_empty() {
            return Err(ChapError::ConfigError(
                "empty chap_dir, please adjust your configuration".to_string(),
            ));
        }
        if self.run_timeout_secs == 0 {
            return Err(ChapError::ConfigError(
                "run_timeout_secs must be positive".to_string(),
            ));
        }
        if self.workflows_root.as_os_str().is_empty() {
            warn!("empty workflows_root, no workflows will be discovered");
        }
        if self.user_repo.is_empty() {
            warn!("empty user_repo, commit and publish are unavailable");
        }
        Ok(())
    }

    /// Wrapper script invoked for every pipeline run
    pub fn chap_script(&self) -> PathBuf {
        self.scripts_dir.join("chap.sh")
    }
}
