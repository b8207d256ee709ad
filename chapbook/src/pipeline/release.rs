//! Commit and publish of user code
//!
//! Both steps are delegated to repository scripts:
//!
//! ```text
//! <scripts_dir>/commit.sh <user_dir>/<user> <user_repo>
//! <scripts_dir>/publish.sh <user_repo> <token> 0 "CHAPBook release 0 by <user>"
//! ```
//!
//! The release tag is always `0`, which makes `publish.sh` pick a new tag.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command;
use tracing::{error, info};

use crate::errors::ChapError;
use crate::filesys::file::File;
use crate::models::execution::ReleaseReport;
use crate::pipeline::process::run_captured;
use crate::storage::layout::UserLayout;

/// Tag handed to `publish.sh`
pub const RELEASE_TAG: &str = "0";

/// Release options
#[derive(Debug, Clone)]
pub struct Options {
    /// Directory holding `commit.sh` and `publish.sh`
    pub scripts_dir: PathBuf,

    /// Repository receiving user code, e.g. `CHAPUsers/CHAPBook`
    pub user_repo: String,

    /// File holding the GitHub token used to publish
    pub token_file: PathBuf,

    /// Zenodo DOI reference of the user repository
    pub doi: String,

    /// Budget of a single script run
    pub timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            scripts_dir: PathBuf::from("scripts"),
            user_repo: String::new(),
            token_file: PathBuf::new(),
            doi: String::new(),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Runs the commit and publish scripts for a user
pub struct ReleaseRunner {
    options: Options,
    layout: UserLayout,
}

impl ReleaseRunner {
    pub fn new(options: Options, layout: UserLayout) -> Self {
        Self { options, layout }
    }

    /// Commit the user's code area to the user repository
    pub async fn commit(&self, user: &str) -> Result<ReleaseReport, ChapError> {
        let repo = self.user_repo()?;
        let user_dir = self.layout.user_dir(user).path().to_path_buf();
        info!(
            "Committing {} to {}",
            user_dir.display(),
            repo
        );

        let args = vec![user_dir.into_os_string(), OsString::from(repo)];
        let (stdout, stderr) = self.run_script("commit.sh", args).await?;

        Ok(ReleaseReport {
            action: "commit".to_string(),
            user: user.to_string(),
            repo: repo.to_string(),
            stdout,
            stderr,
            doi_link: None,
        })
    }

    /// Publish a new release of the user repository
    pub async fn publish(&self, user: &str) -> Result<ReleaseReport, ChapError> {
        let repo = self.user_repo()?;
        let token = self.token().await?;
        let notes = release_notes(user);
        // the token stays out of the logs
        info!("Publishing {}: {}", repo, notes);

        let args = vec![
            OsString::from(repo),
            OsString::from(token),
            OsString::from(RELEASE_TAG),
            OsString::from(&notes),
        ];
        let (stdout, stderr) = self.run_script("publish.sh", args).await?;

        Ok(ReleaseReport {
            action: "publish".to_string(),
            user: user.to_string(),
            repo: repo.to_string(),
            stdout,
            stderr,
            doi_link: self.doi_link(),
        })
    }

    /// Latest DOI badge link of the user repository
    pub fn doi_link(&self) -> Option<String> {
        (!self.options.doi.is_empty())
            .then(|| format!("https://zenodo.org/badge/latestdoi/{}", self.options.doi))
    }

    fn user_repo(&self) -> Result<&str, ChapError> {
        if self.options.user_repo.is_empty() {
            return Err(ChapError::ConfigError(
                "empty user_repo, please adjust your configuration".to_string(),
            ));
        }
        Ok(&self.options.user_repo)
    }

    async fn token(&self) -> Result<String, ChapError> {
        if self.options.token_file.as_os_str().is_empty() {
            return Err(ChapError::ConfigError(
                "empty github_token, please adjust your configuration".to_string(),
            ));
        }
        let token = File::new(&self.options.token_file)
            .read_string()
            .await
            .map_err(|e| {
                ChapError::ConfigError(format!(
                    "unable to read token file {}: {}",
                    self.options.token_file.display(),
                    e
                ))
            })?;
        let token = token.replace(['\n', '\r'], "");
        if token.is_empty() {
            return Err(ChapError::ConfigError(format!(
                "token file {} is empty",
                self.options.token_file.display()
            )));
        }
        Ok(token)
    }

    async fn run_script(
        &self,
        name: &str,
        args: Vec<OsString>,
    ) -> Result<(String, String), ChapError> {
        let script = self.options.scripts_dir.join(name);
        let mut cmd = Command::new(&script);
        cmd.args(args);

        let output = run_captured(cmd, &script, self.options.timeout, false).await?;
        if !output.success() {
            error!("{} failed with {}", script.display(), output.status);
            return Err(ChapError::ExecutionError {
                reason: format!("{} exited with {}", name, output.status),
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok((output.stdout, output.stderr))
    }
}

fn release_notes(user: &str) -> String {
    format!("CHAPBook release {} by {}", RELEASE_TAG, user)
}
