//! Pipeline executor
//!
//! Writes the generated pipeline config to the user's scratch file and runs
//! the CHAP wrapper script against it:
//!
//! ```text
//! <scripts_dir>/chap.sh <config> <chap_dir> <user root without /users>
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info};

use crate::errors::ChapError;
use crate::models::execution::ExecutionResult;
use crate::pipeline::process::run_captured;
use crate::storage::layout::UserLayout;

/// Environment variable telling the wrapper script to background the run
pub const BATCH_ENV: &str = "CHAP_BATCH";

/// Executor options
#[derive(Debug, Clone)]
pub struct Options {
    /// Executable invoked for every run
    pub command: PathBuf,

    /// CHAP install area, passed as the second argument
    pub install_dir: PathBuf,

    /// Wall-clock budget of a run; the child is killed when it expires
    pub timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            command: PathBuf::from("scripts/chap.sh"),
            install_dir: PathBuf::from("/opt/chap"),
            timeout: Duration::from_secs(3600),
        }
    }
}

type LockMap = Mutex<HashMap<(String, String), Arc<tokio::sync::Mutex<()>>>>;

/// Per (user, workflow) locks serialising runs on the same files.
///
/// An entry lives only while some run holds or waits for it.
#[derive(Default)]
pub struct RunLocks {
    locks: Arc<LockMap>,
}

impl RunLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of the user's workflow area
    pub async fn acquire(&self, user: &str, workflow: &str) -> RunGuard {
        let key = (user.to_string(), workflow.to_string());
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(key.clone()).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        RunGuard {
            guard: Some(guard),
            key,
            locks: self.locks.clone(),
        }
    }

    /// Number of (user, workflow) pairs currently held or waited on
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive use of one workflow area; released on drop
pub struct RunGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: (String, String),
    locks: Arc<LockMap>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // waiters clone the entry under this map lock, so a count of one
        // means nobody else can reach it
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

/// Runs the external pipeline executable
pub struct PipelineExecutor {
    options: Options,
    layout: UserLayout,
}

impl PipelineExecutor {
    pub fn new(options: Options, layout: UserLayout) -> Self {
        Self { options, layout }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Write `config` to the scratch file of `user`/`workflow` and run the
    /// pipeline against it.
    ///
    /// In batch mode the wrapper script backgrounds the actual work and the
    /// call returns once the wrapper itself exits. Otherwise it waits for
    /// the pipeline and everything it started; on timeout the whole process
    /// group is killed and the output read so far is kept in the error.
    pub async fn run(
        &self,
        user: &str,
        config: &str,
        workflow: &str,
        batch: bool,
    ) -> Result<ExecutionResult, ChapError> {
        let scratch = self.layout.scratch_config(user, workflow);
        debug!("Writing pipeline config {}", scratch.path().display());
        scratch.overwrite(config).await?;

        let user_root = self.layout.tool_user_root();
        let mut cmd = Command::new(&self.options.command);
        cmd.arg(scratch.path())
            .arg(&self.options.install_dir)
            .arg(&user_root);
        if batch {
            cmd.env(BATCH_ENV, "1");
        }

        let command_line = format!(
            "{} {} {} {}",
            self.options.command.display(),
            scratch.path().display(),
            self.options.install_dir.display(),
            user_root.display()
        );
        info!("Running pipeline for {}/{}: {}", user, workflow, command_line);

        let started_at = chrono::Utc::now();
        let start = Instant::now();

        let output = run_captured(cmd, &self.options.command, self.options.timeout, batch)
            .await
            .inspect_err(|e| error!("Pipeline for {}/{} failed: {}", user, workflow, e))?;

        let duration = start.elapsed();
        if !output.success() {
            error!(
                "Pipeline for {}/{} failed with {} after {:?}",
                user, workflow, output.status, duration
            );
            return Err(ChapError::ExecutionError {
                reason: format!("pipeline exited with {}", output.status),
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }

        info!(
            "Pipeline for {}/{} completed in {:?}",
            user, workflow, duration
        );

        Ok(ExecutionResult {
            run_id: uuid::Uuid::new_v4().to_string(),
            user: user.to_string(),
            workflow: workflow.to_string(),
            config_path: scratch.path().to_path_buf(),
            command: command_line,
            batch,
            exit_code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
            started_at,
            duration,
        })
    }
}
