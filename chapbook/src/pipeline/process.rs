//! External process runner
//!
//! Runs the CHAP wrapper and the repository scripts with captured output.
//! Each child leads its own process group so that a timeout takes down
//! anything it started, and stdout / stderr are drained while the child
//! runs so partial output survives a kill.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::errors::ChapError;

/// How long output readers may keep going once the child is gone
pub const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Finished process with its output
#[derive(Debug)]
pub struct Captured {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl Captured {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Run `cmd` to completion within `timeout`.
///
/// With `detach`, the call returns as soon as the direct child exits and
/// whatever it left running in the background keeps going. Otherwise the
/// run only ends once every process holding the output pipes is done, and
/// the whole group is killed when the budget runs out.
pub async fn run_captured(
    mut cmd: Command,
    program: &Path,
    timeout: Duration,
    detach: bool,
) -> Result<Captured, ChapError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn().map_err(|e| ChapError::ExecutionError {
        reason: format!("unable to launch {}: {}", program.display(), e),
        stdout: String::new(),
        stderr: String::new(),
    })?;
    let mut group = ProcessGroup::new(child.id());

    let stdout = Output::default();
    let stderr = Output::default();
    let mut readers = vec![
        drain(child.stdout.take(), stdout.clone()),
        drain(child.stderr.take(), stderr.clone()),
    ];

    let deadline = Instant::now() + timeout;
    let status = match tokio::time::timeout_at(deadline, child.wait()).await {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => return Err(ChapError::IoError(e)),
        Err(_) => {
            warn!("{} exceeded {:?}, killing", program.display(), timeout);
            group.kill().await;
            let _ = child.kill().await;
            settle(&mut readers, DRAIN_GRACE).await;
            return Err(ChapError::Timeout {
                after: timeout,
                stdout: stdout.text(),
                stderr: stderr.text(),
            });
        }
    };

    if detach {
        // background work may hold the pipes for hours; readers keep
        // draining on their own until it lets go
        let _ = tokio::time::timeout(DRAIN_GRACE, join(&mut readers)).await;
        group.disarm();
        debug!("{} exited with {}, leaving background work", program.display(), status);
    } else if tokio::time::timeout_at(deadline, join(&mut readers))
        .await
        .is_err()
    {
        warn!(
            "{} exited but its output stayed open past {:?}, killing",
            program.display(),
            timeout
        );
        group.kill().await;
        settle(&mut readers, DRAIN_GRACE).await;
        return Err(ChapError::Timeout {
            after: timeout,
            stdout: stdout.text(),
            stderr: stderr.text(),
        });
    } else {
        group.disarm();
    }

    Ok(Captured {
        status,
        stdout: stdout.text(),
        stderr: stderr.text(),
    })
}

/// Bytes read so far from one pipe
#[derive(Clone, Default)]
struct Output(Arc<Mutex<Vec<u8>>>);

impl Output {
    fn push(&self, bytes: &[u8]) {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(bytes);
    }

    fn text(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&bytes).to_string()
    }
}

fn drain<R>(reader: Option<R>, sink: Output) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut reader) = reader else {
            return;
        };
        let mut buf = [0u8; 8192];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => sink.push(&buf[..n]),
            }
        }
    })
}

async fn join(readers: &mut [JoinHandle<()>]) {
    for reader in readers.iter_mut() {
        let _ = reader.await;
    }
}

// give readers a moment to pick up the tail, then stop them
async fn settle(readers: &mut [JoinHandle<()>], grace: Duration) {
    let _ = tokio::time::timeout(grace, join(readers)).await;
    for reader in readers.iter() {
        reader.abort();
    }
}

/// Process group led by a spawned child; killed on drop unless disarmed
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }

    async fn kill(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };
        if cfg!(unix) {
            let result = kill_command(pgid).status().await;
            if let Err(e) = result {
                warn!("Unable to kill process group {}: {}", pgid, e);
            }
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };
        if !cfg!(unix) {
            return;
        }
        // tokio reaps the kill process in the background when a runtime is
        // still around
        if tokio::runtime::Handle::try_current().is_ok() {
            if let Err(e) = kill_command(pgid).spawn() {
                warn!("Unable to kill process group {}: {}", pgid, e);
            }
        } else {
            let _ = std::process::Command::new("kill")
                .arg("-9")
                .arg("--")
                .arg(format!("-{}", pgid))
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
        }
    }
}

fn kill_command(pgid: u32) -> Command {
    let mut cmd = Command::new("kill");
    cmd.arg("-9")
        .arg("--")
        .arg(format!("-{}", pgid))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    cmd
}
