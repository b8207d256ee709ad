//! Workflow registry
//!
//! Scans `<workflows_root>/*/chap.yaml` and serves the result as a
//! time-bounded snapshot. A refresh replaces the whole snapshot, so readers
//! either see the previous list or the new one.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::filesys::dir::Dir;
use crate::models::workflow::{Workflow, WorkflowSnapshot, DESCRIPTOR_FILE};

/// Default snapshot lifetime
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Process-wide registry of workflow descriptors
pub struct WorkflowRegistry {
    root: PathBuf,
    ttl: Duration,
    snapshot: RwLock<Option<Arc<WorkflowSnapshot>>>,
    refresh_lock: Mutex<()>,
    scans: AtomicU64,
}

impl WorkflowRegistry {
    /// Create a registry over `root`; nothing is scanned until first access
    pub fn new(root: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            root: root.into(),
            ttl,
            snapshot: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            scans: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current snapshot, rescanning the workflow root if it has expired
    pub async fn workflows(&self) -> Arc<WorkflowSnapshot> {
        if let Some(snapshot) = self.fresh_snapshot() {
            return snapshot;
        }

        let _guard = self.refresh_lock.lock().await;

        // another caller may have refreshed while we waited
        if let Some(snapshot) = self.fresh_snapshot() {
            return snapshot;
        }

        let workflows = scan_workflows(&self.root).await;
        let snapshot = Arc::new(WorkflowSnapshot::new(workflows, Instant::now() + self.ttl));
        self.scans.fetch_add(1, Ordering::SeqCst);
        info!(
            "Workflow registry refreshed: {} workflow(s) from {}",
            snapshot.len(),
            self.root.display()
        );

        let mut current = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        *current = Some(snapshot.clone());
        snapshot
    }

    /// Look up a workflow by name in the current snapshot
    pub async fn find(&self, name: &str) -> Option<Workflow> {
        self.workflows().await.find(name).cloned()
    }

    /// Drop the current snapshot so the next access rescans
    pub fn invalidate(&self) {
        let mut current = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        *current = None;
    }

    /// Number of completed rescans
    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::SeqCst)
    }

    fn fresh_snapshot(&self) -> Option<Arc<WorkflowSnapshot>> {
        let current = self.snapshot.read().unwrap_or_else(|e| e.into_inner());
        current
            .as_ref()
            .filter(|s| s.is_fresh(Instant::now()))
            .cloned()
    }
}

/// Scan one level of workflow directories under `root`.
///
/// Unreadable or unparseable descriptors are skipped; an unreadable root
/// yields an empty list.
pub async fn scan_workflows(root: &Path) -> Vec<Workflow> {
    let dirs = match Dir::new(root).list_dirs().await {
        Ok(dirs) => dirs,
        Err(e) => {
            error!("Unable to read workflows root {}: {}", root.display(), e);
            return Vec::new();
        }
    };

    let mut workflows: Vec<Workflow> = Vec::new();
    for dir in dirs {
        let descriptor = Dir::new(&dir).file(DESCRIPTOR_FILE);
        if !descriptor.exists().await {
            debug!("No {} in {}", DESCRIPTOR_FILE, dir.display());
            continue;
        }

        debug!("Reading workflow descriptor {}", descriptor.path().display());
        let mut workflow: Workflow = match descriptor.read_yaml().await {
            Ok(workflow) => workflow,
            Err(e) => {
                warn!(
                    "Skipping workflow descriptor {}: {}",
                    descriptor.path().display(),
                    e
                );
                continue;
            }
        };
        workflow.directory = dir;

        if let Some(pos) = workflows.iter().position(|w| w.name == workflow.name) {
            let previous = workflows.remove(pos);
            warn!(
                "Workflow {} in {} replaces the one in {}",
                workflow.name,
                workflow.directory.display(),
                previous.directory.display()
            );
        }
        workflows.push(workflow);
    }

    workflows
}
