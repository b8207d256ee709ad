//! User area layout
//!
//! ```text
//! <user_root>/
//!   <user>/
//!     __init__.py
//!     <workflow>/
//!       __init__.py
//!       <module>.py        generated processor
//!       run-chap.yaml      scratch pipeline config
//!     <workflow>.tar       archive (intermediate)
//!     <workflow>.tar.gz    archive
//! ```

use std::path::{Path, PathBuf};

use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Package marker written into generated code directories
pub const PACKAGE_MARKER: &str = "__init__.py";

/// Scratch pipeline configuration consumed by the pipeline tool
pub const SCRATCH_CONFIG: &str = "run-chap.yaml";

/// Paths of the per-user code and scratch areas
#[derive(Debug, Clone)]
pub struct UserLayout {
    /// Root of all user areas (the `users` package directory)
    pub user_root: PathBuf,
}

impl UserLayout {
    pub fn new(user_root: impl Into<PathBuf>) -> Self {
        Self {
            user_root: user_root.into(),
        }
    }

    /// Top-level code directory of a user
    pub fn user_dir(&self, user: &str) -> Dir {
        Dir::new(self.user_root.join(user))
    }

    /// Per-workflow directory of a user
    pub fn workflow_dir(&self, user: &str, workflow: &str) -> Dir {
        self.user_dir(user).subdir(workflow)
    }

    /// Generated processor source file
    pub fn processor_file(&self, user: &str, workflow: &str, module: &str) -> File {
        self.workflow_dir(user, workflow)
            .file(&format!("{}.py", module))
    }

    /// Scratch pipeline configuration file
    pub fn scratch_config(&self, user: &str, workflow: &str) -> File {
        self.workflow_dir(user, workflow).file(SCRATCH_CONFIG)
    }

    /// Destination directory of workflow archives
    pub fn archive_dir(&self, user: &str) -> Dir {
        self.user_dir(user)
    }

    /// User root as passed to the pipeline tool, which adds the `users`
    /// prefix itself
    pub fn tool_user_root(&self) -> PathBuf {
        strip_users_suffix(&self.user_root)
    }
}

fn strip_users_suffix(path: &Path) -> PathBuf {
    match path.file_name() {
        Some(name) if name == "users" => path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}
