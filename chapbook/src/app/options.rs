//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use crate::cache::workflow::DEFAULT_TTL;
use crate::pipeline::{executor, release};
use crate::storage::settings::Settings;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Root of the user code areas
    pub user_root: PathBuf,

    /// Workflow registry options
    pub registry: RegistryOptions,

    /// Pipeline executor options
    pub executor: executor::Options,

    /// Commit and publish options
    pub release: release::Options,

    /// CHAP documentation directory
    pub doc_dir: PathBuf,

    /// Jupyter server, if notebooks are captured from one
    pub jupyter: Option<JupyterOptions>,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            user_root: PathBuf::from("users"),
            registry: RegistryOptions::default(),
            executor: executor::Options::default(),
            release: release::Options::default(),
            doc_dir: PathBuf::new(),
            jupyter: None,
        }
    }
}

impl AppOptions {
    /// Options derived from a validated settings file
    pub fn from_settings(settings: &Settings) -> Self {
        let jupyter = (!settings.jupyter_host.is_empty()).then(|| JupyterOptions {
            host: settings.jupyter_host.clone(),
            token: settings.jupyter_token.clone(),
            root: settings.jupyter_root.clone(),
        });

        Self {
            user_root: settings.user_dir.clone(),
            registry: RegistryOptions {
                workflows_root: settings.workflows_root.clone(),
                ttl: Duration::from_secs(settings.workflow_ttl_secs),
            },
            executor: executor::Options {
                command: settings.chap_script(),
                install_dir: settings.chap_dir.clone(),
                timeout: Duration::from_secs(settings.run_timeout_secs),
            },
            release: release::Options {
                scripts_dir: settings.scripts_dir.clone(),
                user_repo: settings.user_repo.clone(),
                token_file: settings.github_token.clone(),
                doi: settings.doi.clone(),
                timeout: Duration::from_secs(settings.run_timeout_secs),
            },
            doc_dir: settings.doc_dir.clone(),
            jupyter,
        }
    }
}

/// Workflow registry options
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Directory scanned for `<name>/chap.yaml`
    pub workflows_root: PathBuf,

    /// Snapshot lifetime
    pub ttl: Duration,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            workflows_root: PathBuf::from("workflows"),
            ttl: DEFAULT_TTL,
        }
    }
}

/// Jupyter server options
#[derive(Debug, Clone)]
pub struct JupyterOptions {
    pub host: String,
    pub token: String,
    pub root: PathBuf,
}
