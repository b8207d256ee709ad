//! Application state management

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::app::options::AppOptions;
use crate::cache::workflow::WorkflowRegistry;
use crate::errors::ChapError;
use crate::filesys::archive::{gzip_file, tar_dir};
use crate::http::jupyter::JupyterClient;
use crate::models::execution::{ReleaseReport, RunReport, RunStatus, UserCodeArtifact};
use crate::models::notebook::NotebookRecord;
use crate::models::pipeline::{ProcessorRef, DEFAULT_MODULE, DEFAULT_PROCESSOR};
use crate::pipeline::catalog::Catalog;
use crate::pipeline::config::ConfigGenerator;
use crate::pipeline::executor::{PipelineExecutor, RunLocks};
use crate::pipeline::release::ReleaseRunner;
use crate::pipeline::usercode::UserCodeGenerator;
use crate::storage::layout::UserLayout;
use crate::utils::{validate_identifier, validate_name};

/// Scratch area name of ad-hoc runs
pub const ADHOC_WORKFLOW: &str = "adhoc";

/// User-edited workflow config inside a workflow area
pub const USER_CONFIG: &str = "chap.yaml";

fn default_module() -> String {
    DEFAULT_MODULE.to_string()
}

fn default_processor() -> String {
    DEFAULT_PROCESSOR.to_string()
}

fn default_adhoc_workflow() -> String {
    ADHOC_WORKFLOW.to_string()
}

/// Run of a registered workflow with user code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub user: String,
    pub workflow: String,
    #[serde(default = "default_module")]
    pub module: String,
    #[serde(default = "default_processor")]
    pub processor: String,
    /// Notebook cell sources
    #[serde(default)]
    pub lines: Vec<String>,
    #[serde(default)]
    pub batch: bool,
}

impl RunRequest {
    pub fn new(user: impl Into<String>, workflow: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            user: user.into(),
            workflow: workflow.into(),
            module: default_module(),
            processor: default_processor(),
            lines,
            batch: false,
        }
    }

    fn processor_ref(&self) -> ProcessorRef {
        ProcessorRef::new(&self.user, &self.module).with_processor(&self.processor)
    }
}

/// Run of a reader / user processor / writer pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdhocRunRequest {
    pub user: String,
    /// Scratch area under the user directory
    #[serde(default = "default_adhoc_workflow")]
    pub workflow: String,
    #[serde(default = "default_module")]
    pub module: String,
    #[serde(default = "default_processor")]
    pub processor: String,
    pub reader: String,
    pub writer: String,
    #[serde(default)]
    pub lines: Vec<String>,
    #[serde(default)]
    pub batch: bool,
}

impl AdhocRunRequest {
    fn processor_ref(&self) -> ProcessorRef {
        ProcessorRef::new(&self.user, &self.module).with_processor(&self.processor)
    }
}

/// Main application state
pub struct AppState {
    /// Per-user code and scratch areas
    pub layout: UserLayout,

    /// Workflow registry
    pub registry: Arc<WorkflowRegistry>,

    /// Pipeline config generator
    pub config_generator: ConfigGenerator,

    /// User processor code generator
    pub usercode_generator: UserCodeGenerator,

    /// Pipeline executor
    pub executor: PipelineExecutor,

    /// Serialises runs of the same user and workflow
    pub run_locks: RunLocks,

    /// Commit and publish scripts
    pub release: ReleaseRunner,

    /// Jupyter client, when a Jupyter server is configured
    pub jupyter: Option<Arc<JupyterClient>>,

    doc_dir: PathBuf,
}

impl AppState {
    /// Initialize application state
    pub fn init(options: &AppOptions) -> Result<Self, ChapError> {
        info!("Initializing application state...");

        let layout = UserLayout::new(&options.user_root);

        let registry = Arc::new(WorkflowRegistry::new(
            &options.registry.workflows_root,
            options.registry.ttl,
        ));

        let jupyter = match &options.jupyter {
            Some(jupyter) => Some(Arc::new(JupyterClient::new(
                &jupyter.host,
                &jupyter.token,
                &jupyter.root,
            )?)),
            None => None,
        };

        Ok(Self {
            config_generator: ConfigGenerator::new(registry.clone()),
            usercode_generator: UserCodeGenerator::new(layout.clone()),
            executor: PipelineExecutor::new(options.executor.clone(), layout.clone()),
            run_locks: RunLocks::new(),
            release: ReleaseRunner::new(options.release.clone(), layout.clone()),
            registry,
            layout,
            jupyter,
            doc_dir: options.doc_dir.clone(),
        })
    }

    /// Generate code and config for a registered workflow and run it
    pub async fn run_workflow(&self, request: &RunRequest) -> Result<RunReport, ChapError> {
        validate_identifier("user", &request.user)?;
        validate_name("workflow", &request.workflow)?;
        validate_identifier("module", &request.module)?;
        validate_identifier("processor", &request.processor)?;

        if self.registry.find(&request.workflow).await.is_none() {
            return Err(ChapError::NotFound(format!(
                "workflow {}",
                request.workflow
            )));
        }

        let _guard = self
            .run_locks
            .acquire(&request.user, &request.workflow)
            .await;

        let processor = request.processor_ref();
        let code = self
            .usercode_generator
            .generate(&processor, &request.workflow, &request.lines)
            .await?;
        let config = self
            .config_generator
            .workflow_config(&processor, &request.workflow)
            .await;

        Ok(self
            .execute(&request.user, &request.workflow, config, code, request.batch)
            .await)
    }

    /// Generate code and a reader / writer config and run it
    pub async fn run_adhoc(&self, request: &AdhocRunRequest) -> Result<RunReport, ChapError> {
        validate_identifier("user", &request.user)?;
        validate_name("workflow", &request.workflow)?;
        validate_identifier("module", &request.module)?;
        validate_identifier("processor", &request.processor)?;

        let _guard = self
            .run_locks
            .acquire(&request.user, &request.workflow)
            .await;

        let processor = request.processor_ref();
        let code = self
            .usercode_generator
            .generate(&processor, &request.workflow, &request.lines)
            .await?;
        let config =
            self.config_generator
                .chap_config(&processor, &request.reader, &request.writer);

        Ok(self
            .execute(&request.user, &request.workflow, config, code, request.batch)
            .await)
    }

    async fn execute(
        &self,
        user: &str,
        workflow: &str,
        config: String,
        code: UserCodeArtifact,
        batch: bool,
    ) -> RunReport {
        let mut report = RunReport {
            status: RunStatus::Success,
            user: user.to_string(),
            workflow: workflow.to_string(),
            config: String::new(),
            code: Some(code),
            result: None,
            error: None,
            stdout: String::new(),
            stderr: String::new(),
        };

        match self.executor.run(user, &config, workflow, batch).await {
            Ok(result) => {
                report.stdout = result.stdout.clone();
                report.stderr = result.stderr.clone();
                report.result = Some(result);
            }
            Err(e) => {
                error!("Run of {} for {} failed: {}", workflow, user, e);
                if let Some((stdout, stderr)) = e.captured_output() {
                    report.stdout = stdout.to_string();
                    report.stderr = stderr.to_string();
                }
                report.status = RunStatus::Error;
                report.error = Some(e.to_string());
            }
        }
        report.config = config;
        report
    }

    /// Config a run of `workflow` would use, without running it
    pub async fn workflow_config(
        &self,
        user: &str,
        workflow: &str,
        module: &str,
        processor: &str,
    ) -> Result<String, ChapError> {
        validate_identifier("user", user)?;
        validate_identifier("module", module)?;
        validate_identifier("processor", processor)?;

        let processor = ProcessorRef::new(user, module).with_processor(processor);
        Ok(self
            .config_generator
            .workflow_config(&processor, workflow)
            .await)
    }

    /// Archive a user's workflow area into `<user>/<workflow>.tar.gz`
    pub async fn package(&self, user: &str, workflow: &str) -> Result<PathBuf, ChapError> {
        validate_identifier("user", user)?;
        validate_name("workflow", workflow)?;

        let source = self.layout.workflow_dir(user, workflow).path().to_path_buf();
        let target_dir = self.layout.archive_dir(user).path().to_path_buf();

        tokio::task::spawn_blocking(move || {
            let tarball = tar_dir(&source, &target_dir)?;
            gzip_file(&tarball, &target_dir)
        })
        .await
        .map_err(|e| ChapError::Internal(format!("packaging task failed: {}", e)))?
    }

    /// Readers, writers and processors available to ad-hoc runs
    pub async fn catalog(&self) -> Catalog {
        Catalog::scan(&self.doc_dir).await
    }

    /// Store a user-edited workflow config as `<user>/<workflow>/chap.yaml`
    pub async fn save_config(
        &self,
        user: &str,
        workflow: &str,
        text: &str,
    ) -> Result<PathBuf, ChapError> {
        validate_identifier("user", user)?;
        validate_name("workflow", workflow)?;
        serde_yaml::from_str::<serde_yaml::Value>(text)?;

        let _guard = self.run_locks.acquire(user, workflow).await;
        let file = self.layout.workflow_dir(user, workflow).file(USER_CONFIG);
        file.overwrite(text).await?;
        info!("Saved {} config to {}", workflow, file.path().display());
        Ok(file.path().to_path_buf())
    }

    /// Commit the user's code area to the user repository
    pub async fn commit(&self, user: &str) -> Result<ReleaseReport, ChapError> {
        validate_identifier("user", user)?;
        self.release.commit(user).await
    }

    /// Publish a release of the user repository
    pub async fn publish(&self, user: &str) -> Result<ReleaseReport, ChapError> {
        validate_identifier("user", user)?;
        self.release.publish(user).await
    }

    /// Create a new notebook in the user's area on the Jupyter server
    pub async fn create_notebook(&self, user: &str) -> Result<NotebookRecord, ChapError> {
        validate_identifier("user", user)?;
        self.jupyter()?.create(user).await
    }

    /// Code-cell sources of a user's notebook on the Jupyter server
    pub async fn capture_notebook(&self, user: &str, file: &str) -> Result<Vec<String>, ChapError> {
        validate_identifier("user", user)?;
        let record = self.jupyter()?.capture(user, file).await?;
        Ok(record.cell_sources())
    }

    fn jupyter(&self) -> Result<&JupyterClient, ChapError> {
        self.jupyter
            .as_deref()
            .ok_or_else(|| ChapError::ConfigError("no jupyter_host configured".to_string()))
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), ChapError> {
        info!("Shutting down application state...");
        self.registry.invalidate();
        Ok(())
    }
}
