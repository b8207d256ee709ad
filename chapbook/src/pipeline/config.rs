//! Pipeline configuration generator

use std::sync::Arc;

use tracing::{debug, error};

use crate::cache::workflow::WorkflowRegistry;
use crate::filesys::file::File;
use crate::models::pipeline::{DataFormat, PipelineConfig, ProcessorRef, Stage};

/// Produces the pipeline text consumed by the CHAP executable
pub struct ConfigGenerator {
    registry: Arc<WorkflowRegistry>,
}

impl ConfigGenerator {
    pub fn new(registry: Arc<WorkflowRegistry>) -> Self {
        Self { registry }
    }

    /// Config of a named workflow: its stored pipeline body followed by the
    /// user processor stage.
    ///
    /// An unknown workflow or an unreadable pipeline body is logged and the
    /// partial text is returned, so a non-empty result does not imply the
    /// workflow was found.
    pub async fn workflow_config(&self, processor: &ProcessorRef, workflow: &str) -> String {
        let mut config = String::new();

        let snapshot = self.registry.workflows().await;
        match snapshot.find(workflow) {
            Some(w) => {
                let body = File::new(w.config_path());
                match body.read_string().await {
                    Ok(text) => config = text,
                    Err(e) => error!(
                        "Unable to read pipeline of workflow {} from {}: {}",
                        workflow,
                        body.path().display(),
                        e
                    ),
                }
            }
            None => error!("Unknown workflow {}", workflow),
        }

        if !config.is_empty() && !config.ends_with('\n') {
            config.push('\n');
        }
        config.push_str(&Stage::UserProcessor(processor.clone()).render());

        debug!("Workflow config:\n{}", config);
        config
    }

    /// Ad-hoc config built from reader and writer selections.
    ///
    /// Unsupported reader or writer names produce no stage.
    pub fn chap_config(&self, processor: &ProcessorRef, reader: &str, writer: &str) -> String {
        let config = adhoc_pipeline(processor, reader, writer).render();
        debug!("Ad-hoc config:\n{}", config);
        config
    }
}

/// Stage list of an ad-hoc run
pub fn adhoc_pipeline(processor: &ProcessorRef, reader: &str, writer: &str) -> PipelineConfig {
    let mut pipeline = PipelineConfig::new()
        .with(Stage::UserProcessor(processor.clone()))
        .with(Stage::Print);

    if let Some(format) = DataFormat::parse(reader) {
        pipeline.push(Stage::Reader(format));
    }
    if let Some(format) = DataFormat::parse(writer) {
        pipeline.push(Stage::Writer(format));
    }
    pipeline
}
