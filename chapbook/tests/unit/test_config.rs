//! Pipeline config generator tests

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chapbook::cache::workflow::WorkflowRegistry;
use chapbook::models::pipeline::{ProcessorRef, Stage};
use chapbook::pipeline::config::{adhoc_pipeline, ConfigGenerator};

fn generator(root: &Path) -> ConfigGenerator {
    ConfigGenerator::new(Arc::new(WorkflowRegistry::new(root, Duration::from_secs(60))))
}

#[tokio::test]
async fn test_chap_config_stage_order() {
    let root = tempfile::tempdir().unwrap();
    let config = generator(root.path()).chap_config(&ProcessorRef::new("alice", "m"), "yaml", "yaml");

    assert_eq!(
        config,
        "pipeline:\n  - common.YAMLReader: {}\n  - users.alice.m.UserProcessor: {}\n  - common.PrintProcessor: {}\n  - common.YAMLWriter: {}\n"
    );
}

#[tokio::test]
async fn test_chap_config_unknown_reader_omitted() {
    let root = tempfile::tempdir().unwrap();
    let config = generator(root.path()).chap_config(&ProcessorRef::new("alice", "m"), "csv", "Nexus");

    assert_eq!(
        config,
        "pipeline:\n  - users.alice.m.UserProcessor: {}\n  - common.PrintProcessor: {}\n  - common.NexusWriter: {}\n"
    );
}

#[test]
fn test_adhoc_pipeline_stages() {
    let processor = ProcessorRef::new("bob", "fit").with_processor("PeakFit");
    let pipeline = adhoc_pipeline(&processor, "nexus", "none");

    assert_eq!(pipeline.stages().len(), 3);
    assert_eq!(pipeline.stages()[1], Stage::UserProcessor(processor));
    assert_eq!(pipeline.stages()[2], Stage::Print);
}

#[tokio::test]
async fn test_workflow_config_appends_user_stage() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("saxs");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("chap.yaml"), "name: saxs\n").unwrap();
    // no trailing newline in the stored body
    std::fs::write(
        dir.join("pipeline.yaml"),
        "pipeline:\n  - common.NexusReader: {}\n  - saxs.IntegrateProcessor: {}",
    )
    .unwrap();

    let config = generator(root.path())
        .workflow_config(&ProcessorRef::new("alice", "userprocessor"), "saxs")
        .await;

    assert_eq!(
        config,
        "pipeline:\n  - common.NexusReader: {}\n  - saxs.IntegrateProcessor: {}\n  - users.alice.userprocessor.UserProcessor: {}\n"
    );
}

#[tokio::test]
async fn test_workflow_config_named_body() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("tomo");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("chap.yaml"), "name: tomo\nconfig: reduce.yaml\n").unwrap();
    std::fs::write(dir.join("reduce.yaml"), "pipeline:\n  - tomo.Reduce: {}\n").unwrap();

    let config = generator(root.path())
        .workflow_config(&ProcessorRef::new("bob", "m"), "tomo")
        .await;

    assert_eq!(
        config,
        "pipeline:\n  - tomo.Reduce: {}\n  - users.bob.m.UserProcessor: {}\n"
    );
}

#[tokio::test]
async fn test_workflow_config_unknown_workflow() {
    let root = tempfile::tempdir().unwrap();

    let config = generator(root.path())
        .workflow_config(&ProcessorRef::new("alice", "m"), "missing")
        .await;

    assert_eq!(config, "  - users.alice.m.UserProcessor: {}\n");
}
