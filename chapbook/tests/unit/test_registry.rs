//! Workflow registry tests

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chapbook::cache::workflow::{scan_workflows, WorkflowRegistry};

fn write_workflow(root: &Path, dir: &str, descriptor: &str) {
    let dir = root.join(dir);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("chap.yaml"), descriptor).unwrap();
}

#[tokio::test]
async fn test_empty_root_gives_empty_list() {
    let root = tempfile::tempdir().unwrap();
    assert!(scan_workflows(root.path()).await.is_empty());
}

#[tokio::test]
async fn test_missing_root_gives_empty_list() {
    let root = tempfile::tempdir().unwrap();
    assert!(scan_workflows(&root.path().join("absent")).await.is_empty());
}

#[tokio::test]
async fn test_bad_descriptor_is_skipped() {
    let root = tempfile::tempdir().unwrap();
    write_workflow(root.path(), "saxs", "name: saxs\ndescription: small angle scattering\n");
    write_workflow(root.path(), "broken", "name: [unterminated\n");
    write_workflow(root.path(), "tomo", "name: tomo\ntype: reconstruction\nconfig: tomo.yaml\n");
    std::fs::create_dir_all(root.path().join("no-descriptor")).unwrap();
    std::fs::write(root.path().join("README.md"), "not a workflow").unwrap();

    let workflows = scan_workflows(root.path()).await;
    let names: Vec<&str> = workflows.iter().map(|w| w.name.as_str()).collect();
    assert_eq!(names, vec!["saxs", "tomo"]);

    let tomo = &workflows[1];
    assert_eq!(tomo.workflow_type, "reconstruction");
    assert_eq!(tomo.directory, root.path().join("tomo"));
    assert_eq!(tomo.config_path(), root.path().join("tomo").join("tomo.yaml"));
    assert_eq!(workflows[0].config_path(), root.path().join("saxs").join("pipeline.yaml"));
}

#[tokio::test]
async fn test_duplicate_names_keep_last() {
    let root = tempfile::tempdir().unwrap();
    write_workflow(root.path(), "a-saxs", "name: saxs\nversion: '1'\n");
    write_workflow(root.path(), "b-saxs", "name: saxs\nversion: '2'\n");

    let workflows = scan_workflows(root.path()).await;
    assert_eq!(workflows.len(), 1);
    assert_eq!(workflows[0].version, "2");
}

#[tokio::test]
async fn test_snapshot_reused_within_ttl() {
    let root = tempfile::tempdir().unwrap();
    write_workflow(root.path(), "saxs", "name: saxs\n");

    let registry = WorkflowRegistry::new(root.path(), Duration::from_secs(3600));
    let first = registry.workflows().await;
    let second = registry.workflows().await;

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.scan_count(), 1);
    assert_eq!(first.names(), vec!["saxs"]);
}

#[tokio::test]
async fn test_snapshot_rescanned_after_ttl() {
    let root = tempfile::tempdir().unwrap();
    write_workflow(root.path(), "saxs", "name: saxs\n");

    let registry = WorkflowRegistry::new(root.path(), Duration::from_millis(50));
    let first = registry.workflows().await;
    assert_eq!(first.len(), 1);

    write_workflow(root.path(), "tomo", "name: tomo\n");
    // still served from the first snapshot
    assert!(registry.find("tomo").await.is_none());

    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = registry.workflows().await;
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(registry.scan_count(), 2);
    assert_eq!(second.names(), vec!["saxs", "tomo"]);

    // the old snapshot is unchanged for holders
    assert_eq!(first.names(), vec!["saxs"]);
}

#[tokio::test]
async fn test_concurrent_access_scans_once() {
    let root = tempfile::tempdir().unwrap();
    for name in ["a", "b", "c"] {
        write_workflow(root.path(), name, &format!("name: {}\n", name));
    }

    let registry = Arc::new(WorkflowRegistry::new(root.path(), Duration::from_secs(3600)));
    let mut handles = Vec::new();
    for _ in 0..16 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move { registry.workflows().await.len() }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), 3);
    }

    assert_eq!(registry.scan_count(), 1);
}

#[tokio::test]
async fn test_invalidate_forces_rescan() {
    let root = tempfile::tempdir().unwrap();
    write_workflow(root.path(), "saxs", "name: saxs\n");

    let registry = WorkflowRegistry::new(root.path(), Duration::from_secs(3600));
    registry.workflows().await;
    registry.invalidate();
    registry.workflows().await;

    assert_eq!(registry.scan_count(), 2);
}
