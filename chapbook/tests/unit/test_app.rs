//! Run orchestration tests

#![cfg(unix)]

use std::path::PathBuf;
use std::time::Duration;

use chapbook::app::options::{AppOptions, RegistryOptions};
use chapbook::app::state::{AdhocRunRequest, AppState, RunRequest};
use chapbook::errors::ChapError;
use chapbook::models::execution::RunStatus;
use chapbook::pipeline::{executor, release};

struct Fixture {
    _dir: tempfile::TempDir,
    users: PathBuf,
    state: AppState,
}

fn fixture(command: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let users = dir.path().join("users");
    let workflows = dir.path().join("workflows");

    let saxs = workflows.join("saxs");
    std::fs::create_dir_all(&saxs).unwrap();
    std::fs::write(saxs.join("chap.yaml"), "name: saxs\ngroup: scattering\n").unwrap();
    std::fs::write(saxs.join("pipeline.yaml"), "pipeline:\n  - common.NexusReader: {}\n").unwrap();

    let options = AppOptions {
        user_root: users.clone(),
        registry: RegistryOptions {
            workflows_root: workflows,
            ttl: Duration::from_secs(60),
        },
        executor: executor::Options {
            command: PathBuf::from(command),
            install_dir: dir.path().join("chap"),
            timeout: Duration::from_secs(10),
        },
        ..Default::default()
    };
    let state = AppState::init(&options).unwrap();

    Fixture {
        _dir: dir,
        users,
        state,
    }
}

fn request(user: &str, workflow: &str) -> RunRequest {
    RunRequest::new(user, workflow, vec!["data = data".to_string()])
}

#[tokio::test]
async fn test_run_workflow_success() {
    let fixture = fixture("/bin/true");

    let report = fixture.state.run_workflow(&request("alice", "saxs")).await.unwrap();

    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(
        report.config,
        "pipeline:\n  - common.NexusReader: {}\n  - users.alice.userprocessor.UserProcessor: {}\n"
    );
    assert!(report.error.is_none());
    assert!(report.result.as_ref().unwrap().succeeded());

    let code = report.code.unwrap();
    assert_eq!(code.path, fixture.users.join("alice/saxs/userprocessor.py"));
    assert!(code.path.exists());
    assert_eq!(
        std::fs::read_to_string(fixture.users.join("alice/saxs/run-chap.yaml")).unwrap(),
        report.config
    );
}

#[tokio::test]
async fn test_run_workflow_failure_is_reported() {
    let fixture = fixture("/bin/false");

    let report = fixture.state.run_workflow(&request("alice", "saxs")).await.unwrap();

    assert_eq!(report.status, RunStatus::Error);
    assert!(report.error.is_some());
    assert!(report.result.is_none());
    // the attempted config is still shown
    assert!(report.config.contains("users.alice.userprocessor.UserProcessor"));
}

#[tokio::test]
async fn test_run_unknown_workflow() {
    let fixture = fixture("/bin/true");

    let err = fixture
        .state
        .run_workflow(&request("alice", "tomo"))
        .await
        .unwrap_err();
    assert!(matches!(err, ChapError::NotFound(_)));
    // nothing was generated
    assert!(!fixture.users.join("alice").exists());
}

#[tokio::test]
async fn test_run_rejects_path_names() {
    let fixture = fixture("/bin/true");

    let err = fixture
        .state
        .run_workflow(&request("../alice", "saxs"))
        .await
        .unwrap_err();
    assert!(matches!(err, ChapError::ValidationError(_)));

    let mut bad_module = request("alice", "saxs");
    bad_module.module = "user.processor".to_string();
    let err = fixture.state.run_workflow(&bad_module).await.unwrap_err();
    assert!(matches!(err, ChapError::ValidationError(_)));
}

#[tokio::test]
async fn test_users_must_be_importable() {
    let fixture = fixture("/bin/true");

    // users.<user>.<module> would not import for these
    for user in ["alice.smith", "a-b", "2alice"] {
        let err = fixture
            .state
            .run_workflow(&request(user, "saxs"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChapError::ValidationError(_)), "{user}");

        let err = fixture
            .state
            .workflow_config(user, "saxs", "userprocessor", "UserProcessor")
            .await
            .unwrap_err();
        assert!(matches!(err, ChapError::ValidationError(_)), "{user}");
    }
    assert!(!fixture.users.exists());

    let report = fixture
        .state
        .run_workflow(&request("alice_smith", "saxs"))
        .await
        .unwrap();
    assert_eq!(report.status, RunStatus::Success);
}

#[tokio::test]
async fn test_run_adhoc() {
    let fixture = fixture("/bin/true");

    let request = AdhocRunRequest {
        user: "bob".to_string(),
        workflow: "adhoc".to_string(),
        module: "scale".to_string(),
        processor: "Scale".to_string(),
        reader: "nexus".to_string(),
        writer: "yaml".to_string(),
        lines: vec!["data = data * 2".to_string()],
        batch: true,
    };
    let report = fixture.state.run_adhoc(&request).await.unwrap();

    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(
        report.config,
        "pipeline:\n  - common.NexusReader: {}\n  - users.bob.scale.Scale: {}\n  - common.PrintProcessor: {}\n  - common.YAMLWriter: {}\n"
    );
    assert!(report.result.unwrap().batch);
    assert!(fixture.users.join("bob/adhoc/scale.py").exists());
}

#[tokio::test]
async fn test_workflow_config_preview() {
    let fixture = fixture("/bin/true");

    let config = fixture
        .state
        .workflow_config("alice", "saxs", "userprocessor", "UserProcessor")
        .await
        .unwrap();
    assert!(config.ends_with("  - users.alice.userprocessor.UserProcessor: {}\n"));
    assert!(!fixture.users.join("alice").exists());
}

#[tokio::test]
async fn test_package_after_run() {
    let fixture = fixture("/bin/true");
    fixture.state.run_workflow(&request("alice", "saxs")).await.unwrap();

    let archive = fixture.state.package("alice", "saxs").await.unwrap();

    assert_eq!(archive, fixture.users.join("alice").join("saxs.tar.gz"));
    assert!(archive.exists());
    assert!(fixture.users.join("alice").join("saxs.tar").exists());
}

#[tokio::test]
async fn test_package_missing_area() {
    let fixture = fixture("/bin/true");
    std::fs::create_dir_all(fixture.users.join("alice")).unwrap();

    let err = fixture.state.package("alice", "saxs").await.unwrap_err();
    assert!(matches!(err, ChapError::PackagingError(_)));
}

#[tokio::test]
async fn test_capture_without_jupyter() {
    let fixture = fixture("/bin/true");
    let err = fixture
        .state
        .capture_notebook("alice", "userprocessor.ipynb")
        .await
        .unwrap_err();
    assert!(matches!(err, ChapError::ConfigError(_)));

    let err = fixture.state.create_notebook("alice").await.unwrap_err();
    assert!(matches!(err, ChapError::ConfigError(_)));
}

#[tokio::test]
async fn test_save_config() {
    let fixture = fixture("/bin/true");
    let text = "name: saxs\ngroup: scattering\nthreshold: 0.5\n";

    let saved = fixture.state.save_config("alice", "saxs", text).await.unwrap();
    assert_eq!(saved, fixture.users.join("alice/saxs/chap.yaml"));
    assert_eq!(std::fs::read_to_string(&saved).unwrap(), text);

    // a second save replaces the first
    fixture.state.save_config("alice", "saxs", "name: saxs\n").await.unwrap();
    assert_eq!(std::fs::read_to_string(&saved).unwrap(), "name: saxs\n");
}

#[tokio::test]
async fn test_save_config_rejects_bad_yaml() {
    let fixture = fixture("/bin/true");

    let err = fixture
        .state
        .save_config("alice", "saxs", "name: [unclosed\n")
        .await
        .unwrap_err();
    assert!(matches!(err, ChapError::YamlError(_)));
    assert!(!fixture.users.join("alice/saxs/chap.yaml").exists());
}

#[tokio::test]
async fn test_commit_and_publish() {
    let dir = tempfile::tempdir().unwrap();
    let scripts = dir.path().join("scripts");
    std::fs::create_dir_all(&scripts).unwrap();
    std::os::unix::fs::symlink("/bin/echo", scripts.join("commit.sh")).unwrap();
    std::os::unix::fs::symlink("/bin/echo", scripts.join("publish.sh")).unwrap();
    let token_file = dir.path().join("token");
    std::fs::write(&token_file, "ghp_secret\n").unwrap();

    let users = dir.path().join("users");
    let options = AppOptions {
        user_root: users.clone(),
        release: release::Options {
            scripts_dir: scripts,
            user_repo: "CHAPUsers/CHAPBook".to_string(),
            token_file,
            doi: "123456".to_string(),
            timeout: Duration::from_secs(10),
        },
        ..Default::default()
    };
    let state = AppState::init(&options).unwrap();

    let report = state.commit("alice").await.unwrap();
    assert_eq!(
        report.stdout,
        format!("{} CHAPUsers/CHAPBook\n", users.join("alice").display())
    );

    let report = state.publish("alice").await.unwrap();
    assert!(report.stdout.starts_with("CHAPUsers/CHAPBook ghp_secret 0 "));
    assert_eq!(
        report.doi_link.as_deref(),
        Some("https://zenodo.org/badge/latestdoi/123456")
    );

    let err = state.commit("alice.smith").await.unwrap_err();
    assert!(matches!(err, ChapError::ValidationError(_)));
}
