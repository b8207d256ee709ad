//! User processor code generator tests

use chapbook::models::pipeline::ProcessorRef;
use chapbook::pipeline::usercode::UserCodeGenerator;
use chapbook::storage::layout::UserLayout;

fn lines(sources: &[&str]) -> Vec<String> {
    sources.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_generate_creates_package_layout() {
    let root = tempfile::tempdir().unwrap();
    let generator = UserCodeGenerator::new(UserLayout::new(root.path()));

    let artifact = generator
        .generate(&ProcessorRef::new("alice", "userprocessor"), "saxs", &lines(&["x = 1"]))
        .await
        .unwrap();

    let user_dir = root.path().join("alice");
    assert_eq!(
        std::fs::read_to_string(user_dir.join("__init__.py")).unwrap(),
        "# auto-generated file to load user processors\n"
    );
    assert!(user_dir.join("saxs").join("__init__.py").exists());
    assert_eq!(artifact.path, user_dir.join("saxs").join("userprocessor.py"));
    assert!(!artifact.verbatim);

    let code = std::fs::read_to_string(&artifact.path).unwrap();
    assert!(code.contains("class UserProcessor(Processor):"));
    assert!(code.contains("        x = 1\n"));
}

#[tokio::test]
async fn test_generate_twice_overwrites() {
    let root = tempfile::tempdir().unwrap();
    let generator = UserCodeGenerator::new(UserLayout::new(root.path()));
    let processor = ProcessorRef::new("alice", "userprocessor");

    let first = generator
        .generate(&processor, "saxs", &lines(&["first = True"]))
        .await
        .unwrap();
    let second = generator
        .generate(&processor, "saxs", &lines(&["second = True"]))
        .await
        .unwrap();

    assert_eq!(first.path, second.path);
    assert_ne!(first.digest, second.digest);

    let code = std::fs::read_to_string(&second.path).unwrap();
    assert!(code.contains("second = True"));
    assert!(!code.contains("first = True"));
}

#[tokio::test]
async fn test_existing_package_marker_is_kept() {
    let root = tempfile::tempdir().unwrap();
    let user_dir = root.path().join("alice");
    std::fs::create_dir_all(&user_dir).unwrap();
    std::fs::write(user_dir.join("__init__.py"), "from . import helpers\n").unwrap();

    let generator = UserCodeGenerator::new(UserLayout::new(root.path()));
    generator
        .generate(&ProcessorRef::new("alice", "userprocessor"), "saxs", &lines(&["pass"]))
        .await
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(user_dir.join("__init__.py")).unwrap(),
        "from . import helpers\n"
    );
}

#[tokio::test]
async fn test_verbatim_class_written_as_is() {
    let root = tempfile::tempdir().unwrap();
    let generator = UserCodeGenerator::new(UserLayout::new(root.path()));
    let source = lines(&[
        "from CHAP import Processor",
        "class UserProcessor(Processor):\n    def process(self, data):\n        return data * 2",
    ]);

    let artifact = generator
        .generate(&ProcessorRef::new("bob", "scale"), "adhoc", &source)
        .await
        .unwrap();

    assert!(artifact.verbatim);
    assert_eq!(
        std::fs::read_to_string(&artifact.path).unwrap(),
        source.join("\n")
    );
    assert!(artifact.path.ends_with("bob/adhoc/scale.py"));
}

#[tokio::test]
async fn test_same_input_same_digest() {
    let root = tempfile::tempdir().unwrap();
    let generator = UserCodeGenerator::new(UserLayout::new(root.path()));
    let processor = ProcessorRef::new("alice", "userprocessor");
    let cells = lines(&["a = 1", "b = a + 1"]);

    let first = generator.generate(&processor, "saxs", &cells).await.unwrap();
    let second = generator.generate(&processor, "saxs", &cells).await.unwrap();
    assert_eq!(first.digest, second.digest);
}
