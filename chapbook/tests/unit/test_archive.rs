//! Workflow archive tests

use std::io::Read;

use flate2::read::GzDecoder;

use chapbook::filesys::archive::{gzip_file, tar_dir};

#[test]
fn test_tar_gzip_round_trip() {
    let work = tempfile::tempdir().unwrap();
    let source = work.path().join("saxs");
    std::fs::create_dir_all(source.join("data")).unwrap();
    std::fs::write(source.join("a.txt"), "alpha\n").unwrap();
    std::fs::write(source.join("data").join("b.txt"), "beta\n").unwrap();

    let dest = tempfile::tempdir().unwrap();
    let tarball = tar_dir(&source, dest.path()).unwrap();
    assert_eq!(tarball, dest.path().join("saxs.tar"));

    let gz = gzip_file(&tarball, dest.path()).unwrap();
    assert_eq!(gz, dest.path().join("saxs.tar.gz"));
    assert!(tarball.exists());

    let decoder = GzDecoder::new(std::fs::File::open(&gz).unwrap());
    assert_eq!(
        decoder.header().and_then(|h| h.filename()),
        Some(&b"saxs.tar"[..])
    );

    let out = tempfile::tempdir().unwrap();
    tar::Archive::new(decoder).unpack(out.path()).unwrap();
    assert_eq!(
        std::fs::read_to_string(out.path().join("saxs").join("a.txt")).unwrap(),
        "alpha\n"
    );
    assert_eq!(
        std::fs::read_to_string(out.path().join("saxs").join("data").join("b.txt")).unwrap(),
        "beta\n"
    );
}

#[test]
fn test_tar_entry_names() {
    let work = tempfile::tempdir().unwrap();
    let source = work.path().join("tomo");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::write(source.join("run-chap.yaml"), "pipeline:\n").unwrap();

    let tarball = tar_dir(&source, work.path()).unwrap();

    let mut names = Vec::new();
    let mut archive = tar::Archive::new(std::fs::File::open(&tarball).unwrap());
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        names.push(entry.path().unwrap().to_string_lossy().trim_end_matches('/').to_string());
        let mut body = String::new();
        entry.read_to_string(&mut body).unwrap();
    }
    assert_eq!(names, vec!["tomo", "tomo/run-chap.yaml"]);
}

#[test]
fn test_archive_inside_source_is_skipped() {
    let work = tempfile::tempdir().unwrap();
    let source = work.path().join("alice");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::write(source.join("userprocessor.py"), "pass\n").unwrap();

    let tarball = tar_dir(&source, &source).unwrap();
    assert_eq!(tarball, source.join("alice.tar"));

    let mut archive = tar::Archive::new(std::fs::File::open(&tarball).unwrap());
    let names: Vec<String> = archive
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().to_string())
        .collect();
    assert!(names.iter().all(|n| !n.ends_with("alice.tar")));
}
