//! Catalog of CHAP components, derived from the documentation directory

use std::path::Path;

use serde::Serialize;
use tracing::warn;

use crate::filesys::dir::Dir;

/// Readers, writers and processors documented in the CHAP docs
#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalog {
    pub readers: Vec<String>,
    pub writers: Vec<String>,
    pub processors: Vec<String>,
}

impl Catalog {
    /// Classify `<doc_dir>/*.md` by name. A missing directory gives an empty catalog.
    pub async fn scan(doc_dir: &Path) -> Self {
        let mut catalog = Catalog::default();

        let files = match Dir::new(doc_dir).list_files().await {
            Ok(files) => files,
            Err(e) => {
                warn!("Unable to list CHAP docs in {}: {}", doc_dir.display(), e);
                return catalog;
            }
        };

        for file in files {
            if file.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let Some(name) = file.file_stem().map(|s| s.to_string_lossy().to_string()) else {
                continue;
            };
            if name.contains("Reader") {
                catalog.readers.push(name);
            } else if name.contains("Writer") {
                catalog.writers.push(name);
            } else if name.contains("Processor") {
                catalog.processors.push(name);
            }
        }

        catalog.readers.sort();
        catalog.writers.sort();
        catalog.processors.sort();
        catalog
    }
}
