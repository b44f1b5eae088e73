//! Knowledge corpus loading.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use vulweb_core::types::KnowledgeDocument;

/// Where the store reads its documents from.
#[derive(Debug, Clone)]
pub enum CorpusSource {
    /// A directory of `*.json` files, one document each, re-read on reload.
    Directory(PathBuf),
    /// A fixed in-memory document list.
    Documents(Vec<KnowledgeDocument>),
}

impl CorpusSource {
    /// Load every document. Never fails: unreadable entries are logged and
    /// skipped, and a missing directory yields an empty corpus.
    pub fn load(&self) -> Vec<KnowledgeDocument> {
        let docs = match self {
            CorpusSource::Directory(dir) => load_directory(dir),
            CorpusSource::Documents(docs) => docs.clone(),
        };
        dedup_by_id(docs)
    }
}

/// Read `*.json` documents from `dir` in file-name order.
pub fn load_directory(dir: &Path) -> Vec<KnowledgeDocument> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "Knowledge base directory unavailable");
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut docs = Vec::with_capacity(paths.len());
    for path in paths {
        match read_document(&path) {
            Ok(doc) => docs.push(doc),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping knowledge document"),
        }
    }

    info!(path = %dir.display(), documents = docs.len(), "Knowledge base loaded");
    docs
}

fn read_document(path: &Path) -> Result<KnowledgeDocument, vulweb_core::VulwebError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn dedup_by_id(docs: Vec<KnowledgeDocument>) -> Vec<KnowledgeDocument> {
    let mut seen = HashSet::new();
    docs.into_iter()
        .filter(|doc| {
            let fresh = seen.insert(doc.id.clone());
            if !fresh {
                warn!(id = %doc.id, "Duplicate knowledge document id, keeping the first");
            }
            fresh
        })
        .collect()
}
