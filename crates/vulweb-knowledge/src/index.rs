//! Persistent vector index with brute-force cosine search.
//!
//! Entries live in memory and are mirrored to a single JSON snapshot file
//! (`vectors.json`) inside the index directory. The corpus is small enough
//! that an O(n) scan per query is fine.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vulweb_core::error::VulwebError;
use vulweb_core::types::RetrievalMetadata;

const SNAPSHOT_FILE: &str = "vectors.json";

/// A single hit returned from a vector search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    /// Cosine distance (`1 - similarity`), in `[0, 2]`.
    pub distance: f64,
    pub content: String,
    pub metadata: RetrievalMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorEntry {
    id: String,
    embedding: Vec<f32>,
    content: String,
    metadata: RetrievalMetadata,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    entries: Vec<VectorEntry>,
}

/// Vector index backed by a snapshot file.
///
/// Entries keep insertion order, so equal distances rank in corpus order.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    path: PathBuf,
    entries: Arc<RwLock<Vec<VectorEntry>>>,
}

impl VectorIndex {
    /// Open (or create) the index stored in `dir`.
    ///
    /// A missing snapshot yields an empty index; an unreadable one is an
    /// error.
    pub fn open(dir: &Path) -> Result<Self, VulwebError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(SNAPSHOT_FILE);

        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let snapshot: Snapshot = serde_json::from_str(&content)?;
            info!(
                path = %path.display(),
                entries = snapshot.entries.len(),
                "Vector index snapshot loaded"
            );
            snapshot.entries
        } else {
            Vec::new()
        };

        Ok(Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
        })
    }

    /// Insert or overwrite the entry with `id`.
    pub fn insert(
        &self,
        id: &str,
        embedding: Vec<f32>,
        content: String,
        metadata: RetrievalMetadata,
    ) -> Result<(), VulwebError> {
        let mut entries = self.write()?;
        let entry = VectorEntry {
            id: id.to_string(),
            embedding,
            content,
            metadata,
        };
        match entries.iter_mut().find(|e| e.id == id) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        Ok(())
    }

    /// The `k` nearest entries to `query`, by ascending cosine distance.
    ///
    /// A query whose length differs from the stored vectors is an error.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, VulwebError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| VulwebError::Retrieval(format!("Lock poisoned: {}", e)))?;

        if let Some(entry) = entries.iter().find(|e| e.embedding.len() != query.len()) {
            return Err(VulwebError::Retrieval(format!(
                "query has {} dimensions but entry '{}' has {}",
                query.len(),
                entry.id,
                entry.embedding.len()
            )));
        }

        let mut hits: Vec<SearchHit> = entries
            .iter()
            .map(|entry| SearchHit {
                id: entry.id.clone(),
                distance: 1.0 - cosine_similarity(query, &entry.embedding),
                content: entry.content.clone(),
                metadata: entry.metadata.clone(),
            })
            .collect();

        // Stable: ties keep insertion order.
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }

    /// Drop every entry (memory only until [`persist`](Self::persist)).
    pub fn clear(&self) -> Result<(), VulwebError> {
        self.write()?.clear();
        Ok(())
    }

    /// Write the current entries to the snapshot file.
    pub fn persist(&self) -> Result<(), VulwebError> {
        let snapshot = Snapshot {
            entries: self
                .entries
                .read()
                .map_err(|e| VulwebError::Storage(format!("Lock poisoned: {}", e)))?
                .clone(),
        };
        let content = serde_json::to_string(&snapshot)?;
        std::fs::write(&self.path, content)?;
        debug!(path = %self.path.display(), entries = snapshot.entries.len(), "Vector index persisted");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector length of the stored entries; `None` when empty.
    pub fn dimensions(&self) -> Option<usize> {
        self.entries
            .read()
            .ok()
            .and_then(|e| e.first().map(|entry| entry.embedding.len()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<VectorEntry>>, VulwebError> {
        self.entries
            .write()
            .map_err(|e| VulwebError::Storage(format!("Lock poisoned: {}", e)))
    }
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();
    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: &str) -> RetrievalMetadata {
        RetrievalMetadata {
            id: id.to_string(),
            title: format!("title {}", id),
            category: "test".to_string(),
            tags: String::new(),
            difficulty: String::new(),
        }
    }

    fn unit(dim: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; dim];
        v[hot] = 1.0;
        v
    }

    #[test]
    fn test_insert_and_search_orders_by_distance() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::open(dir.path()).unwrap();

        index
            .insert("far", vec![-1.0, 0.0], "far".into(), meta("far"))
            .unwrap();
        index
            .insert("near", vec![1.0, 0.1], "near".into(), meta("near"))
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "near");
        assert!(hits[0].distance < hits[1].distance);
        assert!((hits[1].distance - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_search_respects_k() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::open(dir.path()).unwrap();
        for i in 0..10 {
            let id = format!("d{}", i);
            index
                .insert(&id, unit(10, i), id.clone(), meta(&id))
                .unwrap();
        }
        assert_eq!(index.search(&unit(10, 0), 3).unwrap().len(), 3);
        assert!(index.search(&unit(10, 0), 0).unwrap().is_empty());
    }

    #[test]
    fn test_search_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::open(dir.path()).unwrap();
        assert!(index.search(&[1.0, 0.0], 5).unwrap().is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn test_equal_distance_keeps_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::open(dir.path()).unwrap();
        for id in ["first", "second", "third"] {
            index
                .insert(id, vec![1.0, 1.0], id.into(), meta(id))
                .unwrap();
        }
        let ids: Vec<String> = index
            .search(&[1.0, 1.0], 3)
            .unwrap()
            .into_iter()
            .map(|h| h.id)
            .collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_insert_overwrites_same_id() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::open(dir.path()).unwrap();
        index.insert("a", vec![1.0], "v1".into(), meta("a")).unwrap();
        index.insert("a", vec![1.0], "v2".into(), meta("a")).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.search(&[1.0], 1).unwrap()[0].content, "v2");
    }

    #[test]
    fn test_persist_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let index = VectorIndex::open(dir.path()).unwrap();
            index
                .insert("kept", vec![0.5, 0.5], "body".into(), meta("kept"))
                .unwrap();
            index.persist().unwrap();
        }
        let reopened = VectorIndex::open(dir.path()).unwrap();
        assert_eq!(reopened.len(), 1);
        let hit = &reopened.search(&[0.5, 0.5], 1).unwrap()[0];
        assert_eq!(hit.id, "kept");
        assert_eq!(hit.metadata.title, "title kept");
    }

    #[test]
    fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::open(dir.path()).unwrap();
        index.insert("a", vec![1.0], "a".into(), meta("a")).unwrap();
        index.clear().unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_corrupt_snapshot_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SNAPSHOT_FILE), "{broken").unwrap();
        assert!(matches!(
            VectorIndex::open(dir.path()),
            Err(VulwebError::Serialization(_))
        ));
    }

    #[test]
    fn test_dimension_mismatch_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::open(dir.path()).unwrap();
        assert_eq!(index.dimensions(), None);
        index.insert("a", unit(4, 0), "a".into(), meta("a")).unwrap();
        assert_eq!(index.dimensions(), Some(4));

        assert!(matches!(
            index.search(&unit(8, 0), 1),
            Err(VulwebError::Retrieval(_))
        ));
        assert_eq!(index.search(&unit(4, 0), 1).unwrap().len(), 1);
    }

    #[test]
    fn test_cosine_similarity_edge_cases() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[2.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
    }
}
