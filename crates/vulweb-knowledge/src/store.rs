//! Knowledge store: vector tier with keyword fallback.
//!
//! The vector tier is attempted once at construction and once per
//! `reload()`. If it cannot be brought up the store serves every query
//! from the keyword tier until the next reload. A vector tier that fails
//! on an individual query degrades that query to the keyword tier.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use vulweb_core::config::{resolve_path, KnowledgeConfig};
use vulweb_core::error::VulwebError;
use vulweb_core::types::{KnowledgeDocument, Relevance, RetrievalMetadata, RetrievalResult};

use crate::corpus::CorpusSource;
use crate::embedding::{DynEmbeddingService, OnnxEmbeddingService};
use crate::index::VectorIndex;
use crate::keyword::KeywordIndex;

/// Produces the embedding service for the vector tier.
pub type EmbedderLoader =
    Arc<dyn Fn() -> Result<Arc<dyn DynEmbeddingService>, VulwebError> + Send + Sync>;

/// How to bring up the vector tier.
#[derive(Clone)]
pub struct VectorSettings {
    /// Directory of the persisted index snapshot.
    pub index_dir: PathBuf,
    pub loader: EmbedderLoader,
}

/// Which tier currently answers queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveTier {
    Vector,
    Keyword,
}

/// Snapshot of the store for status and reload reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStatus {
    pub tier: ActiveTier,
    pub documents: usize,
}

struct VectorTier {
    embedder: Arc<dyn DynEmbeddingService>,
    index: VectorIndex,
}

impl VectorTier {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>, VulwebError> {
        let query_vec = self
            .embedder
            .embed_boxed(query)
            .await
            .map_err(|e| VulwebError::Retrieval(e.to_string()))?;
        let hits = self.index.search(&query_vec, k)?;
        Ok(hits
            .into_iter()
            .map(|hit| RetrievalResult {
                content: hit.content,
                metadata: hit.metadata,
                relevance: Relevance::Distance(hit.distance.max(0.0)),
            })
            .collect())
    }
}

struct Tiers {
    vector: Option<VectorTier>,
    keyword: KeywordIndex,
}

impl Tiers {
    /// Document count of the tier that answers queries.
    fn status(&self) -> StoreStatus {
        match &self.vector {
            Some(vector) => StoreStatus {
                tier: ActiveTier::Vector,
                documents: vector.index.len(),
            },
            None => StoreStatus {
                tier: ActiveTier::Keyword,
                documents: self.keyword.len(),
            },
        }
    }
}

/// Top-k knowledge retrieval over the corpus.
///
/// Searches clone the current tier set and run without holding the lock;
/// `reload()` builds a complete replacement and swaps it in, so a reader
/// observes either the old or the new index.
pub struct KnowledgeStore {
    source: CorpusSource,
    vector: Option<VectorSettings>,
    tiers: RwLock<Arc<Tiers>>,
    reload_lock: tokio::sync::Mutex<()>,
}

impl KnowledgeStore {
    /// Build a store, attempting the vector tier when `vector` is given.
    ///
    /// Never fails; vector initialisation errors are logged and the store
    /// falls back to keyword search.
    pub async fn open(source: CorpusSource, vector: Option<VectorSettings>) -> Self {
        let tiers = build_tiers(&source, vector.as_ref(), false).await;
        log_status("Knowledge store ready", tiers.status());
        Self {
            source,
            vector,
            tiers: RwLock::new(Arc::new(tiers)),
            reload_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Keyword-only store over a fixed document list.
    pub async fn keyword_only(documents: Vec<KnowledgeDocument>) -> Self {
        Self::open(CorpusSource::Documents(documents), None).await
    }

    /// Build a store from the `[knowledge]` config section, using the ONNX
    /// embedding model when the vector tier is enabled.
    pub async fn from_config(config: &KnowledgeConfig) -> Self {
        let source = CorpusSource::Directory(resolve_path(&config.corpus_dir));
        let vector = config.vector_enabled.then(|| {
            let model_dir = resolve_path(&config.model_dir);
            VectorSettings {
                index_dir: resolve_path(&config.index_dir),
                loader: Arc::new(move || {
                    let service = OnnxEmbeddingService::from_directory(&model_dir)?;
                    Ok(Arc::new(service) as Arc<dyn DynEmbeddingService>)
                }),
            }
        });
        Self::open(source, vector).await
    }

    /// Up to `k` results, best first. Never fails.
    pub async fn search(&self, query: &str, k: usize) -> Vec<RetrievalResult> {
        if k == 0 {
            return Vec::new();
        }
        let tiers = self.current();

        if let Some(vector) = &tiers.vector {
            if !query.trim().is_empty() {
                match vector.search(query, k).await {
                    Ok(results) => {
                        debug!(tier = "vector", results = results.len(), "Knowledge search");
                        return results;
                    }
                    Err(e) => {
                        warn!(error = %e, "Vector search failed, using keyword search for this query");
                    }
                }
            }
        }

        let results = tiers.keyword.search(query, k);
        debug!(tier = "keyword", results = results.len(), "Knowledge search");
        results
    }

    /// Re-read the corpus and re-attempt the vector tier from scratch.
    pub async fn reload(&self) -> StoreStatus {
        let _guard = self.reload_lock.lock().await;
        let tiers = build_tiers(&self.source, self.vector.as_ref(), true).await;
        let status = tiers.status();

        let mut current = self.tiers.write().unwrap_or_else(|e| e.into_inner());
        *current = Arc::new(tiers);
        drop(current);

        log_status("Knowledge store reloaded", status);
        status
    }

    pub fn status(&self) -> StoreStatus {
        self.current().status()
    }

    fn current(&self) -> Arc<Tiers> {
        Arc::clone(&self.tiers.read().unwrap_or_else(|e| e.into_inner()))
    }
}

async fn build_tiers(
    source: &CorpusSource,
    vector: Option<&VectorSettings>,
    rebuild: bool,
) -> Tiers {
    let docs = source.load();

    let vector = match vector {
        Some(settings) => match init_vector(settings, &docs, rebuild).await {
            Ok(tier) => Some(tier),
            Err(e) => {
                warn!(error = %e, "Vector search unavailable, falling back to keyword search");
                None
            }
        },
        None => None,
    };

    Tiers {
        vector,
        keyword: KeywordIndex::new(docs),
    }
}

async fn init_vector(
    settings: &VectorSettings,
    docs: &[KnowledgeDocument],
    rebuild: bool,
) -> Result<VectorTier, VulwebError> {
    let embedder = (settings.loader)()?;
    let index = VectorIndex::open(&settings.index_dir)?;

    let stale = index
        .dimensions()
        .is_some_and(|dims| dims != embedder.dimensions());
    if stale {
        warn!(
            stored = ?index.dimensions(),
            model = embedder.dimensions(),
            "Vector index dimensions do not match the embedding model, rebuilding"
        );
    }
    if rebuild || stale {
        index.clear()?;
    }

    if index.is_empty() {
        for doc in docs {
            let text = doc.searchable_text();
            let embedding = embedder.embed_boxed(&text).await?;
            index.insert(&doc.id, embedding, text, RetrievalMetadata::from(doc))?;
        }
        index.persist()?;
        info!(documents = index.len(), "Vector index built");
    } else {
        info!(documents = index.len(), "Reusing persisted vector index");
    }

    Ok(VectorTier { embedder, index })
}

fn log_status(message: &str, status: StoreStatus) {
    info!(tier = ?status.tier, documents = status.documents, "{}", message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingService, MockEmbedding};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vulweb_core::types::DocumentMetadata;

    fn doc(id: &str, title: &str, content: &str) -> KnowledgeDocument {
        KnowledgeDocument {
            id: id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            category: "guide".to_string(),
            tags: vec![],
            metadata: DocumentMetadata::default(),
        }
    }

    fn mock_loader() -> EmbedderLoader {
        Arc::new(|| Ok(Arc::new(MockEmbedding::new()) as Arc<dyn DynEmbeddingService>))
    }

    fn failing_loader() -> EmbedderLoader {
        Arc::new(|| Err(VulwebError::DependencyUnavailable("no model".into())))
    }

    /// Embeds documents normally but fails every query containing "boom".
    struct FlakyEmbedding(MockEmbedding);

    impl EmbeddingService for FlakyEmbedding {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, VulwebError> {
            if text.contains("boom") {
                return Err(VulwebError::Search("index offline".into()));
            }
            self.0.embed(text).await
        }

        fn dimensions(&self) -> usize {
            EmbeddingService::dimensions(&self.0)
        }
    }

    fn corpus() -> Vec<KnowledgeDocument> {
        vec![
            doc("upload", "Model Upload", "Open the models page and add a model"),
            doc("format", "Dataset Format", "CSV and JSON datasets are accepted"),
            doc("boom-doc", "Training", "Start a training task"),
        ]
    }

    #[tokio::test]
    async fn test_keyword_only_store() {
        let store = KnowledgeStore::keyword_only(corpus()).await;
        assert_eq!(
            store.status(),
            StoreStatus {
                tier: ActiveTier::Keyword,
                documents: 3
            }
        );
        let results = store.search("model upload", 2).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].metadata.id, "upload");
    }

    #[tokio::test]
    async fn test_empty_store_returns_empty() {
        let store = KnowledgeStore::keyword_only(vec![]).await;
        assert!(store.search("anything", 3).await.is_empty());
        assert!(store.search("", 3).await.is_empty());
    }

    #[tokio::test]
    async fn test_vector_tier_used_when_available() {
        let dir = tempfile::tempdir().unwrap();
        let store = KnowledgeStore::open(
            CorpusSource::Documents(corpus()),
            Some(VectorSettings {
                index_dir: dir.path().to_path_buf(),
                loader: mock_loader(),
            }),
        )
        .await;

        assert_eq!(store.status().tier, ActiveTier::Vector);
        let results = store.search("dataset format csv", 2).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].metadata.id, "format");

        let distances: Vec<f64> = results
            .iter()
            .map(|r| match r.relevance {
                Relevance::Distance(d) => d,
                Relevance::Score(_) => panic!("expected vector distances"),
            })
            .collect();
        assert!(distances[0] <= distances[1]);
        assert!(distances.iter().all(|d| *d >= 0.0));
    }

    #[tokio::test]
    async fn test_loader_failure_falls_back_to_keyword() {
        let dir = tempfile::tempdir().unwrap();
        let store = KnowledgeStore::open(
            CorpusSource::Documents(corpus()),
            Some(VectorSettings {
                index_dir: dir.path().to_path_buf(),
                loader: failing_loader(),
            }),
        )
        .await;

        assert_eq!(store.status().tier, ActiveTier::Keyword);
        let results = store.search("dataset", 5).await;
        assert!(matches!(results[0].relevance, Relevance::Score(_)));
    }

    #[tokio::test]
    async fn test_per_query_vector_failure_uses_keyword() {
        let dir = tempfile::tempdir().unwrap();
        let loader: EmbedderLoader = Arc::new(|| {
            Ok(Arc::new(FlakyEmbedding(MockEmbedding::new())) as Arc<dyn DynEmbeddingService>)
        });
        let store = KnowledgeStore::open(
            CorpusSource::Documents(vec![doc("d", "boom handling", "what to do")]),
            Some(VectorSettings {
                index_dir: dir.path().join("idx"),
                loader,
            }),
        )
        .await;

        // Document text contains "boom" so indexing fails and the tier is
        // never brought up.
        assert_eq!(store.status().tier, ActiveTier::Keyword);

        let dir2 = tempfile::tempdir().unwrap();
        let loader: EmbedderLoader = Arc::new(|| {
            Ok(Arc::new(FlakyEmbedding(MockEmbedding::new())) as Arc<dyn DynEmbeddingService>)
        });
        let store = KnowledgeStore::open(
            CorpusSource::Documents(vec![doc("d", "crash handling", "what to do")]),
            Some(VectorSettings {
                index_dir: dir2.path().to_path_buf(),
                loader,
            }),
        )
        .await;
        assert_eq!(store.status().tier, ActiveTier::Vector);

        let results = store.search("crash boom", 3).await;
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0].relevance, Relevance::Score(_)));
        // The tier stays up for later queries.
        assert_eq!(store.status().tier, ActiveTier::Vector);
    }

    #[tokio::test]
    async fn test_reload_rereads_directory() {
        let kb = tempfile::tempdir().unwrap();
        let write = |name: &str, id: &str, title: &str| {
            let json = serde_json::json!({"id": id, "title": title, "content": "body"});
            std::fs::write(kb.path().join(name), json.to_string()).unwrap();
        };
        write("1.json", "one", "Model Upload");

        let store =
            KnowledgeStore::open(CorpusSource::Directory(kb.path().to_path_buf()), None).await;
        assert_eq!(store.status().documents, 1);
        assert!(store.search("gpu", 3).await.is_empty());

        write("2.json", "two", "GPU Setup");
        let status = store.reload().await;
        assert_eq!(status.documents, 2);
        assert_eq!(status.tier, ActiveTier::Keyword);
        assert_eq!(store.search("gpu", 3).await[0].metadata.id, "two");
    }

    #[tokio::test]
    async fn test_reload_retries_vector_tier() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let loader: EmbedderLoader = Arc::new(move || {
            // Unavailable at startup, available from the first reload on.
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(VulwebError::DependencyUnavailable("not yet".into()))
            } else {
                Ok(Arc::new(MockEmbedding::new()) as Arc<dyn DynEmbeddingService>)
            }
        });

        let dir = tempfile::tempdir().unwrap();
        let store = KnowledgeStore::open(
            CorpusSource::Documents(corpus()),
            Some(VectorSettings {
                index_dir: dir.path().to_path_buf(),
                loader,
            }),
        )
        .await;
        assert_eq!(store.status().tier, ActiveTier::Keyword);

        // Queries do not retry the vector path.
        store.search("model", 1).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);

        let status = store.reload().await;
        assert_eq!(status.tier, ActiveTier::Vector);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_persisted_index_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let settings = VectorSettings {
            index_dir: dir.path().to_path_buf(),
            loader: mock_loader(),
        };
        KnowledgeStore::open(CorpusSource::Documents(corpus()), Some(settings.clone())).await;

        // A second store with an empty corpus still answers from the snapshot.
        let store = KnowledgeStore::open(CorpusSource::Documents(vec![]), Some(settings)).await;
        assert_eq!(
            store.status(),
            StoreStatus {
                tier: ActiveTier::Vector,
                documents: 3
            }
        );
        assert!(!store.search("model upload", 1).await.is_empty());

        // A reload rebuilds from the (empty) corpus.
        let status = store.reload().await;
        assert_eq!(status.documents, 0);
        assert!(store.search("model upload", 1).await.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_from_other_model_is_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let small: EmbedderLoader = Arc::new(|| {
            Ok(Arc::new(MockEmbedding::with_dimensions(16)) as Arc<dyn DynEmbeddingService>)
        });
        KnowledgeStore::open(
            CorpusSource::Documents(corpus()),
            Some(VectorSettings {
                index_dir: dir.path().to_path_buf(),
                loader: small,
            }),
        )
        .await;

        let store = KnowledgeStore::open(
            CorpusSource::Documents(corpus()),
            Some(VectorSettings {
                index_dir: dir.path().to_path_buf(),
                loader: mock_loader(),
            }),
        )
        .await;
        assert_eq!(store.status().tier, ActiveTier::Vector);

        let results = store.search("dataset format csv", 2).await;
        assert_eq!(results[0].metadata.id, "format");
        assert!(matches!(results[0].relevance, Relevance::Distance(d) if d < 1.0));

        // The rebuilt snapshot carries the new model's dimensions.
        let reopened = VectorIndex::open(dir.path()).unwrap();
        assert_eq!(reopened.dimensions(), Some(384));
    }

    #[tokio::test]
    async fn test_concurrent_search_during_reload() {
        let store = Arc::new(KnowledgeStore::keyword_only(corpus()).await);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for _ in 0..20 {
                    let results = store.search("dataset", 3).await;
                    assert_eq!(results.len(), 1);
                }
            }));
        }
        for _ in 0..5 {
            store.reload().await;
        }
        for h in handles {
            h.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_zero_k() {
        let store = KnowledgeStore::keyword_only(corpus()).await;
        assert!(store.search("model", 0).await.is_empty());
    }
}
