//! Embedding service trait and implementations.
//!
//! - `OnnxEmbeddingService` runs a multilingual sentence-transformer ONNX
//!   export through ort, tokenized with the HuggingFace tokenizers crate.
//! - `MockEmbedding` hashes tokens into a fixed-size bag-of-words vector.
//!   Texts sharing words land close together, which is enough to exercise
//!   the vector tier in tests.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::{Arc, Mutex};

use ort::session::Session;
use ort::value::TensorRef;
use tokenizers::Tokenizer;
use tracing::info;
use vulweb_core::error::VulwebError;

/// Service turning text into fixed-dimensional vectors.
pub trait EmbeddingService: Send + Sync {
    fn embed(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, VulwebError>> + Send;

    fn dimensions(&self) -> usize;
}

/// Object-safe counterpart of [`EmbeddingService`].
///
/// `EmbeddingService::embed` returns `impl Future` and cannot be used
/// behind `dyn`. Every `EmbeddingService` gets this trait through the
/// blanket impl below.
pub trait DynEmbeddingService: Send + Sync {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<f32>, VulwebError>> + Send + 'a>>;

    fn dimensions(&self) -> usize;
}

impl<T: EmbeddingService> DynEmbeddingService for T {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<f32>, VulwebError>> + Send + 'a>> {
        Box::pin(self.embed(text))
    }

    fn dimensions(&self) -> usize {
        EmbeddingService::dimensions(self)
    }
}

// ---------------------------------------------------------------------------
// OnnxEmbeddingService
// ---------------------------------------------------------------------------

/// ONNX Runtime sentence-transformer.
///
/// The model directory must contain `model.onnx` and `tokenizer.json`.
/// Token embeddings are mean-pooled under the attention mask and
/// L2-normalised.
pub struct OnnxEmbeddingService {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    dimensions: usize,
}

impl std::fmt::Debug for OnnxEmbeddingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingService")
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl OnnxEmbeddingService {
    /// Load the model and tokenizer from `model_dir`.
    ///
    /// Any missing file or load failure is reported as
    /// [`VulwebError::DependencyUnavailable`].
    pub fn from_directory(model_dir: &Path) -> Result<Self, VulwebError> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            return Err(VulwebError::DependencyUnavailable(format!(
                "ONNX model not found at {}",
                model_path.display()
            )));
        }
        if !tokenizer_path.exists() {
            return Err(VulwebError::DependencyUnavailable(format!(
                "Tokenizer not found at {}",
                tokenizer_path.display()
            )));
        }

        let unavailable = |stage: &str, e: &dyn std::fmt::Display| {
            VulwebError::DependencyUnavailable(format!("{}: {}", stage, e))
        };

        let session = Session::builder()
            .map_err(|e| unavailable("ONNX session builder", &e))?
            .with_intra_threads(1)
            .map_err(|e| unavailable("ONNX set threads", &e))?
            .commit_from_file(&model_path)
            .map_err(|e| unavailable("ONNX load model", &e))?;

        // Output is [batch, seq_len, hidden_dim]; MiniLM variants use 384.
        let dimensions = session
            .outputs()
            .first()
            .and_then(|out| out.dtype().tensor_shape())
            .and_then(|shape| shape.last().copied())
            .map(|d| if d > 0 { d as usize } else { 384 })
            .unwrap_or(384);

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| unavailable("Load tokenizer", &e))?;

        info!(
            model = %model_path.display(),
            dimensions,
            "Loaded ONNX embedding model"
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            dimensions,
        })
    }

    fn embed_sync(&self, text: &str) -> Result<Vec<f32>, VulwebError> {
        if text.trim().is_empty() {
            return Err(VulwebError::Search("Cannot embed empty text".to_string()));
        }
        let failed = |stage: &str, e: &dyn std::fmt::Display| {
            VulwebError::Search(format!("{}: {}", stage, e))
        };

        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| failed("Tokenization", &e))?;

        let to_i64 = |xs: &[u32]| xs.iter().map(|&x| x as i64).collect::<Vec<i64>>();
        let input_ids = to_i64(encoding.get_ids());
        let attention_mask = to_i64(encoding.get_attention_mask());
        let token_type_ids = to_i64(encoding.get_type_ids());
        let seq_len = input_ids.len();

        let ids_array = ndarray::Array2::from_shape_vec((1, seq_len), input_ids)
            .map_err(|e| failed("input_ids array", &e))?;
        let mask_array = ndarray::Array2::from_shape_vec((1, seq_len), attention_mask.clone())
            .map_err(|e| failed("attention_mask array", &e))?;
        let type_array = ndarray::Array2::from_shape_vec((1, seq_len), token_type_ids)
            .map_err(|e| failed("token_type_ids array", &e))?;

        let ids_ref =
            TensorRef::from_array_view(&ids_array).map_err(|e| failed("input_ids tensor", &e))?;
        let mask_ref = TensorRef::from_array_view(&mask_array)
            .map_err(|e| failed("attention_mask tensor", &e))?;
        let type_ref = TensorRef::from_array_view(&type_array)
            .map_err(|e| failed("token_type_ids tensor", &e))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| VulwebError::Search(format!("Session lock poisoned: {}", e)))?;
        let outputs = session
            .run(ort::inputs![ids_ref, mask_ref, type_ref])
            .map_err(|e| failed("ONNX inference", &e))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| failed("Extract embeddings", &e))?;

        let hidden_dim = match shape.iter().copied().collect::<Vec<i64>>().as_slice() {
            [.., _, last] if *last > 0 => *last as usize,
            other => {
                return Err(VulwebError::Search(format!(
                    "Unexpected output shape: {:?}",
                    other
                )))
            }
        };

        Ok(mean_pool(data, &attention_mask, hidden_dim))
    }
}

impl EmbeddingService for OnnxEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, VulwebError> {
        // CPU-bound inference runs on the blocking pool.
        let svc = OnnxEmbeddingService {
            session: Arc::clone(&self.session),
            tokenizer: Arc::clone(&self.tokenizer),
            dimensions: self.dimensions,
        };
        let text = text.to_string();

        tokio::task::spawn_blocking(move || svc.embed_sync(&text))
            .await
            .map_err(|e| VulwebError::Search(format!("Embedding task panicked: {}", e)))?
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Masked mean pooling over `[seq_len, hidden_dim]` token vectors,
/// followed by L2 normalisation.
fn mean_pool(data: &[f32], attention_mask: &[i64], hidden_dim: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden_dim];
    let mut count = 0.0f32;

    for (tok_idx, &mask) in attention_mask.iter().enumerate() {
        if mask == 0 {
            continue;
        }
        let offset = tok_idx * hidden_dim;
        if offset + hidden_dim > data.len() {
            break;
        }
        for (acc, v) in pooled.iter_mut().zip(&data[offset..offset + hidden_dim]) {
            *acc += v;
        }
        count += 1.0;
    }

    if count > 0.0 {
        pooled.iter_mut().for_each(|v| *v /= count);
    }
    normalize(&mut pooled);
    pooled
}

fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

// ---------------------------------------------------------------------------
// MockEmbedding
// ---------------------------------------------------------------------------

/// Deterministic bag-of-words embedding for tests and model-less setups.
///
/// Each lowercase whitespace token is hashed into one of `dimensions`
/// buckets; the bucket counts are L2-normalised.
#[derive(Debug, Clone)]
pub struct MockEmbedding {
    dimensions: usize,
}

impl MockEmbedding {
    pub fn new() -> Self {
        Self { dimensions: 384 }
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn bucket(&self, token: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        (hasher.finish() % self.dimensions as u64) as usize
    }
}

impl Default for MockEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingService for MockEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, VulwebError> {
        if text.trim().is_empty() {
            return Err(VulwebError::Search("Cannot embed empty text".to_string()));
        }
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text.to_lowercase().split_whitespace() {
            vector[self.bucket(token)] += 1.0;
        }
        normalize(&mut vector);
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_embedding_dimension() {
        let service = MockEmbedding::new();
        let vec = service.embed("hello world").await.unwrap();
        assert_eq!(vec.len(), 384);
    }

    #[tokio::test]
    async fn test_mock_embedding_deterministic() {
        let service = MockEmbedding::new();
        let v1 = service.embed("same text").await.unwrap();
        let v2 = service.embed("same text").await.unwrap();
        assert_eq!(v1, v2);
    }

    #[tokio::test]
    async fn test_mock_embedding_case_insensitive() {
        let service = MockEmbedding::new();
        let v1 = service.embed("Model Upload").await.unwrap();
        let v2 = service.embed("model upload").await.unwrap();
        assert_eq!(v1, v2);
    }

    #[tokio::test]
    async fn test_mock_embedding_unit_norm() {
        let service = MockEmbedding::new();
        let vec = service.embed("training a model on a dataset").await.unwrap();
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_mock_embedding_blank_text_is_error() {
        let service = MockEmbedding::new();
        assert!(service.embed("").await.is_err());
        assert!(service.embed("   ").await.is_err());
    }

    #[tokio::test]
    async fn test_dyn_embedding_dispatch() {
        let service: Arc<dyn DynEmbeddingService> = Arc::new(MockEmbedding::with_dimensions(16));
        let vec = service.embed_boxed("dyn call").await.unwrap();
        assert_eq!(vec.len(), 16);
        assert_eq!(service.dimensions(), 16);
    }

    #[test]
    fn test_mean_pool_respects_mask() {
        // Two tokens of dim 2; the second is masked out.
        let data = [3.0, 4.0, 100.0, 100.0];
        let pooled = mean_pool(&data, &[1, 0], 2);
        assert!((pooled[0] - 0.6).abs() < 1e-6);
        assert!((pooled[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_mean_pool_all_masked_is_zero() {
        let pooled = mean_pool(&[1.0, 2.0], &[0], 2);
        assert_eq!(pooled, vec![0.0, 0.0]);
    }

    #[test]
    fn test_onnx_missing_model_is_dependency_unavailable() {
        let result = OnnxEmbeddingService::from_directory(Path::new("/nonexistent"));
        assert!(matches!(
            result,
            Err(VulwebError::DependencyUnavailable(_))
        ));
    }
}
