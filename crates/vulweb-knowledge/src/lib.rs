//! VulWeb knowledge crate - corpus loading, keyword and vector retrieval.
//!
//! [`KnowledgeStore`] answers top-k queries from the vector tier when an
//! embedding model is available and from the keyword tier otherwise.

pub mod corpus;
pub mod embedding;
pub mod index;
pub mod keyword;
pub mod store;

pub use corpus::CorpusSource;
pub use embedding::{DynEmbeddingService, EmbeddingService, MockEmbedding, OnnxEmbeddingService};
pub use index::{SearchHit, VectorIndex};
pub use keyword::KeywordIndex;
pub use store::{ActiveTier, EmbedderLoader, KnowledgeStore, StoreStatus, VectorSettings};
