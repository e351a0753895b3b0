// Embeddings module
// Chunking plus the embedding capability boundary and its Gemini implementation

pub mod chunking;
pub mod gemini;

pub use chunking::{ChunkingConfig, chunk_text};
pub use gemini::GeminiClient;

use async_trait::async_trait;

use crate::Result;

/// Batch embedding capability.
///
/// Implementations must return exactly one vector per input text, in input
/// order, all of the same dimension. The store never retries a failed call;
/// any retry policy lives inside the implementation.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
