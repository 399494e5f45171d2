//! Text embeddings used by document retrieval.

mod openai;

pub use openai::OpenAIEmbedder;

use crate::error::{HuddleError, Result};
use async_trait::async_trait;

/// Turns text into fixed-size vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed several texts, one vector per input in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Length of every vector this embedder returns.
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| HuddleError::Embedding("Empty embedding response".to_string()))
    }
}
