//! Document collections for retrieval.
//!
//! Text documents are grouped into named collections and searched by
//! embedding similarity. Backends implement [`DocumentStore`].

mod memory;
mod retriever;
mod sqlite;

pub use memory::MemoryDocumentStore;
pub use retriever::{open_store, Retriever};
pub use sqlite::SqliteDocumentStore;

#[cfg(test)]
pub(crate) use retriever::tests::policy_retriever;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A document stored in a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub collection: String,
    pub content: String,
    /// Free-form metadata, e.g. `{"line": 3}` for ingested files.
    pub metadata: Map<String, Value>,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub indexed_at: DateTime<Utc>,
}

impl Document {
    /// Create a new document.
    pub fn new(
        collection: &str,
        content: String,
        metadata: Map<String, Value>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            collection: collection.to_string(),
            content,
            metadata,
            embedding,
            indexed_at: Utc::now(),
        }
    }
}

/// A search result with score.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub document: Document,
    /// Cosine similarity, higher is better.
    pub score: f32,
}

/// Summary of one collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub document_count: usize,
    pub last_indexed_at: DateTime<Utc>,
}

/// Trait for document store implementations.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Add documents, returning how many were stored.
    async fn add(&self, docs: &[Document]) -> Result<usize>;

    /// Rank a collection's documents against a query embedding.
    async fn search(
        &self,
        collection: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Whether a collection holds any documents.
    async fn collection_exists(&self, collection: &str) -> Result<bool>;

    /// All collections, most recently indexed first.
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>>;

    /// Delete a collection, returning the number of removed documents.
    async fn delete_collection(&self, collection: &str) -> Result<usize>;

    /// Number of documents in a collection.
    async fn document_count(&self, collection: &str) -> Result<usize>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Score, sort descending and truncate.
pub(crate) fn rank<I>(docs: I, query_embedding: &[f32], limit: usize) -> Vec<SearchResult>
where
    I: IntoIterator<Item = Document>,
{
    let mut results: Vec<SearchResult> = docs
        .into_iter()
        .map(|doc| {
            let score = cosine_similarity(query_embedding, &doc.embedding);
            SearchResult {
                document: doc,
                score,
            }
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(limit);
    results
}
