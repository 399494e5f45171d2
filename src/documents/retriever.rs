//! Query-by-text over a document store.

use super::{Document, DocumentStore, MemoryDocumentStore, SearchResult, SqliteDocumentStore};
use crate::config::Settings;
use crate::embedding::Embedder;
use crate::error::{HuddleError, Result};
use serde_json::{json, Map};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

/// Open the store configured in `[documents]`.
pub fn open_store(settings: &Settings) -> Result<Arc<dyn DocumentStore>> {
    match settings.documents.provider.as_str() {
        "sqlite" => Ok(Arc::new(SqliteDocumentStore::new(&settings.sqlite_path())?)),
        "memory" => Ok(Arc::new(MemoryDocumentStore::new())),
        other => Err(HuddleError::Config(format!(
            "Unknown document store provider: {}",
            other
        ))),
    }
}

/// Embeds text and searches or fills a [`DocumentStore`].
pub struct Retriever {
    store: Arc<dyn DocumentStore>,
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    pub fn new(store: Arc<dyn DocumentStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// The `limit` best matches for `query` in `collection`.
    #[instrument(skip(self))]
    pub async fn retrieve(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let embedding = self.embedder.embed(query).await?;
        self.store.search(collection, &embedding, limit).await
    }

    /// Add each non-empty line of `text` as a document tagged `{"line": n}`,
    /// where `n` is the zero-based line number in `text`.
    #[instrument(skip(self, text))]
    pub async fn ingest_lines(&self, collection: &str, text: &str) -> Result<usize> {
        let lines: Vec<(usize, String)> = text
            .lines()
            .map(str::trim_end)
            .enumerate()
            .filter(|(_, line)| !line.is_empty())
            .map(|(n, line)| (n, line.to_string()))
            .collect();

        if lines.is_empty() {
            return Ok(0);
        }

        let contents: Vec<String> = lines.iter().map(|(_, l)| l.clone()).collect();
        let embeddings = self.embedder.embed_batch(&contents).await?;
        if embeddings.len() != lines.len() {
            return Err(HuddleError::Embedding(format!(
                "Expected {} embeddings, got {}",
                lines.len(),
                embeddings.len()
            )));
        }

        let docs: Vec<Document> = lines
            .into_iter()
            .zip(embeddings)
            .map(|((n, content), embedding)| {
                let mut metadata = Map::new();
                metadata.insert("line".to_string(), json!(n));
                Document::new(collection, content, metadata, embedding)
            })
            .collect();

        let stored = self.store.add(&docs).await?;
        info!("Ingested {} lines into {}", stored, collection);
        Ok(stored)
    }

    /// Ingest a text file line by line.
    pub async fn ingest_file(&self, collection: &str, path: &Path) -> Result<usize> {
        let text = tokio::fs::read_to_string(path).await?;
        self.ingest_lines(collection, &text).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::embedding::Embedder;
    use async_trait::async_trait;

    /// Embeds text as keyword hits so rankings are predictable.
    pub(crate) struct KeywordEmbedder {
        pub keywords: Vec<&'static str>,
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let lower = text.to_lowercase();
            Ok(self
                .keywords
                .iter()
                .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
                .collect())
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }

        fn dimensions(&self) -> usize {
            self.keywords.len()
        }
    }

    pub(crate) fn policy_retriever() -> Retriever {
        Retriever::new(
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(KeywordEmbedder {
                keywords: vec!["hr", "smoking", "vacation"],
            }),
        )
    }

    #[tokio::test]
    async fn test_ingest_tags_line_numbers() {
        let retriever = policy_retriever();
        let stored = retriever
            .ingest_lines(
                "policies",
                "HR policy: be kind\n\nSmoking policy: outside only\nVacation policy: 20 days\n",
            )
            .await
            .unwrap();
        assert_eq!(stored, 3);

        let results = retriever
            .retrieve("policies", "what is the smoking policy?", 1)
            .await
            .unwrap();
        assert_eq!(results[0].document.content, "Smoking policy: outside only");
        assert_eq!(results[0].document.metadata["line"], 2);
    }

    #[tokio::test]
    async fn test_empty_input_stores_nothing() {
        let retriever = policy_retriever();
        assert_eq!(retriever.ingest_lines("policies", "\n\n").await.unwrap(), 0);
        assert!(!retriever.store().collection_exists("policies").await.unwrap());
    }
}
