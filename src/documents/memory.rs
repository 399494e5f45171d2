//! In-memory document store.
//!
//! Useful for testing and small datasets.

use super::{rank, CollectionInfo, Document, DocumentStore, SearchResult};
use crate::error::{HuddleError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory document store.
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Vec<Document>>>> {
        self.documents
            .read()
            .map_err(|e| HuddleError::DocumentStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Vec<Document>>>> {
        self.documents
            .write()
            .map_err(|e| HuddleError::DocumentStore(format!("Failed to acquire lock: {}", e)))
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn add(&self, docs: &[Document]) -> Result<usize> {
        let mut store = self.write()?;
        for doc in docs {
            store
                .entry(doc.collection.clone())
                .or_default()
                .push(doc.clone());
        }
        Ok(docs.len())
    }

    async fn search(
        &self,
        collection: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let store = self.read()?;
        let docs = store.get(collection).cloned().unwrap_or_default();
        Ok(rank(docs, query_embedding, limit))
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        Ok(self.read()?.get(collection).is_some_and(|d| !d.is_empty()))
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let store = self.read()?;
        let mut collections: Vec<CollectionInfo> = store
            .iter()
            .filter_map(|(name, docs)| {
                let last = docs.iter().map(|d| d.indexed_at).max()?;
                Some(CollectionInfo {
                    name: name.clone(),
                    document_count: docs.len(),
                    last_indexed_at: last,
                })
            })
            .collect();
        collections.sort_by(|a, b| b.last_indexed_at.cmp(&a.last_indexed_at));
        Ok(collections)
    }

    async fn delete_collection(&self, collection: &str) -> Result<usize> {
        Ok(self
            .write()?
            .remove(collection)
            .map(|docs| docs.len())
            .unwrap_or(0))
    }

    async fn document_count(&self, collection: &str) -> Result<usize> {
        Ok(self.read()?.get(collection).map(Vec::len).unwrap_or(0))
    }
}
