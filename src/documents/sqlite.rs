//! SQLite-based document store.
//!
//! Embeddings are stored as little-endian `f32` blobs and scored in Rust.

use super::{rank, CollectionInfo, Document, DocumentStore, SearchResult};
use crate::error::{HuddleError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        collection TEXT NOT NULL,
        content TEXT NOT NULL,
        metadata_json TEXT NOT NULL,
        embedding BLOB NOT NULL,
        indexed_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
"#;

/// SQLite-based document store.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    /// Open (or create) a store at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Opened SQLite document store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| HuddleError::DocumentStore(format!("Failed to acquire lock: {}", e)))
    }

    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn parse_time(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
        let id_str: String = row.get(0)?;
        let metadata_json: String = row.get(3)?;
        let embedding_bytes: Vec<u8> = row.get(4)?;
        let indexed_at: String = row.get(5)?;

        Ok(Document {
            id: uuid::Uuid::parse_str(&id_str).unwrap_or_default(),
            collection: row.get(1)?,
            content: row.get(2)?,
            metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
            embedding: Self::bytes_to_embedding(&embedding_bytes),
            indexed_at: Self::parse_time(&indexed_at),
        })
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    #[instrument(skip(self, docs), fields(count = docs.len()))]
    async fn add(&self, docs: &[Document]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        for doc in docs {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO documents
                (id, collection, content, metadata_json, embedding, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    doc.id.to_string(),
                    doc.collection,
                    doc.content,
                    serde_json::to_string(&doc.metadata)?,
                    Self::embedding_to_bytes(&doc.embedding),
                    doc.indexed_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        info!("Stored {} documents", docs.len());
        Ok(docs.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn search(
        &self,
        collection: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, collection, content, metadata_json, embedding, indexed_at
            FROM documents
            WHERE collection = ?1
            "#,
        )?;

        let docs: Vec<Document> = stmt
            .query_map(params![collection], Self::row_to_document)?
            .filter_map(|d| d.ok())
            .collect();

        let results = rank(docs, query_embedding, limit);
        debug!("Found {} matching documents", results.len());
        Ok(results)
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        Ok(self.document_count(collection).await? > 0)
    }

    #[instrument(skip(self))]
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT collection, COUNT(*) as document_count, MAX(indexed_at) as last_indexed_at
            FROM documents
            GROUP BY collection
            ORDER BY last_indexed_at DESC
            "#,
        )?;

        let collections = stmt.query_map([], |row| {
            let count: i64 = row.get(1)?;
            let last: String = row.get(2)?;
            Ok(CollectionInfo {
                name: row.get(0)?,
                document_count: count as usize,
                last_indexed_at: Self::parse_time(&last),
            })
        })?;

        Ok(collections.filter_map(|c| c.ok()).collect())
    }

    #[instrument(skip(self))]
    async fn delete_collection(&self, collection: &str) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM documents WHERE collection = ?1",
            params![collection],
        )?;
        info!("Deleted {} documents from {}", deleted, collection);
        Ok(deleted)
    }

    async fn document_count(&self, collection: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};
    use tempfile::tempdir;

    fn meta(line: usize) -> Map<String, serde_json::Value> {
        let mut m = Map::new();
        m.insert("line".to_string(), json!(line));
        m
    }

    #[tokio::test]
    async fn test_sqlite_document_store() {
        let store = SqliteDocumentStore::in_memory().unwrap();

        store
            .add(&[
                Document::new("policies", "HR policy".into(), meta(0), vec![1.0, 0.0, 0.0]),
                Document::new("policies", "Smoking policy".into(), meta(1), vec![0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();

        let results = store.search("policies", &[0.0, 1.0, 0.0], 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.content, "Smoking policy");
        assert_eq!(results[0].document.metadata["line"], 1);
        assert!((results[0].score - 1.0).abs() < 0.001);

        assert!(store.search("missing", &[1.0, 0.0, 0.0], 5).await.unwrap().is_empty());

        let collections = store.list_collections().await.unwrap();
        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].document_count, 2);

        assert_eq!(store.delete_collection("policies").await.unwrap(), 2);
        assert!(!store.collection_exists("policies").await.unwrap());
    }

    #[tokio::test]
    async fn test_sqlite_store_persists_between_opens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docs").join("documents.db");

        {
            let store = SqliteDocumentStore::new(&path).unwrap();
            store
                .add(&[Document::new("policies", "Persisted".into(), meta(0), vec![0.5, 0.5])])
                .await
                .unwrap();
        }

        let reopened = SqliteDocumentStore::new(&path).unwrap();
        assert_eq!(reopened.document_count("policies").await.unwrap(), 1);
    }
}
