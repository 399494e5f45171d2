use super::parse_call;
use crate::dispatch::{Arguments, Metadata, Tool};
use crate::documents::Retriever;
use crate::error::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
enum RetrieveCall {
    Retrieve { query: String },
}

/// Searches one document collection by text.
pub struct RetrieveTool {
    retriever: Arc<Retriever>,
    collection: String,
    limit: usize,
}

impl RetrieveTool {
    pub fn new(retriever: Arc<Retriever>, collection: &str, limit: usize) -> Self {
        Self {
            retriever,
            collection: collection.to_string(),
            limit,
        }
    }
}

#[async_trait]
impl<D: Send + Sync + 'static> Tool<D> for RetrieveTool {
    fn name(&self) -> &str {
        "retrieve"
    }

    fn description(&self) -> &str {
        "Retrieve documents from the collection"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "query": { "type": "string", "description": "What to look for" } },
            "required": ["query"]
        })
    }

    async fn call(&self, args: Arguments, _meta: &Metadata<D>) -> Result<Value> {
        let RetrieveCall::Retrieve { query } = parse_call("retrieve", args)?;

        if !self.retriever.store().collection_exists(&self.collection).await? {
            return Ok(Value::String("Collection not found".to_string()));
        }

        let results = self
            .retriever
            .retrieve(&self.collection, &query, self.limit)
            .await?;

        let documents: Vec<Value> = results
            .into_iter()
            .map(|r| {
                json!({
                    "content": r.document.content,
                    "metadata": r.document.metadata,
                    "score": r.score,
                })
            })
            .collect();

        Ok(json!({ "query": query, "documents": documents }))
    }
}
