//! Document ingest and retrieval commands.

use crate::cli::Output;
use crate::config::Settings;
use crate::documents::{open_store, Retriever};
use crate::embedding::OpenAIEmbedder;
use anyhow::Result;
use std::sync::Arc;

fn retriever(settings: &Settings) -> Result<Retriever> {
    let embedder = OpenAIEmbedder::from_settings(&settings.embedding)?;
    Ok(Retriever::new(open_store(settings)?, Arc::new(embedder)))
}

/// Index a text file into a collection.
pub async fn run_ingest(
    file: &str,
    collection: Option<String>,
    replace: bool,
    settings: Settings,
) -> Result<()> {
    let path = Settings::expand_path(file);
    if !path.is_file() {
        anyhow::bail!("No such file: {}", path.display());
    }

    let collection = collection.unwrap_or_else(|| settings.documents.collection.clone());
    let retriever = retriever(&settings)?;

    if replace {
        let removed = retriever.store().delete_collection(&collection).await?;
        if removed > 0 {
            Output::info(&format!("Removed {} documents from {}", removed, collection));
        }
    }

    let spinner = Output::spinner(&format!("Embedding {}...", path.display()));
    let added = retriever.ingest_file(&collection, &path).await;
    spinner.finish_and_clear();

    let added = added?;
    let total = retriever.store().document_count(&collection).await?;
    Output::success(&format!(
        "Indexed {} documents into {} ({} total)",
        added, collection, total
    ));

    Ok(())
}

/// Search a collection and print the ranked documents.
pub async fn run_retrieve(
    query: &str,
    collection: Option<String>,
    limit: Option<usize>,
    settings: Settings,
) -> Result<()> {
    let collection = collection.unwrap_or_else(|| settings.documents.collection.clone());
    let limit = limit.unwrap_or(settings.documents.max_results);
    let retriever = retriever(&settings)?;

    if !retriever.store().collection_exists(&collection).await? {
        Output::warning("Collection not found");
        let known = retriever.store().list_collections().await?;
        if !known.is_empty() {
            Output::header("Collections");
            for info in known {
                Output::kv(&info.name, &format!("{} documents", info.document_count));
            }
        }
        return Ok(());
    }

    let results = retriever.retrieve(&collection, query, limit).await?;
    if results.is_empty() {
        Output::info("No matching documents.");
        return Ok(());
    }

    Output::header(&format!("Results from {}", collection));
    for (i, result) in results.iter().enumerate() {
        Output::retrieval_hit(i + 1, result.score, &result.document.content);
    }
    println!();

    Ok(())
}
