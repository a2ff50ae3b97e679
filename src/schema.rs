//! Schema administration: rebuild the search collections and seed them
//! from the hosted FAQ dataset.
//!
//! Both operations return a typed [`SchemaFailure`] value instead of
//! bubbling errors, so the admin surface can show `reason` to the
//! operator directly.

use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

use crate::backend::SearchBackend;
use crate::config::Config;
use crate::error::SchemaFailure;
use crate::models::{ModelFamily, QandA};

/// Summary of a completed seeding run.
#[derive(Debug, Clone, Serialize)]
pub struct SeedReport {
    pub classes: Vec<String>,
    pub objects: usize,
    pub batches: usize,
}

/// Delete and recreate the family's collections with family-specific
/// vectorizer configuration, returning the resulting schema description.
///
/// Only the chosen family's two collections are touched; a collection
/// that does not exist yet is simply skipped by the delete step.
pub async fn setup_schema(
    backend: &dyn SearchBackend,
    family: ModelFamily,
) -> Result<Value, SchemaFailure> {
    for class in family.classes() {
        if let Err(err) = backend.delete_class(class).await {
            return Err(SchemaFailure::fail(format!(
                "failed to delete collection {}: {}",
                class, err
            )));
        }
    }

    for definition in class_definitions(family) {
        let name = definition
            .get("class")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if let Err(err) = backend.create_class(&definition).await {
            return Err(SchemaFailure::fail(format!(
                "failed to create collection {}: {}",
                name, err
            )));
        }
        info!(collection = %name, "collection created");
    }

    backend
        .get_schema()
        .await
        .map_err(|err| SchemaFailure::fail(format!("failed to get schema: {}", err)))
}

/// Fetch the hosted FAQ dataset and batch-insert each pair into both of
/// the family's collections.
pub async fn seed_schema(
    backend: &dyn SearchBackend,
    config: &Config,
    family: ModelFamily,
) -> Result<SeedReport, SchemaFailure> {
    if config.seed.faq_url.trim().is_empty() {
        return Err(SchemaFailure::fail("seed.faq_url is not configured"));
    }

    let pairs = fetch_faq_pairs(&config.seed.faq_url, config.search.timeout_secs).await?;
    info!(pairs = pairs.len(), "FAQ dataset fetched");

    seed_pairs(
        backend,
        &pairs,
        family,
        config.seed.batch_size,
        config.search.max_retries,
    )
    .await
}

/// Batch the pairs into both family collections and insert them.
async fn seed_pairs(
    backend: &dyn SearchBackend,
    pairs: &[QandA],
    family: ModelFamily,
    batch_size: usize,
    max_retries: u32,
) -> Result<SeedReport, SchemaFailure> {
    let classes = family.classes();
    let mut batch: Vec<Value> = Vec::with_capacity(batch_size);
    let mut objects = 0usize;
    let mut batches = 0usize;

    for pair in pairs {
        for class in classes {
            batch.push(json!({
                "class": class,
                "properties": {
                    "question": pair.question,
                    "answer": pair.answer,
                },
            }));

            if batch.len() >= batch_size {
                insert_batch(backend, &batch, max_retries).await?;
                objects += batch.len();
                batches += 1;
                batch.clear();
            }
        }
    }

    if !batch.is_empty() {
        insert_batch(backend, &batch, max_retries).await?;
        objects += batch.len();
        batches += 1;
    }

    info!(objects, batches, family = %family, "seeding complete");
    Ok(SeedReport {
        classes: classes.iter().map(|c| c.to_string()).collect(),
        objects,
        batches,
    })
}

async fn fetch_faq_pairs(url: &str, timeout_secs: u64) -> Result<Vec<QandA>, SchemaFailure> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|err| SchemaFailure::error(err.to_string()))?;

    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|err| SchemaFailure::error(format!("failed to fetch FAQ dataset: {}", err)))?;

    if !resp.status().is_success() {
        return Err(SchemaFailure::fail(format!(
            "failed to fetch FAQ dataset: HTTP {}",
            resp.status()
        )));
    }

    resp.json::<Vec<QandA>>()
        .await
        .map_err(|err| SchemaFailure::fail(format!("failed parsing data: {}", err)))
}

/// Insert one batch, retrying transient failures with exponential
/// backoff (1s, 2s, 4s, ... capped at 32s). Vectorization modules
/// rate-limit aggressively during bulk imports.
async fn insert_batch(
    backend: &dyn SearchBackend,
    batch: &[Value],
    max_retries: u32,
) -> Result<(), SchemaFailure> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        match backend.insert_objects(batch).await {
            Ok(()) => return Ok(()),
            Err(err) if err.is_transient() => {
                warn!(attempt, error = %err, "batch insert failed, retrying");
                last_err = Some(err);
            }
            Err(err) => {
                return Err(SchemaFailure::fail(format!("batch insert failed: {}", err)));
            }
        }
    }

    Err(SchemaFailure::fail(format!(
        "batch insert failed after {} retries: {}",
        max_retries,
        last_err.map(|e| e.to_string()).unwrap_or_default()
    )))
}

/// Collection definitions for one model family.
///
/// The inverted variant marks the answer property as not searchable, so
/// matches come from question similarity alone.
fn class_definitions(family: ModelFamily) -> Vec<Value> {
    let description = "Frequently asked questions with their curated answers";

    match family {
        ModelFamily::HuggingFace => {
            let module_config = json!({
                "text2vec-huggingface": {
                    "model": "sentence-transformers/all-MiniLM-L6-v2",
                    "options": { "waitForModel": true },
                },
            });
            vec![
                json!({
                    "class": "HuggingFace",
                    "vectorizer": "text2vec-huggingface",
                    "description": description,
                    "properties": [
                        { "name": "question", "dataType": ["text"], "description": "The question" },
                        { "name": "answer", "dataType": ["text"], "description": "The answer" },
                    ],
                    "moduleConfig": module_config.clone(),
                }),
                json!({
                    "class": "HuggingFaceInverted",
                    "vectorizer": "text2vec-huggingface",
                    "description": description,
                    "properties": [
                        { "name": "question", "dataType": ["text"], "description": "The question" },
                        {
                            "name": "answer",
                            "dataType": ["text"],
                            "description": "The answer",
                            "indexSearchable": false,
                        },
                    ],
                    "moduleConfig": module_config,
                }),
            ]
        }
        ModelFamily::OpenAI => vec![
            json!({
                "class": "OpenAI",
                "vectorizer": "text2vec-openai",
                "description": description,
                "properties": [
                    { "name": "question", "dataType": ["text"], "description": "The question" },
                    { "name": "answer", "dataType": ["text"], "description": "The answer" },
                ],
                "moduleConfig": {
                    "generative-openai": { "model": "gpt-3.5-turbo" },
                },
            }),
            json!({
                "class": "OpenAIInverted",
                "vectorizer": "text2vec-openai",
                "description": description,
                "properties": [
                    { "name": "question", "dataType": ["text"], "description": "The question" },
                    {
                        "name": "answer",
                        "dataType": ["text"],
                        "description": "The answer",
                        "indexSearchable": false,
                    },
                ],
                "moduleConfig": {
                    "text2vec-openai": {
                        "model": "babbage",
                        "modelVersion": "001",
                        "type": "text",
                    },
                },
            }),
        ],
    }
}
