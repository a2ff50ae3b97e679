//! Search backend adapter.
//!
//! Defines the [`SearchBackend`] capability trait and the concrete
//! [`WeaviateBackend`] implementation that speaks the Weaviate GraphQL and
//! REST APIs over HTTP.
//!
//! The trait covers two capability groups:
//! - **Query** — `near_text`, `ask`, `generate`, `class_exists`, used by
//!   the resolution pipeline. Any call may fail with a [`BackendError`];
//!   callers tolerate individual failures without aborting.
//! - **Admin** — `delete_class`, `create_class`, `get_schema`,
//!   `insert_objects`, used by the schema setup/seed operations.
//!
//! The backend client is constructed once from immutable configuration and
//! shared read-only across concurrent resolution runs — there is no
//! ambient singleton and no per-run adapter state.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

use crate::config::SearchConfig;
use crate::error::BackendError;
use crate::models::RawHit;

/// Result of an extractive question-answering query.
#[derive(Debug, Clone, PartialEq)]
pub struct AskResult {
    pub has_answer: bool,
    pub result: Option<String>,
}

/// Result of a generative completion query.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateResult {
    pub single_result: Option<String>,
}

/// Capability interface of a multi-collection semantic search service.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`near_text`](SearchBackend::near_text) | Top-K nearest-neighbor search over a collection |
/// | [`ask`](SearchBackend::ask) | Extractive QA over a collection's text field |
/// | [`generate`](SearchBackend::generate) | Generative completion conditioned on retrieved context |
/// | [`class_exists`](SearchBackend::class_exists) | Whether a collection is defined |
/// | [`delete_class`](SearchBackend::delete_class) | Drop a collection (missing is not an error) |
/// | [`create_class`](SearchBackend::create_class) | Create a collection from a definition |
/// | [`get_schema`](SearchBackend::get_schema) | Full schema description |
/// | [`insert_objects`](SearchBackend::insert_objects) | Batch-insert objects |
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Nearest-neighbor search, ordered by descending certainty as
    /// reported by the backend.
    async fn near_text(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RawHit>, BackendError>;

    /// Extractive question answering over `property` of the collection.
    async fn ask(
        &self,
        collection: &str,
        question: &str,
        property: &str,
    ) -> Result<AskResult, BackendError>;

    /// Generative completion conditioned on the best-matching record.
    async fn generate(
        &self,
        collection: &str,
        query: &str,
        prompt: &str,
    ) -> Result<GenerateResult, BackendError>;

    /// Whether the named collection exists in the schema.
    async fn class_exists(&self, collection: &str) -> Result<bool, BackendError>;

    /// Delete a collection. Deleting a missing collection succeeds.
    async fn delete_class(&self, collection: &str) -> Result<(), BackendError>;

    /// Create a collection from a schema definition object.
    async fn create_class(&self, definition: &Value) -> Result<(), BackendError>;

    /// Fetch the full schema description.
    async fn get_schema(&self) -> Result<Value, BackendError>;

    /// Batch-insert objects (each carrying its own `class` field).
    async fn insert_objects(&self, objects: &[Value]) -> Result<(), BackendError>;
}

/// Weaviate implementation of [`SearchBackend`].
///
/// Queries go through `POST /v1/graphql`; schema operations through the
/// `/v1/schema` REST endpoints; batch inserts through
/// `POST /v1/batch/objects`. API keys are read from the environment at
/// construction time (`WEAVIATE_API_KEY`, `HUGGINGFACE_API_KEY`,
/// `OPENAI_API_KEY`) and attached as default headers; any that are unset
/// are simply omitted.
pub struct WeaviateBackend {
    client: reqwest::Client,
    base_url: String,
}

impl WeaviateBackend {
    /// Build a backend client from immutable configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured URL is empty, an API key from
    /// the environment is not a valid header value, or the HTTP client
    /// cannot be constructed.
    pub fn new(config: &SearchConfig) -> anyhow::Result<Self> {
        if config.url.trim().is_empty() {
            anyhow::bail!("search.url must be configured");
        }

        let mut headers = reqwest::header::HeaderMap::new();
        if let Ok(key) = std::env::var("WEAVIATE_API_KEY") {
            headers.insert(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", key).parse()?,
            );
        }
        if let Ok(key) = std::env::var("HUGGINGFACE_API_KEY") {
            headers.insert("X-HuggingFace-Api-Key", key.parse()?);
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            headers.insert("X-OpenAI-Api-Key", key.parse()?);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    /// Execute a GraphQL query and return the response body.
    ///
    /// GraphQL-level errors (HTTP 200 with an `errors` array) are mapped
    /// to [`BackendError::Unavailable`] so callers treat them like any
    /// other failed call.
    async fn graphql(&self, query: String) -> Result<Value, BackendError> {
        let resp = self
            .client
            .post(format!("{}/v1/graphql", self.base_url))
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await?;
        let resp = check_status(resp).await?;

        let body: Value = resp
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;

        if let Some(errors) = body.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                let message = errors
                    .iter()
                    .filter_map(|e| e.get("message").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(BackendError::Unavailable(format!(
                    "graphql error: {}",
                    message
                )));
            }
        }

        Ok(body)
    }

    fn schema_url(&self, collection: &str) -> String {
        format!("{}/v1/schema/{}", self.base_url, collection)
    }
}

#[async_trait]
impl SearchBackend for WeaviateBackend {
    async fn near_text(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RawHit>, BackendError> {
        let body = self.graphql(near_text_query(collection, query, limit)).await?;
        Ok(parse_hits(collection, &body))
    }

    async fn ask(
        &self,
        collection: &str,
        question: &str,
        property: &str,
    ) -> Result<AskResult, BackendError> {
        let body = self.graphql(ask_query(collection, question, property)).await?;
        Ok(parse_ask(collection, &body))
    }

    async fn generate(
        &self,
        collection: &str,
        query: &str,
        prompt: &str,
    ) -> Result<GenerateResult, BackendError> {
        let body = self.graphql(generate_query(collection, query, prompt)).await?;
        Ok(parse_generate(collection, &body))
    }

    async fn class_exists(&self, collection: &str) -> Result<bool, BackendError> {
        let resp = self.client.get(self.schema_url(collection)).send().await?;
        let status = resp.status();
        if status.is_success() {
            Ok(true)
        } else if status == StatusCode::NOT_FOUND {
            Ok(false)
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(BackendError::Unavailable(format!(
                "HTTP {}: {}",
                status, body
            )))
        }
    }

    async fn delete_class(&self, collection: &str) -> Result<(), BackendError> {
        let resp = self
            .client
            .delete(self.schema_url(collection))
            .send()
            .await?;
        // A collection that was never created is already in the desired state.
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(resp).await?;
        Ok(())
    }

    async fn create_class(&self, definition: &Value) -> Result<(), BackendError> {
        let resp = self
            .client
            .post(format!("{}/v1/schema", self.base_url))
            .json(definition)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn get_schema(&self) -> Result<Value, BackendError> {
        let resp = self
            .client
            .get(format!("{}/v1/schema", self.base_url))
            .send()
            .await?;
        let resp = check_status(resp).await?;
        resp.json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))
    }

    async fn insert_objects(&self, objects: &[Value]) -> Result<(), BackendError> {
        let resp = self
            .client
            .post(format!("{}/v1/batch/objects", self.base_url))
            .json(&serde_json::json!({ "objects": objects }))
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }
}

/// Map a non-success HTTP status to [`BackendError::Unavailable`],
/// carrying the response body for the logs.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(BackendError::Unavailable(format!("HTTP {}: {}", status, body)))
}

/// Render text as a GraphQL string literal (JSON escaping rules apply).
fn graphql_string(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}

fn near_text_query(collection: &str, concept: &str, limit: usize) -> String {
    format!(
        "{{ Get {{ {collection}(limit: {limit}, nearText: {{concepts: [{concept}]}}) \
         {{ question answer _additional {{ certainty distance }} }} }} }}",
        collection = collection,
        limit = limit,
        concept = graphql_string(concept),
    )
}

fn ask_query(collection: &str, question: &str, property: &str) -> String {
    format!(
        "{{ Get {{ {collection}(limit: 1, ask: {{question: {question}, properties: [{property}]}}) \
         {{ question answer _additional {{ answer {{ hasAnswer result }} }} }} }} }}",
        collection = collection,
        question = graphql_string(question),
        property = graphql_string(property),
    )
}

fn generate_query(collection: &str, concept: &str, prompt: &str) -> String {
    format!(
        "{{ Get {{ {collection}(limit: 1, nearText: {{concepts: [{concept}]}}) \
         {{ question answer _additional {{ generate(singleResult: {{prompt: {prompt}}}) \
         {{ singleResult }} }} }} }} }}",
        collection = collection,
        concept = graphql_string(concept),
        prompt = graphql_string(prompt),
    )
}

/// The objects array for a collection inside a `Get` response, or an
/// empty slice when the class key is absent.
fn class_objects<'a>(body: &'a Value, collection: &str) -> &'a [Value] {
    body.pointer(&format!("/data/Get/{}", collection))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Parse nearest-neighbor hits, keeping every field optional.
///
/// Completeness checks are the Reconciler's job, not the adapter's.
fn parse_hits(collection: &str, body: &Value) -> Vec<RawHit> {
    class_objects(body, collection)
        .iter()
        .map(|obj| RawHit {
            collection: collection.to_string(),
            question: obj.get("question").and_then(Value::as_str).map(str::to_owned),
            answer: obj.get("answer").and_then(Value::as_str).map(str::to_owned),
            certainty: obj.pointer("/_additional/certainty").and_then(Value::as_f64),
            distance: obj.pointer("/_additional/distance").and_then(Value::as_f64),
        })
        .collect()
}

fn parse_ask(collection: &str, body: &Value) -> AskResult {
    match class_objects(body, collection)
        .first()
        .and_then(|obj| obj.pointer("/_additional/answer"))
    {
        Some(answer) => AskResult {
            has_answer: answer
                .get("hasAnswer")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            result: answer.get("result").and_then(Value::as_str).map(str::to_owned),
        },
        None => AskResult {
            has_answer: false,
            result: None,
        },
    }
}

fn parse_generate(collection: &str, body: &Value) -> GenerateResult {
    GenerateResult {
        single_result: class_objects(body, collection)
            .first()
            .and_then(|obj| obj.pointer("/_additional/generate/singleResult"))
            .and_then(Value::as_str)
            .map(str::to_owned),
    }
}
