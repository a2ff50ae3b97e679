use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::ModelFamily;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub search: SearchConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub seed: SeedConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Connection settings for the semantic search backend.
#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Base URL of the backend, e.g. `https://my-cluster.weaviate.network`.
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_timeout_secs() -> u64 {
    15
}
fn default_max_retries() -> u32 {
    5
}

/// Tunables of the answer-resolution pipeline.
#[derive(Debug, Deserialize, Clone)]
pub struct ResolverConfig {
    /// Which model family's collections to query.
    #[serde(default = "default_model")]
    pub model: ModelFamily,
    /// A semantic hit must score strictly above this to be accepted
    /// without consulting the fallback chain.
    #[serde(default = "default_certainty_threshold")]
    pub certainty_threshold: f64,
    /// Prompt for the generative fallback stage. `{question}` is filled
    /// in locally; `{answer}` is filled in by the backend from the
    /// best-matching record.
    #[serde(default = "default_generative_prompt")]
    pub generative_prompt: String,
    /// Canned answer used when every stage declines.
    #[serde(default = "default_fallback_answer")]
    pub fallback_answer: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            certainty_threshold: default_certainty_threshold(),
            generative_prompt: default_generative_prompt(),
            fallback_answer: default_fallback_answer(),
        }
    }
}

fn default_model() -> ModelFamily {
    ModelFamily::HuggingFace
}
fn default_certainty_threshold() -> f64 {
    0.7
}
fn default_generative_prompt() -> String {
    "Use <{answer}> to try to answer <{question}>. \
     The response should be a single sentence, friendly and casual."
        .to_string()
}
fn default_fallback_answer() -> String {
    "Sorry, I can't help you with that. Try asking me something else.".to_string()
}

/// Settings for the FAQ dataset seeding flow.
#[derive(Debug, Deserialize, Clone)]
pub struct SeedConfig {
    /// URL of a hosted JSON array of `{Question, Answer}` pairs.
    #[serde(default)]
    pub faq_url: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            faq_url: String::new(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_batch_size() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate search
    if config.search.url.trim().is_empty() {
        anyhow::bail!("search.url must be set");
    }
    if config.search.timeout_secs == 0 {
        anyhow::bail!("search.timeout_secs must be > 0");
    }

    // Validate resolver
    if !(0.0..=1.0).contains(&config.resolver.certainty_threshold) {
        anyhow::bail!("resolver.certainty_threshold must be in [0.0, 1.0]");
    }
    if config.resolver.fallback_answer.trim().is_empty() {
        anyhow::bail!("resolver.fallback_answer must not be empty");
    }

    // Validate seed
    if config.seed.batch_size == 0 {
        anyhow::bail!("seed.batch_size must be >= 1");
    }

    Ok(config)
}
