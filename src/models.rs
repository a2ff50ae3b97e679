//! Core data models used throughout the answer-resolution pipeline.
//!
//! These types represent the questions, retrieval hits, and resolved
//! answers that flow from the HTTP surface through retrieval,
//! reconciliation, and persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which NLP backend family a collection pair belongs to.
///
/// Each family owns two collections: a primary one (searchable on both
/// the question and answer text) and an inverted one where only the
/// question text is indexed for search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelFamily {
    HuggingFace,
    OpenAI,
}

impl ModelFamily {
    /// Collection holding fully-indexed question/answer records.
    pub fn primary_class(self) -> &'static str {
        match self {
            Self::HuggingFace => "HuggingFace",
            Self::OpenAI => "OpenAI",
        }
    }

    /// Collection variant where the answer field is excluded from the
    /// search index — matches are driven by question similarity alone.
    pub fn inverted_class(self) -> &'static str {
        match self {
            Self::HuggingFace => "HuggingFaceInverted",
            Self::OpenAI => "OpenAIInverted",
        }
    }

    /// Both collections of this family, primary first.
    pub fn classes(self) -> [&'static str; 2] {
        [self.primary_class(), self.inverted_class()]
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.primary_class())
    }
}

impl FromStr for ModelFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "huggingface" | "hf" => Ok(Self::HuggingFace),
            "openai" => Ok(Self::OpenAI),
            _ => Err(format!(
                "unknown model family: '{}'. Use HuggingFace or OpenAI.",
                s
            )),
        }
    }
}

/// A user question record.
///
/// `response` and `responded_at` are owned exclusively by the resolution
/// pipeline and written at most once; every other field is immutable
/// after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(rename = "question")]
    pub text: String,
    pub asked_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,
    /// Serialized single-element answer array, absent while pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<i64>,
}

/// A hit exactly as the search backend reported it, before normalization.
///
/// Every content field is optional: the Reconciler decides which hits are
/// complete enough to keep.
#[derive(Debug, Clone)]
pub struct RawHit {
    pub collection: String,
    pub question: Option<String>,
    pub answer: Option<String>,
    pub certainty: Option<f64>,
    pub distance: Option<f64>,
}

/// A normalized retrieval hit. Ephemeral — produced per query, consumed
/// immediately by the Reconciler, never persisted.
#[derive(Debug, Clone)]
pub struct RetrievalHit {
    pub collection: String,
    pub question: String,
    pub answer: String,
    /// Backend-reported similarity in `[0, 1]`; higher is more confident.
    pub certainty: f64,
    pub distance: Option<f64>,
}

/// Which stage of the pipeline produced an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerSource {
    Semantic,
    QaExtraction,
    Generative,
    Fallback,
}

impl fmt::Display for AnswerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Semantic => "semantic",
            Self::QaExtraction => "qa-extraction",
            Self::Generative => "generative",
            Self::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

/// The single output of one resolution run.
#[derive(Debug, Clone)]
pub struct ResolvedAnswer {
    pub text: String,
    pub source: AnswerSource,
    pub certainty: Option<f64>,
}

impl ResolvedAnswer {
    /// Serialize into the stored response format: a JSON array with
    /// exactly one `{ "answer": ..., "certainty"?: ... }` object. The
    /// single-element array is kept for compatibility with the legacy
    /// multi-candidate shape clients already parse.
    pub fn encode_response(&self) -> serde_json::Result<String> {
        serde_json::to_string(&[AnswerRecord {
            answer: self.text.clone(),
            certainty: self.certainty,
        }])
    }
}

/// Wire shape of one stored answer candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certainty: Option<f64>,
}

/// Decode a stored response back into its first answer record.
///
/// Lenient by design: rendering falls back to nothing rather than
/// erroring on unparseable history.
pub fn decode_response(response: &str) -> Option<AnswerRecord> {
    serde_json::from_str::<Vec<AnswerRecord>>(response)
        .ok()
        .and_then(|records| records.into_iter().next())
}

/// One question/answer pair from the hosted FAQ dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct QandA {
    #[serde(rename = "Question")]
    pub question: String,
    #[serde(rename = "Answer")]
    pub answer: String,
}
