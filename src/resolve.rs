//! Answer resolution pipeline: retrieve → reconcile → fall back → persist.
//!
//! One resolution run per question-created event. The run always produces
//! an answer — resolution failures degrade to the canned fallback rather
//! than surfacing as errors — and writes it back at most once.

use tracing::{debug, info};

use crate::backend::SearchBackend;
use crate::config::ResolverConfig;
use crate::fallback;
use crate::models::{AnswerSource, Question, ResolvedAnswer};
use crate::reconcile::{self, Verdict};
use crate::retrieval;
use crate::store::QuestionStore;

/// What one resolution run did.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The answer that was resolved and persisted.
    Resolved(ResolvedAnswer),
    /// The question already had a response; nothing was written.
    AlreadyResolved,
}

/// Resolve one question and persist the answer.
///
/// Errors are only returned for persistence failures; every backend
/// failure along the way is absorbed by the pipeline's degradation
/// rules. Duplicate deliveries of the same event are harmless: the run
/// skips questions that already carry a response, and the store write is
/// conditional besides.
pub async fn resolve_question(
    backend: &dyn SearchBackend,
    store: &dyn QuestionStore,
    config: &ResolverConfig,
    question: &Question,
) -> anyhow::Result<Outcome> {
    if question.response.is_some() {
        debug!(question = %question.id, "already resolved, skipping");
        return Ok(Outcome::AlreadyResolved);
    }

    let raw = retrieval::fan_out(backend, config.model, &question.text).await;

    let answer = match reconcile::reconcile(raw, config.certainty_threshold) {
        Verdict::Accepted(answer) => answer,
        Verdict::Insufficient(top) => {
            if let Some(hit) = &top {
                debug!(
                    certainty = hit.certainty,
                    threshold = config.certainty_threshold,
                    "top semantic hit below threshold, consulting fallback chain"
                );
            }
            fallback::run_chain(
                backend,
                config.model,
                &question.text,
                &config.generative_prompt,
            )
            .await
            .unwrap_or_else(|| ResolvedAnswer {
                text: config.fallback_answer.clone(),
                source: AnswerSource::Fallback,
                certainty: None,
            })
        }
    };

    let encoded = answer.encode_response()?;
    let wrote = store.update_response(&question.id, &encoded).await?;
    if !wrote {
        info!(question = %question.id, "response already present, write skipped");
        return Ok(Outcome::AlreadyResolved);
    }

    info!(question = %question.id, source = %answer.source, "question resolved");
    Ok(Outcome::Resolved(answer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{hit, MockBackend};
    use crate::backend::AskResult;
    use crate::error::BackendError;
    use crate::models::{decode_response, ModelFamily};
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Minimal in-memory store, just enough for pipeline tests.
    #[derive(Default)]
    struct MemoryStore {
        questions: Mutex<HashMap<String, Question>>,
    }

    impl MemoryStore {
        fn with_question(question: &Question) -> Self {
            let store = Self::default();
            store
                .questions
                .lock()
                .unwrap()
                .insert(question.id.clone(), question.clone());
            store
        }

        fn response_of(&self, id: &str) -> Option<String> {
            self.questions
                .lock()
                .unwrap()
                .get(id)
                .and_then(|q| q.response.clone())
        }
    }

    #[async_trait]
    impl QuestionStore for MemoryStore {
        async fn create_question(&self, text: &str, asked_by: &str) -> Result<Question> {
            let question = pending_question(text, asked_by);
            self.questions
                .lock()
                .unwrap()
                .insert(question.id.clone(), question.clone());
            Ok(question)
        }

        async fn get_question(&self, id: &str) -> Result<Option<Question>> {
            Ok(self.questions.lock().unwrap().get(id).cloned())
        }

        async fn update_response(&self, id: &str, response_json: &str) -> Result<bool> {
            let mut questions = self.questions.lock().unwrap();
            match questions.get_mut(id) {
                Some(q) if q.response.is_none() => {
                    q.response = Some(response_json.to_string());
                    q.responded_at = Some(Utc::now());
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn recent_questions(&self, _limit: i64) -> Result<Vec<Question>> {
            Ok(self.questions.lock().unwrap().values().cloned().collect())
        }
    }

    fn pending_question(text: &str, asked_by: &str) -> Question {
        Question {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.to_string(),
            asked_by: asked_by.to_string(),
            created_at: Utc::now(),
            responded_at: None,
            response: None,
            generated: None,
            rating: None,
        }
    }

    fn config(model: ModelFamily) -> ResolverConfig {
        ResolverConfig {
            model,
            ..ResolverConfig::default()
        }
    }

    #[tokio::test]
    async fn test_confident_semantic_hit_is_persisted() {
        // Scenario A: [0.9, 0.95] resolves to the 0.95 hit, semantic.
        let backend = MockBackend::new()
            .with_class("OpenAI")
            .with_class("OpenAIInverted")
            .with_hits("OpenAI", vec![hit("OpenAI", "q", "good answer", 0.9)])
            .with_hits(
                "OpenAIInverted",
                vec![hit("OpenAIInverted", "q", "better answer", 0.95)],
            );
        let question = pending_question("which one?", "u");
        let store = MemoryStore::with_question(&question);

        let outcome = resolve_question(&backend, &store, &config(ModelFamily::OpenAI), &question)
            .await
            .unwrap();

        match outcome {
            Outcome::Resolved(answer) => {
                assert_eq!(answer.source, AnswerSource::Semantic);
                assert_eq!(answer.text, "better answer");
            }
            Outcome::AlreadyResolved => panic!("expected a resolved answer"),
        }

        let stored = store.response_of(&question.id).unwrap();
        let record = decode_response(&stored).unwrap();
        assert_eq!(record.answer, "better answer");
        assert!((record.certainty.unwrap() - 0.95).abs() < 1e-9);

        // The fallback chain was never consulted.
        let log = backend.call_log();
        assert!(!log.iter().any(|c| c.starts_with("ask:")));
        assert!(!log.iter().any(|c| c.starts_with("generate:")));
    }

    #[tokio::test]
    async fn test_everything_declining_yields_canned_fallback() {
        // Scenario B: top certainty 0.5, QA declines, generation empty.
        let backend = MockBackend::new()
            .with_class("OpenAI")
            .with_hits("OpenAI", vec![hit("OpenAI", "q", "weak answer", 0.5)]);
        let question = pending_question("hmm?", "u");
        let store = MemoryStore::with_question(&question);
        let cfg = config(ModelFamily::OpenAI);

        let outcome = resolve_question(&backend, &store, &cfg, &question)
            .await
            .unwrap();

        match outcome {
            Outcome::Resolved(answer) => {
                assert_eq!(answer.source, AnswerSource::Fallback);
                assert_eq!(answer.text, cfg.fallback_answer);
                assert_eq!(answer.certainty, None);
            }
            Outcome::AlreadyResolved => panic!("expected a resolved answer"),
        }
    }

    #[tokio::test]
    async fn test_qa_extraction_wins_when_generation_fails() {
        // Scenario C.
        let backend = MockBackend::new()
            .with_class("OpenAI")
            .with_hits("OpenAI", vec![hit("OpenAI", "q", "weak", 0.4)])
            .with_ask(AskResult {
                has_answer: true,
                result: Some("Paris".to_string()),
            })
            .with_generate_error(BackendError::Unavailable("503".into()));
        let question = pending_question("capital of France?", "u");
        let store = MemoryStore::with_question(&question);

        let outcome = resolve_question(&backend, &store, &config(ModelFamily::OpenAI), &question)
            .await
            .unwrap();

        match outcome {
            Outcome::Resolved(answer) => {
                assert_eq!(answer.source, AnswerSource::QaExtraction);
                assert_eq!(answer.text, "Paris");
            }
            Outcome::AlreadyResolved => panic!("expected a resolved answer"),
        }
        let record = decode_response(&store.response_of(&question.id).unwrap()).unwrap();
        assert_eq!(record.answer, "Paris");
    }

    #[tokio::test]
    async fn test_generative_wins_when_both_fallback_stages_succeed() {
        // Scenario D.
        let backend = MockBackend::new()
            .with_class("OpenAI")
            .with_hits("OpenAI", vec![hit("OpenAI", "q", "weak", 0.4)])
            .with_ask(AskResult {
                has_answer: true,
                result: Some("Paris".to_string()),
            })
            .with_generate("It's Paris, friend!");
        let question = pending_question("capital of France?", "u");
        let store = MemoryStore::with_question(&question);

        let outcome = resolve_question(&backend, &store, &config(ModelFamily::OpenAI), &question)
            .await
            .unwrap();

        match outcome {
            Outcome::Resolved(answer) => {
                assert_eq!(answer.source, AnswerSource::Generative);
                assert_eq!(answer.text, "It's Paris, friend!");
            }
            Outcome::AlreadyResolved => panic!("expected a resolved answer"),
        }
    }

    #[tokio::test]
    async fn test_partial_retrieval_failure_still_resolves() {
        // Scenario E: one of two retrieval calls times out.
        let backend = MockBackend::new()
            .with_class("HuggingFace")
            .with_class("HuggingFaceInverted")
            .with_hits(
                "HuggingFace",
                vec![hit("HuggingFace", "q", "surviving answer", 0.9)],
            )
            .with_near_text_error(
                "HuggingFaceInverted",
                BackendError::Timeout("15s".into()),
            );
        let question = pending_question("q?", "u");
        let store = MemoryStore::with_question(&question);

        let outcome = resolve_question(
            &backend,
            &store,
            &config(ModelFamily::HuggingFace),
            &question,
        )
        .await
        .unwrap();

        match outcome {
            Outcome::Resolved(answer) => {
                assert_eq!(answer.source, AnswerSource::Semantic);
                assert_eq!(answer.text, "surviving answer");
            }
            Outcome::AlreadyResolved => panic!("expected a resolved answer"),
        }
    }

    #[tokio::test]
    async fn test_total_failure_never_errors() {
        // Unconfigured schema + failing fallback stages: still an answer.
        let backend = MockBackend::new()
            .with_ask_error(BackendError::Unavailable("down".into()))
            .with_generate_error(BackendError::Unavailable("down".into()));
        let question = pending_question("anyone there?", "u");
        let store = MemoryStore::with_question(&question);
        let cfg = config(ModelFamily::OpenAI);

        let outcome = resolve_question(&backend, &store, &cfg, &question)
            .await
            .unwrap();

        match outcome {
            Outcome::Resolved(answer) => {
                assert_eq!(answer.source, AnswerSource::Fallback);
                assert_eq!(answer.text, cfg.fallback_answer);
            }
            Outcome::AlreadyResolved => panic!("expected a resolved answer"),
        }

        // Stored response is well-formed JSON: a single-element array
        // with an answer field.
        let stored = store.response_of(&question.id).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&stored).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 1);
        assert!(parsed[0]["answer"].is_string());
    }

    #[tokio::test]
    async fn test_duplicate_delivery_skips_resolution() {
        let backend = MockBackend::new()
            .with_class("OpenAI")
            .with_hits("OpenAI", vec![hit("OpenAI", "q", "answer", 0.99)]);
        let mut question = pending_question("q?", "u");
        question.response = Some(r#"[{"answer":"already here"}]"#.to_string());
        let store = MemoryStore::with_question(&question);

        let outcome = resolve_question(&backend, &store, &config(ModelFamily::OpenAI), &question)
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::AlreadyResolved));
        assert!(backend.call_log().is_empty());
        assert_eq!(
            store.response_of(&question.id).unwrap(),
            r#"[{"answer":"already here"}]"#
        );
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_cannot_double_write() {
        // The record looked pending when the run started, but another
        // run won the race: the conditional write must lose quietly.
        let backend = MockBackend::new()
            .with_class("OpenAI")
            .with_hits("OpenAI", vec![hit("OpenAI", "q", "second answer", 0.99)]);
        let question = pending_question("q?", "u");
        let store = MemoryStore::with_question(&question);
        store
            .update_response(&question.id, r#"[{"answer":"first answer"}]"#)
            .await
            .unwrap();

        // `question` still shows no response, simulating the stale read.
        let outcome = resolve_question(&backend, &store, &config(ModelFamily::OpenAI), &question)
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::AlreadyResolved));
        let record = decode_response(&store.response_of(&question.id).unwrap()).unwrap();
        assert_eq!(record.answer, "first answer");
    }
}
