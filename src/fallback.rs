//! Fallback chain.
//!
//! When semantic search produces nothing confident enough, two degraded
//! strategies run concurrently against the family's primary collection:
//! extractive QA over the question field, and a generative completion
//! prompted from the best-matching FAQ answer. A backend failure at
//! either stage declines that stage locally — it never propagates.
//!
//! Combination rule: the generative result is preferred when both stages
//! succeed (it reads more naturally); otherwise whichever stage produced
//! text wins. When neither does, the caller falls back to the canned
//! apology, which cannot fail.

use tracing::warn;

use crate::backend::SearchBackend;
use crate::models::{AnswerSource, ModelFamily, ResolvedAnswer};

/// The collection property extractive QA runs over.
const ASK_PROPERTY: &str = "question";

/// Run the QA-extraction and generative stages for one question.
///
/// Returns `None` when both stages decline — the caller is responsible
/// for the canned answer.
pub async fn run_chain(
    backend: &dyn SearchBackend,
    family: ModelFamily,
    question: &str,
    prompt_template: &str,
) -> Option<ResolvedAnswer> {
    let primary = family.primary_class();
    let prompt = prompt_template.replace("{question}", question);

    let (ask_result, generate_result) = tokio::join!(
        backend.ask(primary, question, ASK_PROPERTY),
        backend.generate(primary, question, &prompt),
    );

    let extracted = match ask_result {
        Ok(ask) if ask.has_answer => ask.result.filter(|text| !text.trim().is_empty()),
        Ok(_) => None,
        Err(err) => {
            warn!(error = %err, "qa extraction stage declined");
            None
        }
    };

    let generated = match generate_result {
        Ok(generate) => generate
            .single_result
            .filter(|text| !text.trim().is_empty()),
        Err(err) => {
            warn!(error = %err, "generative stage declined");
            None
        }
    };

    if let Some(text) = generated {
        Some(ResolvedAnswer {
            text,
            source: AnswerSource::Generative,
            certainty: None,
        })
    } else {
        extracted.map(|text| ResolvedAnswer {
            text,
            source: AnswerSource::QaExtraction,
            certainty: None,
        })
    }
}
