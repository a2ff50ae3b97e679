//! Retrieval strategy executor.
//!
//! Fans a question out to every collection of the active model family,
//! concurrently, and returns only the hits from calls that succeeded. A
//! failed call is dropped from the result set without aborting its
//! siblings; the overall run proceeds once all calls have settled.

use futures::future::join_all;
use tracing::{debug, warn};

use crate::backend::SearchBackend;
use crate::models::{ModelFamily, RawHit};

/// Each collection is asked for its single best match; the Reconciler
/// arbitrates between collections rather than within one.
const NEAR_TEXT_LIMIT: usize = 1;

/// Run the nearest-neighbor fan-out for one question.
///
/// Guard precondition: at least one of the family's collections must
/// exist. When none do, the family is treated as not configured yet and
/// an empty set is returned without issuing any search queries. A failed
/// existence probe counts as "does not exist".
///
/// The output preserves the family's collection order (primary before
/// inverted), which is what makes downstream tie-breaking deterministic.
pub async fn fan_out(
    backend: &dyn SearchBackend,
    family: ModelFamily,
    question: &str,
) -> Vec<RawHit> {
    let classes = family.classes();

    let probes = join_all(classes.iter().map(|class| backend.class_exists(class))).await;
    let existing: Vec<&str> = classes
        .iter()
        .zip(probes)
        .filter_map(|(class, probe)| match probe {
            Ok(true) => Some(*class),
            Ok(false) => None,
            Err(err) => {
                warn!(collection = %class, error = %err, "existence probe failed");
                None
            }
        })
        .collect();

    if existing.is_empty() {
        debug!(family = %family, "no collections configured, skipping retrieval");
        return Vec::new();
    }

    let results = join_all(
        existing
            .iter()
            .map(|class| backend.near_text(class, question, NEAR_TEXT_LIMIT)),
    )
    .await;

    existing
        .iter()
        .zip(results)
        .filter_map(|(class, result)| match result {
            Ok(hits) => Some(hits),
            Err(err) => {
                warn!(collection = %class, error = %err, "retrieval call dropped");
                None
            }
        })
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{hit, MockBackend};
    use crate::error::BackendError;

    #[tokio::test]
    async fn test_unconfigured_family_short_circuits() {
        let backend = MockBackend::new();
        let hits = fan_out(&backend, ModelFamily::HuggingFace, "anything?").await;
        assert!(hits.is_empty());

        // Only the existence probes ran; no search queries were issued.
        let log = backend.call_log();
        assert!(log.iter().all(|call| call.starts_with("class_exists:")));
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn test_probe_error_counts_as_missing() {
        let backend = MockBackend::new().with_class_exists_error();
        let hits = fan_out(&backend, ModelFamily::OpenAI, "anything?").await;
        assert!(hits.is_empty());
        assert!(!backend
            .call_log()
            .iter()
            .any(|call| call.starts_with("near_text:")));
    }

    #[tokio::test]
    async fn test_queries_only_existing_collections() {
        let backend = MockBackend::new()
            .with_class("OpenAI")
            .with_hits("OpenAI", vec![hit("OpenAI", "q", "a", 0.8)]);

        let hits = fan_out(&backend, ModelFamily::OpenAI, "q").await;
        assert_eq!(hits.len(), 1);

        let log = backend.call_log();
        assert!(log.contains(&"near_text:OpenAI".to_string()));
        assert!(!log.contains(&"near_text:OpenAIInverted".to_string()));
    }

    #[tokio::test]
    async fn test_failed_call_does_not_poison_the_batch() {
        // Scenario E: one of two concurrent calls times out; the run
        // proceeds with the surviving hit.
        let backend = MockBackend::new()
            .with_class("HuggingFace")
            .with_class("HuggingFaceInverted")
            .with_hits(
                "HuggingFace",
                vec![hit("HuggingFace", "q", "the answer", 0.85)],
            )
            .with_near_text_error(
                "HuggingFaceInverted",
                BackendError::Timeout("15s elapsed".into()),
            );

        let hits = fan_out(&backend, ModelFamily::HuggingFace, "q").await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].collection, "HuggingFace");
    }

    #[tokio::test]
    async fn test_all_calls_failing_yields_empty_set() {
        let backend = MockBackend::new()
            .with_class("OpenAI")
            .with_class("OpenAIInverted")
            .with_near_text_error("OpenAI", BackendError::Unavailable("503".into()))
            .with_near_text_error("OpenAIInverted", BackendError::Timeout("t".into()));

        let hits = fan_out(&backend, ModelFamily::OpenAI, "q").await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_hit_order_follows_collection_order() {
        let backend = MockBackend::new()
            .with_class("OpenAI")
            .with_class("OpenAIInverted")
            .with_hits("OpenAI", vec![hit("OpenAI", "q", "primary", 0.5)])
            .with_hits(
                "OpenAIInverted",
                vec![hit("OpenAIInverted", "q", "inverted", 0.5)],
            );

        let hits = fan_out(&backend, ModelFamily::OpenAI, "q").await;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].collection, "OpenAI");
        assert_eq!(hits[1].collection, "OpenAIInverted");
    }
}
