//! Result reconciler.
//!
//! Turns the executor's heterogeneous hit set into a single best-answer
//! decision: normalize raw hits, rank by certainty, and apply the
//! confidence gate. Everything here is pure and synchronous so the
//! decision rules can be tested exhaustively without a backend.

use tracing::debug;

use crate::models::{AnswerSource, RawHit, ResolvedAnswer, RetrievalHit};

/// Outcome of reconciling one hit set.
#[derive(Debug, Clone)]
pub enum Verdict {
    /// The top semantic candidate cleared the confidence gate.
    Accepted(ResolvedAnswer),
    /// No candidate was confident enough (or the set was empty); the
    /// fallback chain must be consulted. Carries the rejected top hit,
    /// when there was one, for the logs.
    Insufficient(Option<RetrievalHit>),
}

/// Drop hits missing any of question, answer, or certainty.
///
/// Malformed hits are a backend quirk, not a pipeline failure — they are
/// logged and discarded. A hit from an inverted collection is as valid an
/// answer source as any other; it was just matched on question text alone.
pub fn normalize(raw: Vec<RawHit>) -> Vec<RetrievalHit> {
    raw.into_iter()
        .filter_map(|hit| match (hit.question, hit.answer, hit.certainty) {
            (Some(question), Some(answer), Some(certainty)) => Some(RetrievalHit {
                collection: hit.collection,
                question,
                answer,
                certainty,
                distance: hit.distance,
            }),
            _ => {
                debug!(collection = %hit.collection, "discarding malformed hit");
                None
            }
        })
        .collect()
}

/// Stable descending sort on certainty.
///
/// Ties keep their first-seen order, so the final ranking is
/// deterministic for any fixed input order.
pub fn rank(hits: &mut [RetrievalHit]) {
    hits.sort_by(|a, b| {
        b.certainty
            .partial_cmp(&a.certainty)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Normalize, rank, and gate a raw hit set.
///
/// The top candidate is accepted outright only when its certainty
/// strictly exceeds `threshold`; anything else is handed to the fallback
/// chain.
pub fn reconcile(raw: Vec<RawHit>, threshold: f64) -> Verdict {
    let mut hits = normalize(raw);
    rank(&mut hits);

    let Some(top) = hits.into_iter().next() else {
        return Verdict::Insufficient(None);
    };

    if top.certainty > threshold {
        let answer = ResolvedAnswer {
            text: top.answer,
            source: AnswerSource::Semantic,
            certainty: Some(top.certainty),
        };
        Verdict::Accepted(answer)
    } else {
        Verdict::Insufficient(Some(top))
    }
}
