//! Second-pass relevance scoring over the fused shortlist.
//!
//! The stage only refines order: any collaborator failure leaves the
//! fused ranking untouched and is reported through `RerankOutcome::used`,
//! never as an error.

use fuseqa_core::{FusedCandidate, RelevanceScorer};
use tracing::{debug, warn};

/// Result of a rerank attempt.
#[derive(Debug)]
pub struct RerankOutcome {
    /// Candidates in final order.
    pub candidates: Vec<FusedCandidate>,

    /// Whether rerank scores drive the prefix order. False means the
    /// fused order was returned unchanged.
    pub used: bool,
}

/// Rerank the top `top_n` fused candidates with the relevance scorer.
///
/// On success the prefix is re-sorted by `rerank_score` descending
/// (stable, so equal scores keep fused order) and the remainder is
/// appended in fused order. On any scorer failure the input order is
/// returned unchanged. The scorer is never retried.
pub async fn rerank(
    query: &str,
    fused: &[FusedCandidate],
    scorer: &dyn RelevanceScorer,
    top_n: usize,
) -> RerankOutcome {
    if fused.is_empty() || top_n == 0 {
        return RerankOutcome {
            candidates: fused.to_vec(),
            used: false,
        };
    }

    let cut = top_n.min(fused.len());
    let texts: Vec<&str> = fused[..cut].iter().map(|c| c.text.as_str()).collect();

    let scores = match scorer.score_batch(query, &texts).await {
        Ok(scores) if scores.len() == cut => scores,
        Ok(scores) => {
            warn!(
                expected = cut,
                got = scores.len(),
                "scorer returned mismatched score count, keeping fused order"
            );
            return RerankOutcome {
                candidates: fused.to_vec(),
                used: false,
            };
        }
        Err(err) => {
            warn!(error = %err, "relevance scorer failed, keeping fused order");
            return RerankOutcome {
                candidates: fused.to_vec(),
                used: false,
            };
        }
    };

    let mut candidates = fused.to_vec();
    let tail = candidates.split_off(cut);

    for (candidate, score) in candidates.iter_mut().zip(scores) {
        candidate.rerank_score = Some(score);
    }
    // Stable sort: equal rerank scores keep their fused order
    candidates.sort_by(|a, b| {
        b.authoritative_score()
            .total_cmp(&a.authoritative_score())
    });
    candidates.extend(tail);

    debug!(reranked = cut, "rerank pass complete");
    RerankOutcome {
        candidates,
        used: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fuseqa_core::{QaError, Result, SourceMetadata};

    fn fused(id: &str, fused_score: f32) -> FusedCandidate {
        FusedCandidate {
            document_id: id.to_string(),
            fused_score,
            semantic_score: Some(fused_score),
            lexical_score: None,
            rerank_score: None,
            text: format!("text {}", id),
            metadata: SourceMetadata::default(),
        }
    }

    /// Returns a fixed score sequence regardless of input.
    struct ScriptedScorer {
        scores: Vec<f32>,
    }

    #[async_trait]
    impl RelevanceScorer for ScriptedScorer {
        async fn score(&self, _query: &str, _text: &str) -> Result<f32> {
            unreachable!("tests drive score_batch")
        }

        async fn score_batch(&self, _query: &str, texts: &[&str]) -> Result<Vec<f32>> {
            Ok(self.scores.iter().copied().take(texts.len()).collect())
        }
    }

    struct FailingScorer;

    #[async_trait]
    impl RelevanceScorer for FailingScorer {
        async fn score(&self, _query: &str, _text: &str) -> Result<f32> {
            Err(QaError::scorer("model endpoint unavailable"))
        }
    }

    #[tokio::test]
    async fn test_rerank_reorders_by_score() {
        let input = vec![fused("a", 0.9), fused("b", 0.6), fused("c", 0.3)];
        let scorer = ScriptedScorer {
            scores: vec![0.1, 0.9, 0.5],
        };

        let outcome = rerank("q", &input, &scorer, 10).await;

        assert!(outcome.used);
        let ids: Vec<_> = outcome
            .candidates
            .iter()
            .map(|c| c.document_id.as_str())
            .collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        // Fused scores survive for diagnostics
        assert_eq!(outcome.candidates[0].fused_score, 0.6);
        assert_eq!(outcome.candidates[0].rerank_score, Some(0.9));
    }

    #[tokio::test]
    async fn test_failure_keeps_fused_order() {
        let input = vec![fused("a", 0.9), fused("b", 0.6)];

        let outcome = rerank("q", &input, &FailingScorer, 10).await;

        assert!(!outcome.used);
        let ids: Vec<_> = outcome
            .candidates
            .iter()
            .map(|c| c.document_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(outcome.candidates.iter().all(|c| c.rerank_score.is_none()));
    }

    #[tokio::test]
    async fn test_tail_beyond_top_n_keeps_fused_order() {
        let input = vec![
            fused("a", 0.9),
            fused("b", 0.8),
            fused("c", 0.7),
            fused("d", 0.6),
        ];
        // Reverse the first two; c and d are beyond the shortlist
        let scorer = ScriptedScorer {
            scores: vec![0.2, 0.8],
        };

        let outcome = rerank("q", &input, &scorer, 2).await;

        assert!(outcome.used);
        let ids: Vec<_> = outcome
            .candidates
            .iter()
            .map(|c| c.document_id.as_str())
            .collect();
        assert_eq!(ids, vec!["b", "a", "c", "d"]);
        assert!(outcome.candidates[2].rerank_score.is_none());
        assert!(outcome.candidates[3].rerank_score.is_none());
    }

    #[tokio::test]
    async fn test_score_count_mismatch_degrades() {
        let input = vec![fused("a", 0.9), fused("b", 0.6), fused("c", 0.3)];
        let scorer = ScriptedScorer {
            scores: vec![0.5],
        };

        let outcome = rerank("q", &input, &scorer, 3).await;

        assert!(!outcome.used);
        let ids: Vec<_> = outcome
            .candidates
            .iter()
            .map(|c| c.document_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let outcome = rerank("q", &[], &FailingScorer, 10).await;
        assert!(!outcome.used);
        assert!(outcome.candidates.is_empty());
    }
}
