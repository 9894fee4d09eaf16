//! Collaborator traits at the pipeline's external seams.
//!
//! The pipeline consumes three injected collaborators: two retrieval
//! backends and an optional relevance scorer. All failures are typed,
//! so an error is always distinguishable from an empty result or a
//! zero score.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Candidate;

/// Embedding-similarity retrieval backend.
#[async_trait]
pub trait SemanticSearch: Send + Sync {
    /// Return up to `top_k` candidates ranked by semantic similarity.
    async fn search(&self, query: &str, top_k: u32) -> Result<Vec<Candidate>>;
}

/// Keyword/full-text retrieval backend.
#[async_trait]
pub trait LexicalSearch: Send + Sync {
    /// Return up to `top_k` candidates ranked by lexical match.
    async fn search(&self, query: &str, top_k: u32) -> Result<Vec<Candidate>>;
}

/// Second-pass relevance model.
///
/// Implementations that support batching should override `score_batch`;
/// the default scores pairs sequentially.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    /// Score one (query, text) pair. Higher is more relevant.
    async fn score(&self, query: &str, text: &str) -> Result<f32>;

    /// Score a batch of texts against one query, in input order.
    async fn score_batch(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(texts.len());
        for text in texts {
            scores.push(self.score(query, text).await?);
        }
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LengthScorer;

    #[async_trait]
    impl RelevanceScorer for LengthScorer {
        async fn score(&self, _query: &str, text: &str) -> Result<f32> {
            Ok(text.len() as f32)
        }
    }

    #[tokio::test]
    async fn test_score_batch_default_preserves_order() {
        let scorer = LengthScorer;
        let scores = scorer
            .score_batch("q", &["aa", "a", "aaaa"])
            .await
            .unwrap();
        assert_eq!(scores, vec![2.0, 1.0, 4.0]);
    }
}
