//! Query pipeline orchestrator.
//!
//! Fans out to the two retrieval backends concurrently, fuses their
//! candidate lists, optionally reranks the shortlist, classifies the
//! content domain and assembles the final prompt. One source failing is
//! tolerated; both failing, or the deadline expiring with nothing
//! usable, aborts the query.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use ulid::Ulid;

use fuseqa_core::{
    Candidate, LexicalSearch, PipelineConfig, PipelineResult, PipelineWarning, QaError,
    RelevanceScorer, Result, SemanticSearch, SourceKind, StageTimings,
};
use fuseqa_prompt::{classify, PromptLibrary};
use fuseqa_rank::{fuse, rerank};

/// Retrieval-fusion pipeline.
///
/// Holds the injected collaborators and all tunables. Whether a
/// relevance scorer exists is decided here, once, at construction; the
/// per-query `use_reranker` flag can only opt out of a configured
/// scorer, never conjure one.
pub struct Pipeline<S, L> {
    /// Semantic retrieval backend.
    semantic: Arc<S>,

    /// Lexical retrieval backend.
    lexical: Arc<L>,

    /// Optional relevance scorer for the rerank pass.
    scorer: Option<Arc<dyn RelevanceScorer>>,

    /// Prompt strategies keyed by domain.
    prompts: PromptLibrary,

    /// Pipeline tunables.
    config: PipelineConfig,
}

impl<S, L> Pipeline<S, L>
where
    S: SemanticSearch,
    L: LexicalSearch,
{
    /// Create a new pipeline. Fails if the configuration is unusable.
    pub fn new(
        semantic: Arc<S>,
        lexical: Arc<L>,
        scorer: Option<Arc<dyn RelevanceScorer>>,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            semantic,
            lexical,
            scorer,
            prompts: PromptLibrary::builtin(),
            config,
        })
    }

    /// Replace the built-in prompt library.
    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = prompts;
        self
    }

    /// Execute a query under a deadline.
    pub async fn execute(
        &self,
        query: &str,
        top_k: u32,
        use_reranker: bool,
        deadline: Duration,
    ) -> Result<PipelineResult> {
        self.execute_cancellable(query, top_k, use_reranker, deadline, CancellationToken::new())
            .await
    }

    /// Execute a query that the caller may cancel.
    ///
    /// Cancellation drops the in-flight backend calls (best-effort
    /// abandonment) and returns [`QaError::Cancelled`] immediately; it
    /// never waits for stragglers.
    pub async fn execute_cancellable(
        &self,
        query: &str,
        top_k: u32,
        use_reranker: bool,
        deadline: Duration,
        cancel: CancellationToken,
    ) -> Result<PipelineResult> {
        tokio::select! {
            _ = cancel.cancelled() => Err(QaError::Cancelled),
            result = self.run(query, top_k, use_reranker, deadline) => result,
        }
    }

    async fn run(
        &self,
        query: &str,
        top_k: u32,
        use_reranker: bool,
        deadline: Duration,
    ) -> Result<PipelineResult> {
        let query_id = Ulid::new();
        let started = Instant::now();

        let top_k = top_k.clamp(1, self.config.search.max_top_k);
        let fetch_k = (top_k * self.config.search.fetch_multiplier).max(self.config.search.min_fetch);

        info!(%query_id, query, top_k, use_reranker, "executing retrieval pipeline");

        let (semantic_out, lexical_out) = tokio::join!(
            run_source(
                SourceKind::Semantic,
                deadline,
                self.semantic.search(query, fetch_k)
            ),
            run_source(
                SourceKind::Lexical,
                deadline,
                self.lexical.search(query, fetch_k)
            ),
        );

        if let (
            SourceOutcome::Failed {
                reason: semantic_reason,
                timed_out: semantic_timed_out,
            },
            SourceOutcome::Failed {
                reason: lexical_reason,
                timed_out: lexical_timed_out,
            },
        ) = (&semantic_out, &lexical_out)
        {
            return Err(if *semantic_timed_out || *lexical_timed_out {
                QaError::Timeout {
                    elapsed_ms: started.elapsed().as_millis() as u64,
                }
            } else {
                QaError::RetrievalUnavailable {
                    semantic: semantic_reason.clone(),
                    lexical: lexical_reason.clone(),
                }
            });
        }

        let mut warnings = Vec::new();
        let mut timings = StageTimings::default();

        let semantic_list = absorb(
            SourceKind::Semantic,
            semantic_out,
            &mut timings.semantic_ms,
            &mut warnings,
        );
        let lexical_list = absorb(
            SourceKind::Lexical,
            lexical_out,
            &mut timings.lexical_ms,
            &mut warnings,
        );

        let mut ranked = fuse(semantic_list, lexical_list, &self.config.fusion);
        debug!(%query_id, candidates = ranked.len(), "fused candidate lists");

        let mut reranker_used = false;
        if use_reranker {
            match &self.scorer {
                Some(scorer) if !ranked.is_empty() => {
                    let remaining = deadline.saturating_sub(started.elapsed());
                    let rerank_started = Instant::now();
                    match timeout(
                        remaining,
                        rerank(query, &ranked, scorer.as_ref(), self.config.rerank.top_n),
                    )
                    .await
                    {
                        Ok(outcome) if outcome.used => {
                            timings.rerank_ms =
                                Some(rerank_started.elapsed().as_millis() as u64);
                            ranked = outcome.candidates;
                            reranker_used = true;
                        }
                        Ok(_) => {
                            warnings.push(PipelineWarning::RerankSkipped {
                                reason: "relevance scorer failed".to_string(),
                            });
                        }
                        Err(_) => {
                            warn!(%query_id, "rerank timed out, keeping fused order");
                            warnings.push(PipelineWarning::RerankSkipped {
                                reason: "relevance scorer timed out".to_string(),
                            });
                        }
                    }
                }
                Some(_) => {}
                None => {
                    warnings.push(PipelineWarning::RerankSkipped {
                        reason: "no relevance scorer configured".to_string(),
                    });
                }
            }
        }

        ranked.truncate(top_k as usize);

        let domain = classify(&ranked, &self.config.domain);
        let prompt = match self.config.prompt.max_context_chars {
            Some(budget) => self
                .prompts
                .assemble_with_budget(query, &domain, &ranked, budget),
            None => self.prompts.assemble(query, &domain, &ranked),
        };

        info!(
            %query_id,
            sources = ranked.len(),
            domain = %domain.domain,
            reranker_used,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pipeline complete"
        );

        Ok(PipelineResult {
            query_id,
            query: query.to_string(),
            prompt,
            ranked_sources: ranked,
            domain,
            reranker_used,
            timings,
            warnings,
        })
    }
}

/// One backend's fan-out outcome.
enum SourceOutcome {
    Ok {
        candidates: Vec<Candidate>,
        elapsed_ms: u64,
    },
    Failed {
        reason: String,
        timed_out: bool,
    },
}

/// Run one backend call under the deadline, reducing every ending to a
/// `SourceOutcome`.
async fn run_source(
    kind: SourceKind,
    deadline: Duration,
    search: impl Future<Output = Result<Vec<Candidate>>>,
) -> SourceOutcome {
    let started = Instant::now();
    match timeout(deadline, search).await {
        Ok(Ok(candidates)) => {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            debug!(%kind, results = candidates.len(), elapsed_ms, "source returned");
            SourceOutcome::Ok {
                candidates,
                elapsed_ms,
            }
        }
        Ok(Err(err)) => {
            warn!(%kind, error = %err, "source failed");
            SourceOutcome::Failed {
                reason: err.to_string(),
                timed_out: false,
            }
        }
        Err(_) => {
            warn!(%kind, ?deadline, "source timed out");
            SourceOutcome::Failed {
                reason: format!("timed out after {:?}", deadline),
                timed_out: true,
            }
        }
    }
}

/// Fold a source outcome into the result metadata, yielding its
/// candidates (empty on failure, per the partial-tolerance contract).
fn absorb(
    kind: SourceKind,
    outcome: SourceOutcome,
    timing_slot: &mut Option<u64>,
    warnings: &mut Vec<PipelineWarning>,
) -> Vec<Candidate> {
    match outcome {
        SourceOutcome::Ok {
            candidates,
            elapsed_ms,
        } => {
            *timing_slot = Some(elapsed_ms);
            candidates
        }
        SourceOutcome::Failed { reason, .. } => {
            warnings.push(PipelineWarning::SourceFailed {
                source: kind,
                reason,
            });
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fuseqa_core::Domain;

    const DEADLINE: Duration = Duration::from_secs(5);

    /// Serves a fixed candidate list for either trait.
    struct StaticSearch {
        kind: SourceKind,
        candidates: Vec<(&'static str, f32, &'static str)>,
    }

    impl StaticSearch {
        fn results(&self) -> Vec<Candidate> {
            self.candidates
                .iter()
                .map(|(id, score, text)| Candidate::new(*id, self.kind, *score, *text))
                .collect()
        }
    }

    #[async_trait]
    impl SemanticSearch for StaticSearch {
        async fn search(&self, _query: &str, _top_k: u32) -> Result<Vec<Candidate>> {
            Ok(self.results())
        }
    }

    #[async_trait]
    impl LexicalSearch for StaticSearch {
        async fn search(&self, _query: &str, _top_k: u32) -> Result<Vec<Candidate>> {
            Ok(self.results())
        }
    }

    struct FailingSearch {
        kind: SourceKind,
    }

    #[async_trait]
    impl SemanticSearch for FailingSearch {
        async fn search(&self, _query: &str, _top_k: u32) -> Result<Vec<Candidate>> {
            Err(QaError::search(self.kind, "connection refused"))
        }
    }

    #[async_trait]
    impl LexicalSearch for FailingSearch {
        async fn search(&self, _query: &str, _top_k: u32) -> Result<Vec<Candidate>> {
            Err(QaError::search(self.kind, "connection refused"))
        }
    }

    /// Sleeps past any short deadline before answering.
    struct SlowSearch;

    #[async_trait]
    impl SemanticSearch for SlowSearch {
        async fn search(&self, _query: &str, _top_k: u32) -> Result<Vec<Candidate>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(vec![])
        }
    }

    #[async_trait]
    impl LexicalSearch for SlowSearch {
        async fn search(&self, _query: &str, _top_k: u32) -> Result<Vec<Candidate>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(vec![])
        }
    }

    /// Scores candidates by a fixed per-document table.
    struct TableScorer {
        scores: Vec<(&'static str, f32)>,
    }

    #[async_trait]
    impl RelevanceScorer for TableScorer {
        async fn score(&self, _query: &str, text: &str) -> Result<f32> {
            Ok(self
                .scores
                .iter()
                .find(|(needle, _)| text.contains(needle))
                .map(|(_, score)| *score)
                .unwrap_or(0.0))
        }
    }

    struct FailingScorer;

    #[async_trait]
    impl RelevanceScorer for FailingScorer {
        async fn score(&self, _query: &str, _text: &str) -> Result<f32> {
            Err(QaError::scorer("model endpoint unavailable"))
        }
    }

    fn semantic_fixture() -> Arc<StaticSearch> {
        Arc::new(StaticSearch {
            kind: SourceKind::Semantic,
            candidates: vec![
                ("a", 0.9, "alpha snippet"),
                ("b", 0.5, "bravo snippet"),
                ("c", 0.1, "charlie snippet"),
            ],
        })
    }

    fn lexical_fixture() -> Arc<StaticSearch> {
        Arc::new(StaticSearch {
            kind: SourceKind::Lexical,
            candidates: vec![("b", 8.0, "bravo snippet"), ("d", 2.0, "delta snippet")],
        })
    }

    #[tokio::test]
    async fn test_happy_path_without_reranker() {
        let pipeline = Pipeline::new(
            semantic_fixture(),
            lexical_fixture(),
            None,
            PipelineConfig::default(),
        )
        .unwrap();

        let result = pipeline.execute("query", 10, false, DEADLINE).await.unwrap();

        assert_eq!(result.ranked_sources.len(), 4);
        assert!(!result.reranker_used);
        assert!(result.warnings.is_empty());
        assert!(result.timings.semantic_ms.is_some());
        assert!(result.timings.lexical_ms.is_some());
        assert!(result.timings.rerank_ms.is_none());
        // "b" matched both sources and leads the ranking
        assert_eq!(result.ranked_sources[0].document_id, "b");
        assert!(result.ranked_sources[0].matched_both());
        assert!(result.prompt.contains("query"));
    }

    #[tokio::test]
    async fn test_partial_tolerance() {
        let pipeline = Pipeline::new(
            semantic_fixture(),
            Arc::new(FailingSearch {
                kind: SourceKind::Lexical,
            }),
            None,
            PipelineConfig::default(),
        )
        .unwrap();

        let result = pipeline.execute("query", 10, false, DEADLINE).await.unwrap();

        assert_eq!(result.ranked_sources.len(), 3);
        assert!(result.timings.lexical_ms.is_none());
        assert!(matches!(
            result.warnings.as_slice(),
            [PipelineWarning::SourceFailed {
                source: SourceKind::Lexical,
                ..
            }]
        ));
    }

    #[tokio::test]
    async fn test_both_sources_failing_is_fatal() {
        let pipeline = Pipeline::new(
            Arc::new(FailingSearch {
                kind: SourceKind::Semantic,
            }),
            Arc::new(FailingSearch {
                kind: SourceKind::Lexical,
            }),
            None,
            PipelineConfig::default(),
        )
        .unwrap();

        let err = pipeline
            .execute("query", 10, false, DEADLINE)
            .await
            .unwrap_err();

        assert!(matches!(err, QaError::RetrievalUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_deadline_expiry_is_timeout_not_empty_success() {
        let pipeline = Pipeline::new(
            Arc::new(SlowSearch),
            Arc::new(SlowSearch),
            None,
            PipelineConfig::default(),
        )
        .unwrap();

        let err = pipeline
            .execute("query", 10, false, Duration::from_millis(50))
            .await
            .unwrap_err();

        assert!(matches!(err, QaError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_cancellation_returns_immediately() {
        let pipeline = Pipeline::new(
            Arc::new(SlowSearch),
            Arc::new(SlowSearch),
            None,
            PipelineConfig::default(),
        )
        .unwrap();

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let err = pipeline
            .execute_cancellable("query", 10, false, DEADLINE, cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, QaError::Cancelled));
        // Returned well before the slow backends or the deadline
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_reranker_drives_final_order() {
        let scorer: Arc<dyn RelevanceScorer> = Arc::new(TableScorer {
            scores: vec![("charlie", 0.9), ("alpha", 0.5), ("bravo", 0.2), ("delta", 0.1)],
        });
        let pipeline = Pipeline::new(
            semantic_fixture(),
            lexical_fixture(),
            Some(scorer),
            PipelineConfig::default(),
        )
        .unwrap();

        let result = pipeline.execute("query", 10, true, DEADLINE).await.unwrap();

        assert!(result.reranker_used);
        assert!(result.timings.rerank_ms.is_some());
        assert_eq!(result.ranked_sources[0].document_id, "c");
        assert_eq!(result.ranked_sources[0].rerank_score, Some(0.9));
        // Fused score kept for diagnostics
        assert!(result.ranked_sources[0].fused_score < 1.0);
    }

    #[tokio::test]
    async fn test_rerank_degradation_keeps_fused_order() {
        let fused_only = Pipeline::new(
            semantic_fixture(),
            lexical_fixture(),
            None,
            PipelineConfig::default(),
        )
        .unwrap();
        let expected = fused_only
            .execute("query", 10, false, DEADLINE)
            .await
            .unwrap();

        let degraded = Pipeline::new(
            semantic_fixture(),
            lexical_fixture(),
            Some(Arc::new(FailingScorer)),
            PipelineConfig::default(),
        )
        .unwrap();
        let result = degraded.execute("query", 10, true, DEADLINE).await.unwrap();

        assert!(!result.reranker_used);
        assert!(result.timings.rerank_ms.is_none());
        let expected_ids: Vec<_> = expected
            .ranked_sources
            .iter()
            .map(|c| c.document_id.as_str())
            .collect();
        let actual_ids: Vec<_> = result
            .ranked_sources
            .iter()
            .map(|c| c.document_id.as_str())
            .collect();
        assert_eq!(expected_ids, actual_ids);
        assert!(matches!(
            result.warnings.as_slice(),
            [PipelineWarning::RerankSkipped { .. }]
        ));
    }

    #[tokio::test]
    async fn test_rerank_requested_without_scorer() {
        let pipeline = Pipeline::new(
            semantic_fixture(),
            lexical_fixture(),
            None,
            PipelineConfig::default(),
        )
        .unwrap();

        let result = pipeline.execute("query", 10, true, DEADLINE).await.unwrap();

        assert!(!result.reranker_used);
        assert!(matches!(
            result.warnings.as_slice(),
            [PipelineWarning::RerankSkipped { .. }]
        ));
    }

    #[tokio::test]
    async fn test_top_k_truncates_after_rerank() {
        let pipeline = Pipeline::new(
            semantic_fixture(),
            lexical_fixture(),
            None,
            PipelineConfig::default(),
        )
        .unwrap();

        let result = pipeline.execute("query", 2, false, DEADLINE).await.unwrap();

        assert_eq!(result.ranked_sources.len(), 2);
    }

    #[tokio::test]
    async fn test_generic_domain_fallback_end_to_end() {
        let pipeline = Pipeline::new(
            semantic_fixture(),
            lexical_fixture(),
            None,
            PipelineConfig::default(),
        )
        .unwrap();

        let result = pipeline.execute("query", 10, false, DEADLINE).await.unwrap();

        assert_eq!(result.domain.domain, Domain::Generic);
        assert_eq!(result.domain.confidence, 0.0);
        assert!(!result.prompt.is_empty());
    }
}
