//! Core domain types for the retrieval-fusion pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ulid::Ulid;

/// Which retrieval backend produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Semantic,
    Lexical,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Semantic => "semantic",
            Self::Lexical => "lexical",
        };
        write!(f, "{}", s)
    }
}

/// Provenance metadata attached to a retrieved snippet.
///
/// The typed fields cover what every search backend reports; anything
/// backend-specific (title, author, ...) lands in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Originating file name.
    pub filename: Option<String>,

    /// Page number within the source document (1-based).
    pub page: Option<u32>,

    /// Chunk index within the document (0-based).
    pub chunk_index: Option<u32>,

    /// Backend-specific metadata.
    #[serde(flatten, default)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A scored snippet returned by one retrieval backend.
///
/// Immutable once produced by an adapter; fusion owns all downstream
/// score manipulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Backend-assigned document identifier (opaque).
    pub document_id: String,

    /// Which backend produced this candidate.
    pub source: SourceKind,

    /// Raw backend score. Comparable only within one list.
    pub raw_score: f32,

    /// Snippet text.
    pub text: String,

    /// Provenance metadata.
    #[serde(default)]
    pub metadata: SourceMetadata,
}

impl Candidate {
    /// Create a candidate with empty metadata.
    pub fn new(
        document_id: impl Into<String>,
        source: SourceKind,
        raw_score: f32,
        text: impl Into<String>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            source,
            raw_score,
            text: text.into(),
            metadata: SourceMetadata::default(),
        }
    }

    /// Attach provenance metadata.
    pub fn with_metadata(mut self, metadata: SourceMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// One document after fusion, carrying every score that contributed.
///
/// Exactly one `FusedCandidate` exists per distinct `document_id` in a
/// query's result set. `semantic_score` and `lexical_score` hold the
/// normalized per-source contributions that produced `fused_score`;
/// `rerank_score` is set only after a successful rerank pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedCandidate {
    /// Backend-assigned document identifier.
    pub document_id: String,

    /// Weighted combination of the normalized per-source scores.
    pub fused_score: f32,

    /// Normalized semantic contribution, if the semantic list matched.
    pub semantic_score: Option<f32>,

    /// Normalized lexical contribution, if the lexical list matched.
    pub lexical_score: Option<f32>,

    /// Relevance-model score, if reranking succeeded.
    pub rerank_score: Option<f32>,

    /// Snippet text.
    pub text: String,

    /// Provenance metadata.
    #[serde(default)]
    pub metadata: SourceMetadata,
}

impl FusedCandidate {
    /// Whether both retrieval backends returned this document.
    pub fn matched_both(&self) -> bool {
        self.semantic_score.is_some() && self.lexical_score.is_some()
    }

    /// The score that currently drives ordering: the rerank score when
    /// present, the fused score otherwise.
    pub fn authoritative_score(&self) -> f32 {
        self.rerank_score.unwrap_or(self.fused_score)
    }
}

/// Content domain inferred from the retrieved evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Financial,
    Legal,
    Technical,
    Academic,
    Generic,
}

impl Domain {
    /// All domains, in classifier tie-break order.
    pub const ALL: [Domain; 5] = [
        Domain::Financial,
        Domain::Legal,
        Domain::Technical,
        Domain::Academic,
        Domain::Generic,
    ];
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Financial => "financial",
            Self::Legal => "legal",
            Self::Technical => "technical",
            Self::Academic => "academic",
            Self::Generic => "generic",
        };
        write!(f, "{}", s)
    }
}

/// A domain classification with its confidence, recomputed per query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DomainLabel {
    /// The inferred domain.
    pub domain: Domain,

    /// Classifier confidence in [0, 1].
    pub confidence: f32,
}

impl DomainLabel {
    /// The fallback label: generic content, zero confidence.
    pub fn generic() -> Self {
        Self {
            domain: Domain::Generic,
            confidence: 0.0,
        }
    }
}

/// A prompt template plus its context budget, keyed by domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptStrategy {
    /// Domain this strategy serves.
    pub domain: Domain,

    /// Template with `{context}` and `{question}` placeholders.
    pub template: String,

    /// Context budget in characters (snippet text only).
    pub max_context_chars: usize,
}

/// Non-fatal degradations recorded on a successful result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineWarning {
    /// One retrieval source failed; the pipeline proceeded with the other.
    SourceFailed { source: SourceKind, reason: String },

    /// Reranking was skipped; the fused order stands.
    RerankSkipped { reason: String },
}

/// Per-stage wall-clock timings. `None` means the stage failed or was
/// skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimings {
    pub semantic_ms: Option<u64>,
    pub lexical_ms: Option<u64>,
    pub rerank_ms: Option<u64>,
}

/// The answer-ready output of one pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Correlation id for this execution.
    pub query_id: Ulid,

    /// The original query.
    pub query: String,

    /// The filled, generation-ready prompt.
    pub prompt: String,

    /// All surviving candidates in final order, for citation. May list
    /// more sources than the prompt's context budget admitted.
    pub ranked_sources: Vec<FusedCandidate>,

    /// Inferred content domain.
    pub domain: DomainLabel,

    /// Whether the rerank pass drove the final order.
    pub reranker_used: bool,

    /// Per-stage timings.
    pub timings: StageTimings,

    /// Non-fatal degradations encountered along the way.
    pub warnings: Vec<PipelineWarning>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matched_both() {
        let mut cand = FusedCandidate {
            document_id: "a".to_string(),
            fused_score: 0.5,
            semantic_score: Some(0.8),
            lexical_score: None,
            rerank_score: None,
            text: String::new(),
            metadata: SourceMetadata::default(),
        };
        assert!(!cand.matched_both());
        cand.lexical_score = Some(0.3);
        assert!(cand.matched_both());
    }

    #[test]
    fn test_authoritative_score_prefers_rerank() {
        let mut cand = FusedCandidate {
            document_id: "a".to_string(),
            fused_score: 0.5,
            semantic_score: Some(1.0),
            lexical_score: None,
            rerank_score: None,
            text: String::new(),
            metadata: SourceMetadata::default(),
        };
        assert_eq!(cand.authoritative_score(), 0.5);
        cand.rerank_score = Some(0.9);
        assert_eq!(cand.authoritative_score(), 0.9);
    }

    #[test]
    fn test_source_kind_serde() {
        assert_eq!(
            serde_json::to_string(&SourceKind::Semantic).unwrap(),
            "\"semantic\""
        );
        assert_eq!(
            serde_json::from_str::<SourceKind>("\"lexical\"").unwrap(),
            SourceKind::Lexical
        );
    }

    #[test]
    fn test_warning_serde_tag() {
        let warning = PipelineWarning::SourceFailed {
            source: SourceKind::Lexical,
            reason: "connection refused".to_string(),
        };
        let json = serde_json::to_string(&warning).unwrap();
        assert!(json.contains("\"kind\":\"source_failed\""));
    }
}
