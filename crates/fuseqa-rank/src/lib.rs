//! fuseqa-rank - Score fusion and reranking
//!
//! This crate merges the two retrieval backends' candidate lists into a
//! single ranking and optionally refines the shortlist with an external
//! relevance scorer.
//!
//! # Features
//!
//! - Min-max normalization with explicit degenerate-list handling
//! - Weighted merge by document id with dual-source tie-breaking
//! - Graceful rerank degradation (scorer failures never fail a query)
//!
//! # Example
//!
//! ```rust,ignore
//! use fuseqa_rank::{fuse, rerank};
//!
//! let fused = fuse(semantic_candidates, lexical_candidates, &config.fusion);
//! let outcome = rerank(query, &fused, scorer.as_ref(), 20).await;
//! ```

mod fusion;
mod rerank;

pub use fusion::fuse;
pub use rerank::{rerank, RerankOutcome};

// Re-export for convenience
pub use fuseqa_core::{Candidate, FusedCandidate};
