//! fuseqa-pipeline - Query pipeline orchestrator
//!
//! This crate wires the retrieval backends, the fusion engine, the
//! optional reranker and the prompt assembler into one call:
//!
//! query → [semantic ∥ lexical] → fuse → (rerank) → classify → assemble
//!
//! # Features
//!
//! - Concurrent fan-out with independent per-source deadlines
//! - Partial-retrieval tolerance (one source failing never fails a query)
//! - Graceful rerank degradation
//! - Caller-driven cancellation
//!
//! # Example
//!
//! ```rust,ignore
//! use fuseqa_pipeline::Pipeline;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let pipeline = Pipeline::new(Arc::new(semantic), Arc::new(lexical), Some(scorer), config)?;
//! let result = pipeline.execute("what was 2023 revenue?", 5, true, Duration::from_secs(10)).await?;
//! println!("{}", result.prompt);
//! ```

mod engine;

pub use engine::Pipeline;

// Re-export for convenience
pub use fuseqa_core::{PipelineConfig, PipelineResult, QaError, Result};
pub use tokio_util::sync::CancellationToken;
