//! fuseqa-prompt - Domain classification and prompt assembly
//!
//! This crate turns ranked evidence into a generation-ready prompt:
//! a keyword-based classifier infers the content domain, and a fixed
//! strategy library fills the matching template under a context budget.
//!
//! Both operations are pure functions over their inputs; any failure
//! here would be a logic defect, not a runtime condition.

mod domain;
mod strategy;

pub use domain::classify;
pub use strategy::{PromptLibrary, PROMPT_LIBRARY_VERSION};

// Re-export for convenience
pub use fuseqa_core::{Domain, DomainLabel, PromptStrategy};
