//! fuseqa-core - Core types and traits for the fuseqa pipeline
//!
//! This crate provides the foundational types, collaborator traits, and
//! error handling used throughout the fuseqa system.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::{QaError, Result};
pub use traits::*;
pub use types::*;
