//! Configuration types for the retrieval-fusion pipeline.
//!
//! All tunables are explicit values handed to the pipeline at
//! construction; nothing is read from ambient global state at query
//! time.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{QaError, Result};

/// Main configuration for the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Retrieval fan-out configuration.
    #[serde(default)]
    pub search: SearchConfig,

    /// Score fusion configuration.
    #[serde(default)]
    pub fusion: FusionConfig,

    /// Reranking configuration.
    #[serde(default)]
    pub rerank: RerankConfig,

    /// Domain classification configuration.
    #[serde(default)]
    pub domain: DomainConfig,

    /// Prompt assembly configuration.
    #[serde(default)]
    pub prompt: PromptConfig,
}

/// Retrieval fan-out configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default number of final results.
    #[serde(default = "default_top_k")]
    pub default_top_k: u32,

    /// Upper bound on requested results.
    #[serde(default = "default_max_top_k")]
    pub max_top_k: u32,

    /// Each backend is asked for `top_k * fetch_multiplier` candidates
    /// to give fusion headroom.
    #[serde(default = "default_fetch_multiplier")]
    pub fetch_multiplier: u32,

    /// Floor on the per-backend fetch size.
    #[serde(default = "default_min_fetch")]
    pub min_fetch: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            max_top_k: 100,
            fetch_multiplier: 2,
            min_fetch: 20,
        }
    }
}

/// Score fusion weights.
///
/// The weights need not sum to 1; fused scores are comparable only
/// within one fusion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Weight applied to normalized semantic scores.
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f32,

    /// Weight applied to normalized lexical scores.
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            semantic_weight: 0.6,
            lexical_weight: 0.4,
        }
    }
}

/// Reranking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    /// Depth of the fused shortlist handed to the relevance scorer.
    /// Candidates beyond this keep their fused order.
    #[serde(default = "default_rerank_top_n")]
    pub top_n: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self { top_n: 20 }
    }
}

/// Domain classification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Number of top-ranked candidates the classifier inspects.
    #[serde(default = "default_probe_depth")]
    pub probe_depth: usize,

    /// Minimum weighted hit count before a non-generic label is
    /// assigned.
    #[serde(default = "default_min_hits")]
    pub min_hits: u32,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            probe_depth: 5,
            min_hits: 2,
        }
    }
}

/// Prompt assembly configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptConfig {
    /// When set, overrides every strategy's built-in context budget.
    #[serde(default)]
    pub max_context_chars: Option<usize>,
}

// Default value functions

fn default_top_k() -> u32 {
    5
}

fn default_max_top_k() -> u32 {
    100
}

fn default_fetch_multiplier() -> u32 {
    2
}

fn default_min_fetch() -> u32 {
    20
}

fn default_semantic_weight() -> f32 {
    0.6
}

fn default_lexical_weight() -> f32 {
    0.4
}

fn default_rerank_top_n() -> usize {
    20
}

fn default_probe_depth() -> usize {
    5
}

fn default_min_hits() -> u32 {
    2
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| QaError::Config {
            message: format!("Failed to parse config: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default paths.
    pub fn load_default() -> Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("fuseqa").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        let local_config = PathBuf::from("fuseqa.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        // Return defaults
        Ok(Self::default())
    }

    /// Check that all tunables are usable.
    pub fn validate(&self) -> Result<()> {
        let ws = self.fusion.semantic_weight;
        let wl = self.fusion.lexical_weight;
        if !ws.is_finite() || !wl.is_finite() || ws < 0.0 || wl < 0.0 {
            return Err(QaError::config(
                "fusion weights must be finite and non-negative",
            ));
        }
        if ws + wl <= 0.0 {
            return Err(QaError::config("fusion weights must have a positive sum"));
        }
        if self.search.fetch_multiplier == 0 || self.search.max_top_k == 0 {
            return Err(QaError::config(
                "search.fetch_multiplier and search.max_top_k must be nonzero",
            ));
        }
        if self.rerank.top_n == 0 {
            return Err(QaError::config("rerank.top_n must be nonzero"));
        }
        if self.domain.probe_depth == 0 {
            return Err(QaError::config("domain.probe_depth must be nonzero"));
        }
        Ok(())
    }
}
