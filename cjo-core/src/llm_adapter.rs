//! `LlmAdapter`: the opaque seam to whatever model backs a dimension scorer
//! or dog vote. No vendor HTTP client lives in this crate — adapters are a
//! Non-goal as a concrete integration, only the trait is specified.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::router::ModelTier;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub text: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cost: f64,
}

#[async_trait]
pub trait LlmAdapter: Send + Sync {
    async fn generate(&self, prompt: &str, max_tokens: u32, tier: ModelTier) -> Result<GenerationResult>;
}

/// Deterministic in-memory test double. Cost scales with tier so router
/// budget-degradation tests are exercisable without a real model.
pub struct MockLlmAdapter {
    pub cost_per_token: f64,
}

impl MockLlmAdapter {
    pub fn new() -> Self {
        Self { cost_per_token: 0.00002 }
    }

    fn tier_multiplier(tier: ModelTier) -> f64 {
        match tier {
            ModelTier::Flagship => 3.0,
            ModelTier::Balanced => 1.0,
            ModelTier::Fast => 0.3,
        }
    }
}

impl Default for MockLlmAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmAdapter for MockLlmAdapter {
    async fn generate(&self, prompt: &str, max_tokens: u32, tier: ModelTier) -> Result<GenerationResult> {
        if prompt.is_empty() {
            return Err(Error::LlmAdapter("empty prompt".into()));
        }
        let tokens_in = (prompt.len() / 4).max(1) as u64;
        let tokens_out = max_tokens.min(256) as u64;
        let cost = (tokens_in + tokens_out) as f64 * self.cost_per_token * Self::tier_multiplier(tier);

        Ok(GenerationResult {
            text: format!("mock completion for {} chars at tier {:?}", prompt.len(), tier),
            tokens_in,
            tokens_out,
            cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_adapter_rejects_empty_prompt() {
        let adapter = MockLlmAdapter::new();
        let result = adapter.generate("", 10, ModelTier::Fast).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn flagship_tier_costs_more_than_fast_tier() {
        let adapter = MockLlmAdapter::new();
        let flagship = adapter.generate("hello world", 50, ModelTier::Flagship).await.unwrap();
        let fast = adapter.generate("hello world", 50, ModelTier::Fast).await.unwrap();
        assert!(flagship.cost > fast.cost);
    }
}
