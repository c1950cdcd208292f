//! Reads exactly the five environment values the external-interfaces
//! section allows; no config-loading crate, matching this codebase's
//! absence of one elsewhere.

use crate::router::ModelTier;

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub budget_cap: f64,
    pub default_tier: ModelTier,
    pub q_state_path: Option<String>,
    pub llm_adapter_selector: Option<String>,
    pub degraded_mode: bool,
}

fn parse_tier(raw: &str) -> ModelTier {
    match raw.to_ascii_lowercase().as_str() {
        "flagship" => ModelTier::Flagship,
        "fast" => ModelTier::Fast,
        _ => ModelTier::Balanced,
    }
}

impl EnvConfig {
    /// Read `CJO_BUDGET_CAP`, `CJO_DEFAULT_TIER`, `CJO_QSTATE_PATH`,
    /// `CJO_LLM_ADAPTER`, `CJO_DEGRADED_MODE` from the process environment.
    pub fn from_env() -> Self {
        let budget_cap = std::env::var("CJO_BUDGET_CAP")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10.0);
        let default_tier = std::env::var("CJO_DEFAULT_TIER")
            .ok()
            .map(|v| parse_tier(&v))
            .unwrap_or(ModelTier::Balanced);
        let q_state_path = std::env::var("CJO_QSTATE_PATH").ok();
        let llm_adapter_selector = std::env::var("CJO_LLM_ADAPTER").ok();
        let degraded_mode = std::env::var("CJO_DEGRADED_MODE")
            .ok()
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            budget_cap,
            default_tier,
            q_state_path,
            llm_adapter_selector,
            degraded_mode,
        }
    }
}
