//! Service configuration
//!
//! Business constants (token budget, similarity threshold, cache TTL) are
//! deliberately part of this surface rather than buried in the components.

use crate::models::ModelTier;
use std::time::Duration;

/// Configuration for the orchestration service
#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    // API configuration
    pub api_key: String,
    pub base_url: String,
    pub max_retries: u32,
    pub timeout: Duration,

    // Model routing
    pub default_tier: ModelTier,
    pub complex_tier: ModelTier,
    pub simple_tier: ModelTier,
    pub max_tokens: u32,
    pub temperature: f64,

    // Cost management
    pub daily_token_budget: u64,
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,
    /// Similarity threshold for approximate cache hits. Deliberately high:
    /// a wrong cached financial answer is worse than a cache miss.
    pub similarity_threshold: f64,
    pub cache_sweep_interval: Duration,

    // Compliance
    pub enable_audit_log: bool,
    pub enable_disclaimers: bool,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.anthropic.com/v1".to_string(),
            max_retries: 3,
            timeout: Duration::from_secs(30),

            default_tier: ModelTier::Standard,
            complex_tier: ModelTier::Standard,
            simple_tier: ModelTier::Fast,
            max_tokens: 4096,
            // Low temperature for financial accuracy
            temperature: 0.2,

            daily_token_budget: 1_000_000,
            cache_enabled: true,
            cache_ttl: Duration::from_secs(3600),
            cache_max_entries: 10_000,
            similarity_threshold: 0.92,
            cache_sweep_interval: Duration::from_secs(300),

            enable_audit_log: true,
            enable_disclaimers: true,
        }
    }
}

impl AdvisorConfig {
    /// Build configuration from environment variables, falling back to
    /// production defaults. `ANTHROPIC_API_KEY` is the only variable with
    /// no default.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            cfg.api_key = key;
        }
        if let Ok(url) = std::env::var("ANTHROPIC_BASE_URL") {
            cfg.base_url = url;
        }
        if let Some(budget) = env_parse::<u64>("DAILY_TOKEN_BUDGET") {
            cfg.daily_token_budget = budget;
        }
        if let Some(secs) = env_parse::<u64>("CACHE_TTL_SECS") {
            cfg.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(threshold) = env_parse::<f64>("CACHE_SIMILARITY_THRESHOLD") {
            cfg.similarity_threshold = threshold;
        }

        cfg
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
