//! Model routing and cost estimation
//!
//! Each intent has a statically configured default tier; long or
//! multi-question queries upgrade off the cheapest tier. Token and cost
//! estimates are coarse heuristics used for budgeting and observability.

use crate::config::AdvisorConfig;
use crate::models::{Intent, ModelTier};
use serde::Serialize;

/// A query is routed to a bigger model when it exceeds this length
const COMPLEX_LENGTH_THRESHOLD: usize = 500;

/// Default tier per intent. Simple lookups and quick rejections go to the
/// cheapest tier; everything touching portfolio analysis gets Standard.
const INTENT_TIER_ROUTING: &[(Intent, ModelTier)] = &[
    (Intent::Simple, ModelTier::Fast),
    (Intent::Analytical, ModelTier::Standard),
    (Intent::Tax, ModelTier::Standard),
    (Intent::Research, ModelTier::Standard),
    (Intent::Comparison, ModelTier::Fast),
    (Intent::Projection, ModelTier::Standard),
    (Intent::Risk, ModelTier::Standard),
    (Intent::Compliance, ModelTier::Standard),
    (Intent::Unsupported, ModelTier::Fast),
];

/// Selects model tiers and estimates query cost
pub struct ModelRouter {
    default_tier: ModelTier,
    complex_tier: ModelTier,
}

impl ModelRouter {
    pub fn new(cfg: &AdvisorConfig) -> Self {
        Self {
            default_tier: cfg.default_tier,
            complex_tier: cfg.complex_tier,
        }
    }

    /// Choose the tier for a query. Complex queries (long, or more than one
    /// question) are upgraded off the cheapest tier.
    pub fn select_model(&self, intent: Intent, query: &str) -> ModelTier {
        let is_complex =
            query.len() > COMPLEX_LENGTH_THRESHOLD || query.matches('?').count() > 1;

        let tier = INTENT_TIER_ROUTING
            .iter()
            .find(|(i, _)| *i == intent)
            .map(|(_, t)| *t)
            .unwrap_or(self.default_tier);

        if is_complex && tier.is_cheapest() {
            return self.complex_tier;
        }

        tier
    }

    /// Rough token count estimate: ~4 characters per token for English
    pub fn estimate_tokens(&self, text: &str) -> u64 {
        (text.len() / 4) as u64
    }

    /// Approximate dollar cost from the per-tier rate table
    pub fn estimate_cost(&self, tier: ModelTier, input_tokens: u64, output_tokens: u64) -> f64 {
        let rates = tier.rates();
        let input_cost = input_tokens as f64 / 1_000_000.0 * rates.input;
        let output_cost = output_tokens as f64 / 1_000_000.0 * rates.output;
        input_cost + output_cost
    }

    /// Detailed complexity analysis. Used for observability; routing only
    /// looks at the single upgrade rule in `select_model`.
    pub fn analyze_complexity(&self, query: &str) -> QueryComplexity {
        let token_estimate = self.estimate_tokens(query);
        let question_count = query.matches('?').count();

        let has_numbers = query.chars().any(|c| c.is_ascii_digit());

        // Potential tickers: all-uppercase words of 2-5 characters
        let has_tickers = query.split_whitespace().any(|w| {
            w.len() >= 2 && w.len() <= 5 && w.chars().all(|c| c.is_ascii_uppercase())
        });

        let bucket = if token_estimate > 200 || question_count > 2 {
            ComplexityBucket::Complex
        } else if token_estimate > 50 || question_count > 1 || has_numbers {
            ComplexityBucket::Moderate
        } else {
            ComplexityBucket::Simple
        };

        QueryComplexity {
            token_estimate,
            question_count,
            has_numbers,
            has_tickers,
            bucket,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityBucket {
    Simple,
    Moderate,
    Complex,
}

/// Complexity report for a single query
#[derive(Debug, Clone, Serialize)]
pub struct QueryComplexity {
    pub token_estimate: u64,
    pub question_count: usize,
    pub has_numbers: bool,
    pub has_tickers: bool,
    pub bucket: ComplexityBucket,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> ModelRouter {
        ModelRouter::new(&AdvisorConfig::default())
    }

    #[test]
    fn test_select_model_by_intent() {
        let r = router();

        assert_eq!(r.select_model(Intent::Simple, "short query"), ModelTier::Fast);
        assert_eq!(
            r.select_model(Intent::Analytical, "short query"),
            ModelTier::Standard
        );
        assert_eq!(r.select_model(Intent::Tax, "short query"), ModelTier::Standard);
        assert_eq!(r.select_model(Intent::Risk, "short query"), ModelTier::Standard);
        assert_eq!(
            r.select_model(Intent::Comparison, "short query"),
            ModelTier::Fast
        );
    }

    #[test]
    fn test_complex_query_upgrades_cheapest_tier() {
        let r = router();

        // Multiple questions upgrade Fast to the complex tier
        let multi = "What is VOO? And what is VTI? Which tracks more stocks?";
        assert_eq!(r.select_model(Intent::Simple, multi), ModelTier::Standard);

        // Long queries too
        let long = "a".repeat(501);
        assert_eq!(r.select_model(Intent::Simple, &long), ModelTier::Standard);

        // Standard-tier intents are unchanged by complexity
        assert_eq!(r.select_model(Intent::Risk, multi), ModelTier::Standard);
    }

    #[test]
    fn test_estimate_tokens() {
        let r = router();
        assert_eq!(r.estimate_tokens("12345678"), 2);
        assert_eq!(r.estimate_tokens(""), 0);
    }

    #[test]
    fn test_estimate_cost() {
        let r = router();

        // 1M input tokens at Fast input rate
        let cost = r.estimate_cost(ModelTier::Fast, 1_000_000, 0);
        assert!((cost - 0.25).abs() < 1e-9);

        // Standard is more expensive than Fast for identical usage
        let fast = r.estimate_cost(ModelTier::Fast, 10_000, 2_000);
        let standard = r.estimate_cost(ModelTier::Standard, 10_000, 2_000);
        assert!(standard > fast);
    }

    #[test]
    fn test_analyze_complexity_buckets() {
        let r = router();

        assert_eq!(
            r.analyze_complexity("what is VOO?").bucket,
            ComplexityBucket::Simple
        );
        assert_eq!(
            r.analyze_complexity(
                "How is my portfolio performing compared to the S&P 500 benchmark?"
            )
            .bucket,
            ComplexityBucket::Moderate
        );

        let long = "why ".repeat(250);
        assert_eq!(r.analyze_complexity(&long).bucket, ComplexityBucket::Complex);
    }

    #[test]
    fn test_analyze_complexity_flags() {
        let r = router();

        let result = r.analyze_complexity("Compare AAPL against my 2024 returns?");
        assert!(result.has_tickers);
        assert!(result.has_numbers);
        assert_eq!(result.question_count, 1);

        let plain = r.analyze_complexity("how does rebalancing work");
        assert!(!plain.has_tickers);
        assert!(!plain.has_numbers);
    }
}
