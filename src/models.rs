//! Core data models for the query orchestration service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

//
// ================= Intent =================
//

/// Closed taxonomy of query purposes. Classification is rule-based and
/// deterministic; see `classifier`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// FAQ, definitions
    Simple,
    /// Portfolio analysis
    Analytical,
    /// Tax optimization
    Tax,
    /// Deep research
    Research,
    /// Compare holdings
    Comparison,
    /// Future scenarios
    Projection,
    /// Risk assessment
    Risk,
    /// Regulatory questions
    Compliance,
    /// Blocked queries
    Unsupported,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Intent::Simple => "simple",
            Intent::Analytical => "analytical",
            Intent::Tax => "tax",
            Intent::Research => "research",
            Intent::Comparison => "comparison",
            Intent::Projection => "projection",
            Intent::Risk => "risk",
            Intent::Compliance => "compliance",
            Intent::Unsupported => "unsupported",
        };
        write!(f, "{}", s)
    }
}

//
// ================= Model Tiers =================
//

/// Backend model configurations, ordered cheapest to most capable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// Fast and cheap for simple queries
    Fast,
    /// Balanced for portfolio analysis
    Standard,
    /// Most capable for deep research
    Deep,
}

/// Cost per million tokens for a tier
#[derive(Debug, Clone, Copy)]
pub struct TierRates {
    pub input: f64,
    pub output: f64,
}

impl ModelTier {
    /// Concrete model identifier sent to the API
    pub fn api_model(&self) -> &'static str {
        match self {
            ModelTier::Fast => "claude-3-haiku-20240307",
            ModelTier::Standard => "claude-sonnet-4-20250514",
            ModelTier::Deep => "claude-opus-4-20250514",
        }
    }

    /// Per-million-token pricing for this tier
    pub fn rates(&self) -> TierRates {
        match self {
            ModelTier::Fast => TierRates {
                input: 0.25,
                output: 1.25,
            },
            ModelTier::Standard => TierRates {
                input: 3.00,
                output: 15.00,
            },
            ModelTier::Deep => TierRates {
                input: 15.00,
                output: 75.00,
            },
        }
    }

    pub fn is_cheapest(&self) -> bool {
        matches!(self, ModelTier::Fast)
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModelTier::Fast => "fast",
            ModelTier::Standard => "standard",
            ModelTier::Deep => "deep",
        };
        write!(f, "{}", s)
    }
}

//
// ================= Query / Response =================
//

/// A user query with optional portfolio scope and key/value context.
/// Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub id: Uuid,
    pub user_id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio_id: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl Query {
    pub fn new(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            text: text.into(),
            portfolio_id: None,
            context: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_portfolio(mut self, portfolio_id: impl Into<String>) -> Self {
        self.portfolio_id = Some(portfolio_id.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// An answer produced by the orchestrator. `Clone` is a deep copy (all
/// collections are owned), which is what lets the cache hand out
/// independent copies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: Uuid,
    pub query_id: Uuid,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disclaimers: Vec<String>,
    pub tier: ModelTier,
    pub intent: Intent,
    pub tokens_used: TokenUsage,
    pub cached: bool,
    pub processing_ms: i64,
    pub timestamp: DateTime<Utc>,
}

/// A data source citation attached to a response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    /// "holding", "document", "market_data"
    pub kind: String,
    pub reference: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Token consumption for a single model call.
/// `total` always equals `input + output`; construct via `new`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

impl TokenUsage {
    pub fn new(input: u64, output: u64) -> Self {
        Self {
            input,
            output,
            total: input + output,
        }
    }
}

//
// ================= Portfolio Snapshot =================
//
// Read-only input contract from the portfolio subsystem. The orchestrator
// never writes back to it.
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Equity,
    FixedIncome,
    Alternative,
    Crypto,
    Cash,
    Other,
}

impl AssetClass {
    pub fn display_name(&self) -> &'static str {
        match self {
            AssetClass::Equity => "Equity",
            AssetClass::FixedIncome => "Fixed Income",
            AssetClass::Alternative => "Alternative",
            AssetClass::Crypto => "Crypto",
            AssetClass::Cash => "Cash",
            AssetClass::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub ticker: String,
    pub name: String,
    pub market_value: f64,
    pub cost_basis: f64,
    pub asset_class: AssetClass,
    /// Technology, Healthcare, etc.
    pub sector: String,
    /// US, International, Emerging
    pub geography: String,
}

impl Holding {
    /// Unrealized gain (positive) or loss (negative)
    pub fn gain_loss(&self) -> f64 {
        self.market_value - self.cost_basis
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: String,
    pub total_value: f64,
    pub holdings: Vec<Holding>,
}
