//! Intent classifier
//!
//! Rule-based classification over normalized query text. The blocklist is
//! evaluated first and short-circuits everything else; the intent groups are
//! then evaluated in a fixed priority order. Both the order and the keyword
//! sets are a testable contract, so they live here as data rather than
//! inline conditionals.

use crate::models::Intent;

/// Phrase patterns that make a query unanswerable under compliance rules.
/// Any match classifies the query as `Unsupported` before intent matching.
const BLOCKED_PATTERNS: &[&str] = &[
    // Specific recommendations
    "should i buy",
    "should i sell",
    "buy or sell",
    "is it a good time to",
    "when should i",
    "recommend me",
    "what should i invest in",
    "pick stocks for me",
    "best stocks to buy",
    // Guaranteed returns
    "guaranteed",
    "risk-free return",
    "can't lose",
    "will definitely",
    "100% certain",
    // Market timing
    "when will the market",
    "will the stock go up",
    "price target",
    "where will",
    // Insider information
    "insider",
    "non-public",
    "confidential information",
];

/// Intent groups in priority order. The first group with any keyword hit
/// wins; a query containing both tax and risk vocabulary always resolves
/// to `Tax`.
const INTENT_RULES: &[(Intent, &[&str])] = &[
    (
        Intent::Tax,
        &[
            "tax",
            "taxes",
            "tax-loss",
            "harvest",
            "wash sale",
            "capital gain",
            "capital loss",
            "1099",
            "cost basis",
            "short-term",
            "long-term gain",
        ],
    ),
    (
        Intent::Risk,
        &[
            "risk",
            "volatility",
            "drawdown",
            "beta",
            "sharpe",
            "sortino",
            "var",
            "value at risk",
            "exposure",
            "concentrated",
            "diversif",
        ],
    ),
    (
        Intent::Projection,
        &[
            "project",
            "forecast",
            "predict",
            "future",
            "scenario",
            "what if",
            "monte carlo",
            "retirement",
            "goal",
            "will i have",
            "can i afford",
        ],
    ),
    (
        Intent::Research,
        &[
            "research",
            "analyze",
            "deep dive",
            "explain why",
            "compare to market",
            "versus benchmark",
            "historical",
            "trend",
            "pattern",
        ],
    ),
    (
        Intent::Comparison,
        &[
            "compare",
            "versus",
            "vs",
            "better than",
            "difference between",
            "which is",
            "should i choose",
        ],
    ),
    (
        Intent::Analytical,
        &[
            "portfolio",
            "allocation",
            "holdings",
            "position",
            "performance",
            "return",
            "my",
            "how am i",
            "rebalance",
            "weight",
        ],
    ),
    (
        Intent::Simple,
        &[
            "what is",
            "what are",
            "define",
            "explain",
            "how does",
            "tell me about",
            "meaning of",
        ],
    ),
];

/// Classify a query's intent. Pure function over the lower-cased text.
pub fn classify_intent(text: &str) -> Intent {
    let text = text.to_lowercase();

    if is_blocked(&text) {
        return Intent::Unsupported;
    }

    for (intent, keywords) in INTENT_RULES {
        if contains_any(&text, keywords) {
            return *intent;
        }
    }

    // Portfolio-context-first default
    Intent::Analytical
}

/// Whether the query matches the compliance blocklist. Expects
/// already-lowercased text when called internally; lowercases defensively
/// for external callers.
pub fn is_blocked(text: &str) -> bool {
    let text = text.to_lowercase();
    contains_any(&text, BLOCKED_PATTERNS)
}

fn contains_any(text: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| text.contains(p))
}
