//! Portfolio AI Orchestrator
//!
//! An orchestration layer between a portfolio application and a hosted LLM
//! API that turns free-text portfolio questions into policy-compliant,
//! cost-bounded, auditable answers:
//! - Classifies intent with an ordered rule table and compliance blocklist
//! - Routes each query to a model tier by intent and complexity
//! - Avoids redundant model calls with an exact + lexical-similarity cache
//! - Enforces per-user daily token budgets
//! - Records every interaction in an append-only audit trail
//! - Analyzes tax-loss harvesting opportunities as a side channel
//!
//! PER REQUEST:
//! CLASSIFY → BLOCKLIST → QUOTA → CACHE → ROUTE → CALL → RECORD → AUDIT

pub mod audit;
pub mod cache;
pub mod classifier;
pub mod claude;
pub mod config;
pub mod error;
pub mod limiter;
pub mod models;
pub mod router;
pub mod service;
pub mod tax;

pub use error::{AdvisorError, Result};

// Re-export common types
pub use config::AdvisorConfig;
pub use models::*;
pub use service::AdvisorService;
