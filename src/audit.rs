//! Compliance audit logging
//!
//! Every processed interaction is recorded exactly once, including blocked
//! and cache-served responses. Entries are append-only; the only bulk
//! deletion is the operator-invoked retention `clear`.

use crate::models::{Intent, ModelTier, Query, Response, TokenUsage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// A logged interaction. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub query_id: Uuid,
    pub query_text: String,
    pub query_intent: Intent,
    pub response_id: Uuid,
    pub response_tier: ModelTier,
    pub tokens_used: TokenUsage,
    pub cached: bool,
    pub processing_ms: i64,
    pub sources: Vec<String>,
    pub disclaimers: Vec<String>,
}

/// Aggregate counts over a time window
#[derive(Debug, Clone, Serialize)]
pub struct AuditStats {
    pub total_queries: u64,
    pub cached_queries: u64,
    /// Percentage of queries served from cache
    pub cache_hit_rate: f64,
    pub total_tokens: u64,
    pub by_intent: HashMap<Intent, u64>,
    pub by_tier: HashMap<ModelTier, u64>,
}

/// Self-contained bundle suitable for handing to a regulator or auditor
#[derive(Debug, Serialize)]
struct ComplianceExport<'a> {
    user_id: &'a str,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    entry_count: usize,
    exported_at: DateTime<Utc>,
    entries: Vec<AuditEntry>,
    disclaimer: &'static str,
}

const EXPORT_DISCLAIMER: &str = "This audit log contains AI-generated content for informational \
     purposes only. All responses include appropriate disclaimers and do not constitute \
     investment advice.";

/// Append-only audit trail for AI interactions
pub struct AuditLogger {
    enabled: bool,
    entries: Mutex<Vec<AuditEntry>>,
}

impl AuditLogger {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Record an interaction. Also emits the entry as a JSON line on the
    /// `audit` tracing target for log aggregation.
    pub async fn log(&self, query: &Query, response: &Response) {
        if !self.enabled {
            return;
        }

        let sources = response
            .sources
            .iter()
            .map(|src| src.reference.clone())
            .collect();

        let entry = AuditEntry {
            id: response.id,
            timestamp: Utc::now(),
            user_id: query.user_id.clone(),
            query_id: query.id,
            query_text: query.text.clone(),
            query_intent: response.intent,
            response_id: response.id,
            response_tier: response.tier,
            tokens_used: response.tokens_used,
            cached: response.cached,
            processing_ms: response.processing_ms,
            sources,
            disclaimers: response.disclaimers.clone(),
        };

        if let Ok(line) = serde_json::to_string(&entry) {
            info!(target: "audit", "{}", line);
        }

        let mut entries = self.entries.lock().await;
        entries.push(entry);
    }

    /// Entries for a user since a lower-bound timestamp, newest first.
    /// Walks the whole log in the worst case; `clear` is the retention
    /// mechanism that keeps this bounded.
    pub async fn get_entries(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Vec<AuditEntry> {
        let entries = self.entries.lock().await;

        entries
            .iter()
            .rev()
            .filter(|entry| entry.user_id == user_id && entry.timestamp > since)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Aggregate statistics over entries at or after `since`
    pub async fn get_stats(&self, since: DateTime<Utc>) -> AuditStats {
        let entries = self.entries.lock().await;

        let mut total_queries = 0u64;
        let mut cached_queries = 0u64;
        let mut total_tokens = 0u64;
        let mut by_intent: HashMap<Intent, u64> = HashMap::new();
        let mut by_tier: HashMap<ModelTier, u64> = HashMap::new();

        for entry in entries.iter() {
            if entry.timestamp < since {
                continue;
            }

            total_queries += 1;
            if entry.cached {
                cached_queries += 1;
            }
            total_tokens += entry.tokens_used.total;
            *by_intent.entry(entry.query_intent).or_insert(0) += 1;
            *by_tier.entry(entry.response_tier).or_insert(0) += 1;
        }

        let cache_hit_rate = if total_queries > 0 {
            cached_queries as f64 / total_queries as f64 * 100.0
        } else {
            0.0
        };

        AuditStats {
            total_queries,
            cached_queries,
            cache_hit_rate,
            total_tokens,
            by_intent,
            by_tier,
        }
    }

    /// Export a user's entries in a date range as a pretty-printed JSON
    /// bundle for compliance review
    pub async fn export_for_compliance(
        &self,
        user_id: &str,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> crate::Result<String> {
        let entries = self.entries.lock().await;

        let matching: Vec<AuditEntry> = entries
            .iter()
            .filter(|entry| {
                entry.user_id == user_id
                    && entry.timestamp >= start_date
                    && entry.timestamp <= end_date
            })
            .cloned()
            .collect();

        let export = ComplianceExport {
            user_id,
            start_date,
            end_date,
            entry_count: matching.len(),
            exported_at: Utc::now(),
            entries: matching,
            disclaimer: EXPORT_DISCLAIMER,
        };

        Ok(serde_json::to_string_pretty(&export)?)
    }

    /// Delete entries older than `before`. Returns the number removed.
    pub async fn clear(&self, before: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock().await;
        let original = entries.len();
        entries.retain(|entry| entry.timestamp >= before);
        original - entries.len()
    }
}
