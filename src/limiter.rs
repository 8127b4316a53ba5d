//! Per-user daily token budget
//!
//! A fixed-window limiter: running totals accumulate per user and the whole
//! table resets once more than 24 hours have passed since the last reset.
//! This is a coarse daily cost guardrail, not a burst smoother - that is a
//! design choice, not a bug.

use crate::error::{AdvisorError, Result};
use crate::models::TokenUsage;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::Mutex;

struct UsageWindow {
    daily_tokens: HashMap<String, u64>,
    last_reset: DateTime<Utc>,
}

/// Usage snapshot for one user
#[derive(Debug, Clone, Serialize)]
pub struct UsageStats {
    pub tokens_used_today: u64,
    pub tokens_remaining: u64,
    pub daily_limit: u64,
    pub reset_at: DateTime<Utc>,
}

/// Tracks per-user token consumption against a daily budget
pub struct UsageLimiter {
    window: Mutex<UsageWindow>,
    daily_budget: u64,
}

impl UsageLimiter {
    pub fn new(daily_budget: u64) -> Self {
        Self {
            window: Mutex::new(UsageWindow {
                daily_tokens: HashMap::new(),
                last_reset: Utc::now(),
            }),
            daily_budget,
        }
    }

    /// Reject if the user's running total already meets the daily budget.
    /// Must be called before any paid model call is issued.
    pub async fn check_limit(&self, user_id: &str) -> Result<()> {
        self.check_limit_at(user_id, Utc::now()).await
    }

    /// Add a completed call's tokens to the user's running total
    pub async fn record_usage(&self, user_id: &str, usage: &TokenUsage) {
        self.record_usage_at(user_id, usage, Utc::now()).await
    }

    pub async fn usage_stats(&self, user_id: &str) -> UsageStats {
        let window = self.window.lock().await;
        let used = window.daily_tokens.get(user_id).copied().unwrap_or(0);

        UsageStats {
            tokens_used_today: used,
            tokens_remaining: self.daily_budget.saturating_sub(used),
            daily_limit: self.daily_budget,
            reset_at: window.last_reset + Duration::hours(24),
        }
    }

    async fn check_limit_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<()> {
        let mut window = self.window.lock().await;
        Self::roll_window(&mut window, now);

        let used = window.daily_tokens.get(user_id).copied().unwrap_or(0);
        if used >= self.daily_budget {
            return Err(AdvisorError::QuotaExceeded {
                used,
                budget: self.daily_budget,
            });
        }

        Ok(())
    }

    async fn record_usage_at(&self, user_id: &str, usage: &TokenUsage, now: DateTime<Utc>) {
        let mut window = self.window.lock().await;
        Self::roll_window(&mut window, now);

        *window.daily_tokens.entry(user_id.to_string()).or_insert(0) += usage.total;
    }

    fn roll_window(window: &mut UsageWindow, now: DateTime<Utc>) {
        if now - window.last_reset > Duration::hours(24) {
            window.daily_tokens.clear();
            window.last_reset = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_under_budget_passes() {
        let limiter = UsageLimiter::new(1_000);
        limiter
            .record_usage("user-1", &TokenUsage::new(400, 100))
            .await;

        assert!(limiter.check_limit("user-1").await.is_ok());
    }

    #[tokio::test]
    async fn test_over_budget_rejected_per_user() {
        let limiter = UsageLimiter::new(1_000);
        limiter
            .record_usage("user-1", &TokenUsage::new(800, 200))
            .await;

        let err = limiter.check_limit("user-1").await.unwrap_err();
        assert!(matches!(
            err,
            AdvisorError::QuotaExceeded {
                used: 1_000,
                budget: 1_000
            }
        ));

        // Other users are unaffected
        assert!(limiter.check_limit("user-2").await.is_ok());
    }

    #[tokio::test]
    async fn test_window_rollover_resets_totals() {
        let limiter = UsageLimiter::new(1_000);
        limiter
            .record_usage("user-1", &TokenUsage::new(900, 200))
            .await;
        assert!(limiter.check_limit("user-1").await.is_err());

        // A check arriving more than 24 hours later clears the table
        let later = Utc::now() + Duration::hours(25);
        assert!(limiter.check_limit_at("user-1", later).await.is_ok());

        let stats = limiter.usage_stats("user-1").await;
        assert_eq!(stats.tokens_used_today, 0);
    }

    #[tokio::test]
    async fn test_usage_stats() {
        let limiter = UsageLimiter::new(1_000_000);
        limiter
            .record_usage("user-1", &TokenUsage::new(1_000, 500))
            .await;

        let stats = limiter.usage_stats("user-1").await;
        assert_eq!(stats.tokens_used_today, 1_500);
        assert_eq!(stats.tokens_remaining, 998_500);
        assert_eq!(stats.daily_limit, 1_000_000);
    }
}
