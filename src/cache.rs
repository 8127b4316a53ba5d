//! Semantic query cache
//!
//! Caches responses per (query, portfolio) pair with a two-stage lookup:
//! an exact hash match on the normalized query, then a lexical similarity
//! scan (Jaccard over keyword sets, weighted with a length ratio) against
//! entries for the same portfolio. The threshold is deliberately high -
//! precision over recall, because a wrong cached financial answer is worse
//! than a cache miss.
//!
//! Expired entries are also removed by a periodic sweep task with an
//! explicit start/stop lifecycle, so memory stays bounded under no-traffic
//! periods and tests can trigger a sweep deterministically.

use crate::models::Response;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::debug;

lazy_static! {
    /// English stop words removed during keyword extraction
    static ref STOP_WORDS: HashSet<&'static str> = [
        "a", "an", "the", "is", "are", "was", "were", "be", "been", "being",
        "have", "has", "had", "do", "does", "did", "will", "would", "could",
        "should", "may", "might", "must", "shall", "i", "me", "my", "we",
        "our", "you", "your", "it", "its", "this", "that", "these", "those",
        "what", "which", "who", "whom", "how", "when", "where", "why", "and",
        "or", "but", "if", "then", "so", "as", "of", "at", "by", "for",
        "with", "about", "to", "from", "in", "on", "can", "tell", "show",
    ]
    .into_iter()
    .collect();
}

/// A cached response plus the precomputed matching material for it
struct CacheEntry {
    /// Normalized query text
    query: String,
    portfolio_id: String,
    response: Response,
    keywords: HashSet<String>,
    created_at: DateTime<Utc>,
    /// Atomic so the common-case `get` can count hits under the read lock
    hit_count: AtomicU64,
}

/// Cache statistics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub total_hits: u64,
    pub ttl_secs: u64,
}

/// Response cache with exact and approximate matching
pub struct QueryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: chrono::Duration,
    threshold: f64,
    max_entries: usize,
}

impl QueryCache {
    pub fn new(ttl: Duration, threshold: f64, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl)
                .unwrap_or_else(|_| chrono::Duration::hours(1)),
            threshold,
            max_entries,
        }
    }

    /// Retrieve a cached response. Returns a deep copy; mutating the result
    /// never affects the cached entry or other readers.
    pub async fn get(&self, query: &str, portfolio_id: &str) -> Option<Response> {
        let entries = self.entries.read().await;
        let now = Utc::now();

        // Exact match first
        let hash = hash_query(query, portfolio_id);
        if let Some(entry) = entries.get(&hash) {
            if now - entry.created_at < self.ttl {
                entry.hit_count.fetch_add(1, Ordering::Relaxed);
                return Some(entry.response.clone());
            }
        }

        // Approximate match over same-portfolio entries
        let normalized = normalize_query(query);
        let keywords = extract_keywords(query);

        for entry in entries.values() {
            if entry.portfolio_id != portfolio_id {
                continue;
            }
            if now - entry.created_at >= self.ttl {
                continue;
            }

            let score = similarity(&normalized, &keywords, entry);
            if score >= self.threshold {
                entry.hit_count.fetch_add(1, Ordering::Relaxed);
                return Some(entry.response.clone());
            }
        }

        None
    }

    /// Store a response, evicting the oldest entries on overflow
    pub async fn set(&self, query: &str, portfolio_id: &str, response: Response) {
        let mut entries = self.entries.write().await;

        if entries.len() >= self.max_entries {
            evict_oldest(&mut entries, self.max_entries);
        }

        let hash = hash_query(query, portfolio_id);
        entries.insert(
            hash,
            CacheEntry {
                query: normalize_query(query),
                portfolio_id: portfolio_id.to_string(),
                response,
                keywords: extract_keywords(query),
                created_at: Utc::now(),
                hit_count: AtomicU64::new(0),
            },
        );
    }

    /// Remove all entries for a portfolio (called when holdings change)
    pub async fn invalidate(&self, portfolio_id: &str) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.portfolio_id != portfolio_id);
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;

        let total_hits = entries
            .values()
            .map(|e| e.hit_count.load(Ordering::Relaxed))
            .sum();

        CacheStats {
            entries: entries.len(),
            max_entries: self.max_entries,
            total_hits,
            ttl_secs: self.ttl.num_seconds().max(0) as u64,
        }
    }

    /// Delete every expired entry. Returns the number removed. Called by
    /// the sweeper task, and directly from tests.
    pub async fn sweep_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let now = Utc::now();
        let before = entries.len();
        entries.retain(|_, entry| now - entry.created_at < self.ttl);
        before - entries.len()
    }

}

/// Handle to the running sweep task
pub struct CacheSweeper {
    shutdown: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl CacheSweeper {
    /// Spawn the periodic TTL sweep task over `cache`. The returned handle
    /// must be kept; dropping it leaves the task running, `stop` shuts it
    /// down cleanly.
    pub fn spawn(cache: Arc<QueryCache>, interval: Duration) -> Self {
        let shutdown = Arc::new(Notify::new());
        let shutdown_rx = Arc::clone(&shutdown);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // interval's first tick fires immediately; skip it
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = cache.sweep_expired().await;
                        if removed > 0 {
                            debug!(removed, "cache sweep removed expired entries");
                        }
                    }
                    _ = shutdown_rx.notified() => break,
                }
            }
        });

        Self { shutdown, handle }
    }

    /// Stop the sweep task and wait for it to exit
    pub async fn stop(self) {
        self.shutdown.notify_one();
        let _ = self.handle.await;
    }
}

/// Deterministic cache key: sha256 of the normalized query and portfolio id
fn hash_query(query: &str, portfolio_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_query(query).as_bytes());
    hasher.update(b"|");
    hasher.update(portfolio_id.as_bytes());
    hex::encode(hasher.finalize())
}

/// Standardize query text for hashing and comparison: lower-case, collapse
/// whitespace, keep only letters, digits, space, `$`, `%`.
fn normalize_query(query: &str) -> String {
    let lowered = query.to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");

    collapsed
        .chars()
        .filter(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || *c == ' ' || *c == '$' || *c == '%'
        })
        .collect()
}

/// Extract the significant terms from a query
fn extract_keywords(query: &str) -> HashSet<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| ".,!?;:'\"".contains(c)))
        .filter(|word| word.len() >= 2 && !STOP_WORDS.contains(word))
        .map(str::to_string)
        .collect()
}

/// Weighted similarity: Jaccard over keyword sets plus a length ratio
fn similarity(normalized: &str, keywords: &HashSet<String>, entry: &CacheEntry) -> f64 {
    if keywords.is_empty() || entry.keywords.is_empty() {
        return 0.0;
    }

    let intersection = keywords.intersection(&entry.keywords).count();
    let union = keywords.union(&entry.keywords).count();
    if union == 0 {
        return 0.0;
    }
    let jaccard = intersection as f64 / union as f64;

    let (len_a, len_b) = (normalized.len(), entry.query.len());
    let len_ratio = if len_a.max(len_b) == 0 {
        0.0
    } else {
        len_a.min(len_b) as f64 / len_a.max(len_b) as f64
    };

    jaccard * 0.7 + len_ratio * 0.3
}

/// Remove the oldest 10% of entries (minimum 1) by creation time
fn evict_oldest(entries: &mut HashMap<String, CacheEntry>, max_entries: usize) {
    let evict_count = (max_entries / 10).max(1);

    let mut by_age: Vec<(String, DateTime<Utc>)> = entries
        .iter()
        .map(|(hash, entry)| (hash.clone(), entry.created_at))
        .collect();
    by_age.sort_by_key(|(_, created_at)| *created_at);

    for (hash, _) in by_age.into_iter().take(evict_count) {
        entries.remove(&hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Intent, ModelTier, TokenUsage};
    use uuid::Uuid;

    fn test_response(text: &str) -> Response {
        Response {
            id: Uuid::new_v4(),
            query_id: Uuid::new_v4(),
            text: text.to_string(),
            sources: vec![],
            disclaimers: vec!["Educational purposes only.".to_string()],
            tier: ModelTier::Standard,
            intent: Intent::Analytical,
            tokens_used: TokenUsage::new(100, 50),
            cached: false,
            processing_ms: 42,
            timestamp: Utc::now(),
        }
    }

    fn test_cache() -> QueryCache {
        QueryCache::new(Duration::from_secs(3600), 0.92, 10_000)
    }

    #[tokio::test]
    async fn test_round_trip_returns_independent_copy() {
        let cache = test_cache();
        cache
            .set("test query", "portfolio-1", test_response("answer"))
            .await;

        let mut first = cache.get("test query", "portfolio-1").await.expect("cached");
        assert_eq!(first.text, "answer");

        // Mutating the returned clone must not corrupt the cached entry
        first.text.push_str(" MUTATED");
        first.disclaimers.clear();

        let second = cache.get("test query", "portfolio-1").await.expect("cached");
        assert_eq!(second.text, "answer");
        assert_eq!(second.disclaimers.len(), 1);
    }

    #[tokio::test]
    async fn test_portfolio_isolation() {
        let cache = test_cache();
        cache
            .set("test query", "portfolio-1", test_response("answer"))
            .await;

        assert!(cache.get("test query", "portfolio-2").await.is_none());
    }

    #[tokio::test]
    async fn test_approximate_match_on_reordered_query() {
        let cache = test_cache();
        cache
            .set(
                "show breakdown allocation portfolio",
                "portfolio-1",
                test_response("allocation answer"),
            )
            .await;

        // Same keyword set, same length, different word order: different
        // exact hash, but the similarity stage should hit.
        let hit = cache
            .get("portfolio allocation breakdown show", "portfolio-1")
            .await;
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().text, "allocation answer");
    }

    #[tokio::test]
    async fn test_dissimilar_query_misses() {
        let cache = test_cache();
        cache
            .set(
                "show breakdown allocation portfolio",
                "portfolio-1",
                test_response("allocation answer"),
            )
            .await;

        assert!(cache
            .get("what dividend income arrived last month", "portfolio-1")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache = QueryCache::new(Duration::from_millis(30), 0.92, 100);
        cache
            .set("test query", "portfolio-1", test_response("answer"))
            .await;

        assert!(cache.get("test query", "portfolio-1").await.is_some());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.get("test query", "portfolio-1").await.is_none());
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_entries() {
        let cache = QueryCache::new(Duration::from_millis(30), 0.92, 100);
        cache.set("query 1", "portfolio-1", test_response("a")).await;
        cache.set("query 2", "portfolio-2", test_response("b")).await;

        tokio::time::sleep(Duration::from_millis(60)).await;

        let removed = cache.sweep_expired().await;
        assert_eq!(removed, 2);
        assert_eq!(cache.stats().await.entries, 0);
    }

    #[tokio::test]
    async fn test_sweeper_lifecycle() {
        let cache = Arc::new(QueryCache::new(Duration::from_millis(20), 0.92, 100));
        cache.set("query 1", "portfolio-1", test_response("a")).await;

        let sweeper = CacheSweeper::spawn(Arc::clone(&cache), Duration::from_millis(25));
        tokio::time::sleep(Duration::from_millis(80)).await;
        sweeper.stop().await;

        assert_eq!(cache.stats().await.entries, 0);
    }

    #[tokio::test]
    async fn test_invalidate_is_scoped_to_portfolio() {
        let cache = test_cache();
        cache.set("query 1", "portfolio-1", test_response("a")).await;
        cache.set("query 2", "portfolio-1", test_response("b")).await;
        cache.set("query 3", "portfolio-2", test_response("c")).await;

        cache.invalidate("portfolio-1").await;

        assert!(cache.get("query 1", "portfolio-1").await.is_none());
        assert!(cache.get("query 2", "portfolio-1").await.is_none());
        assert!(cache.get("query 3", "portfolio-2").await.is_some());
    }

    #[tokio::test]
    async fn test_eviction_bounds_size() {
        let cache = QueryCache::new(Duration::from_secs(3600), 0.92, 10);

        for i in 0..25 {
            cache
                .set(
                    &format!("distinct cache capacity query number {}", i),
                    "portfolio-1",
                    test_response("x"),
                )
                .await;
            assert!(cache.stats().await.entries <= 10);
        }
    }

    #[tokio::test]
    async fn test_stats_counts_hits() {
        let cache = test_cache();
        cache.set("query 1", "portfolio-1", test_response("a")).await;

        cache.get("query 1", "portfolio-1").await;
        cache.get("query 1", "portfolio-1").await;
        cache.get("missing", "portfolio-1").await;

        let stats = cache.stats().await;
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.total_hits, 2);
        assert_eq!(stats.max_entries, 10_000);
    }

    #[test]
    fn test_normalize_query() {
        assert_eq!(
            normalize_query("  What's   my  $500 GAIN (%) today?! "),
            "whats my $500 gain % today"
        );
    }

    #[test]
    fn test_extract_keywords_drops_stop_words() {
        let keywords = extract_keywords("What is my portfolio allocation, really?");
        assert!(keywords.contains("portfolio"));
        assert!(keywords.contains("allocation"));
        assert!(keywords.contains("really"));
        assert!(!keywords.contains("what"));
        assert!(!keywords.contains("is"));
        assert!(!keywords.contains("my"));
    }
}
