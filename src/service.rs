//! Query orchestration service
//!
//! Composes the classifier, router, cache, usage limiter, audit logger, and
//! model backend into the single entry point the surrounding application
//! calls. Per request: classify, blocklist check, quota check, cache lookup,
//! route, build prompts, call the model, record usage, attach disclaimers
//! and citations, cache, audit.

use crate::audit::{AuditEntry, AuditLogger, AuditStats};
use crate::cache::{CacheStats, CacheSweeper, QueryCache};
use crate::classifier::classify_intent;
use crate::claude::{ClaudeClient, ModelBackend};
use crate::config::AdvisorConfig;
use crate::error::Result;
use crate::limiter::{UsageLimiter, UsageStats};
use crate::models::{Intent, Portfolio, Query, Response, Source};
use crate::router::ModelRouter;
use crate::tax::{TaxAnalyzer, TaxSummary};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

const BLOCKED_RESPONSE_TEXT: &str = "I can't provide specific investment recommendations, guaranteed return predictions, or personalized tax advice.

However, I can help you with:
- Understanding your current portfolio allocation and risk exposure
- Explaining financial concepts and investment strategies
- Analyzing historical performance and metrics
- Comparing different asset classes and their characteristics

Please rephrase your question, and I'll do my best to provide educational information.";

const BLOCKED_RESPONSE_DISCLAIMER: &str = "This response was generated because your query appeared to request specific investment advice, which we cannot provide.";

const BASE_DISCLAIMERS: &[&str] = &[
    "This information is AI-generated and for educational purposes only.",
    "This does not constitute investment, tax, or legal advice.",
    "Past performance does not guarantee future results.",
];

/// Orchestrates portfolio queries against the model backend
pub struct AdvisorService {
    cfg: AdvisorConfig,
    backend: Arc<dyn ModelBackend>,
    cache: Arc<QueryCache>,
    router: ModelRouter,
    limiter: UsageLimiter,
    auditor: AuditLogger,
    tax_analyzer: TaxAnalyzer,
}

impl AdvisorService {
    pub fn new(cfg: AdvisorConfig, backend: Arc<dyn ModelBackend>) -> Self {
        let cache = Arc::new(QueryCache::new(
            cfg.cache_ttl,
            cfg.similarity_threshold,
            cfg.cache_max_entries,
        ));
        let router = ModelRouter::new(&cfg);
        let limiter = UsageLimiter::new(cfg.daily_token_budget);
        let auditor = AuditLogger::new(cfg.enable_audit_log);

        Self {
            cfg,
            backend,
            cache,
            router,
            limiter,
            auditor,
            tax_analyzer: TaxAnalyzer::default(),
        }
    }

    /// Build a service backed by the real Claude API
    pub fn with_claude(cfg: AdvisorConfig) -> Result<Self> {
        let client = Arc::new(ClaudeClient::new(&cfg)?);
        Ok(Self::new(cfg, client))
    }

    /// Spawn the periodic cache TTL sweep. The caller owns the handle.
    pub fn start_cache_sweeper(&self) -> CacheSweeper {
        CacheSweeper::spawn(Arc::clone(&self.cache), self.cfg.cache_sweep_interval)
    }

    /// Process a user query against a read-only portfolio snapshot.
    ///
    /// Every terminal response - blocked, cached, or fresh - is audit-logged
    /// exactly once before this returns. Quota and cache checks both happen
    /// before any model call; usage recording happens after it.
    pub async fn ask(&self, query: &Query, portfolio: Option<&Portfolio>) -> Result<Response> {
        let started = Instant::now();

        let intent = classify_intent(&query.text);
        debug!(query_id = %query.id, %intent, "classified query");

        // Blocked queries get the fixed refusal and bypass the cache
        // entirely, so compliance responses are never cached as answers.
        if intent == Intent::Unsupported {
            info!(query_id = %query.id, "query blocked by compliance rules");
            let response = self.blocked_response(query, started);
            self.auditor.log(query, &response).await;
            return Ok(response);
        }

        self.limiter.check_limit(&query.user_id).await?;

        let portfolio_key = query.portfolio_id.as_deref().unwrap_or("");

        if self.cfg.cache_enabled {
            if let Some(mut cached) = self.cache.get(&query.text, portfolio_key).await {
                debug!(query_id = %query.id, "cache hit");
                cached.cached = true;
                cached.query_id = query.id;
                cached.processing_ms = started.elapsed().as_millis() as i64;
                self.auditor.log(query, &cached).await;
                return Ok(cached);
            }
        }

        let tier = self.router.select_model(intent, &query.text);
        let complexity = self.router.analyze_complexity(&query.text);
        debug!(
            query_id = %query.id,
            %tier,
            bucket = ?complexity.bucket,
            questions = complexity.question_count,
            "routed query"
        );

        let system_prompt = build_system_prompt(portfolio);
        let user_prompt = build_user_prompt(query);

        let (text, usage) = self
            .backend
            .complete(tier, &system_prompt, &user_prompt)
            .await?;

        self.limiter.record_usage(&query.user_id, &usage).await;
        debug!(
            query_id = %query.id,
            tokens = usage.total,
            est_cost_usd = self.router.estimate_cost(tier, usage.input, usage.output),
            "model call complete"
        );

        let mut response = Response {
            id: Uuid::new_v4(),
            query_id: query.id,
            text,
            sources: Vec::new(),
            disclaimers: Vec::new(),
            tier,
            intent,
            tokens_used: usage,
            cached: false,
            processing_ms: started.elapsed().as_millis() as i64,
            timestamp: Utc::now(),
        };

        if self.cfg.enable_disclaimers {
            response.disclaimers = disclaimers_for(intent);
        }
        response.sources = extract_sources(&response.text, portfolio);

        if self.cfg.cache_enabled {
            self.cache
                .set(&query.text, portfolio_key, response.clone())
                .await;
        }
        self.auditor.log(query, &response).await;

        Ok(response)
    }

    // =============================
    // Operations consumed by handlers
    // =============================

    pub async fn usage_stats(&self, user_id: &str) -> UsageStats {
        self.limiter.usage_stats(user_id).await
    }

    pub async fn audit_entries(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Vec<AuditEntry> {
        self.auditor.get_entries(user_id, since, limit).await
    }

    pub async fn audit_stats(&self, since: DateTime<Utc>) -> AuditStats {
        self.auditor.get_stats(since).await
    }

    pub async fn export_compliance(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<String> {
        self.auditor.export_for_compliance(user_id, start, end).await
    }

    pub async fn clear_audit_before(&self, before: DateTime<Utc>) -> usize {
        self.auditor.clear(before).await
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    pub async fn invalidate_cache(&self, portfolio_id: &str) {
        self.cache.invalidate(portfolio_id).await
    }

    pub fn analyze_tax_opportunities(&self, portfolio: Option<&Portfolio>) -> TaxSummary {
        self.tax_analyzer.analyze(portfolio)
    }

    fn blocked_response(&self, query: &Query, started: Instant) -> Response {
        Response {
            id: Uuid::new_v4(),
            query_id: query.id,
            text: BLOCKED_RESPONSE_TEXT.to_string(),
            sources: Vec::new(),
            disclaimers: vec![BLOCKED_RESPONSE_DISCLAIMER.to_string()],
            tier: self.cfg.simple_tier,
            intent: Intent::Unsupported,
            tokens_used: Default::default(),
            cached: false,
            processing_ms: started.elapsed().as_millis() as i64,
            timestamp: Utc::now(),
        }
    }
}

/// System prompt: static compliance rules plus a rendered snapshot of the
/// portfolio (total value, holding count, top-10 holdings by listing order)
fn build_system_prompt(portfolio: Option<&Portfolio>) -> String {
    let mut prompt = String::from(
        "You are a portfolio analysis assistant for self-directed investors.

## Your Role
- Provide factual, data-driven portfolio analysis
- Help users understand their investments, risks, and opportunities
- Explain financial concepts clearly
- Cite specific holdings and data when answering

## Critical Rules
1. NEVER provide specific buy/sell recommendations for individual securities
2. NEVER guarantee returns or predict specific price movements
3. NEVER provide tax advice - only educational information about tax concepts
4. ALWAYS include relevant disclaimers
5. ALWAYS cite sources for numerical claims
6. If you don't have data to answer accurately, say so clearly

## Response Format
- Be concise but thorough
- Use bullet points for clarity
- Include specific numbers from the portfolio when relevant
- End with actionable next steps when appropriate
",
    );

    if let Some(portfolio) = portfolio {
        if !portfolio.holdings.is_empty() {
            prompt.push_str("\n## Current Portfolio Summary\n");
            prompt.push_str(&format!("- Total Value: ${:.2}\n", portfolio.total_value));
            prompt.push_str(&format!(
                "- Number of Holdings: {}\n",
                portfolio.holdings.len()
            ));

            prompt.push_str("\n### Top Holdings:\n");
            for holding in portfolio.holdings.iter().take(10) {
                let pct = if portfolio.total_value != 0.0 {
                    holding.market_value / portfolio.total_value * 100.0
                } else {
                    0.0
                };
                prompt.push_str(&format!(
                    "- {} ({}): ${:.2} ({:.2}%)\n",
                    holding.ticker,
                    holding.asset_class.display_name(),
                    holding.market_value,
                    pct
                ));
            }
        }
    }

    prompt
}

/// User prompt: query text plus any key/value context as bullet lines
fn build_user_prompt(query: &Query) -> String {
    let mut prompt = query.text.clone();

    if !query.context.is_empty() {
        prompt.push_str("\n\nAdditional context:\n");
        let mut keys: Vec<&String> = query.context.keys().collect();
        keys.sort();
        for key in keys {
            prompt.push_str(&format!("- {}: {}\n", key, query.context[key]));
        }
    }

    prompt
}

/// Disclaimer set for an intent: a base set plus an intent-specific caveat
fn disclaimers_for(intent: Intent) -> Vec<String> {
    let mut disclaimers: Vec<String> = BASE_DISCLAIMERS.iter().map(|s| s.to_string()).collect();

    match intent {
        Intent::Tax => disclaimers.push(
            "Consult a qualified tax professional for personalized tax advice.".to_string(),
        ),
        Intent::Risk => disclaimers.push(
            "Risk assessments are based on historical data and may not reflect future conditions."
                .to_string(),
        ),
        Intent::Projection => disclaimers.push(
            "Projections are hypothetical and based on assumptions that may not materialize."
                .to_string(),
        ),
        _ => {}
    }

    disclaimers
}

/// Scan the response text for holdings it cites, deduplicated by ticker
fn extract_sources(text: &str, portfolio: Option<&Portfolio>) -> Vec<Source> {
    let mut sources = Vec::new();

    let Some(portfolio) = portfolio else {
        return sources;
    };

    for holding in &portfolio.holdings {
        if text.contains(&holding.ticker)
            && !sources
                .iter()
                .any(|s: &Source| s.reference == holding.ticker)
        {
            sources.push(Source {
                kind: "holding".to_string(),
                reference: holding.ticker.clone(),
                description: holding.name.clone(),
                url: None,
            });
        }
    }

    sources
}
