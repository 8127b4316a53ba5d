use portfolio_ai_orchestrator::{
    claude::MockBackend,
    models::{AssetClass, Holding, Portfolio, Query},
    AdvisorConfig, AdvisorService,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::info;

fn sample_portfolio() -> Portfolio {
    Portfolio {
        id: "demo-portfolio".to_string(),
        total_value: 250_000.0,
        holdings: vec![
            Holding {
                ticker: "VOO".to_string(),
                name: "Vanguard S&P 500 ETF".to_string(),
                market_value: 150_000.0,
                cost_basis: 120_000.0,
                asset_class: AssetClass::Equity,
                sector: "Broad Market".to_string(),
                geography: "US".to_string(),
            },
            Holding {
                ticker: "ARKK".to_string(),
                name: "ARK Innovation ETF".to_string(),
                market_value: 40_000.0,
                cost_basis: 65_000.0,
                asset_class: AssetClass::Equity,
                sector: "Technology".to_string(),
                geography: "US".to_string(),
            },
            Holding {
                ticker: "BND".to_string(),
                name: "Vanguard Total Bond Market ETF".to_string(),
                market_value: 60_000.0,
                cost_basis: 62_000.0,
                asset_class: AssetClass::FixedIncome,
                sector: "Bonds".to_string(),
                geography: "US".to_string(),
            },
        ],
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    info!("Portfolio AI Orchestrator starting");

    let cfg = AdvisorConfig::from_env();

    // The demo runs against the mock backend; swap in
    // AdvisorService::with_claude(cfg) once ANTHROPIC_API_KEY is set.
    let backend = Arc::new(MockBackend::new(
        "Your equity allocation is 76% of the portfolio, concentrated in VOO. \
         ARKK carries the largest unrealized loss.",
    ));
    let service = AdvisorService::new(cfg, backend);
    let sweeper = service.start_cache_sweeper();

    let portfolio = sample_portfolio();

    let questions = [
        "What is my risk exposure?",
        "What is my risk exposure?", // second run hits the cache
        "How can I optimize my taxes?",
        "Should I buy more ARKK?", // blocked by compliance rules
    ];

    for text in questions {
        let query = Query::new("demo-user", text).with_portfolio(portfolio.id.clone());
        match service.ask(&query, Some(&portfolio)).await {
            Ok(response) => {
                println!("\n=== {} ===", text);
                println!("intent: {} | tier: {} | cached: {}",
                    response.intent, response.tier, response.cached);
                println!("{}", response.text);
                for disclaimer in &response.disclaimers {
                    println!("  * {}", disclaimer);
                }
            }
            Err(e) => {
                eprintln!("query failed: {}", e);
                eprintln!("user message: {}", e.user_message());
            }
        }
    }

    // Side channel: tax-loss harvesting analysis
    let summary = service.analyze_tax_opportunities(Some(&portfolio));
    println!("\n=== TAX OPPORTUNITIES ===");
    println!(
        "unrealized gains ${:.0} / losses ${:.0} / harvestable ${:.0}",
        summary.total_unrealized_gains,
        summary.total_unrealized_losses,
        summary.harvestable_amount
    );
    for opportunity in &summary.opportunities {
        println!("- {} down ${:.0}: {}", opportunity.ticker, opportunity.unrealized_loss, opportunity.notes);
    }

    // Operational views
    let usage = service.usage_stats("demo-user").await;
    println!("\ntokens used today: {} of {}", usage.tokens_used_today, usage.daily_limit);

    let stats = service.audit_stats(Utc::now() - Duration::hours(1)).await;
    println!(
        "audited queries: {} ({} cached, {:.0}% hit rate)",
        stats.total_queries, stats.cached_queries, stats.cache_hit_rate
    );

    sweeper.stop().await;
    Ok(())
}
