//! Tax-loss harvesting analysis
//!
//! Pure, stateless analysis over a portfolio snapshot. Output is
//! educational only; every summary carries a fixed disclaimer set and no
//! recommendation is phrased as a directive.

use crate::models::{AssetClass, Holding, Portfolio};
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;

/// Thresholds and rates for the analysis. These are business constants with
/// reference defaults; jurisdiction- or user-specific values plug in here.
#[derive(Debug, Clone)]
pub struct TaxConfig {
    /// Minimum unrealized loss worth harvesting
    pub min_loss_threshold: f64,
    /// Flat blended rate used for per-opportunity savings estimates
    pub blended_rate: f64,
    /// Marginal rate assumed for short-term losses
    pub short_term_rate: f64,
    /// Rate assumed for long-term losses
    pub long_term_rate: f64,
    /// Harvestable total above which the summary calls it out
    pub significant_harvest_threshold: f64,
}

impl Default for TaxConfig {
    fn default() -> Self {
        Self {
            min_loss_threshold: 100.0,
            blended_rate: 0.20,
            short_term_rate: 0.24,
            long_term_rate: 0.15,
            significant_harvest_threshold: 1_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaxLotKind {
    ShortTerm,
    LongTerm,
}

/// A holding whose unrealized loss is large enough to be worth realizing
#[derive(Debug, Clone, Serialize)]
pub struct HarvestOpportunity {
    pub ticker: String,
    pub name: String,
    pub current_value: f64,
    pub cost_basis: f64,
    pub unrealized_loss: f64,
    pub loss_percent: f64,
    pub lot_kind: TaxLotKind,
    pub estimated_savings: f64,
    /// Similar-but-not-identical replacements to preserve market exposure
    pub alternatives: Vec<String>,
    pub wash_sale_risk: bool,
    pub notes: String,
}

/// Overall tax position and harvesting summary
#[derive(Debug, Clone, Serialize)]
pub struct TaxSummary {
    pub total_unrealized_gains: f64,
    pub total_unrealized_losses: f64,
    pub net_unrealized: f64,
    pub short_term_gains: f64,
    pub short_term_losses: f64,
    pub long_term_gains: f64,
    pub long_term_losses: f64,
    pub harvestable_amount: f64,
    pub estimated_tax_savings: f64,
    pub opportunities: Vec<HarvestOpportunity>,
    pub recommendations: Vec<String>,
    pub disclaimers: Vec<String>,
}

const TAX_DISCLAIMERS: &[&str] = &[
    "This analysis is for educational purposes only and does not constitute tax advice.",
    "Consult a qualified tax professional before making tax-related decisions.",
    "Tax implications vary based on individual circumstances.",
    "Wash sale rules may affect the deductibility of losses.",
];

/// Identifies tax-loss harvesting opportunities in a portfolio snapshot
pub struct TaxAnalyzer {
    cfg: TaxConfig,
}

impl TaxAnalyzer {
    pub fn new(cfg: TaxConfig) -> Self {
        Self { cfg }
    }

    /// Analyze a portfolio for harvesting opportunities. Always returns a
    /// populated summary, including for an absent or empty portfolio.
    pub fn analyze(&self, portfolio: Option<&Portfolio>) -> TaxSummary {
        self.analyze_at(portfolio, Utc::now())
    }

    fn analyze_at(&self, portfolio: Option<&Portfolio>, now: DateTime<Utc>) -> TaxSummary {
        let mut summary = TaxSummary {
            total_unrealized_gains: 0.0,
            total_unrealized_losses: 0.0,
            net_unrealized: 0.0,
            short_term_gains: 0.0,
            short_term_losses: 0.0,
            long_term_gains: 0.0,
            long_term_losses: 0.0,
            harvestable_amount: 0.0,
            estimated_tax_savings: 0.0,
            opportunities: Vec::new(),
            recommendations: Vec::new(),
            disclaimers: TAX_DISCLAIMERS.iter().map(|s| s.to_string()).collect(),
        };

        let portfolio = match portfolio {
            Some(p) if !p.holdings.is_empty() => p,
            _ => return summary,
        };

        for holding in &portfolio.holdings {
            let gain_loss = holding.gain_loss();

            if gain_loss > 0.0 {
                summary.total_unrealized_gains += gain_loss;
                // Lot dates are not in the snapshot; treat as long-term
                summary.long_term_gains += gain_loss;
            } else if gain_loss < 0.0 {
                let loss = gain_loss.abs();
                summary.total_unrealized_losses += loss;
                summary.long_term_losses += loss;

                if loss >= self.cfg.min_loss_threshold {
                    let opportunity = self.build_opportunity(holding, loss, portfolio);
                    summary.opportunities.push(opportunity);
                    summary.harvestable_amount += loss;
                }
            }
        }

        summary.net_unrealized =
            summary.total_unrealized_gains - summary.total_unrealized_losses;
        summary.estimated_tax_savings = round2(
            summary.short_term_losses * self.cfg.short_term_rate
                + summary.long_term_losses * self.cfg.long_term_rate,
        );

        // Largest loss first
        summary.opportunities.sort_by(|a, b| {
            b.unrealized_loss
                .partial_cmp(&a.unrealized_loss)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        summary.recommendations = self.build_recommendations(&summary, now);

        summary
    }

    fn build_opportunity(
        &self,
        holding: &Holding,
        loss: f64,
        portfolio: &Portfolio,
    ) -> HarvestOpportunity {
        let loss_percent = if holding.cost_basis != 0.0 {
            round2(loss / holding.cost_basis * 100.0)
        } else {
            0.0
        };

        let estimated_savings = round2(loss * self.cfg.blended_rate);
        let alternatives = find_alternatives(holding);
        let wash_sale_risk = !alternatives.is_empty() && has_related_holdings(holding, portfolio);
        let notes = build_notes(holding, loss_percent, wash_sale_risk);

        HarvestOpportunity {
            ticker: holding.ticker.clone(),
            name: holding.name.clone(),
            current_value: holding.market_value,
            cost_basis: holding.cost_basis,
            unrealized_loss: loss,
            loss_percent,
            lot_kind: TaxLotKind::LongTerm,
            estimated_savings,
            alternatives,
            wash_sale_risk,
            notes,
        }
    }

    /// The exclusion period around a sale during which repurchasing a
    /// substantially identical security disallows the loss deduction
    pub fn wash_sale_window(&self, sale_date: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let window = chrono::Duration::days(30);
        (sale_date - window, sale_date + window)
    }

    fn build_recommendations(&self, summary: &TaxSummary, now: DateTime<Utc>) -> Vec<String> {
        let mut recs = Vec::new();

        if summary.harvestable_amount > self.cfg.significant_harvest_threshold {
            recs.push(format!(
                "You have approximately ${:.0} in harvestable losses that could offset gains or income.",
                summary.harvestable_amount
            ));
        }

        if summary.total_unrealized_gains > 0.0 && summary.total_unrealized_losses > 0.0 {
            recs.push(
                "Consider pairing loss harvesting with gain realization to optimize tax impact."
                    .to_string(),
            );
        }

        if let Some(top) = summary.opportunities.first() {
            if top.loss_percent > 30.0 {
                recs.push(format!(
                    "{} has a significant loss ({:.1}%). Review if this aligns with your investment thesis.",
                    top.ticker, top.loss_percent
                ));
            }
        }

        if now.month() >= 10 {
            recs.push(
                "Year-end is approaching. Consider tax-loss harvesting before December 31 for current tax year benefits."
                    .to_string(),
            );
        }

        recs.push(
            "Remember: Capital losses can offset capital gains, plus up to $3,000 of ordinary income annually."
                .to_string(),
        );

        recs
    }
}

impl Default for TaxAnalyzer {
    fn default() -> Self {
        Self::new(TaxConfig::default())
    }
}

/// Replacement suggestions that keep market exposure without buying a
/// substantially identical security
fn find_alternatives(holding: &Holding) -> Vec<String> {
    match holding.asset_class {
        AssetClass::Equity => {
            if holding.geography == "US" {
                vec![
                    "Consider a different S&P 500 ETF (VOO -> IVV or SPY)".to_string(),
                    "Total market ETF as alternative (VTI, ITOT)".to_string(),
                ]
            } else {
                vec![
                    "Consider equivalent international ETF from different provider".to_string(),
                ]
            }
        }
        AssetClass::FixedIncome => vec![
            "Consider bond ETF from different provider".to_string(),
            "Treasury ETF as alternative to corporate bonds".to_string(),
        ],
        _ => vec!["Consult advisor for suitable alternatives".to_string()],
    }
}

/// True when another holding shares asset class, sector, and geography -
/// close enough to trip the substantially-identical test
fn has_related_holdings(holding: &Holding, portfolio: &Portfolio) -> bool {
    portfolio.holdings.iter().any(|other| {
        other.ticker != holding.ticker
            && other.asset_class == holding.asset_class
            && other.sector == holding.sector
            && other.geography == holding.geography
    })
}

fn build_notes(holding: &Holding, loss_percent: f64, wash_sale_risk: bool) -> String {
    let mut notes = format!(
        "{} is down {:.1}% from cost basis. ",
        holding.ticker, loss_percent
    );

    if loss_percent > 20.0 {
        notes.push_str("Significant loss may warrant harvesting. ");
    }

    if wash_sale_risk {
        notes.push_str(
            "CAUTION: Wash sale risk if you have similar holdings or plan to repurchase within 30 days.",
        );
    } else {
        notes.push_str(
            "Consider replacing with similar but not substantially identical investment.",
        );
    }

    notes
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn holding(ticker: &str, market_value: f64, cost_basis: f64) -> Holding {
        Holding {
            ticker: ticker.to_string(),
            name: format!("{} Inc", ticker),
            market_value,
            cost_basis,
            asset_class: AssetClass::Equity,
            sector: "Technology".to_string(),
            geography: "US".to_string(),
        }
    }

    fn test_portfolio() -> Portfolio {
        Portfolio {
            id: "portfolio-1".to_string(),
            total_value: 150_000.0,
            holdings: vec![
                holding("AAPL", 100_000.0, 80_000.0), // +20,000 gain
                holding("TSLA", 50_000.0, 65_000.0),  // -15,000 loss
            ],
        }
    }

    #[test]
    fn test_gains_losses_and_single_opportunity() {
        let analyzer = TaxAnalyzer::default();
        let summary = analyzer.analyze(Some(&test_portfolio()));

        assert_eq!(summary.total_unrealized_gains, 20_000.0);
        assert_eq!(summary.total_unrealized_losses, 15_000.0);
        assert_eq!(summary.net_unrealized, 5_000.0);
        assert_eq!(summary.opportunities.len(), 1);
        assert_eq!(summary.opportunities[0].ticker, "TSLA");
        assert_eq!(summary.harvestable_amount, 15_000.0);
        assert!(!summary.disclaimers.is_empty());
        assert!(!summary.recommendations.is_empty());
    }

    #[test]
    fn test_absent_portfolio_yields_populated_summary() {
        let analyzer = TaxAnalyzer::default();

        let summary = analyzer.analyze(None);
        assert!(summary.opportunities.is_empty());
        assert_eq!(summary.total_unrealized_gains, 0.0);
        assert!(!summary.disclaimers.is_empty());

        let empty = Portfolio {
            id: "empty".to_string(),
            total_value: 0.0,
            holdings: vec![],
        };
        let summary = analyzer.analyze(Some(&empty));
        assert!(summary.opportunities.is_empty());
    }

    #[test]
    fn test_loss_below_threshold_is_not_harvested() {
        let analyzer = TaxAnalyzer::default();
        let portfolio = Portfolio {
            id: "portfolio-1".to_string(),
            total_value: 1_000.0,
            holdings: vec![holding("SMALL", 960.0, 1_000.0)], // -$40, under $100
        };

        let summary = analyzer.analyze(Some(&portfolio));
        assert!(summary.opportunities.is_empty());
        assert_eq!(summary.total_unrealized_losses, 40.0);
    }

    #[test]
    fn test_opportunities_sorted_largest_loss_first() {
        let analyzer = TaxAnalyzer::default();
        let portfolio = Portfolio {
            id: "portfolio-1".to_string(),
            total_value: 100_000.0,
            holdings: vec![
                holding("SMLOSS", 49_000.0, 50_000.0), // -1,000
                holding("BGLOSS", 30_000.0, 45_000.0), // -15,000
                holding("MDLOSS", 19_500.0, 24_000.0), // -4,500
            ],
        };

        let summary = analyzer.analyze(Some(&portfolio));
        let tickers: Vec<&str> = summary
            .opportunities
            .iter()
            .map(|o| o.ticker.as_str())
            .collect();
        assert_eq!(tickers, vec!["BGLOSS", "MDLOSS", "SMLOSS"]);
    }

    #[test]
    fn test_wash_sale_risk_flagged_for_related_holdings() {
        let analyzer = TaxAnalyzer::default();

        // Two US equity tech holdings: the losing one carries wash-sale risk
        let related = Portfolio {
            id: "portfolio-1".to_string(),
            total_value: 100_000.0,
            holdings: vec![
                holding("MSFT", 60_000.0, 50_000.0),
                holding("NVDA", 30_000.0, 45_000.0),
            ],
        };
        let summary = analyzer.analyze(Some(&related));
        assert!(summary.opportunities[0].wash_sale_risk);

        // A lone holding has nothing substantially identical alongside it
        let lone = Portfolio {
            id: "portfolio-2".to_string(),
            total_value: 30_000.0,
            holdings: vec![holding("NVDA", 30_000.0, 45_000.0)],
        };
        let summary = analyzer.analyze(Some(&lone));
        assert!(!summary.opportunities[0].wash_sale_risk);
    }

    #[test]
    fn test_estimated_savings_uses_blended_rate() {
        let analyzer = TaxAnalyzer::default();
        let summary = analyzer.analyze(Some(&test_portfolio()));

        let opportunity = &summary.opportunities[0];
        assert_eq!(opportunity.unrealized_loss, 15_000.0);
        assert_eq!(opportunity.estimated_savings, 3_000.0); // 20% blended
    }

    #[test]
    fn test_year_end_reminder_in_q4_only() {
        let analyzer = TaxAnalyzer::default();
        let portfolio = test_portfolio();

        let november = Utc.with_ymd_and_hms(2025, 11, 15, 12, 0, 0).unwrap();
        let summary = analyzer.analyze_at(Some(&portfolio), november);
        assert!(summary
            .recommendations
            .iter()
            .any(|r| r.contains("Year-end is approaching")));

        let june = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        let summary = analyzer.analyze_at(Some(&portfolio), june);
        assert!(!summary
            .recommendations
            .iter()
            .any(|r| r.contains("Year-end is approaching")));
    }

    #[test]
    fn test_wash_sale_window_spans_sixty_days() {
        let analyzer = TaxAnalyzer::default();
        let sale = Utc.with_ymd_and_hms(2025, 3, 15, 0, 0, 0).unwrap();

        let (start, end) = analyzer.wash_sale_window(sale);
        assert_eq!(start, sale - chrono::Duration::days(30));
        assert_eq!(end, sale + chrono::Duration::days(30));
    }

    #[test]
    fn test_standing_offset_reminder_always_present() {
        let analyzer = TaxAnalyzer::default();

        let summary = analyzer.analyze(Some(&test_portfolio()));
        assert!(summary
            .recommendations
            .iter()
            .any(|r| r.contains("$3,000 of ordinary income")));
    }
}
