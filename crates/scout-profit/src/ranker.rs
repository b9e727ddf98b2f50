//! Opportunity filtering, dedup, and ranking.

use crate::calculator::{round2, ProfitAnalysis};
use scout_core::config::ScoringConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A ranked, thresholded arbitrage opportunity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    /// 1-based position in the ranked output
    pub rank: u32,
    /// Composite score the ordering is based on
    pub score: f64,
    /// The analysis behind the opportunity
    pub analysis: ProfitAnalysis,
}

/// Ranks profit analyses into a deterministic opportunity list.
///
/// Filter by the job thresholds, dedupe (item, marketplace) pairs keeping
/// the highest margin, then sort descending by
/// `net_profit * w_profit + margin_pct * w_margin` with ties broken by ROI
/// descending, then earliest quote observation. Inputs are never mutated;
/// ranking the same set twice yields the identical order.
#[derive(Debug, Clone)]
pub struct OpportunityRanker {
    config: ScoringConfig,
}

impl OpportunityRanker {
    #[must_use]
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn rank(&self, analyses: &[ProfitAnalysis]) -> Vec<Opportunity> {
        let mut best: HashMap<(String, scout_core::Marketplace), &ProfitAnalysis> =
            HashMap::new();

        for analysis in analyses {
            if analysis.net_profit < self.config.min_profit
                || analysis.margin_pct < self.config.min_margin_pct
            {
                continue;
            }
            let key = (analysis.item.item_key(), analysis.quote.marketplace);
            match best.get(&key) {
                Some(existing) if existing.margin_pct >= analysis.margin_pct => {}
                _ => {
                    best.insert(key, analysis);
                }
            }
        }

        let mut scored: Vec<(f64, &ProfitAnalysis)> = best
            .into_values()
            .map(|analysis| (self.score(analysis), analysis))
            .collect();

        scored.sort_by(|(score_a, a), (score_b, b)| {
            score_b
                .total_cmp(score_a)
                .then_with(|| b.roi_pct.total_cmp(&a.roi_pct))
                .then_with(|| a.quote.observed_at.cmp(&b.quote.observed_at))
                // Final key so equal-in-all-respects entries still order
                // identically across runs.
                .then_with(|| a.item.item_key().cmp(&b.item.item_key()))
        });

        scored
            .into_iter()
            .enumerate()
            .map(|(i, (score, analysis))| Opportunity {
                rank: u32::try_from(i + 1).unwrap_or(u32::MAX),
                score,
                analysis: analysis.clone(),
            })
            .collect()
    }

    fn score(&self, analysis: &ProfitAnalysis) -> f64 {
        round2(analysis.net_profit * self.config.w_profit
            + analysis.margin_pct * self.config.w_margin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use scout_core::{
        Condition, DealType, InventoryItem, Marketplace, PriceQuote, ProductIdent, Retailer,
        StoreId,
    };

    fn analysis(
        sku: &str,
        marketplace: Marketplace,
        net_profit: f64,
        margin_pct: f64,
        roi_pct: f64,
        observed_offset_secs: i64,
    ) -> ProfitAnalysis {
        let observed_at = Utc::now() + Duration::seconds(observed_offset_secs);
        let ident = ProductIdent::sku(sku, "test product");
        ProfitAnalysis {
            item: InventoryItem {
                retailer: Retailer::Walmart,
                store_id: StoreId::new("2648").expect("valid store"),
                ident: ident.clone(),
                product_name: "test product".to_string(),
                brand: None,
                category: None,
                current_price: 10.0,
                was_price: None,
                discount_percent: None,
                deal_type: DealType::Clearance,
                product_url: None,
                observed_at,
            },
            quote: PriceQuote {
                marketplace,
                ident,
                price: 30.0,
                shipping_cost: 0.0,
                condition: Condition::New,
                listing_id: None,
                listing_url: None,
                listing_title: None,
                low_confidence: false,
                observed_at,
            },
            sales_tax_amount: 0.8,
            total_buy_cost: 10.8,
            referral_fee: 4.5,
            fulfillment_fee: 2.5,
            payment_fee: 0.0,
            closing_fee: 0.0,
            total_fees: 7.0,
            shipping_cost: 0.0,
            net_profit,
            margin_pct,
            roi_pct,
            low_confidence: false,
        }
    }

    fn ranker() -> OpportunityRanker {
        OpportunityRanker::new(ScoringConfig {
            w_profit: 1.0,
            w_margin: 1.0,
            min_profit: 5.0,
            min_margin_pct: 20.0,
        })
    }

    #[test]
    fn test_thresholds_filter() {
        let analyses = vec![
            analysis("a", Marketplace::Amazon, 12.0, 40.0, 110.0, 0),
            analysis("b", Marketplace::Amazon, 4.0, 40.0, 110.0, 0),
            analysis("c", Marketplace::Amazon, 12.0, 15.0, 110.0, 0),
        ];
        let ranked = ranker().rank(&analyses);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].analysis.item.ident.key(), "sku:a");
    }

    #[test]
    fn test_dedupe_keeps_highest_margin() {
        let analyses = vec![
            analysis("a", Marketplace::Amazon, 10.0, 30.0, 90.0, 0),
            analysis("a", Marketplace::Amazon, 9.0, 45.0, 85.0, 0),
            analysis("a", Marketplace::Ebay, 8.0, 25.0, 70.0, 0),
        ];
        let ranked = ranker().rank(&analyses);
        // Same item on two marketplaces survives as two opportunities
        assert_eq!(ranked.len(), 2);
        let amazon = ranked
            .iter()
            .find(|o| o.analysis.quote.marketplace == Marketplace::Amazon)
            .expect("amazon entry");
        assert_eq!(amazon.analysis.margin_pct, 45.0);
    }

    #[test]
    fn test_ordering_by_score_then_roi() {
        let analyses = vec![
            analysis("low", Marketplace::Amazon, 10.0, 30.0, 50.0, 0),
            analysis("high", Marketplace::Amazon, 20.0, 40.0, 80.0, 0),
            // Same score as "low" (10+30 == 15+25), higher ROI wins the tie
            analysis("tie", Marketplace::Amazon, 15.0, 25.0, 95.0, 0),
        ];
        let ranked = ranker().rank(&analyses);
        let order: Vec<&str> = ranked
            .iter()
            .map(|o| match &o.analysis.item.ident {
                ProductIdent::Sku { retailer_sku, .. } => retailer_sku.as_str(),
                ProductIdent::Upc(_) => "upc",
            })
            .collect();
        assert_eq!(order, vec!["high", "tie", "low"]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[2].rank, 3);
    }

    #[test]
    fn test_full_tie_broken_by_earliest_observation() {
        let analyses = vec![
            analysis("later", Marketplace::Amazon, 10.0, 30.0, 90.0, 100),
            analysis("earlier", Marketplace::Amazon, 10.0, 30.0, 90.0, 0),
        ];
        let ranked = ranker().rank(&analyses);
        assert_eq!(ranked[0].analysis.item.ident.key(), "sku:earlier");
    }

    #[test]
    fn test_reranking_is_deterministic() {
        let analyses: Vec<ProfitAnalysis> = (0..20)
            .map(|i| {
                analysis(
                    &format!("p{i}"),
                    if i % 2 == 0 {
                        Marketplace::Amazon
                    } else {
                        Marketplace::Ebay
                    },
                    5.0 + f64::from(i),
                    20.0 + f64::from(i),
                    50.0,
                    i64::from(i),
                )
            })
            .collect();
        let ranker = ranker();
        let first: Vec<String> = ranker
            .rank(&analyses)
            .iter()
            .map(|o| o.analysis.item.item_key())
            .collect();
        let second: Vec<String> = ranker
            .rank(&analyses)
            .iter()
            .map(|o| o.analysis.item.item_key())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_input() {
        assert!(ranker().rank(&[]).is_empty());
    }
}
