//! Marketplace fee schedules.
//!
//! The defaults mirror published US fee tables at a useful approximation:
//! Amazon takes a category referral percentage plus a size-tier FBA
//! fulfillment estimate (plus a media closing fee), eBay takes a final
//! value percentage plus a payment processing fee. Schedules are data, not
//! code, so the database can override them per marketplace/category.

use scout_core::Marketplace;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Categories that attract Amazon's variable closing fee.
const MEDIA_CATEGORIES: &[&str] = &["Books", "Music", "DVD"];

/// How a marketplace charges for getting the item to the buyer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fulfillment {
    /// Flat fee per sale (zero when the seller ships and eats shipping
    /// separately).
    Fixed(f64),
    /// Price-tiered estimate: `(price_below, fee)` bands checked in order,
    /// with a final fee for everything above the last band.
    Tiered {
        bands: Vec<(f64, f64)>,
        above: f64,
    },
}

impl Fulfillment {
    /// Fee for a sale at `sell_price`.
    #[must_use]
    pub fn fee(&self, sell_price: f64) -> f64 {
        match self {
            Self::Fixed(fee) => *fee,
            Self::Tiered { bands, above } => bands
                .iter()
                .find(|(below, _)| sell_price < *below)
                .map_or(*above, |(_, fee)| *fee),
        }
    }
}

/// One marketplace's fee structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceFees {
    /// Default referral / final value percentage of the sell price
    pub referral_rate: f64,
    /// Category-specific referral overrides
    pub category_referral: HashMap<String, f64>,
    /// Payment processing percentage of the sell price
    pub payment_rate: f64,
    /// Fixed payment processing fee per sale
    pub payment_fixed: f64,
    /// Fulfillment charge model
    pub fulfillment: Fulfillment,
    /// Closing fee applied to media categories
    pub media_closing_fee: f64,
    /// True when the seller ships directly and outbound shipping is a
    /// separate cost on top of these fees
    pub seller_ships: bool,
}

impl MarketplaceFees {
    /// Referral rate for a category, falling back to the default.
    #[must_use]
    pub fn referral_rate_for(&self, category: Option<&str>) -> f64 {
        category
            .and_then(|c| self.category_referral.get(c))
            .copied()
            .unwrap_or(self.referral_rate)
    }

    /// Variable closing fee for a category.
    #[must_use]
    pub fn closing_fee_for(&self, category: Option<&str>) -> f64 {
        match category {
            Some(c) if MEDIA_CATEGORIES.contains(&c) => self.media_closing_fee,
            _ => 0.0,
        }
    }
}

/// Fee schedules for every marketplace the pipeline sells through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub amazon: MarketplaceFees,
    pub ebay: MarketplaceFees,
}

impl FeeSchedule {
    /// Built-in US schedule.
    #[must_use]
    pub fn default_us() -> Self {
        Self {
            amazon: MarketplaceFees {
                referral_rate: 0.15,
                category_referral: HashMap::new(),
                payment_rate: 0.0,
                payment_fixed: 0.0,
                fulfillment: Fulfillment::Tiered {
                    bands: vec![(10.0, 3.22), (20.0, 4.50), (50.0, 5.50), (100.0, 6.50)],
                    above: 8.00,
                },
                media_closing_fee: 1.80,
                seller_ships: false,
            },
            ebay: MarketplaceFees {
                referral_rate: 0.13,
                category_referral: HashMap::new(),
                payment_rate: 0.029,
                payment_fixed: 0.30,
                fulfillment: Fulfillment::Fixed(0.0),
                media_closing_fee: 0.0,
                seller_ships: true,
            },
        }
    }

    /// Fees for one marketplace.
    #[must_use]
    pub fn for_marketplace(&self, marketplace: Marketplace) -> &MarketplaceFees {
        match marketplace {
            Marketplace::Amazon => &self.amazon,
            Marketplace::Ebay => &self.ebay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fba_tiers() {
        let schedule = FeeSchedule::default_us();
        let fba = &schedule.amazon.fulfillment;
        assert_eq!(fba.fee(9.99), 3.22);
        assert_eq!(fba.fee(10.00), 4.50);
        assert_eq!(fba.fee(19.99), 4.50);
        assert_eq!(fba.fee(49.99), 5.50);
        assert_eq!(fba.fee(99.99), 6.50);
        assert_eq!(fba.fee(250.00), 8.00);
    }

    #[test]
    fn test_media_closing_fee() {
        let schedule = FeeSchedule::default_us();
        assert_eq!(schedule.amazon.closing_fee_for(Some("Books")), 1.80);
        assert_eq!(schedule.amazon.closing_fee_for(Some("Toys")), 0.0);
        assert_eq!(schedule.amazon.closing_fee_for(None), 0.0);
    }

    #[test]
    fn test_category_referral_override() {
        let mut schedule = FeeSchedule::default_us();
        schedule
            .amazon
            .category_referral
            .insert("Electronics".to_string(), 0.08);
        assert_eq!(schedule.amazon.referral_rate_for(Some("Electronics")), 0.08);
        assert_eq!(schedule.amazon.referral_rate_for(Some("Toys")), 0.15);
    }

    #[test]
    fn test_ebay_payment_terms() {
        let schedule = FeeSchedule::default_us();
        assert_eq!(schedule.ebay.payment_rate, 0.029);
        assert_eq!(schedule.ebay.payment_fixed, 0.30);
        assert!(schedule.ebay.seller_ships);
        assert!(!schedule.amazon.seller_ships);
    }
}
