//! Pure profit arithmetic.
//!
//! Every monetary result is rounded to two decimals with round-half-even so
//! repeated aggregation doesn't drift. The arithmetic is:
//!
//! ```text
//! totalBuyCost = buyPrice + buyPrice * salesTaxRate
//! platformFee  = sellPrice * referralRate + fulfillmentFee + paymentFee + closingFee
//! netProfit    = sellPrice - totalBuyCost - platformFee - shippingCost
//! marginPct    = netProfit / sellPrice * 100
//! roiPct       = netProfit / totalBuyCost * 100
//! ```

use crate::error::{ProfitError, Result};
use crate::fees::FeeSchedule;
use scout_core::config::ProfitConfig;
use scout_core::{InventoryItem, Marketplace, PriceQuote};
use serde::{Deserialize, Serialize};

/// Round to two decimals, ties to even.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Scalar inputs to one profit calculation.
#[derive(Debug, Clone)]
pub struct ProfitInput {
    pub buy_price: f64,
    pub sales_tax_rate: f64,
    pub sell_price: f64,
    pub marketplace: Marketplace,
    pub category: Option<String>,
    /// Seller's outbound shipping cost, zero when fulfillment covers it
    pub shipping_cost: f64,
}

/// One analyzed (item, quote) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfitAnalysis {
    /// The store item being bought
    pub item: InventoryItem,
    /// The marketplace quote being sold against
    pub quote: PriceQuote,

    /// Sales tax paid on the buy
    pub sales_tax_amount: f64,
    /// Buy price plus tax
    pub total_buy_cost: f64,
    /// Referral / final value fee
    pub referral_fee: f64,
    /// Fulfillment fee (FBA estimate for Amazon)
    pub fulfillment_fee: f64,
    /// Payment processing fee
    pub payment_fee: f64,
    /// Media closing fee
    pub closing_fee: f64,
    /// Sum of all marketplace fees
    pub total_fees: f64,
    /// Seller outbound shipping estimate
    pub shipping_cost: f64,

    /// Sell price minus all costs
    pub net_profit: f64,
    /// Net profit as a percentage of the sell price
    pub margin_pct: f64,
    /// Net profit as a percentage of the total buy cost
    pub roi_pct: f64,

    /// Carried from the quote: the match was by name, not UPC
    pub low_confidence: bool,
}

/// Intermediate figures from the pure calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfitFigures {
    pub sales_tax_amount: f64,
    pub total_buy_cost: f64,
    pub referral_fee: f64,
    pub fulfillment_fee: f64,
    pub payment_fee: f64,
    pub closing_fee: f64,
    pub total_fees: f64,
    pub net_profit: f64,
    pub margin_pct: f64,
    pub roi_pct: f64,
}

/// Compute profit figures for one input against a fee schedule.
///
/// Deterministic and pure: identical inputs always yield identical output.
pub fn calculate(input: &ProfitInput, schedule: &FeeSchedule) -> Result<ProfitFigures> {
    if input.sell_price <= 0.0 {
        return Err(ProfitError::InvalidInput(format!(
            "sell price must be positive, got {}",
            input.sell_price
        )));
    }

    let sales_tax_amount = round2(input.buy_price * input.sales_tax_rate);
    let total_buy_cost = round2(input.buy_price + input.buy_price * input.sales_tax_rate);
    if total_buy_cost <= 0.0 {
        return Err(ProfitError::InvalidInput(format!(
            "total buy cost must be positive, got {total_buy_cost}"
        )));
    }

    let fees = schedule.for_marketplace(input.marketplace);
    let category = input.category.as_deref();

    let referral_fee = round2(input.sell_price * fees.referral_rate_for(category));
    let fulfillment_fee = round2(fees.fulfillment.fee(input.sell_price));
    let payment_fee = round2(input.sell_price * fees.payment_rate + fees.payment_fixed);
    let closing_fee = round2(fees.closing_fee_for(category));
    let total_fees = round2(referral_fee + fulfillment_fee + payment_fee + closing_fee);

    let net_profit = round2(input.sell_price - total_buy_cost - total_fees - input.shipping_cost);
    let margin_pct = round2(net_profit / input.sell_price * 100.0);
    let roi_pct = round2(net_profit / total_buy_cost * 100.0);

    Ok(ProfitFigures {
        sales_tax_amount,
        total_buy_cost,
        referral_fee,
        fulfillment_fee,
        payment_fee,
        closing_fee,
        total_fees,
        net_profit,
        margin_pct,
        roi_pct,
    })
}

/// Stateful convenience wrapper binding buy-side assumptions and a schedule.
#[derive(Debug, Clone)]
pub struct ProfitCalculator {
    schedule: FeeSchedule,
    config: ProfitConfig,
}

impl ProfitCalculator {
    #[must_use]
    pub fn new(schedule: FeeSchedule, config: ProfitConfig) -> Self {
        Self { schedule, config }
    }

    /// Analyze one (item, quote) pair.
    ///
    /// Outbound shipping applies only where the schedule says the seller
    /// ships; the buyer-paid shipping on the quote is part of the listing
    /// comp, not a seller cost, and is deliberately excluded here.
    pub fn analyze(&self, item: &InventoryItem, quote: &PriceQuote) -> Result<ProfitAnalysis> {
        let fees = self.schedule.for_marketplace(quote.marketplace);
        let shipping_cost = if fees.seller_ships {
            self.config.default_shipping_cost
        } else {
            0.0
        };

        let input = ProfitInput {
            buy_price: item.current_price,
            sales_tax_rate: self.config.sales_tax_rate,
            sell_price: quote.price,
            marketplace: quote.marketplace,
            category: item.category.clone(),
            shipping_cost,
        };
        let figures = calculate(&input, &self.schedule)?;

        Ok(ProfitAnalysis {
            item: item.clone(),
            quote: quote.clone(),
            sales_tax_amount: figures.sales_tax_amount,
            total_buy_cost: figures.total_buy_cost,
            referral_fee: figures.referral_fee,
            fulfillment_fee: figures.fulfillment_fee,
            payment_fee: figures.payment_fee,
            closing_fee: figures.closing_fee,
            total_fees: figures.total_fees,
            shipping_cost,
            net_profit: figures.net_profit,
            margin_pct: figures.margin_pct,
            roi_pct: figures.roi_pct,
            low_confidence: quote.low_confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fees::{Fulfillment, MarketplaceFees};
    use std::collections::HashMap;

    fn flat_amazon_schedule(referral_rate: f64, fulfillment: f64) -> FeeSchedule {
        let mut schedule = FeeSchedule::default_us();
        schedule.amazon = MarketplaceFees {
            referral_rate,
            category_referral: HashMap::new(),
            payment_rate: 0.0,
            payment_fixed: 0.0,
            fulfillment: Fulfillment::Fixed(fulfillment),
            media_closing_fee: 0.0,
            seller_ships: false,
        };
        schedule
    }

    #[test]
    fn test_worked_example() {
        let input = ProfitInput {
            buy_price: 10.00,
            sales_tax_rate: 0.0875,
            sell_price: 29.99,
            marketplace: Marketplace::Amazon,
            category: None,
            shipping_cost: 0.0,
        };
        let figures = calculate(&input, &flat_amazon_schedule(0.15, 2.50))
            .expect("valid input");

        assert_eq!(figures.total_buy_cost, 10.88);
        assert_eq!(figures.referral_fee, 4.50);
        assert_eq!(figures.fulfillment_fee, 2.50);
        assert_eq!(figures.total_fees, 7.00);
        assert_eq!(figures.net_profit, 12.11);
        assert_eq!(figures.margin_pct, 40.38);
        assert_eq!(figures.roi_pct, 111.31);
    }

    #[test]
    fn test_round_half_even() {
        assert_eq!(round2(0.875), 0.88);
        assert_eq!(round2(0.885), 0.88);
        assert_eq!(round2(2.675), 2.68);
        assert_eq!(round2(1.005), 1.0);
        assert_eq!(round2(-0.875), -0.88);
    }

    #[test]
    fn test_deterministic() {
        let input = ProfitInput {
            buy_price: 7.49,
            sales_tax_rate: 0.08,
            sell_price: 24.99,
            marketplace: Marketplace::Ebay,
            category: Some("Toys".to_string()),
            shipping_cost: 5.0,
        };
        let schedule = FeeSchedule::default_us();
        let a = calculate(&input, &schedule).expect("valid input");
        let b = calculate(&input, &schedule).expect("valid input");
        assert_eq!(a, b);
    }

    #[test]
    fn test_ebay_fee_composition() {
        let input = ProfitInput {
            buy_price: 10.00,
            sales_tax_rate: 0.0,
            sell_price: 100.00,
            marketplace: Marketplace::Ebay,
            category: None,
            shipping_cost: 0.0,
        };
        let figures = calculate(&input, &FeeSchedule::default_us()).expect("valid input");

        // 13% final value + (2.9% + 0.30) payment
        assert_eq!(figures.referral_fee, 13.00);
        assert_eq!(figures.payment_fee, 3.20);
        assert_eq!(figures.total_fees, 16.20);
        assert_eq!(figures.net_profit, 73.80);
    }

    #[test]
    fn test_media_closing_fee_applied() {
        let input = ProfitInput {
            buy_price: 5.00,
            sales_tax_rate: 0.0,
            sell_price: 30.00,
            marketplace: Marketplace::Amazon,
            category: Some("Books".to_string()),
            shipping_cost: 0.0,
        };
        let figures = calculate(&input, &FeeSchedule::default_us()).expect("valid input");
        assert_eq!(figures.closing_fee, 1.80);
    }

    #[test]
    fn test_invalid_sell_price() {
        let input = ProfitInput {
            buy_price: 10.00,
            sales_tax_rate: 0.08,
            sell_price: 0.0,
            marketplace: Marketplace::Amazon,
            category: None,
            shipping_cost: 0.0,
        };
        assert!(matches!(
            calculate(&input, &FeeSchedule::default_us()),
            Err(ProfitError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_invalid_buy_cost() {
        let input = ProfitInput {
            buy_price: 0.0,
            sales_tax_rate: 0.08,
            sell_price: 20.0,
            marketplace: Marketplace::Amazon,
            category: None,
            shipping_cost: 0.0,
        };
        assert!(matches!(
            calculate(&input, &FeeSchedule::default_us()),
            Err(ProfitError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_negative_profit_is_valid_output() {
        let input = ProfitInput {
            buy_price: 50.00,
            sales_tax_rate: 0.08,
            sell_price: 20.00,
            marketplace: Marketplace::Amazon,
            category: None,
            shipping_cost: 0.0,
        };
        let figures = calculate(&input, &FeeSchedule::default_us()).expect("valid input");
        assert!(figures.net_profit < 0.0);
    }
}
