//! Scout Profit - fee-aware profit analysis and opportunity ranking.
//!
//! Pure arithmetic over scraped prices and marketplace quotes: fee
//! schedules, round-half-even money math, and the deterministic ranker
//! that turns analyses into an ordered opportunity list.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod calculator;
pub mod error;
pub mod fees;
pub mod ranker;

pub use calculator::{calculate, round2, ProfitAnalysis, ProfitCalculator, ProfitInput};
pub use error::{ProfitError, Result};
pub use fees::{FeeSchedule, Fulfillment, MarketplaceFees};
pub use ranker::{Opportunity, OpportunityRanker};
