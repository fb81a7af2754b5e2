use rust_decimal::{Decimal, RoundingStrategy};

use crate::decimal::{Money, Rate, CURRENCY_DP};
use crate::interest::{DayCountConvention, InterestCalculator};

/// simple (non-compounding) interest over a term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimpleInterest {
    pub convention: DayCountConvention,
}

impl SimpleInterest {
    pub fn new(convention: DayCountConvention) -> Self {
        Self { convention }
    }
}

impl Default for SimpleInterest {
    fn default() -> Self {
        Self::new(DayCountConvention::Actual360)
    }
}

impl InterestCalculator for SimpleInterest {
    fn interest(&self, principal: Money, rate: Rate, days: u32) -> Money {
        // multiply before dividing so the only rounding is the final one
        let raw = principal.as_decimal() * rate.as_decimal() * Decimal::from(days)
            / Decimal::from(self.convention.year_basis());
        Money::from_decimal(raw.round_dp_with_strategy(CURRENCY_DP, RoundingStrategy::MidpointAwayFromZero))
    }
}
