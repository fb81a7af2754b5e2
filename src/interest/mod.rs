pub mod simple;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};

pub use simple::SimpleInterest;

/// day count convention for interest calculations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayCountConvention {
    /// actual days / 360
    #[serde(rename = "ACTUAL_360")]
    Actual360,
    /// actual days / 365
    #[serde(rename = "ACTUAL_365")]
    Actual365,
}

impl DayCountConvention {
    pub fn year_basis(&self) -> u32 {
        match self {
            DayCountConvention::Actual360 => 360,
            DayCountConvention::Actual365 => 365,
        }
    }
}

/// interest calculation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestCalculation {
    pub principal: Money,
    pub rate: Rate,
    pub days: u32,
    pub interest: Money,
    pub final_amount: Money,
}

/// trait for interest calculations
pub trait InterestCalculator {
    /// interest earned over `days`, rounded to cents
    fn interest(&self, principal: Money, rate: Rate, days: u32) -> Money;

    fn calculate(&self, principal: Money, rate: Rate, days: u32) -> InterestCalculation {
        let interest = self.interest(principal, rate, days);
        InterestCalculation {
            principal,
            rate,
            days,
            interest,
            final_amount: (principal + interest).round_currency(),
        }
    }

    /// interest accrued between two dates; zero if `to` is not after `from`
    fn accrued_between(&self, principal: Money, rate: Rate, from: NaiveDate, to: NaiveDate) -> Money {
        let days = (to - from).num_days();
        if days <= 0 {
            return Money::ZERO;
        }
        self.interest(principal, rate, days as u32)
    }
}
