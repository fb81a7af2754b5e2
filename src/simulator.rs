use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};

use crate::calendar::BusinessDayAdjuster;
use crate::config::DepositConfig;
use crate::decimal::{Money, Rate};
use crate::errors::{DepositError, Result};
use crate::interest::{InterestCalculator, SimpleInterest};
use crate::rates::RateTable;

/// projected outcome of a deposit opened today
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Simulation {
    pub principal: Money,
    pub term_days: u32,
    pub rate: Rate,
    pub interest: Money,
    pub final_amount: Money,
    pub open_date: NaiveDate,
    pub maturity_date: NaiveDate,
}

/// Pre-contract quoting. Reads only; nothing is persisted.
pub struct Simulator {
    rates: RateTable,
    calculator: SimpleInterest,
    adjuster: BusinessDayAdjuster,
    recommended_terms: Vec<u32>,
    min_term_days: u32,
    max_term_days: u32,
    time: SafeTimeProvider,
}

impl Simulator {
    pub fn new(rates: RateTable, calculator: SimpleInterest, recommended_terms: Vec<u32>, time: SafeTimeProvider) -> Self {
        let defaults = DepositConfig::default();
        Self {
            rates,
            calculator,
            adjuster: BusinessDayAdjuster::new(),
            recommended_terms,
            min_term_days: defaults.min_term_days,
            max_term_days: defaults.max_term_days,
            time,
        }
    }

    /// quotes only terms a deposit could actually be opened for
    pub fn with_term_limits(mut self, min_term_days: u32, max_term_days: u32) -> Self {
        self.min_term_days = min_term_days;
        self.max_term_days = max_term_days;
        self
    }

    pub fn from_config(config: &DepositConfig, time: SafeTimeProvider) -> Self {
        Self::new(
            RateTable::from_config(config),
            SimpleInterest::new(config.day_count),
            config.recommended_terms.clone(),
            time,
        )
        .with_term_limits(config.min_term_days, config.max_term_days)
    }

    /// price at the rate table in force
    pub fn simulate(&self, principal: Money, term_days: u32) -> Result<Simulation> {
        self.validate(principal, term_days)?;
        let rate = self.rates.lookup_rate(principal, term_days);
        Ok(self.project(principal, term_days, rate))
    }

    /// price at a caller-supplied rate
    pub fn simulate_at_rate(&self, principal: Money, term_days: u32, rate: Rate) -> Result<Simulation> {
        self.validate(principal, term_days)?;
        if rate.is_negative() {
            return Err(DepositError::InvalidInput {
                message: format!("rate cannot be negative: {}", rate),
            });
        }
        Ok(self.project(principal, term_days, rate))
    }

    /// one simulation per representative term
    pub fn recommend(&self, principal: Money) -> Result<Vec<Simulation>> {
        self.recommended_terms
            .iter()
            .map(|term| self.simulate(principal, *term))
            .collect()
    }

    fn project(&self, principal: Money, term_days: u32, rate: Rate) -> Simulation {
        let open_date = self.time.now().date_naive();
        let calc = self.calculator.calculate(principal, rate, term_days);
        Simulation {
            principal,
            term_days,
            rate,
            interest: calc.interest,
            final_amount: calc.final_amount,
            open_date,
            maturity_date: self.adjuster.adjust_maturity(open_date, term_days),
        }
    }

    fn validate(&self, principal: Money, term_days: u32) -> Result<()> {
        if !principal.is_positive() {
            return Err(DepositError::InvalidPrincipal {
                amount: principal,
                reason: "principal must be positive".to_string(),
            });
        }
        if term_days == 0 || term_days < self.min_term_days || term_days > self.max_term_days {
            return Err(DepositError::InvalidTerm {
                term_days,
                minimum: self.min_term_days.max(1),
                maximum: self.max_term_days,
            });
        }
        Ok(())
    }
}
