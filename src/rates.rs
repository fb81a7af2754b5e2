use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::DepositConfig;
use crate::decimal::{Money, Rate};

/// one tier of the rate table
///
/// Terms are inclusive on both ends, amounts are `[amount_min, amount_max)`
/// with an open upper end when `amount_max` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRule {
    pub term_min_days: u32,
    pub term_max_days: u32,
    pub amount_min: Money,
    pub amount_max: Option<Money>,
    pub annual_rate_percent: Decimal,
}

impl RateRule {
    pub fn matches(&self, amount: Money, term_days: u32) -> bool {
        term_days >= self.term_min_days
            && term_days <= self.term_max_days
            && amount >= self.amount_min
            && self.amount_max.map_or(true, |max| amount < max)
    }

    pub fn overlaps(&self, other: &RateRule) -> bool {
        let terms = self.term_min_days <= other.term_max_days && other.term_min_days <= self.term_max_days;
        let below_other_max = other.amount_max.map_or(true, |max| self.amount_min < max);
        let below_self_max = self.amount_max.map_or(true, |max| other.amount_min < max);
        terms && below_other_max && below_self_max
    }

    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        if self.term_min_days > self.term_max_days {
            return Err(format!("inverted term range in {}", self.describe()));
        }
        if let Some(max) = self.amount_max {
            if max <= self.amount_min {
                return Err(format!("empty amount range in {}", self.describe()));
            }
        }
        if self.annual_rate_percent < Decimal::ZERO {
            return Err(format!("negative rate in {}", self.describe()));
        }
        Ok(())
    }

    pub(crate) fn describe(&self) -> String {
        let max = self
            .amount_max
            .map(|m| m.to_string())
            .unwrap_or_else(|| "inf".to_string());
        format!(
            "{}-{}d [{}, {}) @ {}%",
            self.term_min_days, self.term_max_days, self.amount_min, max, self.annual_rate_percent
        )
    }
}

#[derive(Debug)]
struct Tier {
    rule: RateRule,
    rate: Rate,
}

/// immutable tiered lookup from (amount, term) to an annual rate
///
/// Cloning is cheap; every clone shares the same tiers.
#[derive(Debug, Clone)]
pub struct RateTable {
    tiers: Arc<[Tier]>,
    fallback: Rate,
}

/// result of a single lookup
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLookup {
    pub principal: Money,
    pub term_days: u32,
    pub rate: Rate,
    /// true when no rule matched and the fallback was applied
    pub fallback: bool,
}

impl RateTable {
    /// builds the table, converting each quoted percentage once
    pub fn new(rules: Vec<RateRule>, fallback: Rate) -> Self {
        let tiers: Vec<Tier> = rules
            .into_iter()
            .map(|rule| Tier {
                rate: Rate::from_quoted(rule.annual_rate_percent),
                rule,
            })
            .collect();
        Self {
            tiers: tiers.into(),
            fallback,
        }
    }

    pub fn from_config(config: &DepositConfig) -> Self {
        Self::new(config.rate_rules.clone(), config.fallback_rate())
    }

    /// rate for the given amount and term; never fails
    pub fn lookup_rate(&self, amount: Money, term_days: u32) -> Rate {
        self.lookup(amount, term_days).rate
    }

    pub fn lookup(&self, amount: Money, term_days: u32) -> RateLookup {
        let matched = self
            .tiers
            .iter()
            .find(|tier| tier.rule.matches(amount, term_days));

        match matched {
            Some(tier) => RateLookup {
                principal: amount,
                term_days,
                rate: tier.rate,
                fallback: false,
            },
            None => {
                log::debug!(
                    "no rate rule for amount={} term={}d, using fallback {}",
                    amount,
                    term_days,
                    self.fallback
                );
                RateLookup {
                    principal: amount,
                    term_days,
                    rate: self.fallback,
                    fallback: true,
                }
            }
        }
    }

    /// the full table, in configuration order
    pub fn rules(&self) -> Vec<RateRule> {
        self.tiers.iter().map(|tier| tier.rule.clone()).collect()
    }

    pub fn fallback_rate(&self) -> Rate {
        self.fallback
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::from_config(&DepositConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tier_lookup() {
        let table = RateTable::default();
        assert_eq!(
            table.lookup_rate(Money::from_major(1_000), 91),
            Rate::from_percentage(dec!(3.15))
        );
        assert_eq!(
            table.lookup_rate(Money::from_major(10_000), 91),
            Rate::from_percentage(dec!(3.30))
        );
        assert_eq!(
            table.lookup_rate(Money::from_major(2_000_000), 1800),
            Rate::from_percentage(dec!(5.50))
        );
    }

    #[test]
    fn test_band_edges() {
        let table = RateTable::default();
        // term bounds are inclusive
        assert_eq!(table.lookup_rate(Money::from_major(1_000), 60), Rate::from_percentage(dec!(2.50)));
        assert_eq!(table.lookup_rate(Money::from_major(1_000), 61), Rate::from_percentage(dec!(2.85)));
        // amount upper bound is exclusive
        let just_below = Money::from_decimal(dec!(9999.99));
        assert_eq!(table.lookup_rate(just_below, 31), Rate::from_percentage(dec!(2.50)));
        assert_eq!(table.lookup_rate(Money::from_major(10_000), 31), Rate::from_percentage(dec!(2.65)));
    }

    #[test]
    fn test_fallback_never_fails() {
        let table = RateTable::default();
        let lookup = table.lookup(Money::from_major(100), 10);
        assert!(lookup.fallback);
        assert_eq!(lookup.rate, table.fallback_rate());

        let lookup = table.lookup(Money::from_major(1_000), 5_000);
        assert!(lookup.fallback);
    }

    #[test]
    fn test_at_most_one_rule_matches() {
        let table = RateTable::default();
        let rules = table.rules();
        let amounts = [0, 499, 500, 9_999, 10_000, 49_999, 50_000, 1_000_000];
        for term in [0, 30, 31, 60, 61, 90, 91, 120, 121, 180, 181, 360, 361, 720, 721, 1800, 1801] {
            for amount in amounts {
                let amount = Money::from_major(amount);
                let hits = rules.iter().filter(|r| r.matches(amount, term)).count();
                assert!(hits <= 1, "{} rules matched {} / {}d", hits, amount, term);
                // a value always comes back
                let _ = table.lookup_rate(amount, term);
            }
        }
    }

    #[test]
    fn test_rules_quoted_as_fraction_are_accepted() {
        let table = RateTable::new(
            vec![RateRule {
                term_min_days: 1,
                term_max_days: 10,
                amount_min: Money::ZERO,
                amount_max: None,
                annual_rate_percent: dec!(0.0265),
            }],
            Rate::ZERO,
        );
        assert_eq!(table.lookup_rate(Money::from_major(1), 5), Rate::from_percentage(dec!(2.65)));
    }
}
