use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::decimal::{Money, Rate};
use crate::errors::{DepositError, Result};
use crate::interest::DayCountConvention;
use crate::rates::RateRule;

/// payout when a deposit is closed before maturity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancellationPolicy {
    /// return the principal, forfeit unpaid interest
    PrincipalOnly,
    /// return the principal plus interest accrued to the cancellation date
    PrincipalPlusAccrued,
}

/// deposit desk configuration, loaded once at start
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DepositConfig {
    pub min_term_days: u32,
    pub max_term_days: u32,
    pub min_principal: Money,
    pub max_principal: Option<Money>,
    /// applied when no rule matches, quoted as percent
    pub fallback_rate_percent: Decimal,
    pub rate_rules: Vec<RateRule>,
    pub recommended_terms: Vec<u32>,
    pub cancellation_policy: CancellationPolicy,
    pub day_count: DayCountConvention,
    /// caps how many due items one settlement run attempts
    pub settlement_batch_limit: Option<usize>,
}

impl Default for DepositConfig {
    fn default() -> Self {
        Self {
            min_term_days: 31,
            max_term_days: 1800,
            min_principal: Money::from_major(500),
            max_principal: Some(Money::from_major(5_000_000)),
            fallback_rate_percent: dec!(2.00),
            rate_rules: default_rate_rules(),
            recommended_terms: vec![61, 91, 121],
            cancellation_policy: CancellationPolicy::PrincipalPlusAccrued,
            day_count: DayCountConvention::Actual360,
            settlement_batch_limit: None,
        }
    }
}

impl DepositConfig {
    /// parse and validate a json document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: DepositConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// read, parse and validate a json file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn fallback_rate(&self) -> Rate {
        Rate::from_quoted(self.fallback_rate_percent)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_term_days == 0 || self.min_term_days > self.max_term_days {
            return Err(invalid(format!(
                "term bounds [{}, {}] are not a valid range",
                self.min_term_days, self.max_term_days
            )));
        }

        if !self.min_principal.is_positive() {
            return Err(invalid("minimum principal must be positive".to_string()));
        }

        if let Some(max) = self.max_principal {
            if max < self.min_principal {
                return Err(invalid(format!(
                    "maximum principal {} below minimum {}",
                    max, self.min_principal
                )));
            }
        }

        if self.fallback_rate_percent < Decimal::ZERO {
            return Err(invalid("fallback rate cannot be negative".to_string()));
        }

        if self.rate_rules.is_empty() {
            return Err(invalid("rate table is empty".to_string()));
        }

        for (i, rule) in self.rate_rules.iter().enumerate() {
            rule.validate().map_err(invalid)?;
            for other in &self.rate_rules[i + 1..] {
                if rule.overlaps(other) {
                    return Err(invalid(format!(
                        "rate rules overlap: {} and {}",
                        rule.describe(),
                        other.describe()
                    )));
                }
            }
        }

        if self.recommended_terms.iter().any(|t| *t == 0) {
            return Err(invalid("recommended terms must be positive".to_string()));
        }

        Ok(())
    }
}

fn invalid(message: String) -> DepositError {
    DepositError::InvalidConfiguration { message }
}

/// curated tiers: three amount bands per term band
pub fn default_rate_rules() -> Vec<RateRule> {
    let bands: [(u32, u32, [Decimal; 3]); 7] = [
        (31, 60, [dec!(2.50), dec!(2.65), dec!(2.80)]),
        (61, 90, [dec!(2.85), dec!(3.00), dec!(3.15)]),
        (91, 120, [dec!(3.15), dec!(3.30), dec!(3.45)]),
        (121, 180, [dec!(3.50), dec!(3.65), dec!(3.80)]),
        (181, 360, [dec!(4.00), dec!(4.20), dec!(4.40)]),
        (361, 720, [dec!(4.50), dec!(4.70), dec!(4.90)]),
        (721, 1800, [dec!(5.00), dec!(5.25), dec!(5.50)]),
    ];
    let amounts = [
        (Money::from_major(500), Some(Money::from_major(10_000))),
        (Money::from_major(10_000), Some(Money::from_major(50_000))),
        (Money::from_major(50_000), None),
    ];

    let mut rules = Vec::with_capacity(bands.len() * amounts.len());
    for (term_min, term_max, rates) in bands {
        for ((amount_min, amount_max), percent) in amounts.iter().zip(rates) {
            rules.push(RateRule {
                term_min_days: term_min,
                term_max_days: term_max,
                amount_min: *amount_min,
                amount_max: *amount_max,
                annual_rate_percent: percent,
            });
        }
    }
    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DepositConfig::default();
        config.validate().unwrap();
        assert_eq!(config.rate_rules.len(), 21);
        assert_eq!(config.fallback_rate(), Rate::from_percentage(dec!(2)));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = DepositConfig::from_json_str(
            r#"{ "min_term_days": 60, "cancellation_policy": "PRINCIPAL_ONLY" }"#,
        )
        .unwrap();
        assert_eq!(config.min_term_days, 60);
        assert_eq!(config.max_term_days, 1800);
        assert_eq!(config.cancellation_policy, CancellationPolicy::PrincipalOnly);
        assert_eq!(config.recommended_terms, vec![61, 91, 121]);
    }

    #[test]
    fn test_overlapping_rules_rejected() {
        let mut config = DepositConfig::default();
        config.rate_rules.push(RateRule {
            term_min_days: 100,
            term_max_days: 150,
            amount_min: Money::from_major(1_000),
            amount_max: Some(Money::from_major(2_000)),
            annual_rate_percent: dec!(9.99),
        });
        let err = config.validate().unwrap_err();
        assert!(matches!(err, DepositError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let json = r#"{ "min_term_days": 400, "max_term_days": 90 }"#;
        assert!(DepositConfig::from_json_str(json).is_err());

        let json = r#"{ "min_principal": "1000", "max_principal": "10" }"#;
        assert!(DepositConfig::from_json_str(json).is_err());
    }

    #[test]
    fn test_malformed_json_is_infrastructure() {
        let err = DepositConfig::from_json_str("{ not json").unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Infrastructure);
    }
}
