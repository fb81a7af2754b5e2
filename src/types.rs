use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::DepositError;

/// unique identifier for an investment
pub type InvestmentId = Uuid;

/// unique identifier for a schedule entry
pub type EntryId = Uuid;

/// unique identifier for a movement record
pub type MovementId = Uuid;

/// identifier returned by the ledger for a money movement
pub type TransactionId = Uuid;

/// account reference owned by the ledger service
pub type AccountId = String;

/// investment products
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Product {
    TimeDeposit,
}

/// how often interest is paid out before maturity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterestModality {
    Monthly,
    Quarterly,
    Semiannual,
    AtMaturity,
}

impl InterestModality {
    /// months between interest payments, none when paid at maturity
    pub fn period_months(&self) -> Option<u32> {
        match self {
            InterestModality::Monthly => Some(1),
            InterestModality::Quarterly => Some(3),
            InterestModality::Semiannual => Some(6),
            InterestModality::AtMaturity => None,
        }
    }
}

/// investment lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvestmentState {
    /// open and earning
    Active,
    /// paid out at maturity
    Matured,
    /// closed early
    Canceled,
    /// replaced by a successor contract
    Renewed,
}

impl InvestmentState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InvestmentState::Active)
    }

    /// the only edges are out of ACTIVE
    pub fn can_transition_to(&self, next: InvestmentState) -> bool {
        matches!(
            (self, next),
            (InvestmentState::Active, InvestmentState::Matured)
                | (InvestmentState::Active, InvestmentState::Canceled)
                | (InvestmentState::Active, InvestmentState::Renewed)
        )
    }
}

/// kind of scheduled event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    InterestPayment,
    CapitalReturn,
}

/// schedule entry state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryState {
    Pending,
    Settled,
    Canceled,
}

/// what a movement record stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    /// principal debited from the account at creation
    Opening,
    /// interim interest credited
    InterestPayout,
    /// principal and remaining interest credited at maturity
    MaturityPayout,
    /// remaining interest credited, principal rolled into a successor
    Renewal,
    /// early settlement
    Cancellation,
}

/// which path is closing an ACTIVE investment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClosingKind {
    /// settlement at (or administratively before) maturity
    Maturity,
    /// early cancellation
    Cancellation,
}

macro_rules! text_codec {
    ($ty:ty { $($variant:path => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = DepositError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($text => Ok($variant),)+
                    _ => Err(DepositError::InvalidInput {
                        message: format!("unknown {}: {}", stringify!($ty), s),
                    }),
                }
            }
        }
    };
}

text_codec!(Product {
    Product::TimeDeposit => "TIME_DEPOSIT",
});

text_codec!(InterestModality {
    InterestModality::Monthly => "MONTHLY",
    InterestModality::Quarterly => "QUARTERLY",
    InterestModality::Semiannual => "SEMIANNUAL",
    InterestModality::AtMaturity => "AT_MATURITY",
});

text_codec!(InvestmentState {
    InvestmentState::Active => "ACTIVE",
    InvestmentState::Matured => "MATURED",
    InvestmentState::Canceled => "CANCELED",
    InvestmentState::Renewed => "RENEWED",
});

text_codec!(EventType {
    EventType::InterestPayment => "INTEREST_PAYMENT",
    EventType::CapitalReturn => "CAPITAL_RETURN",
});

text_codec!(EntryState {
    EntryState::Pending => "PENDING",
    EntryState::Settled => "SETTLED",
    EntryState::Canceled => "CANCELED",
});

text_codec!(MovementType {
    MovementType::Opening => "OPENING",
    MovementType::InterestPayout => "INTEREST_PAYOUT",
    MovementType::MaturityPayout => "MATURITY_PAYOUT",
    MovementType::Renewal => "RENEWAL",
    MovementType::Cancellation => "CANCELLATION",
});

text_codec!(ClosingKind {
    ClosingKind::Maturity => "MATURITY",
    ClosingKind::Cancellation => "CANCELLATION",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_only_leave_active() {
        use InvestmentState::*;
        for next in [Matured, Canceled, Renewed] {
            assert!(Active.can_transition_to(next));
        }
        for from in [Matured, Canceled, Renewed] {
            assert!(from.is_terminal());
            for next in [Active, Matured, Canceled, Renewed] {
                assert!(!from.can_transition_to(next));
            }
        }
        assert!(!Active.can_transition_to(Active));
    }

    #[test]
    fn test_text_codec() {
        assert_eq!("at_maturity".parse::<InterestModality>().unwrap(), InterestModality::AtMaturity);
        assert_eq!(InvestmentState::Renewed.to_string(), "RENEWED");
        assert!("WEEKLY".parse::<InterestModality>().is_err());
        assert_eq!(
            serde_json::to_string(&InterestModality::Semiannual).unwrap(),
            "\"SEMIANNUAL\""
        );
    }
}
