use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::InvestmentState;

/// coarse classification surfaced to callers and recorded in settlement runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    NotFound,
    InvalidState,
    Infrastructure,
}

#[derive(Error, Debug)]
pub enum DepositError {
    #[error("invalid principal {amount}: {reason}")]
    InvalidPrincipal {
        amount: Money,
        reason: String,
    },

    #[error("invalid term: {term_days} days outside [{minimum}, {maximum}]")]
    InvalidTerm {
        term_days: u32,
        minimum: u32,
        maximum: u32,
    },

    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Money,
        requested: Money,
    },

    #[error("invalid input: {message}")]
    InvalidInput {
        message: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("investment not found: {id}")]
    InvestmentNotFound {
        id: Uuid,
    },

    #[error("account not found: {account_id}")]
    AccountNotFound {
        account_id: String,
    },

    #[error("schedule entry not found: {id}")]
    ScheduleEntryNotFound {
        id: Uuid,
    },

    #[error("cannot {operation} investment in state {current}")]
    InvalidState {
        current: InvestmentState,
        operation: String,
    },

    #[error("investment {id} is not due until {maturity_date}")]
    NotDue {
        id: Uuid,
        maturity_date: NaiveDate,
    },

    #[error("transition not allowed: {from} -> {to}")]
    InvalidTransition {
        from: InvestmentState,
        to: InvestmentState,
    },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("store unavailable: {message}")]
    StoreUnavailable {
        message: String,
    },

    #[error("ledger error: {message}")]
    Ledger {
        message: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DepositError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DepositError::InvalidPrincipal { .. }
            | DepositError::InvalidTerm { .. }
            | DepositError::InsufficientFunds { .. }
            | DepositError::InvalidInput { .. }
            | DepositError::InvalidConfiguration { .. } => ErrorKind::Validation,
            DepositError::InvestmentNotFound { .. }
            | DepositError::AccountNotFound { .. }
            | DepositError::ScheduleEntryNotFound { .. } => ErrorKind::NotFound,
            DepositError::InvalidState { .. }
            | DepositError::NotDue { .. }
            | DepositError::InvalidTransition { .. } => ErrorKind::InvalidState,
            DepositError::Storage(_)
            | DepositError::StoreUnavailable { .. }
            | DepositError::Ledger { .. }
            | DepositError::Serialization(_)
            | DepositError::Io(_) => ErrorKind::Infrastructure,
        }
    }

    /// only infrastructure failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Infrastructure
    }
}

pub type Result<T> = std::result::Result<T, DepositError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let err = DepositError::InvalidTerm { term_days: 10, minimum: 31, maximum: 1800 };
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "invalid term: 10 days outside [31, 1800]");

        let err = DepositError::InvalidState {
            current: InvestmentState::Matured,
            operation: "cancel".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(err.to_string(), "cannot cancel investment in state MATURED");

        let err = DepositError::Ledger { message: "timeout".to_string() };
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert!(err.is_retryable());
    }
}
