use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{DepositError, Result};
use crate::types::{AccountId, EntryId, InvestmentId, TransactionId};

/// Account service that actually moves money.
///
/// Every call carries an idempotency `reference`. Repeating a reference
/// returns the original transaction id and moves nothing.
pub trait Ledger: Send + Sync {
    fn credit(&self, account_id: &AccountId, amount: Money, reference: &str) -> Result<TransactionId>;

    fn debit(&self, account_id: &AccountId, amount: Money, reference: &str) -> Result<TransactionId>;

    /// fails with `AccountNotFound` for unknown accounts
    fn balance(&self, account_id: &AccountId) -> Result<Money>;
}

// idempotency references, one per money movement

pub fn opening_reference(id: InvestmentId) -> String {
    format!("opening:{id}")
}

/// compensating credit when an opened investment could not be persisted
pub fn opening_reversal_reference(id: InvestmentId) -> String {
    format!("opening-reversal:{id}")
}

/// interest entries are paid under their own reference, interim or at maturity
pub fn interest_reference(entry_id: EntryId) -> String {
    format!("interest:{entry_id}")
}

/// principal returned at maturity
pub fn settlement_reference(id: InvestmentId) -> String {
    format!("settlement:{id}")
}

pub fn cancellation_reference(id: InvestmentId) -> String {
    format!("cancellation:{id}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Credit,
    Debit,
}

/// one booked ledger transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub direction: Direction,
    pub amount: Money,
    pub reference: String,
    pub booked_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Books {
    balances: HashMap<AccountId, Money>,
    by_reference: HashMap<String, TransactionId>,
    transactions: Vec<LedgerTransaction>,
    failing: HashSet<AccountId>,
}

/// in-process ledger for tests and demos
#[derive(Debug, Default)]
pub struct MemoryLedger {
    books: Mutex<Books>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// open (or reset) an account with a starting balance
    pub fn open_account(&self, account_id: impl Into<AccountId>, balance: Money) -> Result<()> {
        self.lock()?.balances.insert(account_id.into(), balance);
        Ok(())
    }

    /// make every call touching `account_id` fail as an infrastructure error
    pub fn set_failing(&self, account_id: impl Into<AccountId>, failing: bool) -> Result<()> {
        let account_id = account_id.into();
        let mut books = self.lock()?;
        if failing {
            books.failing.insert(account_id);
        } else {
            books.failing.remove(&account_id);
        }
        Ok(())
    }

    /// booked transactions, oldest first
    pub fn transactions(&self) -> Result<Vec<LedgerTransaction>> {
        Ok(self.lock()?.transactions.clone())
    }

    pub fn transaction_for(&self, reference: &str) -> Result<Option<LedgerTransaction>> {
        let books = self.lock()?;
        Ok(books
            .by_reference
            .get(reference)
            .and_then(|id| books.transactions.iter().find(|t| t.id == *id))
            .cloned())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Books>> {
        self.books.lock().map_err(|_| DepositError::Ledger {
            message: "ledger lock poisoned".to_string(),
        })
    }

    fn post(&self, account_id: &AccountId, amount: Money, reference: &str, direction: Direction) -> Result<TransactionId> {
        if amount.is_negative() {
            return Err(DepositError::InvalidInput {
                message: format!("ledger amount cannot be negative: {}", amount),
            });
        }

        let mut books = self.lock()?;
        if books.failing.contains(account_id) {
            return Err(DepositError::Ledger {
                message: format!("account service unavailable for {}", account_id),
            });
        }

        if let Some(existing) = books.by_reference.get(reference) {
            log::debug!("ledger reference {} already booked as {}", reference, existing);
            return Ok(*existing);
        }

        let balance = books
            .balances
            .get(account_id)
            .copied()
            .ok_or_else(|| DepositError::AccountNotFound { account_id: account_id.clone() })?;

        let next = match direction {
            Direction::Credit => balance + amount,
            Direction::Debit => {
                if balance < amount {
                    return Err(DepositError::InsufficientFunds { available: balance, requested: amount });
                }
                balance - amount
            }
        };

        let id = Uuid::new_v4();
        books.balances.insert(account_id.clone(), next);
        books.by_reference.insert(reference.to_string(), id);
        books.transactions.push(LedgerTransaction {
            id,
            account_id: account_id.clone(),
            direction,
            amount,
            reference: reference.to_string(),
            booked_at: Utc::now(),
        });
        Ok(id)
    }
}

impl Ledger for MemoryLedger {
    fn credit(&self, account_id: &AccountId, amount: Money, reference: &str) -> Result<TransactionId> {
        self.post(account_id, amount, reference, Direction::Credit)
    }

    fn debit(&self, account_id: &AccountId, amount: Money, reference: &str) -> Result<TransactionId> {
        self.post(account_id, amount, reference, Direction::Debit)
    }

    fn balance(&self, account_id: &AccountId) -> Result<Money> {
        let books = self.lock()?;
        if books.failing.contains(account_id) {
            return Err(DepositError::Ledger {
                message: format!("account service unavailable for {}", account_id),
            });
        }
        books
            .balances
            .get(account_id)
            .copied()
            .ok_or_else(|| DepositError::AccountNotFound { account_id: account_id.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn account(id: &str) -> AccountId {
        id.to_string()
    }

    #[test]
    fn test_credit_debit_and_balance() {
        let ledger = MemoryLedger::new();
        ledger.open_account("ACC-1", Money::from_major(1_000)).unwrap();

        ledger.debit(&account("ACC-1"), Money::from_major(400), "opening:a").unwrap();
        ledger.credit(&account("ACC-1"), Money::from_minor(796), "interest:b").unwrap();

        assert_eq!(ledger.balance(&account("ACC-1")).unwrap(), Money::from_minor(60_796));
        assert_eq!(ledger.transactions().unwrap().len(), 2);
    }

    #[test]
    fn test_reference_is_idempotent() {
        let ledger = MemoryLedger::new();
        ledger.open_account("ACC-1", Money::ZERO).unwrap();

        let first = ledger.credit(&account("ACC-1"), Money::from_major(50), "settlement:x").unwrap();
        let second = ledger.credit(&account("ACC-1"), Money::from_major(50), "settlement:x").unwrap();

        assert_eq!(first, second);
        assert_eq!(ledger.balance(&account("ACC-1")).unwrap(), Money::from_major(50));
        assert_eq!(ledger.transaction_for("settlement:x").unwrap().unwrap().id, first);
    }

    #[test]
    fn test_unknown_account_and_overdraft() {
        let ledger = MemoryLedger::new();
        ledger.open_account("ACC-1", Money::from_major(10)).unwrap();

        let err = ledger.balance(&account("NOPE")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = ledger.debit(&account("ACC-1"), Money::from_major(11), "opening:y").unwrap_err();
        assert!(matches!(err, DepositError::InsufficientFunds { .. }));
        // a rejected call does not burn its reference
        assert!(ledger.transaction_for("opening:y").unwrap().is_none());
    }

    #[test]
    fn test_failing_account_is_infrastructure() {
        let ledger = MemoryLedger::new();
        ledger.open_account("ACC-1", Money::from_major(10)).unwrap();
        ledger.set_failing("ACC-1", true).unwrap();

        let err = ledger.credit(&account("ACC-1"), Money::ONE, "r").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Infrastructure);

        ledger.set_failing("ACC-1", false).unwrap();
        assert!(ledger.credit(&account("ACC-1"), Money::ONE, "r").is_ok());
    }
}
