pub mod runner;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{DepositError, ErrorKind};
use crate::investment::Investment;
use crate::schedule::ScheduleEntry;
use crate::types::{EntryId, InvestmentId, MovementType};

pub use runner::SettlementRunner;

/// work found by [`SettlementRunner::find_due`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DueSet {
    /// ACTIVE investments with maturity on or before `as_of`
    pub matured: Vec<Investment>,
    /// pending interim interest of ACTIVE investments not maturing by `as_of`
    pub interim: Vec<ScheduleEntry>,
}

impl DueSet {
    pub fn len(&self) -> usize {
        self.matured.len() + self.interim.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// one settled action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedItem {
    pub investment_id: InvestmentId,
    /// set for interim interest payouts
    pub entry_id: Option<EntryId>,
    pub kind: MovementType,
    /// credited to the account by this action
    pub amount: Money,
    pub maturity_date: NaiveDate,
    /// contract opened by auto-renewal
    pub successor_id: Option<InvestmentId>,
}

/// one item that failed inside a run; the record was left untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedItem {
    pub investment_id: InvestmentId,
    pub entry_id: Option<EntryId>,
    pub error_kind: ErrorKind,
    pub message: String,
}

impl FailedItem {
    fn new(investment_id: InvestmentId, entry_id: Option<EntryId>, err: &DepositError) -> Self {
        Self {
            investment_id,
            entry_id,
            error_kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Summary of one pass. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementRun {
    pub triggered_at: DateTime<Utc>,
    pub as_of: NaiveDate,
    pub processed: Vec<ProcessedItem>,
    pub failed: Vec<FailedItem>,
    /// already settled by someone else by the time this run got to them
    pub skipped: Vec<InvestmentId>,
    /// left for the next run (deadline passed or batch limit reached)
    pub deferred: Vec<InvestmentId>,
}

impl SettlementRun {
    fn new(triggered_at: DateTime<Utc>, as_of: NaiveDate) -> Self {
        Self {
            triggered_at,
            as_of,
            processed: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            deferred: Vec::new(),
        }
    }

    pub fn total_paid(&self) -> Money {
        self.processed.iter().map(|p| p.amount).sum()
    }
}

/// result of settling a single record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettleOutcome {
    Settled(ProcessedItem),
    /// nothing left to do; a previous invocation already settled it
    AlreadySettled,
}
