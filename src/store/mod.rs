pub mod memory;
pub mod sqlite;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::investment::{Investment, Movement};
use crate::schedule::ScheduleEntry;
use crate::types::{AccountId, ClosingKind, EntryId, InvestmentId, InvestmentState, Product};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// listing filter; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvestmentFilter {
    pub account_id: Option<AccountId>,
    pub state: Option<InvestmentState>,
    pub product: Option<Product>,
    pub maturing_from: Option<NaiveDate>,
    pub maturing_to: Option<NaiveDate>,
}

impl InvestmentFilter {
    pub fn account(account_id: impl Into<AccountId>) -> Self {
        Self {
            account_id: Some(account_id.into()),
            ..Self::default()
        }
    }

    pub fn active_maturing_by(as_of: NaiveDate) -> Self {
        Self {
            state: Some(InvestmentState::Active),
            maturing_to: Some(as_of),
            ..Self::default()
        }
    }

    pub fn matches(&self, investment: &Investment) -> bool {
        self.account_id.as_ref().map_or(true, |a| *a == investment.account_id)
            && self.state.map_or(true, |s| s == investment.state)
            && self.product.map_or(true, |p| p == investment.product)
            && self.maturing_from.map_or(true, |d| investment.maturity_date >= d)
            && self.maturing_to.map_or(true, |d| investment.maturity_date <= d)
    }
}

/// One atomic change to an investment.
///
/// Applied only if the investment is still in `expected`, every entry in
/// `settle_entries` is still PENDING and the closing claim on record (if
/// any) is of kind `closing`; otherwise nothing is written.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub investment_id: InvestmentId,
    pub expected: InvestmentState,
    /// same as `expected` for interim payouts
    pub next: InvestmentState,
    pub settle_entries: Vec<EntryId>,
    /// mark every entry still PENDING after settlement as CANCELED
    pub cancel_pending: bool,
    pub movement: Option<Movement>,
    /// replacement contract opened by auto-renewal
    pub successor: Option<(Investment, Vec<ScheduleEntry>)>,
    /// claim the writer holds; `None` requires that nobody holds one
    pub closing: Option<ClosingKind>,
    pub at: DateTime<Utc>,
}

impl Transition {
    pub fn new(investment_id: InvestmentId, expected: InvestmentState, next: InvestmentState, at: DateTime<Utc>) -> Self {
        Self {
            investment_id,
            expected,
            next,
            settle_entries: Vec::new(),
            cancel_pending: false,
            movement: None,
            successor: None,
            closing: None,
            at,
        }
    }

    pub fn settle(mut self, entries: Vec<EntryId>) -> Self {
        self.settle_entries = entries;
        self
    }

    pub fn cancel_pending(mut self) -> Self {
        self.cancel_pending = true;
        self
    }

    pub fn movement(mut self, movement: Movement) -> Self {
        self.movement = Some(movement);
        self
    }

    pub fn successor(mut self, investment: Investment, schedule: Vec<ScheduleEntry>) -> Self {
        self.successor = Some((investment, schedule));
        self
    }

    pub fn closing(mut self, kind: ClosingKind) -> Self {
        self.closing = Some(kind);
        self
    }

    /// whether a claim on record lets this transition through
    pub(crate) fn admits(&self, recorded: Option<ClosingKind>) -> bool {
        recorded == self.closing
    }
}

/// Exclusive right to close an ACTIVE investment.
///
/// Taken before any money moves so that maturity settlement and early
/// cancellation never both pay out the same principal. `as_of` is the day
/// the claim was first taken; a resumed closing prices from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosingClaim {
    pub kind: ClosingKind,
    pub as_of: NaiveDate,
}

impl ClosingClaim {
    pub fn new(kind: ClosingKind, as_of: NaiveDate) -> Self {
        Self { kind, as_of }
    }
}

/// outcome of [`InvestmentStore::claim_closing`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// the caller's kind holds the claim; carries the claim on record
    Owned(ClosingClaim),
    /// the other closing path got there first
    HeldBy(ClosingClaim),
    /// the investment already left ACTIVE
    Closed(InvestmentState),
}

/// outcome of [`InvestmentStore::apply`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    /// the record moved on since it was read; nothing was written
    Stale,
}

/// Persistence seam for investments, schedules and movements.
///
/// Reads return owned copies. `apply` is the only write path for existing
/// records and must be atomic against concurrent callers.
pub trait InvestmentStore: Send + Sync {
    /// persist a new investment together with its schedule and opening movement
    fn insert_investment(
        &self,
        investment: &Investment,
        schedule: &[ScheduleEntry],
        movement: Option<&Movement>,
    ) -> Result<()>;

    fn investment(&self, id: InvestmentId) -> Result<Option<Investment>>;

    /// ordered by maturity date, then open date
    fn list_investments(&self, filter: &InvestmentFilter) -> Result<Vec<Investment>>;

    /// ordered by date, interest before capital
    fn schedule(&self, investment_id: InvestmentId) -> Result<Vec<ScheduleEntry>>;

    fn schedule_entry(&self, id: EntryId) -> Result<Option<ScheduleEntry>>;

    /// PENDING entries scheduled on or before `as_of`, ordered by date
    fn pending_entries_due(&self, as_of: NaiveDate) -> Result<Vec<ScheduleEntry>>;

    /// oldest first
    fn movements(&self, investment_id: InvestmentId) -> Result<Vec<Movement>>;

    fn apply(&self, transition: Transition) -> Result<TransitionOutcome>;

    /// Takes the closing claim for an ACTIVE investment, atomically.
    ///
    /// A claim of the same kind already on record is returned as owned, so
    /// an interrupted closing can be resumed by retrying it.
    fn claim_closing(&self, investment_id: InvestmentId, claim: ClosingClaim) -> Result<ClaimOutcome>;

    fn closing_claim(&self, investment_id: InvestmentId) -> Result<Option<ClosingClaim>>;
}

/// shared decision for [`InvestmentStore::claim_closing`]
pub(crate) fn resolve_claim(
    state: InvestmentState,
    recorded: Option<ClosingClaim>,
    requested: ClosingClaim,
) -> ClaimOutcome {
    if state != InvestmentState::Active {
        return ClaimOutcome::Closed(state);
    }
    match recorded {
        Some(existing) if existing.kind == requested.kind => ClaimOutcome::Owned(existing),
        Some(existing) => ClaimOutcome::HeldBy(existing),
        None => ClaimOutcome::Owned(requested),
    }
}

/// shared ordering for schedule listings
pub(crate) fn schedule_order(a: &ScheduleEntry, b: &ScheduleEntry) -> std::cmp::Ordering {
    a.scheduled_date
        .cmp(&b.scheduled_date)
        .then_with(|| event_rank(a).cmp(&event_rank(b)))
}

fn event_rank(entry: &ScheduleEntry) -> u8 {
    match entry.event_type {
        crate::types::EventType::InterestPayment => 0,
        crate::types::EventType::CapitalReturn => 1,
    }
}

pub(crate) fn investment_order(a: &Investment, b: &Investment) -> std::cmp::Ordering {
    a.maturity_date
        .cmp(&b.maturity_date)
        .then_with(|| a.open_date.cmp(&b.open_date))
        .then_with(|| a.created_at.cmp(&b.created_at))
}
