use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use hourglass_rs::SafeTimeProvider;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::calendar::BusinessDayAdjuster;
use crate::config::DepositConfig;
use crate::decimal::Money;
use crate::errors::{DepositError, Result};
use crate::interest::{InterestCalculator, SimpleInterest};
use crate::investment::{Investment, Movement};
use crate::ledger::{interest_reference, settlement_reference, Ledger};
use crate::rates::RateTable;
use crate::schedule::{ScheduleEntry, ScheduleGenerator};
use crate::settlement::{DueSet, FailedItem, ProcessedItem, SettleOutcome, SettlementRun};
use crate::store::{ClaimOutcome, ClosingClaim, InvestmentFilter, InvestmentStore, Transition, TransitionOutcome};
use crate::types::{ClosingKind, EntryId, InvestmentId, InvestmentState, MovementType};

/// re-reads allowed after losing a write race on one record
const MAX_ATTEMPTS: usize = 3;

enum WorkItem {
    Maturity(Investment),
    Interim(ScheduleEntry),
}

impl WorkItem {
    fn investment_id(&self) -> InvestmentId {
        match self {
            WorkItem::Maturity(investment) => investment.id,
            WorkItem::Interim(entry) => entry.investment_id,
        }
    }

    fn entry_id(&self) -> Option<EntryId> {
        match self {
            WorkItem::Maturity(_) => None,
            WorkItem::Interim(entry) => Some(entry.id),
        }
    }
}

/// Batch settlement of matured deposits and interim interest.
///
/// Holds no state between calls; any number of runners, in any number of
/// processes, may run over the same store at once. Every money movement
/// carries a deterministic ledger reference and every write goes through
/// [`InvestmentStore::apply`], so an item is paid at most once no matter
/// how runs overlap or how often a failed item is retried. A maturity is
/// claimed in the store before anything is credited; an investment already
/// claimed by a cancellation is skipped.
pub struct SettlementRunner {
    config: Arc<DepositConfig>,
    rates: RateTable,
    calculator: SimpleInterest,
    adjuster: BusinessDayAdjuster,
    generator: ScheduleGenerator,
    store: Arc<dyn InvestmentStore>,
    ledger: Arc<dyn Ledger>,
    time: SafeTimeProvider,
}

impl SettlementRunner {
    pub fn new(
        config: Arc<DepositConfig>,
        store: Arc<dyn InvestmentStore>,
        ledger: Arc<dyn Ledger>,
        time: SafeTimeProvider,
    ) -> Self {
        let adjuster = BusinessDayAdjuster::new();
        Self {
            rates: RateTable::from_config(&config),
            calculator: SimpleInterest::new(config.day_count),
            adjuster,
            generator: ScheduleGenerator::new(adjuster),
            config,
            store,
            ledger,
            time,
        }
    }

    fn today(&self) -> NaiveDate {
        self.time.now().date_naive()
    }

    /// Matured investments and, separately, interim interest due by `as_of`.
    ///
    /// Interest of an investment that is itself matured is left to the
    /// maturity settlement.
    pub fn find_due(&self, as_of: NaiveDate) -> Result<DueSet> {
        let matured = self
            .store
            .list_investments(&InvestmentFilter::active_maturing_by(as_of))?;
        let maturing: HashSet<InvestmentId> = matured.iter().map(|i| i.id).collect();

        let mut active: HashMap<InvestmentId, bool> = HashMap::new();
        let mut interim = Vec::new();
        for entry in self.store.pending_entries_due(as_of)? {
            if !entry.is_interest() || maturing.contains(&entry.investment_id) {
                continue;
            }
            let is_active = match active.get(&entry.investment_id) {
                Some(known) => *known,
                None => {
                    let found = self
                        .store
                        .investment(entry.investment_id)?
                        .map_or(false, |i| i.is_active());
                    active.insert(entry.investment_id, found);
                    found
                }
            };
            if is_active {
                interim.push(entry);
            }
        }

        Ok(DueSet { matured, interim })
    }

    /// one pass over everything due by `as_of`
    pub fn run(&self, as_of: NaiveDate) -> Result<SettlementRun> {
        self.run_until(as_of, None)
    }

    /// one pass over everything due today
    pub fn run_now(&self) -> Result<SettlementRun> {
        self.run(self.today())
    }

    /// Settles each due item inside its own failure boundary.
    ///
    /// Only a failure to fetch the due set is returned as an error. Once
    /// `deadline` has passed, or the configured batch limit is reached, the
    /// remaining items are reported as deferred and left untouched.
    pub fn run_until(&self, as_of: NaiveDate, deadline: Option<DateTime<Utc>>) -> Result<SettlementRun> {
        let mut run = SettlementRun::new(self.time.now(), as_of);
        let due = self.find_due(as_of)?;
        log::info!(
            "settlement run as of {}: {} matured, {} interim due",
            as_of,
            due.matured.len(),
            due.interim.len()
        );

        let limit = self.config.settlement_batch_limit.unwrap_or(usize::MAX);
        let items = due
            .matured
            .into_iter()
            .map(WorkItem::Maturity)
            .chain(due.interim.into_iter().map(WorkItem::Interim));

        for (attempted, item) in items.enumerate() {
            let past_deadline = deadline.map_or(false, |d| self.time.now() > d);
            if attempted >= limit || past_deadline {
                run.deferred.push(item.investment_id());
                continue;
            }

            let result = match &item {
                WorkItem::Maturity(investment) => self.settle_investment(investment.id, Some(as_of)),
                WorkItem::Interim(entry) => self.settle_entry(entry.id),
            };

            match result {
                Ok(SettleOutcome::Settled(processed)) => run.processed.push(processed),
                Ok(SettleOutcome::AlreadySettled) => run.skipped.push(item.investment_id()),
                Err(err) => {
                    log::warn!(
                        "settlement of investment {} failed ({:?}): {}",
                        item.investment_id(),
                        err.kind(),
                        err
                    );
                    run.failed.push(FailedItem::new(item.investment_id(), item.entry_id(), &err));
                }
            }
        }

        log::info!(
            "settlement run as of {} done: processed={} failed={} skipped={} deferred={} paid={}",
            as_of,
            run.processed.len(),
            run.failed.len(),
            run.skipped.len(),
            run.deferred.len(),
            run.total_paid()
        );
        Ok(run)
    }

    /// Settles one investment that has reached maturity.
    ///
    /// A second call after a success is a no-op returning `AlreadySettled`.
    pub fn settle_one(&self, id: InvestmentId) -> Result<SettleOutcome> {
        self.settle_investment(id, Some(self.today()))
    }

    /// settles an ACTIVE investment immediately, whatever its maturity date
    pub fn settle_now(&self, id: InvestmentId) -> Result<SettleOutcome> {
        log::info!("settle-now requested for investment {}", id);
        self.settle_investment(id, None)
    }

    /// pays one pending interim interest entry
    pub fn settle_entry(&self, entry_id: EntryId) -> Result<SettleOutcome> {
        let entry = self
            .store
            .schedule_entry(entry_id)?
            .ok_or(DepositError::ScheduleEntryNotFound { id: entry_id })?;
        if !entry.is_interest() {
            return Err(DepositError::InvalidInput {
                message: format!("entry {} is a capital return, settled only at maturity", entry_id),
            });
        }
        if !entry.is_pending() {
            log::debug!("entry {} already {}, nothing to pay", entry_id, entry.state);
            return Ok(SettleOutcome::AlreadySettled);
        }

        let investment = self
            .store
            .investment(entry.investment_id)?
            .ok_or(DepositError::InvestmentNotFound { id: entry.investment_id })?;
        if !investment.is_active() {
            log::debug!("entry {} belongs to {} investment {}", entry_id, investment.state, investment.id);
            return Ok(SettleOutcome::AlreadySettled);
        }
        if let Some(claim) = self.store.closing_claim(investment.id)? {
            log::debug!("entry {} left to the {} closing of {}", entry_id, claim.kind, investment.id);
            return Ok(SettleOutcome::AlreadySettled);
        }

        let tx = if entry.scheduled_amount.is_positive() {
            Some(
                self.ledger
                    .credit(&investment.account_id, entry.scheduled_amount, &interest_reference(entry.id))?,
            )
        } else {
            None
        };

        let now = self.time.now();
        let transition = Transition::new(investment.id, InvestmentState::Active, InvestmentState::Active, now)
            .settle(vec![entry.id])
            .movement(Movement::new(
                investment.id,
                tx,
                MovementType::InterestPayout,
                entry.scheduled_amount,
                now,
            ));

        match self.store.apply(transition)? {
            TransitionOutcome::Applied => {
                log::info!(
                    "paid interest {} of investment {} to {}",
                    entry.scheduled_amount,
                    investment.id,
                    investment.account_id
                );
                Ok(SettleOutcome::Settled(ProcessedItem {
                    investment_id: investment.id,
                    entry_id: Some(entry.id),
                    kind: MovementType::InterestPayout,
                    amount: entry.scheduled_amount,
                    maturity_date: investment.maturity_date,
                    successor_id: None,
                }))
            }
            TransitionOutcome::Stale => {
                log::debug!("entry {} was settled concurrently", entry_id);
                Ok(SettleOutcome::AlreadySettled)
            }
        }
    }

    /// ACTIVE investments maturing between today and `days` from now
    pub fn upcoming(&self, days: u32) -> Result<Vec<Investment>> {
        let today = self.today();
        // past four-digit years the window is open-ended
        let until = today
            .checked_add_signed(Duration::days(i64::from(days)))
            .filter(|d| d.year() <= 9999);
        self.store.list_investments(&InvestmentFilter {
            state: Some(InvestmentState::Active),
            maturing_from: Some(today),
            maturing_to: until,
            ..InvestmentFilter::default()
        })
    }

    fn settle_investment(&self, id: InvestmentId, due_by: Option<NaiveDate>) -> Result<SettleOutcome> {
        for attempt in 1..=MAX_ATTEMPTS {
            let investment = self
                .store
                .investment(id)?
                .ok_or(DepositError::InvestmentNotFound { id })?;
            if !investment.is_active() {
                log::debug!("investment {} already {}, nothing to settle", id, investment.state);
                return Ok(SettleOutcome::AlreadySettled);
            }
            if let Some(as_of) = due_by {
                if investment.maturity_date > as_of {
                    return Err(DepositError::NotDue {
                        id,
                        maturity_date: investment.maturity_date,
                    });
                }
            }

            match self.store.claim_closing(id, ClosingClaim::new(ClosingKind::Maturity, self.today()))? {
                ClaimOutcome::Owned(_) => {}
                ClaimOutcome::HeldBy(other) => {
                    log::info!("investment {} is being closed by {} since {}, skipping", id, other.kind, other.as_of);
                    return Ok(SettleOutcome::AlreadySettled);
                }
                ClaimOutcome::Closed(state) => {
                    log::debug!("investment {} already {}, nothing to settle", id, state);
                    return Ok(SettleOutcome::AlreadySettled);
                }
            }

            let schedule = self.store.schedule(id)?;
            let (transition, processed) = self.maturity_transition(&investment, &schedule)?;

            match self.store.apply(transition)? {
                TransitionOutcome::Applied => {
                    log::info!(
                        "settled investment {} ({}): credited {} to {}",
                        id,
                        processed.kind,
                        processed.amount,
                        investment.account_id
                    );
                    return Ok(SettleOutcome::Settled(processed));
                }
                TransitionOutcome::Stale => {
                    log::debug!("settlement of {} lost a race on attempt {}, re-reading", id, attempt);
                }
            }
        }

        Err(DepositError::StoreUnavailable {
            message: format!("investment {} kept changing during settlement", id),
        })
    }

    /// Credits what is still owed and builds the closing transition.
    ///
    /// Remaining interest entries are paid under their own references, so
    /// an interim payout racing this settlement cannot be paid twice.
    fn maturity_transition(&self, investment: &Investment, schedule: &[ScheduleEntry]) -> Result<(Transition, ProcessedItem)> {
        let pending: Vec<&ScheduleEntry> = schedule.iter().filter(|e| e.is_pending()).collect();
        let settled_interest: Money = schedule
            .iter()
            .filter(|e| e.is_interest() && !e.is_pending())
            .map(|e| e.scheduled_amount)
            .sum();

        let mut interest = Money::ZERO;
        let mut interest_tx = None;
        for entry in pending.iter().filter(|e| e.is_interest()) {
            if entry.scheduled_amount.is_positive() {
                interest_tx = Some(self.ledger.credit(
                    &investment.account_id,
                    entry.scheduled_amount,
                    &interest_reference(entry.id),
                )?);
            }
            interest += entry.scheduled_amount;
        }

        let owed = self
            .calculator
            .interest(investment.principal, investment.annual_rate, investment.term_days)
            - settled_interest;
        if owed != interest {
            log::warn!(
                "investment {}: schedule owes {} but the opening terms give {}; paying the schedule",
                investment.id,
                interest,
                owed
            );
        }

        let now = self.time.now();
        let settle = pending.iter().map(|e| e.id).collect();

        if investment.auto_renew {
            let rate = self.rates.lookup_rate(investment.principal, investment.term_days);
            let mut successor = Investment::open(investment.renewal_terms(rate), &self.calculator, &self.adjuster, now);
            successor.renewed_from = Some(investment.id);
            let successor_schedule = self.generator.generate(&successor);

            let processed = ProcessedItem {
                investment_id: investment.id,
                entry_id: None,
                kind: MovementType::Renewal,
                amount: interest,
                maturity_date: investment.maturity_date,
                successor_id: Some(successor.id),
            };
            let transition = Transition::new(investment.id, InvestmentState::Active, InvestmentState::Renewed, now)
                .settle(settle)
                .closing(ClosingKind::Maturity)
                .movement(Movement::new(investment.id, interest_tx, MovementType::Renewal, interest, now))
                .successor(successor, successor_schedule);
            Ok((transition, processed))
        } else {
            let tx = self
                .ledger
                .credit(&investment.account_id, investment.principal, &settlement_reference(investment.id))?;
            let amount = investment.principal + interest;

            let processed = ProcessedItem {
                investment_id: investment.id,
                entry_id: None,
                kind: MovementType::MaturityPayout,
                amount,
                maturity_date: investment.maturity_date,
                successor_id: None,
            };
            let transition = Transition::new(investment.id, InvestmentState::Active, InvestmentState::Matured, now)
                .settle(settle)
                .closing(ClosingKind::Maturity)
                .movement(Movement::new(investment.id, Some(tx), MovementType::MaturityPayout, amount, now));
            Ok((transition, processed))
        }
    }
}
