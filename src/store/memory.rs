use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::errors::{DepositError, Result};
use crate::investment::{Investment, Movement};
use crate::schedule::ScheduleEntry;
use crate::store::{
    investment_order, resolve_claim, schedule_order, ClaimOutcome, ClosingClaim, InvestmentFilter,
    InvestmentStore, Transition, TransitionOutcome,
};
use crate::types::{EntryId, EntryState, InvestmentId};

#[derive(Debug, Default)]
struct Tables {
    investments: HashMap<InvestmentId, Investment>,
    entries: HashMap<EntryId, ScheduleEntry>,
    schedules: HashMap<InvestmentId, Vec<EntryId>>,
    movements: Vec<Movement>,
    claims: HashMap<InvestmentId, ClosingClaim>,
}

impl Tables {
    fn insert(&mut self, investment: &Investment, schedule: &[ScheduleEntry], movement: Option<&Movement>) -> Result<()> {
        if self.investments.contains_key(&investment.id) {
            return Err(DepositError::InvalidInput {
                message: format!("investment {} already exists", investment.id),
            });
        }
        self.investments.insert(investment.id, investment.clone());
        let ids = schedule.iter().map(|e| e.id).collect();
        for entry in schedule {
            self.entries.insert(entry.id, entry.clone());
        }
        self.schedules.insert(investment.id, ids);
        if let Some(movement) = movement {
            self.movements.push(movement.clone());
        }
        Ok(())
    }
}

/// mutex-guarded in-process store; one lock spans each `apply`
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| DepositError::StoreUnavailable {
            message: "memory store lock poisoned".to_string(),
        })
    }
}

impl InvestmentStore for MemoryStore {
    fn insert_investment(
        &self,
        investment: &Investment,
        schedule: &[ScheduleEntry],
        movement: Option<&Movement>,
    ) -> Result<()> {
        self.lock()?.insert(investment, schedule, movement)
    }

    fn investment(&self, id: InvestmentId) -> Result<Option<Investment>> {
        Ok(self.lock()?.investments.get(&id).cloned())
    }

    fn list_investments(&self, filter: &InvestmentFilter) -> Result<Vec<Investment>> {
        let tables = self.lock()?;
        let mut found: Vec<Investment> = tables
            .investments
            .values()
            .filter(|inv| filter.matches(inv))
            .cloned()
            .collect();
        found.sort_by(investment_order);
        Ok(found)
    }

    fn schedule(&self, investment_id: InvestmentId) -> Result<Vec<ScheduleEntry>> {
        let tables = self.lock()?;
        let mut entries: Vec<ScheduleEntry> = tables
            .schedules
            .get(&investment_id)
            .map(|ids| ids.iter().filter_map(|id| tables.entries.get(id).cloned()).collect())
            .unwrap_or_default();
        entries.sort_by(schedule_order);
        Ok(entries)
    }

    fn schedule_entry(&self, id: EntryId) -> Result<Option<ScheduleEntry>> {
        Ok(self.lock()?.entries.get(&id).cloned())
    }

    fn pending_entries_due(&self, as_of: NaiveDate) -> Result<Vec<ScheduleEntry>> {
        let tables = self.lock()?;
        let mut due: Vec<ScheduleEntry> = tables
            .entries
            .values()
            .filter(|e| e.is_pending() && e.scheduled_date <= as_of)
            .cloned()
            .collect();
        due.sort_by(schedule_order);
        Ok(due)
    }

    fn movements(&self, investment_id: InvestmentId) -> Result<Vec<Movement>> {
        Ok(self
            .lock()?
            .movements
            .iter()
            .filter(|m| m.investment_id == investment_id)
            .cloned()
            .collect())
    }

    fn apply(&self, transition: Transition) -> Result<TransitionOutcome> {
        let mut tables = self.lock()?;

        let current = tables
            .investments
            .get(&transition.investment_id)
            .map(|inv| inv.state)
            .ok_or(DepositError::InvestmentNotFound { id: transition.investment_id })?;
        if current != transition.expected {
            return Ok(TransitionOutcome::Stale);
        }
        let recorded = tables.claims.get(&transition.investment_id).map(|c| c.kind);
        if !transition.admits(recorded) {
            return Ok(TransitionOutcome::Stale);
        }

        for id in &transition.settle_entries {
            let entry = tables
                .entries
                .get(id)
                .ok_or(DepositError::ScheduleEntryNotFound { id: *id })?;
            if entry.investment_id != transition.investment_id {
                return Err(DepositError::InvalidInput {
                    message: format!("entry {} belongs to another investment", id),
                });
            }
            if !entry.is_pending() {
                return Ok(TransitionOutcome::Stale);
            }
        }

        if let Some((successor, _)) = &transition.successor {
            if tables.investments.contains_key(&successor.id) {
                return Err(DepositError::InvalidInput {
                    message: format!("investment {} already exists", successor.id),
                });
            }
        }

        // every check passed; nothing below can fail
        for id in &transition.settle_entries {
            if let Some(entry) = tables.entries.get_mut(id) {
                entry.state = EntryState::Settled;
            }
        }

        if transition.cancel_pending {
            let ids = tables
                .schedules
                .get(&transition.investment_id)
                .cloned()
                .unwrap_or_default();
            for id in ids {
                if let Some(entry) = tables.entries.get_mut(&id) {
                    if entry.is_pending() {
                        entry.state = EntryState::Canceled;
                    }
                }
            }
        }

        if let Some(investment) = tables.investments.get_mut(&transition.investment_id) {
            investment.state = transition.next;
            investment.updated_at = transition.at;
        }

        if let Some(movement) = transition.movement {
            tables.movements.push(movement);
        }

        if let Some((successor, schedule)) = transition.successor {
            tables.insert(&successor, &schedule, None)?;
        }

        Ok(TransitionOutcome::Applied)
    }

    fn claim_closing(&self, investment_id: InvestmentId, claim: ClosingClaim) -> Result<ClaimOutcome> {
        let mut tables = self.lock()?;
        let state = tables
            .investments
            .get(&investment_id)
            .map(|inv| inv.state)
            .ok_or(DepositError::InvestmentNotFound { id: investment_id })?;

        let outcome = resolve_claim(state, tables.claims.get(&investment_id).copied(), claim);
        if let ClaimOutcome::Owned(owned) = outcome {
            tables.claims.insert(investment_id, owned);
        }
        Ok(outcome)
    }

    fn closing_claim(&self, investment_id: InvestmentId) -> Result<Option<ClosingClaim>> {
        Ok(self.lock()?.claims.get(&investment_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::BusinessDayAdjuster;
    use crate::decimal::{Money, Rate};
    use crate::interest::SimpleInterest;
    use crate::investment::OpeningTerms;
    use crate::schedule::ScheduleGenerator;
    use crate::types::{ClosingKind, InterestModality, InvestmentState, MovementType};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn seeded(store: &MemoryStore, account: &str) -> (Investment, Vec<ScheduleEntry>) {
        let now = Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap();
        let investment = Investment::open(
            OpeningTerms {
                account_id: account.to_string(),
                principal: Money::from_major(10_000),
                term_days: 91,
                interest_modality: InterestModality::Monthly,
                auto_renew: false,
                open_date: now.date_naive(),
                annual_rate: Rate::from_percentage(dec!(3.30)),
            },
            &SimpleInterest::default(),
            &BusinessDayAdjuster::new(),
            now,
        );
        let schedule = ScheduleGenerator::default().generate(&investment);
        store.insert_investment(&investment, &schedule, None).unwrap();
        (investment, schedule)
    }

    #[test]
    fn test_insert_and_filter() {
        let store = MemoryStore::new();
        let (a, schedule) = seeded(&store, "ACC-1");
        seeded(&store, "ACC-2");

        assert_eq!(store.investment(a.id).unwrap(), Some(a.clone()));
        assert_eq!(store.list_investments(&InvestmentFilter::account("ACC-1")).unwrap().len(), 1);
        assert_eq!(store.list_investments(&InvestmentFilter::default()).unwrap().len(), 2);
        assert_eq!(store.schedule(a.id).unwrap().len(), schedule.len());
        assert!(store.insert_investment(&a, &schedule, None).is_err());
    }

    #[test]
    fn test_apply_is_check_and_set() {
        let store = MemoryStore::new();
        let (inv, schedule) = seeded(&store, "ACC-1");
        let now = Utc::now();
        let ids: Vec<_> = schedule.iter().map(|e| e.id).collect();

        let transition = Transition::new(inv.id, InvestmentState::Active, InvestmentState::Matured, now)
            .settle(ids.clone())
            .movement(Movement::new(inv.id, None, MovementType::MaturityPayout, inv.final_amount(), now));

        assert_eq!(store.apply(transition.clone()).unwrap(), TransitionOutcome::Applied);
        assert_eq!(store.apply(transition).unwrap(), TransitionOutcome::Stale);

        assert_eq!(store.investment(inv.id).unwrap().unwrap().state, InvestmentState::Matured);
        assert!(store.schedule(inv.id).unwrap().iter().all(|e| e.state == EntryState::Settled));
        assert_eq!(store.movements(inv.id).unwrap().len(), 1);
    }

    #[test]
    fn test_settled_entry_makes_interim_payout_stale() {
        let store = MemoryStore::new();
        let (inv, schedule) = seeded(&store, "ACC-1");
        let now = Utc::now();
        let first = schedule[0].id;

        let interim = Transition::new(inv.id, InvestmentState::Active, InvestmentState::Active, now).settle(vec![first]);
        assert_eq!(store.apply(interim.clone()).unwrap(), TransitionOutcome::Applied);
        assert_eq!(store.apply(interim).unwrap(), TransitionOutcome::Stale);
        assert_eq!(store.investment(inv.id).unwrap().unwrap().state, InvestmentState::Active);
    }

    #[test]
    fn test_cancel_pending_leaves_settled_alone() {
        let store = MemoryStore::new();
        let (inv, schedule) = seeded(&store, "ACC-1");
        let now = Utc::now();

        let interim = Transition::new(inv.id, InvestmentState::Active, InvestmentState::Active, now)
            .settle(vec![schedule[0].id]);
        store.apply(interim).unwrap();

        let cancel = Transition::new(inv.id, InvestmentState::Active, InvestmentState::Canceled, now).cancel_pending();
        store.apply(cancel).unwrap();

        let after = store.schedule(inv.id).unwrap();
        assert_eq!(after[0].state, EntryState::Settled);
        assert!(after[1..].iter().all(|e| e.state == EntryState::Canceled));
    }

    #[test]
    fn test_pending_entries_due() {
        let store = MemoryStore::new();
        let (_, schedule) = seeded(&store, "ACC-1");
        let first_date = schedule[0].scheduled_date;

        assert!(store.pending_entries_due(first_date.pred_opt().unwrap()).unwrap().is_empty());
        assert_eq!(store.pending_entries_due(first_date).unwrap().len(), 1);
    }

    #[test]
    fn test_one_closing_path_wins() {
        let store = MemoryStore::new();
        let (inv, _) = seeded(&store, "ACC-1");
        let now = Utc::now();
        let first = ClosingClaim::new(ClosingKind::Maturity, inv.maturity_date);
        let later = ClosingClaim::new(ClosingKind::Maturity, inv.maturity_date.succ_opt().unwrap());
        let cancel = ClosingClaim::new(ClosingKind::Cancellation, inv.maturity_date);

        assert_eq!(store.claim_closing(inv.id, first).unwrap(), ClaimOutcome::Owned(first));
        // a resumed claim keeps the original day
        assert_eq!(store.claim_closing(inv.id, later).unwrap(), ClaimOutcome::Owned(first));
        assert_eq!(store.claim_closing(inv.id, cancel).unwrap(), ClaimOutcome::HeldBy(first));

        // writes without the claim, or with the other kind, are refused
        let unclaimed = Transition::new(inv.id, InvestmentState::Active, InvestmentState::Canceled, now);
        assert_eq!(store.apply(unclaimed.clone()).unwrap(), TransitionOutcome::Stale);
        assert_eq!(
            store.apply(unclaimed.closing(ClosingKind::Cancellation)).unwrap(),
            TransitionOutcome::Stale
        );

        let matured = Transition::new(inv.id, InvestmentState::Active, InvestmentState::Matured, now)
            .closing(ClosingKind::Maturity);
        assert_eq!(store.apply(matured).unwrap(), TransitionOutcome::Applied);
        assert_eq!(
            store.claim_closing(inv.id, cancel).unwrap(),
            ClaimOutcome::Closed(InvestmentState::Matured)
        );
        assert!(store.claim_closing(uuid::Uuid::new_v4(), cancel).is_err());
    }
}
