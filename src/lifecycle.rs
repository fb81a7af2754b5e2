use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use std::sync::Arc;

use crate::calendar::BusinessDayAdjuster;
use crate::config::{CancellationPolicy, DepositConfig};
use crate::decimal::Money;
use crate::errors::{DepositError, Result};
use crate::interest::{InterestCalculator, SimpleInterest};
use crate::investment::{Investment, Movement, OpeningTerms};
use crate::ledger::{
    cancellation_reference, interest_reference, opening_reference, opening_reversal_reference, Ledger,
};
use crate::rates::RateTable;
use crate::schedule::{ScheduleEntry, ScheduleGenerator};
use crate::store::{ClaimOutcome, ClosingClaim, InvestmentFilter, InvestmentStore, Transition, TransitionOutcome};
use crate::types::{ClosingKind, EntryState, InterestModality, InvestmentId, InvestmentState, MovementType};

/// how often a write is retried after losing a race on the same record
const MAX_ATTEMPTS: usize = 3;

/// Creates, cancels and administratively moves investments.
///
/// Settlement of matured contracts lives in [`crate::settlement`]; both go
/// through [`InvestmentStore::apply`] so neither can half-write a change.
pub struct InvestmentLifecycle {
    config: Arc<DepositConfig>,
    rates: RateTable,
    calculator: SimpleInterest,
    adjuster: BusinessDayAdjuster,
    generator: ScheduleGenerator,
    store: Arc<dyn InvestmentStore>,
    ledger: Arc<dyn Ledger>,
    time: SafeTimeProvider,
}

/// what an early cancellation pays out
#[derive(Debug, Clone, PartialEq)]
struct CancellationPlan {
    /// interest entries already due but not yet paid
    due_entries: Vec<ScheduleEntry>,
    /// principal plus any accrued interest not covered by due entries
    remainder: Money,
}

impl InvestmentLifecycle {
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

    /// Opens a new ACTIVE investment funded from `account_id`.
    ///
    /// Everything is validated before the ledger or store is touched. If the
    /// store rejects the new record the opening debit is reversed.
    pub fn create(
        &self,
        account_id: &str,
        principal: Money,
        term_days: u32,
        interest_modality: InterestModality,
        auto_renew: bool,
    ) -> Result<Investment> {
        let account_id = account_id.trim().to_string();
        if account_id.is_empty() {
            return Err(DepositError::InvalidInput {
                message: "account id is required".to_string(),
            });
        }
        self.validate(principal, term_days)?;

        let available = self.ledger.balance(&account_id)?;
        if available < principal {
            return Err(DepositError::InsufficientFunds {
                available,
                requested: principal,
            });
        }

        let now = self.time.now();
        let lookup = self.rates.lookup(principal, term_days);
        let investment = Investment::open(
            OpeningTerms {
                account_id: account_id.clone(),
                principal,
                term_days,
                interest_modality,
                auto_renew,
                open_date: now.date_naive(),
                annual_rate: lookup.rate,
            },
            &self.calculator,
            &self.adjuster,
            now,
        );
        let schedule = self.generator.generate(&investment);

        let tx = self.ledger.debit(&account_id, principal, &opening_reference(investment.id))?;
        let opening = Movement::new(investment.id, Some(tx), MovementType::Opening, principal, now);

        if let Err(err) = self.store.insert_investment(&investment, &schedule, Some(&opening)) {
            log::warn!("persisting investment {} failed, reversing opening debit: {}", investment.id, err);
            if let Err(reversal) =
                self.ledger
                    .credit(&account_id, principal, &opening_reversal_reference(investment.id))
            {
                log::error!("opening debit {} on {} could not be reversed: {}", tx, account_id, reversal);
            }
            return Err(err);
        }

        log::info!(
            "opened investment {} for {}: principal={} term={}d rate={} maturity={} modality={}",
            investment.id,
            investment.account_id,
            investment.principal,
            investment.term_days,
            investment.annual_rate,
            investment.maturity_date,
            investment.interest_modality
        );
        Ok(investment)
    }

    pub fn get(&self, id: InvestmentId) -> Result<Investment> {
        self.store
            .investment(id)?
            .ok_or(DepositError::InvestmentNotFound { id })
    }

    pub fn list(&self, filter: &InvestmentFilter) -> Result<Vec<Investment>> {
        self.store.list_investments(filter)
    }

    pub fn schedule(&self, id: InvestmentId) -> Result<Vec<ScheduleEntry>> {
        self.get(id)?;
        self.store.schedule(id)
    }

    pub fn movements(&self, id: InvestmentId) -> Result<Vec<Movement>> {
        self.get(id)?;
        self.store.movements(id)
    }

    /// Closes an ACTIVE investment early and pays it out under the configured policy.
    ///
    /// The cancellation claim is taken before any credit. A maturity
    /// settlement already holding the investment makes this fail with
    /// `InvalidState`; a cancel interrupted after its claim is finished by
    /// calling it again, priced as of the day of the claim.
    pub fn cancel(&self, id: InvestmentId) -> Result<Investment> {
        for attempt in 1..=MAX_ATTEMPTS {
            let investment = self.get(id)?;
            if !investment.is_active() {
                return Err(DepositError::InvalidState {
                    current: investment.state,
                    operation: "cancel".to_string(),
                });
            }

            let requested = ClosingClaim::new(ClosingKind::Cancellation, self.time.now().date_naive());
            let claim = match self.store.claim_closing(id, requested)? {
                ClaimOutcome::Owned(claim) => claim,
                ClaimOutcome::HeldBy(other) => {
                    log::info!("cancel of {} refused: {} closing in progress since {}", id, other.kind, other.as_of);
                    return Err(DepositError::InvalidState {
                        current: investment.state,
                        operation: "cancel during maturity settlement".to_string(),
                    });
                }
                ClaimOutcome::Closed(state) => {
                    return Err(DepositError::InvalidState {
                        current: state,
                        operation: "cancel".to_string(),
                    });
                }
            };

            let schedule = self.store.schedule(id)?;
            let plan = self.plan_cancellation(&investment, &schedule, claim.as_of);

            let mut paid_interest = Money::ZERO;
            for entry in &plan.due_entries {
                if entry.scheduled_amount.is_positive() {
                    self.ledger
                        .credit(&investment.account_id, entry.scheduled_amount, &interest_reference(entry.id))?;
                }
                paid_interest += entry.scheduled_amount;
            }
            let tx = self
                .ledger
                .credit(&investment.account_id, plan.remainder, &cancellation_reference(id))?;

            let now = self.time.now();
            let amount = plan.remainder + paid_interest;
            let transition = Transition::new(id, InvestmentState::Active, InvestmentState::Canceled, now)
                .settle(plan.due_entries.iter().map(|e| e.id).collect())
                .cancel_pending()
                .closing(ClosingKind::Cancellation)
                .movement(Movement::new(id, Some(tx), MovementType::Cancellation, amount, now));

            match self.store.apply(transition)? {
                TransitionOutcome::Applied => {
                    log::info!(
                        "canceled investment {} for {}: paid {} ({:?})",
                        id,
                        investment.account_id,
                        amount,
                        self.config.cancellation_policy
                    );
                    return self.get(id);
                }
                TransitionOutcome::Stale => {
                    log::debug!("cancel of {} lost a race on attempt {}, re-reading", id, attempt);
                }
            }
        }

        Err(DepositError::StoreUnavailable {
            message: format!("investment {} kept changing during cancel", id),
        })
    }

    /// Administrative transition along the lifecycle edges.
    ///
    /// Record-only: pending entries are canceled and no money moves, so the
    /// principal debited at opening is not returned and auto-renewal opens no
    /// successor. Use [`InvestmentLifecycle::cancel`] or the settlement runner
    /// to pay an investment out. Refused while a cancellation or settlement
    /// holds the investment.
    pub fn update_state(&self, id: InvestmentId, next: InvestmentState) -> Result<Investment> {
        let investment = self.get(id)?;
        if !investment.state.can_transition_to(next) {
            return Err(DepositError::InvalidTransition {
                from: investment.state,
                to: next,
            });
        }

        let transition = Transition::new(id, investment.state, next, self.time.now()).cancel_pending();
        match self.store.apply(transition)? {
            TransitionOutcome::Applied => {
                log::warn!(
                    "investment {} moved {} -> {} administratively; principal {} stays unpaid",
                    id,
                    investment.state,
                    next,
                    investment.principal
                );
                self.get(id)
            }
            TransitionOutcome::Stale => {
                let latest = self.get(id)?;
                if let (true, Some(claim)) = (latest.is_active(), self.store.closing_claim(id)?) {
                    return Err(DepositError::InvalidState {
                        current: latest.state,
                        operation: format!("administrative transition during {} closing", claim.kind),
                    });
                }
                Err(DepositError::InvalidTransition {
                    from: latest.state,
                    to: next,
                })
            }
        }
    }

    fn validate(&self, principal: Money, term_days: u32) -> Result<()> {
        let reject = |reason: String| DepositError::InvalidPrincipal {
            amount: principal,
            reason,
        };

        if !principal.is_positive() {
            return Err(reject("principal must be positive".to_string()));
        }
        if principal != principal.round_currency() {
            return Err(reject("principal has more than two decimal places".to_string()));
        }
        if principal < self.config.min_principal {
            return Err(reject(format!("below minimum {}", self.config.min_principal)));
        }
        if let Some(max) = self.config.max_principal {
            if principal > max {
                return Err(reject(format!("above maximum {}", max)));
            }
        }

        if term_days < self.config.min_term_days || term_days > self.config.max_term_days {
            return Err(DepositError::InvalidTerm {
                term_days,
                minimum: self.config.min_term_days,
                maximum: self.config.max_term_days,
            });
        }
        Ok(())
    }

    fn plan_cancellation(&self, investment: &Investment, schedule: &[ScheduleEntry], today: NaiveDate) -> CancellationPlan {
        match self.config.cancellation_policy {
            CancellationPolicy::PrincipalOnly => CancellationPlan {
                due_entries: Vec::new(),
                remainder: investment.principal,
            },
            CancellationPolicy::PrincipalPlusAccrued => {
                let accrued = self
                    .calculator
                    .accrued_between(
                        investment.principal,
                        investment.annual_rate,
                        investment.open_date,
                        today.min(investment.maturity_date),
                    )
                    .min(investment.total_interest);

                // interest already due counts against the accrual whether or not it was paid
                let due: Vec<&ScheduleEntry> = schedule
                    .iter()
                    .filter(|e| e.is_interest() && e.scheduled_date <= today && e.state != EntryState::Canceled)
                    .collect();
                let due_interest: Money = due.iter().map(|e| e.scheduled_amount).sum();

                CancellationPlan {
                    due_entries: due.into_iter().filter(|e| e.is_pending()).cloned().collect(),
                    remainder: investment.principal + (accrued - due_interest).max(Money::ZERO),
                }
            }
        }
    }
}
