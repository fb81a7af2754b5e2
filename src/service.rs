use hourglass_rs::SafeTimeProvider;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::DepositConfig;
use crate::decimal::{Money, Rate};
use crate::errors::Result;
use crate::investment::{Investment, Movement};
use crate::ledger::Ledger;
use crate::lifecycle::InvestmentLifecycle;
use crate::rates::{RateLookup, RateRule, RateTable};
use crate::schedule::ScheduleEntry;
use crate::settlement::{SettleOutcome, SettlementRun, SettlementRunner};
use crate::simulator::{Simulation, Simulator};
use crate::store::{InvestmentFilter, InvestmentStore};
use crate::types::{AccountId, InterestModality, InvestmentId, InvestmentState};

/// `POST /investments`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateInvestmentRequest {
    pub account_id: AccountId,
    pub principal: Money,
    pub term_days: u32,
    pub interest_modality: InterestModality,
    #[serde(default)]
    pub auto_renew: bool,
}

/// `POST /simulate`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulateRequest {
    pub principal: Money,
    pub term_days: u32,
    /// optional quoted rate, as a percentage (3.15) or a fraction (0.0315)
    #[serde(default)]
    pub annual_rate: Option<Decimal>,
}

/// `GET /rates/lookup`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLookupQuery {
    pub principal: Money,
    pub term_days: u32,
}

/// `PATCH /investments/{id}/state`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChangeRequest {
    pub state: InvestmentState,
}

/// an investment with its schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentView {
    #[serde(flatten)]
    pub investment: Investment,
    pub schedule: Vec<ScheduleEntry>,
}

/// Service surface of the deposit desk.
///
/// Wires the components over one store, ledger and clock. One method per
/// endpoint; routing and transport stay with the caller.
pub struct DepositService {
    config: Arc<DepositConfig>,
    rates: RateTable,
    simulator: Simulator,
    lifecycle: InvestmentLifecycle,
    runner: SettlementRunner,
}

impl DepositService {
    /// validates `config` and builds every component from it
    pub fn new(
        config: DepositConfig,
        store: Arc<dyn InvestmentStore>,
        ledger: Arc<dyn Ledger>,
        time: SafeTimeProvider,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        Ok(Self {
            rates: RateTable::from_config(&config),
            simulator: Simulator::from_config(&config, time.clone()),
            lifecycle: InvestmentLifecycle::new(config.clone(), store.clone(), ledger.clone(), time.clone()),
            runner: SettlementRunner::new(config.clone(), store, ledger, time),
            config,
        })
    }

    pub fn config(&self) -> &DepositConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> &InvestmentLifecycle {
        &self.lifecycle
    }

    pub fn runner(&self) -> &SettlementRunner {
        &self.runner
    }

    // investments

    pub fn create_investment(&self, request: CreateInvestmentRequest) -> Result<InvestmentView> {
        let investment = self.lifecycle.create(
            &request.account_id,
            request.principal,
            request.term_days,
            request.interest_modality,
            request.auto_renew,
        )?;
        self.view(investment)
    }

    pub fn list_investments(&self, filter: &InvestmentFilter) -> Result<Vec<Investment>> {
        self.lifecycle.list(filter)
    }

    pub fn get_investment(&self, id: InvestmentId) -> Result<InvestmentView> {
        let investment = self.lifecycle.get(id)?;
        self.view(investment)
    }

    pub fn investment_schedule(&self, id: InvestmentId) -> Result<Vec<ScheduleEntry>> {
        self.lifecycle.schedule(id)
    }

    pub fn investment_movements(&self, id: InvestmentId) -> Result<Vec<Movement>> {
        self.lifecycle.movements(id)
    }

    pub fn change_state(&self, id: InvestmentId, request: StateChangeRequest) -> Result<InvestmentView> {
        let investment = self.lifecycle.update_state(id, request.state)?;
        self.view(investment)
    }

    pub fn cancel_investment(&self, id: InvestmentId) -> Result<InvestmentView> {
        let investment = self.lifecycle.cancel(id)?;
        self.view(investment)
    }

    // quoting

    pub fn simulate(&self, request: SimulateRequest) -> Result<Simulation> {
        match request.annual_rate {
            Some(quoted) => self
                .simulator
                .simulate_at_rate(request.principal, request.term_days, Rate::from_quoted(quoted)),
            None => self.simulator.simulate(request.principal, request.term_days),
        }
    }

    pub fn recommendations(&self, principal: Money) -> Result<Vec<Simulation>> {
        self.simulator.recommend(principal)
    }

    pub fn rates(&self) -> Vec<RateRule> {
        self.rates.rules()
    }

    pub fn rate_lookup(&self, query: RateLookupQuery) -> RateLookup {
        self.rates.lookup(query.principal, query.term_days)
    }

    // settlement

    pub fn run_settlement(&self) -> Result<SettlementRun> {
        self.runner.run_now()
    }

    pub fn settle_now(&self, id: InvestmentId) -> Result<SettleOutcome> {
        self.runner.settle_now(id)
    }

    pub fn upcoming(&self, days: u32) -> Result<Vec<Investment>> {
        self.runner.upcoming(days)
    }

    fn view(&self, investment: Investment) -> Result<InvestmentView> {
        let schedule = self.lifecycle.schedule(investment.id)?;
        Ok(InvestmentView { investment, schedule })
    }
}
