pub mod calendar;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod interest;
pub mod investment;
pub mod ledger;
pub mod lifecycle;
pub mod rates;
pub mod schedule;
pub mod service;
pub mod settlement;
pub mod simulator;
pub mod store;
pub mod types;

// re-export key types
pub use calendar::BusinessDayAdjuster;
pub use config::{CancellationPolicy, DepositConfig};
pub use decimal::{Money, Rate};
pub use errors::{DepositError, ErrorKind, Result};
pub use interest::{DayCountConvention, InterestCalculation, InterestCalculator, SimpleInterest};
pub use investment::{Investment, Movement};
pub use ledger::{Ledger, MemoryLedger};
pub use lifecycle::InvestmentLifecycle;
pub use rates::{RateLookup, RateRule, RateTable};
pub use schedule::{ScheduleEntry, ScheduleGenerator};
pub use service::{
    CreateInvestmentRequest, DepositService, InvestmentView, RateLookupQuery, SimulateRequest,
    StateChangeRequest,
};
pub use settlement::{DueSet, FailedItem, ProcessedItem, SettleOutcome, SettlementRun, SettlementRunner};
pub use simulator::{Simulation, Simulator};
pub use store::{
    ClaimOutcome, ClosingClaim, InvestmentFilter, InvestmentStore, MemoryStore, SqliteStore, Transition,
    TransitionOutcome,
};
pub use types::{
    AccountId, ClosingKind, EntryId, EntryState, EventType, InterestModality, InvestmentId, InvestmentState,
    MovementType, Product, TransactionId,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
