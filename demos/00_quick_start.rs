/// quick start - open a deposit and look at its schedule
use std::sync::Arc;
use time_deposit_rs::{
    CreateInvestmentRequest, DepositConfig, DepositService, InterestModality, Ledger, MemoryLedger, MemoryStore, Money,
    SafeTimeProvider, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // an account with funds to invest
    let ledger = Arc::new(MemoryLedger::new());
    ledger.open_account("ACC-001", Money::from_major(5_000))?;

    let service = DepositService::new(
        DepositConfig::default(),
        Arc::new(MemoryStore::new()),
        ledger.clone(),
        SafeTimeProvider::new(TimeSource::System),
    )?;

    // open $1,000 for 91 days
    let view = service.create_investment(CreateInvestmentRequest {
        account_id: "ACC-001".to_string(),
        principal: Money::from_major(1_000),
        term_days: 91,
        interest_modality: InterestModality::AtMaturity,
        auto_renew: false,
    })?;

    println!("{}", serde_json::to_string_pretty(&view)?);
    println!("account balance: ${}", ledger.balance(&"ACC-001".to_string())?);

    Ok(())
}
