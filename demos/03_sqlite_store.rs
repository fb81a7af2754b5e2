/// sqlite store - persist deposits in a database file and settle them later
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use time_deposit_rs::{
    CreateInvestmentRequest, DepositConfig, DepositService, InterestModality, Ledger, MemoryLedger, Money, SafeTimeProvider,
    SqliteStore, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    println!("=== sqlite store ===\n");

    let path = std::env::temp_dir().join("time_deposits_demo.db");
    let _ = std::fs::remove_file(&path);
    let store = Arc::new(SqliteStore::open(&path)?);
    println!("database: {}", path.display());

    // config can come from a json file; partial documents fill in defaults
    let config = DepositConfig::from_json_str(r#"{ "cancellation_policy": "PRINCIPAL_ONLY" }"#)?;

    let time = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap()));
    let controller = time.test_control().unwrap();

    let ledger = Arc::new(MemoryLedger::new());
    ledger.open_account("ACC-777", Money::from_major(80_000))?;

    let service = DepositService::new(config, store, ledger.clone(), time.clone())?;

    let quarterly = service.create_investment(CreateInvestmentRequest {
        account_id: "ACC-777".to_string(),
        principal: Money::from_major(60_000),
        term_days: 365,
        interest_modality: InterestModality::Quarterly,
        auto_renew: false,
    })?;
    let short = service.create_investment(CreateInvestmentRequest {
        account_id: "ACC-777".to_string(),
        principal: Money::from_major(5_000),
        term_days: 61,
        interest_modality: InterestModality::AtMaturity,
        auto_renew: false,
    })?;

    println!("maturing within 90 days:");
    for inv in service.upcoming(90)? {
        println!("  {} ${} on {}", inv.id, inv.principal, inv.maturity_date);
    }

    // three months on: the short deposit has matured and the first coupon is due
    controller.advance(Duration::days(92));
    let run = service.run_settlement()?;
    println!("\nrun as of {}: {}", run.as_of, serde_json::to_string_pretty(&run.processed)?);

    // close the long deposit early
    let canceled = service.cancel_investment(quarterly.investment.id)?;
    println!("\ncanceled {} -> {}", canceled.investment.id, canceled.investment.state);
    for movement in service.investment_movements(short.investment.id)? {
        println!("  {} ${}", movement.movement_type, movement.amount);
    }

    println!("\nbalance: ${}", ledger.balance(&"ACC-777".to_string())?);
    Ok(())
}
