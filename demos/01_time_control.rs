/// time control - walk a monthly deposit through interim payouts and maturity
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use time_deposit_rs::{
    CreateInvestmentRequest, DepositConfig, DepositService, InterestModality, Ledger, MemoryLedger, MemoryStore, Money,
    SafeTimeProvider, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    println!("=== time control example ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap()));
    let controller = time.test_control().unwrap();

    let ledger = Arc::new(MemoryLedger::new());
    ledger.open_account("ACC-001", Money::from_major(25_000))?;
    let account = "ACC-001".to_string();

    let service = DepositService::new(
        DepositConfig::default(),
        Arc::new(MemoryStore::new()),
        ledger.clone(),
        time.clone(),
    )?;

    let view = service.create_investment(CreateInvestmentRequest {
        account_id: account.clone(),
        principal: Money::from_major(10_000),
        term_days: 91,
        interest_modality: InterestModality::Monthly,
        auto_renew: true,
    })?;
    let investment = &view.investment;
    println!("opened {} on {}", investment.id, time.now().format("%Y-%m-%d"));
    println!("rate {}, total interest ${}", investment.annual_rate, investment.total_interest);
    for entry in &view.schedule {
        println!("  {} {:<16} ${}", entry.scheduled_date, entry.event_type, entry.scheduled_amount);
    }

    // run the settlement job once a week until the deposit renews
    for _week in 0..14 {
        controller.advance(Duration::days(7));
        let run = service.run_settlement()?;
        for item in &run.processed {
            println!(
                "{}: {} ${}",
                time.now().format("%Y-%m-%d"),
                item.kind,
                item.amount
            );
        }
    }

    println!("\nbalance after one term: ${}", ledger.balance(&account)?);
    for inv in service.list_investments(&time_deposit_rs::InvestmentFilter::account(account.clone()))? {
        println!("  {} {} matures {}", inv.id, inv.state, inv.maturity_date);
    }

    Ok(())
}
