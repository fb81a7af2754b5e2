/// overlapping runs - several settlement workers over one store still pay once
use chrono::{NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use std::thread;
use time_deposit_rs::{
    DepositConfig, InterestModality, InvestmentLifecycle, InvestmentStore, Ledger, MemoryLedger, MemoryStore, Money,
    SafeTimeProvider, SettlementRunner, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    println!("=== overlapping settlement runs ===\n");

    let config = Arc::new(DepositConfig::default());
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(MemoryLedger::new());

    let opened_on = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap()));
    let lifecycle = InvestmentLifecycle::new(config.clone(), store.clone(), ledger.clone(), opened_on);

    for n in 1..=5 {
        let account = format!("ACC-{:03}", n);
        ledger.open_account(account.as_str(), Money::from_major(50_000))?;
        lifecycle.create(&account, Money::from_major(10_000 * n), 91, InterestModality::AtMaturity, n % 2 == 0)?;
    }

    // four workers fire at once, as a cron trigger with no mutual exclusion would
    let as_of = NaiveDate::from_ymd_opt(2024, 4, 3).ok_or("bad date")?;
    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let config = config.clone();
            let store: Arc<dyn InvestmentStore> = store.clone();
            let ledger: Arc<dyn Ledger> = ledger.clone();
            thread::spawn(move || {
                let time =
                    SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2024, 4, 3, 6, 0, 0).unwrap()));
                let run = SettlementRunner::new(config, store, ledger, time).run(as_of);
                (worker, run)
            })
        })
        .collect();

    for handle in workers {
        let (worker, run) = handle.join().map_err(|_| "worker panicked")?;
        let run = run?;
        println!(
            "worker {}: processed={} skipped={} failed={}",
            worker,
            run.processed.len(),
            run.skipped.len(),
            run.failed.len()
        );
    }

    println!("\nledger transactions:");
    for tx in ledger.transactions()? {
        println!("  {:?} {} ${} {}", tx.direction, tx.account_id, tx.amount, tx.reference);
    }

    Ok(())
}
