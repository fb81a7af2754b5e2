use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::errors::{DepositError, Result};
use crate::investment::{Investment, Movement};
use crate::schedule::ScheduleEntry;
use crate::store::{
    resolve_claim, ClaimOutcome, ClosingClaim, InvestmentFilter, InvestmentStore, Transition, TransitionOutcome,
};
use crate::types::{ClosingKind, EntryId, EntryState, InvestmentId, InvestmentState};

const DATE_FORMAT: &str = "%Y-%m-%d";

const INVESTMENT_COLUMNS: &str = "id, account_id, product, principal, term_days, interest_modality, \
     open_date, maturity_date, auto_renew, state, annual_rate, total_interest, renewed_from, \
     created_at, updated_at";

const ENTRY_COLUMNS: &str = "id, investment_id, event_type, scheduled_date, scheduled_amount, state";

/// SQLite-backed store.
///
/// Every `apply` and `claim_closing` runs in one IMMEDIATE transaction, so the
/// check and the write are atomic across connections sharing the file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// open (or create) the database at `path` and apply the schema
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::from_connection(conn)
    }

    /// in-memory database, used in tests and demos
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(include_str!("../../migrations/001_deposits.sql"))?;
        conn.execute_batch(include_str!("../../migrations/002_closing_claims.sql"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DepositError::StoreUnavailable {
            message: "sqlite connection lock poisoned".to_string(),
        })
    }
}

impl InvestmentStore for SqliteStore {
    fn insert_investment(
        &self,
        investment: &Investment,
        schedule: &[ScheduleEntry],
        movement: Option<&Movement>,
    ) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        insert_investment_row(&tx, investment)?;
        for entry in schedule {
            insert_entry_row(&tx, entry)?;
        }
        if let Some(movement) = movement {
            insert_movement_row(&tx, movement)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn investment(&self, id: InvestmentId) -> Result<Option<Investment>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {INVESTMENT_COLUMNS} FROM investment WHERE id = ?1");
        let row = conn
            .query_row(&sql, params![id.to_string()], InvestmentRow::read)
            .optional()?;
        row.map(InvestmentRow::into_investment).transpose()
    }

    fn list_investments(&self, filter: &InvestmentFilter) -> Result<Vec<Investment>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(account) = &filter.account_id {
            clauses.push("account_id = ?");
            values.push(account.clone());
        }
        if let Some(state) = filter.state {
            clauses.push("state = ?");
            values.push(state.as_str().to_string());
        }
        if let Some(product) = filter.product {
            clauses.push("product = ?");
            values.push(product.as_str().to_string());
        }
        if let Some(from) = filter.maturing_from {
            clauses.push("maturity_date >= ?");
            values.push(format_date(from));
        }
        if let Some(to) = filter.maturing_to {
            clauses.push("maturity_date <= ?");
            values.push(format_date(to));
        }

        let mut sql = format!("SELECT {INVESTMENT_COLUMNS} FROM investment");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY maturity_date ASC, open_date ASC, created_at ASC");

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), InvestmentRow::read)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(InvestmentRow::into_investment).collect()
    }

    fn schedule(&self, investment_id: InvestmentId) -> Result<Vec<ScheduleEntry>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM schedule_entry WHERE investment_id = ?1
             ORDER BY scheduled_date ASC,
                      CASE event_type WHEN 'INTEREST_PAYMENT' THEN 0 ELSE 1 END ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![investment_id.to_string()], EntryRow::read)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(EntryRow::into_entry).collect()
    }

    fn schedule_entry(&self, id: EntryId) -> Result<Option<ScheduleEntry>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM schedule_entry WHERE id = ?1");
        let row = conn
            .query_row(&sql, params![id.to_string()], EntryRow::read)
            .optional()?;
        row.map(EntryRow::into_entry).transpose()
    }

    fn pending_entries_due(&self, as_of: NaiveDate) -> Result<Vec<ScheduleEntry>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM schedule_entry
             WHERE state = 'PENDING' AND scheduled_date <= ?1
             ORDER BY scheduled_date ASC,
                      CASE event_type WHEN 'INTEREST_PAYMENT' THEN 0 ELSE 1 END ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![format_date(as_of)], EntryRow::read)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(EntryRow::into_entry).collect()
    }

    fn movements(&self, investment_id: InvestmentId) -> Result<Vec<Movement>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, investment_id, transaction_id, movement_type, amount, created_at
             FROM movement WHERE investment_id = ?1 ORDER BY seq ASC",
        )?;
        let rows = stmt
            .query_map(params![investment_id.to_string()], |row| {
                Ok(MovementRow {
                    id: row.get(0)?,
                    investment_id: row.get(1)?,
                    transaction_id: row.get(2)?,
                    movement_type: row.get(3)?,
                    amount: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(MovementRow::into_movement).collect()
    }

    fn apply(&self, transition: Transition) -> Result<TransitionOutcome> {
        let mut conn = self.lock()?;
        // dropping `tx` without commit rolls back
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let investment_id = transition.investment_id.to_string();

        let state: Option<String> = tx
            .query_row(
                "SELECT state FROM investment WHERE id = ?1",
                params![investment_id],
                |row| row.get(0),
            )
            .optional()?;
        let state = state.ok_or(DepositError::InvestmentNotFound { id: transition.investment_id })?;
        if InvestmentState::from_str(&state)? != transition.expected {
            return Ok(TransitionOutcome::Stale);
        }
        let recorded = read_claim(&tx, &investment_id)?.map(|c| c.kind);
        if !transition.admits(recorded) {
            return Ok(TransitionOutcome::Stale);
        }

        for id in &transition.settle_entries {
            let row: Option<(String, String)> = tx
                .query_row(
                    "SELECT investment_id, state FROM schedule_entry WHERE id = ?1",
                    params![id.to_string()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let (owner, entry_state) = row.ok_or(DepositError::ScheduleEntryNotFound { id: *id })?;
            if owner != investment_id {
                return Err(DepositError::InvalidInput {
                    message: format!("entry {} belongs to another investment", id),
                });
            }
            if EntryState::from_str(&entry_state)? != EntryState::Pending {
                return Ok(TransitionOutcome::Stale);
            }
            tx.execute(
                "UPDATE schedule_entry SET state = ?1 WHERE id = ?2",
                params![EntryState::Settled.as_str(), id.to_string()],
            )?;
        }

        if transition.cancel_pending {
            tx.execute(
                "UPDATE schedule_entry SET state = ?1 WHERE investment_id = ?2 AND state = ?3",
                params![EntryState::Canceled.as_str(), investment_id, EntryState::Pending.as_str()],
            )?;
        }

        let changed = tx.execute(
            "UPDATE investment SET state = ?1, updated_at = ?2 WHERE id = ?3 AND state = ?4",
            params![
                transition.next.as_str(),
                transition.at.to_rfc3339(),
                investment_id,
                transition.expected.as_str()
            ],
        )?;
        if changed != 1 {
            return Ok(TransitionOutcome::Stale);
        }

        if let Some(movement) = &transition.movement {
            insert_movement_row(&tx, movement)?;
        }

        if let Some((successor, schedule)) = &transition.successor {
            insert_investment_row(&tx, successor)?;
            for entry in schedule {
                insert_entry_row(&tx, entry)?;
            }
        }

        tx.commit()?;
        Ok(TransitionOutcome::Applied)
    }

    fn claim_closing(&self, investment_id: InvestmentId, claim: ClosingClaim) -> Result<ClaimOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let id = investment_id.to_string();

        let state: Option<String> = tx
            .query_row("SELECT state FROM investment WHERE id = ?1", params![id], |row| row.get(0))
            .optional()?;
        let state = state.ok_or(DepositError::InvestmentNotFound { id: investment_id })?;

        let recorded = read_claim(&tx, &id)?;
        let outcome = resolve_claim(InvestmentState::from_str(&state)?, recorded, claim);
        if let (ClaimOutcome::Owned(owned), None) = (outcome, recorded) {
            tx.execute(
                "INSERT INTO closing_claim (investment_id, kind, as_of) VALUES (?1, ?2, ?3)",
                params![id, owned.kind.as_str(), format_date(owned.as_of)],
            )?;
        }
        tx.commit()?;
        Ok(outcome)
    }

    fn closing_claim(&self, investment_id: InvestmentId) -> Result<Option<ClosingClaim>> {
        let conn = self.lock()?;
        read_claim(&conn, &investment_id.to_string())
    }
}

fn read_claim(conn: &Connection, investment_id: &str) -> Result<Option<ClosingClaim>> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT kind, as_of FROM closing_claim WHERE investment_id = ?1",
            params![investment_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    row.map(|(kind, as_of)| -> Result<ClosingClaim> {
        Ok(ClosingClaim::new(ClosingKind::from_str(&kind)?, parse_date(&as_of)?))
    })
    .transpose()
}

fn insert_investment_row(conn: &Connection, investment: &Investment) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO investment ({INVESTMENT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
        ),
        params![
            investment.id.to_string(),
            investment.account_id,
            investment.product.as_str(),
            investment.principal.to_string(),
            investment.term_days as i64,
            investment.interest_modality.as_str(),
            format_date(investment.open_date),
            format_date(investment.maturity_date),
            investment.auto_renew,
            investment.state.as_str(),
            investment.annual_rate.as_decimal().to_string(),
            investment.total_interest.to_string(),
            investment.renewed_from.map(|id| id.to_string()),
            investment.created_at.to_rfc3339(),
            investment.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn insert_entry_row(conn: &Connection, entry: &ScheduleEntry) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO schedule_entry ({ENTRY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
        params![
            entry.id.to_string(),
            entry.investment_id.to_string(),
            entry.event_type.as_str(),
            format_date(entry.scheduled_date),
            entry.scheduled_amount.to_string(),
            entry.state.as_str(),
        ],
    )?;
    Ok(())
}

fn insert_movement_row(conn: &Connection, movement: &Movement) -> Result<()> {
    conn.execute(
        "INSERT INTO movement (id, investment_id, transaction_id, movement_type, amount, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            movement.id.to_string(),
            movement.investment_id.to_string(),
            movement.transaction_id.map(|id| id.to_string()),
            movement.movement_type.as_str(),
            movement.amount.to_string(),
            movement.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

// raw rows: read as text inside the rusqlite closure, parsed outside it

struct InvestmentRow {
    id: String,
    account_id: String,
    product: String,
    principal: String,
    term_days: i64,
    interest_modality: String,
    open_date: String,
    maturity_date: String,
    auto_renew: bool,
    state: String,
    annual_rate: String,
    total_interest: String,
    renewed_from: Option<String>,
    created_at: String,
    updated_at: String,
}

impl InvestmentRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            account_id: row.get(1)?,
            product: row.get(2)?,
            principal: row.get(3)?,
            term_days: row.get(4)?,
            interest_modality: row.get(5)?,
            open_date: row.get(6)?,
            maturity_date: row.get(7)?,
            auto_renew: row.get(8)?,
            state: row.get(9)?,
            annual_rate: row.get(10)?,
            total_interest: row.get(11)?,
            renewed_from: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }

    fn into_investment(self) -> Result<Investment> {
        Ok(Investment {
            id: parse_uuid(&self.id)?,
            account_id: self.account_id,
            product: self.product.parse()?,
            principal: parse_money(&self.principal)?,
            term_days: u32::try_from(self.term_days).map_err(|_| corrupt("term_days", &self.term_days.to_string()))?,
            interest_modality: self.interest_modality.parse()?,
            open_date: parse_date(&self.open_date)?,
            maturity_date: parse_date(&self.maturity_date)?,
            auto_renew: self.auto_renew,
            state: self.state.parse()?,
            annual_rate: parse_rate(&self.annual_rate)?,
            total_interest: parse_money(&self.total_interest)?,
            renewed_from: self.renewed_from.as_deref().map(parse_uuid).transpose()?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

struct EntryRow {
    id: String,
    investment_id: String,
    event_type: String,
    scheduled_date: String,
    scheduled_amount: String,
    state: String,
}

impl EntryRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            investment_id: row.get(1)?,
            event_type: row.get(2)?,
            scheduled_date: row.get(3)?,
            scheduled_amount: row.get(4)?,
            state: row.get(5)?,
        })
    }

    fn into_entry(self) -> Result<ScheduleEntry> {
        Ok(ScheduleEntry {
            id: parse_uuid(&self.id)?,
            investment_id: parse_uuid(&self.investment_id)?,
            event_type: self.event_type.parse()?,
            scheduled_date: parse_date(&self.scheduled_date)?,
            scheduled_amount: parse_money(&self.scheduled_amount)?,
            state: self.state.parse()?,
        })
    }
}

struct MovementRow {
    id: String,
    investment_id: String,
    transaction_id: Option<String>,
    movement_type: String,
    amount: String,
    created_at: String,
}

impl MovementRow {
    fn into_movement(self) -> Result<Movement> {
        Ok(Movement {
            id: parse_uuid(&self.id)?,
            investment_id: parse_uuid(&self.investment_id)?,
            transaction_id: self.transaction_id.as_deref().map(parse_uuid).transpose()?,
            movement_type: self.movement_type.parse()?,
            amount: parse_money(&self.amount)?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn corrupt(field: &str, value: &str) -> DepositError {
    DepositError::StoreUnavailable {
        message: format!("unreadable {field} in store: {value:?}"),
    }
}

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|_| corrupt("id", value))
}

fn parse_money(value: &str) -> Result<Money> {
    Money::from_str(value).map_err(|_| corrupt("amount", value))
}

fn parse_rate(value: &str) -> Result<Rate> {
    Decimal::from_str(value)
        .map(Rate::from_decimal)
        .map_err(|_| corrupt("rate", value))
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| corrupt("date", value))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| corrupt("timestamp", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::BusinessDayAdjuster;
    use crate::interest::SimpleInterest;
    use crate::investment::OpeningTerms;
    use crate::schedule::ScheduleGenerator;
    use crate::types::{InterestModality, MovementType};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn open(account: &str, open_date: NaiveDate, auto_renew: bool) -> (Investment, Vec<ScheduleEntry>) {
        let now = Utc.from_utc_datetime(&open_date.and_hms_opt(9, 30, 0).unwrap());
        let investment = Investment::open(
            OpeningTerms {
                account_id: account.to_string(),
                principal: Money::from_major(15_000),
                term_days: 120,
                interest_modality: InterestModality::Quarterly,
                auto_renew,
                open_date,
                annual_rate: Rate::from_percentage(dec!(3.30)),
            },
            &SimpleInterest::default(),
            &BusinessDayAdjuster::new(),
            now,
        );
        let schedule = ScheduleGenerator::default().generate(&investment);
        (investment, schedule)
    }

    #[test]
    fn test_round_trip_rows() {
        let store = SqliteStore::in_memory().unwrap();
        let (investment, schedule) = open("ACC-9", NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(), true);
        let opening = Movement::new(
            investment.id,
            Some(Uuid::new_v4()),
            MovementType::Opening,
            investment.principal,
            investment.created_at,
        );
        store.insert_investment(&investment, &schedule, Some(&opening)).unwrap();

        let loaded = store.investment(investment.id).unwrap().unwrap();
        assert_eq!(loaded, investment);
        assert_eq!(store.schedule(investment.id).unwrap(), schedule);
        assert_eq!(store.movements(investment.id).unwrap(), vec![opening]);
        assert_eq!(store.schedule_entry(schedule[0].id).unwrap(), Some(schedule[0].clone()));
        assert!(store.investment(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_filters() {
        let store = SqliteStore::in_memory().unwrap();
        let early = open("ACC-1", NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), false);
        let late = open("ACC-2", NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(), false);
        store.insert_investment(&late.0, &late.1, None).unwrap();
        store.insert_investment(&early.0, &early.1, None).unwrap();

        let all = store.list_investments(&InvestmentFilter::default()).unwrap();
        assert_eq!(all.iter().map(|i| i.id).collect::<Vec<_>>(), vec![early.0.id, late.0.id]);

        let by_account = store.list_investments(&InvestmentFilter::account("ACC-2")).unwrap();
        assert_eq!(by_account.len(), 1);

        let due = store
            .list_investments(&InvestmentFilter::active_maturing_by(early.0.maturity_date))
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, early.0.id);
    }

    #[test]
    fn test_apply_with_successor_and_replay() {
        let store = SqliteStore::in_memory().unwrap();
        let (investment, schedule) = open("ACC-1", NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), true);
        store.insert_investment(&investment, &schedule, None).unwrap();

        let (mut successor, successor_schedule) = open("ACC-1", investment.maturity_date, true);
        successor.renewed_from = Some(investment.id);
        let now = Utc::now();

        let transition = Transition::new(investment.id, InvestmentState::Active, InvestmentState::Renewed, now)
            .settle(schedule.iter().map(|e| e.id).collect())
            .movement(Movement::new(investment.id, None, MovementType::Renewal, investment.total_interest, now))
            .successor(successor.clone(), successor_schedule.clone());

        assert_eq!(store.apply(transition.clone()).unwrap(), TransitionOutcome::Applied);
        assert_eq!(store.apply(transition).unwrap(), TransitionOutcome::Stale);

        let old = store.investment(investment.id).unwrap().unwrap();
        assert_eq!(old.state, InvestmentState::Renewed);
        let new = store.investment(successor.id).unwrap().unwrap();
        assert_eq!(new.renewed_from, Some(investment.id));
        assert_eq!(store.schedule(successor.id).unwrap().len(), successor_schedule.len());
        assert_eq!(store.movements(investment.id).unwrap().len(), 1);
    }

    #[test]
    fn test_stale_entry_rolls_back_everything() {
        let store = SqliteStore::in_memory().unwrap();
        let (investment, schedule) = open("ACC-1", NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), false);
        store.insert_investment(&investment, &schedule, None).unwrap();
        let now = Utc::now();

        let interim = Transition::new(investment.id, InvestmentState::Active, InvestmentState::Active, now)
            .settle(vec![schedule[0].id]);
        assert_eq!(store.apply(interim).unwrap(), TransitionOutcome::Applied);

        // first entry already settled: the maturity transition must not half-apply
        let maturity = Transition::new(investment.id, InvestmentState::Active, InvestmentState::Matured, now)
            .settle(schedule.iter().map(|e| e.id).collect())
            .movement(Movement::new(investment.id, None, MovementType::MaturityPayout, investment.principal, now));
        assert_eq!(store.apply(maturity).unwrap(), TransitionOutcome::Stale);

        assert_eq!(store.investment(investment.id).unwrap().unwrap().state, InvestmentState::Active);
        assert!(store.movements(investment.id).unwrap().is_empty());
        let pending = store.schedule(investment.id).unwrap().iter().filter(|e| e.is_pending()).count();
        assert_eq!(pending, schedule.len() - 1);
    }

    #[test]
    fn test_closing_claim_guards_writes() {
        let store = SqliteStore::in_memory().unwrap();
        let (investment, schedule) = open("ACC-1", NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), false);
        store.insert_investment(&investment, &schedule, None).unwrap();
        let now = Utc::now();
        let today = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let cancel = ClosingClaim::new(ClosingKind::Cancellation, today);

        assert!(store.closing_claim(investment.id).unwrap().is_none());
        assert_eq!(store.claim_closing(investment.id, cancel).unwrap(), ClaimOutcome::Owned(cancel));
        assert_eq!(
            store
                .claim_closing(investment.id, ClosingClaim::new(ClosingKind::Maturity, investment.maturity_date))
                .unwrap(),
            ClaimOutcome::HeldBy(cancel)
        );
        assert_eq!(store.closing_claim(investment.id).unwrap(), Some(cancel));

        // an interim payout no longer goes through once the investment is being closed
        let interim = Transition::new(investment.id, InvestmentState::Active, InvestmentState::Active, now)
            .settle(vec![schedule[0].id]);
        assert_eq!(store.apply(interim).unwrap(), TransitionOutcome::Stale);
        assert!(store.schedule(investment.id).unwrap().iter().all(|e| e.is_pending()));

        let canceled = Transition::new(investment.id, InvestmentState::Active, InvestmentState::Canceled, now)
            .cancel_pending()
            .closing(ClosingKind::Cancellation);
        assert_eq!(store.apply(canceled).unwrap(), TransitionOutcome::Applied);
        assert_eq!(
            store.claim_closing(investment.id, cancel).unwrap(),
            ClaimOutcome::Closed(InvestmentState::Canceled)
        );
    }
}
