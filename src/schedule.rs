use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::BusinessDayAdjuster;
use crate::decimal::Money;
use crate::investment::Investment;
use crate::types::{EntryId, EntryState, EventType, InvestmentId};

/// nominal days per month when counting interest periods
const DAYS_PER_MONTH: u32 = 30;

/// one future interest or capital event of an investment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: EntryId,
    pub investment_id: InvestmentId,
    pub event_type: EventType,
    pub scheduled_date: NaiveDate,
    pub scheduled_amount: Money,
    pub state: EntryState,
}

impl ScheduleEntry {
    fn pending(investment_id: InvestmentId, event_type: EventType, date: NaiveDate, amount: Money) -> Self {
        Self {
            id: Uuid::new_v4(),
            investment_id,
            event_type,
            scheduled_date: date,
            scheduled_amount: amount,
            state: EntryState::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == EntryState::Pending
    }

    pub fn is_interest(&self) -> bool {
        self.event_type == EventType::InterestPayment
    }
}

/// builds the payment schedule (cronograma) of an investment
#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleGenerator {
    adjuster: BusinessDayAdjuster,
}

impl ScheduleGenerator {
    pub fn new(adjuster: BusinessDayAdjuster) -> Self {
        Self { adjuster }
    }

    /// Interest entries in date order followed by the capital return.
    ///
    /// The interest amounts always add up to `investment.total_interest`;
    /// each share is truncated to cents and the last entry takes the rest.
    pub fn generate(&self, investment: &Investment) -> Vec<ScheduleEntry> {
        let dates = self.interest_dates(investment);
        let count = dates.len() as i64;

        let share = (investment.total_interest / Decimal::from(count)).floor_currency();
        let mut allocated = Money::ZERO;
        let mut entries = Vec::with_capacity(dates.len() + 1);

        for (i, date) in dates.iter().enumerate() {
            let amount = if i as i64 == count - 1 {
                investment.total_interest - allocated
            } else {
                share
            };
            allocated += amount;
            entries.push(ScheduleEntry::pending(
                investment.id,
                EventType::InterestPayment,
                *date,
                amount,
            ));
        }

        entries.push(ScheduleEntry::pending(
            investment.id,
            EventType::CapitalReturn,
            investment.maturity_date,
            investment.principal,
        ));

        entries
    }

    /// interim payment dates strictly before maturity, then maturity itself
    fn interest_dates(&self, investment: &Investment) -> Vec<NaiveDate> {
        let months = match investment.interest_modality.period_months() {
            Some(months) => months,
            None => return vec![investment.maturity_date],
        };

        let period_days = DAYS_PER_MONTH * months;
        let periods = investment.term_days.div_ceil(period_days).max(1);

        let mut dates: Vec<NaiveDate> = (1..periods)
            .map(|k| self.adjuster.add_months(investment.open_date, k * months))
            .take_while(|date| *date < investment.maturity_date)
            .collect();
        dates.push(investment.maturity_date);
        dates
    }
}

/// sum of the interest entries
pub fn total_interest(entries: &[ScheduleEntry]) -> Money {
    entries
        .iter()
        .filter(|e| e.is_interest())
        .map(|e| e.scheduled_amount)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Rate;
    use crate::interest::SimpleInterest;
    use crate::investment::OpeningTerms;
    use crate::types::InterestModality;
    use chrono::{Datelike, Duration, TimeZone, Utc, Weekday};
    use rust_decimal_macros::dec;

    fn investment(open: NaiveDate, principal: i64, term_days: u32, modality: InterestModality) -> Investment {
        let now = Utc.from_utc_datetime(&open.and_hms_opt(10, 0, 0).unwrap());
        Investment::open(
            OpeningTerms {
                account_id: "ACC-1".to_string(),
                principal: Money::from_major(principal),
                term_days,
                interest_modality: modality,
                auto_renew: false,
                open_date: open,
                annual_rate: Rate::from_percentage(dec!(3.15)),
            },
            &SimpleInterest::default(),
            &BusinessDayAdjuster::new(),
            now,
        )
    }

    fn count(entries: &[ScheduleEntry], event_type: EventType) -> usize {
        entries.iter().filter(|e| e.event_type == event_type).count()
    }

    #[test]
    fn test_at_maturity_has_two_entries() {
        let inv = investment(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(), 10_000, 181, InterestModality::AtMaturity);
        let entries = ScheduleGenerator::default().generate(&inv);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event_type, EventType::InterestPayment);
        assert_eq!(entries[0].scheduled_amount, inv.total_interest);
        assert_eq!(entries[1].event_type, EventType::CapitalReturn);
        assert_eq!(entries[1].scheduled_amount, inv.principal);
        assert!(entries.iter().all(|e| e.scheduled_date == inv.maturity_date));
    }

    #[test]
    fn test_monthly_ninety_days_any_open_date() {
        let generator = ScheduleGenerator::default();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        // every open day of a leap year, including the short-February cases
        for offset in 0..366 {
            let open = start + Duration::days(offset);
            let inv = investment(open, 1_000, 90, InterestModality::Monthly);
            let entries = generator.generate(&inv);

            assert_eq!(count(&entries, EventType::InterestPayment), 3, "opened {}", open);
            assert_eq!(count(&entries, EventType::CapitalReturn), 1);
            assert_eq!(total_interest(&entries), inv.total_interest);
            assert_eq!(entries.last().unwrap().scheduled_date, inv.maturity_date);
        }
    }

    #[test]
    fn test_quarterly_and_semiannual_counts() {
        let generator = ScheduleGenerator::default();
        let open = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();

        let quarterly = generator.generate(&investment(open, 50_000, 360, InterestModality::Quarterly));
        assert_eq!(count(&quarterly, EventType::InterestPayment), 4);

        let semiannual = generator.generate(&investment(open, 50_000, 720, InterestModality::Semiannual));
        assert_eq!(count(&semiannual, EventType::InterestPayment), 4);

        // shorter than one period: paid once, at maturity
        let short = generator.generate(&investment(open, 50_000, 61, InterestModality::Quarterly));
        assert_eq!(count(&short, EventType::InterestPayment), 1);
    }

    #[test]
    fn test_dates_ordered_adjusted_and_before_maturity() {
        let generator = ScheduleGenerator::default();
        let open = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let inv = investment(open, 25_000, 400, InterestModality::Monthly);
        let entries = generator.generate(&inv);

        for pair in entries.windows(2) {
            assert!(pair[0].scheduled_date <= pair[1].scheduled_date);
        }
        for entry in &entries {
            assert!(!matches!(entry.scheduled_date.weekday(), Weekday::Sat | Weekday::Sun));
            assert!(entry.scheduled_date > open);
            assert!(entry.scheduled_date <= inv.maturity_date);
        }
        // 2024-03-31 is a Sunday
        assert_eq!(entries[1].scheduled_date, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
    }

    #[test]
    fn test_remainder_goes_to_last_interest_entry() {
        let generator = ScheduleGenerator::default();
        let open = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let inv = investment(open, 1_000, 90, InterestModality::Monthly);
        // 1000 * 0.0315 * 90 / 360 = 7.875 -> 7.88
        assert_eq!(inv.total_interest, Money::from_decimal(dec!(7.88)));

        let entries = generator.generate(&inv);
        assert_eq!(entries[0].scheduled_amount, Money::from_decimal(dec!(2.62)));
        assert_eq!(entries[1].scheduled_amount, Money::from_decimal(dec!(2.62)));
        assert_eq!(entries[2].scheduled_amount, Money::from_decimal(dec!(2.64)));
    }

    #[test]
    fn test_tiny_interest_never_goes_negative() {
        let generator = ScheduleGenerator::default();
        let open = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let mut inv = investment(open, 500, 1800, InterestModality::Monthly);
        inv.total_interest = Money::from_decimal(dec!(0.35));

        let entries = generator.generate(&inv);
        assert!(entries.iter().all(|e| !e.scheduled_amount.is_negative()));
        assert_eq!(total_interest(&entries), Money::from_decimal(dec!(0.35)));
    }
}
