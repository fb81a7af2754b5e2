use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};

/// Shifts dates off weekends.
///
/// A single forward shift: Saturday moves two days, Sunday one. No holiday
/// calendar is consulted and the shifted date is not re-checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusinessDayAdjuster;

impl BusinessDayAdjuster {
    pub fn new() -> Self {
        Self
    }

    /// Open date plus term, moved off a weekend. Saturates at the end of
    /// the calendar; callers bound the term before pricing.
    pub fn adjust_maturity(&self, open_date: NaiveDate, term_days: u32) -> NaiveDate {
        let raw = open_date
            .checked_add_signed(Duration::days(i64::from(term_days)))
            .unwrap_or(NaiveDate::MAX);
        self.adjust(raw)
    }

    pub fn adjust(&self, date: NaiveDate) -> NaiveDate {
        let shift = match date.weekday() {
            Weekday::Sat => 2,
            Weekday::Sun => 1,
            _ => return date,
        };
        date.checked_add_signed(Duration::days(shift)).unwrap_or(date)
    }

    /// `months` calendar months after `date`, clamped to month end, then adjusted
    pub fn add_months(&self, date: NaiveDate, months: u32) -> NaiveDate {
        let raw = date
            .checked_add_months(Months::new(months))
            .unwrap_or(NaiveDate::MAX);
        self.adjust(raw)
    }

    pub fn is_business_day(date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_saturday_moves_to_monday() {
        let adjuster = BusinessDayAdjuster::new();
        let open = date(2024, 1, 3);
        // 2024-01-03 + 31 = 2024-02-03, a Saturday
        assert_eq!((open + Duration::days(31)).weekday(), Weekday::Sat);
        assert_eq!(adjuster.adjust_maturity(open, 31), date(2024, 2, 5));
        assert_eq!(adjuster.adjust_maturity(open, 31).weekday(), Weekday::Mon);
    }

    #[test]
    fn test_sunday_moves_one_day() {
        let adjuster = BusinessDayAdjuster::new();
        assert_eq!(adjuster.adjust(date(2024, 2, 4)), date(2024, 2, 5));
        assert_eq!(adjuster.adjust(date(2024, 2, 6)), date(2024, 2, 6));
    }

    #[test]
    fn test_never_returns_weekend() {
        let adjuster = BusinessDayAdjuster::new();
        let start = date(2024, 1, 1);
        for offset in 0..21 {
            let open = start + Duration::days(offset);
            for term in [0, 1, 31, 61, 90, 91, 121, 365, 1800] {
                let maturity = adjuster.adjust_maturity(open, term);
                assert!(BusinessDayAdjuster::is_business_day(maturity), "{} + {}", open, term);
                assert!(maturity >= open + Duration::days(term as i64));
            }
        }
    }

    #[test]
    fn test_add_months_clamps_month_end() {
        let adjuster = BusinessDayAdjuster::new();
        // Jan 31 + 1 month = Feb 29 2024, a Thursday
        assert_eq!(adjuster.add_months(date(2024, 1, 31), 1), date(2024, 2, 29));
        // Jan 31 + 2 months = Mar 31 2024, a Sunday
        assert_eq!(adjuster.add_months(date(2024, 1, 31), 2), date(2024, 4, 1));
    }

    #[test]
    fn test_huge_offsets_saturate() {
        let adjuster = BusinessDayAdjuster::new();
        let open = date(2024, 1, 3);
        assert!(adjuster.adjust_maturity(open, u32::MAX) > open);
        assert!(adjuster.add_months(open, u32::MAX) > open);
        assert_eq!(adjuster.adjust(NaiveDate::MAX), NaiveDate::MAX);
    }
}
