//! Yearly recurrence of a calendar date.
//!
//! Feb 29 falls on Feb 28 in years without one.

use chrono::{Datelike, NaiveDate};

fn in_year(date: NaiveDate, year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, date.month(), date.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), 28))
        .unwrap_or(date)
}

/// Next day on or after `today` that shares `date`'s month and day.
pub fn next_occurrence(date: NaiveDate, today: NaiveDate) -> NaiveDate {
    let this_year = in_year(date, today.year());
    if this_year >= today {
        this_year
    } else {
        in_year(date, today.year() + 1)
    }
}

/// Days until the next occurrence; `0` when it is today.
pub fn days_until(date: NaiveDate, today: NaiveDate) -> i64 {
    (next_occurrence(date, today) - today).num_days()
}

/// Whole years elapsed since `date`, never negative.
pub fn years_together(date: NaiveDate, today: NaiveDate) -> i32 {
    let mut years = today.year() - date.year();
    if (today.month(), today.day()) < (date.month(), date.day()) {
        years -= 1;
    }
    years.max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_same_month_day_is_zero() {
        assert_eq!(days_until(d(2019, 6, 15), d(2024, 6, 15)), 0);
    }

    #[test]
    fn test_passed_date_rolls_to_next_year() {
        assert_eq!(next_occurrence(d(2020, 6, 10), d(2024, 6, 15)), d(2025, 6, 10));
        assert_eq!(days_until(d(2020, 6, 10), d(2024, 6, 15)), 360);
    }

    #[test]
    fn test_upcoming_date_this_year() {
        assert_eq!(days_until(d(2020, 6, 20), d(2024, 6, 15)), 5);
    }

    #[test]
    fn test_leap_day() {
        assert_eq!(next_occurrence(d(2020, 2, 29), d(2023, 1, 1)), d(2023, 2, 28));
        assert_eq!(next_occurrence(d(2020, 2, 29), d(2024, 1, 1)), d(2024, 2, 29));
    }

    #[test]
    fn test_years_together_corrects_for_month_day() {
        assert_eq!(years_together(d(2020, 6, 10), d(2024, 6, 15)), 4);
        assert_eq!(years_together(d(2020, 6, 20), d(2024, 6, 15)), 3);
        assert_eq!(years_together(d(2020, 6, 15), d(2024, 6, 15)), 4);
        assert_eq!(years_together(d(2025, 1, 1), d(2024, 6, 15)), 0);
    }
}
