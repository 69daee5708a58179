use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use thiserror::Error;

/// How many past tax years `available_tax_years` lists by default
pub const DEFAULT_YEARS_BACK: u32 = 5;
/// How many future tax years `available_tax_years` lists by default
pub const DEFAULT_YEARS_FORWARD: u32 = 1;

/// UK Tax Year (runs 6 April to 5 April)
///
/// Identified by the calendar year it starts in, so `TaxYear::boundaries_for(2024)`
/// is the 2024/25 tax year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "TaxYearRecord")]
pub struct TaxYear {
    start_year: i32,
}

#[derive(Debug, Error)]
#[error("invalid tax year '{0}', expected e.g. 2024/25")]
pub struct ParseTaxYearError(String);

impl TaxYear {
    /// The tax year starting on 6 April of `start_year`. Any integer is accepted.
    pub fn boundaries_for(start_year: i32) -> Self {
        TaxYear { start_year }
    }

    /// The tax year a calendar date falls in
    pub fn containing(date: NaiveDate) -> Self {
        // Compare calendar fields: 1 January .. 5 April belongs to the year
        // that started the previous April.
        let start_year = if (date.month(), date.day()) < (4, 6) {
            date.year() - 1
        } else {
            date.year()
        };
        TaxYear { start_year }
    }

    /// The tax year a local wall-clock instant falls in
    pub fn containing_instant(instant: NaiveDateTime) -> Self {
        Self::containing(instant.date())
    }

    /// The tax year for today's local date
    pub fn current() -> Self {
        Self::current_at(Local::now().date_naive())
    }

    pub fn current_at(today: NaiveDate) -> Self {
        Self::containing(today)
    }

    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    /// `start_year + 1`, except for `i32::MAX` which saturates to itself
    pub fn end_year(&self) -> i32 {
        self.start_year.saturating_add(1)
    }

    /// 6 April 00:00:00.000 of the start year (local time)
    pub fn start_date(&self) -> NaiveDateTime {
        calendar_instant(self.start_year, 4, 6, (0, 0, 0, 0))
    }

    /// 5 April 23:59:59.999 of the end year (local time)
    pub fn end_date(&self) -> NaiveDateTime {
        calendar_instant(self.end_year(), 4, 5, (23, 59, 59, 999))
    }

    /// Last moment to subscribe against this year's ISA allowance
    pub fn deadline(&self) -> NaiveDateTime {
        self.end_date()
    }

    /// Display as "2024/25" format
    pub fn label(&self) -> String {
        format!("{}/{:02}", self.start_year, self.end_year().rem_euclid(100))
    }

    /// Label with a "(Current)", "(Next)" or "(Previous)" suffix relative to today
    pub fn relative_label(&self) -> String {
        self.relative_label_at(Local::now().date_naive())
    }

    pub fn relative_label_at(&self, today: NaiveDate) -> String {
        let current = Self::current_at(today).start_year as i64;
        match self.start_year as i64 - current {
            0 => format!("{} (Current)", self.label()),
            1 => format!("{} (Next)", self.label()),
            -1 => format!("{} (Previous)", self.label()),
            _ => self.label(),
        }
    }

    /// Inclusive on both the start and end instant
    pub fn contains_instant(&self, instant: NaiveDateTime) -> bool {
        self.start_date() <= instant && instant <= self.end_date()
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        Self::containing(date) == *self
    }

    /// Whole days from `today` until the deadline; 0 on 5 April, negative once passed
    pub fn days_remaining_at(&self, today: NaiveDate) -> i64 {
        (self.end_date().date() - today).num_days()
    }

    /// The tax year `years` away from this one (negative for earlier years)
    pub fn offset(&self, years: i32) -> Self {
        TaxYear {
            start_year: self.start_year.saturating_add(years),
        }
    }

    pub fn next(&self) -> Self {
        self.offset(1)
    }

    pub fn previous(&self) -> Self {
        self.offset(-1)
    }

    /// Overall annual ISA subscription limit
    pub fn isa_allowance(&self) -> Decimal {
        match self.start_year {
            // 2017/18 onwards: £20,000
            2017.. => dec!(20000),
            // 2015/16 and 2016/17: £15,240
            2015 | 2016 => dec!(15240),
            // 2014/15 (NISA from July 2014): £15,000
            2014 => dec!(15000),
            2013 => dec!(11520),
            // Earlier years (approximate)
            _ => dec!(11280),
        }
    }

    /// Lifetime ISA limit, counted within the overall allowance
    pub fn lifetime_isa_allowance(&self) -> Decimal {
        dec!(4000)
    }

    /// Junior ISA limit, separate from the adult allowance
    pub fn junior_isa_allowance(&self) -> Decimal {
        match self.start_year {
            2020.. => dec!(9000),
            2019 => dec!(4368),
            // Earlier years (approximate)
            _ => dec!(4260),
        }
    }
}

impl fmt::Display for TaxYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for TaxYear {
    type Err = ParseTaxYearError;

    /// Accepts "2024/25", "2024-25", "2024/2025" or a bare start year "2024"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseTaxYearError(s.to_string());
        let trimmed = s.trim();
        // Skip the first char so a leading minus is not taken as a separator
        let separator = trimmed
            .char_indices()
            .skip(1)
            .find(|(_, c)| *c == '/' || *c == '-')
            .map(|(idx, _)| idx);
        let (start, end) = match separator {
            Some(idx) => (&trimmed[..idx], Some(&trimmed[idx + 1..])),
            None => (trimmed, None),
        };
        let start_year: i32 = start.parse().map_err(|_| invalid())?;
        let tax_year = TaxYear::boundaries_for(start_year);

        if let Some(end) = end {
            let matches = match end.len() {
                2 => end.parse::<i32>().ok() == Some(tax_year.end_year().rem_euclid(100)),
                4 => end.parse::<i32>().ok() == Some(tax_year.end_year()),
                _ => false,
            };
            if !matches {
                return Err(invalid());
            }
        }
        Ok(tax_year)
    }
}

/// Tax years for a picker, ordered from the most distant future year down to
/// the most distant past year, with the current year in between
pub fn available_tax_years(years_back: u32, years_forward: u32) -> Vec<TaxYear> {
    available_tax_years_at(Local::now().date_naive(), years_back, years_forward)
}

pub fn available_tax_years_at(today: NaiveDate, years_back: u32, years_forward: u32) -> Vec<TaxYear> {
    let current = TaxYear::current_at(today);
    year_span(current.start_year, years_back, years_forward)
        .rev()
        .map(TaxYear::boundaries_for)
        .collect()
}

/// Start years from `years_back` before to `years_forward` after `current`,
/// stopping at the ends of `i32` rather than repeating them
fn year_span(current: i32, years_back: u32, years_forward: u32) -> RangeInclusive<i32> {
    let first = i32::try_from(i64::from(current) - i64::from(years_back)).unwrap_or(i32::MIN);
    let last = i32::try_from(i64::from(current) + i64::from(years_forward)).unwrap_or(i32::MAX);
    first..=last
}

/// Builds a local instant, saturating years chrono cannot represent
fn calendar_instant(year: i32, month: u32, day: u32, (h, m, s, ms): (u32, u32, u32, u32)) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_milli_opt(h, m, s, ms))
        .unwrap_or(if year < 0 {
            NaiveDateTime::MIN
        } else {
            NaiveDateTime::MAX
        })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaxYearRecord {
    start_year: i32,
    end_year: i32,
    start_date: NaiveDateTime,
    end_date: NaiveDateTime,
    label: String,
}

impl From<TaxYear> for TaxYearRecord {
    fn from(ty: TaxYear) -> Self {
        TaxYearRecord {
            start_year: ty.start_year(),
            end_year: ty.end_year(),
            start_date: ty.start_date(),
            end_date: ty.end_date(),
            label: ty.label(),
        }
    }
}
