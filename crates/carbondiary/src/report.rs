//! Aggregation of daily emissions into reports.
//!
//! All functions here are pure over a slice of [`DailyEmission`]s, which the
//! storage layer produces for a user and a date window. Averages for the
//! current year divide by the days elapsed so far instead of 365, so a
//! partial year is comparable with a complete one.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::emissions::DailyEmission;
use crate::error::{Error, Result};
use crate::model::ActivityKind;

/// Days used for any complete year.
pub const DAYS_PER_YEAR: u32 = 365;

/// Month labels, January first.
pub const MONTH_LABELS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Weekday labels, Monday first.
pub const WEEKDAY_LABELS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Pounds of CO2e per activity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KindTotals {
    /// Transportation.
    pub trip: f64,
    /// Electricity.
    pub electricity: f64,
    /// Natural gas.
    pub natural_gas: f64,
}

impl KindTotals {
    /// Add pounds to one kind.
    pub fn add(&mut self, kind: ActivityKind, pounds: f64) {
        match kind {
            ActivityKind::Trip => self.trip += pounds,
            ActivityKind::Electricity => self.electricity += pounds,
            ActivityKind::NaturalGas => self.natural_gas += pounds,
        }
    }

    /// Pounds for one kind.
    #[must_use]
    pub fn get(&self, kind: ActivityKind) -> f64 {
        match kind {
            ActivityKind::Trip => self.trip,
            ActivityKind::Electricity => self.electricity,
            ActivityKind::NaturalGas => self.natural_gas,
        }
    }

    /// Sum over every kind.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.trip + self.electricity + self.natural_gas
    }

    /// Share of the total per kind, in `0.0..=1.0`. All zero when empty.
    #[must_use]
    pub fn shares(&self) -> Self {
        let total = self.total();
        if total <= 0.0 {
            return Self::default();
        }
        Self {
            trip: self.trip / total,
            electricity: self.electricity / total,
            natural_gas: self.natural_gas / total,
        }
    }
}

/// Per-month sums for one year, one series per kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySeries {
    /// Calendar year.
    pub year: i32,
    /// Trips, January first.
    pub trip: [f64; 12],
    /// Electricity, January first.
    pub electricity: [f64; 12],
    /// Natural gas, January first.
    pub natural_gas: [f64; 12],
}

impl MonthlySeries {
    /// All kinds combined, January first.
    #[must_use]
    pub fn combined(&self) -> [f64; 12] {
        combine(&self.trip, &self.electricity, &self.natural_gas)
    }
}

/// Per-weekday sums for one year, one series per kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekdaySeries {
    /// Calendar year.
    pub year: i32,
    /// Trips, Monday first.
    pub trip: [f64; 7],
    /// Electricity, Monday first.
    pub electricity: [f64; 7],
    /// Natural gas, Monday first.
    pub natural_gas: [f64; 7],
}

impl WeekdaySeries {
    /// All kinds combined, Monday first.
    #[must_use]
    pub fn combined(&self) -> [f64; 7] {
        combine(&self.trip, &self.electricity, &self.natural_gas)
    }
}

/// Totals and averages for one calendar year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearSummary {
    /// Calendar year.
    pub year: i32,
    /// Per-kind totals.
    pub totals: KindTotals,
    /// Sum of all kinds.
    pub total: f64,
    /// Days the averages are taken over.
    pub days: u32,
    /// Whether the year is still in progress.
    pub partial: bool,
    /// `total / days`.
    pub daily_average: f64,
    /// Daily average scaled to an average month.
    pub monthly_average: f64,
}

/// One row of a year-over-year comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearOverYear {
    /// Calendar year.
    pub year: i32,
    /// Sum of all kinds.
    pub total: f64,
    /// Days in scope for the year.
    pub days: u32,
    /// Whether the year is still in progress.
    pub partial: bool,
    /// `total / days`.
    pub daily_average: f64,
    /// Difference in daily average from the previous year.
    pub daily_change: Option<f64>,
    /// Percent difference in daily average from the previous year.
    /// `None` for the first year and when the previous year was zero.
    pub percent_change: Option<f64>,
}

/// Sum of all emissions in the inclusive window `start..=end`.
#[must_use]
pub fn total_between(entries: &[DailyEmission], start: NaiveDate, end: NaiveDate) -> f64 {
    in_window(entries, start, end).map(|e| e.pounds).sum()
}

/// Per-kind sums in the inclusive window `start..=end`.
#[must_use]
pub fn totals_by_kind(entries: &[DailyEmission], start: NaiveDate, end: NaiveDate) -> KindTotals {
    let mut totals = KindTotals::default();
    for entry in in_window(entries, start, end) {
        totals.add(entry.kind, entry.pounds);
    }
    totals
}

/// Daily average over the inclusive window `start..=end`.
///
/// # Errors
///
/// Returns an error if `end` is before `start`.
pub fn daily_average_between(
    entries: &[DailyEmission],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<f64> {
    let days = (end - start).num_days() + 1;
    if days < 1 {
        return Err(Error::invalid_period(format!(
            "window ends ({end}) before it starts ({start})"
        )));
    }
    #[allow(clippy::cast_precision_loss)]
    let days = days as f64;
    Ok(total_between(entries, start, end) / days)
}

/// Per-kind totals for every year with entries, oldest first.
#[must_use]
pub fn by_year(entries: &[DailyEmission]) -> BTreeMap<i32, KindTotals> {
    let mut years: BTreeMap<i32, KindTotals> = BTreeMap::new();
    for entry in entries {
        years
            .entry(entry.date.year())
            .or_default()
            .add(entry.kind, entry.pounds);
    }
    years
}

/// Monthly sums per kind for `year`.
#[must_use]
pub fn monthly(entries: &[DailyEmission], year: i32) -> MonthlySeries {
    let [trip, electricity, natural_gas] = bucket::<12>(entries, year, |date| date.month0() as usize);
    MonthlySeries {
        year,
        trip,
        electricity,
        natural_gas,
    }
}

/// Weekday sums per kind for `year`, Monday first.
#[must_use]
pub fn by_weekday(entries: &[DailyEmission], year: i32) -> WeekdaySeries {
    let [trip, electricity, natural_gas] = bucket::<7>(entries, year, |date| {
        date.weekday().num_days_from_monday() as usize
    });
    WeekdaySeries {
        year,
        trip,
        electricity,
        natural_gas,
    }
}

/// Number of days averages for `year` are taken over, as of `today`.
///
/// A complete year counts as 365 days. The current year counts the days
/// elapsed since January 1, including January 1 and `today`.
///
/// # Errors
///
/// Returns an error if `year` is after `today`'s year.
pub fn days_in_scope(year: i32, today: NaiveDate) -> Result<u32> {
    match year.cmp(&today.year()) {
        std::cmp::Ordering::Less => Ok(DAYS_PER_YEAR),
        std::cmp::Ordering::Equal => Ok(today.ordinal()),
        std::cmp::Ordering::Greater => Err(Error::invalid_period(format!(
            "year {year} has not started (today is {today})"
        ))),
    }
}

/// Totals and daily/monthly averages for `year`, as of `today`.
///
/// # Errors
///
/// Returns an error if `year` is after `today`'s year.
pub fn year_summary(entries: &[DailyEmission], year: i32, today: NaiveDate) -> Result<YearSummary> {
    let days = days_in_scope(year, today)?;
    let (start, end) = scope_bounds(year, today)?;
    let totals = totals_by_kind(entries, start, end);
    let total = totals.total();
    let daily_average = total / f64::from(days);

    debug!(year, days, total, "computed year summary");

    Ok(YearSummary {
        year,
        totals,
        total,
        days,
        partial: year == today.year(),
        daily_average,
        monthly_average: monthly_from_daily(daily_average),
    })
}

/// Year-over-year comparison of daily averages, oldest year first.
///
/// Every year from the first with entries through the last is listed, so a
/// year without entries shows up as zero. Years after `today` are ignored.
#[must_use]
pub fn year_over_year(entries: &[DailyEmission], today: NaiveDate) -> Vec<YearOverYear> {
    let years = by_year(entries);
    let Some(first) = years.keys().next().copied() else {
        return Vec::new();
    };
    let last = years
        .keys()
        .next_back()
        .copied()
        .unwrap_or(first)
        .min(today.year());

    let mut rows: Vec<YearOverYear> = Vec::new();
    for year in first..=last {
        let Ok(days) = days_in_scope(year, today) else {
            continue;
        };
        let (start, end) = match scope_bounds(year, today) {
            Ok(bounds) => bounds,
            Err(_) => continue,
        };
        let total = total_between(entries, start, end);
        let daily_average = total / f64::from(days);

        let (daily_change, percent_change) = match rows.last() {
            Some(prev) => {
                let change = daily_average - prev.daily_average;
                let percent = (prev.daily_average > 0.0)
                    .then(|| change / prev.daily_average * 100.0);
                (Some(change), percent)
            }
            None => (None, None),
        };

        rows.push(YearOverYear {
            year,
            total,
            days,
            partial: year == today.year(),
            daily_average,
            daily_change,
            percent_change,
        });
    }
    rows
}

/// The window averages for `year` are taken over, as of `today`.
///
/// A past year spans January 1 to December 31. The current year ends at
/// `today`, matching [`days_in_scope`].
///
/// # Errors
///
/// Returns an error if `year` is after `today`'s year.
pub fn scope_bounds(year: i32, today: NaiveDate) -> Result<(NaiveDate, NaiveDate)> {
    days_in_scope(year, today)?;
    let (start, end) = year_bounds(year)?;
    Ok((start, end.min(today)))
}

/// Scale a daily rate to an average month (365 / 12 days).
#[must_use]
pub fn monthly_from_daily(daily: f64) -> f64 {
    daily * f64::from(DAYS_PER_YEAR) / 12.0
}

/// First and last day of `year`.
///
/// # Errors
///
/// Returns an error if the year is outside chrono's supported range.
pub fn year_bounds(year: i32) -> Result<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or_else(|| Error::invalid_period(format!("unsupported year {year}")))?;
    let end = NaiveDate::from_ymd_opt(year, 12, 31)
        .ok_or_else(|| Error::invalid_period(format!("unsupported year {year}")))?;
    Ok((start, end))
}

fn in_window(
    entries: &[DailyEmission],
    start: NaiveDate,
    end: NaiveDate,
) -> impl Iterator<Item = &DailyEmission> {
    entries
        .iter()
        .filter(move |e| e.date >= start && e.date <= end)
}

fn bucket<const N: usize>(
    entries: &[DailyEmission],
    year: i32,
    index: impl Fn(NaiveDate) -> usize,
) -> [[f64; N]; 3] {
    let mut buckets = [[0.0; N]; 3];
    for entry in entries.iter().filter(|e| e.date.year() == year) {
        buckets[entry.kind.index()][index(entry.date)] += entry.pounds;
    }
    buckets
}

fn combine<const N: usize>(a: &[f64; N], b: &[f64; N], c: &[f64; N]) -> [f64; N] {
    std::array::from_fn(|i| a[i] + b[i] + c[i])
}
