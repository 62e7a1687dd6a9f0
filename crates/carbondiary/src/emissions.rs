//! Emissions factors and unit conversions.
//!
//! Every function here returns pounds of CO2e. Utility bills cover a range of
//! days, so [`spread_bill`] turns a bill into one [`DailyEmission`] per day;
//! everything downstream aggregates those.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{ActivityKind, RegistryCar};

/// Grams in one avoirdupois pound.
pub const GRAMS_PER_POUND: f64 = 453.592_37;

/// Kilowatt-hours in one megawatt-hour.
pub const KWH_PER_MWH: f64 = 1000.0;

/// Pounds of CO2 per therm of natural gas (EPA: 0.0053 metric tons).
pub const DEFAULT_NATURAL_GAS_LB_PER_THERM: f64 = 11.7;

/// Emissions attributed to a single calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyEmission {
    /// The day.
    pub date: NaiveDate,
    /// What produced it.
    pub kind: ActivityKind,
    /// Pounds of CO2e.
    pub pounds: f64,
}

impl DailyEmission {
    /// Create a new daily emission.
    #[must_use]
    pub fn new(date: NaiveDate, kind: ActivityKind, pounds: f64) -> Self {
        Self { date, kind, pounds }
    }
}

/// Average the per-mile factor over registry rows that have one.
///
/// Returns `None` when no row carries a factor.
#[must_use]
pub fn average_factor<'a>(rows: impl IntoIterator<Item = &'a RegistryCar>) -> Option<f64> {
    let (sum, count) = rows
        .into_iter()
        .filter_map(|car| car.grams_co2_per_mile)
        .fold((0.0, 0_u32), |(sum, count), factor| (sum + factor, count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / f64::from(count))
    }
}

/// Pounds of CO2 for a trip.
///
/// Car emissions are shared between `passengers`; pass `1` for transit
/// factors, which are already per passenger-mile.
#[must_use]
pub fn trip_pounds(miles: f64, grams_per_mile: f64, passengers: u32) -> f64 {
    let share = f64::from(passengers.max(1));
    miles * grams_per_mile / GRAMS_PER_POUND / share
}

/// Pounds of CO2e for electricity drawn from a grid region.
#[must_use]
pub fn electricity_pounds(kwh: f64, lb_per_mwh: f64) -> f64 {
    kwh / KWH_PER_MWH * lb_per_mwh
}

/// Pounds of CO2 for natural gas burned.
#[must_use]
pub fn natural_gas_pounds(therms: f64, lb_per_therm: f64) -> f64 {
    therms * lb_per_therm
}

/// Number of days a bill covers, counting both ends.
///
/// # Errors
///
/// Returns an error if `end` is before `start`.
pub fn billing_days(start: NaiveDate, end: NaiveDate) -> Result<u32> {
    let days = (end - start).num_days() + 1;
    if days < 1 {
        return Err(Error::invalid_input(format!(
            "billing period ends ({end}) before it starts ({start})"
        )));
    }
    u32::try_from(days).map_err(|_| Error::invalid_input(format!("billing period too long: {days} days")))
}

/// Spread a bill's emissions evenly over the days it covers.
///
/// # Errors
///
/// Returns an error if `end` is before `start`.
pub fn spread_bill(
    kind: ActivityKind,
    start: NaiveDate,
    end: NaiveDate,
    pounds: f64,
) -> Result<Vec<DailyEmission>> {
    let days = billing_days(start, end)?;
    let per_day = pounds / f64::from(days);

    Ok(start
        .iter_days()
        .take(days as usize)
        .map(|date| DailyEmission::new(date, kind, per_day))
        .collect())
}
