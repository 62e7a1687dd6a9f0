//! What-if comparisons.
//!
//! A comparison replays a year of the user's own activity with a different
//! emissions factor: their electricity bills on another zip code's grid, or
//! the trips made in one of their cars in a different car. Both sides are
//! reported with the same totals, daily rates and monthly series as the
//! regular reports.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::emissions::{spread_bill, trip_pounds, DailyEmission};
use crate::error::Result;
use crate::model::{ActivityKind, CarSpec, Region, TripLog, UserCar};
use crate::report::{days_in_scope, monthly, scope_bounds, total_between};
use crate::storage::BillWithFactor;

/// Differences smaller than this many pounds are reported as no change.
const NO_CHANGE_POUNDS: f64 = 0.05;

/// The user's actual emissions for a year next to an alternative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    /// Calendar year compared.
    pub year: i32,
    /// Days the daily rates are taken over.
    pub days: u32,
    /// What the user actually has, e.g. `2012 Toyota Prius`.
    pub current_label: String,
    /// What they are compared against.
    pub alternative_label: String,
    /// Pounds of CO2e for the year as logged.
    pub current_total: f64,
    /// Pounds of CO2e for the year with the alternative factor.
    pub alternative_total: f64,
    /// `current_total / days`.
    pub current_daily: f64,
    /// `alternative_total / days`.
    pub alternative_daily: f64,
    /// Monthly pounds as logged, January first.
    pub current_monthly: [f64; 12],
    /// Monthly pounds with the alternative, January first.
    pub alternative_monthly: [f64; 12],
    /// `alternative_total - current_total`.
    pub difference: f64,
    /// Difference as a percentage of the current total, when that is non-zero.
    pub percent_change: Option<f64>,
}

impl Comparison {
    /// One-sentence summary of the comparison.
    #[must_use]
    pub fn statement(&self) -> String {
        let change = self.difference.abs();
        if change < NO_CHANGE_POUNDS {
            return format!(
                "{} instead of {} would not change your emissions in {}.",
                self.alternative_label, self.current_label, self.year
            );
        }

        let verb = if self.difference < 0.0 { "cut" } else { "add" };
        let percent = self
            .percent_change
            .map(|p| format!(" ({p:+.1}%)"))
            .unwrap_or_default();
        format!(
            "{} instead of {} would {verb} {change:.1} lb CO2e in {}{percent}.",
            self.alternative_label, self.current_label, self.year
        )
    }
}

/// Compare a year of electricity bills against another grid region.
///
/// Bills straddling the year boundary only count the days inside the year.
///
/// # Errors
///
/// Returns an error if `year` is after `today`'s year or a bill period is
/// reversed.
pub fn compare_locations(
    bills: &[BillWithFactor],
    alternative: &Region,
    alternative_zipcode: &str,
    year: i32,
    today: NaiveDate,
) -> Result<Comparison> {
    let mut current = Vec::new();
    let mut replayed = Vec::new();

    for row in bills
        .iter()
        .filter(|row| row.bill.kind == ActivityKind::Electricity)
    {
        // The natural gas factor is irrelevant for electricity bills.
        current.extend(row.daily(0.0)?);

        let moved = BillWithFactor {
            lb_co2e_per_mwh: alternative.lb_co2e_per_mwh,
            ..row.clone()
        };
        replayed.extend(moved.daily(0.0)?);
    }

    let mut addresses: Vec<&str> = bills.iter().map(|row| row.address.as_str()).collect();
    addresses.sort_unstable();
    addresses.dedup();
    let current_label = if addresses.is_empty() {
        "your residences".to_string()
    } else {
        addresses.join(", ")
    };

    build(
        year,
        today,
        current_label,
        format!("living in {alternative_zipcode} ({} grid)", alternative.name),
        &current,
        &replayed,
    )
}

/// Compare a year of trips in one of the user's cars against another car.
///
/// Passenger counts are kept, so carpool trips stay shared.
///
/// # Errors
///
/// Returns an error if `year` is after `today`'s year.
pub fn compare_cars(
    trips: &[TripLog],
    current: &UserCar,
    alternative: &CarSpec,
    alternative_grams_per_mile: f64,
    year: i32,
    today: NaiveDate,
) -> Result<Comparison> {
    let (current_days, replayed): (Vec<_>, Vec<_>) = trips
        .iter()
        .map(|trip| {
            (
                DailyEmission::new(
                    trip.date,
                    ActivityKind::Trip,
                    trip_pounds(trip.miles, current.grams_co2_per_mile, trip.passengers),
                ),
                DailyEmission::new(
                    trip.date,
                    ActivityKind::Trip,
                    trip_pounds(trip.miles, alternative_grams_per_mile, trip.passengers),
                ),
            )
        })
        .unzip();

    build(
        year,
        today,
        format!("your {}", current.spec),
        format!("driving a {alternative}"),
        &current_days,
        &replayed,
    )
}

fn build(
    year: i32,
    today: NaiveDate,
    current_label: String,
    alternative_label: String,
    current: &[DailyEmission],
    alternative: &[DailyEmission],
) -> Result<Comparison> {
    let days = days_in_scope(year, today)?;
    let (start, end) = scope_bounds(year, today)?;
    let current: Vec<DailyEmission> = current
        .iter()
        .filter(|e| e.date >= start && e.date <= end)
        .copied()
        .collect();
    let alternative: Vec<DailyEmission> = alternative
        .iter()
        .filter(|e| e.date >= start && e.date <= end)
        .copied()
        .collect();

    let current_total = total_between(&current, start, end);
    let alternative_total = total_between(&alternative, start, end);
    let difference = alternative_total - current_total;
    let percent_change = (current_total > 0.0).then(|| difference / current_total * 100.0);

    debug!(
        year,
        current_total, alternative_total, "computed comparison"
    );

    Ok(Comparison {
        year,
        days,
        current_label,
        alternative_label: capitalize(&alternative_label),
        current_total,
        alternative_total,
        current_daily: current_total / f64::from(days),
        alternative_daily: alternative_total / f64::from(days),
        current_monthly: monthly(&current, year).combined(),
        alternative_monthly: monthly(&alternative, year).combined(),
        difference,
        percent_change,
    })
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TripMode, UtilityBill};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    fn bill(kwh: f64, start: NaiveDate, end: NaiveDate, factor: f64) -> BillWithFactor {
        BillWithFactor {
            bill: UtilityBill::electricity(1, kwh, start, end),
            address: "Home".to_string(),
            lb_co2e_per_mwh: factor,
        }
    }

    fn rmpa() -> Region {
        Region {
            id: Some(2),
            name: "RMPA".to_string(),
            lb_co2e_per_mwh: 1800.0,
        }
    }

    fn prius() -> UserCar {
        UserCar {
            id: 1,
            user_id: 1,
            spec: CarSpec::new("Toyota", "Prius", 2012),
            grams_co2_per_mile: 180.0,
            is_default: true,
        }
    }

    #[test]
    fn test_compare_locations_dirtier_grid() {
        let bills = vec![bill(310.0, date(2016, 1, 1), date(2016, 1, 31), 500.0)];
        let cmp = compare_locations(&bills, &rmpa(), "80202", 2016, date(2016, 2, 10)).unwrap();

        assert_eq!(cmp.days, 41);
        assert!(approx(cmp.current_total, 155.0));
        assert!(approx(cmp.alternative_total, 558.0));
        assert!(approx(cmp.difference, 403.0));
        assert!(approx(cmp.percent_change.unwrap(), 260.0));
        assert!(approx(cmp.current_daily, 155.0 / 41.0));
        assert!(approx(cmp.current_monthly[0], 155.0));
        assert!(approx(cmp.alternative_monthly[0], 558.0));
        assert!(approx(cmp.alternative_monthly[1], 0.0));

        let statement = cmp.statement();
        assert_eq!(
            statement,
            "Living in 80202 (RMPA grid) instead of Home would add 403.0 lb CO2e in 2016 (+260.0%)."
        );
    }

    #[test]
    fn test_compare_locations_clips_to_year() {
        // 300 kWh at 500 lb/MWh over 30 days is 5 lb/day, 15 days in 2016.
        let bills = vec![bill(300.0, date(2015, 12, 17), date(2016, 1, 15), 500.0)];
        let cmp = compare_locations(&bills, &rmpa(), "80202", 2016, date(2016, 6, 1)).unwrap();
        assert!(approx(cmp.current_total, 75.0));
        assert!(approx(cmp.alternative_total, 270.0));
    }

    #[test]
    fn test_compare_locations_stops_at_today() {
        // 5 lb/day at 500 lb/MWh; only January 1 through 10 have happened.
        let bills = vec![bill(310.0, date(2016, 1, 1), date(2016, 1, 31), 500.0)];
        let cmp = compare_locations(&bills, &rmpa(), "80202", 2016, date(2016, 1, 10)).unwrap();
        assert_eq!(cmp.days, 10);
        assert!(approx(cmp.current_total, 50.0));
        assert!(approx(cmp.current_daily, 5.0));
        assert!(approx(cmp.alternative_daily, 18.0));
        assert!(approx(cmp.current_monthly[0], 50.0));
    }

    #[test]
    fn test_compare_locations_without_bills() {
        let cmp = compare_locations(&[], &rmpa(), "80202", 2015, date(2016, 6, 1)).unwrap();
        assert_eq!(cmp.days, 365);
        assert!(approx(cmp.difference, 0.0));
        assert!(cmp.percent_change.is_none());
        assert!(cmp.statement().contains("would not change"));
    }

    #[test]
    fn test_compare_locations_future_year() {
        assert!(compare_locations(&[], &rmpa(), "80202", 2017, date(2016, 6, 1)).is_err());
    }

    #[test]
    fn test_compare_cars_cleaner_car() {
        let current = UserCar {
            spec: CarSpec::new("Ford", "F150", 2010),
            grams_co2_per_mile: 700.0,
            ..prius()
        };
        let trips = vec![
            TripLog::new(1, TripMode::Car(1), date(2015, 3, 1), 100.0),
            TripLog::new(1, TripMode::Car(1), date(2015, 4, 1), 50.0).with_passengers(2),
        ];
        let alternative = CarSpec::new("Toyota", "Prius", 2012);

        let cmp = compare_cars(&trips, &current, &alternative, 180.0, 2015, date(2016, 6, 1)).unwrap();

        let expected_current = trip_pounds(100.0, 700.0, 1) + trip_pounds(50.0, 700.0, 2);
        let expected_alternative = trip_pounds(100.0, 180.0, 1) + trip_pounds(50.0, 180.0, 2);
        assert!(approx(cmp.current_total, expected_current));
        assert!(approx(cmp.alternative_total, expected_alternative));
        assert!(cmp.difference < 0.0);
        assert!(approx(cmp.current_monthly[2], trip_pounds(100.0, 700.0, 1)));
        assert!(approx(cmp.percent_change.unwrap(), (180.0 - 700.0) / 700.0 * 100.0));

        let statement = cmp.statement();
        assert!(statement.starts_with("Driving a 2012 Toyota Prius instead of your 2010 Ford F150 would cut"));
    }

    #[test]
    fn test_compare_cars_same_factor() {
        let trips = vec![TripLog::new(1, TripMode::Car(1), date(2015, 3, 1), 10.0)];
        let cmp = compare_cars(
            &trips,
            &prius(),
            &CarSpec::new("Toyota", "Prius", 2012),
            180.0,
            2015,
            date(2016, 6, 1),
        )
        .unwrap();
        assert!(approx(cmp.difference, 0.0));
        assert!(approx(cmp.percent_change.unwrap(), 0.0));
        assert!(cmp.statement().contains("would not change"));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("driving a car"), "Driving a car");
        assert_eq!(capitalize(""), "");
    }
}
