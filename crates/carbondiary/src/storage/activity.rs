//! Trip and utility logs, and the daily emissions derived from them.

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use tracing::debug;

use crate::emissions::{
    electricity_pounds, natural_gas_pounds, spread_bill, trip_pounds, DailyEmission,
};
use crate::error::{Error, Result};
use crate::model::{ActivityKind, TripLog, TripMode, UtilityBill};

use super::{date_from_sql, date_to_sql, Storage};

/// A utility bill joined with the grid factor of its residence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillWithFactor {
    /// The bill.
    pub bill: UtilityBill,
    /// Address of the residence billed.
    pub address: String,
    /// Pounds of CO2e per MWh in the residence's grid region.
    pub lb_co2e_per_mwh: f64,
}

impl BillWithFactor {
    /// Emissions for the whole bill.
    #[must_use]
    pub fn pounds(&self, gas_lb_per_therm: f64) -> f64 {
        match self.bill.kind {
            ActivityKind::NaturalGas => natural_gas_pounds(self.bill.amount, gas_lb_per_therm),
            _ => electricity_pounds(self.bill.amount, self.lb_co2e_per_mwh),
        }
    }

    /// The bill's emissions spread over the days it covers.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored period is reversed.
    pub fn daily(&self, gas_lb_per_therm: f64) -> Result<Vec<DailyEmission>> {
        spread_bill(
            self.bill.kind,
            self.bill.start_date,
            self.bill.end_date,
            self.pounds(gas_lb_per_therm),
        )
    }
}

/// One row of a user's activity log, for listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    /// Row id in its log table.
    pub id: i64,
    /// What was logged.
    pub kind: ActivityKind,
    /// Trip date, or first day of the bill.
    pub start_date: NaiveDate,
    /// Trip date, or last day of the bill.
    pub end_date: NaiveDate,
    /// Vehicle or residence.
    pub description: String,
    /// Miles, kWh or therms.
    pub amount: f64,
    /// Unit of `amount`.
    pub unit: &'static str,
    /// Pounds of CO2e.
    pub pounds: f64,
}

/// A trip row joined with its vehicle.
struct TripRow {
    id: i64,
    date: NaiveDate,
    miles: f64,
    passengers: u32,
    vehicle: String,
    grams_per_mile: f64,
    is_car: bool,
}

impl TripRow {
    fn pounds(&self) -> f64 {
        let share = if self.is_car { self.passengers } else { 1 };
        trip_pounds(self.miles, self.grams_per_mile, share)
    }
}

impl Storage {
    /// Log a trip.
    ///
    /// Returns the new row id, or `None` if an identical trip is already
    /// logged.
    ///
    /// # Errors
    ///
    /// Returns an error if the distance or passenger count is invalid, the car
    /// is not the user's, the transit type is unknown, or the database
    /// operation fails.
    pub fn add_trip(&self, trip: &TripLog) -> Result<Option<i64>> {
        if !trip.miles.is_finite() || trip.miles <= 0.0 {
            return Err(Error::invalid_input(format!(
                "trip distance must be positive, got {}",
                trip.miles
            )));
        }
        if trip.passengers == 0 {
            return Err(Error::invalid_input("a trip needs at least one passenger"));
        }

        let (car_id, transit_id) = match trip.mode {
            TripMode::Car(id) => {
                self.user_car(trip.user_id, Some(id))?;
                (Some(id), None)
            }
            TripMode::Transit(id) => {
                let known: bool = self.conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM transit_types WHERE id = ?1)",
                    [id],
                    |row| row.get(0),
                )?;
                if !known {
                    return Err(Error::not_found("transit type", id));
                }
                (None, Some(id))
            }
        };

        let hash = trip.content_hash();
        if self.exists_by_hash("trip_log", &hash)? {
            debug!("Skipping duplicate trip with hash {}", &hash[..16]);
            return Ok(None);
        }

        self.conn.execute(
            r"
            INSERT INTO trip_log (user_id, user_car_id, transit_type_id, date, miles,
                                  passengers, content_hash)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
            params![
                trip.user_id,
                car_id,
                transit_id,
                date_to_sql(trip.date),
                trip.miles,
                trip.passengers,
                hash,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted trip with id {}", id);
        Ok(Some(id))
    }

    /// Log an electricity or natural gas bill for one of the user's
    /// residences.
    ///
    /// Returns the new row id, or `None` if an identical bill is already
    /// logged.
    ///
    /// # Errors
    ///
    /// Returns an error if the bill is not a utility kind, the amount is
    /// negative, the period is reversed, the residence is not the user's, or
    /// the database operation fails.
    pub fn add_bill(&self, user_id: i64, bill: &UtilityBill) -> Result<Option<i64>> {
        if bill.kind == ActivityKind::Trip {
            return Err(Error::invalid_input("a utility bill cannot be a trip"));
        }
        if !bill.amount.is_finite() || bill.amount < 0.0 {
            return Err(Error::invalid_input(format!(
                "bill amount must be zero or more, got {}",
                bill.amount
            )));
        }
        crate::emissions::billing_days(bill.start_date, bill.end_date)?;

        let owned = self
            .residences(user_id)?
            .iter()
            .any(|r| r.id == bill.residence_id);
        if !owned {
            return Err(Error::not_found("residence", bill.residence_id));
        }

        let hash = bill.content_hash();
        if self.exists_by_hash("utility_log", &hash)? {
            debug!("Skipping duplicate bill with hash {}", &hash[..16]);
            return Ok(None);
        }

        self.conn.execute(
            r"
            INSERT INTO utility_log (residence_id, kind, amount, start_date, end_date, content_hash)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                bill.residence_id,
                bill.kind.to_string(),
                bill.amount,
                date_to_sql(bill.start_date),
                date_to_sql(bill.end_date),
                hash,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted {} bill with id {}", bill.kind, id);
        Ok(Some(id))
    }

    fn exists_by_hash(&self, table: &'static str, hash: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE content_hash = ?1"),
            [hash],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// List every trip and bill a user has logged, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn logs(&self, user_id: i64, gas_lb_per_therm: f64) -> Result<Vec<LogEntry>> {
        let mut entries: Vec<LogEntry> = self
            .trip_rows(user_id, None, None)?
            .into_iter()
            .map(|trip| LogEntry {
                id: trip.id,
                kind: ActivityKind::Trip,
                start_date: trip.date,
                end_date: trip.date,
                description: if trip.is_car && trip.passengers > 1 {
                    format!("{} ({} passengers)", trip.vehicle, trip.passengers)
                } else {
                    trip.vehicle.clone()
                },
                amount: trip.miles,
                unit: "miles",
                pounds: trip.pounds(),
            })
            .collect();

        for row in self.bill_rows(user_id, None, None)? {
            entries.push(LogEntry {
                id: row.bill.id.unwrap_or_default(),
                kind: row.bill.kind,
                start_date: row.bill.start_date,
                end_date: row.bill.end_date,
                description: row.address.clone(),
                amount: row.bill.amount,
                unit: row.bill.unit(),
                pounds: row.pounds(gas_lb_per_therm),
            });
        }

        entries.sort_by(|a, b| {
            b.start_date
                .cmp(&a.start_date)
                .then_with(|| a.kind.cmp(&b.kind))
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(entries)
    }

    /// First and last day covered by any of a user's logs.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn activity_span(&self, user_id: i64) -> Result<Option<(NaiveDate, NaiveDate)>> {
        let span: Option<(Option<String>, Option<String>)> = self
            .conn
            .query_row(
                r"
                SELECT MIN(first), MAX(last) FROM (
                    SELECT date AS first, date AS last FROM trip_log WHERE user_id = ?1
                    UNION ALL
                    SELECT u.start_date, u.end_date
                    FROM utility_log u JOIN residences r ON r.id = u.residence_id
                    WHERE r.user_id = ?1
                )
                ",
                [user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match span {
            Some((Some(first), Some(last))) => Ok(Some((
                date_from_sql(0, &first)?,
                date_from_sql(1, &last)?,
            ))),
            _ => Ok(None),
        }
    }

    /// Daily emissions for a user within an inclusive window.
    ///
    /// Each trip yields one entry on its date. Bills overlapping the window
    /// are spread over their whole period and clipped to the window, so a
    /// bill straddling the boundary only contributes the days inside it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPeriod`] if `end` is before `start`, or an
    /// error if the database operation fails.
    pub fn emissions_between(
        &self,
        user_id: i64,
        start: NaiveDate,
        end: NaiveDate,
        gas_lb_per_therm: f64,
    ) -> Result<Vec<DailyEmission>> {
        if end < start {
            return Err(Error::invalid_period(format!("{end} is before {start}")));
        }

        let mut entries: Vec<DailyEmission> = self
            .trip_rows(user_id, Some(start), Some(end))?
            .iter()
            .map(|trip| DailyEmission::new(trip.date, ActivityKind::Trip, trip.pounds()))
            .collect();

        for row in self.bill_rows(user_id, Some(start), Some(end))? {
            entries.extend(
                row.daily(gas_lb_per_therm)?
                    .into_iter()
                    .filter(|day| day.date >= start && day.date <= end),
            );
        }

        entries.sort_by_key(|entry| (entry.date, entry.kind));
        debug!(
            "{} daily emissions for user {} between {} and {}",
            entries.len(),
            user_id,
            start,
            end
        );
        Ok(entries)
    }

    /// Electricity bills overlapping a window, with their grid factor.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn electricity_bills_between(
        &self,
        user_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<BillWithFactor>> {
        Ok(self
            .bill_rows(user_id, Some(start), Some(end))?
            .into_iter()
            .filter(|row| row.bill.kind == ActivityKind::Electricity)
            .collect())
    }

    /// Trips made with one of the user's cars within a window, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn car_trips(
        &self,
        user_id: i64,
        user_car_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TripLog>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, date, miles, passengers FROM trip_log
            WHERE user_id = ?1 AND user_car_id = ?2 AND date >= ?3 AND date <= ?4
            ORDER BY date, id
            ",
        )?;
        let trips = stmt
            .query_map(
                params![user_id, user_car_id, date_to_sql(start), date_to_sql(end)],
                |row| {
                    let date: String = row.get(1)?;
                    Ok(TripLog {
                        id: Some(row.get(0)?),
                        user_id,
                        mode: TripMode::Car(user_car_id),
                        date: date_from_sql(1, &date)?,
                        miles: row.get(2)?,
                        passengers: row.get(3)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(trips)
    }

    fn trip_rows(
        &self,
        user_id: i64,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<TripRow>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT t.id, t.date, t.miles, t.passengers,
                   uc.year, uc.make, uc.model, uc.grams_co2_per_mile,
                   tt.name, tt.grams_co2_per_mile
            FROM trip_log t
            LEFT JOIN user_cars uc ON uc.id = t.user_car_id
            LEFT JOIN transit_types tt ON tt.id = t.transit_type_id
            WHERE t.user_id = ?1
              AND (?2 IS NULL OR t.date >= ?2)
              AND (?3 IS NULL OR t.date <= ?3)
            ORDER BY t.date, t.id
            ",
        )?;

        let rows = stmt
            .query_map(
                params![user_id, start.map(date_to_sql), end.map(date_to_sql)],
                |row| {
                    let date: String = row.get(1)?;
                    let car_factor: Option<f64> = row.get(7)?;
                    let (vehicle, grams_per_mile, is_car) = if let Some(factor) = car_factor {
                        let year: i32 = row.get(4)?;
                        let make: String = row.get(5)?;
                        let model: String = row.get(6)?;
                        (format!("{year} {make} {model}"), factor, true)
                    } else {
                        let name: String = row.get(8)?;
                        (name, row.get(9)?, false)
                    };
                    Ok(TripRow {
                        id: row.get(0)?,
                        date: date_from_sql(1, &date)?,
                        miles: row.get(2)?,
                        passengers: row.get(3)?,
                        vehicle,
                        grams_per_mile,
                        is_car,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn bill_rows(
        &self,
        user_id: i64,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<BillWithFactor>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT u.id, u.residence_id, u.kind, u.amount, u.start_date, u.end_date,
                   res.address, r.lb_co2e_per_mwh
            FROM utility_log u
            JOIN residences res ON res.id = u.residence_id
            JOIN zipcodes z ON z.zipcode = res.zipcode
            JOIN regions r ON r.id = z.region_id
            WHERE res.user_id = ?1
              AND (?2 IS NULL OR u.end_date >= ?2)
              AND (?3 IS NULL OR u.start_date <= ?3)
            ORDER BY u.start_date, u.id
            ",
        )?;

        let rows = stmt
            .query_map(
                params![user_id, start.map(date_to_sql), end.map(date_to_sql)],
                |row| {
                    let kind: String = row.get(2)?;
                    let start_date: String = row.get(4)?;
                    let end_date: String = row.get(5)?;
                    Ok(BillWithFactor {
                        bill: UtilityBill {
                            id: Some(row.get(0)?),
                            residence_id: row.get(1)?,
                            kind: kind_from_sql(2, &kind)?,
                            amount: row.get(3)?,
                            start_date: date_from_sql(4, &start_date)?,
                            end_date: date_from_sql(5, &end_date)?,
                        },
                        address: row.get(6)?,
                        lb_co2e_per_mwh: row.get(7)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn kind_from_sql(idx: usize, value: &str) -> rusqlite::Result<ActivityKind> {
    match value {
        "electricity" => Ok(ActivityKind::Electricity),
        "natural_gas" => Ok(ActivityKind::NaturalGas),
        other => Err(rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown utility kind '{other}'").into(),
        )),
    }
}
