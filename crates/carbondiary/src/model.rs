//! Core domain types for carbondiary.
//!
//! This module defines the records a user logs (trips and utility bills), the
//! profile they are logged against (cars and residences), and the reference
//! registry (grid regions, zip codes, vehicles, transit modes) that turns
//! them into emissions.

use std::str::FromStr;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The kind of activity an emission was produced by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Transportation.
    Trip,
    /// Household electricity.
    Electricity,
    /// Household natural gas.
    NaturalGas,
}

impl ActivityKind {
    /// All kinds, in reporting order.
    pub const ALL: [Self; 3] = [Self::Trip, Self::Electricity, Self::NaturalGas];

    /// Position of this kind in [`Self::ALL`].
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Trip => 0,
            Self::Electricity => 1,
            Self::NaturalGas => 2,
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trip => write!(f, "trip"),
            Self::Electricity => write!(f, "electricity"),
            Self::NaturalGas => write!(f, "natural_gas"),
        }
    }
}

/// A registered user.
///
/// The password is kept as entered; login is a plain equality check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Row id.
    pub id: i64,
    /// Login email, unique.
    pub email: String,
    /// Password as entered at registration.
    #[serde(skip_serializing, default)]
    pub password: String,
    /// Display name.
    pub name: String,
    /// Short handle.
    pub username: String,
}

/// An electricity grid region and its average emissions intensity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Row id (assigned by storage when `None`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Region name, e.g. an eGRID subregion acronym.
    pub name: String,
    /// Pounds of CO2e per megawatt-hour generated.
    pub lb_co2e_per_mwh: f64,
}

/// A zip code and the grid region serving it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zipcode {
    /// The zip code itself (5 digits, optionally ZIP+4).
    pub zipcode: String,
    /// Name of the serving grid region.
    pub region: String,
    /// City, for lookups by place name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Two-letter state code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// One row of the vehicle registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryCar {
    /// Row id (assigned by storage when `None`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Manufacturer.
    pub make: String,
    /// Model name.
    pub model: String,
    /// Model year.
    pub year: i32,
    /// Engine cylinder count.
    #[serde(default)]
    pub cylinders: Option<i32>,
    /// Transmission description, e.g. `Automatic (S6)`.
    #[serde(default)]
    pub transmission: Option<String>,
    /// Fuel type.
    #[serde(default)]
    pub fuel_type: Option<String>,
    /// Tailpipe grams of CO2 per mile. Rows without one are never averaged.
    #[serde(default)]
    pub grams_co2_per_mile: Option<f64>,
    /// City fuel economy.
    #[serde(default)]
    pub mpg_city: Option<f64>,
    /// Highway fuel economy.
    #[serde(default)]
    pub mpg_highway: Option<f64>,
    /// Combined fuel economy.
    #[serde(default)]
    pub mpg_combined: Option<f64>,
}

/// Identifies a car well enough to match it against the registry.
///
/// Make, model and year are required. Cylinders and transmission narrow the
/// match when given; when absent, every variant of the model year matches and
/// their factors are averaged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CarSpec {
    /// Manufacturer.
    pub make: String,
    /// Model name.
    pub model: String,
    /// Model year.
    pub year: i32,
    /// Engine cylinder count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cylinders: Option<i32>,
    /// Transmission description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmission: Option<String>,
}

impl CarSpec {
    /// Create a spec matching every variant of a model year.
    #[must_use]
    pub fn new(make: impl Into<String>, model: impl Into<String>, year: i32) -> Self {
        Self {
            make: make.into(),
            model: model.into(),
            year,
            cylinders: None,
            transmission: None,
        }
    }

    /// Narrow the spec to a cylinder count.
    #[must_use]
    pub fn with_cylinders(mut self, cylinders: i32) -> Self {
        self.cylinders = Some(cylinders);
        self
    }

    /// Narrow the spec to a transmission.
    #[must_use]
    pub fn with_transmission(mut self, transmission: impl Into<String>) -> Self {
        self.transmission = Some(transmission.into());
        self
    }
}

impl std::fmt::Display for CarSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.year, self.make, self.model)?;
        if let Some(cylinders) = self.cylinders {
            write!(f, " {cylinders}cyl")?;
        }
        if let Some(transmission) = &self.transmission {
            write!(f, " ({transmission})")?;
        }
        Ok(())
    }
}

impl FromStr for CarSpec {
    type Err = Error;

    /// Parse `make|model|year[|cylinders[|transmission]]`.
    ///
    /// Empty trailing fields are treated as absent.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('|').map(str::trim).collect();
        if parts.len() < 3 || parts.len() > 5 {
            return Err(Error::invalid_input(format!(
                "expected make|model|year[|cylinders[|transmission]], got '{s}'"
            )));
        }
        if parts[0].is_empty() || parts[1].is_empty() {
            return Err(Error::invalid_input(format!(
                "make and model are required in '{s}'"
            )));
        }

        let year = parts[2]
            .parse::<i32>()
            .map_err(|_| Error::invalid_input(format!("invalid car year '{}'", parts[2])))?;

        let mut spec = Self::new(parts[0], parts[1], year);

        if let Some(cylinders) = parts.get(3).filter(|p| !p.is_empty()) {
            let cylinders = cylinders
                .parse::<i32>()
                .map_err(|_| Error::invalid_input(format!("invalid cylinders '{cylinders}'")))?;
            spec = spec.with_cylinders(cylinders);
        }
        if let Some(transmission) = parts.get(4).filter(|p| !p.is_empty()) {
            spec = spec.with_transmission(*transmission);
        }

        Ok(spec)
    }
}

/// A car in a user's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCar {
    /// Row id.
    pub id: i64,
    /// Owning user.
    pub user_id: i64,
    /// The car as the user described it.
    pub spec: CarSpec,
    /// Average registry factor captured when the car was added.
    pub grams_co2_per_mile: f64,
    /// Whether trips default to this car.
    pub is_default: bool,
}

/// A shared transportation mode with a per passenger-mile factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitType {
    /// Row id (assigned by storage when `None`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Mode name, e.g. `bus`.
    pub name: String,
    /// Grams of CO2 per passenger-mile.
    pub grams_co2_per_mile: f64,
}

/// A place a user lives, used for utility logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Residence {
    /// Row id.
    pub id: i64,
    /// Owning user.
    pub user_id: i64,
    /// Zip code, which determines the grid region.
    pub zipcode: String,
    /// Name or street address, unique per user.
    pub address: String,
    /// Whether bills default to this residence.
    pub is_default: bool,
    /// Number of people living there.
    pub residents: Option<u32>,
}

/// How a trip was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "mode_id", rename_all = "snake_case")]
pub enum TripMode {
    /// In one of the user's cars.
    Car(i64),
    /// On a registered transit type.
    Transit(i64),
}

/// A logged trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripLog {
    /// Row id (assigned by storage).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// User who made the trip.
    pub user_id: i64,
    /// Vehicle used.
    #[serde(flatten)]
    pub mode: TripMode,
    /// Day of travel.
    pub date: NaiveDate,
    /// Distance travelled.
    pub miles: f64,
    /// People sharing the car, including the driver.
    pub passengers: u32,
}

impl TripLog {
    /// Create a single-occupant trip.
    #[must_use]
    pub fn new(user_id: i64, mode: TripMode, date: NaiveDate, miles: f64) -> Self {
        Self {
            id: None,
            user_id,
            mode,
            date,
            miles,
            passengers: 1,
        }
    }

    /// Set the passenger count.
    #[must_use]
    pub fn with_passengers(mut self, passengers: u32) -> Self {
        self.passengers = passengers;
        self
    }

    /// BLAKE3 hash of the fields that identify this trip.
    #[must_use]
    pub fn content_hash(&self) -> String {
        let (mode, mode_id) = match self.mode {
            TripMode::Car(id) => ("car", id),
            TripMode::Transit(id) => ("transit", id),
        };
        compute_hash(&format!(
            "trip|{}|{mode}|{mode_id}|{}|{}|{}",
            self.user_id, self.date, self.miles, self.passengers
        ))
    }
}

/// A utility bill for a residence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilityBill {
    /// Row id (assigned by storage).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Residence the bill belongs to.
    pub residence_id: i64,
    /// `Electricity` or `NaturalGas`.
    pub kind: ActivityKind,
    /// kWh for electricity, therms for natural gas.
    pub amount: f64,
    /// First day covered.
    pub start_date: NaiveDate,
    /// Last day covered (inclusive).
    pub end_date: NaiveDate,
}

impl UtilityBill {
    /// Create an electricity bill.
    #[must_use]
    pub fn electricity(residence_id: i64, kwh: f64, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            id: None,
            residence_id,
            kind: ActivityKind::Electricity,
            amount: kwh,
            start_date: start,
            end_date: end,
        }
    }

    /// Create a natural gas bill.
    #[must_use]
    pub fn natural_gas(residence_id: i64, therms: f64, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            id: None,
            residence_id,
            kind: ActivityKind::NaturalGas,
            amount: therms,
            start_date: start,
            end_date: end,
        }
    }

    /// Unit the amount is measured in.
    #[must_use]
    pub fn unit(&self) -> &'static str {
        match self.kind {
            ActivityKind::NaturalGas => "therms",
            _ => "kWh",
        }
    }

    /// BLAKE3 hash of the fields that identify this bill.
    #[must_use]
    pub fn content_hash(&self) -> String {
        compute_hash(&format!(
            "bill|{}|{}|{}|{}|{}",
            self.residence_id, self.kind, self.amount, self.start_date, self.end_date
        ))
    }
}

/// Validate a US zip code and return it trimmed.
///
/// Accepts five digits, optionally followed by a `-NNNN` extension.
///
/// # Errors
///
/// Returns an error if the input is not a zip code.
pub fn normalize_zipcode(zipcode: &str) -> Result<String, Error> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"^\d{5}(-\d{4})?$").expect("zip code pattern is valid")
    });

    let trimmed = zipcode.trim();
    if pattern.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(Error::invalid_input(format!("invalid zip code '{zipcode}'")))
    }
}

/// Compute the BLAKE3 hash of the given content.
#[must_use]
pub fn compute_hash(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}
