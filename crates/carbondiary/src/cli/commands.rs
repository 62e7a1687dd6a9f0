//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Subcommand, ValueEnum};

use crate::model::CarSpec;

/// Account commands.
#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// Create an account and log in
    Register {
        /// Login email
        email: String,

        /// Password
        #[arg(short, long)]
        password: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Short handle (defaults to the part of the email before '@')
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Log in
    Login {
        /// Login email
        email: String,

        /// Password
        #[arg(short, long)]
        password: String,
    },

    /// Log out
    Logout,

    /// Show the logged-in user
    Whoami {
        /// Output format
        #[arg(short, long, value_enum, default_value = "plain")]
        format: OutputFormat,
    },
}

/// Residence commands.
#[derive(Debug, Subcommand)]
pub enum ResidenceCommand {
    /// Add a residence
    Add {
        /// Zip code (must be in the registry)
        zipcode: String,

        /// Name or street address
        address: String,

        /// Make this the default residence for bills
        #[arg(long)]
        default: bool,

        /// Number of people living there
        #[arg(long)]
        residents: Option<u32>,
    },

    /// List residences
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

/// Describes a car to match against the vehicle registry.
#[derive(Debug, Clone, Args)]
pub struct CarArgs {
    /// Manufacturer
    pub make: String,

    /// Model name
    pub model: String,

    /// Model year
    pub year: i32,

    /// Engine cylinder count
    #[arg(long)]
    pub cylinders: Option<i32>,

    /// Transmission, e.g. "Automatic (S6)"
    #[arg(long)]
    pub transmission: Option<String>,
}

impl CarArgs {
    /// The registry query these arguments describe.
    #[must_use]
    pub fn spec(&self) -> CarSpec {
        CarSpec {
            make: self.make.clone(),
            model: self.model.clone(),
            year: self.year,
            cylinders: self.cylinders,
            transmission: self.transmission.clone(),
        }
    }
}

/// Car commands.
#[derive(Debug, Subcommand)]
pub enum CarCommand {
    /// Add a car to your profile
    Add {
        #[command(flatten)]
        car: CarArgs,

        /// Make this the default car for trips
        #[arg(long)]
        default: bool,
    },

    /// List your cars
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Show the registry rows a car description matches
    Match {
        #[command(flatten)]
        car: CarArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

/// Activity logging commands.
#[derive(Debug, Subcommand)]
pub enum LogCommand {
    /// Log a trip
    Trip {
        /// Distance in miles
        #[arg(short, long)]
        miles: f64,

        /// Day of travel (YYYY-MM-DD, defaults to today)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Car id (defaults to your default car)
        #[arg(long, conflicts_with = "transit")]
        car: Option<i64>,

        /// Transit type name, e.g. "bus"
        #[arg(long)]
        transit: Option<String>,

        /// People in the car, including the driver
        #[arg(short, long, default_value_t = 1)]
        passengers: u32,
    },

    /// Log an electricity bill
    Electricity {
        /// Kilowatt-hours used
        #[arg(short, long)]
        kwh: f64,

        #[command(flatten)]
        period: BillPeriod,
    },

    /// Log a natural gas bill
    Gas {
        /// Therms used
        #[arg(short, long)]
        therms: f64,

        #[command(flatten)]
        period: BillPeriod,
    },

    /// List everything you have logged
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

/// Period and residence of a utility bill.
#[derive(Debug, Clone, Args)]
pub struct BillPeriod {
    /// First day covered (YYYY-MM-DD)
    #[arg(short, long)]
    pub start: NaiveDate,

    /// Last day covered, inclusive (YYYY-MM-DD)
    #[arg(short, long)]
    pub end: NaiveDate,

    /// Residence id or address (defaults to your default residence)
    #[arg(short, long)]
    pub residence: Option<String>,
}

/// Year selection and output format shared by reports.
#[derive(Debug, Clone, Args)]
pub struct ReportArgs {
    /// Calendar year (defaults to the current year)
    #[arg(short, long)]
    pub year: Option<i32>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Report commands.
#[derive(Debug, Subcommand)]
pub enum ReportCommand {
    /// Totals and daily/monthly averages for a year
    Summary(ReportArgs),

    /// Year-over-year comparison of daily averages
    Years {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Monthly totals per activity for a year
    Months(ReportArgs),

    /// Weekday totals per activity for a year
    Weekdays(ReportArgs),

    /// Share of each activity in a year's total
    Breakdown(ReportArgs),
}

/// What-if commands.
#[derive(Debug, Subcommand)]
pub enum CompareCommand {
    /// Compare your electricity emissions with another zip code's grid
    Location {
        /// Zip code to compare with
        #[arg(short, long)]
        zipcode: String,

        #[command(flatten)]
        report: ReportArgs,
    },

    /// Compare the trips made in one of your cars with another car
    Car {
        /// Car to compare with, as make|model|year[|cylinders[|transmission]]
        #[arg(short, long = "with", value_name = "CAR")]
        with: CarSpec,

        /// Car id (defaults to your default car)
        #[arg(long)]
        car: Option<i64>,

        #[command(flatten)]
        report: ReportArgs,
    },
}

/// Reference data commands.
#[derive(Debug, Subcommand)]
pub enum RegistryCommand {
    /// Import regions, zip codes, cars and transit types from a JSON file
    Import {
        /// Path to the JSON file
        path: PathBuf,
    },

    /// Find the zip code for a city
    Zipcode {
        /// City name
        city: String,

        /// Two-letter state code
        state: String,
    },

    /// Show database row counts
    Stats {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Tab-separated rows, no header
    #[default]
    Plain,
    /// Aligned columns with a header
    Table,
    /// JSON output
    Json,
}
