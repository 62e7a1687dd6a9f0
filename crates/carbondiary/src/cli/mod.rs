//! Command-line interface for carbondiary.
//!
//! This module provides the CLI structure and output rendering for the
//! `carbon` binary.

mod commands;
pub mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    BillPeriod, CarArgs, CarCommand, CompareCommand, ConfigCommand, LogCommand, OutputFormat,
    RegistryCommand, ReportArgs, ReportCommand, ResidenceCommand, UserCommand,
};

/// carbon - Keep a diary of your carbon footprint
///
/// Log trips, electricity bills and natural gas bills, then see the
/// greenhouse gas emissions they add up to by year, month and weekday.
#[derive(Debug, Parser)]
#[command(name = "carbon")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Register, log in and out
    #[command(subcommand)]
    User(UserCommand),

    /// Manage your residences
    #[command(subcommand)]
    Residence(ResidenceCommand),

    /// Manage your cars
    #[command(subcommand)]
    Car(CarCommand),

    /// Log trips and utility bills
    #[command(subcommand)]
    Log(LogCommand),

    /// Report emissions
    #[command(subcommand)]
    Report(ReportCommand),

    /// Compare your emissions with a different location or car
    #[command(subcommand)]
    Compare(CompareCommand),

    /// Manage reference data
    #[command(subcommand)]
    Registry(RegistryCommand),

    /// View configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CarSpec;
    use chrono::NaiveDate;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "carbon");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(
            parse(&["carbon", "-q", "user", "logout"]).verbosity(),
            crate::logging::Verbosity::Quiet
        );
        assert_eq!(
            parse(&["carbon", "user", "logout"]).verbosity(),
            crate::logging::Verbosity::Normal
        );
        assert_eq!(
            parse(&["carbon", "-v", "user", "logout"]).verbosity(),
            crate::logging::Verbosity::Verbose
        );
        assert_eq!(
            parse(&["carbon", "-vv", "user", "logout"]).verbosity(),
            crate::logging::Verbosity::Trace
        );
    }

    #[test]
    fn test_parse_with_config() {
        let cli = parse(&["carbon", "-c", "/custom/config.toml", "config", "show"]);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_register() {
        let cli = parse(&[
            "carbon", "user", "register", "ada@example.com", "-p", "engine", "-n", "Ada",
        ]);
        match cli.command {
            Command::User(UserCommand::Register {
                email,
                password,
                username,
                ..
            }) => {
                assert_eq!(email, "ada@example.com");
                assert_eq!(password, "engine");
                assert_eq!(username, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_car_add() {
        let cli = parse(&[
            "carbon", "car", "add", "Honda", "Civic", "2015", "--cylinders", "4", "--default",
        ]);
        match cli.command {
            Command::Car(CarCommand::Add { car, default }) => {
                assert_eq!(car.spec(), CarSpec::new("Honda", "Civic", 2015).with_cylinders(4));
                assert!(default);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_log_trip() {
        let cli = parse(&[
            "carbon", "log", "trip", "--miles", "12.5", "--date", "2016-03-07", "-p", "2",
        ]);
        match cli.command {
            Command::Log(LogCommand::Trip {
                miles,
                date,
                car,
                transit,
                passengers,
            }) => {
                assert!((miles - 12.5).abs() < f64::EPSILON);
                assert_eq!(date, NaiveDate::from_ymd_opt(2016, 3, 7));
                assert_eq!(car, None);
                assert_eq!(transit, None);
                assert_eq!(passengers, 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_log_trip_car_and_transit_conflict() {
        let result = Cli::try_parse_from([
            "carbon", "log", "trip", "--miles", "3", "--car", "1", "--transit", "bus",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_log_electricity() {
        let cli = parse(&[
            "carbon",
            "log",
            "electricity",
            "--kwh",
            "310",
            "--start",
            "2016-01-01",
            "--end",
            "2016-01-31",
            "--residence",
            "Home",
        ]);
        match cli.command {
            Command::Log(LogCommand::Electricity { kwh, period }) => {
                assert!((kwh - 310.0).abs() < f64::EPSILON);
                assert_eq!(period.end, NaiveDate::from_ymd_opt(2016, 1, 31).unwrap());
                assert_eq!(period.residence.as_deref(), Some("Home"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_date() {
        let result = Cli::try_parse_from([
            "carbon", "log", "gas", "--therms", "20", "--start", "01/01/2016", "--end",
            "2016-01-31",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_report_summary() {
        let cli = parse(&["carbon", "report", "summary", "--year", "2015", "-f", "json"]);
        match cli.command {
            Command::Report(ReportCommand::Summary(args)) => {
                assert_eq!(args.year, Some(2015));
                assert_eq!(args.format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_compare_car() {
        let cli = parse(&["carbon", "compare", "car", "--with", "Toyota|Prius|2012"]);
        match cli.command {
            Command::Compare(CompareCommand::Car { with, car, report }) => {
                assert_eq!(with, CarSpec::new("Toyota", "Prius", 2012));
                assert_eq!(car, None);
                assert_eq!(report.year, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_compare_car_rejects_bad_spec() {
        assert!(Cli::try_parse_from(["carbon", "compare", "car", "--with", "Toyota"]).is_err());
    }

    #[test]
    fn test_parse_compare_location() {
        let cli = parse(&["carbon", "compare", "location", "--zipcode", "80202"]);
        assert!(matches!(
            cli.command,
            Command::Compare(CompareCommand::Location { .. })
        ));
    }

    #[test]
    fn test_parse_registry_zipcode() {
        let cli = parse(&["carbon", "registry", "zipcode", "San Francisco", "CA"]);
        match cli.command {
            Command::Registry(RegistryCommand::Zipcode { city, state }) => {
                assert_eq!(city, "San Francisco");
                assert_eq!(state, "CA");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
