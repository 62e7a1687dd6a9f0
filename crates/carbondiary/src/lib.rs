//! `carbondiary` - A personal carbon footprint diary
//!
//! This library turns logged trips and utility bills into greenhouse gas
//! emissions, using a registry of vehicle and electricity grid emissions
//! factors, and aggregates them into yearly, monthly and weekday reports.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod compare;
pub mod config;
pub mod emissions;
pub mod error;
pub mod logging;
pub mod model;
pub mod report;
pub mod session;
pub mod storage;

pub use config::Config;
pub use emissions::DailyEmission;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use model::{ActivityKind, CarSpec, TripLog, TripMode, UtilityBill};
pub use storage::{Storage, StorageStats};
