//! `carbon` - CLI for carbondiary
//!
//! This binary provides the command-line interface for logging activity and
//! reporting the emissions it adds up to.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::{Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use clap::Parser;
use tracing::debug;

use carbondiary::cli::{
    render, CarCommand, Cli, Command, CompareCommand, ConfigCommand, LogCommand, OutputFormat,
    RegistryCommand, ReportArgs, ReportCommand, ResidenceCommand, UserCommand,
};
use carbondiary::compare::{compare_cars, compare_locations};
use carbondiary::emissions::{average_factor, DailyEmission};
use carbondiary::model::{normalize_zipcode, TripLog, TripMode, UtilityBill};
use carbondiary::report::{
    by_weekday, monthly, totals_by_kind, year_bounds, year_over_year, year_summary,
};
use carbondiary::session::{FileSessionStore, SessionStore, USER_ID_KEY};
use carbondiary::storage::RegistryImport;
use carbondiary::{init_logging, Config, Error, Storage};

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
        command => App::open(config)?.run(command),
    }
}

/// Everything a command needs once configuration is loaded.
#[derive(Debug)]
struct App {
    config: Config,
    storage: Storage,
    session: FileSessionStore,
    today: NaiveDate,
}

impl App {
    fn open(config: Config) -> Result<Self> {
        let storage = Storage::open(config.database_path())?;
        let session = FileSessionStore::open(config.session_path())?;
        let today = Local::now().date_naive();
        debug!("Today is {}", today);
        Ok(Self {
            config,
            storage,
            session,
            today,
        })
    }

    fn run(&mut self, command: Command) -> Result<()> {
        match command {
            Command::User(cmd) => self.handle_user(cmd),
            Command::Residence(cmd) => self.handle_residence(cmd),
            Command::Car(cmd) => self.handle_car(cmd),
            Command::Log(cmd) => self.handle_log(cmd),
            Command::Report(cmd) => self.handle_report(cmd),
            Command::Compare(cmd) => self.handle_compare(cmd),
            Command::Registry(cmd) => self.handle_registry(cmd),
            Command::Config(cmd) => handle_config(&self.config, cmd),
        }
    }

    fn gas_factor(&self) -> f64 {
        self.config.emissions.natural_gas_lb_per_therm
    }

    fn user_id(&self) -> Result<i64> {
        Ok(self.session.user_id()?)
    }

    fn handle_user(&mut self, cmd: UserCommand) -> Result<()> {
        match cmd {
            UserCommand::Register {
                email,
                password,
                name,
                username,
            } => {
                let username = username
                    .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
                let user = self.storage.register(&email, &password, &name, &username)?;
                self.session.set(USER_ID_KEY, &user.id.to_string())?;
                println!("Registered and logged in as {} ({})", user.name, user.email);
            }
            UserCommand::Login { email, password } => {
                let user = self.storage.login(&email, &password)?;
                self.session.set(USER_ID_KEY, &user.id.to_string())?;
                println!("Logged in as {} ({})", user.name, user.email);
            }
            UserCommand::Logout => {
                if self.session.remove(USER_ID_KEY)?.is_some() {
                    println!("Logged out.");
                } else {
                    println!("Not logged in.");
                }
            }
            UserCommand::Whoami { format } => {
                let user = self.storage.user(self.user_id()?)?;
                println!("{}", render::user(&user, format)?);
            }
        }
        Ok(())
    }

    fn handle_residence(&self, cmd: ResidenceCommand) -> Result<()> {
        let user_id = self.user_id()?;
        match cmd {
            ResidenceCommand::Add {
                zipcode,
                address,
                default,
                residents,
            } => {
                let residence =
                    self.storage
                        .add_residence(user_id, &zipcode, &address, default, residents)?;
                let region = self.storage.region_for_zipcode(&residence.zipcode)?;
                println!(
                    "Added residence {}: {} ({}, {} grid at {:.1} lb CO2e/MWh)",
                    residence.id,
                    residence.address,
                    residence.zipcode,
                    region.name,
                    region.lb_co2e_per_mwh
                );
            }
            ResidenceCommand::List { format } => {
                let residences = self.storage.residences(user_id)?;
                println!("{}", render::residences(&residences, format)?);
            }
        }
        Ok(())
    }

    fn handle_car(&self, cmd: CarCommand) -> Result<()> {
        match cmd {
            CarCommand::Add { car, default } => {
                let car = self
                    .storage
                    .add_user_car(self.user_id()?, &car.spec(), default)?;
                println!(
                    "Added car {}: {} ({:.1} g CO2/mile)",
                    car.id, car.spec, car.grams_co2_per_mile
                );
            }
            CarCommand::List { format } => {
                let cars = self.storage.user_cars(self.user_id()?)?;
                println!("{}", render::user_cars(&cars, format)?);
            }
            CarCommand::Match { car, format } => {
                let cars = self.storage.matching_cars(&car.spec())?;
                println!("{}", render::registry_cars(&cars, format)?);
                if format != OutputFormat::Json {
                    match average_factor(&cars) {
                        Some(factor) => println!("\nAverage: {factor:.1} g CO2/mile"),
                        None => println!("\nNo matching row has an emissions factor."),
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_log(&self, cmd: LogCommand) -> Result<()> {
        let user_id = self.user_id()?;
        match cmd {
            LogCommand::Trip {
                miles,
                date,
                car,
                transit,
                passengers,
            } => {
                let mode = match transit {
                    Some(name) => {
                        let transit = self
                            .storage
                            .transit_type(&name)?
                            .ok_or_else(|| Error::not_found("transit type", &name))?;
                        TripMode::Transit(transit.id.context("stored transit type has no id")?)
                    }
                    None => TripMode::Car(self.storage.user_car(user_id, car)?.id),
                };
                let trip = TripLog::new(user_id, mode, date.unwrap_or(self.today), miles)
                    .with_passengers(passengers);
                match self.storage.add_trip(&trip)? {
                    Some(id) => println!("Logged trip {id}: {miles} miles on {}", trip.date),
                    None => println!("That trip is already logged."),
                }
            }
            LogCommand::Electricity { kwh, period } => {
                let residence = self
                    .storage
                    .residence(user_id, period.residence.as_deref())?;
                let bill = UtilityBill::electricity(residence.id, kwh, period.start, period.end);
                self.add_bill(user_id, &bill)?;
            }
            LogCommand::Gas { therms, period } => {
                let residence = self
                    .storage
                    .residence(user_id, period.residence.as_deref())?;
                let bill = UtilityBill::natural_gas(residence.id, therms, period.start, period.end);
                self.add_bill(user_id, &bill)?;
            }
            LogCommand::List { format } => {
                let logs = self.storage.logs(user_id, self.gas_factor())?;
                println!("{}", render::logs(&logs, format)?);
            }
        }
        Ok(())
    }

    fn add_bill(&self, user_id: i64, bill: &UtilityBill) -> Result<()> {
        match self.storage.add_bill(user_id, bill)? {
            Some(id) => println!(
                "Logged {} bill {id}: {} {} from {} to {}",
                bill.kind,
                bill.amount,
                bill.unit(),
                bill.start_date,
                bill.end_date
            ),
            None => println!("That bill is already logged."),
        }
        Ok(())
    }

    fn handle_report(&self, cmd: ReportCommand) -> Result<()> {
        let user_id = self.user_id()?;
        let output = match cmd {
            ReportCommand::Summary(args) => {
                let (year, entries) = self.year_entries(user_id, &args)?;
                render::summary(&year_summary(&entries, year, self.today)?, args.format)?
            }
            ReportCommand::Years { format } => {
                let entries = match self.storage.activity_span(user_id)? {
                    Some((first, last)) => self.storage.emissions_between(
                        user_id,
                        first,
                        last,
                        self.gas_factor(),
                    )?,
                    None => Vec::new(),
                };
                render::years(&year_over_year(&entries, self.today), format)?
            }
            ReportCommand::Months(args) => {
                let (year, entries) = self.year_entries(user_id, &args)?;
                render::months(&monthly(&entries, year), args.format)?
            }
            ReportCommand::Weekdays(args) => {
                let (year, entries) = self.year_entries(user_id, &args)?;
                render::weekdays(&by_weekday(&entries, year), args.format)?
            }
            ReportCommand::Breakdown(args) => {
                let (year, entries) = self.year_entries(user_id, &args)?;
                let (start, end) = year_bounds(year)?;
                render::breakdown(year, &totals_by_kind(&entries, start, end), args.format)?
            }
        };
        println!("{output}");
        Ok(())
    }

    fn report_year(&self, args: &ReportArgs) -> i32 {
        args.year.unwrap_or_else(|| self.today.year())
    }

    fn year_entries(
        &self,
        user_id: i64,
        args: &ReportArgs,
    ) -> Result<(i32, Vec<DailyEmission>)> {
        let year = self.report_year(args);
        let (start, end) = year_bounds(year)?;
        let entries = self
            .storage
            .emissions_between(user_id, start, end, self.gas_factor())?;
        Ok((year, entries))
    }

    fn handle_compare(&self, cmd: CompareCommand) -> Result<()> {
        let user_id = self.user_id()?;
        let output = match cmd {
            CompareCommand::Location { zipcode, report } => {
                let year = self.report_year(&report);
                let (start, end) = year_bounds(year)?;
                let zipcode = normalize_zipcode(&zipcode)?;
                let region = self.storage.region_for_zipcode(&zipcode)?;
                let bills = self
                    .storage
                    .electricity_bills_between(user_id, start, end)?;
                let cmp = compare_locations(&bills, &region, &zipcode, year, self.today)?;
                render::comparison(&cmp, report.format)?
            }
            CompareCommand::Car { with, car, report } => {
                let year = self.report_year(&report);
                let (start, end) = year_bounds(year)?;
                let current = self.storage.user_car(user_id, car)?;
                let factor = self.storage.car_factor(&with)?;
                let trips = self.storage.car_trips(user_id, current.id, start, end)?;
                let cmp = compare_cars(&trips, &current, &with, factor, year, self.today)?;
                render::comparison(&cmp, report.format)?
            }
        };
        println!("{output}");
        Ok(())
    }

    fn handle_registry(&self, cmd: RegistryCommand) -> Result<()> {
        match cmd {
            RegistryCommand::Import { path } => {
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let batch: RegistryImport = serde_json::from_str(&contents)
                    .with_context(|| format!("failed to parse {}", path.display()))?;
                let summary = self.storage.import_registry(&batch)?;
                println!(
                    "Imported {} regions, {} zip codes, {} cars and {} transit types.",
                    summary.regions, summary.zipcodes, summary.cars, summary.transit_types
                );
            }
            RegistryCommand::Zipcode { city, state } => {
                let zipcode = self
                    .storage
                    .lookup_zipcode(&city, &state)?
                    .ok_or_else(|| Error::not_found("zipcode", format!("{city}, {state}")))?;
                println!("{zipcode}");
            }
            RegistryCommand::Stats { format } => {
                println!("{}", render::stats(&self.storage.stats()?, format)?);
            }
        }
        Ok(())
    }
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Emissions]");
                println!(
                    "  Natural gas:        {} lb CO2/therm",
                    config.emissions.natural_gas_lb_per_therm
                );
                println!();
                println!("[Session]");
                println!("  Session path:       {}", config.session_path().display());
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
