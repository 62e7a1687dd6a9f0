//! Text and JSON rendering of command output.

use serde::Serialize;

use crate::compare::Comparison;
use crate::error::Result;
use crate::model::{ActivityKind, RegistryCar, Residence, User, UserCar};
use crate::report::{
    KindTotals, MonthlySeries, WeekdaySeries, YearOverYear, YearSummary, MONTH_LABELS,
    WEEKDAY_LABELS,
};
use crate::storage::{LogEntry, StorageStats};

use super::OutputFormat;

/// Render `value` as JSON, or `rows` as text.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render<T: Serialize + ?Sized>(
    value: &T,
    headers: &[&str],
    rows: &[Vec<String>],
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Plain => Ok(rows
            .iter()
            .map(|row| row.join("\t"))
            .collect::<Vec<_>>()
            .join("\n")),
        OutputFormat::Table => Ok(table(headers, rows)),
    }
}

fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let line = |cells: &[&str]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let rule: Vec<&str> = rule.iter().map(String::as_str).collect();

    let mut out = vec![line(headers), line(&rule)];
    for row in rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        out.push(line(&cells));
    }
    out.join("\n")
}

fn pounds(value: f64) -> String {
    format!("{value:.1}")
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |p| format!("{p:+.1}%"))
}

/// Render the logged-in user.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn user(user: &User, format: OutputFormat) -> Result<String> {
    let rows = vec![vec![
        user.id.to_string(),
        user.email.clone(),
        user.name.clone(),
        user.username.clone(),
    ]];
    render(user, &["ID", "EMAIL", "NAME", "USERNAME"], &rows, format)
}

/// Render a user's residences.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn residences(residences: &[Residence], format: OutputFormat) -> Result<String> {
    let rows: Vec<Vec<String>> = residences
        .iter()
        .map(|r| {
            vec![
                r.id.to_string(),
                r.address.clone(),
                r.zipcode.clone(),
                r.residents.map_or_else(String::new, |n| n.to_string()),
                default_marker(r.is_default),
            ]
        })
        .collect();
    render(
        residences,
        &["ID", "ADDRESS", "ZIP", "RESIDENTS", "DEFAULT"],
        &rows,
        format,
    )
}

/// Render a user's cars.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn user_cars(cars: &[UserCar], format: OutputFormat) -> Result<String> {
    let rows: Vec<Vec<String>> = cars
        .iter()
        .map(|c| {
            vec![
                c.id.to_string(),
                c.spec.to_string(),
                format!("{:.1}", c.grams_co2_per_mile),
                default_marker(c.is_default),
            ]
        })
        .collect();
    render(cars, &["ID", "CAR", "G/MI", "DEFAULT"], &rows, format)
}

/// Render registry rows matching a car description.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn registry_cars(cars: &[RegistryCar], format: OutputFormat) -> Result<String> {
    let optional = |value: Option<f64>| value.map_or_else(|| "-".to_string(), |v| format!("{v:.1}"));
    let rows: Vec<Vec<String>> = cars
        .iter()
        .map(|c| {
            vec![
                c.year.to_string(),
                c.make.clone(),
                c.model.clone(),
                c.cylinders.map_or_else(|| "-".to_string(), |n| n.to_string()),
                c.transmission.clone().unwrap_or_else(|| "-".to_string()),
                optional(c.grams_co2_per_mile),
                optional(c.mpg_combined),
            ]
        })
        .collect();
    render(
        cars,
        &["YEAR", "MAKE", "MODEL", "CYL", "TRANSMISSION", "G/MI", "MPG"],
        &rows,
        format,
    )
}

/// Render a user's activity log.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn logs(entries: &[LogEntry], format: OutputFormat) -> Result<String> {
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|e| {
            let period = if e.start_date == e.end_date {
                e.start_date.to_string()
            } else {
                format!("{}..{}", e.start_date, e.end_date)
            };
            vec![
                period,
                e.kind.to_string(),
                e.description.clone(),
                format!("{:.1} {}", e.amount, e.unit),
                pounds(e.pounds),
            ]
        })
        .collect();
    render(
        entries,
        &["DATE", "KIND", "DESCRIPTION", "AMOUNT", "LB CO2E"],
        &rows,
        format,
    )
}

/// Render a year summary.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn summary(summary: &YearSummary, format: OutputFormat) -> Result<String> {
    let days = if summary.partial {
        format!("{} (year to date)", summary.days)
    } else {
        summary.days.to_string()
    };
    let mut rows: Vec<Vec<String>> = ActivityKind::ALL
        .iter()
        .map(|kind| vec![kind.to_string(), pounds(summary.totals.get(*kind))])
        .collect();
    rows.push(vec!["total".to_string(), pounds(summary.total)]);
    rows.push(vec!["days".to_string(), days]);
    rows.push(vec!["daily average".to_string(), pounds(summary.daily_average)]);
    rows.push(vec![
        "monthly average".to_string(),
        pounds(summary.monthly_average),
    ]);
    let year = summary.year.to_string();
    render(summary, &[year.as_str(), "LB CO2E"], &rows, format)
}

/// Render a year-over-year comparison.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn years(rows: &[YearOverYear], format: OutputFormat) -> Result<String> {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                if r.partial {
                    format!("{}*", r.year)
                } else {
                    r.year.to_string()
                },
                pounds(r.total),
                r.days.to_string(),
                format!("{:.2}", r.daily_average),
                percent(r.percent_change),
            ]
        })
        .collect();
    render(
        rows,
        &["YEAR", "LB CO2E", "DAYS", "LB/DAY", "CHANGE"],
        &cells,
        format,
    )
}

/// Render monthly totals.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn months(series: &MonthlySeries, format: OutputFormat) -> Result<String> {
    let combined = series.combined();
    let rows: Vec<Vec<String>> = MONTH_LABELS
        .iter()
        .enumerate()
        .map(|(i, label)| {
            vec![
                (*label).to_string(),
                pounds(series.trip[i]),
                pounds(series.electricity[i]),
                pounds(series.natural_gas[i]),
                pounds(combined[i]),
            ]
        })
        .collect();
    render(series, &KIND_HEADERS_MONTH, &rows, format)
}

/// Render weekday totals.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn weekdays(series: &WeekdaySeries, format: OutputFormat) -> Result<String> {
    let combined = series.combined();
    let rows: Vec<Vec<String>> = WEEKDAY_LABELS
        .iter()
        .enumerate()
        .map(|(i, label)| {
            vec![
                (*label).to_string(),
                pounds(series.trip[i]),
                pounds(series.electricity[i]),
                pounds(series.natural_gas[i]),
                pounds(combined[i]),
            ]
        })
        .collect();
    render(series, &KIND_HEADERS_WEEKDAY, &rows, format)
}

const KIND_HEADERS_MONTH: [&str; 5] = ["MONTH", "TRIP", "ELECTRICITY", "NATURAL GAS", "TOTAL"];
const KIND_HEADERS_WEEKDAY: [&str; 5] = ["WEEKDAY", "TRIP", "ELECTRICITY", "NATURAL GAS", "TOTAL"];

#[derive(Serialize)]
struct Breakdown<'a> {
    year: i32,
    totals: &'a KindTotals,
    shares: KindTotals,
}

/// Render each activity's share of a year's total.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn breakdown(year: i32, totals: &KindTotals, format: OutputFormat) -> Result<String> {
    let shares = totals.shares();
    let rows: Vec<Vec<String>> = ActivityKind::ALL
        .iter()
        .map(|kind| {
            vec![
                kind.to_string(),
                pounds(totals.get(*kind)),
                format!("{:.1}%", shares.get(*kind) * 100.0),
            ]
        })
        .collect();
    let value = Breakdown {
        year,
        totals,
        shares,
    };
    render(&value, &["KIND", "LB CO2E", "SHARE"], &rows, format)
}

/// Render a what-if comparison.
///
/// Text output ends with the comparison statement.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn comparison(cmp: &Comparison, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        #[derive(Serialize)]
        struct WithStatement<'a> {
            #[serde(flatten)]
            comparison: &'a Comparison,
            statement: String,
        }
        return render(
            &WithStatement {
                comparison: cmp,
                statement: cmp.statement(),
            },
            &[],
            &[],
            format,
        );
    }

    let mut rows: Vec<Vec<String>> = MONTH_LABELS
        .iter()
        .enumerate()
        .map(|(i, label)| {
            vec![
                (*label).to_string(),
                pounds(cmp.current_monthly[i]),
                pounds(cmp.alternative_monthly[i]),
            ]
        })
        .collect();
    rows.push(vec![
        "total".to_string(),
        pounds(cmp.current_total),
        pounds(cmp.alternative_total),
    ]);
    rows.push(vec![
        format!("per day ({} days)", cmp.days),
        format!("{:.2}", cmp.current_daily),
        format!("{:.2}", cmp.alternative_daily),
    ]);

    let year = cmp.year.to_string();
    let body = render(cmp, &[year.as_str(), "CURRENT", "ALTERNATIVE"], &rows, format)?;
    Ok(format!("{body}\n\n{}", cmp.statement()))
}

/// Render database statistics.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn stats(stats: &StorageStats, format: OutputFormat) -> Result<String> {
    let rows = vec![
        vec!["users".to_string(), stats.users.to_string()],
        vec!["regions".to_string(), stats.regions.to_string()],
        vec!["zipcodes".to_string(), stats.zipcodes.to_string()],
        vec!["registry cars".to_string(), stats.registry_cars.to_string()],
        vec!["transit types".to_string(), stats.transit_types.to_string()],
        vec!["trips".to_string(), stats.trips.to_string()],
        vec!["utility bills".to_string(), stats.utility_bills.to_string()],
        vec!["database bytes".to_string(), stats.db_size_bytes.to_string()],
    ];
    render(stats, &["TABLE", "ROWS"], &rows, format)
}

fn default_marker(is_default: bool) -> String {
    if is_default {
        "*".to_string()
    } else {
        String::new()
    }
}
