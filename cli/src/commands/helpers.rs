use anyhow::Result;
use chrono::{Duration, Local, NaiveDate};
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use healthdump_core::models::{DATE_FORMAT, Goals, HealthRecord};

/// Resolve a date argument against `today`. Accepts `YYYY-MM-DD`, `today` and
/// `yesterday`; `None` gives `default`.
pub(crate) fn resolve_date(
    date_str: Option<&str>,
    today: NaiveDate,
    default: NaiveDate,
) -> Result<NaiveDate> {
    match date_str.map(str::trim) {
        None | Some("") => Ok(default),
        Some(s) if s.eq_ignore_ascii_case("today") => Ok(today),
        Some(s) if s.eq_ignore_ascii_case("yesterday") => Ok(today - Duration::days(1)),
        Some(s) => Ok(healthdump_core::models::parse_date(s)?),
    }
}

/// Date argument defaulting to today.
pub(crate) fn parse_date(date_str: Option<&str>) -> Result<NaiveDate> {
    let today = Local::now().date_naive();
    resolve_date(date_str, today, today)
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn fmt_opt<T: ToString>(v: Option<T>) -> String {
    v.map_or_else(|| "-".to_string(), |v| v.to_string())
}

pub(crate) fn print_records_table(records: &[HealthRecord]) {
    #[derive(Tabled)]
    struct RecordRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Steps")]
        steps: i64,
        #[tabled(rename = "Kcals")]
        kcals: String,
        #[tabled(rename = "Km")]
        km: String,
        #[tabled(rename = "Flights")]
        flights: String,
        #[tabled(rename = "Weight")]
        weight: String,
        #[tabled(rename = "Recorded")]
        recorded_at: String,
    }

    let rows: Vec<RecordRow> = records
        .iter()
        .map(|r| RecordRow {
            date: r.date.format(DATE_FORMAT).to_string(),
            steps: r.steps,
            kcals: format!("{:.0}", r.kcals),
            km: format!("{:.2}", r.km),
            flights: fmt_opt(r.flights_climbed),
            weight: r.weight.map_or_else(|| "-".to_string(), |w| format!("{w:.1}")),
            recorded_at: r.recorded_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..6)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_goals_table(goals: &Goals) {
    #[derive(Tabled)]
    struct GoalRow {
        #[tabled(rename = "Metric")]
        metric: &'static str,
        #[tabled(rename = "Goal")]
        goal: i64,
    }

    let rows = [
        GoalRow {
            metric: "Steps",
            goal: goals.steps,
        },
        GoalRow {
            metric: "Kcals",
            goal: goals.kcals,
        },
        GoalRow {
            metric: "Km",
            goal: goals.km,
        },
        GoalRow {
            metric: "Flights",
            goal: goals.flights_climbed,
        },
    ];

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}
