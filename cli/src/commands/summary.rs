use anyhow::Result;
use chrono::{Duration, Local};
use std::process;

use healthdump_core::HealthError;
use healthdump_core::service::HealthService;

use super::helpers::{print_json, resolve_date};

/// Daily report for `date`, defaulting to yesterday.
pub(crate) fn cmd_summary(
    svc: &HealthService,
    date: Option<&str>,
    window_days: i64,
    json: bool,
) -> Result<()> {
    let today = Local::now().date_naive();
    let date = resolve_date(date, today, today - Duration::days(1))?;

    match svc.daily_report(date, window_days) {
        Ok(report) if json => print_json(&report),
        Ok(report) => {
            println!("{}", report.render());
            Ok(())
        }
        Err(HealthError::NotFound(date)) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "error": format!("No record for {date}") })
                );
            } else {
                eprintln!("No record for {date}");
            }
            process::exit(2);
        }
        Err(e) => Err(e.into()),
    }
}
