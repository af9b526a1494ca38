use anyhow::Result;
use std::process;

use healthdump_core::models::parse_date as parse_iso_date;
use healthdump_core::query::DateQuery;
use healthdump_core::service::HealthService;

use super::helpers::{parse_date, print_json, print_records_table};

pub(crate) fn cmd_show(svc: &HealthService, date: Option<&str>, json: bool) -> Result<()> {
    let date = parse_date(date)?;

    if let Some(record) = svc.get(date)? {
        if json {
            return print_json(&record);
        }
        print_records_table(std::slice::from_ref(&record));
    } else if json {
        println!(
            "{}",
            serde_json::json!({ "error": format!("No record for {date}") })
        );
    } else {
        eprintln!("No record for {date}");
        process::exit(2);
    }

    Ok(())
}

pub(crate) fn cmd_history(
    svc: &HealthService,
    start: Option<&str>,
    end: Option<&str>,
    json: bool,
) -> Result<()> {
    let query = DateQuery::Range {
        start: start.map(parse_iso_date).transpose()?,
        end: end.map(parse_iso_date).transpose()?,
    };
    let records = svc.query(&query)?;

    if json {
        return print_json(&serde_json::json!({ "data": records }));
    }
    if records.is_empty() {
        eprintln!("No records found. Use `healthdump dump` to record a day.");
        process::exit(2);
    }
    print_records_table(&records);
    Ok(())
}
