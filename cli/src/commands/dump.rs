use anyhow::Result;
use serde_json::Value;

use healthdump_core::input::DumpPayload;
use healthdump_core::models::{UpsertOutcome, WriteStatus, now};
use healthdump_core::service::HealthService;

use super::helpers::{parse_date, print_json};

pub(crate) struct DumpArgs {
    pub steps: String,
    pub kcals: String,
    pub km: String,
    pub flights: Option<String>,
    pub weight: Option<String>,
    pub date: Option<String>,
}

pub(crate) fn cmd_dump(svc: &HealthService, args: DumpArgs, json: bool) -> Result<()> {
    let payload = DumpPayload {
        steps: Some(Value::String(args.steps)),
        kcals: Some(Value::String(args.kcals)),
        km: Some(Value::String(args.km)),
        flights_climbed: args.flights.map(Value::String),
        weight: args.weight.map(Value::String),
    };

    let outcome = match args.date {
        None => svc.ingest(payload)?,
        Some(date) => {
            let date = parse_date(Some(date.as_str()))?;
            let record = payload.into_record(date, now())?;
            svc.upsert(&record)?
        }
    };

    if json {
        return print_json(&outcome);
    }
    print_outcome(&outcome);
    Ok(())
}

pub(crate) fn print_outcome(outcome: &UpsertOutcome) {
    let r = &outcome.record;
    match outcome.status {
        WriteStatus::Created => println!("Saved {}", r.date),
        WriteStatus::Replaced => println!("Replaced {}", r.date),
        WriteStatus::Skipped => println!(
            "Kept existing {} (recorded {})",
            r.date,
            r.recorded_at.format("%Y-%m-%d %H:%M:%S")
        ),
    }
    println!(
        "  {} steps | {:.0} kcal | {:.2} km | {} flights | weight {}",
        r.steps,
        r.kcals,
        r.km,
        r.flights_climbed.map_or_else(|| "-".to_string(), |f| f.to_string()),
        r.weight.map_or_else(|| "-".to_string(), |w| format!("{w:.1}")),
    );
    println!("  {} days stored", outcome.row_count);
}
