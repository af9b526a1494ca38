//! CSV backfill and export of health records.
//!
//! Columns: `date,steps,kcals,km,flights_climbed,weight,recorded_at`. Header
//! names match case-insensitively and everything after `km` is optional.

use std::collections::HashMap;
use std::io::{Read, Write};

use chrono::{DateTime, FixedOffset, NaiveDate, SubsecRound};
use serde::Serialize;

use crate::error::{HealthError, Result};
use crate::input::{int_from_str, real_from_str, weight_from_str};
use crate::models::{
    DATE_FORMAT, HealthRecord, WriteStatus, format_timestamp, parse_date, parse_timestamp,
};
use crate::service::HealthService;

pub const HEADER: [&str; 7] = [
    "date",
    "steps",
    "kcals",
    "km",
    "flights_climbed",
    "weight",
    "recorded_at",
];

/// What an import did, or would do on a dry run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub rows_parsed: usize,
    pub created: usize,
    pub replaced: usize,
    pub skipped: usize,
}

fn at_row(row: usize, err: HealthError) -> HealthError {
    match err {
        HealthError::Validation { field, message } => {
            HealthError::validation(field, format!("row {row}: {message}"))
        }
        other => other,
    }
}

/// Parse records from CSV. Rows without a `recorded_at` value take
/// `default_recorded_at`; blank rows are skipped.
pub fn parse_health_csv<R: Read>(
    reader: R,
    default_recorded_at: DateTime<FixedOffset>,
) -> Result<Vec<HealthRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| HealthError::validation("csv", format!("unreadable header: {e}")))?
        .clone();
    let col = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));

    let mut required = [0usize; 4];
    for (slot, name) in required.iter_mut().zip(HEADER) {
        *slot = col(name).ok_or_else(|| {
            HealthError::validation("csv", format!("missing required column: {name}"))
        })?;
    }
    let [idx_date, idx_steps, idx_kcals, idx_km] = required;
    let idx_flights = col("flights_climbed");
    let idx_weight = col("weight");
    let idx_recorded = col("recorded_at");

    let mut records = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        // Header is line 1
        let row = i + 2;
        let line = result.map_err(|e| HealthError::validation("csv", format!("row {row}: {e}")))?;
        let cell = |idx: usize| line.get(idx).unwrap_or("").trim();
        let opt_cell = |idx: Option<usize>| idx.map(&cell).filter(|v| !v.is_empty());

        if line.iter().all(|v| v.trim().is_empty()) {
            continue;
        }

        let parse = || -> Result<HealthRecord> {
            let recorded_at = match opt_cell(idx_recorded) {
                Some(v) => parse_timestamp(v).ok_or_else(|| {
                    HealthError::validation("recorded_at", format!("'{v}' is not a timestamp"))
                })?,
                None => default_recorded_at,
            };
            let record = HealthRecord {
                date: parse_date(cell(idx_date))?,
                steps: int_from_str("steps", cell(idx_steps))?,
                kcals: real_from_str("kcals", cell(idx_kcals))?,
                km: real_from_str("km", cell(idx_km))?,
                flights_climbed: opt_cell(idx_flights)
                    .map(|v| int_from_str("flights_climbed", v))
                    .transpose()?,
                weight: opt_cell(idx_weight)
                    .map(weight_from_str)
                    .transpose()?
                    .flatten(),
                recorded_at,
            };
            record.validate()?;
            Ok(record)
        };
        records.push(parse().map_err(|e| at_row(row, e))?);
    }

    Ok(records)
}

/// Feed parsed records through the reconciliation gate. With `dry_run` the
/// store is only read, and the summary reports what each row would do.
pub fn import_records(
    svc: &HealthService,
    records: &[HealthRecord],
    dry_run: bool,
) -> Result<ImportSummary> {
    let mut summary = ImportSummary {
        rows_parsed: records.len(),
        ..ImportSummary::default()
    };

    // Latest recorded_at per date as the dry run would have left it.
    let mut simulated: HashMap<NaiveDate, DateTime<FixedOffset>> = HashMap::new();

    for record in records {
        let status = if dry_run {
            record.validate()?;
            let incoming = record.recorded_at.trunc_subsecs(6);
            let stored = match simulated.get(&record.date) {
                Some(at) => Some(*at),
                None => svc.get(record.date)?.map(|r| r.recorded_at),
            };
            let status = match stored {
                None => WriteStatus::Created,
                Some(at) if incoming > at => WriteStatus::Replaced,
                Some(_) => WriteStatus::Skipped,
            };
            if status != WriteStatus::Skipped {
                simulated.insert(record.date, incoming);
            }
            status
        } else {
            svc.upsert(record)?.status
        };
        match status {
            WriteStatus::Created => summary.created += 1,
            WriteStatus::Replaced => summary.replaced += 1,
            WriteStatus::Skipped => summary.skipped += 1,
        }
    }

    tracing::info!(
        rows = summary.rows_parsed,
        created = summary.created,
        replaced = summary.replaced,
        skipped = summary.skipped,
        dry_run,
        "imported health records"
    );
    Ok(summary)
}

/// Write every stored record, oldest first. Returns the number of rows.
pub fn export_csv<W: Write>(svc: &HealthService, writer: W) -> Result<usize> {
    let records = svc.all_records()?;
    write_health_csv(writer, &records)?;
    Ok(records.len())
}

pub fn write_health_csv<W: Write>(writer: W, records: &[HealthRecord]) -> Result<()> {
    let write_err = |e: csv::Error| HealthError::storage("failed to write CSV", e.into());

    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(HEADER).map_err(write_err)?;
    for r in records {
        wtr.write_record([
            r.date.format(DATE_FORMAT).to_string(),
            r.steps.to_string(),
            r.kcals.to_string(),
            r.km.to_string(),
            r.flights_climbed.map(|f| f.to_string()).unwrap_or_default(),
            r.weight.map(|w| w.to_string()).unwrap_or_default(),
            format_timestamp(&r.recorded_at),
        ])
        .map_err(write_err)?;
    }
    wtr.flush()
        .map_err(|e| HealthError::storage("failed to write CSV", e.into()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CSV: &str = "\
date,steps,kcals,km,flights_climbed,weight,recorded_at
2024-01-15,8000,450.5,6.2,12,\"81,3\",2024-01-15T22:00:00+01:00
2024-01-16,6500,380,4.9,,,2024-01-16T21:30:00+01:00
";

    fn import_time() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-02-01T09:00:00Z").unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn test_parse_full_columns() {
        let records = parse_health_csv(SAMPLE_CSV.as_bytes(), import_time()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, d(15));
        assert_eq!(records[0].steps, 8000);
        assert_eq!(records[0].flights_climbed, Some(12));
        assert_eq!(records[0].weight, Some(81.3));
        assert_eq!(
            records[0].recorded_at,
            DateTime::parse_from_rfc3339("2024-01-15T22:00:00+01:00").unwrap()
        );
        assert_eq!(records[1].flights_climbed, None);
        assert_eq!(records[1].weight, None);
    }

    #[test]
    fn test_parse_minimal_columns_and_case() {
        let csv = "\
Date,Steps,KCALS,Km
2024-01-15,100,10,0.1

2024-01-16,200,20,0.2
";
        let records = parse_health_csv(csv.as_bytes(), import_time()).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.recorded_at == import_time()));
    }

    #[test]
    fn test_parse_missing_required_column() {
        let csv = "date,steps,km\n2024-01-15,100,1\n";
        let err = parse_health_csv(csv.as_bytes(), import_time()).unwrap_err();
        assert!(err.to_string().contains("kcals"));
    }

    #[test]
    fn test_parse_error_names_row() {
        let csv = "date,steps,kcals,km\n2024-01-15,100,10,1\n2024-01-16,many,10,1\n";
        let err = parse_health_csv(csv.as_bytes(), import_time()).unwrap_err();
        assert!(matches!(err, HealthError::Validation { field: "steps", .. }));
        assert!(err.to_string().contains("row 3"));
    }

    #[test]
    fn test_import_dry_run_writes_nothing() {
        let svc = HealthService::new_in_memory().unwrap();
        let records = parse_health_csv(SAMPLE_CSV.as_bytes(), import_time()).unwrap();
        let summary = import_records(&svc, &records, true).unwrap();
        assert_eq!(summary.rows_parsed, 2);
        assert_eq!(summary.created, 2);
        assert_eq!(svc.count().unwrap(), 0);
    }

    #[test]
    fn test_import_respects_recency() {
        let svc = HealthService::new_in_memory().unwrap();
        let records = parse_health_csv(SAMPLE_CSV.as_bytes(), import_time()).unwrap();
        let first = import_records(&svc, &records, false).unwrap();
        assert_eq!(first.created, 2);

        // Same file again: nothing is newer
        let again = import_records(&svc, &records, false).unwrap();
        assert_eq!(again.skipped, 2);
        assert_eq!(again.created + again.replaced, 0);

        let newer = "date,steps,kcals,km,recorded_at\n2024-01-16,7000,400,5,2024-01-17T08:00:00Z\n";
        let records = parse_health_csv(newer.as_bytes(), import_time()).unwrap();
        let dry = import_records(&svc, &records, true).unwrap();
        assert_eq!(dry.replaced, 1);
        let summary = import_records(&svc, &records, false).unwrap();
        assert_eq!(summary.replaced, 1);
        assert_eq!(svc.get(d(16)).unwrap().unwrap().steps, 7000);
    }

    #[test]
    fn test_dry_run_matches_import_for_repeated_dates() {
        let csv = "\
date,steps,kcals,km,recorded_at
2024-01-01,5000,300,4,2024-01-01T10:00:00Z
2024-01-01,4000,250,3,2024-01-01T09:00:00Z
2024-01-02,1000,100,1,2024-01-02T09:00:00.0000004Z
2024-01-02,1100,110,1,2024-01-02T09:00:00.0000009Z
2024-01-03,2000,150,2,2024-01-03T08:00:00Z
2024-01-03,2500,180,2,2024-01-03T20:00:00Z
";
        let records = parse_health_csv(csv.as_bytes(), import_time()).unwrap();
        let svc = HealthService::new_in_memory().unwrap();

        let dry = import_records(&svc, &records, true).unwrap();
        assert_eq!(svc.count().unwrap(), 0);
        let real = import_records(&svc, &records, false).unwrap();

        assert_eq!(dry, real);
        assert_eq!(real.created, 3);
        assert_eq!(real.replaced, 1);
        assert_eq!(real.skipped, 2);
        assert_eq!(svc.get(d(3)).unwrap().unwrap().steps, 2500);
    }

    #[test]
    fn test_export_then_import_elsewhere() {
        let svc = HealthService::new_in_memory().unwrap();
        let records = parse_health_csv(SAMPLE_CSV.as_bytes(), import_time()).unwrap();
        import_records(&svc, &records, false).unwrap();

        let mut out = Vec::new();
        let rows = export_csv(&svc, &mut out).unwrap();
        assert_eq!(rows, 2);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("date,steps,kcals,km,flights_climbed,weight,recorded_at\n"));
        assert!(text.contains("2024-01-16,6500,380,4.9,,,"));

        let copy = HealthService::new_in_memory().unwrap();
        let parsed = parse_health_csv(text.as_bytes(), import_time()).unwrap();
        import_records(&copy, &parsed, false).unwrap();
        assert_eq!(copy.all_records().unwrap(), svc.all_records().unwrap());
    }
}
