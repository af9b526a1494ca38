use std::path::Path;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, SubsecRound, TimeDelta};

use crate::db::Database;
use crate::error::{HealthError, Result};
use crate::goals::compute_goals;
use crate::input::DumpPayload;
use crate::models::{
    Goals, HealthRecord, HealthRecordUpdate, UpsertOutcome, WriteStatus, format_timestamp, now,
};
use crate::query::DateQuery;
use crate::report::{DailyReport, build_daily_report};

pub const DEFAULT_GOAL_WINDOW_DAYS: i64 = 365;

/// First day of a `days`-long window ending at `end`. `None` when the window
/// reaches past the earliest representable date, meaning no lower bound.
fn window_start(end: NaiveDate, days: i64) -> Result<Option<NaiveDate>> {
    if days < 0 {
        return Err(HealthError::validation(
            "last_n_days",
            format!("{days} is negative"),
        ));
    }
    Ok(TimeDelta::try_days(days).and_then(|span| end.checked_sub_signed(span)))
}

/// Reconciles incoming health records against the store and reads them back
/// for reporting.
pub struct HealthService {
    db: Database,
}

impl HealthService {
    pub fn new(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path).map_err(|e| {
            HealthError::storage(format!("failed to open {}", db_path.display()), e)
        })?;
        Ok(Self { db })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()
            .map_err(|e| HealthError::storage("failed to open in-memory database", e))?;
        Ok(Self { db })
    }

    #[must_use]
    pub fn from_database(db: Database) -> Self {
        Self { db }
    }

    // --- Writes ---

    /// Store `candidate` unless the date already holds a record captured at
    /// the same time or later. A skipped candidate is not an error; the
    /// outcome then carries the record that was kept.
    pub fn upsert(&self, candidate: &HealthRecord) -> Result<UpsertOutcome> {
        candidate.validate()?;
        // Compare at the precision the store keeps.
        let mut candidate = candidate.clone();
        candidate.recorded_at = candidate.recorded_at.trunc_subsecs(6);
        self.reconcile(&candidate).map_err(|e| {
            let cause = format!("{e:#}");
            tracing::error!(
                date = %candidate.date,
                candidate = ?candidate,
                error = %cause,
                "failed to upsert health dump"
            );
            HealthError::storage(format!("upsert failed for {}", candidate.date), e)
        })
    }

    fn reconcile(&self, candidate: &HealthRecord) -> anyhow::Result<UpsertOutcome> {
        let tx = self.db.begin_write()?;
        let existing = self.db.get_record(candidate.date)?;

        let (record, status, row_count) = match existing {
            Some(existing) if candidate.recorded_at <= existing.recorded_at => {
                tracing::info!(
                    date = %candidate.date,
                    stored_at = %format_timestamp(&existing.recorded_at),
                    incoming_at = %format_timestamp(&candidate.recorded_at),
                    "skipping older health dump"
                );
                let row_count = self.db.count_records()?;
                (existing, WriteStatus::Skipped, row_count)
            }
            Some(_) => (
                candidate.clone(),
                WriteStatus::Replaced,
                self.db.put_record(candidate)?,
            ),
            None => (
                candidate.clone(),
                WriteStatus::Created,
                self.db.put_record(candidate)?,
            ),
        };

        tx.commit()?;

        if status != WriteStatus::Skipped {
            tracing::debug!(date = %record.date, ?status, row_count, "upserted health dump");
        }
        Ok(UpsertOutcome {
            record,
            status,
            row_count,
        })
    }

    /// Ingest a device dump for the current local day.
    pub fn ingest(&self, payload: DumpPayload) -> Result<UpsertOutcome> {
        self.ingest_at(payload, now())
    }

    /// Ingest a device dump captured at `recorded_at`; the record describes the
    /// calendar day of that timestamp.
    pub fn ingest_at(
        &self,
        payload: DumpPayload,
        recorded_at: DateTime<FixedOffset>,
    ) -> Result<UpsertOutcome> {
        let record = payload.into_record(recorded_at.date_naive(), recorded_at)?;
        let outcome = self.upsert(&record)?;
        tracing::info!(
            date = %outcome.record.date,
            status = ?outcome.status,
            row_count = outcome.row_count,
            "saved health dump"
        );
        Ok(outcome)
    }

    /// Apply a sparse update to the record stored for `date`. The edit is a new
    /// observation stamped with the current time.
    pub fn edit(&self, date: NaiveDate, update: &HealthRecordUpdate) -> Result<UpsertOutcome> {
        self.edit_at(date, update, now())
    }

    pub fn edit_at(
        &self,
        date: NaiveDate,
        update: &HealthRecordUpdate,
        recorded_at: DateTime<FixedOffset>,
    ) -> Result<UpsertOutcome> {
        let existing = self.get(date)?.ok_or(HealthError::NotFound(date))?;
        let candidate = update.apply(&existing, recorded_at)?;
        let outcome = self.upsert(&candidate)?;
        tracing::info!(%date, status = ?outcome.status, "updated health record");
        Ok(outcome)
    }

    // --- Reads ---

    pub fn get(&self, date: NaiveDate) -> Result<Option<HealthRecord>> {
        self.db
            .get_record(date)
            .map_err(|e| HealthError::storage(format!("failed to read record for {date}"), e))
    }

    /// Records matching `query`, most recent first.
    pub fn query(&self, query: &DateQuery) -> Result<Vec<HealthRecord>> {
        self.query_at(query, Local::now().date_naive())
    }

    pub fn query_at(&self, query: &DateQuery, today: NaiveDate) -> Result<Vec<HealthRecord>> {
        let (start, end) = query.bounds(today);
        self.range(start, end)
    }

    pub fn range(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<HealthRecord>> {
        self.db
            .get_range(start, end)
            .map_err(|e| HealthError::storage("failed to read records", e))
    }

    pub fn all_records(&self) -> Result<Vec<HealthRecord>> {
        self.db
            .get_all_records()
            .map_err(|e| HealthError::storage("failed to read records", e))
    }

    pub fn count(&self) -> Result<i64> {
        self.db
            .count_records()
            .map_err(|e| HealthError::storage("failed to count records", e))
    }

    // --- Goals ---

    /// Goals over the `last_n_days` days up to and including today.
    pub fn goals(&self, last_n_days: i64) -> Result<Goals> {
        self.goals_at(Local::now().date_naive(), last_n_days)
    }

    pub fn goals_at(&self, today: NaiveDate, last_n_days: i64) -> Result<Goals> {
        let start = window_start(today, last_n_days)?;
        let records = self.range(start, Some(today))?;
        let goals = compute_goals(&records);
        tracing::info!(
            last_n_days,
            rows = records.len(),
            ?goals,
            "computed goals"
        );
        Ok(goals)
    }

    /// Progress report for `date` against goals over the preceding
    /// `window_days` days.
    pub fn daily_report(&self, date: NaiveDate, window_days: i64) -> Result<DailyReport> {
        let start = window_start(date, window_days)?;
        let records = self.range(start, Some(date))?;
        build_daily_report(date, window_days, &records)
    }
}
