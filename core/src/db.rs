use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{Connection, Transaction, TransactionBehavior, params, params_from_iter};

use crate::models::{DATE_FORMAT, HealthRecord, format_timestamp, parse_timestamp};

const RECORD_COLUMNS: &str = "date, steps, kcals, km, flights_climbed, weight, recorded_at";

/// Durable store holding one health record per calendar date.
///
/// This layer writes unconditionally; recency arbitration lives in
/// [`HealthService`](crate::service::HealthService).
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS health_dumps (
                    date TEXT PRIMARY KEY,
                    steps INTEGER NOT NULL,
                    kcals REAL NOT NULL,
                    km REAL NOT NULL,
                    recorded_at TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
            tracing::debug!("health_dumps table initialized");
        }

        if version < 2 {
            // Databases written by older releases may already carry these
            // columns without having bumped user_version.
            for (column, sql_type) in [("flights_climbed", "INTEGER"), ("weight", "REAL")] {
                if !self.has_column("health_dumps", column)? {
                    self.conn.execute_batch(&format!(
                        "ALTER TABLE health_dumps ADD COLUMN {column} {sql_type};"
                    ))?;
                }
            }
            self.conn.execute_batch("PRAGMA user_version = 2;")?;
            tracing::debug!("health_dumps migrated to version 2");
        }

        Ok(())
    }

    fn has_column(&self, table: &str, column: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
            params![table, column],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Start an immediate (write-locking) transaction. Reads and writes made
    /// through `self` while it is alive belong to it; dropping it rolls back.
    pub fn begin_write(&self) -> Result<Transaction<'_>> {
        Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .context("Failed to begin transaction")
    }

    // --- Row mapping helpers ---

    // Expects columns in RECORD_COLUMNS order.
    fn record_from_row(row: &rusqlite::Row) -> rusqlite::Result<HealthRecord> {
        let date_str: String = row.get(0)?;
        let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
        let recorded_str: String = row.get(6)?;
        let recorded_at = parse_timestamp(&recorded_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                6,
                Type::Text,
                format!("invalid recorded_at '{recorded_str}'").into(),
            )
        })?;
        Ok(HealthRecord {
            date,
            steps: row.get(1)?,
            kcals: row.get(2)?,
            km: row.get(3)?,
            flights_climbed: row.get(4)?,
            weight: row.get(5)?,
            recorded_at,
        })
    }

    // --- Records ---

    pub fn get_record(&self, date: NaiveDate) -> Result<Option<HealthRecord>> {
        let date_str = date.format(DATE_FORMAT).to_string();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM health_dumps WHERE date = ?1"
        ))?;
        let mut rows = stmt.query(params![date_str])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::record_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    /// Records with `start <= date <= end`, most recent first. A `None` bound
    /// is unbounded on that side.
    pub fn get_range(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<HealthRecord>> {
        let mut sql = format!("SELECT {RECORD_COLUMNS} FROM health_dumps WHERE 1 = 1");
        let mut args: Vec<String> = Vec::new();
        if let Some(start) = start {
            sql.push_str(" AND date >= ?");
            args.push(start.format(DATE_FORMAT).to_string());
        }
        if let Some(end) = end {
            sql.push_str(" AND date <= ?");
            args.push(end.format(DATE_FORMAT).to_string());
        }
        sql.push_str(" ORDER BY date DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(args.iter()), Self::record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Every record, oldest first.
    pub fn get_all_records(&self) -> Result<Vec<HealthRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM health_dumps ORDER BY date ASC"
        ))?;
        let records = stmt
            .query_map([], Self::record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Insert or overwrite the record for `record.date` and return the new
    /// total row count.
    pub fn put_record(&self, record: &HealthRecord) -> Result<i64> {
        self.conn
            .execute(
                &format!(
                    "INSERT OR REPLACE INTO health_dumps ({RECORD_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                ),
                params![
                    record.date.format(DATE_FORMAT).to_string(),
                    record.steps,
                    record.kcals,
                    record.km,
                    record.flights_climbed,
                    record.weight,
                    format_timestamp(&record.recorded_at),
                ],
            )
            .with_context(|| format!("Failed to write record for {}", record.date))?;
        self.count_records()
    }

    pub fn count_records(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM health_dumps", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample_record(date: NaiveDate) -> HealthRecord {
        HealthRecord {
            date,
            steps: 7421,
            kcals: 388.25,
            km: 5.43,
            flights_climbed: Some(6),
            weight: Some(79.8),
            recorded_at: DateTime::parse_from_rfc3339("2024-01-01T21:15:30.250000+01:00")
                .unwrap(),
        }
    }

    #[test]
    fn test_put_and_get_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let record = sample_record(d(2024, 1, 1));
        assert_eq!(db.put_record(&record).unwrap(), 1);

        let loaded = db.get_record(d(2024, 1, 1)).unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_get_missing_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_record(d(2024, 1, 1)).unwrap().is_none());
    }

    #[test]
    fn test_put_overwrites_same_date() {
        let db = Database::open_in_memory().unwrap();
        let mut record = sample_record(d(2024, 1, 1));
        db.put_record(&record).unwrap();

        record.steps = 100;
        record.flights_climbed = None;
        assert_eq!(db.put_record(&record).unwrap(), 1);

        let loaded = db.get_record(d(2024, 1, 1)).unwrap().unwrap();
        assert_eq!(loaded.steps, 100);
        assert_eq!(loaded.flights_climbed, None);
    }

    #[test]
    fn test_range_descending_and_inclusive() {
        let db = Database::open_in_memory().unwrap();
        for day in 1..=5 {
            db.put_record(&sample_record(d(2024, 3, day))).unwrap();
        }

        let records = db
            .get_range(Some(d(2024, 3, 2)), Some(d(2024, 3, 4)))
            .unwrap();
        let dates: Vec<NaiveDate> = records.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![d(2024, 3, 4), d(2024, 3, 3), d(2024, 3, 2)]);
    }

    #[test]
    fn test_range_unbounded_sides() {
        let db = Database::open_in_memory().unwrap();
        for day in 1..=5 {
            db.put_record(&sample_record(d(2024, 3, day))).unwrap();
        }

        assert_eq!(db.get_range(None, None).unwrap().len(), 5);
        assert_eq!(db.get_range(Some(d(2024, 3, 4)), None).unwrap().len(), 2);
        let upto = db.get_range(None, Some(d(2024, 3, 2))).unwrap();
        assert_eq!(upto.len(), 2);
        assert_eq!(upto[0].date, d(2024, 3, 2));
    }

    #[test]
    fn test_single_day_range_at_most_one() {
        let db = Database::open_in_memory().unwrap();
        let day = d(2024, 3, 1);
        assert!(db.get_range(Some(day), Some(day)).unwrap().is_empty());
        db.put_record(&sample_record(day)).unwrap();
        db.put_record(&sample_record(day)).unwrap();
        assert_eq!(db.get_range(Some(day), Some(day)).unwrap().len(), 1);
    }

    #[test]
    fn test_get_all_records_ascending() {
        let db = Database::open_in_memory().unwrap();
        db.put_record(&sample_record(d(2024, 3, 2))).unwrap();
        db.put_record(&sample_record(d(2024, 3, 1))).unwrap();
        let all = db.get_all_records().unwrap();
        assert_eq!(all[0].date, d(2024, 3, 1));
        assert_eq!(all[1].date, d(2024, 3, 2));
    }

    #[test]
    fn test_reopen_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("health_dumps.db");
        {
            let db = Database::open(&path).unwrap();
            db.put_record(&sample_record(d(2024, 1, 1))).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.count_records().unwrap(), 1);
        let version: i64 = db
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 2);
    }

    #[test]
    fn test_migrates_legacy_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE health_dumps (
                    date TEXT PRIMARY KEY,
                    steps INTEGER NOT NULL,
                    kcals REAL NOT NULL,
                    km REAL NOT NULL,
                    recorded_at TEXT NOT NULL
                );
                INSERT INTO health_dumps VALUES
                    ('2023-12-31', 4000, 210.5, 3.1, '2023-12-31T22:10:05.123456');",
            )
            .unwrap();
        }

        let db = Database::open(&path).unwrap();
        let record = db.get_record(d(2023, 12, 31)).unwrap().unwrap();
        assert_eq!(record.steps, 4000);
        assert_eq!(record.flights_climbed, None);
        assert_eq!(record.weight, None);
        assert_eq!(
            record.recorded_at.naive_local().to_string(),
            "2023-12-31 22:10:05.123456"
        );
    }

    #[test]
    fn test_migration_tolerates_existing_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE health_dumps (
                    date TEXT PRIMARY KEY,
                    steps INTEGER NOT NULL,
                    kcals REAL NOT NULL,
                    km REAL NOT NULL,
                    flights_climbed INTEGER,
                    weight REAL,
                    recorded_at TEXT NOT NULL
                );",
            )
            .unwrap();
        }
        let db = Database::open(&path).unwrap();
        db.put_record(&sample_record(d(2024, 1, 1))).unwrap();
        assert_eq!(db.count_records().unwrap(), 1);
    }

    #[test]
    fn test_rolled_back_write_is_discarded() {
        let db = Database::open_in_memory().unwrap();
        {
            let _tx = db.begin_write().unwrap();
            db.put_record(&sample_record(d(2024, 1, 1))).unwrap();
        }
        assert_eq!(db.count_records().unwrap(), 0);
    }
}
