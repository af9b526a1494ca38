use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{HealthError, Result};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One day's health measurements.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthRecord {
    pub date: NaiveDate,
    pub steps: i64,
    pub kcals: f64,
    pub km: f64,
    pub flights_climbed: Option<i64>,
    pub weight: Option<f64>,
    /// When the values were captured, not the day they describe.
    pub recorded_at: DateTime<FixedOffset>,
}

impl HealthRecord {
    /// Range checks shared by every write path.
    pub fn validate(&self) -> Result<()> {
        if self.steps < 0 {
            return Err(HealthError::validation("steps", "must not be negative"));
        }
        if !self.kcals.is_finite() || self.kcals < 0.0 {
            return Err(HealthError::validation(
                "kcals",
                "must be a non-negative number",
            ));
        }
        if !self.km.is_finite() || self.km < 0.0 {
            return Err(HealthError::validation("km", "must be a non-negative number"));
        }
        if self.flights_climbed.is_some_and(|f| f < 0) {
            return Err(HealthError::validation(
                "flights_climbed",
                "must not be negative",
            ));
        }
        if self.weight.is_some_and(|w| !w.is_finite() || w <= 0.0) {
            return Err(HealthError::validation("weight", "must be greater than 0"));
        }
        Ok(())
    }
}

/// A single field of a sparse update.
///
/// A missing JSON key deserializes to `Unchanged` (via `#[serde(default)]`),
/// an explicit `null` to `Clear` and anything else to `Set`.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Patch<T> {
    #[default]
    Unchanged,
    Set(T),
    Clear,
}

impl<T: Clone> Patch<T> {
    fn resolve(&self, current: Option<T>) -> Option<T> {
        match self {
            Self::Unchanged => current,
            Self::Set(v) => Some(v.clone()),
            Self::Clear => None,
        }
    }

    fn resolve_required(&self, field: &'static str, current: T) -> Result<T> {
        match self {
            Self::Unchanged => Ok(current),
            Self::Set(v) => Ok(v.clone()),
            Self::Clear => Err(HealthError::validation(
                field,
                "is required and cannot be cleared",
            )),
        }
    }

    /// Convert the carried value, keeping the three-way tag.
    pub fn try_map<U, E>(
        self,
        f: impl FnOnce(T) -> std::result::Result<U, E>,
    ) -> std::result::Result<Patch<U>, E> {
        Ok(match self {
            Self::Unchanged => Patch::Unchanged,
            Self::Set(v) => Patch::Set(f(v)?),
            Self::Clear => Patch::Clear,
        })
    }

    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(|v| v.map_or(Patch::Clear, Patch::Set))
    }
}

/// Field-level overrides for an existing record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthRecordUpdate {
    pub steps: Patch<i64>,
    pub kcals: Patch<f64>,
    pub km: Patch<f64>,
    pub flights_climbed: Patch<i64>,
    pub weight: Patch<f64>,
}

impl HealthRecordUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_unchanged()
            && self.kcals.is_unchanged()
            && self.km.is_unchanged()
            && self.flights_climbed.is_unchanged()
            && self.weight.is_unchanged()
    }

    /// Build a full candidate from `existing`, taking each field from the
    /// override when one is present.
    pub fn apply(
        &self,
        existing: &HealthRecord,
        recorded_at: DateTime<FixedOffset>,
    ) -> Result<HealthRecord> {
        Ok(HealthRecord {
            date: existing.date,
            steps: self.steps.resolve_required("steps", existing.steps)?,
            kcals: self.kcals.resolve_required("kcals", existing.kcals)?,
            km: self.km.resolve_required("km", existing.km)?,
            flights_climbed: self.flights_climbed.resolve(existing.flights_climbed),
            weight: self.weight.resolve(existing.weight),
            recorded_at,
        })
    }
}

/// What `upsert` did with a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteStatus {
    Created,
    Replaced,
    /// The candidate was not newer than the stored record.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpsertOutcome {
    /// The record stored for the date after reconciliation.
    pub record: HealthRecord,
    pub status: WriteStatus,
    pub row_count: i64,
}

/// Rolling-average targets, rounded up per metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Goals {
    pub steps: i64,
    pub kcals: i64,
    pub km: i64,
    pub flights_climbed: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricProgress {
    pub value: f64,
    pub goal: i64,
    /// `None` when the goal is zero.
    pub ratio: Option<f64>,
    pub reached: bool,
}

impl MetricProgress {
    #[must_use]
    pub fn percent_label(&self) -> String {
        match self.ratio {
            Some(r) => format!("{:.0}%", r * 100.0),
            None => "n/a".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GoalProgress {
    pub steps: MetricProgress,
    pub kcals: MetricProgress,
    pub km: MetricProgress,
    pub flights_climbed: MetricProgress,
}

// --- Timestamps ---

#[must_use]
pub fn now() -> DateTime<FixedOffset> {
    Local::now().into()
}

#[must_use]
pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Parse an RFC 3339 timestamp, falling back to an offset-less ISO timestamp
/// interpreted as local time.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts);
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(DateTime::<FixedOffset>::from)
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    // Only the zero-padded form is accepted; chrono alone would take "2024-1-5".
    if s.len() != 10 {
        return Err(HealthError::validation(
            "date",
            format!("'{s}' is not a date, use YYYY-MM-DD"),
        ));
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| {
        HealthError::validation("date", format!("'{s}' is not a date, use YYYY-MM-DD"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn sample_record() -> HealthRecord {
        HealthRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            steps: 8000,
            kcals: 450.5,
            km: 6.2,
            flights_climbed: Some(12),
            weight: Some(81.3),
            recorded_at: ts("2024-01-01T21:00:00+01:00"),
        }
    }

    #[derive(Deserialize)]
    struct Body {
        #[serde(default)]
        flights_climbed: Patch<i64>,
    }

    #[test]
    fn test_patch_missing_key_is_unchanged() {
        let body: Body = serde_json::from_str("{}").unwrap();
        assert_eq!(body.flights_climbed, Patch::Unchanged);
    }

    #[test]
    fn test_patch_null_is_clear() {
        let body: Body = serde_json::from_str(r#"{"flights_climbed": null}"#).unwrap();
        assert_eq!(body.flights_climbed, Patch::Clear);
    }

    #[test]
    fn test_patch_value_is_set() {
        let body: Body = serde_json::from_str(r#"{"flights_climbed": 7}"#).unwrap();
        assert_eq!(body.flights_climbed, Patch::Set(7));
    }

    #[test]
    fn test_apply_keeps_unnamed_fields() {
        let existing = sample_record();
        let update = HealthRecordUpdate {
            steps: Patch::Set(9000),
            ..Default::default()
        };
        let later = ts("2024-01-02T08:00:00+01:00");
        let merged = update.apply(&existing, later).unwrap();
        assert_eq!(merged.steps, 9000);
        assert!((merged.kcals - 450.5).abs() < f64::EPSILON);
        assert!((merged.km - 6.2).abs() < f64::EPSILON);
        assert_eq!(merged.flights_climbed, Some(12));
        assert_eq!(merged.weight, Some(81.3));
        assert_eq!(merged.recorded_at, later);
    }

    #[test]
    fn test_apply_clears_optional_fields() {
        let existing = sample_record();
        let update = HealthRecordUpdate {
            weight: Patch::Clear,
            ..Default::default()
        };
        let merged = update.apply(&existing, existing.recorded_at).unwrap();
        assert_eq!(merged.weight, None);
        assert_eq!(merged.flights_climbed, Some(12));
    }

    #[test]
    fn test_apply_rejects_clearing_required_field() {
        let existing = sample_record();
        let update = HealthRecordUpdate {
            km: Patch::Clear,
            ..Default::default()
        };
        let err = update.apply(&existing, existing.recorded_at).unwrap_err();
        assert!(matches!(err, HealthError::Validation { field: "km", .. }));
    }

    #[test]
    fn test_update_is_empty() {
        assert!(HealthRecordUpdate::default().is_empty());
        let update = HealthRecordUpdate {
            flights_climbed: Patch::Clear,
            ..Default::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn test_validate_ranges() {
        assert!(sample_record().validate().is_ok());

        let mut r = sample_record();
        r.steps = -1;
        assert!(r.validate().is_err());

        let mut r = sample_record();
        r.weight = Some(0.0);
        assert!(r.validate().is_err());

        let mut r = sample_record();
        r.kcals = f64::NAN;
        assert!(r.validate().is_err());

        let mut r = sample_record();
        r.flights_climbed = None;
        r.weight = None;
        assert!(r.validate().is_ok());
    }

    #[test]
    fn test_timestamp_roundtrip_keeps_micros() {
        let original = ts("2024-03-05T07:08:09.123456+02:00");
        let parsed = parse_timestamp(&format_timestamp(&original)).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_parse_timestamp_without_offset() {
        let parsed = parse_timestamp("2024-03-05T07:08:09.5").unwrap();
        let naive = parsed.naive_local();
        assert_eq!(naive.to_string(), "2024-03-05 07:08:09.500");
        assert!(parse_timestamp("2024-03-05 07:08:09").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2024-02-29").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert!(parse_date("2023-02-29").is_err());
        assert!(parse_date("2024-1-5").is_err());
        assert!(parse_date("01/05/2024").is_err());
    }

    #[test]
    fn test_percent_label() {
        let p = MetricProgress {
            value: 850.0,
            goal: 1000,
            ratio: Some(0.85),
            reached: false,
        };
        assert_eq!(p.percent_label(), "85%");
        let p = MetricProgress {
            value: 3.0,
            goal: 0,
            ratio: None,
            reached: false,
        };
        assert_eq!(p.percent_label(), "n/a");
    }
}
