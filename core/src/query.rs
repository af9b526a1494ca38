use chrono::NaiveDate;

use crate::error::{HealthError, Result};
use crate::models::parse_date;

/// Which days to read back. Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateQuery {
    Range {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
    Single(NaiveDate),
    /// The current local calendar date, resolved at query time.
    Today,
}

impl DateQuery {
    #[must_use]
    pub fn all() -> Self {
        Self::Range {
            start: None,
            end: None,
        }
    }

    /// Build a query from the `date`, `date_start` and `date_end` request
    /// parameters. `date` takes precedence and accepts `today`.
    pub fn from_params(
        date: Option<&str>,
        date_start: Option<&str>,
        date_end: Option<&str>,
    ) -> Result<Self> {
        if let Some(d) = date.map(str::trim).filter(|d| !d.is_empty()) {
            if d.eq_ignore_ascii_case("today") {
                return Ok(Self::Today);
            }
            return Ok(Self::Single(parse_date(d)?));
        }

        let start = date_start
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_date(s).map_err(|_| bound_error("date_start", s)))
            .transpose()?;
        let end = date_end
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_date(s).map_err(|_| bound_error("date_end", s)))
            .transpose()?;
        Ok(Self::Range { start, end })
    }

    /// Resolve to `(start, end)` bounds against `today`.
    #[must_use]
    pub fn bounds(&self, today: NaiveDate) -> (Option<NaiveDate>, Option<NaiveDate>) {
        match *self {
            Self::Range { start, end } => (start, end),
            Self::Single(d) => (Some(d), Some(d)),
            Self::Today => (Some(today), Some(today)),
        }
    }
}

fn bound_error(field: &'static str, value: &str) -> HealthError {
    HealthError::validation(field, format!("'{value}' is not a date, use YYYY-MM-DD"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_date_shortcut_wins() {
        let q = DateQuery::from_params(Some("2024-01-12"), Some("2023-01-01"), None).unwrap();
        assert_eq!(q, DateQuery::Single(d(2024, 1, 12)));
    }

    #[test]
    fn test_today_shortcut() {
        let q = DateQuery::from_params(Some("Today"), None, None).unwrap();
        assert_eq!(q, DateQuery::Today);
        let today = d(2024, 6, 1);
        assert_eq!(q.bounds(today), (Some(today), Some(today)));
    }

    #[test]
    fn test_open_ended_range() {
        let q = DateQuery::from_params(None, Some("2024-01-01"), None).unwrap();
        assert_eq!(q.bounds(d(2030, 1, 1)), (Some(d(2024, 1, 1)), None));

        let q = DateQuery::from_params(None, None, None).unwrap();
        assert_eq!(q, DateQuery::all());
    }

    #[test]
    fn test_invalid_bound_names_parameter() {
        let err = DateQuery::from_params(None, None, Some("soon")).unwrap_err();
        assert!(matches!(
            err,
            HealthError::Validation {
                field: "date_end",
                ..
            }
        ));
        assert!(DateQuery::from_params(Some("yesterday"), None, None).is_err());
    }
}
