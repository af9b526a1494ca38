//! Coercion of loosely-typed payloads into health records.
//!
//! Devices send numbers either as JSON numbers or as strings, and weight may
//! use a comma as decimal separator. Everything here returns
//! [`HealthError::Validation`] naming the offending field.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{HealthError, Result};
use crate::models::{HealthRecord, HealthRecordUpdate, Patch};

/// Full-record payload posted by the ingesting device.
#[derive(Debug, Clone, Deserialize)]
pub struct DumpPayload {
    pub steps: Option<Value>,
    pub kcals: Option<Value>,
    pub km: Option<Value>,
    #[serde(default)]
    pub flights_climbed: Option<Value>,
    #[serde(default)]
    pub weight: Option<Value>,
}

impl DumpPayload {
    pub fn into_record(
        self,
        date: NaiveDate,
        recorded_at: DateTime<FixedOffset>,
    ) -> Result<HealthRecord> {
        let steps = required("steps", self.steps)?;
        let kcals = required("kcals", self.kcals)?;
        let km = required("km", self.km)?;

        let flights_climbed = match self.flights_climbed {
            None | Some(Value::Null) => None,
            Some(v) => Some(parse_int("flights_climbed", &v)?),
        };
        let weight = match self.weight {
            None => None,
            Some(v) => parse_weight(&v)?,
        };

        let record = HealthRecord {
            date,
            steps: parse_int("steps", &steps)?,
            kcals: parse_real("kcals", &kcals)?,
            km: parse_real("km", &km)?,
            flights_climbed,
            weight,
            recorded_at,
        };
        record.validate()?;
        Ok(record)
    }
}

fn required(field: &'static str, value: Option<Value>) -> Result<Value> {
    match value {
        None | Some(Value::Null) => Err(HealthError::validation(
            field,
            "missing required field",
        )),
        Some(v) => Ok(v),
    }
}

/// Sparse edit payload: an absent key keeps the stored value, `null` clears it.
#[derive(Debug, Clone, Deserialize)]
pub struct EditPayload {
    #[serde(default)]
    pub steps: Patch<Value>,
    #[serde(default)]
    pub kcals: Patch<Value>,
    #[serde(default)]
    pub km: Patch<Value>,
    #[serde(default)]
    pub flights_climbed: Patch<Value>,
    #[serde(default)]
    pub weight: Patch<Value>,
}

impl EditPayload {
    pub fn into_update(self) -> Result<HealthRecordUpdate> {
        let weight = match self.weight {
            Patch::Set(v) => match parse_weight(&v)? {
                Some(w) => Patch::Set(w),
                None => Patch::Clear,
            },
            Patch::Clear => Patch::Clear,
            Patch::Unchanged => Patch::Unchanged,
        };

        let update = HealthRecordUpdate {
            steps: self.steps.try_map(|v| parse_int("steps", &v))?,
            kcals: self.kcals.try_map(|v| parse_real("kcals", &v))?,
            km: self.km.try_map(|v| parse_real("km", &v))?,
            flights_climbed: self
                .flights_climbed
                .try_map(|v| parse_int("flights_climbed", &v))?,
            weight,
        };

        if let Patch::Set(w) = update.weight {
            if w <= 0.0 {
                return Err(HealthError::validation("weight", "must be greater than 0"));
            }
        }
        Ok(update)
    }
}

// --- Scalar coercion ---

/// Accepts JSON integers, integral floats and integer strings.
pub fn parse_int(field: &'static str, value: &Value) -> Result<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            match n.as_f64() {
                #[allow(clippy::cast_precision_loss)]
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
                _ => Err(HealthError::validation(
                    field,
                    format!("{n} is not an integer"),
                )),
            }
        }
        Value::String(s) => int_from_str(field, s),
        other => Err(HealthError::validation(
            field,
            format!("expected an integer, got {other}"),
        )),
    }
}

pub fn parse_real(field: &'static str, value: &Value) -> Result<f64> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| HealthError::validation(field, format!("{n} is not a number"))),
        Value::String(s) => real_from_str(field, s),
        other => Err(HealthError::validation(
            field,
            format!("expected a number, got {other}"),
        )),
    }
}

/// `null` and the empty string mean "no weight".
pub fn parse_weight(value: &Value) -> Result<Option<f64>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => weight_from_str(s),
        other => parse_real("weight", other).map(Some),
    }
}

pub fn int_from_str(field: &'static str, s: &str) -> Result<i64> {
    let s = s.trim();
    s.parse::<i64>()
        .map_err(|_| HealthError::validation(field, format!("'{s}' is not an integer")))
}

pub fn real_from_str(field: &'static str, s: &str) -> Result<f64> {
    let s = s.trim();
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() => Ok(f),
        _ => Err(HealthError::validation(
            field,
            format!("'{s}' is not a number"),
        )),
    }
}

pub fn weight_from_str(s: &str) -> Result<Option<f64>> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    real_from_str("weight", &s.replace(',', ".")).map(Some)
}
