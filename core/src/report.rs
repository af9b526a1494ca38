//! Daily progress report: one day's values against goals over a trailing
//! window, with the latest recorded weight.

use std::fmt::Write as _;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{HealthError, Result};
use crate::goals::{compute_goals, compute_today_vs_goal};
use crate::models::{GoalProgress, Goals, HealthRecord, MetricProgress};

const HEADER_DATE_FORMAT: &str = "%d %b, %Y";

#[derive(Debug, Clone, Serialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub window_days: i64,
    /// Records that fed the goals.
    pub rows: usize,
    /// The reported day, with kcals and km rounded for display.
    pub record: HealthRecord,
    pub goals: Goals,
    pub progress: GoalProgress,
    /// Most recent weight in the window, which need not be on `date`.
    pub latest_weight: Option<f64>,
}

/// Build the report for `date` from the records of its window. The day itself
/// must be among `records`.
pub fn build_daily_report(
    date: NaiveDate,
    window_days: i64,
    records: &[HealthRecord],
) -> Result<DailyReport> {
    let today = records
        .iter()
        .find(|r| r.date == date)
        .ok_or(HealthError::NotFound(date))?;

    let mut rounded = today.clone();
    rounded.kcals = rounded.kcals.round();
    rounded.km = (rounded.km * 100.0).round() / 100.0;

    let goals = compute_goals(records);
    let progress = compute_today_vs_goal(&rounded, &goals);
    let latest_weight = records
        .iter()
        .filter(|r| r.date <= date)
        .filter_map(|r| r.weight.map(|w| (r.date, w)))
        .max_by_key(|(d, _)| *d)
        .map(|(_, w)| w);

    Ok(DailyReport {
        date,
        window_days,
        rows: records.len(),
        record: rounded,
        goals,
        progress,
        latest_weight,
    })
}

fn metric_line(out: &mut String, label: &str, metric: &MetricProgress, value: &str) {
    let mark = if metric.reached { "✅" } else { "❌" };
    let _ = writeln!(
        out,
        "{mark} {label}: {} - {value}/{}",
        metric.percent_label(),
        metric.goal
    );
}

impl DailyReport {
    /// Plain-text rendering suitable for a chat message.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!("Health stats for {}\n", self.date.format(HEADER_DATE_FORMAT));
        let p = &self.progress;
        metric_line(&mut out, "Steps", &p.steps, &self.record.steps.to_string());
        metric_line(&mut out, "Kcals", &p.kcals, &format!("{:.0}", self.record.kcals));
        metric_line(&mut out, "Km", &p.km, &format!("{:.2}", self.record.km));
        metric_line(
            &mut out,
            "Flights",
            &p.flights_climbed,
            &self.record.flights_climbed.unwrap_or(0).to_string(),
        );
        match self.latest_weight {
            Some(w) => {
                let _ = write!(out, "Weight: {w}");
            }
            None => out.push_str("Weight: n/a"),
        }
        out
    }
}
