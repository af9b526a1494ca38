//! Rolling-average goals and today-vs-goal progress.

use crate::models::{GoalProgress, Goals, HealthRecord, MetricProgress};

const STEPS_GRANULARITY: i64 = 1000;
const KCALS_GRANULARITY: i64 = 100;
const KM_GRANULARITY: i64 = 1;
const FLIGHTS_GRANULARITY: i64 = 1;

/// Round `value` up to the next multiple of `nearest`.
///
/// Averages at or below zero give a zero goal.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn round_up_to_nearest(value: f64, nearest: i64) -> i64 {
    if value <= 0.0 || !value.is_finite() {
        return 0;
    }
    let nearest_f = nearest as f64;
    ((value / nearest_f).ceil() * nearest_f) as i64
}

/// Goals over `records`: steps, kcals and km average over every record,
/// flights only over the records that have a value.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute_goals(records: &[HealthRecord]) -> Goals {
    if records.is_empty() {
        return Goals::default();
    }

    let n = records.len() as f64;
    let steps_avg = records.iter().map(|r| r.steps as f64).sum::<f64>() / n;
    let kcals_avg = records.iter().map(|r| r.kcals).sum::<f64>() / n;
    let km_avg = records.iter().map(|r| r.km).sum::<f64>() / n;

    let flights: Vec<f64> = records
        .iter()
        .filter_map(|r| r.flights_climbed)
        .map(|f| f as f64)
        .collect();
    let flights_avg = if flights.is_empty() {
        0.0
    } else {
        flights.iter().sum::<f64>() / flights.len() as f64
    };

    Goals {
        steps: round_up_to_nearest(steps_avg, STEPS_GRANULARITY),
        kcals: round_up_to_nearest(kcals_avg, KCALS_GRANULARITY),
        km: round_up_to_nearest(km_avg, KM_GRANULARITY),
        flights_climbed: round_up_to_nearest(flights_avg, FLIGHTS_GRANULARITY),
    }
}

#[allow(clippy::cast_precision_loss)]
fn progress(value: f64, goal: i64) -> MetricProgress {
    if goal == 0 {
        return MetricProgress {
            value,
            goal,
            ratio: None,
            reached: false,
        };
    }
    let ratio = value / goal as f64;
    MetricProgress {
        value,
        goal,
        ratio: Some(ratio),
        reached: ratio >= 1.0,
    }
}

/// Compare one day against the goals. A zero goal yields no ratio and is
/// never reached. A day without flights counts as zero flights.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute_today_vs_goal(today: &HealthRecord, goals: &Goals) -> GoalProgress {
    GoalProgress {
        steps: progress(today.steps as f64, goals.steps),
        kcals: progress(today.kcals, goals.kcals),
        km: progress(today.km, goals.km),
        flights_climbed: progress(
            today.flights_climbed.unwrap_or(0) as f64,
            goals.flights_climbed,
        ),
    }
}
