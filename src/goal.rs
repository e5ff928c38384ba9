//! Goal tracking and projection
//!
//! Fits a least-squares line to the weigh-ins of the lookback window and
//! extrapolates the day the trend reaches the target weight.

use crate::types::{DailyRecord, GoalStatus, GoalSummary, Metric};
use crate::window::{difference, least_squares_slope};
use chrono::{Days, NaiveDate};

/// Projections further out than this are reported as unreachable
pub const MAX_PROJECTION_DAYS: f64 = 3650.0;

/// Inputs for goal computation
#[derive(Debug, Clone, Copy)]
pub struct GoalInputs<'a> {
    /// Every record, oldest first
    pub records: &'a [DailyRecord],
    /// Records of the current lookback window
    pub window: &'a [DailyRecord],
    /// Current weight (latest weigh-in within the window)
    pub current: Option<f64>,
    pub target: f64,
    /// Overrides the first recorded weight as the starting point
    pub start_override: Option<f64>,
}

/// Compute goal progress and projected arrival date
pub fn summarize_goal(inputs: GoalInputs<'_>) -> GoalSummary {
    let start_weight = inputs
        .start_override
        .or_else(|| inputs.records.iter().find_map(|r| r.weight_kg));
    let current = inputs.current;
    let target = inputs.target;

    let slope_per_day = window_slope(inputs.window);
    let (status, projected_date) = project(
        current,
        start_weight,
        target,
        slope_per_day,
        inputs.window.last().map(|r| r.date),
    );

    GoalSummary {
        target_weight: target,
        start_weight,
        remaining: current.map(|c| c - target),
        change_since_start: difference(current, start_weight),
        progress_percent: progress_percent(start_weight, current, target),
        slope_per_day,
        projected_date,
        status,
    }
}

/// Weight slope (kg/day) over the window's weigh-ins
fn window_slope(window: &[DailyRecord]) -> Option<f64> {
    let first = window.first()?.date;
    let points: Vec<(f64, f64)> = window
        .iter()
        .filter_map(|r| {
            Metric::Weight
                .value(r)
                .map(|w| ((r.date - first).num_days() as f64, w))
        })
        .collect();
    least_squares_slope(&points)
}

fn project(
    current: Option<f64>,
    start: Option<f64>,
    target: f64,
    slope: Option<f64>,
    anchor: Option<NaiveDate>,
) -> (GoalStatus, Option<NaiveDate>) {
    let (Some(current), Some(anchor)) = (current, anchor) else {
        return (GoalStatus::InsufficientData, None);
    };

    // Change still required to hit the target
    let needed = target - current;
    let direction = match start {
        Some(start) if start != target => target - start,
        _ => needed,
    };
    if needed == 0.0 || needed.signum() != direction.signum() {
        return (GoalStatus::Reached, None);
    }

    let Some(slope) = slope else {
        return (GoalStatus::InsufficientData, None);
    };
    if slope == 0.0 || slope.signum() != needed.signum() {
        return (GoalStatus::Unreachable, None);
    }

    let days = (needed / slope).ceil();
    if !days.is_finite() || days > MAX_PROJECTION_DAYS {
        return (GoalStatus::Unreachable, None);
    }

    match anchor.checked_add_days(Days::new(days as u64)) {
        Some(date) => (GoalStatus::Projected, Some(date)),
        None => (GoalStatus::Unreachable, None),
    }
}

/// Share of the start→target distance already covered, clamped to 0-100
fn progress_percent(start: Option<f64>, current: Option<f64>, target: f64) -> Option<f64> {
    let (start, current) = (start?, current?);
    let total = start - target;
    if total == 0.0 {
        return None;
    }
    Some(((start - current) / total * 100.0).clamp(0.0, 100.0))
}
