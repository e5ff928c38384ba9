//! Rolling window statistics
//!
//! Windows are calendar-day spans anchored at the latest record. Only present
//! values contribute; an empty window yields `None`, never a division by zero.

use crate::types::{DailyRecord, FieldSummary, Metric};
use chrono::{Days, NaiveDate};

/// Default lookback window in days
pub const DEFAULT_LOOKBACK_DAYS: usize = 7;

/// Longest accepted lookback window (ten years)
pub const MAX_LOOKBACK_DAYS: usize = 3650;

/// The current lookback window and the equally sized window before it
#[derive(Debug, Clone, Copy)]
pub struct WindowPair<'a> {
    /// Records within the `days` days ending at the latest record
    pub current: &'a [DailyRecord],
    /// Records within the `days` days before `current` (non-overlapping)
    pub prior: &'a [DailyRecord],
}

impl<'a> WindowPair<'a> {
    /// Split chronologically ordered records into current and prior windows
    pub fn split(records: &'a [DailyRecord], days: usize) -> Self {
        let Some(latest) = records.last() else {
            return Self {
                current: &[],
                prior: &[],
            };
        };

        let days = days.max(1) as u64;
        let current_start = days_before(latest.date, days - 1);
        let prior_start = days_before(latest.date, days.saturating_mul(2).saturating_sub(1));

        let current_idx = records.partition_point(|r| r.date < current_start);
        let prior_idx = records.partition_point(|r| r.date < prior_start);

        Self {
            current: &records[current_idx..],
            prior: &records[prior_idx..current_idx],
        }
    }

    /// Rolling statistics for one metric
    pub fn summarize(&self, metric: Metric) -> FieldSummary {
        let average = mean(present_values(self.current, metric));
        let prior_average = mean(present_values(self.prior, metric));

        FieldSummary {
            current: latest_value(self.current, metric),
            average,
            prior_average,
            delta: difference(average, prior_average),
            samples: present_values(self.current, metric).count(),
        }
    }
}

fn days_before(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_sub_days(Days::new(days))
        .unwrap_or(NaiveDate::MIN)
}

/// Present values of a metric, in record order
pub fn present_values(
    records: &[DailyRecord],
    metric: Metric,
) -> impl Iterator<Item = f64> + '_ {
    records.iter().filter_map(move |r| metric.value(r))
}

/// Most recent present value of a metric
pub fn latest_value(records: &[DailyRecord], metric: Metric) -> Option<f64> {
    records.iter().rev().find_map(|r| metric.value(r))
}

/// Arithmetic mean; `None` for an empty input
pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        return None;
    }
    Some(sum / count as f64)
}

/// `current - previous` when both are present
pub fn difference(current: Option<f64>, previous: Option<f64>) -> Option<f64> {
    match (current, previous) {
        (Some(curr), Some(prev)) => Some(curr - prev),
        _ => None,
    }
}

/// Ordinary least-squares slope of y over x.
///
/// Returns `None` with fewer than two points or when every x is identical.
pub fn least_squares_slope(points: &[(f64, f64)]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (covariance, variance) = points.iter().fold((0.0, 0.0), |(cov, var), (x, y)| {
        let dx = x - mean_x;
        (cov + dx * (y - mean_y), var + dx * dx)
    });

    if variance == 0.0 {
        return None;
    }
    Some(covariance / variance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_huge_window_does_not_overflow() {
        let records = vec![DailyRecord {
            weight_kg: Some(80.0),
            ..DailyRecord::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        }];

        let windows = WindowPair::split(&records, usize::MAX);
        assert_eq!(windows.current.len(), 1);
        assert!(windows.prior.is_empty());
        assert_eq!(windows.summarize(Metric::Weight).average, Some(80.0));
    }

    fn weights(start_day: u32, values: &[Option<f64>]) -> Vec<DailyRecord> {
        values
            .iter()
            .enumerate()
            .map(|(i, w)| DailyRecord {
                weight_kg: *w,
                ..DailyRecord::new(NaiveDate::from_ymd_opt(2024, 3, start_day + i as u32).unwrap())
            })
            .collect()
    }

    #[test]
    fn test_seven_day_example() {
        let records = weights(
            1,
            &[80.0, 79.8, 79.5, 79.3, 79.0, 78.8, 78.5].map(Some),
        );

        let summary = WindowPair::split(&records, 7).summarize(Metric::Weight);

        assert_eq!(summary.current, Some(78.5));
        assert!((summary.average.unwrap() - 79.2714).abs() < 0.001);
        assert_eq!(summary.prior_average, None);
        assert_eq!(summary.delta, None);
        assert_eq!(summary.samples, 7);
    }

    #[test]
    fn test_windows_do_not_overlap() {
        // 14 days: first week at 82, second week at 80
        let mut values = vec![Some(82.0); 7];
        values.extend(vec![Some(80.0); 7]);
        let records = weights(1, &values);

        let pair = WindowPair::split(&records, 7);
        assert_eq!(pair.current.len(), 7);
        assert_eq!(pair.prior.len(), 7);

        let summary = pair.summarize(Metric::Weight);
        assert_eq!(summary.average, Some(80.0));
        assert_eq!(summary.prior_average, Some(82.0));
        assert_eq!(summary.delta, Some(-2.0));
    }

    #[test]
    fn test_window_with_no_present_values_is_absent() {
        let records = weights(1, &[None, None, None]);
        let summary = WindowPair::split(&records, 7).summarize(Metric::Weight);

        assert_eq!(summary.current, None);
        assert_eq!(summary.average, None);
        assert_eq!(summary.samples, 0);
    }

    #[test]
    fn test_absent_values_are_skipped_not_zero() {
        let records = weights(1, &[Some(80.0), None, Some(78.0), None]);
        let summary = WindowPair::split(&records, 7).summarize(Metric::Weight);

        assert_eq!(summary.average, Some(79.0));
        // Latest record has no weight; current falls back to the latest present value
        assert_eq!(summary.current, Some(78.0));
    }

    #[test]
    fn test_window_uses_calendar_days() {
        let mut records = weights(1, &[Some(90.0)]);
        records.extend(weights(20, &[Some(80.0), Some(79.0)]));

        let pair = WindowPair::split(&records, 7);
        assert_eq!(pair.current.len(), 2);
        // Day 1 is older than the prior window (days 8-14)
        assert!(pair.prior.is_empty());
    }

    #[test]
    fn test_empty_records() {
        let pair = WindowPair::split(&[], 7);
        assert!(pair.current.is_empty());
        assert_eq!(pair.summarize(Metric::Calories), FieldSummary::default());
    }

    #[test]
    fn test_least_squares_slope() {
        let points = [(0.0, 80.0), (1.0, 79.5), (2.0, 79.0), (3.0, 78.5)];
        assert!((least_squares_slope(&points).unwrap() + 0.5).abs() < 1e-9);

        assert_eq!(least_squares_slope(&[(0.0, 80.0)]), None);
        assert_eq!(least_squares_slope(&[(2.0, 80.0), (2.0, 79.0)]), None);
    }

    #[test]
    fn test_mean_of_nothing() {
        assert_eq!(mean(Vec::<f64>::new()), None);
        assert_eq!(mean([1.0, 2.0, 3.0]), Some(2.0));
    }
}
