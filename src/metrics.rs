//! Metrics engine
//!
//! Turns the ordered record sequence into a [`MetricsSummary`]:
//! - Rolling current/average/delta per tracked field
//! - Goal progress and projected date
//! - Macro compliance against configured targets

use crate::goal::{summarize_goal, GoalInputs};
use crate::types::{DailyRecord, MacroCompliance, Metric, MetricsSummary};
use crate::window::{difference, present_values, WindowPair, DEFAULT_LOOKBACK_DAYS, MAX_LOOKBACK_DAYS};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Number of trailing records kept for the history card
pub const HISTORY_LENGTH: usize = 10;

/// Calorie and macro goals used for compliance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroTargets {
    pub calories_min: Option<f64>,
    pub calories_max: Option<f64>,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fat_g: Option<f64>,
    /// Band half-width around macro targets, in percent of the target
    pub tolerance_pct: f64,
}

impl Default for MacroTargets {
    fn default() -> Self {
        Self {
            calories_min: Some(800.0),
            calories_max: Some(1200.0),
            protein_g: Some(100.0),
            carbs_g: Some(60.0),
            fat_g: Some(40.0),
            tolerance_pct: 10.0,
        }
    }
}

impl MacroTargets {
    /// Inclusive calorie band; open-ended when only one bound is set
    pub fn calorie_band(&self) -> Option<(f64, f64)> {
        match (self.calories_min, self.calories_max) {
            (None, None) => None,
            (min, max) => Some((min.unwrap_or(0.0), max.unwrap_or(f64::INFINITY))),
        }
    }

    /// Inclusive `target ± tolerance` band for a macro
    pub fn band(&self, metric: Metric) -> Option<(f64, f64)> {
        let target = match metric {
            Metric::Calories => return self.calorie_band(),
            Metric::Protein => self.protein_g,
            Metric::Carbs => self.carbs_g,
            Metric::Fat => self.fat_g,
            _ => None,
        }?;
        let tolerance = target.abs() * self.tolerance_pct / 100.0;
        Some((target - tolerance, target + tolerance))
    }
}

/// Percentage of records with a present value that fall inside `band`
pub fn compliance_percent(
    records: &[DailyRecord],
    metric: Metric,
    band: Option<(f64, f64)>,
) -> Option<f64> {
    let (low, high) = band?;
    let (hits, total) = present_values(records, metric).fold((0usize, 0usize), |(hits, total), v| {
        let inside = (low..=high).contains(&v);
        (hits + usize::from(inside), total + 1)
    });
    if total == 0 {
        return None;
    }
    Some(hits as f64 / total as f64 * 100.0)
}

/// Configuration for the metrics engine
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    pub lookback_days: usize,
    pub target_weight: f64,
    pub start_weight_override: Option<f64>,
    pub macro_targets: MacroTargets,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            target_weight: 70.0,
            start_weight_override: None,
            macro_targets: MacroTargets::default(),
        }
    }
}

/// Computes summaries from ordered daily records
#[derive(Debug, Clone, Default)]
pub struct MetricsEngine {
    config: MetricsConfig,
}

impl MetricsEngine {
    pub fn new(mut config: MetricsConfig) -> Self {
        config.lookback_days = config.lookback_days.clamp(1, MAX_LOOKBACK_DAYS);
        Self { config }
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Summarize chronologically ordered records as of `today` (local date)
    pub fn summarize(&self, records: &[DailyRecord], today: NaiveDate) -> MetricsSummary {
        let lookback_days = self.config.lookback_days;
        let windows = WindowPair::split(records, lookback_days);
        let latest = records.last();

        let weight = windows.summarize(Metric::Weight);
        let goal = summarize_goal(GoalInputs {
            records,
            window: windows.current,
            current: weight.current,
            target: self.config.target_weight,
            start_override: self.config.start_weight_override,
        });

        let targets = &self.config.macro_targets;
        let compliance = MacroCompliance {
            calories: compliance_percent(windows.current, Metric::Calories, targets.band(Metric::Calories)),
            protein: compliance_percent(windows.current, Metric::Protein, targets.band(Metric::Protein)),
            carbs: compliance_percent(windows.current, Metric::Carbs, targets.band(Metric::Carbs)),
            fat: compliance_percent(windows.current, Metric::Fat, targets.band(Metric::Fat)),
        };

        let summary = MetricsSummary {
            latest_date: latest.map(|r| r.date),
            lookback_days,
            days_since_entry: latest.map(|r| (today - r.date).num_days()),
            weight,
            waist: windows.summarize(Metric::Waist),
            body_fat: windows.summarize(Metric::BodyFat),
            calories: windows.summarize(Metric::Calories),
            protein: windows.summarize(Metric::Protein),
            carbs: windows.summarize(Metric::Carbs),
            fat: windows.summarize(Metric::Fat),
            sleep: windows.summarize(Metric::Sleep),
            recovery: windows.summarize(Metric::Recovery),
            hrv: windows.summarize(Metric::Hrv),
            resting_hr: windows.summarize(Metric::RestingHr),
            strain: windows.summarize(Metric::Strain),
            weight_change_since_previous: change_since_previous(records),
            goal,
            compliance,
            latest_meal_type: latest.and_then(|r| r.meal_type.clone()),
            latest_notes: latest.and_then(|r| r.notes.clone()),
            recent_weights: records
                .iter()
                .skip(records.len().saturating_sub(HISTORY_LENGTH))
                .map(|r| (r.date, r.weight_kg))
                .collect(),
        };

        tracing::debug!(
            latest = ?summary.latest_date,
            weight = ?summary.weight.current,
            goal_status = ?summary.goal.status,
            "computed metrics summary"
        );

        summary
    }
}

/// Latest record's weight minus the closest earlier weigh-in
fn change_since_previous(records: &[DailyRecord]) -> Option<f64> {
    let (latest, earlier) = records.split_last()?;
    let previous = earlier.iter().rev().find_map(|r| r.weight_kg);
    difference(latest.weight_kg, previous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GoalStatus;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn weight_records(values: &[f64]) -> Vec<DailyRecord> {
        values
            .iter()
            .enumerate()
            .map(|(i, w)| DailyRecord {
                weight_kg: Some(*w),
                ..DailyRecord::new(day(1 + i as u32))
            })
            .collect()
    }

    fn engine(target: f64) -> MetricsEngine {
        MetricsEngine::new(MetricsConfig {
            target_weight: target,
            ..Default::default()
        })
    }

    #[test]
    fn test_seven_day_weight_example() {
        let records = weight_records(&[80.0, 79.8, 79.5, 79.3, 79.0, 78.8, 78.5]);
        let summary = engine(75.0).summarize(&records, day(7));

        assert_eq!(summary.weight.current, Some(78.5));
        assert!((summary.weight.average.unwrap() - 79.2714).abs() < 0.001);
        assert_eq!(summary.weight.delta, None);
        assert_eq!(summary.goal.status, GoalStatus::Projected);
        assert!(summary.goal.projected_date.unwrap() > day(7));
        assert_eq!(summary.days_since_entry, Some(0));
        assert!((summary.weight_change_since_previous.unwrap() + 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_empty_records_yield_absent_summary() {
        let summary = engine(75.0).summarize(&[], day(7));

        assert_eq!(summary.latest_date, None);
        assert_eq!(summary.weight.average, None);
        assert_eq!(summary.goal.status, GoalStatus::InsufficientData);
        assert_eq!(summary.compliance, MacroCompliance::default());
        assert!(summary.recent_weights.is_empty());
    }

    #[test]
    fn test_change_since_previous_skips_missing_days() {
        let mut records = weight_records(&[80.0, 79.0]);
        records.push(DailyRecord::new(day(3)));
        records.push(DailyRecord {
            weight_kg: Some(78.0),
            ..DailyRecord::new(day(4))
        });
        // Latest weight 78.0 vs 79.0 two records back
        assert_eq!(change_since_previous(&records), Some(-1.0));

        records.push(DailyRecord::new(day(5)));
        assert_eq!(change_since_previous(&records), None);
    }

    #[test]
    fn test_calorie_compliance() {
        let intake = [Some(1000.0), Some(1500.0), None, Some(900.0), Some(700.0)];
        let records: Vec<DailyRecord> = intake
            .iter()
            .enumerate()
            .map(|(i, c)| DailyRecord {
                calories_kcal: *c,
                ..DailyRecord::new(day(1 + i as u32))
            })
            .collect();

        let summary = engine(75.0).summarize(&records, day(5));
        // 2 of 4 logged days within 800-1200
        assert_eq!(summary.compliance.calories, Some(50.0));
        // No protein logged at all
        assert_eq!(summary.compliance.protein, None);
    }

    #[test]
    fn test_macro_band_uses_tolerance() {
        let targets = MacroTargets::default();
        assert_eq!(targets.band(Metric::Protein), Some((90.0, 110.0)));
        assert_eq!(targets.band(Metric::Weight), None);

        let records: Vec<DailyRecord> = [95.0, 112.0, 110.0]
            .iter()
            .enumerate()
            .map(|(i, p)| DailyRecord {
                protein_g: Some(*p),
                ..DailyRecord::new(day(1 + i as u32))
            })
            .collect();
        let percent = compliance_percent(&records, Metric::Protein, targets.band(Metric::Protein));
        assert!((percent.unwrap() - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_absent_target_disables_compliance() {
        let targets = MacroTargets {
            fat_g: None,
            calories_min: None,
            calories_max: None,
            ..Default::default()
        };
        assert_eq!(targets.band(Metric::Fat), None);
        assert_eq!(targets.calorie_band(), None);

        let open = MacroTargets {
            calories_max: None,
            ..Default::default()
        };
        assert_eq!(open.calorie_band(), Some((800.0, f64::INFINITY)));
    }

    #[test]
    fn test_history_keeps_last_records() {
        let values: Vec<f64> = (0..14).map(|i| 90.0 - i as f64 * 0.2).collect();
        let records = weight_records(&values);
        let summary = engine(75.0).summarize(&records, day(20));

        assert_eq!(summary.recent_weights.len(), HISTORY_LENGTH);
        assert_eq!(summary.recent_weights.last().unwrap().0, day(14));
        assert_eq!(summary.days_since_entry, Some(6));
        assert!(summary.weight.delta.unwrap() < 0.0);
    }

    #[test]
    fn test_lookback_is_at_least_one_day() {
        let engine = MetricsEngine::new(MetricsConfig {
            lookback_days: 0,
            ..Default::default()
        });
        assert_eq!(engine.config().lookback_days, 1);

        let records = weight_records(&[80.0, 79.0]);
        let summary = engine.summarize(&records, day(2));
        assert_eq!(summary.weight.average, Some(79.0));
        assert_eq!(summary.weight.prior_average, Some(80.0));

        let capped = MetricsEngine::new(MetricsConfig {
            lookback_days: usize::MAX,
            ..Default::default()
        });
        assert_eq!(capped.config().lookback_days, MAX_LOOKBACK_DAYS);
        assert_eq!(capped.summarize(&records, day(2)).weight.average, Some(79.5));
    }
}
