//! Payload building
//!
//! This module shapes a [`MetricsSummary`] into the card payload consumed by
//! the dashboard template. Every row is always present (absent metrics render
//! as a placeholder) and the serialized payload is kept under a byte ceiling
//! by dropping low-priority cards.

pub mod budget;
pub mod format;

use crate::error::HealthError;
use crate::metrics::MacroTargets;
use crate::types::{
    Card, CardId, CardRow, GoalStatus, Metric, MetricsSummary, Payload, Progress,
};
use budget::{fit_to_budget, BudgetEntry};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use format::{band_badge, number, percent, short_date, signed, staleness, trend, truncate, PLACEHOLDER};

/// TRMNL private plugin merge-variable ceiling
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 2048;

/// Longest note rendered on the notes card
const MAX_NOTE_CHARS: usize = 200;

/// Rows shown on the history card
const HISTORY_ROWS: usize = 7;

/// Payload builder settings
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadConfig {
    /// Ceiling for the compact serialized payload
    pub max_bytes: usize,
    /// Cards ordered from most to least important
    pub card_priority: Vec<CardId>,
    /// Timezone for the generation timestamp
    pub timezone: Tz,
    pub macro_targets: MacroTargets,
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            card_priority: CardId::ALL.to_vec(),
            timezone: Tz::UTC,
            macro_targets: MacroTargets::default(),
        }
    }
}

/// A payload that fits the size ceiling
#[derive(Debug, Clone)]
pub struct BuiltPayload {
    pub payload: Payload,
    /// Cards removed to fit the ceiling, lowest priority first
    pub dropped: Vec<CardId>,
    /// Compact serialized size in bytes
    pub size: usize,
}

/// Builds size-bounded card payloads
#[derive(Debug, Clone, Default)]
pub struct PayloadBuilder {
    config: PayloadConfig,
}

impl PayloadBuilder {
    pub fn new(config: PayloadConfig) -> Self {
        Self { config }
    }

    /// Build the payload for `summary`, stamped with `generated_at`
    pub fn build(
        &self,
        summary: &MetricsSummary,
        generated_at: DateTime<Utc>,
    ) -> Result<BuiltPayload, HealthError> {
        let goal = &summary.goal;
        let header = number(summary.weight.current, " kg", 1);
        let subtitle = format!(
            "{} to target ({:.1} kg)",
            signed(goal.remaining, " kg", 1),
            goal.target_weight
        );
        let progress = goal.progress_percent.map(|p| Progress {
            percent: (p * 10.0).round() / 10.0,
            label: subtitle.clone(),
        });

        let mut payload = Payload {
            header,
            subtitle,
            generated_at: generated_at
                .with_timezone(&self.config.timezone)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
            progress,
            cards: Vec::new(),
        };

        let cards: Vec<Card> = CardId::ALL
            .into_iter()
            .map(|id| self.build_card(id, summary))
            .collect();

        let overhead = serde_json::to_vec(&payload)?.len();
        let entries = cards
            .iter()
            .map(|card| {
                Ok(BudgetEntry {
                    key: card.id,
                    priority: self.priority_of(card.id),
                    size: entry_size(card)?,
                    pinned: card.id.is_pinned(),
                })
            })
            .collect::<Result<Vec<_>, HealthError>>()?;

        let fit = fit_to_budget(&entries, overhead, 1, self.config.max_bytes);
        payload.cards = cards
            .into_iter()
            .filter(|card| fit.kept.contains(&card.id))
            .collect();

        let size = serde_json::to_vec(&payload)?.len();
        debug_assert_eq!(size, fit.size, "budget accounting disagrees with serialized size");
        if !fit.fits(self.config.max_bytes) || size > self.config.max_bytes {
            return Err(HealthError::PayloadTooLarge {
                size,
                limit: self.config.max_bytes,
            });
        }
        if !fit.dropped.is_empty() {
            tracing::warn!(dropped = ?fit.dropped, size, "dropped cards to fit payload ceiling");
        }

        Ok(BuiltPayload {
            payload,
            dropped: fit.dropped,
            size,
        })
    }

    /// Rank in the configured priority order; unlisted cards rank last
    fn priority_of(&self, id: CardId) -> usize {
        self.config
            .card_priority
            .iter()
            .position(|p| *p == id)
            .unwrap_or(self.config.card_priority.len() + id as usize)
    }

    fn build_card(&self, id: CardId, summary: &MetricsSummary) -> Card {
        let rows = match id {
            CardId::Weight => weight_rows(summary),
            CardId::Goal => goal_rows(summary),
            CardId::Nutrition => nutrition_rows(summary, &self.config.macro_targets),
            CardId::Recovery => recovery_rows(summary),
            CardId::History => history_rows(summary),
            CardId::Notes => notes_rows(summary),
        };
        Card {
            id,
            title: id.title().to_string(),
            rows,
        }
    }
}

/// Bytes a card adds inside the cards map: `"key":{...}`
fn entry_size(card: &Card) -> Result<usize, HealthError> {
    let key = serde_json::to_vec(card.id.as_str())?.len();
    let body = serde_json::to_vec(card)?.len();
    Ok(key + 1 + body)
}

fn weight_rows(summary: &MetricsSummary) -> Vec<CardRow> {
    let days = summary.lookback_days;
    let mut latest = CardRow::new("Latest", number(summary.weight.current, " kg", 1));
    if let (Some(date), Some(age)) = (summary.latest_date, summary.days_since_entry) {
        latest = latest.with_hint(format!("{} · {}", short_date(date), staleness(age)));
    }

    vec![
        latest,
        CardRow::new("Vs prev", signed(summary.weight_change_since_previous, " kg", 1))
            .with_hint("Since last weigh-in"),
        CardRow::new(format!("{days}d avg"), number(summary.weight.average, " kg", 1)),
        CardRow::new(format!("Vs prior {days}d"), signed(summary.weight.delta, " kg", 1)),
        CardRow::new("Waist", number(summary.waist.current, " cm", 1)),
        CardRow::new("Body fat", number(summary.body_fat.current, "%", 1)),
    ]
}

fn goal_rows(summary: &MetricsSummary) -> Vec<CardRow> {
    let goal = &summary.goal;
    let eta_hint = match goal.status {
        GoalStatus::Projected => "At current trend",
        GoalStatus::Reached => "Target reached",
        GoalStatus::Unreachable => "Trend not toward target",
        GoalStatus::InsufficientData => "Need more weigh-ins",
    };
    let mut since_start = CardRow::new("Since start", signed(goal.change_since_start, " kg", 1));
    if let Some(start) = goal.start_weight {
        since_start = since_start.with_hint(format!("From {start:.1} kg"));
    }

    vec![
        CardRow::new("Target", number(Some(goal.target_weight), " kg", 1)),
        CardRow::new("To go", signed(goal.remaining, " kg", 1)),
        CardRow::new("Progress", number(goal.progress_percent, "%", 1)),
        since_start,
        CardRow::new("Trend", signed(goal.slope_per_day.map(|s| s * 7.0), " kg/wk", 1)),
        CardRow::new(
            "ETA",
            goal.projected_date
                .map(|d| d.format("%b %d, %Y").to_string())
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
        )
        .with_hint(eta_hint),
    ]
}

fn nutrition_rows(summary: &MetricsSummary, targets: &MacroTargets) -> Vec<CardRow> {
    let days = summary.lookback_days;
    let calories = summary.calories.current;
    let calorie_band = targets.calorie_band();
    let calorie_hint = match calorie_band {
        Some((low, high)) if high.is_finite() => format!("{low:.0}-{high:.0} kcal"),
        Some((low, _)) => format!("≥{low:.0} kcal"),
        None => "No target".to_string(),
    };

    let macro_row = |label: &str, metric: Metric, target: Option<f64>, compliance: Option<f64>| {
        let value = summary.field(metric).current;
        let goal = target
            .map(|t| format!("Goal {t:.0}g"))
            .unwrap_or_else(|| "No goal".to_string());
        CardRow::new(label, number(value, " g", 0)).with_hint(format!(
            "{goal} · {} · {} of days",
            band_badge(value, targets.band(metric)),
            percent(compliance)
        ))
    };

    vec![
        CardRow::new("Calories", number(calories, " kcal", 0)).with_hint(format!(
            "{calorie_hint} · {}",
            band_badge(calories, calorie_band)
        )),
        macro_row("Protein", Metric::Protein, targets.protein_g, summary.compliance.protein),
        macro_row("Carbs", Metric::Carbs, targets.carbs_g, summary.compliance.carbs),
        macro_row("Fat", Metric::Fat, targets.fat_g, summary.compliance.fat),
        CardRow::new("Avg intake", number(summary.calories.average, " kcal", 0))
            .with_hint(format!("{days}d average")),
        CardRow::new("On target", percent(summary.compliance.calories))
            .with_hint(format!("Days in calorie band · {days}d")),
    ]
}

fn recovery_rows(summary: &MetricsSummary) -> Vec<CardRow> {
    let row = |label: &str, metric: Metric, unit: &str, precision: usize| {
        let field = summary.field(metric);
        CardRow::new(label, number(field.current, unit, precision))
            .with_hint(trend(field.current, field.average, unit, precision))
    };

    vec![
        row("Sleep", Metric::Sleep, " h", 1),
        row("Recovery", Metric::Recovery, "%", 0),
        row("HRV", Metric::Hrv, " ms", 0),
        row("Resting HR", Metric::RestingHr, " bpm", 0),
        row("Strain", Metric::Strain, "", 1),
    ]
}

/// Newest first, padded to a fixed row count
fn history_rows(summary: &MetricsSummary) -> Vec<CardRow> {
    let recent = &summary.recent_weights;
    let mut rows: Vec<CardRow> = recent
        .iter()
        .skip(recent.len().saturating_sub(HISTORY_ROWS))
        .rev()
        .map(|(date, weight)| CardRow::new(short_date(*date), number(*weight, " kg", 1)))
        .collect();
    rows.resize_with(HISTORY_ROWS, || CardRow::new(PLACEHOLDER, PLACEHOLDER));
    rows
}

fn notes_rows(summary: &MetricsSummary) -> Vec<CardRow> {
    let notes = summary
        .latest_notes
        .as_deref()
        .map(|n| truncate(n, MAX_NOTE_CHARS))
        .unwrap_or_else(|| "No notes logged yet.".to_string());

    vec![
        CardRow::new("Notes", notes),
        CardRow::new(
            "Meal",
            summary
                .latest_meal_type
                .clone()
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricsConfig, MetricsEngine};
    use crate::types::DailyRecord;
    use chrono::{NaiveDate, TimeZone};
    use pretty_assertions::assert_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn generated_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 7, 23, 30, 0).unwrap()
    }

    fn example_summary() -> MetricsSummary {
        let weights = [80.0, 79.8, 79.5, 79.3, 79.0, 78.8, 78.5];
        let records: Vec<DailyRecord> = weights
            .iter()
            .enumerate()
            .map(|(i, w)| DailyRecord {
                weight_kg: Some(*w),
                calories_kcal: Some(1000.0 + i as f64 * 50.0),
                protein_g: Some(95.0),
                sleep_hours: Some(7.0 + i as f64 * 0.1),
                notes: Some(format!("day {}", i + 1)),
                ..DailyRecord::new(day(1 + i as u32))
            })
            .collect();

        MetricsEngine::new(MetricsConfig {
            target_weight: 75.0,
            ..Default::default()
        })
        .summarize(&records, day(7))
    }

    fn row<'a>(payload: &'a Payload, card: CardId, label: &str) -> &'a CardRow {
        payload
            .card(card)
            .unwrap()
            .rows
            .iter()
            .find(|r| r.label == label)
            .unwrap()
    }

    fn large_budget() -> PayloadBuilder {
        PayloadBuilder::new(PayloadConfig {
            max_bytes: 16 * 1024,
            ..Default::default()
        })
    }

    #[test]
    fn test_weight_card_formatting() {
        let built = large_budget().build(&example_summary(), generated_at()).unwrap();
        let payload = &built.payload;

        assert_eq!(payload.header, "78.5 kg");
        assert_eq!(payload.subtitle, "+3.5 kg to target (75.0 kg)");
        assert_eq!(row(payload, CardId::Weight, "Latest").value, "78.5 kg");
        assert_eq!(
            row(payload, CardId::Weight, "Latest").hint.as_deref(),
            Some("Thu Mar 07 · today")
        );
        assert_eq!(row(payload, CardId::Weight, "7d avg").value, "79.3 kg");
        assert_eq!(row(payload, CardId::Weight, "Vs prior 7d").value, PLACEHOLDER);
        assert_eq!(row(payload, CardId::Weight, "Vs prev").value, "-0.3 kg");
        assert_eq!(row(payload, CardId::Weight, "Waist").value, PLACEHOLDER);
        assert!(built.dropped.is_empty());
    }

    #[test]
    fn test_layout_is_positionally_stable() {
        let full = large_budget().build(&example_summary(), generated_at()).unwrap();
        let empty_summary = MetricsEngine::default().summarize(&[], day(7));
        let empty = large_budget().build(&empty_summary, generated_at()).unwrap();

        for id in [CardId::Weight, CardId::Goal, CardId::Nutrition, CardId::Recovery, CardId::Notes] {
            let labels = |p: &Payload| -> Vec<String> {
                p.card(id).unwrap().rows.iter().map(|r| r.label.clone()).collect()
            };
            assert_eq!(labels(&full.payload), labels(&empty.payload));
        }

        // History labels are dates, so only the row count is fixed
        let history = |p: &Payload| p.card(CardId::History).unwrap().rows.len();
        assert_eq!(history(&full.payload), HISTORY_ROWS);
        assert_eq!(history(&empty.payload), HISTORY_ROWS);
        let blank = &empty.payload.card(CardId::History).unwrap().rows[0];
        assert_eq!((blank.label.as_str(), blank.value.as_str()), (PLACEHOLDER, PLACEHOLDER));

        assert_eq!(empty.payload.header, PLACEHOLDER);
        assert!(empty.payload.progress.is_none());
        assert_eq!(row(&empty.payload, CardId::Recovery, "HRV").value, PLACEHOLDER);
    }

    #[test]
    fn test_goal_and_nutrition_cards() {
        let built = large_budget().build(&example_summary(), generated_at()).unwrap();
        let payload = &built.payload;

        assert_eq!(row(payload, CardId::Goal, "Target").value, "75.0 kg");
        assert_eq!(row(payload, CardId::Goal, "Progress").value, "30.0%");
        assert_ne!(row(payload, CardId::Goal, "ETA").value, PLACEHOLDER);
        assert_eq!(payload.progress.as_ref().unwrap().percent, 30.0);

        let calories = row(payload, CardId::Nutrition, "Calories");
        assert_eq!(calories.value, "1300 kcal");
        assert_eq!(calories.hint.as_deref(), Some("800-1200 kcal · High"));
        // 1000..=1200 are inside the band: 5 of 7 days
        assert_eq!(row(payload, CardId::Nutrition, "On target").value, "71%");
        assert_eq!(
            row(payload, CardId::Nutrition, "Protein").hint.as_deref(),
            Some("Goal 100g · On target · 100% of days")
        );
        assert_eq!(
            row(payload, CardId::Nutrition, "Fat").hint.as_deref(),
            Some("Goal 40g · No data · — of days")
        );
    }

    #[test]
    fn test_history_and_notes() {
        let built = large_budget().build(&example_summary(), generated_at()).unwrap();
        let history = &built.payload.card(CardId::History).unwrap().rows;

        assert_eq!(history.len(), 7);
        assert_eq!(history[0].label, "Thu Mar 07");
        assert_eq!(history[0].value, "78.5 kg");
        assert_eq!(row(&built.payload, CardId::Notes, "Notes").value, "day 7");
        assert_eq!(row(&built.payload, CardId::Notes, "Meal").value, PLACEHOLDER);
    }

    #[test]
    fn test_generated_at_uses_timezone() {
        let builder = PayloadBuilder::new(PayloadConfig {
            max_bytes: 16 * 1024,
            timezone: chrono_tz::Asia::Tokyo,
            ..Default::default()
        });
        let built = builder.build(&example_summary(), generated_at()).unwrap();
        assert_eq!(built.payload.generated_at, "2024-03-08 08:30");
    }

    #[test]
    fn test_default_ceiling_is_respected() {
        let mut summary = example_summary();
        summary.latest_notes = Some("x".repeat(500));

        let built = PayloadBuilder::default().build(&summary, generated_at()).unwrap();
        let serialized = serde_json::to_vec(&built.payload).unwrap();

        assert!(serialized.len() <= DEFAULT_MAX_PAYLOAD_BYTES);
        assert_eq!(built.size, serialized.len());
        assert!(built.payload.card(CardId::Weight).is_some());
        assert!(built.payload.card(CardId::Goal).is_some());
    }

    #[test]
    fn test_drops_lowest_priority_cards_in_order() {
        let summary = example_summary();
        let full = large_budget().build(&summary, generated_at()).unwrap();
        let pinned_only = {
            let mut p = full.payload.clone();
            p.cards.retain(|c| c.id.is_pinned());
            serde_json::to_vec(&p).unwrap().len()
        };

        let builder = PayloadBuilder::new(PayloadConfig {
            max_bytes: pinned_only,
            ..Default::default()
        });
        let built = builder.build(&summary, generated_at()).unwrap();

        assert_eq!(
            built.dropped,
            vec![CardId::Notes, CardId::History, CardId::Recovery, CardId::Nutrition]
        );
        assert_eq!(built.size, pinned_only);
    }

    #[test]
    fn test_custom_priority_changes_drop_order() {
        let summary = example_summary();
        let full = large_budget().build(&summary, generated_at()).unwrap();

        let builder = PayloadBuilder::new(PayloadConfig {
            max_bytes: full.size - 1,
            card_priority: vec![CardId::Notes, CardId::Weight, CardId::Goal],
            ..Default::default()
        });
        let built = builder.build(&summary, generated_at()).unwrap();

        // Unlisted cards rank below listed ones, in display order; the last goes first
        assert_eq!(built.dropped, vec![CardId::History]);
        assert!(built.payload.card(CardId::Notes).is_some());
    }

    #[test]
    fn test_oversize_pinned_cards_fail() {
        let builder = PayloadBuilder::new(PayloadConfig {
            max_bytes: 200,
            ..Default::default()
        });
        let result = builder.build(&example_summary(), generated_at());
        assert!(matches!(
            result,
            Err(HealthError::PayloadTooLarge { limit: 200, .. })
        ));
    }
}
