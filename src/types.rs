//! Core types for trmnl-health
//!
//! This module defines the data structures that flow through each stage:
//! parsed daily records, the derived metrics summary, and the card payload
//! pushed to the dashboard.

use chrono::NaiveDate;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// One tracker row per calendar day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    /// Calendar day this record describes (unique key)
    pub date: NaiveDate,
    /// Body weight (kg)
    pub weight_kg: Option<f64>,
    /// Waist circumference (cm)
    pub waist_cm: Option<f64>,
    /// Body fat (percent)
    pub body_fat_pct: Option<f64>,
    /// Energy intake (kcal)
    pub calories_kcal: Option<f64>,
    /// Protein intake (g)
    pub protein_g: Option<f64>,
    /// Carbohydrate intake (g)
    pub carbs_g: Option<f64>,
    /// Fat intake (g)
    pub fat_g: Option<f64>,
    /// Sleep duration (hours)
    pub sleep_hours: Option<f64>,
    /// Wearable recovery score (0-100)
    pub recovery_score: Option<f64>,
    /// Heart rate variability (ms, RMSSD)
    pub hrv_rmssd_ms: Option<f64>,
    /// Resting heart rate (bpm)
    pub resting_hr_bpm: Option<f64>,
    /// Wearable day strain (0-21)
    pub strain: Option<f64>,
    /// Free-form meal label ("OMAD", "lunch", ...)
    pub meal_type: Option<String>,
    /// Free-form notes
    pub notes: Option<String>,
}

impl DailyRecord {
    /// Create an empty record for a date
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            ..Default::default()
        }
    }

    /// Fold a later row for the same date into this one.
    ///
    /// Present values in `later` win; notes are concatenated.
    pub fn merge(&mut self, later: DailyRecord) {
        for metric in Metric::ALL {
            if let Some(value) = metric.value(&later) {
                *metric.slot(self) = Some(value);
            }
        }
        if later.meal_type.is_some() {
            self.meal_type = later.meal_type;
        }
        self.notes = match (self.notes.take(), later.notes) {
            (Some(a), Some(b)) => Some(format!("{a}; {b}")),
            (a, b) => b.or(a),
        };
    }
}

/// Numeric tracker column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Weight,
    Waist,
    BodyFat,
    Calories,
    Protein,
    Carbs,
    Fat,
    Sleep,
    Recovery,
    Hrv,
    RestingHr,
    Strain,
}

impl Metric {
    pub const ALL: [Metric; 12] = [
        Metric::Weight,
        Metric::Waist,
        Metric::BodyFat,
        Metric::Calories,
        Metric::Protein,
        Metric::Carbs,
        Metric::Fat,
        Metric::Sleep,
        Metric::Recovery,
        Metric::Hrv,
        Metric::RestingHr,
        Metric::Strain,
    ];

    /// Read this metric from a record
    pub fn value(self, record: &DailyRecord) -> Option<f64> {
        match self {
            Metric::Weight => record.weight_kg,
            Metric::Waist => record.waist_cm,
            Metric::BodyFat => record.body_fat_pct,
            Metric::Calories => record.calories_kcal,
            Metric::Protein => record.protein_g,
            Metric::Carbs => record.carbs_g,
            Metric::Fat => record.fat_g,
            Metric::Sleep => record.sleep_hours,
            Metric::Recovery => record.recovery_score,
            Metric::Hrv => record.hrv_rmssd_ms,
            Metric::RestingHr => record.resting_hr_bpm,
            Metric::Strain => record.strain,
        }
    }

    fn slot(self, record: &mut DailyRecord) -> &mut Option<f64> {
        match self {
            Metric::Weight => &mut record.weight_kg,
            Metric::Waist => &mut record.waist_cm,
            Metric::BodyFat => &mut record.body_fat_pct,
            Metric::Calories => &mut record.calories_kcal,
            Metric::Protein => &mut record.protein_g,
            Metric::Carbs => &mut record.carbs_g,
            Metric::Fat => &mut record.fat_g,
            Metric::Sleep => &mut record.sleep_hours,
            Metric::Recovery => &mut record.recovery_score,
            Metric::Hrv => &mut record.hrv_rmssd_ms,
            Metric::RestingHr => &mut record.resting_hr_bpm,
            Metric::Strain => &mut record.strain,
        }
    }
}

/// Rolling statistics for a single metric
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSummary {
    /// Most recent present value within the current window
    pub current: Option<f64>,
    /// Mean of present values within the current window
    pub average: Option<f64>,
    /// Mean of present values within the prior, equally sized window
    pub prior_average: Option<f64>,
    /// `average - prior_average`
    pub delta: Option<f64>,
    /// Number of present values in the current window
    pub samples: usize,
}

/// Where the weight trend is heading relative to the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    /// Current weight is at or past the target
    Reached,
    /// Trend crosses the target on `projected_date`
    Projected,
    /// Trend is flat or moving away from the target
    Unreachable,
    /// Fewer than two weigh-ins in the window
    InsufficientData,
}

/// Weight goal tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalSummary {
    pub target_weight: f64,
    /// Configured override or first recorded weight
    pub start_weight: Option<f64>,
    /// `current - target` (positive means still above target)
    pub remaining: Option<f64>,
    /// `current - start`
    pub change_since_start: Option<f64>,
    /// Share of the start→target distance covered (0-100)
    pub progress_percent: Option<f64>,
    /// Least-squares slope over the window (kg/day)
    pub slope_per_day: Option<f64>,
    pub projected_date: Option<NaiveDate>,
    pub status: GoalStatus,
}

/// Share of logged days (0-100) whose intake landed inside the target band
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroCompliance {
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
}

/// Derived summary recomputed from the full record sequence on every run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    /// Date of the most recent record
    pub latest_date: Option<NaiveDate>,
    /// Window length (days)
    pub lookback_days: usize,
    /// Whole days between the latest record and today (local time)
    pub days_since_entry: Option<i64>,
    pub weight: FieldSummary,
    pub waist: FieldSummary,
    pub body_fat: FieldSummary,
    pub calories: FieldSummary,
    pub protein: FieldSummary,
    pub carbs: FieldSummary,
    pub fat: FieldSummary,
    pub sleep: FieldSummary,
    pub recovery: FieldSummary,
    pub hrv: FieldSummary,
    pub resting_hr: FieldSummary,
    pub strain: FieldSummary,
    /// Latest weight minus the previous logged weight
    pub weight_change_since_previous: Option<f64>,
    pub goal: GoalSummary,
    pub compliance: MacroCompliance,
    pub latest_meal_type: Option<String>,
    pub latest_notes: Option<String>,
    /// Last records' weights, oldest first
    pub recent_weights: Vec<(NaiveDate, Option<f64>)>,
}

impl MetricsSummary {
    /// Look up a field summary by metric
    pub fn field(&self, metric: Metric) -> &FieldSummary {
        match metric {
            Metric::Weight => &self.weight,
            Metric::Waist => &self.waist,
            Metric::BodyFat => &self.body_fat,
            Metric::Calories => &self.calories,
            Metric::Protein => &self.protein,
            Metric::Carbs => &self.carbs,
            Metric::Fat => &self.fat,
            Metric::Sleep => &self.sleep,
            Metric::Recovery => &self.recovery,
            Metric::Hrv => &self.hrv,
            Metric::RestingHr => &self.resting_hr,
            Metric::Strain => &self.strain,
        }
    }
}

/// Dashboard card identifier, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardId {
    Weight,
    Goal,
    Nutrition,
    Recovery,
    History,
    Notes,
}

impl CardId {
    pub const ALL: [CardId; 6] = [
        CardId::Weight,
        CardId::Goal,
        CardId::Nutrition,
        CardId::Recovery,
        CardId::History,
        CardId::Notes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CardId::Weight => "weight",
            CardId::Goal => "goal",
            CardId::Nutrition => "nutrition",
            CardId::Recovery => "recovery",
            CardId::History => "history",
            CardId::Notes => "notes",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            CardId::Weight => "Weight",
            CardId::Goal => "Goal",
            CardId::Nutrition => "Nutrition",
            CardId::Recovery => "Recovery",
            CardId::History => "Recent",
            CardId::Notes => "Notes & Reminders",
        }
    }

    /// Pinned cards are never dropped when fitting the size budget
    pub fn is_pinned(&self) -> bool {
        matches!(self, CardId::Weight | CardId::Goal)
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CardId::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown card '{}'", s.trim()))
    }
}

/// One label/value line inside a card
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardRow {
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl CardRow {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// A titled group of rows consumed by the display template
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Card {
    #[serde(skip)]
    pub id: CardId,
    pub title: String,
    pub rows: Vec<CardRow>,
}

/// Goal progress bar
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub percent: f64,
    pub label: String,
}

/// Merge variables sent to the dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payload {
    pub header: String,
    pub subtitle: String,
    /// Local generation time; excluded from the content hash
    pub generated_at: String,
    pub progress: Option<Progress>,
    #[serde(serialize_with = "serialize_cards")]
    pub cards: Vec<Card>,
}

impl Payload {
    pub fn card(&self, id: CardId) -> Option<&Card> {
        self.cards.iter().find(|card| card.id == id)
    }
}

/// Cards serialize as an ordered map keyed by card id
fn serialize_cards<S: Serializer>(cards: &[Card], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(cards.len()))?;
    for card in cards {
        map.serialize_entry(card.id.as_str(), card)?;
    }
    map.end()
}
