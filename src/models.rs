use std::collections::HashMap;

use serde::Serialize;

/// A single spreadsheet cell before cleaning.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Number(f64),
}

impl RawCell {
    pub fn from_field(field: &str) -> Self {
        if field.trim().is_empty() {
            RawCell::Empty
        } else {
            RawCell::Text(field.to_string())
        }
    }
}

pub type RawRow = HashMap<String, RawCell>;

/// The four pass-through "normalized" columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedPoints {
    pub target_velocity: Option<f64>,
    pub planned: Option<f64>,
    pub delivered: Option<f64>,
    pub inflation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SprintRecord {
    pub sprint: String,
    pub team: String,
    pub target_velocity: Option<f64>,
    pub committed: Option<f64>,
    pub delivered: Option<f64>,
    /// Signed; zero when the sheet records no correction.
    pub inflation_correction: f64,
    pub productivity: Option<f64>,
    pub predictability: Option<f64>,
    pub notes: Option<String>,
    pub normalized: NormalizedPoints,
}

/// Every row of one input file, in sprint order.
#[derive(Debug, Clone)]
pub struct SprintTable {
    pub team_name: String,
    pub records: Vec<SprintRecord>,
}

impl SprintTable {
    pub fn total_rows(&self) -> usize {
        self.records.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesStats {
    pub count: usize,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InflationStats {
    pub total: f64,
    pub corrected_sprints: usize,
    pub frequency: Option<f64>,
    pub average_per_sprint: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelTransition {
    pub sprint: String,
    pub old_velocity: f64,
    pub new_velocity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PartitionStats {
    pub velocity: Option<f64>,
    pub count: usize,
    pub mean_productivity: Option<f64>,
    pub mean_predictability: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SprintNote {
    pub sprint: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsSummary {
    pub team_name: String,
    pub total_rows: usize,
    pub analyzed_sprints: usize,
    pub first_sprint: Option<String>,
    pub last_sprint: Option<String>,
    pub productivity: SeriesStats,
    pub predictability: SeriesStats,
    pub cv_productivity: Result<f64, crate::error::Degenerate>,
    pub avg_committed: Option<f64>,
    pub avg_delivered: Option<f64>,
    pub delivery_gap: Option<f64>,
    pub inflation: InflationStats,
    pub transition: Option<ModelTransition>,
    pub old_model: PartitionStats,
    pub new_model: PartitionStats,
    pub notes: Vec<SprintNote>,
}

impl StatisticsSummary {
    pub fn cv(&self) -> Option<f64> {
        self.cv_productivity.as_ref().ok().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Priority {
    Urgent = 1,
    Secondary = 2,
}

impl Priority {
    pub fn rank(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecommendationKind {
    VolatilityReduction,
    DefinitionOfReady,
    ProductivityBlockers,
    NewModelBaseline,
    EstimationCalibration,
    CapacityPlanning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub title: String,
    pub priority: Priority,
    pub rationale: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ReadinessBlocker {
    Volatility(Option<f64>),
    Productivity(Option<f64>),
    InflationFrequency(Option<f64>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Readiness {
    pub ready: bool,
    pub blockers: Vec<ReadinessBlocker>,
}
