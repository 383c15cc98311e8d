use tracing::info;

use crate::metrics::{mean, predictability_values, productivity_values, CleanSeries};
use crate::models::{ModelTransition, PartitionStats, SprintRecord};

/// The detected velocity change and the two eras it splits history into.
///
/// Both partitions are filtered by velocity value across the whole series,
/// not cut at the transition index. A team that returns to its old target
/// velocity after the transition gets those later sprints counted in
/// `old_model` again.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionAnalysis {
    pub transition: Option<ModelTransition>,
    /// Target velocity shared by `old_model`: the pre-transition value, or
    /// the first known value when nothing changed.
    pub baseline_velocity: Option<f64>,
    pub old_model: Vec<SprintRecord>,
    pub new_model: Vec<SprintRecord>,
}

impl TransitionAnalysis {
    pub fn old_stats(&self) -> PartitionStats {
        partition_stats(self.baseline_velocity, &self.old_model)
    }

    pub fn new_stats(&self) -> PartitionStats {
        partition_stats(
            self.transition.as_ref().map(|t| t.new_velocity),
            &self.new_model,
        )
    }

    /// Index in the clean series of the first post-transition sprint.
    pub fn transition_index(&self, clean: &CleanSeries) -> Option<usize> {
        let transition = self.transition.as_ref()?;
        clean
            .records()
            .iter()
            .position(|r| r.sprint == transition.sprint)
    }
}

/// Finds the first sprint whose target velocity differs from the last known
/// one. Sprints with a missing velocity are skipped, so a gap between two
/// different values still counts as a change.
pub fn find_transition(records: &[SprintRecord]) -> Option<ModelTransition> {
    let mut last: Option<f64> = None;
    for record in records {
        let Some(velocity) = record.target_velocity else {
            continue;
        };
        match last {
            Some(old) if old != velocity => {
                return Some(ModelTransition {
                    sprint: record.sprint.clone(),
                    old_velocity: old,
                    new_velocity: velocity,
                });
            }
            _ => last = Some(velocity),
        }
    }
    None
}

fn with_velocity(records: &[SprintRecord], velocity: f64) -> Vec<SprintRecord> {
    records
        .iter()
        .filter(|r| r.target_velocity == Some(velocity))
        .cloned()
        .collect()
}

pub fn detect(clean: &CleanSeries) -> TransitionAnalysis {
    let records = clean.records();

    match find_transition(records) {
        Some(transition) => {
            info!(
                sprint = %transition.sprint,
                old_velocity = transition.old_velocity,
                new_velocity = transition.new_velocity,
                "model transition detected"
            );
            TransitionAnalysis {
                baseline_velocity: Some(transition.old_velocity),
                old_model: with_velocity(records, transition.old_velocity),
                new_model: with_velocity(records, transition.new_velocity),
                transition: Some(transition),
            }
        }
        None => {
            info!("no model transition detected");
            TransitionAnalysis {
                transition: None,
                baseline_velocity: records.iter().find_map(|r| r.target_velocity),
                old_model: records.to_vec(),
                new_model: Vec::new(),
            }
        }
    }
}

pub fn partition_stats(velocity: Option<f64>, records: &[SprintRecord]) -> PartitionStats {
    PartitionStats {
        velocity,
        count: records.len(),
        mean_productivity: mean(&productivity_values(records)),
        mean_predictability: mean(&predictability_values(records)),
    }
}

/// New-model mean minus old-model mean, when both are defined.
pub fn change(old: Option<f64>, new: Option<f64>) -> Option<f64> {
    old.zip(new).map(|(o, n)| n - o)
}
