use crate::models::{NormalizedPoints, SprintRecord};

pub fn record(sprint: &str, velocity: f64, productivity: Option<f64>) -> SprintRecord {
    SprintRecord {
        sprint: sprint.to_string(),
        team: "Test Team".to_string(),
        target_velocity: Some(velocity),
        committed: Some(velocity),
        delivered: productivity.map(|p| velocity * p),
        inflation_correction: 0.0,
        productivity,
        predictability: productivity,
        notes: None,
        normalized: NormalizedPoints::default(),
    }
}

pub fn series(velocities: &[f64], productivity: f64) -> Vec<SprintRecord> {
    velocities
        .iter()
        .enumerate()
        .map(|(i, v)| record(&format!("S25.{:02}", i + 1), *v, Some(productivity)))
        .collect()
}
