use crate::error::Degenerate;
use crate::models::{
    InflationStats, SeriesStats, SprintNote, SprintRecord, SprintTable, StatisticsSummary,
};
use crate::transition::TransitionAnalysis;

/// The records with a productivity value, in sprint order. Every aggregate
/// is computed over this series.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanSeries {
    records: Vec<SprintRecord>,
}

impl CleanSeries {
    pub fn from_table(table: &SprintTable) -> Self {
        Self::from_records(table.records.iter().cloned())
    }

    pub fn from_records(records: impl IntoIterator<Item = SprintRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .filter(|r| r.productivity.is_some())
                .collect(),
        }
    }

    pub fn records(&self) -> &[SprintRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn productivity(&self) -> Vec<f64> {
        productivity_values(&self.records)
    }

    pub fn predictability(&self) -> Vec<f64> {
        predictability_values(&self.records)
    }
}

pub fn productivity_values(records: &[SprintRecord]) -> Vec<f64> {
    records.iter().filter_map(|r| r.productivity).collect()
}

pub fn predictability_values(records: &[SprintRecord]) -> Vec<f64> {
    records.iter().filter_map(|r| r.predictability).collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator).
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let avg = mean(values)?;
    if values.iter().all(|v| *v == values[0]) {
        return Some(0.0);
    }
    let sum_sq: f64 = values.iter().map(|v| (v - avg).powi(2)).sum();
    Some((sum_sq / (values.len() - 1) as f64).sqrt())
}

/// Standard deviation over mean, as a percentage.
pub fn coefficient_of_variation(values: &[f64]) -> Result<f64, Degenerate> {
    match values.len() {
        0 => return Err(Degenerate::EmptySeries),
        1 => return Err(Degenerate::TooFewSamples { count: 1 }),
        _ => {}
    }
    let avg = mean(values).ok_or(Degenerate::EmptySeries)?;
    if avg == 0.0 {
        return Err(Degenerate::ZeroMean);
    }
    let std = sample_std_dev(values).ok_or(Degenerate::TooFewSamples {
        count: values.len(),
    })?;
    Ok(std / avg * 100.0)
}

pub fn series_stats(values: &[f64]) -> SeriesStats {
    SeriesStats {
        count: values.len(),
        mean: mean(values),
        std_dev: sample_std_dev(values),
        min: values.iter().copied().reduce(f64::min),
        max: values.iter().copied().reduce(f64::max),
    }
}

/// Trailing moving average; `None` until a full window is available.
pub fn moving_average(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                None
            } else {
                mean(&values[i + 1 - window..=i])
            }
        })
        .collect()
}

/// Linear-interpolated quantile, `q` in [0, 1].
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

pub fn inflation_stats(records: &[SprintRecord]) -> InflationStats {
    let total: f64 = records.iter().map(|r| r.inflation_correction).sum();
    let corrected_sprints = records
        .iter()
        .filter(|r| r.inflation_correction != 0.0)
        .count();
    let n = records.len();

    InflationStats {
        total,
        corrected_sprints,
        frequency: (n > 0).then(|| corrected_sprints as f64 / n as f64),
        average_per_sprint: (n > 0).then(|| total / n as f64),
    }
}

pub fn sprint_notes(records: &[SprintRecord]) -> Vec<SprintNote> {
    records
        .iter()
        .filter_map(|r| {
            r.notes.as_ref().map(|text| SprintNote {
                sprint: r.sprint.clone(),
                text: text.trim().to_string(),
            })
        })
        .filter(|note| !note.text.is_empty())
        .collect()
}

pub fn summarize(
    table: &SprintTable,
    clean: &CleanSeries,
    transition: &TransitionAnalysis,
) -> StatisticsSummary {
    let records = clean.records();
    let productivity = clean.productivity();
    let predictability = clean.predictability();

    let committed: Vec<f64> = records.iter().filter_map(|r| r.committed).collect();
    let delivered: Vec<f64> = records.iter().filter_map(|r| r.delivered).collect();
    let avg_committed = mean(&committed);
    let avg_delivered = mean(&delivered);

    StatisticsSummary {
        team_name: table.team_name.clone(),
        total_rows: table.total_rows(),
        analyzed_sprints: clean.len(),
        first_sprint: records.first().map(|r| r.sprint.clone()),
        last_sprint: records.last().map(|r| r.sprint.clone()),
        productivity: series_stats(&productivity),
        predictability: series_stats(&predictability),
        cv_productivity: coefficient_of_variation(&productivity),
        avg_committed,
        avg_delivered,
        delivery_gap: avg_committed.zip(avg_delivered).map(|(c, d)| c - d),
        inflation: inflation_stats(records),
        transition: transition.transition.clone(),
        old_model: transition.old_stats(),
        new_model: transition.new_stats(),
        notes: sprint_notes(records),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::record;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn std_dev_uses_sample_denominator() {
        let values = [0.6, 0.8, 1.0];
        let std = sample_std_dev(&values).unwrap();
        assert!(approx(std, 0.2));
        assert_eq!(sample_std_dev(&[0.5]), None);
    }

    #[test]
    fn cv_of_constant_series_is_zero() {
        assert_eq!(coefficient_of_variation(&[0.75, 0.75, 0.75]), Ok(0.0));
        assert_eq!(coefficient_of_variation(&[0.1, 0.1, 0.1, 0.1, 0.1]), Ok(0.0));
    }

    #[test]
    fn cv_is_undefined_for_degenerate_series() {
        assert_eq!(coefficient_of_variation(&[]), Err(Degenerate::EmptySeries));
        assert_eq!(
            coefficient_of_variation(&[0.8]),
            Err(Degenerate::TooFewSamples { count: 1 })
        );
        assert_eq!(
            coefficient_of_variation(&[0.0, 0.0]),
            Err(Degenerate::ZeroMean)
        );
    }

    #[test]
    fn cv_is_percentage_of_mean() {
        let cv = coefficient_of_variation(&[0.6, 0.8, 1.0]).unwrap();
        assert!(approx(cv, 25.0));
    }

    #[test]
    fn moving_average_leaves_leading_gaps() {
        let ma = moving_average(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(ma, vec![None, None, Some(2.0), Some(3.0)]);
        assert_eq!(moving_average(&[1.0], 2), vec![None]);
    }

    #[test]
    fn quantile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(quantile(&values, 0.0), Some(1.0));
        assert_eq!(quantile(&values, 0.5), Some(2.5));
        assert_eq!(quantile(&values, 1.0), Some(4.0));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn inflation_counts_non_zero_corrections() {
        let mut records = vec![
            record("S1", 120.0, Some(0.8)),
            record("S2", 120.0, Some(0.7)),
            record("S3", 120.0, Some(0.9)),
            record("S4", 120.0, Some(0.9)),
        ];
        records[0].inflation_correction = 10.0;
        records[2].inflation_correction = -4.0;

        let stats = inflation_stats(&records);
        assert_eq!(stats.total, 6.0);
        assert_eq!(stats.corrected_sprints, 2);
        assert_eq!(stats.frequency, Some(0.5));
        assert_eq!(stats.average_per_sprint, Some(1.5));
        assert_eq!(inflation_stats(&[]).frequency, None);
    }

    #[test]
    fn clean_series_drops_only_missing_productivity() {
        let records = vec![
            record("S1", 120.0, Some(0.8)),
            record("S2", 120.0, None),
            record("S3", 120.0, Some(0.0)),
        ];
        let clean = CleanSeries::from_records(records);
        assert_eq!(clean.len(), 2);
        assert_eq!(clean.productivity(), vec![0.8, 0.0]);
    }

    #[test]
    fn min_max_and_missing_predictability_are_handled() {
        let mut records = vec![
            record("S1", 120.0, Some(0.5)),
            record("S2", 120.0, Some(0.9)),
        ];
        records[1].predictability = None;
        let clean = CleanSeries::from_records(records);

        let stats = series_stats(&clean.predictability());
        assert_eq!(stats.count, 1);
        assert_eq!(stats.std_dev, None);

        let stats = series_stats(&clean.productivity());
        assert_eq!(stats.min, Some(0.5));
        assert_eq!(stats.max, Some(0.9));
    }

    #[test]
    fn notes_skip_blank_text() {
        let mut records = vec![record("S1", 120.0, Some(0.8)), record("S2", 120.0, Some(0.8))];
        records[0].notes = Some("  Two FTE on holiday ".to_string());
        records[1].notes = Some("   ".to_string());
        let notes = sprint_notes(&records);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].text, "Two FTE on holiday");
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn cv_of_any_constant_series_is_zero(
                value in -1000.0f64..1000.0,
                len in 2usize..60
            ) {
                prop_assume!(value != 0.0);
                prop_assert_eq!(coefficient_of_variation(&vec![value; len]), Ok(0.0));
            }
        }
    }
}
