use tracing::info;

use crate::metrics::{self, CleanSeries};
use crate::models::{Readiness, Recommendation, SprintTable, StatisticsSummary};
use crate::recommend;
use crate::transition::{self, TransitionAnalysis};

/// Everything derived from one input table. Each stage only reads the
/// values produced by the stages before it.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub table: SprintTable,
    pub clean: CleanSeries,
    pub transition: TransitionAnalysis,
    pub summary: StatisticsSummary,
    pub recommendations: Vec<Recommendation>,
    pub readiness: Readiness,
}

pub fn analyze(table: SprintTable) -> Analysis {
    let clean = CleanSeries::from_table(&table);
    info!(
        total = table.total_rows(),
        analyzed = clean.len(),
        "sprints with productivity data"
    );

    let transition = transition::detect(&clean);
    let summary = metrics::summarize(&table, &clean, &transition);
    let recommendations = recommend::recommend(&summary);
    let readiness = recommend::assess_readiness(&summary);

    Analysis {
        table,
        clean,
        transition,
        summary,
        recommendations,
        readiness,
    }
}
