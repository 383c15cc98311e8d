use tracing::info;

use crate::format::{fmt_cv, fmt_pct, fmt_pct0, fmt_points};
use crate::models::{
    Priority, Readiness, ReadinessBlocker, Recommendation, RecommendationKind, StatisticsSummary,
};

pub const VOLATILITY_CV_PCT: f64 = 20.0;
pub const INFLATION_FREQUENCY: f64 = 0.5;
pub const LOW_PRODUCTIVITY: f64 = 0.65;
pub const NEW_MODEL_BASELINE_SPRINTS: usize = 5;
pub const LOW_PREDICTABILITY: f64 = 0.70;
pub const CAPACITY_KEYWORDS: [&str; 4] = ["holiday", "fte", "capacity", "absence"];

pub const READY_CV_PCT: f64 = 15.0;
pub const READY_PRODUCTIVITY: f64 = 0.70;
pub const READY_INFLATION_FREQUENCY: f64 = 0.30;

fn above(value: Option<f64>, threshold: f64) -> bool {
    value.is_some_and(|v| v > threshold)
}

fn below(value: Option<f64>, threshold: f64) -> bool {
    value.is_some_and(|v| v < threshold)
}

pub fn mentions_capacity(text: &str) -> bool {
    let lower = text.to_lowercase();
    CAPACITY_KEYWORDS.iter().any(|word| lower.contains(word))
}

/// Evaluates the coaching rules in order, then ranks by priority. Rules of
/// equal priority keep their evaluation order.
pub fn recommend(summary: &StatisticsSummary) -> Vec<Recommendation> {
    let cv = summary.cv();
    let productivity = summary.productivity.mean;
    let predictability = summary.predictability.mean;
    let inflation_frequency = summary.inflation.frequency;

    let mut recommendations = Vec::new();

    if let Some(cv) = cv.filter(|cv| *cv > VOLATILITY_CV_PCT) {
        recommendations.push(Recommendation {
            kind: RecommendationKind::VolatilityReduction,
            title: "Volatility Reduction Workshop".to_string(),
            priority: Priority::Urgent,
            rationale: format!(
                "Address {} coefficient of variation through root cause analysis",
                fmt_cv(Some(cv))
            ),
        });
    }

    if above(inflation_frequency, INFLATION_FREQUENCY) {
        recommendations.push(Recommendation {
            kind: RecommendationKind::DefinitionOfReady,
            title: "Definition of Ready Enhancement".to_string(),
            priority: Priority::Urgent,
            rationale: format!(
                "Fix systematic inflation pattern affecting {} of sprints",
                fmt_pct0(inflation_frequency)
            ),
        });
    }

    if below(productivity, LOW_PRODUCTIVITY) {
        recommendations.push(Recommendation {
            kind: RecommendationKind::ProductivityBlockers,
            title: "Productivity Blockers Analysis".to_string(),
            priority: Priority::Urgent,
            rationale: format!(
                "Identify constraints limiting productivity to {}",
                fmt_pct(productivity)
            ),
        });
    }

    if let Some(transition) = &summary.transition {
        if summary.new_model.count < NEW_MODEL_BASELINE_SPRINTS {
            recommendations.push(Recommendation {
                kind: RecommendationKind::NewModelBaseline,
                title: "New Model Baseline Discovery".to_string(),
                priority: Priority::Secondary,
                rationale: format!(
                    "Run learning sprints to establish stable baseline under {} SP model",
                    fmt_points(Some(transition.new_velocity))
                ),
            });
        }
    }

    if below(predictability, LOW_PREDICTABILITY) {
        recommendations.push(Recommendation {
            kind: RecommendationKind::EstimationCalibration,
            title: "Estimation Calibration Workshop".to_string(),
            priority: Priority::Secondary,
            rationale: format!(
                "Improve commitment accuracy from {} to 75%+",
                fmt_pct(predictability)
            ),
        });
    }

    if summary.notes.iter().any(|note| mentions_capacity(&note.text)) {
        recommendations.push(Recommendation {
            kind: RecommendationKind::CapacityPlanning,
            title: "Capacity-Adjusted Planning Protocol".to_string(),
            priority: Priority::Secondary,
            rationale: "Implement systematic capacity adjustment for holidays and team changes"
                .to_string(),
        });
    }

    recommendations.sort_by_key(|r| r.priority);
    info!(count = recommendations.len(), "recommendations generated");
    recommendations
}

/// Ready only when volatility, productivity and inflation frequency all
/// clear their gates. An undefined metric never clears its gate.
pub fn assess_readiness(summary: &StatisticsSummary) -> Readiness {
    let cv = summary.cv();
    let productivity = summary.productivity.mean;
    let inflation_frequency = summary.inflation.frequency;

    let mut blockers = Vec::new();
    if !below(cv, READY_CV_PCT) {
        blockers.push(ReadinessBlocker::Volatility(cv));
    }
    if !above(productivity, READY_PRODUCTIVITY) {
        blockers.push(ReadinessBlocker::Productivity(productivity));
    }
    if !below(inflation_frequency, READY_INFLATION_FREQUENCY) {
        blockers.push(ReadinessBlocker::InflationFrequency(inflation_frequency));
    }

    let readiness = Readiness {
        ready: blockers.is_empty(),
        blockers,
    };
    info!(ready = readiness.ready, "readiness assessed");
    readiness
}

pub fn strengths(summary: &StatisticsSummary) -> Vec<String> {
    let mut out = Vec::new();
    if above(summary.productivity.mean, 0.75) {
        out.push(format!(
            "Strong productivity capability ({})",
            fmt_pct(summary.productivity.mean)
        ));
    }
    if above(summary.predictability.mean, 0.75) {
        out.push(format!(
            "Reliable commitment discipline ({})",
            fmt_pct(summary.predictability.mean)
        ));
    }
    if below(summary.cv(), 20.0) {
        out.push(format!(
            "Relatively stable delivery rhythm ({} CV)",
            fmt_cv(summary.cv())
        ));
    }
    out
}

pub fn needs(summary: &StatisticsSummary) -> Vec<String> {
    let mut out = Vec::new();
    if above(summary.cv(), READY_CV_PCT) {
        out.push(format!(
            "Volatility reduction from {} to <15% CV",
            fmt_cv(summary.cv())
        ));
    }
    if below(summary.productivity.mean, READY_PRODUCTIVITY) {
        out.push(format!(
            "Productivity improvement from {} to 70%+",
            fmt_pct0(summary.productivity.mean)
        ));
    }
    if above(summary.inflation.frequency, READY_INFLATION_FREQUENCY) {
        out.push(format!(
            "Inflation frequency reduction from {} to <30%",
            fmt_pct0(summary.inflation.frequency)
        ));
    }
    out
}
