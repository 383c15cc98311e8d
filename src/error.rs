use std::path::PathBuf;

use plotters::drawing::DrawingAreaErrorKind;
use serde::Serialize;
use thiserror::Error;

/// Fatal input problems. Bad cell values never end up here; they are
/// coerced to missing by the loader.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("input file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("required column missing: {0}")]
    MissingColumn(String),

    #[error("input table has a header but no rows")]
    EmptyTable,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a statistic could not be computed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Degenerate {
    #[error("series is empty")]
    EmptySeries,

    #[error("need at least 2 values, got {count}")]
    TooFewSamples { count: usize },

    #[error("mean is zero")]
    ZeroMean,
}

#[derive(Error, Debug)]
#[error("failed to draw dashboard: {0}")]
pub struct DashboardError(String);

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for DashboardError {
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        Self(err.to_string())
    }
}
