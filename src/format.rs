pub const UNDEFINED: &str = "n/a";

/// Fraction as a percentage with one decimal: `0.834` -> `83.4%`.
pub fn fmt_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}%", v * 100.0),
        None => UNDEFINED.to_string(),
    }
}

/// Fraction as a whole percentage: `0.4` -> `40%`.
pub fn fmt_pct0(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.0}%", v * 100.0),
        None => UNDEFINED.to_string(),
    }
}

/// A value already expressed in percent, such as the coefficient of variation.
pub fn fmt_cv(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.1}%"),
        None => UNDEFINED.to_string(),
    }
}

pub fn fmt_points(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.1}"),
        None => UNDEFINED.to_string(),
    }
}

pub fn fmt_points0(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.0}"),
        None => UNDEFINED.to_string(),
    }
}

/// Team name with spaces and hyphens removed, used in artifact file names.
pub fn file_stem(team_name: &str) -> String {
    let stem: String = team_name
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .collect();
    if stem.is_empty() {
        "Team".to_string()
    } else {
        stem
    }
}
