use std::fmt::Write;

use chrono::NaiveDateTime;

use crate::format::{fmt_cv, fmt_pct, fmt_pct0, fmt_points, fmt_points0};
use crate::models::ReadinessBlocker;
use crate::pipeline::Analysis;
use crate::recommend;
use crate::transition::change;

const MAX_NOTES: usize = 10;
const MAX_RECOMMENDATIONS: usize = 6;
const MAX_BOTTOM_LINE_ITEMS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(String),
    Bullets(Vec<String>),
    Table {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Image {
        alt: String,
        path: String,
    },
    Subheading(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub heading: String,
    pub blocks: Vec<Block>,
}

impl Section {
    fn new(heading: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            blocks: Vec::new(),
        }
    }

    fn push(&mut self, block: Block) -> &mut Self {
        self.blocks.push(block);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub title: String,
    pub preamble: Vec<String>,
    pub sections: Vec<Section>,
    pub footer: Vec<String>,
}

fn table(headers: &[&str], rows: Vec<Vec<String>>) -> Block {
    Block::Table {
        headers: headers.iter().map(|h| h.to_string()).collect(),
        rows,
    }
}

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

fn blocker_text(blocker: &ReadinessBlocker) -> String {
    match blocker {
        ReadinessBlocker::Volatility(cv) => format!("reduce volatility from {} to <15%", fmt_cv(*cv)),
        ReadinessBlocker::Productivity(p) => {
            format!("improve productivity from {} to 70%+", fmt_pct0(*p))
        }
        ReadinessBlocker::InflationFrequency(f) => {
            format!("reduce inflation frequency from {} to <30%", fmt_pct0(*f))
        }
    }
}

fn executive_summary(analysis: &Analysis) -> Section {
    let s = &analysis.summary;
    let cv = s.cv();

    let productivity_status = if s.productivity.mean.is_some_and(|p| p > 0.75) {
        "exceeding 75-85% benchmark"
    } else {
        "below 75-85% benchmark"
    };
    let cv_status = if cv.is_some_and(|cv| cv < 15.0) {
        "mature and stable"
    } else {
        "volatile and unstable"
    };

    let mut findings = vec![
        format!(
            "**Productivity:** {} average ({})",
            fmt_pct(s.productivity.mean),
            productivity_status
        ),
        format!("**Predictability:** {} average", fmt_pct(s.predictability.mean)),
        format!(
            "**Volatility:** {} coefficient of variation ({}, benchmark: <15%)",
            fmt_cv(cv),
            cv_status
        ),
        format!(
            "**Inflation:** {} SP across {} sprints ({} of sprints)",
            fmt_points0(Some(s.inflation.total)),
            s.inflation.corrected_sprints,
            fmt_pct0(s.inflation.frequency)
        ),
    ];

    if let Some(t) = &s.transition {
        let direction = match change(s.old_model.mean_productivity, s.new_model.mean_productivity) {
            Some(delta) if delta > 0.0 => "improved",
            _ => "declined",
        };
        findings.push(format!(
            "**Model Transition Impact:** Productivity {} from {} to {} after switching from {} SP to {} SP at {}",
            direction,
            fmt_pct(s.old_model.mean_productivity),
            fmt_pct(s.new_model.mean_productivity),
            fmt_points(Some(t.old_velocity)),
            fmt_points(Some(t.new_velocity)),
            t.sprint
        ));
    }

    let bottom_line = if analysis.readiness.ready {
        "**Bottom Line:** Team demonstrates stable performance and is ready for Epic-Based Pricing consideration.".to_string()
    } else {
        let issues: Vec<String> = analysis.readiness.blockers.iter().map(blocker_text).collect();
        format!(
            "**Bottom Line:** Not ready for EBP until: {}.",
            issues.join(", ")
        )
    };

    let mut section = Section::new("Executive Summary");
    section
        .push(Block::Paragraph("**Key Findings:**".to_string()))
        .push(Block::Bullets(findings))
        .push(Block::Paragraph(bottom_line));
    section
}

fn performance_metrics(analysis: &Analysis) -> Section {
    let s = &analysis.summary;
    let mut section = Section::new("Performance Metrics");

    section.push(Block::Subheading("Overall Statistics".to_string()));
    section.push(table(
        &["Metric", "Value", "Industry Benchmark"],
        vec![
            row(&["Average Productivity", &fmt_pct(s.productivity.mean), "75-85%"]),
            row(&["Average Predictability", &fmt_pct(s.predictability.mean), "70-80%"]),
            row(&["Coefficient of Variation", &fmt_cv(s.cv()), "<15%"]),
            row(&[
                "Productivity Range",
                &format!("{} - {}", fmt_pct(s.productivity.min), fmt_pct(s.productivity.max)),
                "-",
            ]),
            row(&[
                "Predictability Range",
                &format!(
                    "{} - {}",
                    fmt_pct(s.predictability.min),
                    fmt_pct(s.predictability.max)
                ),
                "-",
            ]),
        ],
    ));

    section.push(Block::Subheading("Delivery Performance".to_string()));
    section.push(table(
        &["Metric", "Value"],
        vec![
            row(&["Average Committed SP", &fmt_points(s.avg_committed)]),
            row(&["Average Delivered SP", &fmt_points(s.avg_delivered)]),
            row(&["Average Gap", &format!("{} SP", fmt_points(s.delivery_gap))]),
            row(&["Total Inflation", &format!("{} SP", fmt_points0(Some(s.inflation.total)))]),
            row(&[
                "Sprints with Inflation",
                &format!(
                    "{}/{} ({})",
                    s.inflation.corrected_sprints,
                    s.analyzed_sprints,
                    fmt_pct0(s.inflation.frequency)
                ),
            ]),
        ],
    ));

    section
}

fn transition_analysis(analysis: &Analysis) -> Option<Section> {
    let s = &analysis.summary;
    let t = s.transition.as_ref()?;
    let (old, new) = (&s.old_model, &s.new_model);

    let mut section = Section::new("Model Transition Analysis");
    section.push(Block::Paragraph(format!(
        "**Transition Point:** {} ({} SP → {} SP)",
        t.sprint,
        fmt_points(Some(t.old_velocity)),
        fmt_points(Some(t.new_velocity))
    )));
    section.push(table(
        &["Metric", "Old Model", "New Model", "Change"],
        vec![
            row(&[
                "Avg Productivity",
                &fmt_pct(old.mean_productivity),
                &fmt_pct(new.mean_productivity),
                &fmt_pct(change(old.mean_productivity, new.mean_productivity)),
            ]),
            row(&[
                "Avg Predictability",
                &fmt_pct(old.mean_predictability),
                &fmt_pct(new.mean_predictability),
                &fmt_pct(change(old.mean_predictability, new.mean_predictability)),
            ]),
            row(&[
                "Sprint Count",
                &old.count.to_string(),
                &new.count.to_string(),
                "-",
            ]),
        ],
    ));
    Some(section)
}

fn key_observations(analysis: &Analysis) -> Section {
    let s = &analysis.summary;
    let productivity = s.productivity.mean;
    let predictability = s.predictability.mean;
    let cv = s.cv();
    let mut section = Section::new("Key Observations");

    let productivity_line = match productivity {
        Some(p) if p > 0.85 => format!(
            "**High Capability:** {} productivity exceeds industry benchmarks",
            fmt_pct(productivity)
        ),
        Some(p) if p < 0.60 => format!(
            "**Below Benchmark:** {} productivity suggests systemic constraints or blockers",
            fmt_pct(productivity)
        ),
        _ => format!(
            "**Moderate Performance:** {} productivity within acceptable range",
            fmt_pct(productivity)
        ),
    };
    let volatility_line = match cv {
        Some(v) if v > 30.0 => format!(
            "**High Volatility:** {} CV indicates severe instability in delivery patterns",
            fmt_cv(cv)
        ),
        Some(v) if v > 15.0 => format!(
            "**Moderate Volatility:** {} CV suggests need for process stabilization",
            fmt_cv(cv)
        ),
        Some(_) => format!(
            "**Stable Performance:** {} CV indicates predictable delivery rhythm",
            fmt_cv(cv)
        ),
        None => "**Volatility Undetermined:** not enough sprints to measure variation".to_string(),
    };
    section.push(Block::Subheading("Productivity Analysis".to_string()));
    section.push(Block::Bullets(vec![productivity_line, volatility_line]));

    let predictability_line = match predictability {
        Some(p) if p > 0.85 => format!(
            "**Strong Commitment Discipline:** {} predictability shows team hits commitments consistently",
            fmt_pct(predictability)
        ),
        Some(p) if p < 0.60 => format!(
            "**Commitment Issues:** {} predictability suggests over-commitment or estimation problems",
            fmt_pct(predictability)
        ),
        _ => format!(
            "**Moderate Predictability:** {} predictability indicates room for improvement",
            fmt_pct(predictability)
        ),
    };
    section.push(Block::Subheading("Predictability Analysis".to_string()));
    section.push(Block::Bullets(vec![predictability_line]));

    let frequency = s.inflation.frequency;
    let inflation_line = match frequency {
        Some(f) if f > 0.7 => format!(
            "**Systematic Inflation Issue:** {} of sprints require corrections, indicating weak Definition of Ready",
            fmt_pct0(frequency)
        ),
        Some(f) if f > 0.3 => format!(
            "**Frequent Adjustments:** {} of sprints need inflation corrections",
            fmt_pct0(frequency)
        ),
        _ if s.inflation.total != 0.0 => format!(
            "**Occasional Corrections:** {} of sprints have inflation adjustments",
            fmt_pct0(frequency)
        ),
        _ => "**Clean Estimation:** No inflation corrections needed".to_string(),
    };
    section.push(Block::Subheading("Inflation Pattern".to_string()));
    section.push(Block::Bullets(vec![inflation_line]));

    if !s.notes.is_empty() {
        let mut notes: Vec<String> = s
            .notes
            .iter()
            .take(MAX_NOTES)
            .map(|n| format!("**{}:** {}", n.sprint, n.text))
            .collect();
        if s.notes.len() > MAX_NOTES {
            notes.push(format!(
                "*...and {} more sprint notes*",
                s.notes.len() - MAX_NOTES
            ));
        }
        section.push(Block::Subheading("Sprint Notes".to_string()));
        section.push(Block::Bullets(notes));
    }

    section
}

fn dashboard_section(analysis: &Analysis, dashboard_file: &str) -> Section {
    let s = &analysis.summary;
    let cv = s.cv();
    let stable = cv.is_some_and(|v| v < 15.0);
    let clustered = cv.is_some_and(|v| v < 20.0);

    let mut section = Section::new("Visual Analysis Dashboard");
    section.push(Block::Image {
        alt: format!("{} Performance Dashboard", s.team_name),
        path: dashboard_file.to_string(),
    });
    section.push(Block::Paragraph("**Dashboard Insights:**".to_string()));
    section.push(Block::Bullets(vec![
        format!(
            "**Top Left:** Productivity trend shows {} over sprint range",
            if stable { "stable progression" } else { "high volatility" }
        ),
        format!(
            "**Top Right:** Predictability evolution indicates {}",
            if s.predictability.mean.is_some_and(|p| p > 0.75) {
                "consistent delivery"
            } else {
                "variable commitment accuracy"
            }
        ),
        format!(
            "**Middle Left:** Commitment vs delivery gap averages {} SP per sprint",
            fmt_points(s.delivery_gap)
        ),
        format!(
            "**Bottom Left:** Inflation corrections total {} SP across {} sprints",
            fmt_points0(Some(s.inflation.total)),
            s.inflation.corrected_sprints
        ),
        format!(
            "**Bottom Center:** Scatter plot reveals {}",
            if clustered {
                "clustered performance pattern"
            } else {
                "dispersed performance pattern"
            }
        ),
        format!(
            "**Bottom Right:** Moving averages {}",
            if clustered {
                "converge toward stable baseline"
            } else {
                "show continued volatility"
            }
        ),
    ]));
    section
}

fn coaching_recommendations(analysis: &Analysis) -> Section {
    let mut section = Section::new("Coaching Recommendations");
    section.push(Block::Subheading("Priority Interventions".to_string()));

    if analysis.recommendations.is_empty() {
        section.push(Block::Paragraph(
            "No interventions triggered; keep tracking the current metrics.".to_string(),
        ));
    }

    for (i, rec) in analysis
        .recommendations
        .iter()
        .take(MAX_RECOMMENDATIONS)
        .enumerate()
    {
        section.push(Block::Subheading(format!("{}. {}", i + 1, rec.title)));
        section.push(Block::Paragraph(format!(
            "**Priority:** {}  \n**Purpose:** {}",
            rec.priority.rank(),
            rec.rationale
        )));
        section.push(Block::Paragraph("**Method:**".to_string()));
        section.push(Block::Bullets(vec![
            "Facilitate team workshop to identify root causes".to_string(),
            "Co-create targeted experiments with measurable outcomes".to_string(),
            "Track improvements over next 3-6 sprints".to_string(),
        ]));
        section.push(Block::Paragraph(
            "**Success Indicator:** Measurable improvement in target metric within 2-3 sprints"
                .to_string(),
        ));
    }
    section
}

fn bottom_line(analysis: &Analysis) -> Section {
    let s = &analysis.summary;
    let mut strengths = recommend::strengths(s);
    let has_strengths = !strengths.is_empty();
    if !has_strengths {
        strengths.push("Willingness to improve and track metrics".to_string());
    }
    let mut needs = recommend::needs(s);
    if needs.is_empty() {
        needs.push("Continued focus on maintaining stable performance".to_string());
    }
    strengths.truncate(MAX_BOTTOM_LINE_ITEMS);
    needs.truncate(MAX_BOTTOM_LINE_ITEMS);

    let stance = format!(
        "**Coaching Stance:** Focus on {}. The path forward involves {}.",
        if has_strengths {
            "celebrating strengths while addressing specific process gaps"
        } else {
            "systematic improvement in core delivery practices"
        },
        if s.transition.is_some() {
            "stabilizing the new model baseline and reducing volatility"
        } else {
            "targeted interventions to improve consistency and predictability"
        }
    );

    let mut section = Section::new("Bottom Line for Coaching");
    section
        .push(Block::Paragraph("**What the Team Has:**".to_string()))
        .push(Block::Bullets(strengths))
        .push(Block::Paragraph("**What the Team Needs:**".to_string()))
        .push(Block::Bullets(needs))
        .push(Block::Paragraph(stance));
    section
}

/// Assembles the coaching report from derived values only.
pub fn build_report(analysis: &Analysis, dashboard_file: &str, generated_at: NaiveDateTime) -> Report {
    let s = &analysis.summary;
    let range = match (&s.first_sprint, &s.last_sprint) {
        (Some(first), Some(last)) => format!("{first} to {last}"),
        _ => "no analyzed sprints".to_string(),
    };

    let mut sections = vec![executive_summary(analysis), performance_metrics(analysis)];
    sections.extend(transition_analysis(analysis));
    sections.push(key_observations(analysis));
    sections.push(dashboard_section(analysis, dashboard_file));
    sections.push(coaching_recommendations(analysis));
    sections.push(bottom_line(analysis));

    Report {
        title: format!("{} Team Performance Analysis Report", s.team_name),
        preamble: vec![
            format!("**Sprint Range:** {} ({} sprints)", range, s.analyzed_sprints),
            format!("**Team:** {}", s.team_name),
            format!("**Analysis Date:** {}", generated_at.format("%Y-%m-%d")),
        ],
        sections,
        footer: vec![
            "**Prepared by:** Sprint Performance Analysis".to_string(),
            format!("**Generated:** {}", generated_at.format("%Y-%m-%d %H:%M:%S")),
        ],
    }
}

fn render_table(output: &mut String, headers: &[String], rows: &[Vec<String>]) {
    let _ = writeln!(output, "| {} |", headers.join(" | "));
    let _ = writeln!(
        output,
        "|{}|",
        headers
            .iter()
            .map(|h| "-".repeat(h.len() + 2))
            .collect::<Vec<_>>()
            .join("|")
    );
    for cells in rows {
        let _ = writeln!(output, "| {} |", cells.join(" | "));
    }
}

pub fn render_markdown(report: &Report) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# {}", report.title);
    for line in &report.preamble {
        let _ = writeln!(output, "{line}  ");
    }

    for section in &report.sections {
        let _ = writeln!(output);
        let _ = writeln!(output, "---");
        let _ = writeln!(output);
        let _ = writeln!(output, "## {}", section.heading);

        for block in &section.blocks {
            let _ = writeln!(output);
            match block {
                Block::Paragraph(text) => {
                    let _ = writeln!(output, "{text}");
                }
                Block::Bullets(items) => {
                    for item in items {
                        let _ = writeln!(output, "- {item}");
                    }
                }
                Block::Table { headers, rows } => render_table(&mut output, headers, rows),
                Block::Image { alt, path } => {
                    let _ = writeln!(output, "![{alt}]({path})");
                }
                Block::Subheading(text) => {
                    let _ = writeln!(output, "### {text}");
                }
            }
        }
    }

    if !report.footer.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "---");
        let _ = writeln!(output);
        for line in &report.footer {
            let _ = writeln!(output, "{line}  ");
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SprintTable;
    use crate::pipeline::analyze;
    use crate::test_support::series;
    use chrono::NaiveDate;

    fn generated_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 11, 8)
            .and_then(|d| d.and_hms_opt(9, 30, 0))
            .unwrap()
    }

    fn analysis_for(velocities: &[f64], productivity: &[f64]) -> Analysis {
        let mut records = series(velocities, 0.8);
        for (record, p) in records.iter_mut().zip(productivity) {
            record.productivity = Some(*p);
            record.predictability = Some(*p);
        }
        analyze(SprintTable {
            team_name: "Orion".to_string(),
            records,
        })
    }

    fn headings(report: &Report) -> Vec<&str> {
        report.sections.iter().map(|s| s.heading.as_str()).collect()
    }

    #[test]
    fn transition_section_only_when_detected() {
        let with = analysis_for(&[120.0, 120.0, 158.0], &[0.7, 0.8, 0.9]);
        let report = build_report(&with, "Orion_Performance_Dashboard.svg", generated_at());
        assert!(headings(&report).contains(&"Model Transition Analysis"));

        let without = analysis_for(&[120.0, 120.0, 120.0], &[0.7, 0.8, 0.9]);
        let report = build_report(&without, "Orion_Performance_Dashboard.svg", generated_at());
        assert!(!headings(&report).contains(&"Model Transition Analysis"));
    }

    #[test]
    fn markdown_contains_title_tables_and_image() {
        let analysis = analysis_for(&[120.0, 120.0, 158.0, 158.0], &[0.6, 0.9, 0.7, 0.95]);
        let markdown = render_markdown(&build_report(
            &analysis,
            "Orion_Performance_Dashboard.svg",
            generated_at(),
        ));

        assert!(markdown.starts_with("# Orion Team Performance Analysis Report\n"));
        assert!(markdown.contains("**Analysis Date:** 2025-11-08"));
        assert!(markdown.contains("| Metric | Value | Industry Benchmark |"));
        assert!(markdown.contains("![Orion Performance Dashboard](Orion_Performance_Dashboard.svg)"));
        assert!(markdown.contains("**Transition Point:** S25.03 (120.0 SP → 158.0 SP)"));
    }

    #[test]
    fn bottom_line_lists_readiness_blockers() {
        let analysis = analysis_for(&[120.0; 4], &[0.5, 0.9, 0.5, 0.7]);
        let markdown = render_markdown(&build_report(&analysis, "d.svg", generated_at()));
        assert!(markdown.contains("Not ready for EBP until: reduce volatility from"));
        assert!(markdown.contains("improve productivity from 65% to 70%+"));
        assert!(!markdown.contains("reduce inflation frequency"));
    }

    #[test]
    fn sprint_notes_are_capped() {
        let mut analysis = analysis_for(&[120.0; 12], &[0.8; 12]);
        let notes: Vec<_> = analysis
            .clean
            .records()
            .iter()
            .map(|r| crate::models::SprintNote {
                sprint: r.sprint.clone(),
                text: "note".to_string(),
            })
            .collect();
        analysis.summary.notes = notes;

        let report = build_report(&analysis, "d.svg", generated_at());
        let observations = report
            .sections
            .iter()
            .find(|s| s.heading == "Key Observations")
            .unwrap();
        let last = observations.blocks.last().unwrap();
        match last {
            Block::Bullets(items) => {
                assert_eq!(items.len(), MAX_NOTES + 1);
                assert_eq!(items[MAX_NOTES], "*...and 2 more sprint notes*");
            }
            other => panic!("unexpected block {other:?}"),
        }
    }

    #[test]
    fn ready_team_gets_positive_bottom_line() {
        let analysis = analysis_for(&[120.0; 4], &[0.8, 0.82, 0.81, 0.8]);
        assert!(analysis.readiness.ready);
        let markdown = render_markdown(&build_report(&analysis, "d.svg", generated_at()));
        assert!(markdown.contains("ready for Epic-Based Pricing consideration"));
    }
}
