use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod dashboard;
mod error;
mod format;
mod loader;
mod metrics;
mod models;
mod pipeline;
mod recommend;
mod report;
#[cfg(test)]
mod test_support;
mod transition;

use crate::format::{file_stem, fmt_cv, fmt_pct, fmt_pct0, fmt_points, fmt_points0};
use crate::pipeline::Analysis;

#[derive(Parser)]
#[command(name = "sprint-analysis")]
#[command(about = "Sprint productivity dashboard and coaching report generator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the dashboard and the coaching report
    Analyze {
        csv: PathBuf,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Print the detailed statistics
    Stats {
        csv: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Write only the markdown coaching report
    Report {
        csv: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn dashboard_name(team_name: &str) -> String {
    format!("{}_Performance_Dashboard.svg", file_stem(team_name))
}

fn report_name(team_name: &str) -> String {
    format!("{}_Performance_Analysis.md", file_stem(team_name))
}

fn load(csv: &Path) -> anyhow::Result<Analysis> {
    let table = loader::load_csv(csv)
        .with_context(|| format!("failed to load sprint data from {}", csv.display()))?;
    Ok(pipeline::analyze(table))
}

fn write_report(analysis: &Analysis, out: &Path, dashboard_file: &str) -> anyhow::Result<()> {
    let model = report::build_report(analysis, dashboard_file, Local::now().naive_local());
    let markdown = report::render_markdown(&model);
    std::fs::write(out, &markdown)
        .with_context(|| format!("failed to write report to {}", out.display()))?;
    info!(
        path = %out.display(),
        words = markdown.split_whitespace().count(),
        "report written"
    );
    Ok(())
}

fn write_dashboard(analysis: &Analysis, out: &Path) -> anyhow::Result<()> {
    let svg = dashboard::render_dashboard(analysis)?;
    std::fs::write(out, svg)
        .with_context(|| format!("failed to write dashboard to {}", out.display()))?;
    info!(path = %out.display(), "dashboard written");
    Ok(())
}

fn print_stats(analysis: &Analysis) {
    let s = &analysis.summary;

    println!("Team: {}", s.team_name);
    println!("Total sprints in file: {}", s.total_rows);
    println!("Sprints with complete data: {}", s.analyzed_sprints);

    println!();
    println!("Productivity Statistics:");
    println!("  Mean: {}", fmt_pct(s.productivity.mean));
    println!("  Std Dev: {}", fmt_pct(s.productivity.std_dev));
    match &s.cv_productivity {
        Ok(cv) => println!("  CV: {}", fmt_cv(Some(*cv))),
        Err(reason) => println!("  CV: undefined ({reason})"),
    }
    println!("  Min: {}", fmt_pct(s.productivity.min));
    println!("  Max: {}", fmt_pct(s.productivity.max));

    println!();
    println!("Predictability Statistics:");
    println!("  Mean: {}", fmt_pct(s.predictability.mean));
    println!("  Std Dev: {}", fmt_pct(s.predictability.std_dev));
    println!("  Min: {}", fmt_pct(s.predictability.min));
    println!("  Max: {}", fmt_pct(s.predictability.max));

    println!();
    println!("Delivery Statistics:");
    println!("  Average Committed: {} SP", fmt_points(s.avg_committed));
    println!("  Average Delivered: {} SP", fmt_points(s.avg_delivered));
    println!("  Gap: {} SP", fmt_points(s.delivery_gap));

    println!();
    println!("Inflation Analysis:");
    println!("  Total Inflation: {} SP", fmt_points0(Some(s.inflation.total)));
    println!(
        "  Sprints with Inflation: {}/{} ({})",
        s.inflation.corrected_sprints,
        s.analyzed_sprints,
        fmt_pct0(s.inflation.frequency)
    );
    println!(
        "  Average per Sprint: {} SP",
        fmt_points(s.inflation.average_per_sprint)
    );

    println!();
    match &s.transition {
        Some(t) => {
            println!(
                "Model transition at {} ({} SP -> {} SP)",
                t.sprint,
                fmt_points(Some(t.old_velocity)),
                fmt_points(Some(t.new_velocity))
            );
            for (label, model) in [("Old", &s.old_model), ("New", &s.new_model)] {
                println!(
                    "  {} Model ({} SP): {} sprints, productivity {}, predictability {}",
                    label,
                    fmt_points0(model.velocity),
                    model.count,
                    fmt_pct(model.mean_productivity),
                    fmt_pct(model.mean_predictability)
                );
            }
        }
        None => println!("No model transition detected"),
    }

    if !s.notes.is_empty() {
        println!();
        println!("Key Sprint Notes:");
        for note in &s.notes {
            println!("  {}: {}", note.sprint, note.text);
        }
    }

    println!();
    println!(
        "Readiness: {}",
        if analysis.readiness.ready {
            "ready"
        } else {
            "not ready"
        }
    );
    for rec in &analysis.recommendations {
        println!(
            "- [P{}] {}: {}",
            rec.priority.rank(),
            rec.title,
            rec.rationale
        );
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive("sprint_performance_analysis=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze { csv, out_dir } => {
            let analysis = load(&csv)?;
            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("failed to create {}", out_dir.display()))?;

            let team = &analysis.summary.team_name;
            let dashboard_file = dashboard_name(team);
            let dashboard_path = out_dir.join(&dashboard_file);
            let report_path = out_dir.join(report_name(team));

            write_dashboard(&analysis, &dashboard_path)?;
            write_report(&analysis, &report_path, &dashboard_file)?;

            println!("Generated files:");
            println!("  1. Dashboard: {}", dashboard_path.display());
            println!("  2. Report:    {}", report_path.display());
            println!();
            println!("Team: {}", team);
            println!("Sprints analyzed: {}", analysis.summary.analyzed_sprints);
            println!(
                "Average productivity: {}",
                fmt_pct(analysis.summary.productivity.mean)
            );
            println!(
                "Coefficient of variation: {}",
                fmt_cv(analysis.summary.cv())
            );
        }
        Commands::Stats { csv, json } => {
            let analysis = load(&csv)?;
            if json {
                let payload = serde_json::json!({
                    "summary": analysis.summary,
                    "recommendations": analysis.recommendations,
                    "readiness": analysis.readiness,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                print_stats(&analysis);
            }
        }
        Commands::Report { csv, out } => {
            let analysis = load(&csv)?;
            let team = &analysis.summary.team_name;
            let out = out.unwrap_or_else(|| PathBuf::from(report_name(team)));
            write_report(&analysis, &out, &dashboard_name(team))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn artifact_names_follow_team_name() {
        assert_eq!(
            dashboard_name("MyTelenet-app"),
            "MyTelenetapp_Performance_Dashboard.svg"
        );
        assert_eq!(report_name("Core Team"), "CoreTeam_Performance_Analysis.md");
    }

    #[test]
    fn analyze_writes_both_artifacts() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let csv_path = dir.path().join("sprints.csv");
        let mut file = std::fs::File::create(&csv_path)?;
        writeln!(file, "Team,Sprint,Target Velocity,Committed SP,Delivered SP,Inflation correction,Productivity,Predictability,Notes")?;
        writeln!(file, "Vega,S25.17,120,120,96,4,80%,78%,")?;
        writeln!(file, "Vega,S25.18,120,125,90,,72%,70%,1 FTE absence")?;
        writeln!(file, "Vega,S25.19,158,150,135,0,90%,85%,")?;

        let analysis = load(&csv_path)?;
        let dashboard_path = dir.path().join(dashboard_name("Vega"));
        let report_path = dir.path().join(report_name("Vega"));
        write_dashboard(&analysis, &dashboard_path)?;
        write_report(&analysis, &report_path, &dashboard_name("Vega"))?;

        let markdown = std::fs::read_to_string(&report_path)?;
        assert!(markdown.contains("# Vega Team Performance Analysis Report"));
        assert!(markdown.contains("Capacity-Adjusted Planning Protocol"));
        assert!(std::fs::read_to_string(&dashboard_path)?.contains("<svg"));
        Ok(())
    }

    #[test]
    fn load_fails_for_missing_file() {
        let err = load(Path::new("/no/such/sprints.csv")).unwrap_err();
        assert!(err.to_string().contains("failed to load sprint data"));
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["sprint-analysis", "stats", "data.csv", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Stats { json: true, .. }));

        let cli = Cli::try_parse_from(["sprint-analysis", "analyze", "data.csv"]).unwrap();
        match cli.command {
            Commands::Analyze { out_dir, .. } => assert_eq!(out_dir, PathBuf::from(".")),
            _ => panic!("expected analyze"),
        }
    }
}
