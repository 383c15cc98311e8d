use std::ops::Range;

use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::error::DashboardError;
use crate::format::fmt_pct0;
use crate::metrics::{mean, moving_average, predictability_values, productivity_values, quantile};
use crate::models::SprintRecord;
use crate::pipeline::Analysis;

const SIZE: (u32, u32) = (1500, 1020);
const FONT: &str = "sans-serif";

const PRIMARY: RGBColor = RGBColor(0x1f, 0x77, 0xb4);
const SECONDARY: RGBColor = RGBColor(0xff, 0x7f, 0x0e);
const SUCCESS: RGBColor = RGBColor(0x2c, 0xa0, 0x2c);
const DANGER: RGBColor = RGBColor(0xd6, 0x27, 0x28);
const OLD_MODEL: RGBColor = RGBColor(0xff, 0x6b, 0x6b);
const NEW_MODEL: RGBColor = RGBColor(0x51, 0xcf, 0x66);
const NEUTRAL: RGBColor = RGBColor(0x80, 0x80, 0x80);

type Area<'b> = DrawingArea<SVGBackend<'b>, Shift>;
type Chart<'a, 'b> = ChartContext<'a, SVGBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;
type DrawResult = Result<(), DashboardError>;

fn bounded(lo: f64, hi: f64) -> Range<f64> {
    if hi > lo {
        lo..hi
    } else {
        lo..lo + 1.0
    }
}

/// Range covering `values` with `pad` of the span added on each side.
fn padded(values: impl IntoIterator<Item = f64>, pad: f64) -> Range<f64> {
    let (lo, hi) = values
        .into_iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() {
        return 0.0..1.0;
    }
    let span = (hi - lo).max(1.0);
    bounded(lo - span * pad, hi + span * pad)
}

/// One slot per sprint, centred on the sprint index.
fn slots(n: usize) -> Range<f64> {
    -0.5..n.max(1) as f64 - 0.5
}

/// Index of the slot at `v`, if `v` sits on one.
fn slot_index(v: f64, n: usize) -> Option<usize> {
    let i = v.round();
    if (v - i).abs() > 1e-6 || i < 0.0 || i as usize >= n {
        return None;
    }
    Some(i as usize)
}

fn slot_label(records: &[SprintRecord], v: f64) -> String {
    slot_index(v, records.len())
        .map(|i| records[i].sprint.clone())
        .unwrap_or_default()
}

/// Splits a series at its gaps; each run becomes one line.
fn gap_runs(points: &[Option<(f64, f64)>]) -> Vec<Vec<(f64, f64)>> {
    points
        .split(|p| p.is_none())
        .map(|run| run.iter().flatten().copied().collect::<Vec<_>>())
        .filter(|run| !run.is_empty())
        .collect()
}

fn percent_points(values: &[Option<f64>]) -> Vec<Option<(f64, f64)>> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| v.map(|v| (i as f64, v * 100.0)))
        .collect()
}

fn panel<'a, 'b>(
    area: &'a Area<'b>,
    title: &str,
    x: Range<f64>,
    y: Range<f64>,
) -> Result<Chart<'a, 'b>, DashboardError> {
    let chart = ChartBuilder::on(area)
        .caption(title, (FONT, 18))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(55)
        .build_cartesian_2d(x, y)?;
    Ok(chart)
}

fn draw_line(
    chart: &mut Chart<'_, '_>,
    points: &[Option<(f64, f64)>],
    style: ShapeStyle,
    label: Option<&str>,
) -> DrawResult {
    for (i, run) in gap_runs(points).into_iter().enumerate() {
        let series = chart.draw_series(LineSeries::new(run, style))?;
        if let (0, Some(label)) = (i, label) {
            series
                .label(label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
        }
    }
    Ok(())
}

fn draw_markers(chart: &mut Chart<'_, '_>, points: &[Option<(f64, f64)>], color: RGBColor) -> DrawResult {
    chart.draw_series(
        points
            .iter()
            .flatten()
            .map(|&(x, y)| Circle::new((x, y), 4, color.filled())),
    )?;
    Ok(())
}

fn rule(
    chart: &mut Chart<'_, '_>,
    from: (f64, f64),
    to: (f64, f64),
    color: RGBColor,
    label: Option<String>,
) -> DrawResult {
    let style = color.stroke_width(2);
    let series = chart.draw_series(LineSeries::new(vec![from, to], style))?;
    if let Some(label) = label {
        series
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
    }
    Ok(())
}

fn hline(chart: &mut Chart<'_, '_>, x: &Range<f64>, y: f64, color: RGBColor, label: Option<String>) -> DrawResult {
    rule(chart, (x.start, y), (x.end, y), color, label)
}

fn vline(chart: &mut Chart<'_, '_>, x: f64, y: &Range<f64>, color: RGBColor, label: Option<String>) -> DrawResult {
    rule(chart, (x, y.start), (x, y.end), color, label)
}

fn legend<'a, 'b: 'a>(chart: &mut Chart<'a, 'b>) -> DrawResult {
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    Ok(())
}

fn note(area: &Area<'_>, title: &str, text: &str) -> DrawResult {
    let area = area.titled(title, (FONT, 18))?;
    let (w, h) = area.dim_in_pixel();
    area.draw(&Text::new(
        text.to_string(),
        (w as i32 / 2 - 110, h as i32 / 2),
        (FONT, 15).into_font().color(&NEUTRAL),
    ))?;
    Ok(())
}

fn average_label(avg: f64) -> Option<String> {
    Some(format!("Average ({})", fmt_pct0(Some(avg))))
}

struct Context<'a> {
    records: &'a [SprintRecord],
    transition_index: Option<usize>,
    transition_label: String,
}

impl Context<'_> {
    fn n(&self) -> usize {
        self.records.len()
    }

    fn mark_transition(&self, chart: &mut Chart<'_, '_>, y: &Range<f64>, labelled: bool) -> DrawResult {
        match self.transition_index {
            Some(i) => vline(
                chart,
                i as f64,
                y,
                DANGER,
                labelled.then(|| self.transition_label.clone()),
            ),
            None => Ok(()),
        }
    }
}

fn productivity_trend(area: &Area<'_>, ctx: &Context, average: Option<f64>) -> DrawResult {
    let values: Vec<Option<f64>> = ctx.records.iter().map(|r| r.productivity).collect();
    let max = values.iter().flatten().fold(0.0_f64, |m, v| m.max(*v)) * 100.0;
    let x = slots(ctx.n());
    let y = bounded(0.0, (max * 1.2).max(10.0));

    let mut chart = panel(area, "Productivity Trend Over Sprints", x.clone(), y.clone())?;
    let sprint = |v: &f64| slot_label(ctx.records, *v);
    chart
        .configure_mesh()
        .x_desc("Sprint")
        .y_desc("Productivity (%)")
        .x_labels(ctx.n())
        .x_label_formatter(&sprint)
        .y_label_formatter(&|v| format!("{v:.0}%"))
        .draw()?;

    let points = percent_points(&values);
    draw_line(&mut chart, &points, PRIMARY.stroke_width(3), Some("Productivity"))?;
    draw_markers(&mut chart, &points, PRIMARY)?;
    if let Some(avg) = average {
        hline(&mut chart, &x, avg * 100.0, SUCCESS, average_label(avg))?;
    }
    ctx.mark_transition(&mut chart, &y, true)?;
    legend(&mut chart)
}

fn predictability_trend(area: &Area<'_>, ctx: &Context, average: Option<f64>) -> DrawResult {
    let values: Vec<Option<f64>> = ctx.records.iter().map(|r| r.predictability).collect();
    let x = slots(ctx.n());
    let y = 0.0..105.0;

    let mut chart = panel(area, "Predictability Evolution", x.clone(), y.clone())?;
    let sprint = |v: &f64| slot_label(ctx.records, *v);
    chart
        .configure_mesh()
        .x_desc("Sprint")
        .y_desc("Predictability (%)")
        .x_labels(ctx.n())
        .x_label_formatter(&sprint)
        .y_label_formatter(&|v| format!("{v:.0}%"))
        .draw()?;

    let points = percent_points(&values);
    draw_line(&mut chart, &points, SECONDARY.stroke_width(3), None)?;
    draw_markers(&mut chart, &points, SECONDARY)?;
    if let Some(avg) = average {
        hline(&mut chart, &x, avg * 100.0, SUCCESS, average_label(avg))?;
    }
    ctx.mark_transition(&mut chart, &y, false)?;
    legend(&mut chart)
}

fn commitment_vs_delivery(area: &Area<'_>, ctx: &Context) -> DrawResult {
    let max = ctx
        .records
        .iter()
        .flat_map(|r| [r.committed, r.delivered])
        .flatten()
        .fold(0.0_f64, f64::max);
    let y = bounded(0.0, (max * 1.1).max(1.0));

    let mut chart = panel(area, "Commitment vs Delivery Comparison", slots(ctx.n()), y.clone())?;
    let sprint = |v: &f64| slot_label(ctx.records, *v);
    chart
        .configure_mesh()
        .x_desc("Sprint")
        .y_desc("Story Points")
        .x_labels(ctx.n())
        .x_label_formatter(&sprint)
        .draw()?;

    for (delivered, offset, color, label) in [
        (false, -0.35, SECONDARY, "Committed"),
        (true, 0.0, PRIMARY, "Delivered"),
    ] {
        let style = color.mix(0.8).filled();
        chart
            .draw_series(ctx.records.iter().enumerate().filter_map(|(i, r)| {
                let v = (if delivered { r.delivered } else { r.committed })?.max(0.0);
                let x = i as f64 + offset;
                Some(Rectangle::new([(x, 0.0), (x + 0.35, v)], style))
            }))?
            .label(label)
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], style));
    }
    ctx.mark_transition(&mut chart, &y, true)?;
    legend(&mut chart)
}

fn box_glyph(chart: &mut Chart<'_, '_>, x: f64, values: &[f64], color: RGBColor) -> DrawResult {
    let (Some(q1), Some(median), Some(q3)) = (
        quantile(values, 0.25),
        quantile(values, 0.5),
        quantile(values, 0.75),
    ) else {
        return Ok(());
    };
    let iqr = q3 - q1;
    let low = values
        .iter()
        .copied()
        .filter(|v| *v >= q1 - 1.5 * iqr)
        .fold(f64::INFINITY, f64::min);
    let high = values
        .iter()
        .copied()
        .filter(|v| *v <= q3 + 1.5 * iqr)
        .fold(f64::NEG_INFINITY, f64::max);
    let half = 0.2;

    chart.draw_series(std::iter::once(PathElement::new(
        vec![(x, low), (x, high)],
        &BLACK,
    )))?;
    chart.draw_series(std::iter::once(Rectangle::new(
        [(x - half, q1), (x + half, q3)],
        color.mix(0.7).filled(),
    )))?;
    chart.draw_series(std::iter::once(Rectangle::new(
        [(x - half, q1), (x + half, q3)],
        &BLACK,
    )))?;
    chart.draw_series(std::iter::once(PathElement::new(
        vec![(x - half, median), (x + half, median)],
        BLACK.stroke_width(2),
    )))?;
    chart.draw_series(
        values
            .iter()
            .filter(|v| **v < low || **v > high)
            .map(|v| Circle::new((x, *v), 3, &BLACK)),
    )?;
    Ok(())
}

fn model_comparison(area: &Area<'_>, analysis: &Analysis) -> DrawResult {
    let title = "Productivity by Model";
    let old: Vec<f64> = productivity_values(&analysis.transition.old_model)
        .into_iter()
        .map(|v| v * 100.0)
        .collect();
    let new: Vec<f64> = productivity_values(&analysis.transition.new_model)
        .into_iter()
        .map(|v| v * 100.0)
        .collect();

    if old.is_empty() || new.is_empty() {
        return note(area, title, "Insufficient data for comparison");
    }

    let summary = &analysis.summary;
    let labels = [
        format!("Old Model ({:.0} SP)", summary.old_model.velocity.unwrap_or_default()),
        format!("New Model ({:.0} SP)", summary.new_model.velocity.unwrap_or_default()),
    ];
    let model = |v: &f64| {
        slot_index(*v, labels.len())
            .map(|i| labels[i].clone())
            .unwrap_or_default()
    };

    let y = padded(old.iter().chain(new.iter()).copied(), 0.1);
    let mut chart = panel(area, title, slots(2), y)?;
    chart
        .configure_mesh()
        .y_desc("Productivity (%)")
        .x_labels(2)
        .x_label_formatter(&model)
        .y_label_formatter(&|v| format!("{v:.0}%"))
        .draw()?;

    box_glyph(&mut chart, 0.0, &old, OLD_MODEL)?;
    box_glyph(&mut chart, 1.0, &new, NEW_MODEL)
}

fn inflation_corrections(area: &Area<'_>, ctx: &Context) -> DrawResult {
    let n = ctx.n();
    let extent = ctx
        .records
        .iter()
        .map(|r| r.inflation_correction.abs())
        .fold(1.0_f64, f64::max)
        * 1.1;

    let mut chart = panel(area, "Inflation Corrections", bounded(-extent, extent), slots(n))?;
    // First sprint on the top row.
    let sprint = |v: &f64| {
        slot_index(*v, n)
            .map(|row| ctx.records[n - 1 - row].sprint.clone())
            .unwrap_or_default()
    };
    chart
        .configure_mesh()
        .x_desc("Story Points")
        .y_desc("Sprint")
        .y_labels(n)
        .y_label_formatter(&sprint)
        .draw()?;

    chart.draw_series(ctx.records.iter().enumerate().map(|(i, r)| {
        let value = r.inflation_correction;
        let color = if value < 0.0 {
            DANGER
        } else if value > 0.0 {
            SUCCESS
        } else {
            NEUTRAL
        };
        let y = (n - 1 - i) as f64;
        Rectangle::new([(0.0, y - 0.35), (value, y + 0.35)], color.mix(0.7).filled())
    }))?;
    chart.draw_series(std::iter::once(PathElement::new(
        vec![(0.0, -0.5), (0.0, n as f64 - 0.5)],
        &BLACK,
    )))?;
    Ok(())
}

fn percent_pairs(records: &[SprintRecord]) -> Vec<(f64, f64)> {
    records
        .iter()
        .filter_map(|r| Some((r.productivity? * 100.0, r.predictability? * 100.0)))
        .collect()
}

fn productivity_vs_predictability(area: &Area<'_>, analysis: &Analysis) -> DrawResult {
    let old = percent_pairs(&analysis.transition.old_model);
    let new = percent_pairs(&analysis.transition.new_model);

    let x = padded(old.iter().chain(new.iter()).map(|p| p.0), 0.1);
    let y = padded(old.iter().chain(new.iter()).map(|p| p.1), 0.1);

    let mut chart = panel(area, "Productivity vs Predictability", x.clone(), y.clone())?;
    chart
        .configure_mesh()
        .x_desc("Productivity (%)")
        .y_desc("Predictability (%)")
        .x_label_formatter(&|v| format!("{v:.0}%"))
        .y_label_formatter(&|v| format!("{v:.0}%"))
        .draw()?;

    let summary = &analysis.summary;
    if let Some(avg) = summary.predictability.mean {
        hline(&mut chart, &x, avg * 100.0, NEUTRAL, None)?;
    }
    if let Some(avg) = summary.productivity.mean {
        vline(&mut chart, avg * 100.0, &y, NEUTRAL, None)?;
    }

    let velocity = |v: Option<f64>| format!("{:.0} SP", v.unwrap_or_default());
    for (points, color, label) in [
        (&old, OLD_MODEL, velocity(summary.old_model.velocity)),
        (&new, NEW_MODEL, velocity(summary.new_model.velocity)),
    ] {
        if points.is_empty() {
            continue;
        }
        let style = color.mix(0.7).filled();
        chart
            .draw_series(points.iter().map(|&(x, y)| Circle::new((x, y), 6, style)))?
            .label(label)
            .legend(move |(x, y)| Circle::new((x + 10, y), 5, style));
    }
    legend(&mut chart)
}

fn moving_averages(area: &Area<'_>, ctx: &Context) -> DrawResult {
    let values = productivity_values(ctx.records);
    let y = padded(values.iter().map(|v| v * 100.0), 0.1);

    let mut chart = panel(area, "Moving Averages", slots(values.len()), y)?;
    let sprint = |v: &f64| slot_label(ctx.records, *v);
    chart
        .configure_mesh()
        .x_desc("Sprint")
        .y_desc("Productivity (%)")
        .x_labels(ctx.n())
        .x_label_formatter(&sprint)
        .y_label_formatter(&|v| format!("{v:.0}%"))
        .draw()?;

    let actual: Vec<Option<f64>> = values.iter().copied().map(Some).collect();
    let points = percent_points(&actual);
    draw_line(&mut chart, &points, PRIMARY.stroke_width(2), Some("Actual"))?;
    draw_markers(&mut chart, &points, PRIMARY)?;
    draw_line(
        &mut chart,
        &percent_points(&moving_average(&values, 2)),
        SECONDARY.stroke_width(3),
        Some("2-Sprint MA"),
    )?;
    draw_line(
        &mut chart,
        &percent_points(&moving_average(&values, 3)),
        SUCCESS.stroke_width(3),
        Some("3-Sprint MA"),
    )?;
    legend(&mut chart)
}

fn draw_panels(root: &Area<'_>, analysis: &Analysis) -> DrawResult {
    root.fill(&WHITE)?;
    let title = format!("{} Team Performance Dashboard", analysis.summary.team_name);
    let root = root.titled(&title, (FONT, 26))?;

    if analysis.clean.is_empty() {
        let (w, h) = root.dim_in_pixel();
        root.draw(&Text::new(
            "No sprints with productivity data",
            (w as i32 / 2 - 150, h as i32 / 2),
            (FONT, 20).into_font().color(&NEUTRAL),
        ))?;
        return Ok(());
    }

    let records = analysis.clean.records();
    let ctx = Context {
        records,
        transition_index: analysis.transition.transition_index(&analysis.clean),
        transition_label: analysis
            .summary
            .transition
            .as_ref()
            .map(|t| format!("Model Transition ({:.0}→{:.0} SP)", t.old_velocity, t.new_velocity))
            .unwrap_or_default(),
    };

    let rows = root.split_evenly((3, 1));
    let wide = rows[0].dim_in_pixel().0 as i32 * 2 / 3;

    let (trend, predictability) = rows[0].split_horizontally(wide);
    productivity_trend(&trend, &ctx, analysis.summary.productivity.mean)?;
    predictability_trend(&predictability, &ctx, mean(&predictability_values(records)))?;

    let (delivery, models) = rows[1].split_horizontally(wide);
    commitment_vs_delivery(&delivery, &ctx)?;
    model_comparison(&models, analysis)?;

    let bottom = rows[2].split_evenly((1, 3));
    inflation_corrections(&bottom[0], &ctx)?;
    productivity_vs_predictability(&bottom[1], analysis)?;
    moving_averages(&bottom[2], &ctx)
}

/// Renders the seven-panel dashboard as an SVG document.
pub fn render_dashboard(analysis: &Analysis) -> Result<String, DashboardError> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, SIZE).into_drawing_area();
        draw_panels(&root, analysis)?;
        root.present()?;
    }
    Ok(svg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SprintTable;
    use crate::pipeline::analyze;
    use crate::test_support::series;

    fn analysis(velocities: &[f64]) -> Analysis {
        let mut records = series(velocities, 0.8);
        for (i, r) in records.iter_mut().enumerate() {
            r.productivity = Some(0.6 + 0.05 * i as f64);
        }
        records[0].inflation_correction = -6.0;
        analyze(SprintTable {
            team_name: "Core".to_string(),
            records,
        })
    }

    #[test]
    fn renders_all_panels() {
        let svg = render_dashboard(&analysis(&[120.0, 120.0, 158.0, 158.0])).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        for title in [
            "Core Team Performance Dashboard",
            "Productivity Trend Over Sprints",
            "Predictability Evolution",
            "Commitment vs Delivery Comparison",
            "Productivity by Model",
            "Inflation Corrections",
            "Productivity vs Predictability",
            "Moving Averages",
        ] {
            assert!(svg.contains(title), "missing panel {title}");
        }
        assert!(svg.contains("Model Transition (120→158 SP)"));
    }

    #[test]
    fn single_model_skips_box_plot() {
        let svg = render_dashboard(&analysis(&[120.0, 120.0, 120.0])).unwrap();
        assert!(svg.contains("Insufficient data for comparison"));
        assert!(!svg.contains("Model Transition ("));
    }

    #[test]
    fn empty_series_still_renders() {
        let table = SprintTable {
            team_name: "Empty".to_string(),
            records: Vec::new(),
        };
        let svg = render_dashboard(&analyze(table)).unwrap();
        assert!(svg.contains("No sprints with productivity data"));
    }

    #[test]
    fn lines_break_on_gaps() {
        let points = [Some((0.0, 0.0)), None, Some((1.0, 1.0)), Some((2.0, 2.0))];
        assert_eq!(
            gap_runs(&points),
            vec![vec![(0.0, 0.0)], vec![(1.0, 1.0), (2.0, 2.0)]]
        );
        assert!(gap_runs(&[None, None]).is_empty());
    }

    #[test]
    fn sprint_labels_only_on_whole_slots() {
        let records = series(&[120.0, 120.0], 0.8);
        assert_eq!(slot_label(&records, 1.0), "S25.02");
        assert_eq!(slot_label(&records, 0.5), "");
        assert_eq!(slot_label(&records, 5.0), "");
    }
}
