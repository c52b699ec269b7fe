//! SVG dose-response chart for one fitted group.
//!
//! The chart overlays, on a log-concentration axis:
//!
//! - the normalized replicate means (scatter)
//! - the production curve (locality 2/3, red)
//! - the reference curve (locality 1.0, orange)
//!
//! All bounds are computed before drawing; `render_fit_chart` only draws.

use std::path::Path;

use plotters::prelude::*;

use crate::error::AppError;
use crate::report::GroupReport;

pub const CHART_TITLE: &str =
    "Relationship of receptor activity (y-axis) to changes in drug concentration (x-axis)";

const CHART_SIZE: (u32, u32) = (1024, 768);
const ORANGE: RGBColor = RGBColor(255, 165, 0);

/// Axis bounds for a chart: `([x_min, x_max], [y_min, y_max])`.
///
/// x is padded by a quarter decade on each side (the axis is logarithmic),
/// y by 10% of its span.
pub fn chart_bounds(report: &GroupReport) -> Option<([f64; 2], [f64; 2])> {
    let fit = &report.fit;
    let all = report
        .points
        .iter()
        .copied()
        .chain(fit.production.points())
        .chain(fit.reference.points())
        .filter(|(x, y)| x.is_finite() && *x > 0.0 && y.is_finite());

    let mut x0 = f64::INFINITY;
    let mut x1 = f64::NEG_INFINITY;
    let mut y0 = f64::INFINITY;
    let mut y1 = f64::NEG_INFINITY;
    for (x, y) in all {
        x0 = x0.min(x);
        x1 = x1.max(x);
        y0 = y0.min(y);
        y1 = y1.max(y);
    }
    if !(x0.is_finite() && y0.is_finite()) {
        return None;
    }

    let pad = 10f64.powf(0.25);
    let (x0, x1) = (x0 / pad, x1 * pad);

    let span = y1 - y0;
    let (y0, y1) = if span > 1e-12 {
        (y0 - 0.1 * span, y1 + 0.1 * span)
    } else {
        (y0 - 1.0, y1 + 1.0)
    };

    Some(([x0, x1], [y0, y1]))
}

/// Render one group's chart to an SVG file.
pub fn render_fit_chart(path: &Path, report: &GroupReport) -> Result<(), AppError> {
    let (x_bounds, y_bounds) = chart_bounds(report).ok_or_else(|| {
        AppError::invalid_data(format!("{}: nothing to plot", report.fit.key))
    })?;

    draw(path, report, x_bounds, y_bounds)
        .map_err(|e| AppError::io(format!("Failed to render chart '{}': {e}", path.display())))
}

fn draw(
    path: &Path,
    report: &GroupReport,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
) -> Result<(), Box<dyn std::error::Error>> {
    let fit = &report.fit;

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(CHART_TITLE, ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d((x_bounds[0]..x_bounds[1]).log_scale(), y_bounds[0]..y_bounds[1])?;

    chart
        .configure_mesh()
        .x_desc(format!("{} concentration (M)", fit.chem_id))
        .y_desc("Normalized response")
        .x_label_formatter(&|v| format!("{v:.0e}"))
        .y_label_formatter(&|v| format!("{v:.2}"))
        .draw()?;

    chart
        .draw_series(report.points.iter().map(|&(x, y)| Circle::new((x, y), 4, BLUE.filled())))?
        .label(format!("{} / {}", fit.key.plate_id, fit.key.row))
        .legend(|(x, y)| Circle::new((x + 10, y), 4, BLUE.filled()));

    chart
        .draw_series(LineSeries::new(fit.production.points(), RED.stroke_width(2)))?
        .label(format!("{} (2/3)", fit.model.name()))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

    chart
        .draw_series(LineSeries::new(fit.reference.points(), ORANGE.stroke_width(2)))?
        .label(format!("{} (1.0)", fit.model.name()))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], ORANGE));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Curve, FitAlgorithm, FitResult, PlateRowKey};

    fn report() -> GroupReport {
        let x = vec![1e-8, 1e-7, 1e-6, 1e-5];
        GroupReport {
            fit: FitResult {
                key: PlateRowKey::new("P1", "2"),
                chem_id: "O-44".to_string(),
                model: FitAlgorithm::Lowess,
                production: Curve { x: x.clone(), y: vec![0.0, -0.1, -0.4, -0.8] },
                reference: Curve { x: x.clone(), y: vec![0.0, -0.2, -0.4, -0.6] },
            },
            points: x.iter().copied().zip([0.05, -0.15, -0.35, -0.85]).collect(),
        }
    }

    #[test]
    fn bounds_cover_all_series_with_padding() {
        let ([x0, x1], [y0, y1]) = chart_bounds(&report()).unwrap();
        assert!(x0 < 1e-8 && x0 > 1e-9);
        assert!(x1 > 1e-5 && x1 < 1e-4);
        assert!(y0 < -0.85);
        assert!(y1 > 0.05);
    }

    #[test]
    fn flat_series_still_gets_a_y_range() {
        let mut r = report();
        r.points.iter_mut().for_each(|p| p.1 = 0.0);
        r.fit.production.y = vec![0.0; 4];
        r.fit.reference.y = vec![0.0; 4];
        let (_, [y0, y1]) = chart_bounds(&r).unwrap();
        assert_eq!((y0, y1), (-1.0, 1.0));
    }

    #[test]
    fn renders_an_svg_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("O-44_P1_2_LOWESS.svg");
        render_fit_chart(&path, &report()).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("receptor activity"));
    }
}
