//! PNG rendering of timelines and scaling series.
//!
//! Three panels are stacked vertically (execution rate, objectives, edges),
//! each in its own color and sharing the x axis. No text is drawn.

use std::path::Path;

use plotters::prelude::*;

use crate::errors::StatsError;
use crate::scaling::ScalingSeries;
use crate::snapshot::Snapshot;

/// Output image size in pixels.
pub const PLOT_SIZE: (u32, u32) = (2000, 800);

const PANEL_COLORS: [RGBColor; 3] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
];

const LINE_WIDTH: u32 = 3;

fn plot_error(error: impl std::fmt::Display) -> StatsError {
    StatsError::Plot(error.to_string())
}

fn span(values: &[f64]) -> (f64, f64) {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    if (max - min).abs() < f64::EPSILON {
        (min - 1.0, max + 1.0)
    } else {
        (min, max)
    }
}

fn render_panels(path: &Path, x: &[f64], panels: [&[f64]; 3]) -> Result<(), StatsError> {
    if x.is_empty() {
        return Err(StatsError::NoData);
    }

    let root = BitMapBackend::new(path, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let (x_min, x_max) = span(x);
    for ((area, values), color) in root.split_evenly((3, 1)).iter().zip(panels).zip(PANEL_COLORS) {
        let y_max = values.iter().copied().fold(1.0, f64::max) * 1.05;

        let mut chart = ChartBuilder::on(area)
            .margin(20)
            .build_cartesian_2d(x_min..x_max, 0.0..y_max)
            .map_err(plot_error)?;

        chart
            .draw_series(LineSeries::new(
                x.iter().copied().zip(values.iter().copied()),
                color.stroke_width(LINE_WIDTH),
            ))
            .map_err(plot_error)?;
    }

    root.present().map_err(plot_error)?;
    tracing::info!(path = %path.display(), "plot written");
    Ok(())
}

/// Renders a timeline over time in seconds.
///
/// # Errors
///
/// Returns [`StatsError::NoData`] for an empty timeline and
/// [`StatsError::Plot`] when the image cannot be produced.
#[allow(clippy::cast_precision_loss)]
pub fn render_timeline(path: &Path, snapshots: &[Snapshot]) -> Result<(), StatsError> {
    let x: Vec<f64> = snapshots.iter().map(|s| s.timestep as f64).collect();
    let execs: Vec<f64> = snapshots.iter().map(|s| s.execs_per_sec).collect();
    let objectives: Vec<f64> = snapshots.iter().map(|s| s.objectives as f64).collect();
    let edges: Vec<f64> = snapshots.iter().map(|s| s.edges as f64).collect();

    render_panels(path, &x, [&execs, &objectives, &edges])
}

/// Renders averages over the client count.
///
/// # Errors
///
/// Returns [`StatsError::NoData`] for an empty series and
/// [`StatsError::Plot`] when the image cannot be produced.
#[allow(clippy::cast_precision_loss)]
pub fn render_scaling(path: &Path, series: &ScalingSeries) -> Result<(), StatsError> {
    let x: Vec<f64> = series.points.iter().map(|p| p.clients as f64).collect();
    let execs: Vec<f64> = series.points.iter().map(|p| p.execs_per_sec).collect();
    let objectives: Vec<f64> = series.points.iter().map(|p| p.objectives).collect();
    let edges: Vec<f64> = series.points.iter().map(|p| p.edges).collect();

    render_panels(path, &x, [&execs, &objectives, &edges])
}
