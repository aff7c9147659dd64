//! PNG rendering of comparison and infill charts.

use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::models::{AxisKey, ComparisonTable, TimeSeries};
use crate::report::TextSafeBackend;
use crate::utils::align_longitude;
use crate::utils::constants::{MEASUREMENTS_LABEL, RECONSTRUCTED_LABEL, REFERENCE_LABEL};

const RECONSTRUCTED_COLOR: RGBColor = RGBColor(31, 119, 180);
const REFERENCE_COLOR: RGBColor = RGBColor(255, 127, 14);
const MEASURED_COLOR: RGBColor = RGBColor(44, 160, 44);
const STATION_COLOR: RGBColor = RGBColor(214, 39, 40);
const GRID_COLOR: RGBColor = RGBColor(120, 120, 120);

/// Whether a chart shows values or their difference to the measurements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartMode {
    Delta,
    Absolute,
}

/// Station position and the reference grid around it, drawn as an inset map
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialContext {
    pub station_lat: f64,
    pub station_lon: f64,
    pub grid_lats: Vec<f64>,
    pub grid_lons: Vec<f64>,
}

/// A line broken into contiguous runs of present values
struct ChartLine {
    label: &'static str,
    color: RGBColor,
    segments: Vec<Vec<(f64, f64)>>,
}

impl ChartLine {
    fn from_points(label: &'static str, color: RGBColor, points: impl Iterator<Item = (f64, Option<f64>)>) -> Self {
        let mut segments = Vec::new();
        let mut current: Vec<(f64, f64)> = Vec::new();

        for (x, y) in points {
            match y.filter(|v| v.is_finite()) {
                Some(y) => current.push((x, y)),
                None if !current.is_empty() => segments.push(std::mem::take(&mut current)),
                None => {}
            }
        }
        if !current.is_empty() {
            segments.push(current);
        }

        Self {
            label,
            color,
            segments,
        }
    }

    fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.segments.iter().flatten().map(|(_, y)| *y)
    }

    fn style(&self) -> ShapeStyle {
        ShapeStyle {
            color: self.color.to_rgba(),
            filled: false,
            stroke_width: 2,
        }
    }
}

pub(crate) fn plot_error<E: std::fmt::Display>(err: E) -> PipelineError {
    PipelineError::Plot(err.to_string())
}

/// Render one comparison chart to a PNG file
pub fn render_comparison<K: AxisKey>(
    table: &ComparisonTable<K>,
    title: &str,
    mode: ChartMode,
    context: &SpatialContext,
    size: (u32, u32),
    path: &Path,
) -> Result<()> {
    let backend = BitMapBackend::new(path, size);
    let root = TextSafeBackend::new(backend).into_drawing_area();
    draw_comparison(root, table, title, mode, context)?;
    tracing::debug!(path = %path.display(), title, rows = table.len(), "rendered chart");
    Ok(())
}

fn comparison_lines<K: AxisKey>(table: &ComparisonTable<K>, mode: ChartMode) -> Vec<ChartLine> {
    let rows = table.rows();
    let x = |key: &K| key.position();

    match mode {
        ChartMode::Delta => vec![
            ChartLine::from_points(
                RECONSTRUCTED_LABEL,
                RECONSTRUCTED_COLOR,
                rows.iter().map(|r| (x(&r.key), r.reconstructed_delta())),
            ),
            ChartLine::from_points(
                REFERENCE_LABEL,
                REFERENCE_COLOR,
                rows.iter().map(|r| (x(&r.key), r.reference_delta())),
            ),
        ],
        ChartMode::Absolute => vec![
            ChartLine::from_points(
                RECONSTRUCTED_LABEL,
                RECONSTRUCTED_COLOR,
                rows.iter().map(|r| (x(&r.key), r.reconstructed)),
            ),
            ChartLine::from_points(
                REFERENCE_LABEL,
                REFERENCE_COLOR,
                rows.iter().map(|r| (x(&r.key), r.reference)),
            ),
            ChartLine::from_points(
                MEASUREMENTS_LABEL,
                MEASURED_COLOR,
                rows.iter().map(|r| (x(&r.key), r.measured)),
            ),
        ],
    }
}

fn draw_comparison<DB, K>(
    root: DrawingArea<DB, Shift>,
    table: &ComparisonTable<K>,
    title: &str,
    mode: ChartMode,
    context: &SpatialContext,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
    K: AxisKey,
{
    root.fill(&WHITE).map_err(plot_error)?;

    let (width, _) = root.dim_in_pixel();
    let (main, side) = root.split_horizontally((width as f64 * 0.78) as u32);
    let (map_area, _) = side.split_vertically(side.dim_in_pixel().1 / 2);

    let lines = comparison_lines(table, mode);
    let x_range = padded_range(table.keys().map(|k| k.position()), 0.0);
    let mut y_values: Vec<f64> = lines.iter().flat_map(ChartLine::values).collect();
    if mode == ChartMode::Delta {
        y_values.push(0.0);
    }
    let y_range = padded_range(y_values.into_iter(), 0.05);

    let y_desc = match mode {
        ChartMode::Delta => "Difference to measurements (°C)",
        ChartMode::Absolute => "Air temperature (°C)",
    };

    let mut chart = ChartBuilder::on(&main)
        .caption(title, ("sans-serif", 32))
        .margin(25)
        .set_label_area_size(LabelAreaPosition::Left, 80)
        .set_label_area_size(LabelAreaPosition::Bottom, 60)
        .build_cartesian_2d(x_range.0..x_range.1, y_range.0..y_range.1)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .x_labels(8)
        .y_labels(10)
        .x_label_formatter(&|v| K::label_at(*v))
        .y_label_formatter(&|v| format!("{:.1}", v))
        .y_desc(y_desc)
        .label_style(("sans-serif", 18))
        .draw()
        .map_err(plot_error)?;

    if mode == ChartMode::Delta {
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(x_range.0, 0.0), (x_range.1, 0.0)],
                BLACK.mix(0.4),
            )))
            .map_err(plot_error)?;
    }

    for line in &lines {
        draw_line(&mut chart, line)?;
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK.mix(0.3))
        .label_font(("sans-serif", 18))
        .position(SeriesLabelPosition::UpperLeft)
        .draw()
        .map_err(plot_error)?;

    draw_spatial_context(&map_area, context)?;

    root.present().map_err(plot_error)?;
    Ok(())
}

fn draw_line<DB: DrawingBackend>(
    chart: &mut ChartContext<'_, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    line: &ChartLine,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let style = line.style();
    let color = line.color;

    chart
        .draw_series(
            line.segments
                .iter()
                .filter(|s| s.len() > 1)
                .map(|segment| PathElement::new(segment.clone(), style)),
        )
        .map_err(plot_error)?
        .label(line.label)
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 30, y)], color));

    // Isolated values have no neighbours to connect to
    chart
        .draw_series(
            line.segments
                .iter()
                .filter(|s| s.len() == 1)
                .map(|segment| Circle::new(segment[0], 3, color.filled())),
        )
        .map_err(plot_error)?;

    Ok(())
}

fn draw_spatial_context<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    context: &SpatialContext,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let station_lon = align_longitude(context.station_lon, &context.grid_lons);

    let lons = context.grid_lons.iter().copied().chain(std::iter::once(station_lon));
    let lats = context.grid_lats.iter().copied().chain(std::iter::once(context.station_lat));
    let lon_range = padded_range(lons, 0.15);
    let lat_range = padded_range(lats, 0.15);

    let mut map = ChartBuilder::on(area)
        .caption("Location", ("sans-serif", 22))
        .margin(20)
        .set_label_area_size(LabelAreaPosition::Left, 50)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(lon_range.0..lon_range.1, lat_range.0..lat_range.1)
        .map_err(plot_error)?;

    map.configure_mesh()
        .x_labels(4)
        .y_labels(4)
        .x_desc("Longitude")
        .y_desc("Latitude")
        .x_label_formatter(&|v| format!("{:.2}", v))
        .y_label_formatter(&|v| format!("{:.2}", v))
        .label_style(("sans-serif", 14))
        .draw()
        .map_err(plot_error)?;

    let grid_points: Vec<(f64, f64)> = context
        .grid_lats
        .iter()
        .flat_map(|&lat| context.grid_lons.iter().map(move |&lon| (lon, lat)))
        .filter(|(lon, lat)| lon.is_finite() && lat.is_finite())
        .collect();

    map.draw_series(
        grid_points
            .into_iter()
            .map(|p| Circle::new(p, 4, GRID_COLOR.filled())),
    )
    .map_err(plot_error)?
    .label(REFERENCE_LABEL)
    .legend(|(x, y)| Circle::new((x, y), 4, GRID_COLOR.filled()));

    map.draw_series(std::iter::once(Circle::new(
        (station_lon, context.station_lat),
        7,
        STATION_COLOR.filled(),
    )))
    .map_err(plot_error)?
    .label("Station")
    .legend(|(x, y)| Circle::new((x, y), 6, STATION_COLOR.filled()));

    map.configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK.mix(0.3))
        .label_font(("sans-serif", 14))
        .draw()
        .map_err(plot_error)?;

    Ok(())
}

/// Render observed and predicted temperature of one sensor
pub fn render_infill(
    observed: &TimeSeries,
    predicted: &TimeSeries,
    size: (u32, u32),
    path: &Path,
) -> Result<()> {
    let backend = BitMapBackend::new(path, size);
    let root = TextSafeBackend::new(backend).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let observed_line = ChartLine::from_points(
        MEASUREMENTS_LABEL,
        MEASURED_COLOR,
        observed.iter().map(|(ts, v)| (ts.position(), Some(v))),
    );
    let predicted_line = ChartLine::from_points(
        RECONSTRUCTED_LABEL,
        RECONSTRUCTED_COLOR,
        predicted.iter().map(|(ts, v)| (ts.position(), Some(v))),
    );

    let x_range = padded_range(
        observed
            .timestamps()
            .iter()
            .chain(predicted.timestamps())
            .map(|ts| ts.position()),
        0.0,
    );
    let y_range = padded_range(observed_line.values().chain(predicted_line.values()), 0.05);

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("{}: measured and gap-filled", observed.name()),
            ("sans-serif", 32),
        )
        .margin(25)
        .set_label_area_size(LabelAreaPosition::Left, 80)
        .set_label_area_size(LabelAreaPosition::Bottom, 60)
        .build_cartesian_2d(x_range.0..x_range.1, y_range.0..y_range.1)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .x_labels(8)
        .x_label_formatter(&|v| chrono::NaiveDateTime::label_at(*v))
        .y_label_formatter(&|v| format!("{:.1}", v))
        .y_desc("Air temperature (°C)")
        .label_style(("sans-serif", 18))
        .draw()
        .map_err(plot_error)?;

    draw_line(&mut chart, &predicted_line)?;
    draw_line(&mut chart, &observed_line)?;

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK.mix(0.3))
        .label_font(("sans-serif", 18))
        .position(SeriesLabelPosition::UpperLeft)
        .draw()
        .map_err(plot_error)?;

    root.present().map_err(plot_error)?;
    tracing::debug!(path = %path.display(), "rendered infill chart");
    Ok(())
}

/// Finite min/max of `values` widened by `pad` of the span; never empty
fn padded_range(values: impl Iterator<Item = f64>, pad: f64) -> (f64, f64) {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));

    if !min.is_finite() || !max.is_finite() {
        return (-1.0, 1.0);
    }
    if (max - min).abs() < f64::EPSILON {
        return (min - 1.0, max + 1.0);
    }
    let margin = (max - min) * pad;
    (min - margin, max + margin)
}
