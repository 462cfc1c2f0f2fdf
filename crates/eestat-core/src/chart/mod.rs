//! Line and bar charts drawn with plotters onto a recording backend. Each
//! chart becomes one `ChartPage` of vector shapes.

pub mod backend;
pub mod series;

use plotters::prelude::*;
use polars::prelude::DataFrame;

use crate::catalog::{ChartKind, ChartSpec};
use crate::error::Result;

pub use backend::{PageRecorder, Shape};
use series::{bar_data, line_data, BarData, LineData};

/// Drawing surface in pixels; the PDF writer scales it to points.
pub const PAGE_SIZE: (u32, u32) = (1200, 800);

const PALETTE: [RGBColor; 10] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
    RGBColor(188, 189, 34),
    RGBColor(23, 190, 207),
];

const TITLE_FONT: u32 = 30;
const LABEL_FONT: u32 = 16;
const LEGEND_FONT: u32 = 14;

#[derive(Debug, Clone, PartialEq)]
pub struct ChartPage {
    pub title: String,
    pub size: (u32, u32),
    pub shapes: Vec<Shape>,
}

impl ChartPage {
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.shapes.iter().filter_map(|shape| match shape {
            Shape::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

pub fn render_chart(spec: &ChartSpec, df: &DataFrame) -> Result<ChartPage> {
    let mut shapes = Vec::new();
    match spec.kind {
        ChartKind::Line => {
            let data = line_data(
                df,
                &spec.x,
                &spec.y,
                spec.hue.as_deref(),
                spec.style.as_deref(),
            )?;
            draw_line_chart(PageRecorder::new(&mut shapes, PAGE_SIZE), spec, &data)?;
        }
        ChartKind::Bar => {
            let data = bar_data(df, &spec.x, &spec.y, spec.hue.as_deref())?;
            draw_bar_chart(PageRecorder::new(&mut shapes, PAGE_SIZE), spec, &data)?;
        }
    }

    Ok(ChartPage {
        title: spec.title.clone(),
        size: PAGE_SIZE,
        shapes,
    })
}

fn color(idx: usize) -> RGBColor {
    PALETTE[idx % PALETTE.len()]
}

/// How one style value is stroked: dash length and gap in pixels (`None` is
/// solid), plus the three segments of its 24px legend swatch.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LineDash {
    pattern: Option<(u32, u32)>,
    swatch: [(i32, i32); 3],
}

const LINE_DASHES: [LineDash; 4] = [
    LineDash {
        pattern: None,
        swatch: [(0, 8), (8, 16), (16, 24)],
    },
    LineDash {
        pattern: Some((12, 6)),
        swatch: [(0, 6), (9, 15), (18, 24)],
    },
    LineDash {
        pattern: Some((2, 5)),
        swatch: [(0, 2), (11, 13), (22, 24)],
    },
    LineDash {
        pattern: Some((24, 6)),
        swatch: [(0, 10), (14, 24), (14, 24)],
    },
];

fn line_dash(style: Option<usize>) -> LineDash {
    LINE_DASHES[style.unwrap_or(0) % LINE_DASHES.len()]
}

/// Data extent padded by 5%; empty or single-valued extents are widened.
fn padded_range(values: impl Iterator<Item = f64>, include_zero: bool) -> std::ops::Range<f64> {
    let (mut low, mut high) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if include_zero {
        low = low.min(0.0);
        high = high.max(0.0);
    }
    if !low.is_finite() || !high.is_finite() {
        return 0.0..1.0;
    }
    if high - low < f64::EPSILON {
        return (low - 1.0)..(high + 1.0);
    }
    let pad = (high - low) * 0.05;
    let low = if include_zero && low == 0.0 { 0.0 } else { low - pad };
    let high = if include_zero && high == 0.0 { 0.0 } else { high + pad };
    low..high
}

fn integer_tick(value: f64) -> Option<i64> {
    ((value - value.round()).abs() < 1e-6).then(|| value.round() as i64)
}

fn label_area_width(labels: impl Iterator<Item = usize>) -> u32 {
    let longest = labels.max().unwrap_or(0) as f64;
    (longest * LABEL_FONT as f64 * 0.55 + 40.0).clamp(90.0, 420.0) as u32
}

fn draw_line_chart(backend: PageRecorder<'_>, spec: &ChartSpec, data: &LineData) -> Result<()> {
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;

    let x_range = padded_range(data.points().map(|(x, _)| x), false);
    let y_range = padded_range(data.points().map(|(_, y)| y), false);
    let x_span = (x_range.end - x_range.start).ceil() as usize;

    let mut chart = ChartBuilder::on(&root)
        .caption(spec.title.as_str(), ("sans-serif", TITLE_FONT))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(90)
        .build_cartesian_2d(x_range, y_range)?;

    let x_formatter = |value: &f64| match (data.integer_x, integer_tick(*value)) {
        (true, Some(tick)) => tick.to_string(),
        (true, None) => String::new(),
        (false, _) => format!("{value:.2}"),
    };
    let mut mesh = chart.configure_mesh();
    mesh.x_desc(spec.x.as_str())
        .y_desc(spec.y.as_str())
        .label_style(("sans-serif", LABEL_FONT))
        .x_label_formatter(&x_formatter);
    if data.integer_x {
        mesh.x_labels((x_span + 1).clamp(2, 12));
    }
    mesh.draw()?;

    let with_legend = spec.hue.is_some() || spec.style.is_some();
    for series in &data.series {
        let stroke = color(series.hue.unwrap_or(0)).stroke_width(2);
        let dash = line_dash(series.style);
        let points = series.points.iter().copied();
        let annotation = match dash.pattern {
            None => chart.draw_series(plotters::series::LineSeries::new(points, stroke))?,
            Some((size, spacing)) => chart.draw_series(
                plotters::series::DashedLineSeries::new(points, size, spacing, stroke),
            )?,
        };
        if with_legend {
            let [first, second, third] = dash.swatch;
            annotation.label(data.label(series)).legend(move |(x, y)| {
                EmptyElement::at((x, y))
                    + PathElement::new(vec![(first.0, 0), (first.1, 0)], stroke)
                    + PathElement::new(vec![(second.0, 0), (second.1, 0)], stroke)
                    + PathElement::new(vec![(third.0, 0), (third.1, 0)], stroke)
            });
        }
    }

    if with_legend && !data.series.is_empty() {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .label_font(("sans-serif", LEGEND_FONT))
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
    }

    root.present()?;
    Ok(())
}

fn draw_bar_chart(backend: PageRecorder<'_>, spec: &ChartSpec, data: &BarData) -> Result<()> {
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;

    let categories = data.categories.len().max(1);
    let category_range = -0.5..(categories as f64 - 0.5);
    let value_range = padded_range(data.bars.iter().map(|bar| bar.value), true);
    let groups = data.hues.len().max(1);
    let band = 0.8 / groups as f64;

    let category_label = |value: &f64| {
        integer_tick(*value)
            .and_then(|idx| usize::try_from(idx).ok())
            .and_then(|idx| data.categories.get(idx))
            .map(str::to_string)
            .unwrap_or_default()
    };
    let value_label = |value: &f64| format!("{value:.0}");

    let category_width = label_area_width(data.categories.iter().map(|label| label.chars().count()));
    let (x_range, y_range) = if data.horizontal {
        (value_range, category_range)
    } else {
        (category_range, value_range)
    };

    let mut chart = ChartBuilder::on(&root)
        .caption(spec.title.as_str(), ("sans-serif", TITLE_FONT))
        .margin(20)
        .x_label_area_size(if data.horizontal { 60 } else { 80 })
        .y_label_area_size(if data.horizontal { category_width } else { 90 })
        .build_cartesian_2d(x_range, y_range)?;

    let mut mesh = chart.configure_mesh();
    mesh.x_desc(spec.x.as_str())
        .y_desc(spec.y.as_str())
        .label_style(("sans-serif", LABEL_FONT));
    if data.horizontal {
        mesh.disable_y_mesh()
            .y_labels(categories + 1)
            .y_label_formatter(&category_label)
            .x_label_formatter(&value_label);
    } else {
        mesh.disable_x_mesh()
            .x_labels(categories + 1)
            .x_label_formatter(&category_label)
            .y_label_formatter(&value_label);
    }
    mesh.draw()?;

    let horizontal = data.horizontal;
    let corners = move |category: usize, hue: usize, value: f64| {
        let start = category as f64 - 0.4 + hue as f64 * band;
        let end = start + band;
        if horizontal {
            [(0.0, start), (value, end)]
        } else {
            [(start, 0.0), (end, value)]
        }
    };

    for hue in 0..groups {
        let fill = color(hue);
        let bars = data.bars.iter().filter(|bar| bar.hue == hue);
        let annotation = chart.draw_series(bars.map(|bar| {
            Rectangle::new(corners(bar.category, bar.hue, bar.value), fill.filled())
        }))?;
        if let Some(label) = data.hues.get(hue) {
            annotation.label(label).legend(move |(x, y)| {
                Rectangle::new([(x, y - 6), (x + 16, y + 6)], fill.filled())
            });
        }
    }

    if !data.hues.is_empty() {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::LowerRight)
            .label_font(("sans-serif", LEGEND_FONT))
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
    }

    root.present()?;
    Ok(())
}
