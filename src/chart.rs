//! Chart rendering sink.
//!
//! The analytics core hands a `(label, value)` series and a chart kind to a
//! [`ChartSink`] and gets back an opaque [`ChartImage`]. The bundled
//! [`SvgChartSink`] draws with Plotters' SVG backend.

use crate::error::{AnalysisError, AnalysisResult};
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::fmt;
use std::str::FromStr;

/// Palette cycled across bars and pie slices
const SERIES_COLORS: [RGBColor; 6] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
}

impl FromStr for ChartKind {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bar" => Ok(ChartKind::Bar),
            "line" => Ok(ChartKind::Line),
            "pie" => Ok(ChartKind::Pie),
            other => Err(AnalysisError::InvalidChartKind(other.to_string())),
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Pie => "pie",
        };
        write!(f, "{}", name)
    }
}

/// Encoded chart plus the request it was drawn for.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartImage {
    pub kind: ChartKind,
    pub title: String,
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

pub trait ChartSink {
    fn render(
        &self,
        kind: ChartKind,
        series: &[(String, f64)],
        title: &str,
    ) -> AnalysisResult<ChartImage>;
}

#[derive(Debug, Clone, Copy)]
pub struct SvgChartSink {
    pub width: u32,
    pub height: u32,
}

impl Default for SvgChartSink {
    fn default() -> Self {
        Self {
            width: 800,
            height: 400,
        }
    }
}

fn render_err<E: std::error::Error + Send + Sync>(e: DrawingAreaErrorKind<E>) -> AnalysisError {
    AnalysisError::Render(e.to_string())
}

fn value_range(series: &[(String, f64)]) -> (f64, f64) {
    let lo = series.iter().map(|(_, v)| *v).fold(0.0_f64, f64::min);
    let hi = series.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max);
    if (hi - lo).abs() < f64::EPSILON {
        (lo, lo + 1.0)
    } else {
        (lo, hi * 1.1)
    }
}

impl SvgChartSink {
    fn draw_bars<DB: DrawingBackend>(
        root: &DrawingArea<DB, plotters::coord::Shift>,
        series: &[(String, f64)],
    ) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
        let (lo, hi) = value_range(series);
        let mut chart = ChartBuilder::on(root)
            .margin(20)
            .build_cartesian_2d(0f64..series.len() as f64, lo..hi)?;
        chart.draw_series(series.iter().enumerate().map(|(i, (_, v))| {
            let color = SERIES_COLORS[i % SERIES_COLORS.len()];
            Rectangle::new([(i as f64 + 0.1, 0.0), (i as f64 + 0.9, *v)], color.filled())
        }))?;
        Ok(())
    }

    fn draw_line<DB: DrawingBackend>(
        root: &DrawingArea<DB, plotters::coord::Shift>,
        series: &[(String, f64)],
    ) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
        let (lo, hi) = value_range(series);
        let last = (series.len().max(2) - 1) as f64;
        let mut chart = ChartBuilder::on(root)
            .margin(20)
            .build_cartesian_2d(-0.5f64..last + 0.5, lo..hi)?;
        let points: Vec<(f64, f64)> = series
            .iter()
            .enumerate()
            .map(|(i, (_, v))| (i as f64, *v))
            .collect();
        chart.draw_series(LineSeries::new(points.clone(), SERIES_COLORS[0].stroke_width(2)))?;
        chart.draw_series(
            points
                .into_iter()
                .map(|p| Circle::new(p, 4, SERIES_COLORS[0].filled())),
        )?;
        Ok(())
    }

    fn draw_pie<DB: DrawingBackend>(
        root: &DrawingArea<DB, plotters::coord::Shift>,
        series: &[(String, f64)],
        total: f64,
    ) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
        let mut chart = ChartBuilder::on(root)
            .margin(20)
            .build_cartesian_2d(-1.1f64..1.1, -1.1f64..1.1)?;
        let mut start = 0.0;
        for (i, (_, v)) in series.iter().enumerate() {
            let sweep = v.max(0.0) / total * TAU;
            if sweep <= 0.0 {
                continue;
            }
            let steps = ((sweep / TAU) * 90.0).ceil().max(2.0) as usize;
            let mut wedge = vec![(0.0, 0.0)];
            wedge.extend((0..=steps).map(|s| {
                let angle = start + sweep * s as f64 / steps as f64;
                (angle.cos(), angle.sin())
            }));
            let color = SERIES_COLORS[i % SERIES_COLORS.len()];
            chart.draw_series(std::iter::once(Polygon::new(wedge, color.filled())))?;
            start += sweep;
        }
        Ok(())
    }
}

impl ChartSink for SvgChartSink {
    fn render(
        &self,
        kind: ChartKind,
        series: &[(String, f64)],
        title: &str,
    ) -> AnalysisResult<ChartImage> {
        if series.is_empty() {
            return Err(AnalysisError::EmptyInput);
        }
        let pie_total: f64 = series.iter().map(|(_, v)| v.max(0.0)).sum();
        if kind == ChartKind::Pie && pie_total <= 0.0 {
            return Err(AnalysisError::EmptyInput);
        }

        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (self.width, self.height))
                .into_drawing_area();
            root.fill(&WHITE).map_err(render_err)?;
            match kind {
                ChartKind::Bar => Self::draw_bars(&root, series),
                ChartKind::Line => Self::draw_line(&root, series),
                ChartKind::Pie => Self::draw_pie(&root, series, pie_total),
            }
            .map_err(render_err)?;
            root.present().map_err(render_err)?;
        }

        Ok(ChartImage {
            kind,
            title: title.to_string(),
            extension: "svg",
            bytes: svg.into_bytes(),
        })
    }
}
