// Revenue trend forecasting.
//
// Two strategies share one output shape: a rolling mean over the trailing
// window, and a least-squares line evaluated at the observed indices. The
// line is an in-sample trend; `project` is the separate out-of-sample step.
use crate::error::{AnalysisError, AnalysisResult};
use crate::loader::REVENUE;
use crate::schema::validate;
use crate::types::{ForecastRow, RecordTable};
use crate::util::format_number;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

const MIN_PERIODS: usize = 2;
pub const DEFAULT_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ForecastStrategy {
    RollingMean { window: usize },
    LinearFit,
}

impl Default for ForecastStrategy {
    fn default() -> Self {
        ForecastStrategy::RollingMean {
            window: DEFAULT_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub period: String,
    pub actual: f64,
    pub forecast: f64,
}

impl ForecastPoint {
    pub fn row(&self) -> ForecastRow {
        ForecastRow {
            period: self.period.clone(),
            actual: format_number(self.actual, 2),
            forecast: format_number(self.forecast, 2),
        }
    }
}

/// Fitted `y = slope * x + intercept` over `x = 0..n`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearTrend {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearTrend {
    pub fn at(&self, index: usize) -> f64 {
        self.slope * index as f64 + self.intercept
    }
}

/// Revenue summed per period, in first-seen period order. Rows whose revenue
/// is blank or not a number are dropped, not counted as zero.
pub fn revenue_series(
    table: &RecordTable,
    period: &str,
) -> AnalysisResult<Vec<(String, f64)>> {
    validate(table, &[period, REVENUE])?;
    let periods = table.keys(period)?;
    let revenue = table.numbers_lenient(REVENUE)?;

    let mut series: Vec<(String, f64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut dropped = 0usize;
    for (p, r) in periods.into_iter().zip(revenue) {
        let (Some(p), Some(r)) = (p, r) else {
            dropped += 1;
            continue;
        };
        let slot = *index.entry(p.clone()).or_insert_with(|| {
            series.push((p, 0.0));
            series.len() - 1
        });
        series[slot].1 += r;
    }
    if dropped > 0 {
        debug!(rows = dropped, "dropped rows without numeric revenue or period");
    }
    Ok(series)
}

fn ensure_enough(len: usize) -> AnalysisResult<()> {
    if len < MIN_PERIODS {
        return Err(AnalysisError::InsufficientData {
            needed: MIN_PERIODS,
            found: len,
        });
    }
    Ok(())
}

/// Trailing mean with `min_periods = 1`: the first `window - 1` points
/// average whatever history exists.
pub fn rolling_mean(actual: &[f64], window: usize) -> AnalysisResult<Vec<f64>> {
    if window == 0 {
        return Err(AnalysisError::InvalidWindow(window));
    }
    ensure_enough(actual.len())?;
    Ok((0..actual.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let slice = &actual[start..=i];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect())
}

/// Ordinary least squares over `(index, actual)`.
pub fn fit_line(actual: &[f64]) -> AnalysisResult<LinearTrend> {
    ensure_enough(actual.len())?;
    let n = actual.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = actual.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, y) in actual.iter().enumerate() {
        let dx = i as f64 - mean_x;
        sxy += dx * (y - mean_y);
        sxx += dx * dx;
    }
    let slope = sxy / sxx;
    Ok(LinearTrend {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

/// The fitted line evaluated at the training indices.
pub fn linear_fit(actual: &[f64]) -> AnalysisResult<Vec<f64>> {
    let trend = fit_line(actual)?;
    Ok((0..actual.len()).map(|i| trend.at(i)).collect())
}

pub fn forecast_values(
    actual: &[f64],
    strategy: ForecastStrategy,
) -> AnalysisResult<Vec<f64>> {
    match strategy {
        ForecastStrategy::RollingMean { window } => rolling_mean(actual, window),
        ForecastStrategy::LinearFit => linear_fit(actual),
    }
}

/// Pair each period's actual value with its forecast.
pub fn forecast_series(
    series: &[(String, f64)],
    strategy: ForecastStrategy,
) -> AnalysisResult<Vec<ForecastPoint>> {
    let actual: Vec<f64> = series.iter().map(|(_, v)| *v).collect();
    let forecast = forecast_values(&actual, strategy)?;
    Ok(series
        .iter()
        .zip(forecast)
        .map(|((period, actual), forecast)| ForecastPoint {
            period: period.clone(),
            actual: *actual,
            forecast,
        })
        .collect())
}

/// Forecast revenue per `period` straight from the table.
pub fn forecast_revenue(
    table: &RecordTable,
    period: &str,
    strategy: ForecastStrategy,
) -> AnalysisResult<Vec<ForecastPoint>> {
    let series = revenue_series(table, period)?;
    let points = forecast_series(&series, strategy)?;
    debug!(periods = points.len(), ?strategy, "forecast revenue");
    Ok(points)
}

/// Extend the linear trend `horizon` steps past the last observed index.
pub fn project(actual: &[f64], horizon: usize) -> AnalysisResult<Vec<f64>> {
    let trend = fit_line(actual)?;
    Ok((actual.len()..actual.len() + horizon)
        .map(|i| trend.at(i))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn close(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < EPS)
    }

    #[test]
    fn window_of_one_is_identity() {
        let actual = [3.0, 9.0, 4.0, 7.5];
        assert_eq!(rolling_mean(&actual, 1).unwrap(), actual.to_vec());
    }

    #[test]
    fn short_history_uses_shrinking_window() {
        let got = rolling_mean(&[10.0, 20.0, 30.0, 40.0], 3).unwrap();
        assert!(close(&got, &[10.0, 15.0, 20.0, 30.0]));
    }

    #[test]
    fn rolling_mean_is_causal() {
        let base = [5.0, 1.0, 8.0, 2.0, 6.0, 3.0];
        let before = rolling_mean(&base, 2).unwrap();
        for j in 0..base.len() {
            let mut changed = base;
            changed[j] += 1000.0;
            let after = rolling_mean(&changed, 2).unwrap();
            assert_eq!(before[..j], after[..j]);
        }
    }

    #[test]
    fn exact_line_is_reproduced() {
        let actual: Vec<f64> = (0..8).map(|i| 2.0 * i as f64 + 5.0).collect();
        let fitted = linear_fit(&actual).unwrap();
        assert!(close(&fitted, &actual));
        let trend = fit_line(&actual).unwrap();
        assert!((trend.slope - 2.0).abs() < EPS);
        assert!((trend.intercept - 5.0).abs() < EPS);
    }

    #[test]
    fn projection_continues_past_the_data() {
        let actual = [5.0, 7.0, 9.0];
        assert!(close(&project(&actual, 2).unwrap(), &[11.0, 13.0]));
    }

    #[test]
    fn too_short_series_is_insufficient() {
        for actual in [&[][..], &[1.0][..]] {
            assert_eq!(
                rolling_mean(actual, 3),
                Err(AnalysisError::InsufficientData {
                    needed: 2,
                    found: actual.len()
                })
            );
            assert!(linear_fit(actual).is_err());
        }
    }

    #[test]
    fn zero_window_is_rejected() {
        assert_eq!(rolling_mean(&[1.0, 2.0], 0), Err(AnalysisError::InvalidWindow(0)));
    }

    #[test]
    fn non_numeric_revenue_rows_are_dropped() {
        let table = RecordTable::from_rows(
            &["Month", "Revenue"],
            &[
                vec!["Jan", "100"],
                vec!["Jan", "n/a"],
                vec!["Feb", ""],
                vec!["Feb", "40"],
                vec!["Mar", "bad"],
            ],
        );
        let series = revenue_series(&table, "Month").unwrap();
        assert_eq!(
            series,
            vec![("Jan".to_string(), 100.0), ("Feb".to_string(), 40.0)]
        );
    }

    #[test]
    fn forecast_points_carry_period_labels() {
        let table = RecordTable::from_rows(
            &["Month", "Revenue"],
            &[vec!["Jan", "10"], vec!["Feb", "20"], vec!["Mar", "60"]],
        );
        let points =
            forecast_revenue(&table, "Month", ForecastStrategy::RollingMean { window: 2 }).unwrap();
        let periods: Vec<&str> = points.iter().map(|p| p.period.as_str()).collect();
        assert_eq!(periods, vec!["Jan", "Feb", "Mar"]);
        assert!(close(
            &points.iter().map(|p| p.forecast).collect::<Vec<_>>(),
            &[10.0, 15.0, 40.0]
        ));
    }
}
