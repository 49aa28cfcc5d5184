//! Trailing-window kernels over plain slices.
//!
//! Every output has the input's length. A value at index `t` only reads
//! inputs at `<= t`, except [`forward_returns`] which is the label source.
//! Warm-up positions are `None`, never back-filled.

use chrono::{Datelike, NaiveDate};
use std::f64::consts::PI;

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// `close[t] / close[t-1] - 1`.
pub fn simple_returns(close: &[f64]) -> Vec<Option<f64>> {
    let mut out = vec![None; close.len()];
    for t in 1..close.len() {
        out[t] = finite(close[t] / close[t - 1] - 1.0);
    }
    out
}

/// `close[t+1] / close[t] - 1`; the last position has no successor.
pub fn forward_returns(close: &[f64]) -> Vec<Option<f64>> {
    let mut out = vec![None; close.len()];
    for t in 0..close.len().saturating_sub(1) {
        out[t] = finite(close[t + 1] / close[t] - 1.0);
    }
    out
}

/// Wilder smoothing with `alpha = 1/period`, seeded with the first value.
fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let alpha = 1.0 / period as f64;
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &value in values {
        let next = match prev {
            Some(p) => alpha * value + (1.0 - alpha) * p,
            None => value,
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

/// Relative strength index.
///
/// The first change is taken as zero gain and zero loss, so the smoothed
/// averages exist from index 0 and the index is reported from `period - 1`.
/// A window without any movement yields 50.
pub fn rsi(close: &[f64], period: usize) -> Vec<Option<f64>> {
    let len = close.len();
    if period == 0 || len < period {
        return vec![None; len];
    }

    let mut gains = vec![0.0; len];
    let mut losses = vec![0.0; len];
    for t in 1..len {
        let change = close[t] - close[t - 1];
        gains[t] = change.max(0.0);
        losses[t] = (-change).max(0.0);
    }

    let avg_gain = wilder_smooth(&gains, period);
    let avg_loss = wilder_smooth(&losses, period);

    (0..len)
        .map(|t| {
            if t + 1 < period {
                return None;
            }
            let (gain, loss) = (avg_gain[t], avg_loss[t]);
            let value = if gain == 0.0 && loss == 0.0 {
                50.0
            } else if loss == 0.0 {
                100.0
            } else {
                100.0 - 100.0 / (1.0 + gain / loss)
            };
            finite(value)
        })
        .collect()
}

/// `max(high-low, |high-prev_close|, |low-prev_close|)`; the first row uses `high-low`.
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    (0..close.len())
        .map(|t| {
            let high_low = high[t] - low[t];
            if t == 0 {
                return high_low;
            }
            let high_close = (high[t] - close[t - 1]).abs();
            let low_close = (low[t] - close[t - 1]).abs();
            high_low.max(high_close).max(low_close)
        })
        .collect()
}

/// Average true range: mean of the first `period` true ranges, then
/// `(prev * (period - 1) + tr) / period`.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<Option<f64>> {
    let len = close.len();
    let mut out = vec![None; len];
    if period == 0 || len < period {
        return out;
    }

    let tr = true_range(high, low, close);
    let mut prev = tr[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = finite(prev);
    for t in period..len {
        prev = (prev * (period - 1) as f64 + tr[t]) / period as f64;
        out[t] = finite(prev);
    }
    out
}

/// Least-squares slope of the trailing `window` values against `0..window`.
pub fn rolling_slope(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let len = values.len();
    let mut out = vec![None; len];
    if window < 2 || len < window {
        return out;
    }

    let x_mean = (window - 1) as f64 / 2.0;
    let ss_x: f64 = (0..window).map(|i| (i as f64 - x_mean).powi(2)).sum();

    for t in window - 1..len {
        let slice = &values[t + 1 - window..=t];
        let Some(ys) = slice.iter().copied().collect::<Option<Vec<f64>>>() else {
            continue;
        };
        let y_mean = ys.iter().sum::<f64>() / window as f64;
        let cov: f64 = ys
            .iter()
            .enumerate()
            .map(|(i, y)| (i as f64 - x_mean) * (y - y_mean))
            .sum();
        out[t] = finite(cov / ss_x);
    }
    out
}

/// Stand-in volume for feeds without one: `(high - low) / close * 1e6`.
pub fn synthetic_volume(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    (0..close.len())
        .map(|t| (high[t] - low[t]) / close[t] * 1_000_000.0)
        .collect()
}

/// Calendar columns for one day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalendarFeatures {
    pub month: i32,
    pub quarter: i32,
    /// 0 = Monday .. 6 = Sunday
    pub day_of_week: i32,
    pub is_month_end: i32,
    pub month_sin: f64,
    pub month_cos: f64,
    pub day_sin: f64,
    pub day_cos: f64,
}

impl CalendarFeatures {
    pub fn from_date(date: NaiveDate) -> Self {
        let month = date.month() as i32;
        let day_of_week = date.weekday().num_days_from_monday() as i32;
        let is_month_end = date.succ_opt().is_none_or(|next| next.month() != date.month());

        let month_angle = 2.0 * PI * month as f64 / 12.0;
        let day_angle = 2.0 * PI * day_of_week as f64 / 7.0;

        Self {
            month,
            quarter: (month - 1) / 3 + 1,
            day_of_week,
            is_month_end: is_month_end as i32,
            month_sin: month_angle.sin(),
            month_cos: month_angle.cos(),
            day_sin: day_angle.sin(),
            day_cos: day_angle.cos(),
        }
    }
}
