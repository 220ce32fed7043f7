//! Momentum strategy: percent deviation from the rolling mean.
//!
//! diff[i] = (x[i] - MEAN(n)[i]) / safe(MEAN(n)[i]) × 100, safe(0) = 1.
//! Long when diff > thres, short when diff < -thres.

use crate::domain::indicator::rolling::rolling_mean;
use crate::domain::indicator::{decide, IndicatorFrame};
use crate::domain::series::{values, SeriesPoint};
use crate::domain::signal::Signal;
use crate::domain::strategy::{Mode, StrategyKind};

pub fn calculate_momentum(
    series: &[SeriesPoint],
    window: usize,
    threshold: f64,
    mode: Mode,
) -> IndicatorFrame {
    let xs = values(series);
    let ma = rolling_mean(&xs, window);

    let diff: Vec<Option<f64>> = xs
        .iter()
        .zip(&ma)
        .map(|(x, m)| {
            m.map(|m| {
                let safe = if m == 0.0 { 1.0 } else { m };
                (x - m) / safe * 100.0
            })
        })
        .collect();

    let pos: Vec<Signal> = diff
        .iter()
        .map(|d| match d {
            Some(d) => decide(mode, *d > threshold, *d < -threshold),
            None => Signal::Flat,
        })
        .collect();

    IndicatorFrame::assemble(
        StrategyKind::Momentum { window, threshold },
        series,
        vec![("ma", ma), ("diff", diff)],
        pos,
    )
}
