//! Z-score strategy.
//!
//! z[i] = (x[i] - MEAN(n)[i]) / STD(n)[i], sample deviation.
//! Long when z > thres, short when z < -thres.
//! Warmup: first (n-1) rows are flat. A constant window has zero deviation
//! and an undefined z, so it stays flat.

use crate::domain::indicator::rolling::{rolling_mean, rolling_std};
use crate::domain::indicator::{decide, IndicatorFrame};
use crate::domain::series::{values, SeriesPoint};
use crate::domain::signal::Signal;
use crate::domain::strategy::{Mode, StrategyKind};

pub fn calculate_zscore(
    series: &[SeriesPoint],
    window: usize,
    threshold: f64,
    mode: Mode,
) -> IndicatorFrame {
    let xs = values(series);
    let ma = rolling_mean(&xs, window);
    let std = rolling_std(&xs, window);

    let z: Vec<Option<f64>> = xs
        .iter()
        .zip(ma.iter().zip(&std))
        .map(|(x, (m, s))| match (m, s) {
            (Some(m), Some(s)) => Some((x - m) / s),
            _ => None,
        })
        .collect();

    let pos: Vec<Signal> = z
        .iter()
        .map(|z| match z {
            Some(z) => decide(mode, *z > threshold, *z < -threshold),
            None => Signal::Flat,
        })
        .collect();

    IndicatorFrame::assemble(
        StrategyKind::Zscore { window, threshold },
        series,
        vec![("ma", ma), ("std", std), ("zscore", z)],
        pos,
    )
}
