//! Bollinger band breakout strategy.
//!
//! Middle: MEAN(n). Deviation: sample STD(n), replaced by 1 when exactly 0.
//! Upper = middle + k × deviation, lower = middle - k × deviation.
//! Long above the upper band, short below the lower band.
//! Warmup: first (n-1) rows are flat.

use crate::domain::indicator::rolling::{rolling_mean, rolling_std};
use crate::domain::indicator::{decide, IndicatorFrame};
use crate::domain::series::{values, SeriesPoint};
use crate::domain::signal::Signal;
use crate::domain::strategy::{Mode, StrategyKind};

pub fn calculate_bollinger(
    series: &[SeriesPoint],
    window: usize,
    num_std: f64,
    mode: Mode,
) -> IndicatorFrame {
    let xs = values(series);
    let ma = rolling_mean(&xs, window);
    let std: Vec<Option<f64>> = rolling_std(&xs, window)
        .into_iter()
        .map(|s| s.map(|s| if s == 0.0 { 1.0 } else { s }))
        .collect();

    let mut upper = Vec::with_capacity(xs.len());
    let mut lower = Vec::with_capacity(xs.len());
    let mut pos = Vec::with_capacity(xs.len());

    for (i, x) in xs.iter().enumerate() {
        match (ma[i], std[i]) {
            (Some(m), Some(s)) => {
                let up = m + num_std * s;
                let dn = m - num_std * s;
                upper.push(Some(up));
                lower.push(Some(dn));
                pos.push(decide(mode, *x > up, *x < dn));
            }
            _ => {
                upper.push(None);
                lower.push(None);
                pos.push(Signal::Flat);
            }
        }
    }

    IndicatorFrame::assemble(
        StrategyKind::Bollinger { window, num_std },
        series,
        vec![("ma", ma), ("std", std), ("up", upper), ("dn", lower)],
        pos,
    )
}
