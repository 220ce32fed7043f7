//! MACD quantile-band strategy.
//!
//! macd = EMA(12) - EMA(26), recursive (non-adjusted) smoothing seeded at
//! the first value. Bands are rolling quantiles of macd over n rows:
//! upper at 1 - upper_pct/100, lower at lower_pct/100.
//! Long when macd > upper, short when macd < lower.

use crate::domain::indicator::rolling::{ewm_recursive, rolling_quantile};
use crate::domain::indicator::{decide, IndicatorFrame};
use crate::domain::series::{values, SeriesPoint};
use crate::domain::signal::Signal;
use crate::domain::strategy::{Mode, StrategyKind};

const FAST_SPAN: usize = 12;
const SLOW_SPAN: usize = 26;

pub fn calculate_macd_quantile(
    series: &[SeriesPoint],
    window: usize,
    upper_pct: f64,
    lower_pct: f64,
    mode: Mode,
) -> IndicatorFrame {
    let xs = values(series);
    let fast = ewm_recursive(&xs, FAST_SPAN);
    let slow = ewm_recursive(&xs, SLOW_SPAN);

    let macd: Vec<Option<f64>> = fast
        .iter()
        .zip(&slow)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    let upper = rolling_quantile(&macd, window, 1.0 - upper_pct / 100.0);
    let lower = rolling_quantile(&macd, window, lower_pct / 100.0);

    let pos: Vec<Signal> = (0..xs.len())
        .map(|i| match (macd[i], upper[i], lower[i]) {
            (Some(m), Some(up), Some(dn)) => decide(mode, m > up, m < dn),
            _ => Signal::Flat,
        })
        .collect();

    IndicatorFrame::assemble(
        StrategyKind::MacdQuantile {
            window,
            upper_pct,
            lower_pct,
        },
        series,
        vec![
            ("ema_fast", fast),
            ("ema_slow", slow),
            ("macd", macd),
            ("macd_upper", upper),
            ("macd_lower", lower),
        ],
        pos,
    )
}
