//! Indicator evaluation.
//!
//! Each strategy kind is a pure function from a series to an `IndicatorFrame`:
//! the input values, the intermediate columns the kind computes, and the
//! position (`pos`) at every row. The latest row's position is the signal
//! for the run.

pub mod bollinger;
pub mod ma_cross;
pub mod macd_quantile;
pub mod momentum;
pub mod rolling;
pub mod zscore;

use crate::domain::series::SeriesPoint;
use crate::domain::signal::Signal;
use crate::domain::strategy::{Mode, StrategyKind};
use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct FrameRow {
    pub timestamp: NaiveDateTime,
    pub value: f64,
    pub columns: Vec<Option<f64>>,
    pub pos: Signal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorFrame {
    pub kind: StrategyKind,
    pub column_names: Vec<&'static str>,
    pub rows: Vec<FrameRow>,
}

impl IndicatorFrame {
    /// Zips the series with computed columns and positions. All column
    /// vectors must have one entry per series point.
    pub fn assemble(
        kind: StrategyKind,
        series: &[SeriesPoint],
        named: Vec<(&'static str, Vec<Option<f64>>)>,
        pos: Vec<Signal>,
    ) -> Self {
        debug_assert!(named.iter().all(|(_, c)| c.len() == series.len()));
        debug_assert_eq!(pos.len(), series.len());

        let column_names = named.iter().map(|(n, _)| *n).collect();
        let rows = series
            .iter()
            .enumerate()
            .map(|(i, point)| FrameRow {
                timestamp: point.timestamp,
                value: point.value,
                columns: named.iter().map(|(_, c)| c[i]).collect(),
                pos: pos[i],
            })
            .collect();

        Self {
            kind,
            column_names,
            rows,
        }
    }

    pub fn latest(&self) -> Option<&FrameRow> {
        self.rows.last()
    }

    pub fn positions(&self) -> Vec<Signal> {
        self.rows.iter().map(|r| r.pos).collect()
    }
}

pub fn evaluate(kind: &StrategyKind, mode: Mode, series: &[SeriesPoint]) -> IndicatorFrame {
    match *kind {
        StrategyKind::Zscore { window, threshold } => {
            zscore::calculate_zscore(series, window, threshold, mode)
        }
        StrategyKind::MaCross {
            short_window,
            long_window,
        } => ma_cross::calculate_ma_cross(series, short_window, long_window, mode),
        StrategyKind::Bollinger { window, num_std } => {
            bollinger::calculate_bollinger(series, window, num_std, mode)
        }
        StrategyKind::Momentum { window, threshold } => {
            momentum::calculate_momentum(series, window, threshold, mode)
        }
        StrategyKind::MacdQuantile {
            window,
            upper_pct,
            lower_pct,
        } => macd_quantile::calculate_macd_quantile(series, window, upper_pct, lower_pct, mode),
    }
}

/// Picks the position for one row. Long wins when both conditions hold.
pub fn decide(mode: Mode, long: bool, short: bool) -> Signal {
    if mode.allows_long() && long {
        Signal::Long
    } else if mode.allows_short() && short {
        Signal::Short
    } else {
        Signal::Flat
    }
}
