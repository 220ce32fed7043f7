//! Moving-average cross strategy.
//!
//! Fast leg: EWM(span = short) with adjusted weights, defined from row 0.
//! Slow leg: SMA(long) over a full window.
//! Long when fast > slow, short when fast < slow.
//! Warmup: first (long-1) rows are flat.

use crate::domain::indicator::rolling::{ewm_adjusted, rolling_mean};
use crate::domain::indicator::{decide, IndicatorFrame};
use crate::domain::series::{values, SeriesPoint};
use crate::domain::signal::Signal;
use crate::domain::strategy::{Mode, StrategyKind};

pub fn calculate_ma_cross(
    series: &[SeriesPoint],
    short_window: usize,
    long_window: usize,
    mode: Mode,
) -> IndicatorFrame {
    let xs = values(series);
    let fast = ewm_adjusted(&xs, short_window);
    let slow = rolling_mean(&xs, long_window);

    let pos: Vec<Signal> = fast
        .iter()
        .zip(&slow)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => decide(mode, f > s, f < s),
            _ => Signal::Flat,
        })
        .collect();

    IndicatorFrame::assemble(
        StrategyKind::MaCross {
            short_window,
            long_window,
        },
        series,
        vec![("ewm_short", fast), ("sma_long", slow)],
        pos,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_series;

    #[test]
    fn ma_cross_warmup_waits_for_long_window() {
        let series = make_series(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let frame = calculate_ma_cross(&series, 2, 4, Mode::LongShort);
        assert_eq!(frame.rows[0].pos, Signal::Flat);
        assert_eq!(frame.rows[1].pos, Signal::Flat);
        assert_eq!(frame.rows[2].pos, Signal::Flat);
        assert!(frame.rows[2].columns[1].is_none());
        assert!(frame.rows[3].columns[1].is_some());
    }

    #[test]
    fn ma_cross_rising_series_is_long() {
        let series = make_series(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let frame = calculate_ma_cross(&series, 2, 4, Mode::LongShort);
        assert_eq!(frame.rows[3].pos, Signal::Long);
        assert_eq!(frame.latest().unwrap().pos, Signal::Long);
    }

    #[test]
    fn ma_cross_falling_series_is_short() {
        let series = make_series(&[6.0, 5.0, 4.0, 3.0, 2.0, 1.0]);
        let frame = calculate_ma_cross(&series, 2, 4, Mode::LongShort);
        assert_eq!(frame.latest().unwrap().pos, Signal::Short);

        let frame = calculate_ma_cross(&series, 2, 4, Mode::Long);
        assert_eq!(frame.latest().unwrap().pos, Signal::Flat);
    }

    #[test]
    fn ma_cross_flat_series_stays_flat() {
        let series = make_series(&[3.0; 10]);
        let frame = calculate_ma_cross(&series, 3, 5, Mode::LongShort);
        assert!(frame.positions().iter().all(|s| *s == Signal::Flat));
    }
}
