//! Target exposure vs live position.
//!
//! The reconciler, not primary sizing, decides the final position: a partial
//! fill or a missed order on the primary pass is closed out here.

use crate::domain::position::PositionSnapshot;
use crate::domain::signal::Signal;
use crate::domain::sizing::{round_to, OrderOrigin, Side, TargetOrder};

/// Intended signed position: sum of current signals × base size.
pub fn target_position(signals: &[Signal], base_size: f64, precision: u32) -> f64 {
    let sum: i64 = signals.iter().map(|s| s.value() as i64).sum();
    round_to(sum as f64 * base_size, precision)
}

/// One corrective order when the rounded `target - live` is nonzero.
pub fn corrective_order(
    target: f64,
    live: &PositionSnapshot,
    precision: u32,
) -> Option<TargetOrder> {
    let delta = round_to(target - live.size, precision);
    let side = Side::for_delta(delta)?;
    Some(TargetOrder {
        symbol: live.symbol.clone(),
        side,
        notional: delta.abs(),
        origin: OrderOrigin::Correction,
    })
}
