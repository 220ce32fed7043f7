//! Bucket tallies to notional orders.

use crate::domain::transition::{Bucket, BucketTally};
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_QTY_PRECISION: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }

    pub fn parse(s: &str) -> Option<Side> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Some(Side::Buy),
            "sell" => Some(Side::Sell),
            _ => None,
        }
    }

    /// Side for a signed quantity; `None` for zero.
    pub fn for_delta(delta: f64) -> Option<Side> {
        if delta > 0.0 {
            Some(Side::Buy)
        } else if delta < 0.0 {
            Some(Side::Sell)
        } else {
            None
        }
    }

    pub fn sign(self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderOrigin {
    Bucket(Bucket),
    Correction,
}

/// An order to submit. Notional is always positive.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetOrder {
    pub symbol: String,
    pub side: Side,
    pub notional: f64,
    pub origin: OrderOrigin,
}

impl TargetOrder {
    pub fn bucket(&self) -> Option<Bucket> {
        match self.origin {
            OrderOrigin::Bucket(b) => Some(b),
            OrderOrigin::Correction => None,
        }
    }

    pub fn signed_notional(&self) -> f64 {
        self.side.sign() * self.notional
    }
}

/// Base notional unit per symbol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BetSizeTable {
    sizes: BTreeMap<String, f64>,
}

impl BetSizeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, symbol: &str, size: f64) -> Self {
        self.insert(symbol, size);
        self
    }

    /// Symbols are case-insensitive and stored upper-case.
    pub fn insert(&mut self, symbol: &str, size: f64) {
        self.sizes.insert(symbol.to_ascii_uppercase(), size);
    }

    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.sizes.get(&symbol.to_ascii_uppercase()).copied()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.sizes.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

/// Rounds half away from zero to `dp` decimal places.
pub fn round_to(value: f64, dp: u32) -> f64 {
    let factor = 10f64.powi(dp as i32);
    let rounded = (value * factor).round() / factor;
    // normalise -0.0
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Primary orders for one symbol, one per actionable bucket with a nonzero
/// count, in the fixed bucket order.
pub fn size_orders(
    symbol: &str,
    tally: &BucketTally,
    base_size: f64,
    precision: u32,
) -> Vec<TargetOrder> {
    let mut orders = Vec::new();
    for bucket in Bucket::ACTIONABLE {
        let count = tally.count(bucket);
        if count == 0 {
            continue;
        }
        let multiplier = if bucket.is_reversal() { 2.0 } else { 1.0 };
        let notional = round_to(count as f64 * base_size * multiplier, precision);
        if notional <= 0.0 {
            continue;
        }
        let Some(side) = Side::for_delta(bucket.delta() as f64) else {
            continue;
        };
        orders.push(TargetOrder {
            symbol: symbol.to_string(),
            side,
            notional,
            origin: OrderOrigin::Bucket(bucket),
        });
    }
    orders
}
