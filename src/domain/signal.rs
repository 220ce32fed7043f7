//! Discrete trading signals and timestamped signal points.

use chrono::NaiveDateTime;
use std::fmt;

/// Trading stance of one strategy instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Signal {
    Short,
    #[default]
    Flat,
    Long,
}

impl Signal {
    pub const ALL: [Signal; 3] = [Signal::Long, Signal::Flat, Signal::Short];

    pub fn value(self) -> i8 {
        match self {
            Signal::Short => -1,
            Signal::Flat => 0,
            Signal::Long => 1,
        }
    }

    pub fn from_value(value: i64) -> Option<Signal> {
        match value {
            -1 => Some(Signal::Short),
            0 => Some(Signal::Flat),
            1 => Some(Signal::Long),
            _ => None,
        }
    }

    /// Parses the on-disk form. Accepts "1", "-1", "0" and float spellings
    /// such as "1.0" left behind by other tooling.
    pub fn parse(s: &str) -> Option<Signal> {
        let trimmed = s.trim();
        if let Ok(v) = trimmed.parse::<i64>() {
            return Signal::from_value(v);
        }
        let f: f64 = trimmed.parse().ok()?;
        if f.fract() != 0.0 {
            return None;
        }
        Signal::from_value(f as i64)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Identity of a strategy instance in the signal tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceKey {
    pub name: String,
    pub symbol: String,
}

impl InstanceKey {
    pub fn new(name: &str, symbol: &str) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
        }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.symbol)
    }
}

/// One emitted signal for one instance at the timestamp of the last bar.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalPoint {
    pub timestamp: NaiveDateTime,
    pub key: InstanceKey,
    pub saved_csv: String,
    pub signal: Signal,
}
