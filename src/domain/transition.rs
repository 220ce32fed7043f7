//! Signal transitions and their classification into buckets.

use crate::domain::signal::{InstanceKey, Signal};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fmt;

/// Classification of a (previous, current) signal pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    LongToLong,
    LongToFlat,
    LongToShort,
    FlatToLong,
    FlatToFlat,
    FlatToShort,
    ShortToLong,
    ShortToFlat,
    ShortToShort,
}

impl Bucket {
    pub const ALL: [Bucket; 9] = [
        Bucket::LongToLong,
        Bucket::LongToFlat,
        Bucket::LongToShort,
        Bucket::FlatToLong,
        Bucket::FlatToFlat,
        Bucket::FlatToShort,
        Bucket::ShortToLong,
        Bucket::ShortToFlat,
        Bucket::ShortToShort,
    ];

    /// Buckets that produce orders, in submission order.
    pub const ACTIONABLE: [Bucket; 6] = [
        Bucket::LongToFlat,
        Bucket::LongToShort,
        Bucket::FlatToLong,
        Bucket::FlatToShort,
        Bucket::ShortToLong,
        Bucket::ShortToFlat,
    ];

    pub fn from_signals(previous: Signal, current: Signal) -> Bucket {
        match (previous, current) {
            (Signal::Long, Signal::Long) => Bucket::LongToLong,
            (Signal::Long, Signal::Flat) => Bucket::LongToFlat,
            (Signal::Long, Signal::Short) => Bucket::LongToShort,
            (Signal::Flat, Signal::Long) => Bucket::FlatToLong,
            (Signal::Flat, Signal::Flat) => Bucket::FlatToFlat,
            (Signal::Flat, Signal::Short) => Bucket::FlatToShort,
            (Signal::Short, Signal::Long) => Bucket::ShortToLong,
            (Signal::Short, Signal::Flat) => Bucket::ShortToFlat,
            (Signal::Short, Signal::Short) => Bucket::ShortToShort,
        }
    }

    pub fn signals(self) -> (Signal, Signal) {
        match self {
            Bucket::LongToLong => (Signal::Long, Signal::Long),
            Bucket::LongToFlat => (Signal::Long, Signal::Flat),
            Bucket::LongToShort => (Signal::Long, Signal::Short),
            Bucket::FlatToLong => (Signal::Flat, Signal::Long),
            Bucket::FlatToFlat => (Signal::Flat, Signal::Flat),
            Bucket::FlatToShort => (Signal::Flat, Signal::Short),
            Bucket::ShortToLong => (Signal::Short, Signal::Long),
            Bucket::ShortToFlat => (Signal::Short, Signal::Flat),
            Bucket::ShortToShort => (Signal::Short, Signal::Short),
        }
    }

    pub fn is_actionable(self) -> bool {
        let (prev, cur) = self.signals();
        prev != cur
    }

    pub fn is_reversal(self) -> bool {
        matches!(self, Bucket::LongToShort | Bucket::ShortToLong)
    }

    /// Signed change in exposure units: +2 for short to long, -1 for long to flat.
    pub fn delta(self) -> i8 {
        let (prev, cur) = self.signals();
        cur.value() - prev.value()
    }

    /// Legacy code stored in the `signal_plus` column, e.g. "-11" or "10".
    pub fn code(self) -> String {
        let (prev, cur) = self.signals();
        format!("{}{}", prev.value(), cur.value())
    }

    pub fn parse_code(code: &str) -> Option<Bucket> {
        Bucket::ALL.into_iter().find(|b| b.code() == code.trim())
    }

    pub fn label(self) -> String {
        let (prev, cur) = self.signals();
        format!("{}/{}", letter(prev), letter(cur))
    }
}

fn letter(signal: Signal) -> char {
    match signal {
        Signal::Long => 'L',
        Signal::Flat => '0',
        Signal::Short => 'S',
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Previous and current signal of one instance for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalTransition {
    pub key: InstanceKey,
    pub saved_csv: String,
    pub previous: Signal,
    pub current: Signal,
    pub previous_timestamp: Option<NaiveDateTime>,
    pub current_timestamp: NaiveDateTime,
}

impl SignalTransition {
    pub fn symbol(&self) -> &str {
        &self.key.symbol
    }

    pub fn bucket(&self) -> Bucket {
        Bucket::from_signals(self.previous, self.current)
    }

    pub fn is_noop(&self) -> bool {
        self.previous == self.current
    }
}

/// Count of instances per bucket for one symbol. Every bucket is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketTally {
    counts: BTreeMap<Bucket, usize>,
}

impl Default for BucketTally {
    fn default() -> Self {
        Self {
            counts: Bucket::ALL.into_iter().map(|b| (b, 0)).collect(),
        }
    }
}

impl BucketTally {
    pub fn add(&mut self, bucket: Bucket) {
        *self.counts.entry(bucket).or_insert(0) += 1;
    }

    pub fn count(&self, bucket: Bucket) -> usize {
        self.counts.get(&bucket).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Bucket, usize)> + '_ {
        self.counts.iter().map(|(b, c)| (*b, *c))
    }
}

/// Tallies transitions per symbol, symbols in sorted order.
pub fn tally_by_symbol(transitions: &[SignalTransition]) -> BTreeMap<String, BucketTally> {
    let mut out: BTreeMap<String, BucketTally> = BTreeMap::new();
    for t in transitions {
        out.entry(t.symbol().to_string())
            .or_default()
            .add(t.bucket());
    }
    out
}
