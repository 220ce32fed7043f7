//! Previous-signal tracking across runs.
//!
//! The store holds the last emitted point per instance. Each run pairs the
//! fresh points with the stored ones into transitions, then writes the new
//! previous table before any order can be placed.

use crate::domain::error::SigtraderError;
use crate::domain::signal::{InstanceKey, Signal, SignalPoint};
use crate::domain::strategy::StrategyInstance;
use crate::domain::transition::SignalTransition;
use crate::ports::signal_store_port::SignalStorePort;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Default)]
pub struct SignalHistory {
    previous: BTreeMap<InstanceKey, SignalPoint>,
}

impl SignalHistory {
    pub fn from_points(points: Vec<SignalPoint>) -> Self {
        let mut previous = BTreeMap::new();
        for p in points {
            // later rows win on duplicate keys
            previous.insert(p.key.clone(), p);
        }
        Self { previous }
    }

    /// Reads the store. Any failure degrades to an empty history, so every
    /// instance starts from flat.
    pub fn load(store: &dyn SignalStorePort) -> Self {
        match store.load_previous() {
            Ok(points) => Self::from_points(points),
            Err(e) => {
                error!(error = %e, "previous signals unreadable, treating all as flat");
                Self::default()
            }
        }
    }

    pub fn previous(&self, key: &InstanceKey) -> Option<&SignalPoint> {
        self.previous.get(key)
    }

    pub fn len(&self) -> usize {
        self.previous.len()
    }

    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }

    /// Transitions for the evaluated points followed by no-op transitions
    /// for `carried` instances that could not be evaluated this run.
    pub fn transitions(
        &self,
        current: &[SignalPoint],
        carried: &[InstanceKey],
    ) -> Vec<SignalTransition> {
        let mut out = Vec::with_capacity(current.len() + carried.len());

        for point in current {
            let stored = self.previous.get(&point.key);
            let mut transition = SignalTransition {
                key: point.key.clone(),
                saved_csv: point.saved_csv.clone(),
                previous: stored.map(|s| s.signal).unwrap_or_default(),
                current: point.signal,
                previous_timestamp: stored.map(|s| s.timestamp),
                current_timestamp: point.timestamp,
            };
            if let Some(stored) = stored.filter(|s| point.timestamp <= s.timestamp) {
                warn!(
                    instance = %point.key,
                    current = %point.timestamp,
                    previous = %stored.timestamp,
                    "snapshot already processed, no transition"
                );
                transition.previous = point.signal;
            }
            out.push(transition);
        }

        for key in carried {
            let Some(stored) = self.previous.get(key) else {
                continue;
            };
            out.push(SignalTransition {
                key: key.clone(),
                saved_csv: stored.saved_csv.clone(),
                previous: stored.signal,
                current: stored.signal,
                previous_timestamp: Some(stored.timestamp),
                current_timestamp: stored.timestamp,
            });
        }

        out
    }

    /// Previous table for the next run. Fresh points replace stored ones
    /// unless they are not newer; carried instances keep their record.
    pub fn next_table(&self, current: &[SignalPoint], carried: &[InstanceKey]) -> Vec<SignalPoint> {
        let mut table = Vec::with_capacity(current.len() + carried.len());
        for point in current {
            match self.previous.get(&point.key) {
                Some(stored) if point.timestamp < stored.timestamp => table.push(stored.clone()),
                _ => table.push(point.clone()),
            }
        }
        for key in carried {
            if let Some(stored) = self.previous.get(key) {
                table.push(stored.clone());
            }
        }
        table
    }
}

/// Appends a flat record for each `added` instance not yet in `existing`,
/// dated at the latest stored date (or `fallback` for an empty table), so the
/// first evaluation of a new strategy is classified against flat.
pub fn seed_previous(
    existing: Vec<SignalPoint>,
    added: &[StrategyInstance],
    fallback: NaiveDateTime,
) -> Vec<SignalPoint> {
    let date = existing
        .iter()
        .map(|p| p.timestamp)
        .max()
        .unwrap_or(fallback);
    let mut table = existing;
    for inst in added {
        let key = inst.key();
        if table.iter().any(|p| p.key == key) {
            continue;
        }
        info!(instance = %key, date = %date, "seeding previous signal");
        table.push(SignalPoint {
            timestamp: date,
            key,
            saved_csv: inst.frame_name(),
            signal: Signal::Flat,
        });
    }
    table
}

/// Persists one run. The previous table is written first and its failure is
/// returned; the audit logs are appended afterwards and only logged on error.
pub fn record_run(
    store: &dyn SignalStorePort,
    history: &SignalHistory,
    current: &[SignalPoint],
    carried: &[InstanceKey],
    transitions: &[SignalTransition],
) -> Result<(), SigtraderError> {
    store.save_previous(&history.next_table(current, carried))?;

    if let Err(e) = store.append_signals(current) {
        error!(error = %e, "failed to append signal log");
    }
    if let Err(e) = store.append_transitions(transitions) {
        error!(error = %e, "failed to append transition log");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::{Mode, StrategyParams};
    use chrono::{NaiveDate, NaiveDateTime};
    use std::cell::RefCell;

    fn ts(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn point(name: &str, h: u32, signal: Signal) -> SignalPoint {
        SignalPoint {
            timestamp: ts(h),
            key: InstanceKey::new(name, "BTC"),
            saved_csv: format!("{name}_close_BTC.csv"),
            signal,
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        previous: RefCell<Option<Vec<SignalPoint>>>,
        fail_load: bool,
        fail_save: bool,
        signals: RefCell<Vec<SignalPoint>>,
        transitions: RefCell<Vec<SignalTransition>>,
    }

    impl SignalStorePort for MemoryStore {
        fn load_previous(&self) -> Result<Vec<SignalPoint>, SigtraderError> {
            if self.fail_load {
                return Err(SigtraderError::SignalStore {
                    reason: "schema mismatch".into(),
                });
            }
            Ok(self.previous.borrow().clone().unwrap_or_default())
        }

        fn save_previous(&self, points: &[SignalPoint]) -> Result<(), SigtraderError> {
            if self.fail_save {
                return Err(SigtraderError::SignalStore {
                    reason: "disk full".into(),
                });
            }
            *self.previous.borrow_mut() = Some(points.to_vec());
            Ok(())
        }

        fn append_signals(&self, points: &[SignalPoint]) -> Result<(), SigtraderError> {
            self.signals.borrow_mut().extend_from_slice(points);
            Ok(())
        }

        fn append_transitions(&self, t: &[SignalTransition]) -> Result<(), SigtraderError> {
            self.transitions.borrow_mut().extend_from_slice(t);
            Ok(())
        }
    }

    #[test]
    fn new_instance_starts_flat() {
        let history = SignalHistory::default();
        let t = history.transitions(&[point("a", 1, Signal::Long)], &[]);
        assert_eq!(t[0].previous, Signal::Flat);
        assert_eq!(t[0].current, Signal::Long);
        assert_eq!(t[0].previous_timestamp, None);
    }

    #[test]
    fn stored_signal_becomes_previous() {
        let history = SignalHistory::from_points(vec![point("a", 0, Signal::Short)]);
        let t = history.transitions(&[point("a", 1, Signal::Long)], &[]);
        assert_eq!(t[0].previous, Signal::Short);
        assert_eq!(t[0].previous_timestamp, Some(ts(0)));
        assert_eq!(t[0].current_timestamp, ts(1));
    }

    #[test]
    fn corrupt_store_degrades_to_flat() {
        let store = MemoryStore {
            fail_load: true,
            ..MemoryStore::default()
        };
        let history = SignalHistory::load(&store);
        assert!(history.is_empty());
        let t = history.transitions(&[point("a", 1, Signal::Short)], &[]);
        assert_eq!(t[0].previous, Signal::Flat);
    }

    #[test]
    fn replayed_snapshot_is_a_noop() {
        let history = SignalHistory::from_points(vec![point("a", 5, Signal::Short)]);
        let t = history.transitions(&[point("a", 5, Signal::Long)], &[]);
        assert!(t[0].is_noop());
        assert_eq!(t[0].current, Signal::Long);

        let stale = history.transitions(&[point("a", 3, Signal::Flat)], &[]);
        assert!(stale[0].is_noop());
        let table = history.next_table(&[point("a", 3, Signal::Flat)], &[]);
        assert_eq!(table[0].timestamp, ts(5));
        assert_eq!(table[0].signal, Signal::Short);
    }

    #[test]
    fn carried_instances_keep_their_record() {
        let history = SignalHistory::from_points(vec![
            point("a", 0, Signal::Long),
            point("b", 0, Signal::Short),
        ]);
        let carried = vec![InstanceKey::new("b", "BTC"), InstanceKey::new("zz", "BTC")];
        let t = history.transitions(&[point("a", 1, Signal::Flat)], &carried);
        assert_eq!(t.len(), 2);
        assert_eq!(t[1].key.name, "b");
        assert_eq!(t[1].previous, Signal::Short);
        assert_eq!(t[1].current, Signal::Short);

        let table = history.next_table(&[point("a", 1, Signal::Flat)], &carried);
        assert_eq!(table.len(), 2);
        assert_eq!(table[1], point("b", 0, Signal::Short));
    }

    #[test]
    fn record_run_writes_previous_then_logs() {
        let store = MemoryStore::default();
        let history = SignalHistory::load(&store);
        let current = vec![point("a", 1, Signal::Long)];
        let transitions = history.transitions(&current, &[]);
        record_run(&store, &history, &current, &[], &transitions).unwrap();

        assert_eq!(store.previous.borrow().as_ref().unwrap(), &current);
        assert_eq!(store.signals.borrow().len(), 1);
        assert_eq!(store.transitions.borrow().len(), 1);

        let next = SignalHistory::load(&store);
        let again = next.transitions(&current, &[]);
        assert!(again[0].is_noop());
    }

    #[test]
    fn record_run_fails_when_previous_cannot_be_saved() {
        let store = MemoryStore {
            fail_save: true,
            ..MemoryStore::default()
        };
        let history = SignalHistory::default();
        let current = vec![point("a", 1, Signal::Long)];
        let result = record_run(&store, &history, &current, &[], &[]);
        assert!(matches!(result, Err(SigtraderError::SignalStore { .. })));
        assert!(store.signals.borrow().is_empty());
    }

    fn instance(name: &str) -> StrategyInstance {
        StrategyInstance {
            name: name.into(),
            symbol: "BTC".into(),
            series_column: "close".into(),
            kind: "zscore".into(),
            mode: Mode::Long,
            params: StrategyParams::default(),
        }
    }

    #[test]
    fn seeding_uses_latest_stored_date() {
        let existing = vec![point("a", 7, Signal::Long), point("b", 9, Signal::Short)];
        let table = seed_previous(existing, &[instance("a"), instance("c")], ts(1));
        assert_eq!(table.len(), 3);
        let seeded = &table[2];
        assert_eq!(seeded.key, InstanceKey::new("c", "BTC"));
        assert_eq!(seeded.timestamp, ts(9));
        assert_eq!(seeded.signal, Signal::Flat);
        assert_eq!(seeded.saved_csv, "c_close_BTC.csv");
        assert_eq!(table[0].signal, Signal::Long);
    }

    #[test]
    fn seeding_an_empty_table_uses_fallback() {
        let table = seed_previous(Vec::new(), &[instance("c")], ts(5));
        assert_eq!(table[0].timestamp, ts(5));
    }
}
