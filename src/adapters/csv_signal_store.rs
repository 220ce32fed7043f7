//! CSV signal store under `{data_dir}/signal/`.

use crate::adapters::csv_append::{append_records, overwrite_records};
use crate::domain::error::SigtraderError;
use crate::domain::series::{format_timestamp, parse_timestamp};
use crate::domain::signal::{InstanceKey, Signal, SignalPoint};
use crate::domain::transition::SignalTransition;
use crate::ports::signal_store_port::SignalStorePort;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub const PREV_SIGNAL_FILE: &str = "prev_signal_table.csv";
pub const SIGNAL_FILE: &str = "signal_table.csv";
pub const SIGNAL_PLUS_FILE: &str = "signal_table_plus.csv";

const SIGNAL_HEADER: [&str; 5] = ["date", "name", "symbol", "saved_csv", "signal"];

#[derive(Debug, Serialize, Deserialize)]
struct SignalRow {
    date: String,
    name: String,
    symbol: String,
    saved_csv: String,
    signal: String,
}

impl From<&SignalPoint> for SignalRow {
    fn from(p: &SignalPoint) -> Self {
        SignalRow {
            date: format_timestamp(&p.timestamp),
            name: p.key.name.clone(),
            symbol: p.key.symbol.clone(),
            saved_csv: p.saved_csv.clone(),
            signal: p.signal.to_string(),
        }
    }
}

impl SignalRow {
    fn into_point(self) -> Result<SignalPoint, String> {
        let timestamp = parse_timestamp(&self.date).ok_or_else(|| format!("invalid date '{}'", self.date))?;
        let signal = Signal::parse(&self.signal).ok_or_else(|| format!("invalid signal '{}'", self.signal))?;
        Ok(SignalPoint {
            timestamp,
            key: InstanceKey::new(&self.name, &self.symbol),
            saved_csv: self.saved_csv,
            signal,
        })
    }
}

#[derive(Debug, Serialize)]
struct SignalPlusRow {
    date: String,
    date_s1: String,
    name: String,
    symbol: String,
    saved_csv: String,
    signal: String,
    signal_s1: String,
    signal_plus: String,
}

impl From<&SignalTransition> for SignalPlusRow {
    fn from(t: &SignalTransition) -> Self {
        SignalPlusRow {
            date: format_timestamp(&t.current_timestamp),
            date_s1: t
                .previous_timestamp
                .as_ref()
                .map(format_timestamp)
                .unwrap_or_default(),
            name: t.key.name.clone(),
            symbol: t.key.symbol.clone(),
            saved_csv: t.saved_csv.clone(),
            signal: t.current.to_string(),
            signal_s1: t.previous.to_string(),
            signal_plus: t.bucket().code(),
        }
    }
}

pub struct CsvSignalStore {
    dir: PathBuf,
}

impl CsvSignalStore {
    /// `data_dir` is the root data directory; files go to `data_dir/signal`.
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            dir: data_dir.join("signal"),
        }
    }

    pub fn prev_path(&self) -> PathBuf {
        self.dir.join(PREV_SIGNAL_FILE)
    }

    pub fn signal_path(&self) -> PathBuf {
        self.dir.join(SIGNAL_FILE)
    }

    pub fn signal_plus_path(&self) -> PathBuf {
        self.dir.join(SIGNAL_PLUS_FILE)
    }

    fn store_err(&self, e: impl std::fmt::Display) -> SigtraderError {
        SigtraderError::SignalStore {
            reason: e.to_string(),
        }
    }
}

impl SignalStorePort for CsvSignalStore {
    fn load_previous(&self) -> Result<Vec<SignalPoint>, SigtraderError> {
        let path = self.prev_path();
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.store_err(format!("failed to read {}: {}", path.display(), e))),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| self.store_err(e))?;
        for col in SIGNAL_HEADER {
            if !headers.iter().any(|h| h == col) {
                return Err(self.store_err(format!("{} lacks column '{}'", path.display(), col)));
            }
        }

        let mut points = Vec::new();
        for row in rdr.deserialize::<SignalRow>() {
            let row = row.map_err(|e| self.store_err(e))?;
            points.push(row.into_point().map_err(|e| self.store_err(e))?);
        }
        Ok(points)
    }

    fn save_previous(&self, points: &[SignalPoint]) -> Result<(), SigtraderError> {
        let rows: Vec<SignalRow> = points.iter().map(SignalRow::from).collect();
        overwrite_records(&self.prev_path(), &rows, &SIGNAL_HEADER).map_err(|e| self.store_err(e))
    }

    fn append_signals(&self, points: &[SignalPoint]) -> Result<(), SigtraderError> {
        let rows: Vec<SignalRow> = points.iter().map(SignalRow::from).collect();
        append_records(&self.signal_path(), &rows).map_err(|e| self.store_err(e))
    }

    fn append_transitions(&self, transitions: &[SignalTransition]) -> Result<(), SigtraderError> {
        let rows: Vec<SignalPlusRow> = transitions.iter().map(SignalPlusRow::from).collect();
        append_records(&self.signal_plus_path(), &rows).map_err(|e| self.store_err(e))
    }
}
