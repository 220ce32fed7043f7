#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use sigtrader::domain::error::SigtraderError;
use sigtrader::domain::fill::FillRecord;
use sigtrader::domain::indicator::IndicatorFrame;
use sigtrader::domain::ledger::TradeLedgerRow;
use sigtrader::domain::position::PositionSnapshot;
use sigtrader::domain::series::SeriesPoint;
use sigtrader::domain::signal::{InstanceKey, Signal, SignalPoint};
use sigtrader::domain::sizing::Side;
use sigtrader::domain::strategy::{Mode, StrategyInstance, StrategyParams};
use sigtrader::domain::transition::SignalTransition;
use sigtrader::ports::broker_port::{BrokerError, BrokerPort};
use sigtrader::ports::ledger_port::LedgerPort;
use sigtrader::ports::notify_port::{NotifyError, NotifyPort};
use sigtrader::ports::series_port::SeriesPort;
use sigtrader::ports::signal_store_port::SignalStorePort;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

pub fn ts(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

/// Hourly points ending at `end`.
pub fn series_ending(end: NaiveDateTime, values: &[f64]) -> Vec<SeriesPoint> {
    let n = values.len() as i64;
    values
        .iter()
        .enumerate()
        .map(|(i, v)| SeriesPoint::new(end - Duration::hours(n - 1 - i as i64), *v))
        .collect()
}

/// Closes whose zscore(3, 1.0) ends long, short or flat.
pub fn closes_for(signal: Signal) -> Vec<f64> {
    match signal {
        Signal::Long => vec![100.0, 100.0, 100.0, 100.0, 130.0],
        Signal::Short => vec![100.0, 100.0, 100.0, 100.0, 70.0],
        Signal::Flat => vec![100.0, 101.0, 100.0, 101.0, 100.0],
    }
}

pub fn zscore_instance(name: &str, symbol: &str) -> StrategyInstance {
    StrategyInstance {
        name: name.to_string(),
        symbol: symbol.to_string(),
        series_column: "close".to_string(),
        kind: "zscore".to_string(),
        mode: Mode::LongShort,
        params: StrategyParams {
            rol: Some(3),
            thres: Some(1.0),
            ..StrategyParams::default()
        },
    }
}

pub fn stored(inst: &StrategyInstance, at: NaiveDateTime, signal: Signal) -> SignalPoint {
    SignalPoint {
        timestamp: at,
        key: inst.key(),
        saved_csv: inst.frame_name(),
        signal,
    }
}

// --- series ---

pub struct MockSeriesPort {
    pub series: HashMap<InstanceKey, Vec<SeriesPoint>>,
    pub errors: HashMap<InstanceKey, String>,
    pub stored_frames: RefCell<Vec<InstanceKey>>,
}

impl MockSeriesPort {
    pub fn new() -> Self {
        Self {
            series: HashMap::new(),
            errors: HashMap::new(),
            stored_frames: RefCell::new(Vec::new()),
        }
    }

    pub fn with_series(mut self, inst: &StrategyInstance, points: Vec<SeriesPoint>) -> Self {
        self.series.insert(inst.key(), points);
        self
    }

    /// Series whose latest zscore signal is `signal`, ending at `end`.
    pub fn with_signal(self, inst: &StrategyInstance, end: NaiveDateTime, signal: Signal) -> Self {
        self.with_series(inst, series_ending(end, &closes_for(signal)))
    }

    pub fn with_error(mut self, inst: &StrategyInstance, reason: &str) -> Self {
        self.errors.insert(inst.key(), reason.to_string());
        self
    }
}

impl SeriesPort for MockSeriesPort {
    fn load_series(&self, inst: &StrategyInstance) -> Result<Vec<SeriesPoint>, SigtraderError> {
        if let Some(reason) = self.errors.get(&inst.key()) {
            return Err(SigtraderError::Series {
                instance: inst.key().to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self.series.get(&inst.key()).cloned().unwrap_or_default())
    }

    fn store_frame(&self, inst: &StrategyInstance, _frame: &IndicatorFrame) -> Result<(), SigtraderError> {
        self.stored_frames.borrow_mut().push(inst.key());
        Ok(())
    }
}

// --- signal store ---

#[derive(Default)]
pub struct MemoryStore {
    pub previous: RefCell<Vec<SignalPoint>>,
    pub corrupt: bool,
    pub fail_save: bool,
    pub signals: RefCell<Vec<SignalPoint>>,
    pub transitions: RefCell<Vec<SignalTransition>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_previous(self, points: Vec<SignalPoint>) -> Self {
        *self.previous.borrow_mut() = points;
        self
    }

    pub fn corrupt(mut self) -> Self {
        self.corrupt = true;
        self
    }

    pub fn failing_save(mut self) -> Self {
        self.fail_save = true;
        self
    }

    pub fn previous_signal(&self, key: &InstanceKey) -> Option<Signal> {
        self.previous
            .borrow()
            .iter()
            .find(|p| &p.key == key)
            .map(|p| p.signal)
    }
}

impl SignalStorePort for MemoryStore {
    fn load_previous(&self) -> Result<Vec<SignalPoint>, SigtraderError> {
        if self.corrupt {
            return Err(SigtraderError::SignalStore {
                reason: "prev_signal_table.csv lacks column 'signal'".into(),
            });
        }
        Ok(self.previous.borrow().clone())
    }

    fn save_previous(&self, points: &[SignalPoint]) -> Result<(), SigtraderError> {
        if self.fail_save {
            return Err(SigtraderError::SignalStore {
                reason: "read-only file system".into(),
            });
        }
        *self.previous.borrow_mut() = points.to_vec();
        Ok(())
    }

    fn append_signals(&self, points: &[SignalPoint]) -> Result<(), SigtraderError> {
        self.signals.borrow_mut().extend_from_slice(points);
        Ok(())
    }

    fn append_transitions(&self, transitions: &[SignalTransition]) -> Result<(), SigtraderError> {
        self.transitions.borrow_mut().extend_from_slice(transitions);
        Ok(())
    }
}

// --- broker ---

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub symbol: String,
    pub side: Side,
    pub notional: f64,
}

/// Fills every order completely at `price` unless the symbol is set to
/// reject or its next order is set to fill partially.
pub struct MockBroker {
    pub price: f64,
    pub positions: RefCell<BTreeMap<String, f64>>,
    pub leverage: RefCell<BTreeMap<String, f64>>,
    pub rejections: HashMap<String, BrokerError>,
    pub partial_fills: RefCell<HashMap<String, f64>>,
    pub orders: RefCell<Vec<PlacedOrder>>,
    pub fills: RefCell<HashMap<String, Vec<FillRecord>>>,
    next_id: Cell<u32>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self {
            price: 100.0,
            positions: RefCell::new(BTreeMap::new()),
            leverage: RefCell::new(BTreeMap::new()),
            rejections: HashMap::new(),
            partial_fills: RefCell::new(HashMap::new()),
            orders: RefCell::new(Vec::new()),
            fills: RefCell::new(HashMap::new()),
            next_id: Cell::new(1),
        }
    }

    pub fn with_position(self, symbol: &str, size: f64) -> Self {
        self.positions.borrow_mut().insert(symbol.to_string(), size);
        self
    }

    pub fn with_rejection(mut self, symbol: &str, reason: &str) -> Self {
        self.rejections.insert(
            symbol.to_string(),
            BrokerError::Rejected {
                reason: reason.to_string(),
            },
        );
        self
    }

    /// Only `ratio` of the next order on `symbol` is filled.
    pub fn with_partial_fill(self, symbol: &str, ratio: f64) -> Self {
        self.partial_fills.borrow_mut().insert(symbol.to_string(), ratio);
        self
    }

    pub fn position(&self, symbol: &str) -> f64 {
        self.positions.borrow().get(symbol).copied().unwrap_or(0.0)
    }

    pub fn orders_for(&self, symbol: &str) -> Vec<PlacedOrder> {
        self.orders
            .borrow()
            .iter()
            .filter(|o| o.symbol == symbol)
            .cloned()
            .collect()
    }
}

impl BrokerPort for MockBroker {
    fn fetch_position(&self, symbol: &str) -> Result<PositionSnapshot, BrokerError> {
        Ok(PositionSnapshot {
            size: self.position(symbol),
            leverage: self.leverage.borrow().get(symbol).copied(),
            mark_price: Some(self.price),
            ..PositionSnapshot::flat(symbol)
        })
    }

    fn set_leverage(&self, symbol: &str, leverage: f64) -> Result<(), BrokerError> {
        if self.leverage.borrow().get(symbol) == Some(&leverage) {
            return Err(BrokerError::Rejected {
                reason: "leverage not modified".into(),
            });
        }
        self.leverage.borrow_mut().insert(symbol.to_string(), leverage);
        Ok(())
    }

    fn place_market_order(&self, symbol: &str, side: Side, notional: f64) -> Result<String, BrokerError> {
        if let Some(e) = self.rejections.get(symbol) {
            return Err(e.clone());
        }
        let id = format!("mock-{}", self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        self.orders.borrow_mut().push(PlacedOrder {
            symbol: symbol.to_string(),
            side,
            notional,
        });
        let ratio = self.partial_fills.borrow_mut().remove(symbol).unwrap_or(1.0);
        let filled = notional * ratio;
        *self.positions.borrow_mut().entry(symbol.to_string()).or_insert(0.0) += side.sign() * filled;

        let fill = FillRecord {
            order_id: id.clone(),
            timestamp: 1_709_251_200_000,
            datetime: "2024-03-01T00:00:00.000Z".to_string(),
            symbol: format!("{symbol}USDT"),
            order_type: "market".to_string(),
            side,
            taker_or_maker: "taker".to_string(),
            price: self.price,
            amount: filled,
            cost: self.price * filled,
            fee_currency: "USDT".to_string(),
            fee_cost: self.price * filled * 0.00055,
            fee_rate: Some(0.00055),
            info: BTreeMap::new(),
        };
        self.fills.borrow_mut().insert(id.clone(), vec![fill]);
        Ok(id)
    }

    fn fetch_fills(&self, _symbol: &str, order_id: &str) -> Result<Vec<FillRecord>, BrokerError> {
        Ok(self.fills.borrow().get(order_id).cloned().unwrap_or_default())
    }

    fn fetch_balance(&self) -> Result<f64, BrokerError> {
        Ok(1_000.0)
    }
}

// --- ledger ---

#[derive(Default)]
pub struct MemoryLedger {
    pub fills: RefCell<Vec<FillRecord>>,
    pub rows: RefCell<Vec<TradeLedgerRow>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerPort for MemoryLedger {
    fn append_fills(&self, _recorded_at: NaiveDateTime, fills: &[FillRecord]) -> Result<(), SigtraderError> {
        self.fills.borrow_mut().extend_from_slice(fills);
        Ok(())
    }

    fn append_rows(&self, rows: &[TradeLedgerRow]) -> Result<(), SigtraderError> {
        self.rows.borrow_mut().extend_from_slice(rows);
        Ok(())
    }
}

// --- notifications ---

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl NotifyPort for RecordingNotifier {
    fn send(&self, text: &str) -> Result<(), NotifyError> {
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }
}
