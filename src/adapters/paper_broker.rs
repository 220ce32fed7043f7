//! In-memory paper venue.
//!
//! Market orders fill completely at the configured mark price of the symbol
//! as one taker execution. Positions are signed and netted per symbol. With a
//! state file the account survives between runs.

use crate::domain::fill::FillRecord;
use crate::domain::position::PositionSnapshot;
use crate::domain::sizing::Side;
use crate::ports::broker_port::{BrokerError, BrokerPort};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

pub const TAKER_FEE_RATE: f64 = 0.00055;
pub const SETTLE_CURRENCY: &str = "USDT";
const DEFAULT_BALANCE: f64 = 10_000.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct PaperPosition {
    size: f64,
    average_price: f64,
    leverage: Option<f64>,
    cum_realized_pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PaperAccount {
    balance: f64,
    next_order: u64,
    positions: BTreeMap<String, PaperPosition>,
}

impl Default for PaperAccount {
    fn default() -> Self {
        Self {
            balance: DEFAULT_BALANCE,
            next_order: 1,
            positions: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Default)]
struct PaperState {
    account: PaperAccount,
    fills: BTreeMap<String, Vec<FillRecord>>,
    reject_orders: Option<String>,
    delayed_polls: u32,
    pending_delays: BTreeMap<String, u32>,
}

pub struct PaperBroker {
    prices: BTreeMap<String, f64>,
    state_file: Option<PathBuf>,
    state: Mutex<PaperState>,
}

/// `BTC` → `BTCUSDT`.
pub fn product_symbol(symbol: &str) -> String {
    format!("{}{}", symbol.to_uppercase(), SETTLE_CURRENCY)
}

impl PaperBroker {
    pub fn new(prices: BTreeMap<String, f64>) -> Self {
        let prices = prices
            .into_iter()
            .map(|(k, v)| (k.to_uppercase(), v))
            .collect();
        Self {
            prices,
            state_file: None,
            state: Mutex::new(PaperState::default()),
        }
    }

    /// Loads the account from `path` when it exists and saves it after every
    /// order or leverage change. An unreadable file starts a fresh account.
    pub fn with_state_file(mut self, path: PathBuf) -> Self {
        match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<PaperAccount>(&content) {
                Ok(account) => {
                    if let Ok(mut state) = self.state.lock() {
                        state.account = account;
                    }
                }
                Err(e) => warn!(path = %path.display(), error = %e, "ignoring unreadable paper state"),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to read paper state"),
        }
        self.state_file = Some(path);
        self
    }

    pub fn with_balance(self, balance: f64) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.account.balance = balance;
        }
        self
    }

    /// Opens a position directly, bypassing order flow.
    pub fn with_position(self, symbol: &str, size: f64) -> Self {
        let price = self.prices.get(&symbol.to_uppercase()).copied().unwrap_or(0.0);
        if let Ok(mut state) = self.state.lock() {
            state.account.positions.insert(
                symbol.to_uppercase(),
                PaperPosition {
                    size,
                    average_price: price,
                    ..PaperPosition::default()
                },
            );
        }
        self
    }

    /// Every subsequent order is refused with `reason`. `None` lifts it.
    pub fn reject_orders(&self, reason: Option<&str>) {
        if let Ok(mut state) = self.state.lock() {
            state.reject_orders = reason.map(str::to_string);
        }
    }

    /// Each subsequent order reports no fills for its first `polls` queries.
    pub fn delay_fills(&self, polls: u32) {
        if let Ok(mut state) = self.state.lock() {
            state.delayed_polls = polls;
        }
    }

    pub fn position_size(&self, symbol: &str) -> f64 {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.account.positions.get(&symbol.to_uppercase()).map(|p| p.size))
            .unwrap_or(0.0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, PaperState>, BrokerError> {
        self.state.lock().map_err(|_| BrokerError::Transient {
            reason: "paper broker state poisoned".to_string(),
        })
    }

    fn price(&self, symbol: &str) -> Result<f64, BrokerError> {
        self.prices
            .get(&symbol.to_uppercase())
            .copied()
            .ok_or_else(|| BrokerError::UnknownSymbol {
                symbol: symbol.to_string(),
            })
    }

    fn persist(&self, account: &PaperAccount) {
        let Some(path) = &self.state_file else {
            return;
        };
        let result = serde_json::to_string_pretty(account)
            .map_err(|e| e.to_string())
            .and_then(|json| {
                if let Some(dir) = path.parent() {
                    fs::create_dir_all(dir).map_err(|e| e.to_string())?;
                }
                fs::write(path, json).map_err(|e| e.to_string())
            });
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "failed to save paper state");
        }
    }
}

/// Applies a signed fill to a netted position.
fn apply_fill(pos: &mut PaperPosition, signed_amount: f64, price: f64) {
    let old = pos.size;
    let new = old + signed_amount;
    if old == 0.0 || old.signum() == signed_amount.signum() {
        let total = old.abs() + signed_amount.abs();
        pos.average_price = (pos.average_price * old.abs() + price * signed_amount.abs()) / total;
    } else {
        let closed = signed_amount.abs().min(old.abs());
        pos.cum_realized_pnl += closed * (price - pos.average_price) * old.signum();
        if new == 0.0 {
            pos.average_price = 0.0;
        } else if new.signum() != old.signum() {
            pos.average_price = price;
        }
    }
    pos.size = new;
}

impl BrokerPort for PaperBroker {
    fn fetch_position(&self, symbol: &str) -> Result<PositionSnapshot, BrokerError> {
        let mark = self.price(symbol)?;
        let state = self.lock()?;
        let pos = state
            .account
            .positions
            .get(&symbol.to_uppercase())
            .cloned()
            .unwrap_or_default();
        let has_position = pos.size != 0.0;
        Ok(PositionSnapshot {
            symbol: symbol.to_string(),
            size: pos.size,
            leverage: pos.leverage,
            mark_price: Some(mark),
            average_price: has_position.then_some(pos.average_price),
            liquidation_price: None,
            position_value: Some(pos.size.abs() * mark),
            unrealized_pnl: Some(pos.size * (mark - pos.average_price)).filter(|_| has_position),
            cum_realized_pnl: Some(pos.cum_realized_pnl),
            balance: None,
            as_of: Some(Utc::now().naive_utc()),
        })
    }

    fn set_leverage(&self, symbol: &str, leverage: f64) -> Result<(), BrokerError> {
        self.price(symbol)?;
        let mut state = self.lock()?;
        let pos = state
            .account
            .positions
            .entry(symbol.to_uppercase())
            .or_default();
        if pos.leverage == Some(leverage) {
            return Err(BrokerError::Rejected {
                reason: "leverage not modified".to_string(),
            });
        }
        pos.leverage = Some(leverage);
        self.persist(&state.account);
        Ok(())
    }

    fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        notional: f64,
    ) -> Result<String, BrokerError> {
        let price = self.price(symbol)?;
        if !notional.is_finite() || notional <= 0.0 {
            return Err(BrokerError::Rejected {
                reason: format!("invalid order quantity {notional}"),
            });
        }
        let mut state = self.lock()?;
        if let Some(reason) = &state.reject_orders {
            return Err(BrokerError::Rejected {
                reason: reason.clone(),
            });
        }

        let order_id = format!("paper-{}", state.account.next_order);
        state.account.next_order += 1;

        let now: DateTime<Utc> = Utc::now();
        let cost = price * notional;
        let fee_cost = cost * TAKER_FEE_RATE;
        let mut info = BTreeMap::new();
        info.insert("execId".to_string(), format!("{order_id}-1"));
        info.insert("execQty".to_string(), notional.to_string());
        let fill = FillRecord {
            order_id: order_id.clone(),
            timestamp: now.timestamp_millis(),
            datetime: now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            symbol: product_symbol(symbol),
            order_type: "market".to_string(),
            side,
            taker_or_maker: "taker".to_string(),
            price,
            amount: notional,
            cost,
            fee_currency: SETTLE_CURRENCY.to_string(),
            fee_cost,
            fee_rate: Some(TAKER_FEE_RATE),
            info,
        };

        let pos = state
            .account
            .positions
            .entry(symbol.to_uppercase())
            .or_default();
        let realized_before = pos.cum_realized_pnl;
        apply_fill(pos, side.sign() * notional, price);
        let realized = pos.cum_realized_pnl - realized_before;
        state.account.balance += realized - fee_cost;

        let delay = state.delayed_polls;
        if delay > 0 {
            state.pending_delays.insert(order_id.clone(), delay);
        }
        state.fills.insert(order_id.clone(), vec![fill]);
        self.persist(&state.account);
        debug!(symbol, order_id = %order_id, side = %side, qty = notional, price, "paper order filled");
        Ok(order_id)
    }

    fn fetch_fills(&self, _symbol: &str, order_id: &str) -> Result<Vec<FillRecord>, BrokerError> {
        let mut state = self.lock()?;
        if let Some(remaining) = state.pending_delays.get_mut(order_id) {
            *remaining -= 1;
            if *remaining == 0 {
                state.pending_delays.remove(order_id);
            }
            return Ok(Vec::new());
        }
        Ok(state.fills.get(order_id).cloned().unwrap_or_default())
    }

    fn fetch_balance(&self) -> Result<f64, BrokerError> {
        Ok(self.lock()?.account.balance)
    }
}
