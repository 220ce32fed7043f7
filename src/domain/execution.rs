//! Order execution against a broker.
//!
//! One call places exactly one market order. Placement is never retried: a
//! failure is returned and the caller abandons the symbol for this run.

use crate::domain::error::SigtraderError;
use crate::domain::fill::FillRecord;
use crate::domain::sizing::{TargetOrder, DEFAULT_QTY_PRECISION};
use crate::ports::broker_port::BrokerPort;
use crate::ports::ledger_port::LedgerPort;
use chrono::Utc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Execution parameters from the `[execution]` config section.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub leverage: f64,
    pub settle_delay: Duration,
    pub fill_poll_attempts: u32,
    pub fill_poll_delay: Duration,
    pub qty_precision: u32,
    pub post_trade_delay: Duration,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            leverage: 1.0,
            settle_delay: Duration::from_millis(200),
            fill_poll_attempts: 3,
            fill_poll_delay: Duration::from_millis(500),
            qty_precision: DEFAULT_QTY_PRECISION,
            post_trade_delay: Duration::from_millis(50),
        }
    }
}

impl ExecutionConfig {
    /// No sleeping anywhere.
    pub fn immediate() -> Self {
        ExecutionConfig {
            settle_delay: Duration::ZERO,
            fill_poll_delay: Duration::ZERO,
            post_trade_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// A placed order and the fills visible for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub order: TargetOrder,
    pub order_id: String,
    pub fills: Vec<FillRecord>,
}

impl ExecutionOutcome {
    pub fn filled_amount(&self) -> f64 {
        self.fills.iter().map(|f| f.amount).sum()
    }
}

pub struct ExecutionGateway<'a> {
    broker: &'a dyn BrokerPort,
    ledger: &'a dyn LedgerPort,
    config: ExecutionConfig,
}

impl<'a> ExecutionGateway<'a> {
    pub fn new(broker: &'a dyn BrokerPort, ledger: &'a dyn LedgerPort, config: ExecutionConfig) -> Self {
        Self {
            broker,
            ledger,
            config,
        }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn broker(&self) -> &dyn BrokerPort {
        self.broker
    }

    /// Sets the configured leverage unless the live value already matches.
    /// A "leverage not modified" rejection counts as success.
    pub fn ensure_leverage(&self, symbol: &str) -> Result<(), SigtraderError> {
        let position = self
            .broker
            .fetch_position(symbol)
            .map_err(|e| SigtraderError::broker(symbol, e))?;
        if position.leverage == Some(self.config.leverage) {
            return Ok(());
        }
        match self.broker.set_leverage(symbol, self.config.leverage) {
            Ok(()) => {
                info!(symbol, leverage = self.config.leverage, "leverage set");
                Ok(())
            }
            Err(e) if e.is_leverage_not_modified() => {
                debug!(symbol, error = %e, "leverage not modified");
                Ok(())
            }
            Err(e) => Err(SigtraderError::broker(symbol, e)),
        }
    }

    /// Places the order, waits for it to settle and collects its fills.
    /// Fills are appended to the raw fill log.
    pub fn execute(&self, order: &TargetOrder) -> Result<ExecutionOutcome, SigtraderError> {
        let symbol = order.symbol.as_str();
        self.ensure_leverage(symbol)?;

        let order_id = self
            .broker
            .place_market_order(symbol, order.side, order.notional)
            .map_err(|e| {
                error!(symbol, side = %order.side, notional = order.notional, error = %e, "order placement failed");
                SigtraderError::broker(symbol, e)
            })?;
        info!(symbol, order_id = %order_id, side = %order.side, notional = order.notional, "order placed");

        sleep(self.config.settle_delay);
        let fills = self.poll_fills(symbol, &order_id);

        if !fills.is_empty() {
            let recorded_at = Utc::now().naive_utc();
            if let Err(e) = self.ledger.append_fills(recorded_at, &fills) {
                error!(symbol, order_id = %order_id, error = %e, "failed to record fills");
            }
        }
        sleep(self.config.post_trade_delay);

        Ok(ExecutionOutcome {
            order: order.clone(),
            order_id,
            fills,
        })
    }

    fn poll_fills(&self, symbol: &str, order_id: &str) -> Vec<FillRecord> {
        let attempts = self.config.fill_poll_attempts.max(1);
        for attempt in 1..=attempts {
            match self.broker.fetch_fills(symbol, order_id) {
                Ok(fills) if !fills.is_empty() => return fills,
                Ok(_) => debug!(symbol, order_id, attempt, "fills not yet visible"),
                Err(e) => warn!(symbol, order_id, attempt, error = %e, "fill fetch failed"),
            }
            if attempt < attempts {
                sleep(self.config.fill_poll_delay);
            }
        }
        warn!(symbol, order_id, attempts, "no fills visible for order");
        Vec::new()
    }
}

fn sleep(d: Duration) {
    if !d.is_zero() {
        thread::sleep(d);
    }
}
