//! Lazily built broker client, kept for the life of the process.

use crate::domain::fill::FillRecord;
use crate::domain::position::PositionSnapshot;
use crate::domain::sizing::Side;
use crate::ports::broker_port::{BrokerError, BrokerPort};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::info;

pub type BrokerFactory = Box<dyn Fn() -> Result<Rc<dyn BrokerPort>, BrokerError>>;

/// Builds the client on first use and reuses it until [`CachedBroker::rotate`].
pub struct CachedBroker {
    factory: BrokerFactory,
    client: RefCell<Option<Rc<dyn BrokerPort>>>,
}

impl CachedBroker {
    pub fn new(factory: BrokerFactory) -> Self {
        Self {
            factory,
            client: RefCell::new(None),
        }
    }

    /// Drops the cached client so the next call builds a new one, e.g. after
    /// credentials changed.
    pub fn rotate(&self) {
        if self.client.borrow_mut().take().is_some() {
            info!("broker client rotated");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.client.borrow().is_some()
    }

    fn client(&self) -> Result<Rc<dyn BrokerPort>, BrokerError> {
        if let Some(client) = self.client.borrow().as_ref() {
            return Ok(Rc::clone(client));
        }
        let client = (self.factory)()?;
        *self.client.borrow_mut() = Some(Rc::clone(&client));
        Ok(client)
    }
}

impl BrokerPort for CachedBroker {
    fn fetch_position(&self, symbol: &str) -> Result<PositionSnapshot, BrokerError> {
        self.client()?.fetch_position(symbol)
    }

    fn set_leverage(&self, symbol: &str, leverage: f64) -> Result<(), BrokerError> {
        self.client()?.set_leverage(symbol, leverage)
    }

    fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        notional: f64,
    ) -> Result<String, BrokerError> {
        self.client()?.place_market_order(symbol, side, notional)
    }

    fn fetch_fills(&self, symbol: &str, order_id: &str) -> Result<Vec<FillRecord>, BrokerError> {
        self.client()?.fetch_fills(symbol, order_id)
    }

    fn fetch_balance(&self) -> Result<f64, BrokerError> {
        self.client()?.fetch_balance()
    }
}
