//! Exchange capability port trait.

use crate::domain::fill::FillRecord;
use crate::domain::position::PositionSnapshot;
use crate::domain::sizing::Side;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BrokerError {
    /// Timeouts, rate limits and other retryable transport failures.
    #[error("transient broker failure: {reason}")]
    Transient { reason: String },

    #[error("broker rejected request: {reason}")]
    Rejected { reason: String },

    #[error("unknown symbol {symbol}")]
    UnknownSymbol { symbol: String },
}

impl BrokerError {
    /// The venue refuses to set a leverage equal to the current one.
    pub fn is_leverage_not_modified(&self) -> bool {
        match self {
            BrokerError::Rejected { reason } => {
                reason.to_lowercase().contains("leverage not modified")
            }
            _ => false,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, BrokerError::Transient { .. })
    }
}

/// Synchronous exchange client. `symbol` is the base symbol as it appears in
/// the strategy table; adapters map it to their product symbol.
pub trait BrokerPort {
    fn fetch_position(&self, symbol: &str) -> Result<PositionSnapshot, BrokerError>;

    fn set_leverage(&self, symbol: &str, leverage: f64) -> Result<(), BrokerError>;

    /// Submits one market order and returns its order id.
    fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        notional: f64,
    ) -> Result<String, BrokerError>;

    fn fetch_fills(&self, symbol: &str, order_id: &str) -> Result<Vec<FillRecord>, BrokerError>;

    /// Account balance in the settlement currency.
    fn fetch_balance(&self) -> Result<f64, BrokerError>;
}
