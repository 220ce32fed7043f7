//! Live position snapshots as reported by the broker.

use chrono::NaiveDateTime;

/// Position of one symbol at one instant. Advisory: always re-fetched before
/// a decision, never cached.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PositionSnapshot {
    pub symbol: String,
    /// Signed size, negative when short.
    pub size: f64,
    pub leverage: Option<f64>,
    pub mark_price: Option<f64>,
    pub average_price: Option<f64>,
    pub liquidation_price: Option<f64>,
    pub position_value: Option<f64>,
    pub unrealized_pnl: Option<f64>,
    pub cum_realized_pnl: Option<f64>,
    pub balance: Option<f64>,
    pub as_of: Option<NaiveDateTime>,
}

impl PositionSnapshot {
    pub fn flat(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            ..Self::default()
        }
    }

    pub fn is_long(&self) -> bool {
        self.size > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.size < 0.0
    }

    pub fn is_flat(&self) -> bool {
        self.size == 0.0
    }

    pub fn side_label(&self) -> &'static str {
        if self.is_long() {
            "Buy"
        } else if self.is_short() {
            "Sell"
        } else {
            "None"
        }
    }

    /// `key: value` pairs for status messages, in a stable order.
    pub fn status_fields(&self) -> Vec<(&'static str, String)> {
        let opt = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string());
        vec![
            ("symbol", self.symbol.clone()),
            ("side", self.side_label().to_string()),
            ("size", self.size.abs().to_string()),
            ("leverage", opt(self.leverage)),
            ("markPrice", opt(self.mark_price)),
            ("avgPrice", opt(self.average_price)),
            ("liqPrice", opt(self.liquidation_price)),
            ("positionValue", opt(self.position_value)),
            ("unrealisedPnl", opt(self.unrealized_pnl)),
            ("cumRealisedPnl", opt(self.cum_realized_pnl)),
            ("balance", opt(self.balance)),
        ]
    }
}
