//! Raw execution reports.

use crate::domain::sizing::Side;
use std::collections::BTreeMap;

/// One execution report for one order. An order may fill in several pieces.
#[derive(Debug, Clone, PartialEq)]
pub struct FillRecord {
    pub order_id: String,
    /// Exchange timestamp in milliseconds.
    pub timestamp: i64,
    pub datetime: String,
    /// Venue product symbol, e.g. `BTCUSDT`.
    pub symbol: String,
    pub order_type: String,
    pub side: Side,
    pub taker_or_maker: String,
    pub price: f64,
    pub amount: f64,
    pub cost: f64,
    pub fee_currency: String,
    pub fee_cost: f64,
    pub fee_rate: Option<f64>,
    /// Venue-specific fields, kept verbatim.
    pub info: BTreeMap<String, String>,
}

impl FillRecord {
    /// `info` serialised as a JSON object for the raw fill log.
    pub fn info_json(&self) -> String {
        serde_json::to_string(&self.info).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn signed_amount(&self) -> f64 {
        self.side.sign() * self.amount
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::fill;

    #[test]
    fn info_json_is_an_object() {
        let mut f = fill("o-1", 100.0, 1.0);
        assert_eq!(f.info_json(), "{}");
        f.info.insert("execId".into(), "abc".into());
        f.info.insert("execQty".into(), "1".into());
        assert_eq!(f.info_json(), r#"{"execId":"abc","execQty":"1"}"#);
    }

    #[test]
    fn signed_amount_follows_side() {
        let mut f = fill("o-1", 100.0, 0.5);
        assert_eq!(f.signed_amount(), 0.5);
        f.side = crate::domain::sizing::Side::Sell;
        assert_eq!(f.signed_amount(), -0.5);
    }
}
