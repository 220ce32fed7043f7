//! Fill aggregation and attribution to signal events.
//!
//! All fills of one order collapse into one aggregate. The aggregate is then
//! split evenly across the signal rows that caused the order, one ledger row
//! per signal row.

use crate::domain::fill::FillRecord;
use crate::domain::series::format_timestamp;
use crate::domain::signal::Signal;
use crate::domain::transition::SignalTransition;
use std::collections::BTreeMap;

/// One persisted row of the trade history.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeLedgerRow {
    pub date: String,
    pub name: String,
    pub symbol: String,
    pub saved_csv: String,
    pub signal: Signal,
    pub order_id: String,
    pub t_timestamp: i64,
    pub t_datetime: String,
    pub t_type: String,
    pub side: String,
    pub taker_or_maker: String,
    pub price: f64,
    pub amount: f64,
    pub cost: f64,
    pub product_symbol: String,
    pub fee_currency: String,
    pub fee_cost: f64,
    pub fee_rate: Option<f64>,
}

/// Aggregates the fills of one order. Quantities are summed, shared fields
/// kept, divergent text fields take the first fill's value, and the price of
/// a multi-fill order is `cost / amount`. Returns `None` for no fills.
pub fn aggregate_fills(fills: &[FillRecord]) -> Option<FillRecord> {
    let (first, rest) = fills.split_first()?;
    if rest.is_empty() {
        return Some(first.clone());
    }

    let amount: f64 = fills.iter().map(|f| f.amount).sum();
    let cost: f64 = fills.iter().map(|f| f.cost).sum();
    let fee_cost: f64 = fills.iter().map(|f| f.fee_cost).sum();
    let price = if amount != 0.0 { cost / amount } else { first.price };

    Some(FillRecord {
        amount,
        cost,
        fee_cost,
        price,
        info: merge_info(fills),
        ..first.clone()
    })
}

fn merge_info(fills: &[FillRecord]) -> BTreeMap<String, String> {
    let mut keys: Vec<&String> = fills.iter().flat_map(|f| f.info.keys()).collect();
    keys.sort();
    keys.dedup();

    let mut out = BTreeMap::new();
    for key in keys {
        let values: Vec<&String> = fills.iter().filter_map(|f| f.info.get(key)).collect();
        let Some(first) = values.first() else {
            continue;
        };
        if values.iter().all(|v| v == first) {
            out.insert(key.clone(), (*first).clone());
            continue;
        }
        let numbers: Option<Vec<f64>> = values.iter().map(|v| v.trim().parse::<f64>().ok()).collect();
        let merged = match numbers {
            Some(ns) => ns.iter().sum::<f64>().to_string(),
            None => (*first).clone(),
        };
        out.insert(key.clone(), merged);
    }
    out
}

/// Splits one aggregate across the transitions that shared the order.
pub fn attribute(aggregate: &FillRecord, transitions: &[SignalTransition]) -> Vec<TradeLedgerRow> {
    if transitions.is_empty() {
        return Vec::new();
    }
    let n = transitions.len() as f64;
    transitions
        .iter()
        .map(|t| TradeLedgerRow {
            date: format_timestamp(&t.current_timestamp),
            name: t.key.name.clone(),
            symbol: t.key.symbol.clone(),
            saved_csv: t.saved_csv.clone(),
            signal: t.current,
            order_id: aggregate.order_id.clone(),
            t_timestamp: aggregate.timestamp,
            t_datetime: aggregate.datetime.clone(),
            t_type: aggregate.order_type.clone(),
            side: aggregate.side.to_string(),
            taker_or_maker: aggregate.taker_or_maker.clone(),
            price: aggregate.price,
            amount: aggregate.amount / n,
            cost: aggregate.cost / n,
            product_symbol: aggregate.symbol.clone(),
            fee_currency: aggregate.fee_currency.clone(),
            fee_cost: aggregate.fee_cost / n,
            fee_rate: aggregate.fee_rate,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fill::test_support::fill;
    use crate::domain::signal::InstanceKey;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn transition(name: &str) -> SignalTransition {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        SignalTransition {
            key: InstanceKey::new(name, "BTC"),
            saved_csv: format!("{name}_close_BTC.csv"),
            previous: Signal::Short,
            current: Signal::Long,
            previous_timestamp: None,
            current_timestamp: ts,
        }
    }

    #[test]
    fn no_fills_no_aggregate() {
        assert!(aggregate_fills(&[]).is_none());
    }

    #[test]
    fn single_fill_is_kept_as_is() {
        let f = fill("o-1", 100.0, 0.5);
        assert_eq!(aggregate_fills(std::slice::from_ref(&f)), Some(f));
    }

    #[test]
    fn amounts_and_costs_are_summed() {
        let mut fills = vec![fill("o-1", 10.0, 1.0), fill("o-1", 10.0, 2.0), fill("o-1", 10.0, 3.0)];
        fills[0].cost = 10.0;
        fills[1].cost = 20.0;
        fills[2].cost = 30.0;
        let agg = aggregate_fills(&fills).unwrap();
        assert_relative_eq!(agg.amount, 6.0);
        assert_relative_eq!(agg.cost, 60.0);
        assert_relative_eq!(agg.price, 10.0);
    }

    #[test]
    fn multi_fill_price_is_volume_weighted() {
        let fills = vec![fill("o-1", 100.0, 1.0), fill("o-1", 103.0, 2.0)];
        let agg = aggregate_fills(&fills).unwrap();
        assert_relative_eq!(agg.price, 306.0 / 3.0);
        assert_relative_eq!(agg.fee_cost, 306.0 * 0.00055, epsilon = 1e-12);
    }

    #[test]
    fn divergent_fields_take_first_or_sum() {
        let mut a = fill("o-1", 100.0, 1.0);
        let mut b = fill("o-1", 100.0, 1.0);
        a.datetime = "2024-03-01T00:00:00.000Z".into();
        b.datetime = "2024-03-01T00:00:01.000Z".into();
        a.info.insert("execId".into(), "x1".into());
        b.info.insert("execId".into(), "x2".into());
        a.info.insert("execQty".into(), "0.4".into());
        b.info.insert("execQty".into(), "0.6".into());
        a.info.insert("orderType".into(), "Market".into());
        b.info.insert("orderType".into(), "Market".into());

        let agg = aggregate_fills(&[a, b]).unwrap();
        assert_eq!(agg.datetime, "2024-03-01T00:00:00.000Z");
        assert_eq!(agg.info["execId"], "x1");
        assert_eq!(agg.info["execQty"], "1");
        assert_eq!(agg.info["orderType"], "Market");
    }

    #[test]
    fn attribution_splits_evenly() {
        let mut agg = fill("o-9", 100.0, 0.02);
        agg.fee_cost = 0.004;
        let rows = attribute(&agg, &[transition("zs_a"), transition("mc_b")]);
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row.order_id, "o-9");
            assert_relative_eq!(row.amount, 0.01);
            assert_relative_eq!(row.cost, 1.0);
            assert_relative_eq!(row.fee_cost, 0.002);
            assert_eq!(row.side, "buy");
            assert_eq!(row.date, "2024-03-01 08:00:00");
            assert_eq!(row.signal, Signal::Long);
        }
        assert_eq!(rows[0].name, "zs_a");
        assert_eq!(rows[1].saved_csv, "mc_b_close_BTC.csv");
    }

    #[test]
    fn attribution_without_transitions_is_empty() {
        assert!(attribute(&fill("o-1", 1.0, 1.0), &[]).is_empty());
    }
}
