//! CSV trade history under `{data_dir}/trade/`.

use crate::adapters::csv_append::append_records;
use crate::domain::error::SigtraderError;
use crate::domain::fill::FillRecord;
use crate::domain::ledger::TradeLedgerRow;
use crate::ports::ledger_port::LedgerPort;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::path::PathBuf;

pub const TRADE_RECORD_FILE: &str = "trade_record.csv";
pub const TRADE_HIST_FILE: &str = "trade_hist.csv";

#[derive(Debug, Serialize)]
struct RawFillRow<'a> {
    rec_time: String,
    timestamp: i64,
    datetime: &'a str,
    symbol: &'a str,
    order: &'a str,
    #[serde(rename = "type")]
    order_type: &'a str,
    side: &'a str,
    #[serde(rename = "takerOrMaker")]
    taker_or_maker: &'a str,
    price: f64,
    amount: f64,
    cost: f64,
    #[serde(rename = "fee.currency")]
    fee_currency: &'a str,
    #[serde(rename = "fee.cost")]
    fee_cost: f64,
    #[serde(rename = "fee.rate")]
    fee_rate: Option<f64>,
    info: String,
}

#[derive(Debug, Serialize)]
struct HistRow<'a> {
    date: &'a str,
    name: &'a str,
    symbol: &'a str,
    saved_csv: &'a str,
    signal: String,
    order_id: &'a str,
    t_timestamp: i64,
    t_datetime: &'a str,
    t_type: &'a str,
    side: &'a str,
    #[serde(rename = "takerOrMaker")]
    taker_or_maker: &'a str,
    price: f64,
    amount: f64,
    cost: f64,
    product_symbol: &'a str,
    #[serde(rename = "feeCurrency")]
    fee_currency: &'a str,
    #[serde(rename = "fee.cost")]
    fee_cost: f64,
    #[serde(rename = "fee.rate")]
    fee_rate: Option<f64>,
}

impl<'a> From<&'a TradeLedgerRow> for HistRow<'a> {
    fn from(r: &'a TradeLedgerRow) -> Self {
        HistRow {
            date: &r.date,
            name: &r.name,
            symbol: &r.symbol,
            saved_csv: &r.saved_csv,
            signal: r.signal.to_string(),
            order_id: &r.order_id,
            t_timestamp: r.t_timestamp,
            t_datetime: &r.t_datetime,
            t_type: &r.t_type,
            side: &r.side,
            taker_or_maker: &r.taker_or_maker,
            price: r.price,
            amount: r.amount,
            cost: r.cost,
            product_symbol: &r.product_symbol,
            fee_currency: &r.fee_currency,
            fee_cost: r.fee_cost,
            fee_rate: r.fee_rate,
        }
    }
}

pub struct CsvLedger {
    dir: PathBuf,
}

impl CsvLedger {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            dir: data_dir.join("trade"),
        }
    }

    pub fn record_path(&self) -> PathBuf {
        self.dir.join(TRADE_RECORD_FILE)
    }

    pub fn hist_path(&self) -> PathBuf {
        self.dir.join(TRADE_HIST_FILE)
    }
}

impl LedgerPort for CsvLedger {
    fn append_fills(
        &self,
        recorded_at: NaiveDateTime,
        fills: &[FillRecord],
    ) -> Result<(), SigtraderError> {
        let rec_time = recorded_at.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let rows: Vec<RawFillRow<'_>> = fills
            .iter()
            .map(|f| RawFillRow {
                rec_time: rec_time.clone(),
                timestamp: f.timestamp,
                datetime: &f.datetime,
                symbol: &f.symbol,
                order: &f.order_id,
                order_type: &f.order_type,
                side: f.side.as_str(),
                taker_or_maker: &f.taker_or_maker,
                price: f.price,
                amount: f.amount,
                cost: f.cost,
                fee_currency: &f.fee_currency,
                fee_cost: f.fee_cost,
                fee_rate: f.fee_rate,
                info: f.info_json(),
            })
            .collect();
        append_records(&self.record_path(), &rows).map_err(|e| SigtraderError::Ledger {
            reason: format!("failed to append {}: {}", self.record_path().display(), e),
        })
    }

    fn append_rows(&self, rows: &[TradeLedgerRow]) -> Result<(), SigtraderError> {
        let hist: Vec<HistRow<'_>> = rows.iter().map(HistRow::from).collect();
        append_records(&self.hist_path(), &hist).map_err(|e| SigtraderError::Ledger {
            reason: format!("failed to append {}: {}", self.hist_path().display(), e),
        })
    }
}
