//! Trade history persistence port trait.

use crate::domain::error::SigtraderError;
use crate::domain::fill::FillRecord;
use crate::domain::ledger::TradeLedgerRow;
use chrono::NaiveDateTime;

/// Append-only storage for raw fills and attributed ledger rows.
pub trait LedgerPort {
    fn append_fills(
        &self,
        recorded_at: NaiveDateTime,
        fills: &[FillRecord],
    ) -> Result<(), SigtraderError>;

    fn append_rows(&self, rows: &[TradeLedgerRow]) -> Result<(), SigtraderError>;
}
