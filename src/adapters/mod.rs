//! Concrete adapter implementations for ports.

pub mod cached_broker;
pub mod csv_adapter;
pub mod csv_append;
pub mod csv_ledger;
pub mod csv_signal_store;
pub mod file_config_adapter;
pub mod log_notifier;
pub mod notify_worker;
pub mod paper_broker;
pub mod strategy_table;
#[cfg(feature = "telegram")]
pub mod telegram;
