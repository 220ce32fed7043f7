//! Port traits: the boundary between domain logic and the outside world.

pub mod broker_port;
pub mod config_port;
pub mod ledger_port;
pub mod notify_port;
pub mod series_port;
pub mod signal_store_port;
