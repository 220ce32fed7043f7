//! Core domain types and logic.

pub mod config_validation;
pub mod error;
pub mod execution;
pub mod fill;
pub mod indicator;
pub mod ledger;
pub mod message;
pub mod pipeline;
pub mod position;
pub mod reconcile;
pub mod series;
pub mod signal;
pub mod signal_history;
pub mod sizing;
pub mod strategy;
pub mod transition;
