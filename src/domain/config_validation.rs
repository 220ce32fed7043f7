//! Configuration validation.
//!
//! Runs before any side effect. Every failure here is fatal at startup.

use crate::domain::error::SigtraderError;
use crate::domain::sizing::BetSizeTable;
use crate::domain::strategy::{StrategyInstance, StrategyKind};
use crate::ports::config_port::ConfigPort;
use std::collections::BTreeSet;
use tracing::warn;

pub fn validate_runtime_config(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    validate_paths(config)?;
    validate_bet_sizes(config)?;
    validate_execution(config)?;
    validate_notify(config)?;
    validate_broker(config)?;
    Ok(())
}

/// Checks every strategy row against the bet size table. Unknown kinds are
/// only warned about; they are skipped at evaluation time.
pub fn validate_strategies(
    instances: &[StrategyInstance],
    bet_sizes: &BetSizeTable,
) -> Result<(), SigtraderError> {
    if instances.is_empty() {
        return Err(SigtraderError::StrategyTable {
            reason: "no strategy rows".to_string(),
        });
    }

    let mut seen = BTreeSet::new();
    for inst in instances {
        if !seen.insert(inst.key()) {
            return Err(SigtraderError::StrategyInvalid {
                instance: inst.key().to_string(),
                reason: "duplicate name and symbol".to_string(),
            });
        }
        if inst.series_column.trim().is_empty() {
            return Err(SigtraderError::StrategyInvalid {
                instance: inst.key().to_string(),
                reason: "endpt_col is empty".to_string(),
            });
        }
        if StrategyKind::resolve(inst)?.is_none() {
            warn!(instance = %inst.key(), kind = %inst.kind, "unsupported strategy kind");
        }
        if bet_sizes.get(&inst.symbol).is_none() {
            return Err(SigtraderError::ConfigMissing {
                section: "bet_size".to_string(),
                key: inst.symbol.clone(),
            });
        }
    }
    Ok(())
}

fn require_string(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, SigtraderError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(SigtraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> SigtraderError {
    SigtraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_paths(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    require_string(config, "paths", "data_dir")?;
    Ok(())
}

fn validate_bet_sizes(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    for key in config.keys("bet_size") {
        let raw = config.get_string("bet_size", &key).unwrap_or_default();
        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() && v > 0.0 => {}
            _ => return Err(invalid("bet_size", &key, "bet size must be a positive number")),
        }
    }
    Ok(())
}

fn validate_execution(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    let leverage = config.get_double("execution", "leverage", 1.0);
    if !(leverage.is_finite() && leverage > 0.0) {
        return Err(invalid("execution", "leverage", "leverage must be positive"));
    }
    for key in ["settle_delay_ms", "fill_poll_delay_ms", "post_trade_delay_ms"] {
        if config.get_int("execution", key, 0) < 0 {
            return Err(invalid("execution", key, "delay must be non-negative"));
        }
    }
    if config.get_int("execution", "fill_poll_attempts", 3) < 1 {
        return Err(invalid("execution", "fill_poll_attempts", "fill_poll_attempts must be at least 1"));
    }
    let precision = config.get_int("execution", "qty_precision", 5);
    if !(0..=12).contains(&precision) {
        return Err(invalid("execution", "qty_precision", "qty_precision must be between 0 and 12"));
    }
    Ok(())
}

fn validate_notify(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    if config.get_int("notify", "max_attempts", 2) < 1 {
        return Err(invalid("notify", "max_attempts", "max_attempts must be at least 1"));
    }
    for key in ["backoff_ms", "pace_ms", "wait_timeout_secs"] {
        if config.get_int("notify", key, 0) < 0 {
            return Err(invalid("notify", key, "must be non-negative"));
        }
    }
    if config.get_bool("notify", "enabled", false) {
        let has_telegram = config.get_string("telegram", "token").is_some();
        if has_telegram {
            require_string(config, "telegram", "chat_id")?;
        }
    }
    Ok(())
}

fn validate_broker(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    match config.get_string("broker", "kind") {
        None => Ok(()),
        Some(kind) if kind.trim().eq_ignore_ascii_case("paper") => {
            for key in config.keys("paper_prices") {
                let raw = config.get_string("paper_prices", &key).unwrap_or_default();
                match raw.trim().parse::<f64>() {
                    Ok(v) if v.is_finite() && v > 0.0 => {}
                    _ => return Err(invalid("paper_prices", &key, "price must be a positive number")),
                }
            }
            Ok(())
        }
        Some(kind) => Err(invalid("broker", "kind", &format!("unsupported broker kind '{kind}'"))),
    }
}
