//! Domain error types.

use crate::ports::broker_port::BrokerError;

/// Top-level error type for sigtrader.
#[derive(Debug, thiserror::Error)]
pub enum SigtraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("strategy table error: {reason}")]
    StrategyTable { reason: String },

    #[error("invalid strategy {instance}: {reason}")]
    StrategyInvalid { instance: String, reason: String },

    #[error("series error for {instance}: {reason}")]
    Series { instance: String, reason: String },

    #[error("signal store error: {reason}")]
    SignalStore { reason: String },

    #[error("ledger error: {reason}")]
    Ledger { reason: String },

    #[error("broker error for {symbol}: {source}")]
    Broker {
        symbol: String,
        #[source]
        source: BrokerError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SigtraderError {
    pub fn broker(symbol: &str, source: BrokerError) -> Self {
        SigtraderError::Broker {
            symbol: symbol.to_string(),
            source,
        }
    }
}

impl From<&SigtraderError> for std::process::ExitCode {
    fn from(err: &SigtraderError) -> Self {
        let code: u8 = match err {
            SigtraderError::Io(_) => 1,
            SigtraderError::ConfigParse { .. }
            | SigtraderError::ConfigMissing { .. }
            | SigtraderError::ConfigInvalid { .. }
            | SigtraderError::StrategyTable { .. }
            | SigtraderError::StrategyInvalid { .. } => 2,
            SigtraderError::SignalStore { .. } | SigtraderError::Ledger { .. } => 3,
            SigtraderError::Broker { .. } => 4,
            SigtraderError::Series { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
