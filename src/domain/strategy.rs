//! Strategy instance configuration rows and their resolved indicator kinds.

use crate::domain::error::SigtraderError;
use crate::domain::signal::InstanceKey;
use std::fmt;

pub const SUPPORTED_KINDS: [&str; 5] = ["zscore", "ma_cross", "bollinger", "momentum", "macd_quantile"];

/// Which sides of a strategy are allowed to emit a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Long,
    Short,
    LongShort,
}

impl Mode {
    pub fn parse(s: &str) -> Option<Mode> {
        match s.trim().to_lowercase().as_str() {
            "long" => Some(Mode::Long),
            "short" => Some(Mode::Short),
            "long_short" => Some(Mode::LongShort),
            _ => None,
        }
    }

    pub fn allows_long(self) -> bool {
        matches!(self, Mode::Long | Mode::LongShort)
    }

    pub fn allows_short(self) -> bool {
        matches!(self, Mode::Short | Mode::LongShort)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Long => write!(f, "long"),
            Mode::Short => write!(f, "short"),
            Mode::LongShort => write!(f, "long_short"),
        }
    }
}

/// Raw parameter columns of a strategy row. Unused columns stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyParams {
    pub rol: Option<usize>,
    pub thres: Option<f64>,
    pub num_std: Option<f64>,
    pub short_rol: Option<usize>,
    pub long_rol: Option<usize>,
    pub upper_thres: Option<f64>,
    pub lower_thres: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyInstance {
    pub name: String,
    pub symbol: String,
    pub series_column: String,
    pub kind: String,
    pub mode: Mode,
    pub params: StrategyParams,
}

impl StrategyInstance {
    pub fn key(&self) -> InstanceKey {
        InstanceKey::new(&self.name, &self.symbol)
    }

    /// File name of the persisted indicator frame, also the `saved_csv` column.
    pub fn frame_name(&self) -> String {
        format!("{}_{}_{}.csv", self.name, self.series_column, self.symbol)
    }
}

/// A strategy kind with its parameters validated.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyKind {
    Zscore { window: usize, threshold: f64 },
    MaCross { short_window: usize, long_window: usize },
    Bollinger { window: usize, num_std: f64 },
    Momentum { window: usize, threshold: f64 },
    MacdQuantile {
        window: usize,
        upper_pct: f64,
        lower_pct: f64,
    },
}

impl StrategyKind {
    /// Resolves the row's kind. `Ok(None)` means the kind is not supported and
    /// the row should be skipped; `Err` means a supported kind is misconfigured.
    pub fn resolve(instance: &StrategyInstance) -> Result<Option<StrategyKind>, SigtraderError> {
        let p = &instance.params;
        let kind = match instance.kind.trim().to_lowercase().as_str() {
            "zscore" => StrategyKind::Zscore {
                window: window(instance, "rol", p.rol)?,
                threshold: number(instance, "thres", p.thres)?,
            },
            "ma_cross" => StrategyKind::MaCross {
                short_window: window(instance, "short_rol", p.short_rol)?,
                long_window: window(instance, "long_rol", p.long_rol)?,
            },
            "bollinger" => StrategyKind::Bollinger {
                window: window(instance, "rol", p.rol)?,
                num_std: number(instance, "num_std", p.num_std)?,
            },
            "momentum" => StrategyKind::Momentum {
                window: window(instance, "rol", p.rol)?,
                threshold: number(instance, "thres", p.thres)?,
            },
            "macd_quantile" => {
                let base = p.thres;
                let upper = p.upper_thres.or(base);
                let lower = p.lower_thres.or(base);
                let upper_pct = number(instance, "thres", upper)?;
                let lower_pct = number(instance, "thres", lower)?;
                for (key, v) in [("upper_thres", upper_pct), ("lower_thres", lower_pct)] {
                    if !(0.0..=100.0).contains(&v) {
                        return Err(invalid(instance, &format!("{key} must be within 0..=100")));
                    }
                }
                StrategyKind::MacdQuantile {
                    window: window(instance, "rol", p.rol)?,
                    upper_pct,
                    lower_pct,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(kind))
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Zscore { window, threshold } => {
                write!(f, "ZSCORE({},{})", window, threshold)
            }
            StrategyKind::MaCross {
                short_window,
                long_window,
            } => write!(f, "MA_CROSS({},{})", short_window, long_window),
            StrategyKind::Bollinger { window, num_std } => {
                write!(f, "BOLLINGER({},{})", window, num_std)
            }
            StrategyKind::Momentum { window, threshold } => {
                write!(f, "MOMENTUM({},{})", window, threshold)
            }
            StrategyKind::MacdQuantile {
                window,
                upper_pct,
                lower_pct,
            } => write!(f, "MACD_QUANTILE({},{},{})", window, upper_pct, lower_pct),
        }
    }
}

fn invalid(instance: &StrategyInstance, reason: &str) -> SigtraderError {
    SigtraderError::StrategyInvalid {
        instance: instance.key().to_string(),
        reason: reason.to_string(),
    }
}

fn window(
    instance: &StrategyInstance,
    column: &str,
    value: Option<usize>,
) -> Result<usize, SigtraderError> {
    match value {
        Some(0) => Err(invalid(instance, &format!("{column} must be positive"))),
        Some(v) => Ok(v),
        None => Err(invalid(instance, &format!("missing parameter {column}"))),
    }
}

fn number(
    instance: &StrategyInstance,
    column: &str,
    value: Option<f64>,
) -> Result<f64, SigtraderError> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        Some(_) => Err(invalid(instance, &format!("{column} must be finite"))),
        None => Err(invalid(instance, &format!("missing parameter {column}"))),
    }
}
