//! CSV strategy table.
//!
//! Required columns: `name,symbol,endpt_col,strat,mode`. Parameter columns
//! `rol,thres,num_std,short_rol,long_rol,upper_thres,lower_thres` are
//! optional and blank when unused.

use crate::adapters::csv_append::overwrite_records;
use crate::domain::error::SigtraderError;
use crate::domain::strategy::{Mode, StrategyInstance, StrategyParams};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

pub const REQUIRED_COLUMNS: [&str; 5] = ["name", "symbol", "endpt_col", "strat", "mode"];
pub const TABLE_COLUMNS: [&str; 12] = [
    "name",
    "symbol",
    "endpt_col",
    "strat",
    "mode",
    "rol",
    "thres",
    "num_std",
    "short_rol",
    "long_rol",
    "upper_thres",
    "lower_thres",
];

#[derive(Debug, Default, Serialize, Deserialize)]
struct StrategyRow {
    name: String,
    symbol: String,
    endpt_col: String,
    strat: String,
    mode: String,
    #[serde(default)]
    rol: Option<String>,
    #[serde(default)]
    thres: Option<String>,
    #[serde(default)]
    num_std: Option<String>,
    #[serde(default)]
    short_rol: Option<String>,
    #[serde(default)]
    long_rol: Option<String>,
    #[serde(default)]
    upper_thres: Option<String>,
    #[serde(default)]
    lower_thres: Option<String>,
}

fn table_err(reason: String) -> SigtraderError {
    SigtraderError::StrategyTable { reason }
}

fn blank(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_float(instance: &str, column: &str, v: &Option<String>) -> Result<Option<f64>, SigtraderError> {
    match blank(v) {
        None => Ok(None),
        Some(s) => s.parse::<f64>().map(Some).map_err(|_| SigtraderError::StrategyInvalid {
            instance: instance.to_string(),
            reason: format!("{column} '{s}' is not a number"),
        }),
    }
}

/// Windows may be written as `20` or `20.0`.
fn parse_window(instance: &str, column: &str, v: &Option<String>) -> Result<Option<usize>, SigtraderError> {
    match parse_float(instance, column, v)? {
        None => Ok(None),
        Some(f) if f.fract() == 0.0 && f >= 0.0 => Ok(Some(f as usize)),
        Some(f) => Err(SigtraderError::StrategyInvalid {
            instance: instance.to_string(),
            reason: format!("{column} {f} is not a whole number"),
        }),
    }
}

fn format_opt<T: ToString>(v: Option<T>) -> Option<String> {
    v.map(|v| v.to_string())
}

impl StrategyRow {
    fn into_instance(self) -> Result<StrategyInstance, SigtraderError> {
        let id = format!("{}/{}", self.name.trim(), self.symbol.trim());
        for (col, value) in [
            ("name", &self.name),
            ("symbol", &self.symbol),
            ("endpt_col", &self.endpt_col),
            ("strat", &self.strat),
        ] {
            if value.trim().is_empty() {
                return Err(SigtraderError::StrategyInvalid {
                    instance: id,
                    reason: format!("{col} is empty"),
                });
            }
        }
        let mode = Mode::parse(&self.mode).ok_or_else(|| SigtraderError::StrategyInvalid {
            instance: id.clone(),
            reason: format!("unknown mode '{}'", self.mode),
        })?;

        let params = StrategyParams {
            rol: parse_window(&id, "rol", &self.rol)?,
            thres: parse_float(&id, "thres", &self.thres)?,
            num_std: parse_float(&id, "num_std", &self.num_std)?,
            short_rol: parse_window(&id, "short_rol", &self.short_rol)?,
            long_rol: parse_window(&id, "long_rol", &self.long_rol)?,
            upper_thres: parse_float(&id, "upper_thres", &self.upper_thres)?,
            lower_thres: parse_float(&id, "lower_thres", &self.lower_thres)?,
        };

        Ok(StrategyInstance {
            name: self.name.trim().to_string(),
            symbol: self.symbol.trim().to_string(),
            series_column: self.endpt_col.trim().to_string(),
            kind: self.strat.trim().to_string(),
            mode,
            params,
        })
    }

    fn from_instance(inst: &StrategyInstance) -> Self {
        let p = &inst.params;
        StrategyRow {
            name: inst.name.clone(),
            symbol: inst.symbol.clone(),
            endpt_col: inst.series_column.clone(),
            strat: inst.kind.clone(),
            mode: inst.mode.to_string(),
            rol: format_opt(p.rol),
            thres: format_opt(p.thres),
            num_std: format_opt(p.num_std),
            short_rol: format_opt(p.short_rol),
            long_rol: format_opt(p.long_rol),
            upper_thres: format_opt(p.upper_thres),
            lower_thres: format_opt(p.lower_thres),
        }
    }
}

pub fn parse_strategy_table(content: &str) -> Result<Vec<StrategyInstance>, SigtraderError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(content.as_bytes());
    let headers = rdr
        .headers()
        .map_err(|e| table_err(format!("CSV header error: {e}")))?;
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        return Err(table_err(format!("missing columns: {}", missing.join(", "))));
    }

    let mut out = Vec::new();
    for (i, row) in rdr.deserialize::<StrategyRow>().enumerate() {
        let row = row.map_err(|e| table_err(format!("row {}: {e}", i + 1)))?;
        out.push(row.into_instance()?);
    }
    Ok(out)
}

pub fn load_strategy_table(path: &Path) -> Result<Vec<StrategyInstance>, SigtraderError> {
    let content = fs::read_to_string(path)
        .map_err(|e| table_err(format!("failed to read {}: {e}", path.display())))?;
    parse_strategy_table(&content)
}

pub fn write_strategy_table(path: &Path, instances: &[StrategyInstance]) -> Result<(), SigtraderError> {
    let rows: Vec<StrategyRow> = instances.iter().map(StrategyRow::from_instance).collect();
    overwrite_records(path, &rows, &TABLE_COLUMNS)
        .map_err(|e| table_err(format!("failed to write {}: {e}", path.display())))
}

/// Rows of `incoming` whose name is not yet in `existing`, in order.
pub fn new_rows(existing: &[StrategyInstance], incoming: &[StrategyInstance]) -> Vec<StrategyInstance> {
    let mut names: BTreeSet<&str> = existing.iter().map(|s| s.name.as_str()).collect();
    incoming
        .iter()
        .filter(|s| names.insert(s.name.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TABLE: &str = "name,symbol,endpt_col,strat,mode,rol,thres,num_std,short_rol,long_rol,upper_thres,lower_thres\n\
        zs_btc,BTC,close,zscore,long_short,20,1.5,,,,,\n\
        mc_eth,ETH,close,ma_cross,long,,,,5.0,20,,\n\
        mq_btc,BTC,mvrv,macd_quantile,short,30,10,,,,5,\n";

    #[test]
    fn parses_rows_and_params() {
        let rows = parse_strategy_table(TABLE).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].name, "zs_btc");
        assert_eq!(rows[0].params.rol, Some(20));
        assert_eq!(rows[0].params.thres, Some(1.5));
        assert_eq!(rows[0].mode, Mode::LongShort);
        assert_eq!(rows[1].params.short_rol, Some(5));
        assert_eq!(rows[1].params.rol, None);
        assert_eq!(rows[2].series_column, "mvrv");
        assert_eq!(rows[2].params.upper_thres, Some(5.0));
        assert_eq!(rows[2].params.lower_thres, None);
    }

    #[test]
    fn parameter_columns_are_optional() {
        let rows = parse_strategy_table("name,symbol,endpt_col,strat,mode\na,BTC,close,custom,long\n").unwrap();
        assert_eq!(rows[0].params, StrategyParams::default());
    }

    #[test]
    fn missing_required_columns() {
        let err = parse_strategy_table("name,symbol,strat\na,BTC,zscore\n").unwrap_err();
        match err {
            SigtraderError::StrategyTable { reason } => {
                assert!(reason.contains("endpt_col"));
                assert!(reason.contains("mode"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unknown_mode_and_bad_numbers() {
        let bad_mode = "name,symbol,endpt_col,strat,mode\na,BTC,close,zscore,sideways\n";
        assert!(matches!(
            parse_strategy_table(bad_mode),
            Err(SigtraderError::StrategyInvalid { .. })
        ));
        let bad_rol = "name,symbol,endpt_col,strat,mode,rol\na,BTC,close,zscore,long,2.5\n";
        assert!(parse_strategy_table(bad_rol).is_err());
        let bad_thres = "name,symbol,endpt_col,strat,mode,thres\na,BTC,close,zscore,long,high\n";
        assert!(parse_strategy_table(bad_thres).is_err());
    }

    #[test]
    fn write_then_load_keeps_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("strategies.csv");
        let rows = parse_strategy_table(TABLE).unwrap();
        write_strategy_table(&path, &rows).unwrap();
        assert_eq!(load_strategy_table(&path).unwrap(), rows);
    }

    #[test]
    fn new_rows_are_selected_by_name() {
        let existing = parse_strategy_table(TABLE).unwrap();
        let incoming = parse_strategy_table(
            "name,symbol,endpt_col,strat,mode,rol,thres\n\
             zs_btc,BTC,close,zscore,long,10,1\n\
             mo_sol,SOL,close,momentum,long,10,2\n\
             mo_sol,SOL,close,momentum,short,10,2\n",
        )
        .unwrap();
        let added = new_rows(&existing, &incoming);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].name, "mo_sol");
        assert_eq!(added[0].mode, Mode::Long);
    }
}
