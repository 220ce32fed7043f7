//! CSV time-series adapter.
//!
//! Series live at `{data_dir}/series/{name}_{symbol}.csv`; the first column is
//! the timestamp and the header names the value columns. Indicator frames are
//! written to `{data_dir}/strat/{name}_{endpt_col}_{symbol}.csv`.

use crate::domain::error::SigtraderError;
use crate::domain::indicator::IndicatorFrame;
use crate::domain::series::{format_timestamp, parse_timestamp, SeriesPoint};
use crate::domain::strategy::StrategyInstance;
use crate::ports::series_port::SeriesPort;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn series_path(&self, instance: &StrategyInstance) -> PathBuf {
        self.base_path
            .join("series")
            .join(format!("{}_{}.csv", instance.name, instance.symbol))
    }

    pub fn frame_path(&self, instance: &StrategyInstance) -> PathBuf {
        self.base_path.join("strat").join(instance.frame_name())
    }
}

fn format_cell(v: Option<f64>) -> String {
    match v {
        Some(v) if v.is_nan() => String::new(),
        Some(v) => v.to_string(),
        None => String::new(),
    }
}

impl SeriesPort for CsvAdapter {
    fn load_series(&self, instance: &StrategyInstance) -> Result<Vec<SeriesPoint>, SigtraderError> {
        let series_err = |reason: String| SigtraderError::Series {
            instance: instance.key().to_string(),
            reason,
        };

        let path = self.series_path(instance);
        let content = fs::read_to_string(&path)
            .map_err(|e| series_err(format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| series_err(format!("CSV header error: {}", e)))?
            .clone();
        let column = headers
            .iter()
            .position(|h| h.trim() == instance.series_column)
            .filter(|&i| i > 0)
            .ok_or_else(|| series_err(format!("column '{}' not found", instance.series_column)))?;

        let mut points = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| series_err(format!("CSV parse error: {}", e)))?;

            let ts_str = record
                .get(0)
                .ok_or_else(|| series_err("missing timestamp column".into()))?;
            let timestamp = parse_timestamp(ts_str)
                .ok_or_else(|| series_err(format!("invalid timestamp '{}'", ts_str)))?;

            let value = match record.get(column).map(str::trim) {
                Some(raw) if !raw.is_empty() => match raw.parse::<f64>() {
                    Ok(v) if v.is_finite() => v,
                    _ => continue,
                },
                _ => continue,
            };
            points.push(SeriesPoint::new(timestamp, value));
        }

        points.sort_by_key(|p| p.timestamp);
        Ok(points)
    }

    fn store_frame(
        &self,
        instance: &StrategyInstance,
        frame: &IndicatorFrame,
    ) -> Result<(), SigtraderError> {
        let path = self.frame_path(instance);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let mut wtr = csv::Writer::from_path(&path).map_err(|e| SigtraderError::Series {
            instance: instance.key().to_string(),
            reason: format!("failed to open {}: {}", path.display(), e),
        })?;

        let mut header = vec!["timestamp".to_string(), instance.series_column.clone()];
        header.extend(frame.column_names.iter().map(|c| c.to_string()));
        header.push("pos".to_string());

        let write_err = |e: csv::Error| SigtraderError::Series {
            instance: instance.key().to_string(),
            reason: format!("failed to write frame: {}", e),
        };
        wtr.write_record(&header).map_err(write_err)?;
        for row in &frame.rows {
            let mut record = vec![format_timestamp(&row.timestamp), row.value.to_string()];
            record.extend(row.columns.iter().map(|c| format_cell(*c)));
            record.push(row.pos.to_string());
            wtr.write_record(&record).map_err(write_err)?;
        }
        wtr.flush()?;
        Ok(())
    }
}
