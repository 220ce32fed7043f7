//! Time-series access port trait.

use crate::domain::error::SigtraderError;
use crate::domain::indicator::IndicatorFrame;
use crate::domain::series::SeriesPoint;
use crate::domain::strategy::StrategyInstance;

pub trait SeriesPort {
    /// Loads the instance's value column, sorted by timestamp, with empty
    /// and non-numeric values dropped.
    fn load_series(&self, instance: &StrategyInstance) -> Result<Vec<SeriesPoint>, SigtraderError>;

    /// Persists the recomputed indicator frame, replacing the previous one.
    fn store_frame(
        &self,
        instance: &StrategyInstance,
        frame: &IndicatorFrame,
    ) -> Result<(), SigtraderError>;
}
