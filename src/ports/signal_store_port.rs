//! Signal history persistence port trait.

use crate::domain::error::SigtraderError;
use crate::domain::signal::SignalPoint;
use crate::domain::transition::SignalTransition;

pub trait SignalStorePort {
    /// Last emitted signal per instance. An absent store is `Ok(vec![])`.
    fn load_previous(&self) -> Result<Vec<SignalPoint>, SigtraderError>;

    /// Replaces the previous-signal table.
    fn save_previous(&self, points: &[SignalPoint]) -> Result<(), SigtraderError>;

    fn append_signals(&self, points: &[SignalPoint]) -> Result<(), SigtraderError>;

    fn append_transitions(&self, transitions: &[SignalTransition]) -> Result<(), SigtraderError>;
}
