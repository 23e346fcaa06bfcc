//! Instrument metadata port trait.

use crate::domain::error::TraderError;
use crate::domain::instrument::InstrumentSpec;

pub trait InstrumentInfo {
    /// Fails with `TraderError::InstrumentNotFound` for unknown symbols.
    fn lookup(&self, symbol: &str) -> Result<InstrumentSpec, TraderError>;
}
