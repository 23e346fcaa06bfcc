//! Risk-based position sizing.
//!
//! volume = (equity * risk_percent / 100) / (stop_distance_points * value_per_unit),
//! rounded down to the lot step and clamped to the lot bounds. Sizing never
//! fails: a missing or unusable input falls back to the minimum lot and the
//! reason is reported alongside the volume.

use std::fmt;

use tracing::warn;

use crate::domain::instrument::InstrumentSpec;

/// Minimum lot used when instrument metadata is unavailable.
pub const FALLBACK_MIN_LOT: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizingDegraded {
    NonPositiveStopDistance,
    MissingInstrument,
    InvalidInstrument,
    InvalidRiskInputs,
}

impl fmt::Display for SizingDegraded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SizingDegraded::NonPositiveStopDistance => "stop distance is not positive",
            SizingDegraded::MissingInstrument => "instrument metadata unavailable",
            SizingDegraded::InvalidInstrument => "instrument value per unit is not positive",
            SizingDegraded::InvalidRiskInputs => "equity or risk percent is not usable",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sizing {
    pub volume: f64,
    pub degraded: Option<SizingDegraded>,
}

impl Sizing {
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Size a position so a stop-out loses `risk_percent` of `equity`.
///
/// `stop_distance` is measured in instrument points.
pub fn size(
    equity: f64,
    risk_percent: f64,
    stop_distance: f64,
    instrument: Option<&InstrumentSpec>,
) -> Sizing {
    let Some(spec) = instrument else {
        return degraded(FALLBACK_MIN_LOT, SizingDegraded::MissingInstrument);
    };
    if !(stop_distance > 0.0) || !stop_distance.is_finite() {
        return degraded(spec.min_lot, SizingDegraded::NonPositiveStopDistance);
    }
    if !(spec.value_per_unit > 0.0) || !spec.value_per_unit.is_finite() {
        return degraded(spec.min_lot, SizingDegraded::InvalidInstrument);
    }
    if !equity.is_finite() || !risk_percent.is_finite() || equity <= 0.0 || risk_percent <= 0.0 {
        return degraded(spec.min_lot, SizingDegraded::InvalidRiskInputs);
    }

    let risk_amount = equity * risk_percent / 100.0;
    let raw = risk_amount / (stop_distance * spec.value_per_unit);
    Sizing {
        volume: spec.normalize_volume(raw),
        degraded: None,
    }
}

fn degraded(volume: f64, reason: SizingDegraded) -> Sizing {
    warn!(volume, %reason, "position sizing degraded, using minimum lot");
    Sizing {
        volume,
        degraded: Some(reason),
    }
}
