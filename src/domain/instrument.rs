//! Instrument metadata used for sizing and price conversion.

/// Contract metadata for one tradable symbol.
///
/// `value_per_unit` is the account-currency value of a one-`point` move for
/// one lot.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentSpec {
    pub symbol: String,
    pub min_lot: f64,
    pub max_lot: f64,
    pub lot_step: f64,
    pub value_per_unit: f64,
    pub point: f64,
}

const STEP_EPSILON: f64 = 1e-9;

impl InstrumentSpec {
    /// Round `volume` down to a multiple of `lot_step`, then clamp to the
    /// whole steps inside `[min_lot, max_lot]`.
    pub fn normalize_volume(&self, volume: f64) -> f64 {
        if self.lot_step <= 0.0 {
            return volume.max(self.min_lot).min(self.max_lot);
        }
        let min_steps = (self.min_lot / self.lot_step - STEP_EPSILON).ceil();
        let max_steps = (self.max_lot / self.lot_step + STEP_EPSILON).floor().max(min_steps);
        let steps = (volume / self.lot_step + STEP_EPSILON)
            .floor()
            .max(min_steps)
            .min(max_steps);
        round_to(steps * self.lot_step, 8)
    }

    /// Price distance expressed in points.
    pub fn to_points(&self, price_distance: f64) -> f64 {
        price_distance / self.point
    }

    /// True when `volume` is a whole number of lot steps inside the lot bounds.
    pub fn is_valid_volume(&self, volume: f64) -> bool {
        if volume < self.min_lot - STEP_EPSILON || volume > self.max_lot + STEP_EPSILON {
            return false;
        }
        self.is_step_multiple(volume)
    }

    pub fn is_step_multiple(&self, volume: f64) -> bool {
        if self.lot_step <= 0.0 {
            return true;
        }
        let steps = volume / self.lot_step;
        (steps - steps.round()).abs() < 1e-6
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
pub(crate) fn forex_spec(symbol: &str) -> InstrumentSpec {
    InstrumentSpec {
        symbol: symbol.to_string(),
        min_lot: 0.01,
        max_lot: 100.0,
        lot_step: 0.01,
        value_per_unit: 1.0,
        point: 0.01,
    }
}
