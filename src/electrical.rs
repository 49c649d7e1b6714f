//! Impedance and phase angle from resistance/reactance pairs.

use crate::domain::Reading;
use crate::error::DomainError;

/// Impedance magnitude `sqrt(r² + x²)` in ohms.
pub fn impedance(resistance: Option<f64>, reactance: Option<f64>) -> Option<f64> {
    Some(resistance?.hypot(reactance?))
}

/// Phase angle `atan(x / r)` in degrees.
///
/// # Errors
/// Returns `DomainError::ZeroResistance` when `r == 0`, where the angle is
/// undefined.
pub fn phase_angle_deg(resistance: f64, reactance: f64) -> Result<f64, DomainError> {
    if resistance == 0.0 {
        return Err(DomainError::ZeroResistance { reactance });
    }
    Ok((reactance / resistance).atan().to_degrees())
}

/// Mean of two optional values; None if either is missing.
pub fn mean(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some((a? + b?) / 2.0)
}

impl Reading {
    pub fn impedance(&self) -> Option<f64> {
        impedance(self.resistance, self.reactance)
    }

    /// Phase angle in degrees. None if either value is missing; a zero
    /// resistance is logged and also yields None.
    pub fn phase_angle_deg(&self) -> Option<f64> {
        let (r, x) = (self.resistance?, self.reactance?);
        match phase_angle_deg(r, x) {
            Ok(angle) => Some(angle),
            Err(e) => {
                log::warn!("Skipping phase angle: {}", e);
                None
            }
        }
    }

    /// Component-wise mean of a left/right pair of readings.
    pub fn bilateral_mean(left: Reading, right: Reading) -> Reading {
        Reading {
            resistance: mean(left.resistance, right.resistance),
            reactance: mean(left.reactance, right.reactance),
        }
    }
}
