//! Common interface of the body composition estimators.

use crate::domain::{ElectricalForm, ElectricalMeasurement};
use crate::error::BiaError;
use crate::outcome::BodyCompositionResult;

/// A family of estimators producing a `BodyCompositionResult` from one
/// measurement.
///
/// Implementations convert the measurement to the form they expect with
/// `ElectricalMeasurement::to_form`, which returns a new value, so several
/// variants can be evaluated from the same measurement in any order.
pub trait EquationSet: Send + Sync {
    /// Key used for this variant in reports.
    fn name(&self) -> &'static str;

    /// Form of the electrical values the regressions were fitted on.
    fn form(&self) -> ElectricalForm;

    fn evaluate(&self, measurement: &ElectricalMeasurement) -> Result<BodyCompositionResult, BiaError>;
}
