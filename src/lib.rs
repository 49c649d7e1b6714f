//! Body composition estimates from segmental bioelectrical impedance.
//!
//! A measurement holds per-segment resistance/reactance readings for one
//! subject. Equation sets ([`Fitness`], [`Standard`], [`MlModel`]) turn it
//! into a [`BodyCompositionResult`], and [`CompositeReport`] bundles the
//! results of several sets with an electrical plausibility check.

pub mod corrections;
pub mod domain;
pub mod electrical;
pub mod equation_set;
pub mod error;
pub mod fitness;
pub mod ml_model;
pub mod outcome;
pub mod regression;
pub mod report;
pub mod standard;

pub use corrections::{CoefficientDataset, CoefficientTable, CorrectionCoefficients};
pub use domain::{
    ElectricalForm, ElectricalMeasurement, MeasurementInput, Parameter, Reading, Region, Segment,
    Session, Sex, Side, Subject,
};
pub use equation_set::EquationSet;
pub use error::{BiaError, CorrectionError, DomainError, InputError, PredictorError};
pub use fitness::Fitness;
pub use ml_model::{MlModel, Predictor};
pub use outcome::{BodyCompositionResult, Outcome};
pub use report::{CompositeReport, build_reports, is_valid};
pub use standard::Standard;
