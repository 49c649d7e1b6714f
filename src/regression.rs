//! Declarative regression formulas over a measurement.
//!
//! A formula names its covariates up front. Any missing covariate makes the
//! whole formula evaluate to `None`, so no equation carries its own
//! missing-value checks.

use crate::domain::{ElectricalMeasurement, Reading, Region, Segment};
use crate::outcome::{BodyCompositionResult, Outcome};

/// Where an electrical covariate is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Single(Segment),
    /// Left/right mean of a region.
    Bilateral(Region),
}

impl Location {
    pub fn segments(&self) -> Vec<Segment> {
        match self {
            Location::Single(segment) => vec![*segment],
            Location::Bilateral(region) => Segment::bilateral(*region).to_vec(),
        }
    }
}

/// An input quantity of a regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Covariate {
    WeightKg,
    AgeYears,
    /// 1 for males, 0 otherwise.
    Male,
    /// 1 for females, 0 otherwise.
    Female,
    Bmi,
    Resistance(Location),
    Reactance(Location),
    Impedance(Location),
    PhaseAngle(Location),
    /// `2 * (lt + rt) / (la + ll + ra + rl)` over resistances.
    TrunkAppendicularIndex,
}

const TAI_SEGMENTS: [Segment; 6] = [
    Segment::LEFT_TRUNK,
    Segment::RIGHT_TRUNK,
    Segment::LEFT_ARM,
    Segment::LEFT_LEG,
    Segment::RIGHT_ARM,
    Segment::RIGHT_LEG,
];

impl Covariate {
    /// Segments whose readings this covariate depends on.
    pub fn segments(&self) -> Vec<Segment> {
        match self {
            Covariate::Resistance(location)
            | Covariate::Reactance(location)
            | Covariate::Impedance(location)
            | Covariate::PhaseAngle(location) => location.segments(),
            Covariate::TrunkAppendicularIndex => TAI_SEGMENTS.to_vec(),
            _ => Vec::new(),
        }
    }
}

/// How a covariate enters a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Linear,
    Squared,
    /// `height_cm² / value`
    HeightSquaredOver,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Term {
    pub coefficient: f64,
    pub covariate: Covariate,
    pub transform: Transform,
}

impl Term {
    pub const fn linear(coefficient: f64, covariate: Covariate) -> Self {
        Self {
            coefficient,
            covariate,
            transform: Transform::Linear,
        }
    }

    pub const fn squared(coefficient: f64, covariate: Covariate) -> Self {
        Self {
            coefficient,
            covariate,
            transform: Transform::Squared,
        }
    }

    pub const fn height_squared_over(coefficient: f64, covariate: Covariate) -> Self {
        Self {
            coefficient,
            covariate,
            transform: Transform::HeightSquaredOver,
        }
    }

    fn evaluate(&self, covariates: &Covariates<'_>) -> Option<f64> {
        let value = covariates.value(self.covariate)?;
        let transformed = match self.transform {
            Transform::Linear => value,
            Transform::Squared => value * value,
            Transform::HeightSquaredOver => covariates.height_squared() / value,
        };
        Some(self.coefficient * transformed)
    }
}

/// `intercept + Σ coefficient · transform(covariate)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearEquation {
    pub intercept: f64,
    pub terms: &'static [Term],
}

impl LinearEquation {
    pub fn evaluate(&self, covariates: &Covariates<'_>) -> Option<f64> {
        let mut total = self.intercept;
        for term in self.terms {
            total += term.evaluate(covariates)?;
        }
        Some(total)
    }
}

/// A regression for one outcome.
#[derive(Debug, Clone, Copy)]
pub enum Formula {
    Linear(LinearEquation),
    /// Non-linear form; `inputs` must list every covariate `eval` reads.
    Custom {
        inputs: &'static [Covariate],
        eval: fn(&Covariates<'_>) -> Option<f64>,
    },
}

impl Formula {
    pub fn inputs(&self) -> Vec<Covariate> {
        match self {
            Formula::Linear(equation) => equation.terms.iter().map(|term| term.covariate).collect(),
            Formula::Custom { inputs, .. } => inputs.to_vec(),
        }
    }

    /// Segments whose readings the formula depends on.
    pub fn segments(&self) -> Vec<Segment> {
        let mut segments: Vec<Segment> = self
            .inputs()
            .iter()
            .flat_map(|covariate| covariate.segments())
            .collect();
        segments.sort();
        segments.dedup();
        segments
    }

    /// Evaluates the formula. Missing inputs and non-finite results give `None`.
    pub fn evaluate(&self, covariates: &Covariates<'_>) -> Option<f64> {
        let value = match self {
            Formula::Linear(equation) => equation.evaluate(covariates)?,
            Formula::Custom { inputs, eval } => {
                for input in *inputs {
                    covariates.value(*input)?;
                }
                eval(covariates)?
            }
        };

        if value.is_finite() {
            Some(value)
        } else {
            log::warn!("Regression produced a non-finite value ({}), dropping it", value);
            None
        }
    }
}

/// Covariate lookup over a measurement in the form an equation set expects.
pub struct Covariates<'a> {
    measurement: &'a ElectricalMeasurement,
}

impl<'a> Covariates<'a> {
    pub fn new(measurement: &'a ElectricalMeasurement) -> Self {
        Self { measurement }
    }

    /// Height in centimetres, squared.
    pub fn height_squared(&self) -> f64 {
        (self.measurement.subject().height_cm() as f64).powi(2)
    }

    pub fn reading(&self, location: Location) -> Reading {
        match location {
            Location::Single(segment) => self.measurement.reading(segment),
            Location::Bilateral(region) => {
                let [left, right] = Segment::bilateral(region);
                Reading::bilateral_mean(self.measurement.reading(left), self.measurement.reading(right))
            }
        }
    }

    pub fn trunk_appendicular_index(&self) -> Option<f64> {
        let r = |segment| self.measurement.resistance(segment);
        let trunk = r(Segment::LEFT_TRUNK)? + r(Segment::RIGHT_TRUNK)?;
        let limbs = r(Segment::LEFT_ARM)?
            + r(Segment::LEFT_LEG)?
            + r(Segment::RIGHT_ARM)?
            + r(Segment::RIGHT_LEG)?;
        let index = 2.0 * trunk / limbs;
        index.is_finite().then_some(index)
    }

    pub fn value(&self, covariate: Covariate) -> Option<f64> {
        let subject = self.measurement.subject();
        match covariate {
            Covariate::WeightKg => Some(subject.weight_kg()),
            Covariate::AgeYears => Some(subject.age() as f64),
            Covariate::Male => Some(if subject.sex().is_male() { 1.0 } else { 0.0 }),
            Covariate::Female => Some(if subject.sex().is_male() { 0.0 } else { 1.0 }),
            Covariate::Bmi => Some(subject.bmi()),
            Covariate::Resistance(location) => self.reading(location).resistance,
            Covariate::Reactance(location) => self.reading(location).reactance,
            Covariate::Impedance(location) => self.reading(location).impedance(),
            Covariate::PhaseAngle(location) => self.reading(location).phase_angle_deg(),
            Covariate::TrunkAppendicularIndex => self.trunk_appendicular_index(),
        }
    }
}

/// Evaluates every formula of a table and fills derivable outcomes.
pub fn evaluate_table(
    formulas: &[(Outcome, Formula)],
    measurement: &ElectricalMeasurement,
) -> BodyCompositionResult {
    let covariates = Covariates::new(measurement);
    let mut result = BodyCompositionResult::new();
    for (outcome, formula) in formulas {
        result.set(*outcome, formula.evaluate(&covariates));
    }
    result.derive_secondary(measurement);
    result
}
