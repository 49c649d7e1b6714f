//! Fitness equations, fitted on as-measured (raw) readings.
//!
//! Whole-body estimates use the left/right mean of the body segment;
//! segmental estimates use the matching limb or the trunk mean.

use crate::domain::{ElectricalForm, ElectricalMeasurement, Region, Segment};
use crate::equation_set::EquationSet;
use crate::error::BiaError;
use crate::outcome::{BodyCompositionResult, Outcome};
use crate::regression::{Covariate, Formula, LinearEquation, Location, Term, evaluate_table};

const BODY: Location = Location::Bilateral(Region::Body);
const TRUNK: Location = Location::Bilateral(Region::Trunk);

const R: Covariate = Covariate::Resistance(BODY);
const X: Covariate = Covariate::Reactance(BODY);
const Z: Covariate = Covariate::Impedance(BODY);
const PA: Covariate = Covariate::PhaseAngle(BODY);
const W: Covariate = Covariate::WeightKg;
const AGE: Covariate = Covariate::AgeYears;
const MALE: Covariate = Covariate::Male;
const BMI: Covariate = Covariate::Bmi;
const TAI: Covariate = Covariate::TrunkAppendicularIndex;

const fn r_of(segment: Segment) -> Covariate {
    Covariate::Resistance(Location::Single(segment))
}

const fn pa_of(segment: Segment) -> Covariate {
    Covariate::PhaseAngle(Location::Single(segment))
}

// c0 + c1·W + c2·A + c3·H²/R + c4·X² + c5·H²/Z + c6·PA² + c7·H²/PA
macro_rules! whole_body {
    ($c0:expr, $c1:expr, $c2:expr, $c3:expr, $c4:expr, $c5:expr, $c6:expr, $c7:expr) => {
        Formula::Linear(LinearEquation {
            intercept: $c0,
            terms: &[
                Term::linear($c1, W),
                Term::linear($c2, AGE),
                Term::height_squared_over($c3, R),
                Term::squared($c4, X),
                Term::height_squared_over($c5, Z),
                Term::squared($c6, PA),
                Term::height_squared_over($c7, PA),
            ],
        })
    };
}

// a + b·H²/R_limb + c·TAI + d·male
macro_rules! limb_lean {
    ($segment:expr, $a:expr, $b:expr, $c:expr, $d:expr) => {
        Formula::Linear(LinearEquation {
            intercept: $a,
            terms: &[
                Term::height_squared_over($b, r_of($segment)),
                Term::linear($c, TAI),
                Term::linear($d, MALE),
            ],
        })
    };
}

// a + b·BMI + c·PA_limb + d·male
macro_rules! limb_fat {
    ($segment:expr, $a:expr, $b:expr, $c:expr, $d:expr) => {
        Formula::Linear(LinearEquation {
            intercept: $a,
            terms: &[
                Term::linear($b, BMI),
                Term::linear($c, pa_of($segment)),
                Term::linear($d, MALE),
            ],
        })
    };
}

pub const TOTAL_BODY_WATER: Formula = whole_body!(
    -17.75953, 0.12309, 0.00734, 0.55780, 0.00208, 0.01627, 0.16738, 0.00152
);

pub const EXTRACELLULAR_WATER: Formula = whole_body!(
    -5.27113, 0.04381, 0.00320, 0.22309, 0.00081, 0.01760, 0.00592, 0.00041
);

pub const FAT_FREE_MASS: Formula = whole_body!(
    -25.08860, 0.17591, 0.01007, 0.73751, 0.00294, 0.02856, 0.24395, 0.00217
);

pub const SKELETAL_MUSCLE_MASS: Formula = whole_body!(
    -18.04706, 0.10446, 0.00543, 0.42698, 0.00170, 0.01179, 0.20090, 0.00139
);

pub const BONE_MINERAL_CONTENT: Formula = Formula::Linear(LinearEquation {
    intercept: -1.72291,
    terms: &[
        Term::linear(0.01673, W),
        Term::height_squared_over(0.02881, R),
        Term::squared(0.00038, X),
        Term::height_squared_over(0.00212, X),
    ],
});

pub const BASAL_METABOLIC_RATE: Formula = Formula::Linear(LinearEquation {
    intercept: -340.40464,
    terms: &[
        Term::linear(3.99739, W),
        Term::linear(0.16695, AGE),
        Term::height_squared_over(14.96410, R),
        Term::height_squared_over(0.35634, Z),
        Term::squared(5.66971, PA),
        Term::height_squared_over(0.05072, PA),
        Term::linear(23.24532, MALE),
        Term::linear(6.67914, X),
    ],
});

pub const TRUNK_FAT_FREE_MASS: Formula = Formula::Linear(LinearEquation {
    intercept: -6.19740,
    terms: &[
        Term::linear(0.20178, W),
        Term::height_squared_over(0.00287, Covariate::Resistance(TRUNK)),
        Term::squared(0.01800, Covariate::Reactance(TRUNK)),
        Term::height_squared_over(0.00003, Covariate::PhaseAngle(TRUNK)),
        Term::linear(2.21723, MALE),
        Term::height_squared_over(0.00157, Covariate::Reactance(TRUNK)),
        Term::squared(0.00208, Covariate::Impedance(TRUNK)),
    ],
});

pub const TRUNK_FAT_MASS: Formula = Formula::Linear(LinearEquation {
    intercept: -26.788,
    terms: &[
        Term::linear(0.978, BMI),
        Term::linear(0.445, Covariate::Resistance(TRUNK)),
        Term::linear(0.045, AGE),
    ],
});

pub const LEFT_ARM_FAT_FREE_MASS: Formula = limb_lean!(Segment::LEFT_ARM, 0.676, 0.026, -11.398, 0.346);
pub const RIGHT_ARM_FAT_FREE_MASS: Formula = limb_lean!(Segment::RIGHT_ARM, 0.676, 0.026, -11.398, 0.346);
pub const LEFT_LEG_FAT_FREE_MASS: Formula = limb_lean!(Segment::LEFT_LEG, 4.756, 0.067, -54.597, 0.901);
pub const RIGHT_LEG_FAT_FREE_MASS: Formula = limb_lean!(Segment::RIGHT_LEG, 3.724, 0.071, -46.197, 0.733);

pub const LEFT_ARM_FAT_MASS: Formula = limb_fat!(Segment::LEFT_ARM, -0.420, 0.107, -0.216, -0.163);
pub const RIGHT_ARM_FAT_MASS: Formula = limb_fat!(Segment::RIGHT_ARM, -0.447, 0.102, -0.188, -0.155);
pub const LEFT_LEG_FAT_MASS: Formula = limb_fat!(Segment::LEFT_LEG, 1.545, 0.250, -0.524, -1.343);
pub const RIGHT_LEG_FAT_MASS: Formula = limb_fat!(Segment::RIGHT_LEG, 2.731, 0.256, -0.7, -1.286);

/// Outcomes computed directly by regression. The rest are derived.
pub const FORMULAS: &[(Outcome, Formula)] = &[
    (Outcome::TotalBodyWaterL, TOTAL_BODY_WATER),
    (Outcome::ExtracellularWaterL, EXTRACELLULAR_WATER),
    (Outcome::FatFreeMassKg, FAT_FREE_MASS),
    (Outcome::SkeletalMuscleMassKg, SKELETAL_MUSCLE_MASS),
    (Outcome::BoneMineralContentKg, BONE_MINERAL_CONTENT),
    (Outcome::BasalMetabolicRateKcal, BASAL_METABOLIC_RATE),
    (Outcome::TrunkFatFreeMassKg, TRUNK_FAT_FREE_MASS),
    (Outcome::TrunkFatMassKg, TRUNK_FAT_MASS),
    (Outcome::LeftArmFatFreeMassKg, LEFT_ARM_FAT_FREE_MASS),
    (Outcome::RightArmFatFreeMassKg, RIGHT_ARM_FAT_FREE_MASS),
    (Outcome::LeftLegFatFreeMassKg, LEFT_LEG_FAT_FREE_MASS),
    (Outcome::RightLegFatFreeMassKg, RIGHT_LEG_FAT_FREE_MASS),
    (Outcome::LeftArmFatMassKg, LEFT_ARM_FAT_MASS),
    (Outcome::RightArmFatMassKg, RIGHT_ARM_FAT_MASS),
    (Outcome::LeftLegFatMassKg, LEFT_LEG_FAT_MASS),
    (Outcome::RightLegFatMassKg, RIGHT_LEG_FAT_MASS),
];

/// General-population equations on raw readings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fitness;

impl EquationSet for Fitness {
    fn name(&self) -> &'static str {
        "fitness"
    }

    fn form(&self) -> ElectricalForm {
        ElectricalForm::Raw
    }

    fn evaluate(&self, measurement: &ElectricalMeasurement) -> Result<BodyCompositionResult, BiaError> {
        let raw = measurement.to_form(self.form())?;
        log::debug!("Evaluating {} equations", self.name());
        Ok(evaluate_table(FORMULAS, &raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::corrections::{CoefficientDataset, CoefficientTable};
    use crate::domain::{Parameter, Reading, Sex, Subject};
    use crate::regression::tests::{assert_null_propagation, full_measurement};

    fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() < tolerance
    }

    fn body_only(form: ElectricalForm) -> ElectricalMeasurement {
        let subject = Subject::new(30.0, Sex::Male, 175.0, 75.0).unwrap();
        ElectricalMeasurement::new(
            subject,
            [
                (Segment::LEFT_BODY, Reading::new(500.0, 50.0)),
                (Segment::RIGHT_BODY, Reading::new(495.0, 48.0)),
            ],
            form,
            Arc::new(CoefficientTable::builtin(CoefficientDataset::Checkup)),
        )
        .unwrap()
    }

    #[test]
    fn test_whole_body_scenario() {
        let result = Fitness.evaluate(&body_only(ElectricalForm::Raw)).unwrap();

        assert!(approx_eq(result.get(Outcome::TotalBodyWaterL).unwrap(), 45.592, 1e-3));
        assert!(approx_eq(
            result.get(Outcome::TotalBodyWaterL).unwrap(),
            45.59174519838821,
            1e-9
        ));
        assert!(approx_eq(
            result.get(Outcome::ExtracellularWaterL).unwrap(),
            17.286072038512895,
            1e-9
        ));
        assert!(approx_eq(result.get(Outcome::FatFreeMassKg).unwrap(), 62.1480131294425, 1e-9));
        assert!(approx_eq(
            result.get(Outcome::SkeletalMuscleMassKg).unwrap(),
            34.96269052677842,
            1e-9
        ));
        assert!(approx_eq(
            result.get(Outcome::BoneMineralContentKg).unwrap(),
            3.542699899497487,
            1e-9
        ));
        assert!(approx_eq(
            result.get(Outcome::BasalMetabolicRateKcal).unwrap(),
            1713.4543474779048,
            1e-6
        ));
        assert!(approx_eq(result.get(Outcome::PhaseAngleDeg).unwrap(), 5.625060090697966, 1e-9));
        assert!(approx_eq(
            result.get(Outcome::FatMassKg).unwrap(),
            75.0 - 62.1480131294425,
            1e-9
        ));

        // No segmental readings
        assert_eq!(result.get(Outcome::TrunkFatMassKg), None);
        assert_eq!(result.get(Outcome::LeftArmFatFreeMassKg), None);
        assert_eq!(result.get(Outcome::LeftLegFatMassKg), None);
    }

    #[test]
    fn test_corrected_input_is_reverted_first() {
        // The same readings declared as corrected are converted to raw before
        // evaluation, so the result differs from the raw declaration.
        let as_raw = Fitness.evaluate(&body_only(ElectricalForm::Raw)).unwrap();
        let as_corrected = Fitness.evaluate(&body_only(ElectricalForm::Corrected)).unwrap();
        assert!(
            (as_raw.get(Outcome::TotalBodyWaterL).unwrap()
                - as_corrected.get(Outcome::TotalBodyWaterL).unwrap())
            .abs()
                > 0.1
        );

        let canonical = body_only(ElectricalForm::Raw).canonical().unwrap();
        let round_trip = Fitness.evaluate(&canonical).unwrap();
        assert!(approx_eq(
            round_trip.get(Outcome::TotalBodyWaterL).unwrap(),
            45.59174519838821,
            1e-9
        ));
    }

    #[test]
    fn test_segmental_outcomes() {
        let result = Fitness.evaluate(&full_measurement()).unwrap();

        assert!(approx_eq(
            result.get(Outcome::TrunkFatFreeMassKg).unwrap(),
            23.467943704344197,
            1e-9
        ));
        assert!(approx_eq(result.get(Outcome::TrunkFatMassKg).unwrap(), 9.860520408163262, 1e-9));
        assert!(approx_eq(
            result.get(Outcome::LeftArmFatFreeMassKg).unwrap(),
            2.6615088749630895,
            1e-9
        ));
        assert!(approx_eq(
            result.get(Outcome::LeftLegFatMassKg).unwrap(),
            2.9610047329467126,
            1e-9
        ));
        assert!(approx_eq(
            result.get(Outcome::TrunkFatMassPct).unwrap(),
            9.860520408163262 / 75.0 * 100.0,
            1e-9
        ));
    }

    #[test]
    fn test_missing_trunk_resistance() {
        let m = full_measurement();
        let cleared = m.with_reading(
            Segment::LEFT_TRUNK,
            m.reading(Segment::LEFT_TRUNK).with(Parameter::Resistance, None),
        );
        let result = Fitness.evaluate(&cleared).unwrap();

        assert_eq!(result.get(Outcome::TrunkFatMassKg), None);
        assert_eq!(result.get(Outcome::TrunkFatFreeMassKg), None);
        assert_eq!(result.get(Outcome::TrunkFatMassPct), None);
        for outcome in [
            Outcome::LeftArmFatFreeMassKg,
            Outcome::RightArmFatFreeMassKg,
            Outcome::LeftLegFatFreeMassKg,
            Outcome::RightLegFatFreeMassKg,
        ] {
            assert_eq!(result.get(outcome), None, "{}", outcome);
        }

        // Whole-body and limb fat estimates do not read the trunk
        assert!(approx_eq(
            result.get(Outcome::TotalBodyWaterL).unwrap(),
            45.59174519838821,
            1e-9
        ));
        assert!(result.get(Outcome::FatMassKg).is_some());
        assert!(result.get(Outcome::BasalMetabolicRateKcal).is_some());
        assert!(result.get(Outcome::LeftLegFatMassKg).is_some());
    }

    #[test]
    fn test_null_propagation_every_formula() {
        assert_null_propagation(FORMULAS, &full_measurement());
    }

    #[test]
    fn test_does_not_touch_input() {
        let m = full_measurement().canonical().unwrap();
        let before = m.reading(Segment::LEFT_ARM);
        Fitness.evaluate(&m).unwrap();
        assert_eq!(m.reading(Segment::LEFT_ARM), before);
        assert_eq!(m.form(), ElectricalForm::Corrected);
    }
}
