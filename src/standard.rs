//! Literature reference equations, fitted on orthostatically corrected
//! readings of the right body segment.

use crate::domain::{ElectricalForm, ElectricalMeasurement, Region, Segment};
use crate::equation_set::EquationSet;
use crate::error::BiaError;
use crate::fitness;
use crate::outcome::{BodyCompositionResult, Outcome};
use crate::regression::{Covariate, Covariates, Formula, LinearEquation, Location, Term, evaluate_table};

const RIGHT_BODY: Location = Location::Single(Segment::RIGHT_BODY);

const R: Covariate = Covariate::Resistance(RIGHT_BODY);
const X: Covariate = Covariate::Reactance(RIGHT_BODY);
const W: Covariate = Covariate::WeightKg;
const AGE: Covariate = Covariate::AgeYears;
const MALE: Covariate = Covariate::Male;
const FEMALE: Covariate = Covariate::Female;
const TAI: Covariate = Covariate::TrunkAppendicularIndex;

/// Matias CN et al. Estimation of total body water and extracellular water
/// with bioimpedance in athletes. Clin Nutr. 2016;35:468-74.
/// doi:10.1016/j.clnu.2015.03.013
pub const TOTAL_BODY_WATER: Formula = Formula::Linear(LinearEquation {
    intercept: 0.286,
    terms: &[
        Term::height_squared_over(0.195, R),
        Term::linear(0.385, W),
        Term::linear(5.086, MALE),
    ],
});

/// Sergi G et al. Accuracy of bioelectrical impedance analysis in estimation
/// of extracellular space in healthy subjects and in fluid retention states.
/// Ann Nutr Metab 1994;38(3):158-165. doi:10.1159/000177806
pub const EXTRACELLULAR_WATER: Formula = Formula::Linear(LinearEquation {
    intercept: -3.32,
    terms: &[
        Term::height_squared_over(0.2, R),
        Term::height_squared_over(0.005, X),
        Term::linear(1.86, FEMALE),
        Term::linear(0.08, W),
    ],
});

/// Matias CN et al. Fat-free mass bioelectrical impedance analysis
/// predictive equation for athletes using a 4-compartment model.
/// Int J Sports Med. 2021;42:27-32. doi:10.1055/a-1179-6236
pub const FAT_FREE_MASS: Formula = Formula::Linear(LinearEquation {
    intercept: -2.261,
    terms: &[
        Term::height_squared_over(0.327, R),
        Term::linear(0.525, W),
        Term::linear(5.462, MALE),
    ],
});

fn bone_mineral_content(c: &Covariates<'_>) -> Option<f64> {
    let resistance = c.value(R)?;
    let height = c.height_squared().sqrt();
    let exponent = -0.47127 * resistance.ln() + 2.65176 * height.ln() - 9.62779;
    Some(0.35966 + 0.89328 * exponent.exp() - 0.12978 * c.value(FEMALE)?)
}

/// Stone TM et al. Comparison of bioelectrical impedance analysis and
/// dual-energy X-ray absorptiometry for estimating bone mineral content.
/// Int J Sport Nutr Exerc Metab 28(5):542-546. doi:10.1123/ijsnem.2017-0185
///
/// ```text
/// BMC = 0.35966 + 0.89328 × exp(-0.47127 × ln R + 2.65176 × ln H - 9.62779) - 0.12978 × female
/// ```
pub const BONE_MINERAL_CONTENT: Formula = Formula::Custom {
    inputs: &[R, FEMALE],
    eval: bone_mineral_content,
};

/// Janssen I et al. Estimation of skeletal muscle mass by bioelectrical
/// impedance analysis. J Appl Physiol 2000;89(2):465-471.
/// doi:10.1152/jappl.2000.89.2.465
pub const SKELETAL_MUSCLE_MASS: Formula = Formula::Linear(LinearEquation {
    intercept: 5.102,
    terms: &[
        Term::height_squared_over(0.401, R),
        Term::linear(3.825, MALE),
        Term::linear(-0.071, AGE),
    ],
});

fn basal_metabolic_rate(c: &Covariates<'_>) -> Option<f64> {
    let fat_free = FAT_FREE_MASS.evaluate(c)?;
    let fat = c.value(W)? - fat_free;
    Some(
        238.85
            * (0.05192 * fat_free + 0.04036 * fat + 0.869 * c.value(MALE)? - 0.01181 * c.value(AGE)?
                + 2.992),
    )
}

/// Müller MJ et al. World Health Organization equations have shortcomings
/// for predicting resting energy expenditure in persons from a modern,
/// affluent population. Am J Clin Nutr. 2004;80(5):1379-90.
/// doi:10.1093/ajcn/80.5.1379
///
/// ```text
/// BMR = 238.85 × (0.05192 × FFM + 0.04036 × FM + 0.869 × male - 0.01181 × age + 2.992)
/// ```
///
/// FFM is the Matias 2021 estimate and FM = weight - FFM.
pub const BASAL_METABOLIC_RATE: Formula = Formula::Custom {
    inputs: &[R, W, MALE, AGE],
    eval: basal_metabolic_rate,
};

/// Sardinha LB et al. Development and validation of bioelectrical impedance
/// prediction equations estimating regional lean soft tissue mass in
/// middle-aged adults. Eur J Clin Nutr 77, 202-211 (2023).
/// doi:10.1038/s41430-022-01224-0
pub const TRUNK_FAT_FREE_MASS: Formula = Formula::Linear(LinearEquation {
    intercept: -10.039,
    terms: &[
        Term::height_squared_over(0.015, Covariate::Resistance(Location::Bilateral(Region::Trunk))),
        Term::linear(160.945, TAI),
    ],
});

/// Sardinha LB et al. 2023, right arm.
pub const RIGHT_ARM_FAT_FREE_MASS: Formula = Formula::Linear(LinearEquation {
    intercept: 1.034,
    terms: &[
        Term::height_squared_over(0.024, Covariate::Resistance(Location::Single(Segment::RIGHT_ARM))),
        Term::linear(-12.272, TAI),
        Term::linear(0.388, MALE),
    ],
});

/// Outcomes computed directly by regression. Left arm and leg lean mass
/// (Sardinha 2023), limb and trunk fat mass (Silva 2024, unpublished) share
/// their equations with the fitness set.
pub const FORMULAS: &[(Outcome, Formula)] = &[
    (Outcome::TotalBodyWaterL, TOTAL_BODY_WATER),
    (Outcome::ExtracellularWaterL, EXTRACELLULAR_WATER),
    (Outcome::FatFreeMassKg, FAT_FREE_MASS),
    (Outcome::BoneMineralContentKg, BONE_MINERAL_CONTENT),
    (Outcome::SkeletalMuscleMassKg, SKELETAL_MUSCLE_MASS),
    (Outcome::BasalMetabolicRateKcal, BASAL_METABOLIC_RATE),
    (Outcome::TrunkFatFreeMassKg, TRUNK_FAT_FREE_MASS),
    (Outcome::TrunkFatMassKg, fitness::TRUNK_FAT_MASS),
    (Outcome::LeftArmFatFreeMassKg, fitness::LEFT_ARM_FAT_FREE_MASS),
    (Outcome::RightArmFatFreeMassKg, RIGHT_ARM_FAT_FREE_MASS),
    (Outcome::LeftLegFatFreeMassKg, fitness::LEFT_LEG_FAT_FREE_MASS),
    (Outcome::RightLegFatFreeMassKg, fitness::RIGHT_LEG_FAT_FREE_MASS),
    (Outcome::LeftArmFatMassKg, fitness::LEFT_ARM_FAT_MASS),
    (Outcome::RightArmFatMassKg, fitness::RIGHT_ARM_FAT_MASS),
    (Outcome::LeftLegFatMassKg, fitness::LEFT_LEG_FAT_MASS),
    (Outcome::RightLegFatMassKg, fitness::RIGHT_LEG_FAT_MASS),
];

/// Published reference equations on corrected readings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Standard;

impl EquationSet for Standard {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn form(&self) -> ElectricalForm {
        ElectricalForm::Corrected
    }

    fn evaluate(&self, measurement: &ElectricalMeasurement) -> Result<BodyCompositionResult, BiaError> {
        let corrected = measurement.to_form(self.form())?;
        log::debug!("Evaluating {} equations", self.name());
        Ok(evaluate_table(FORMULAS, &corrected))
    }
}
