//! Named body composition outcomes and the per-variant result map.

use std::collections::BTreeMap;
use std::fmt;

use crate::domain::{ElectricalForm, ElectricalMeasurement, Reading, Region, Segment, Subject};

/// A body composition quantity reported by an equation set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Outcome {
    Bmi,
    TargetWeightKg,
    PhaseAngleDeg,
    CorrectedPhaseAngleDeg,

    TotalBodyWaterL,
    TotalBodyWaterPct,
    ExtracellularWaterL,
    ExtracellularWaterPct,
    IntracellularWaterL,
    IntracellularWaterPct,
    EcwIcwRatio,

    FatFreeMassKg,
    FatFreeMassPct,
    FatFreeMassIndex,
    FatMassKg,
    FatMassPct,
    FatMassIndex,
    BoneMineralContentKg,
    BoneMineralContentPct,
    SoftLeanMassKg,
    SoftLeanMassPct,
    SkeletalMuscleMassKg,
    SkeletalMuscleMassPct,
    SkeletalMuscleMassIndex,
    OtherTissuesMassKg,
    OtherTissuesMassPct,

    BasalMetabolicRateKcal,
    ProteinMassKg,
    MineralMassKg,

    LeftArmFatMassKg,
    LeftArmFatMassPct,
    LeftArmFatFreeMassKg,
    LeftArmFatFreeMassPct,
    RightArmFatMassKg,
    RightArmFatMassPct,
    RightArmFatFreeMassKg,
    RightArmFatFreeMassPct,
    LeftLegFatMassKg,
    LeftLegFatMassPct,
    LeftLegFatFreeMassKg,
    LeftLegFatFreeMassPct,
    RightLegFatMassKg,
    RightLegFatMassPct,
    RightLegFatFreeMassKg,
    RightLegFatFreeMassPct,
    TrunkFatMassKg,
    TrunkFatMassPct,
    TrunkFatFreeMassKg,
    TrunkFatFreeMassPct,
}

use Outcome::*;

impl Outcome {
    pub const ALL: [Outcome; 49] = [
        Bmi,
        TargetWeightKg,
        PhaseAngleDeg,
        CorrectedPhaseAngleDeg,
        TotalBodyWaterL,
        TotalBodyWaterPct,
        ExtracellularWaterL,
        ExtracellularWaterPct,
        IntracellularWaterL,
        IntracellularWaterPct,
        EcwIcwRatio,
        FatFreeMassKg,
        FatFreeMassPct,
        FatFreeMassIndex,
        FatMassKg,
        FatMassPct,
        FatMassIndex,
        BoneMineralContentKg,
        BoneMineralContentPct,
        SoftLeanMassKg,
        SoftLeanMassPct,
        SkeletalMuscleMassKg,
        SkeletalMuscleMassPct,
        SkeletalMuscleMassIndex,
        OtherTissuesMassKg,
        OtherTissuesMassPct,
        BasalMetabolicRateKcal,
        ProteinMassKg,
        MineralMassKg,
        LeftArmFatMassKg,
        LeftArmFatMassPct,
        LeftArmFatFreeMassKg,
        LeftArmFatFreeMassPct,
        RightArmFatMassKg,
        RightArmFatMassPct,
        RightArmFatFreeMassKg,
        RightArmFatFreeMassPct,
        LeftLegFatMassKg,
        LeftLegFatMassPct,
        LeftLegFatFreeMassKg,
        LeftLegFatFreeMassPct,
        RightLegFatMassKg,
        RightLegFatMassPct,
        RightLegFatFreeMassKg,
        RightLegFatFreeMassPct,
        TrunkFatMassKg,
        TrunkFatMassPct,
        TrunkFatFreeMassKg,
        TrunkFatFreeMassPct,
    ];

    /// Stable snake_case key used in exports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Bmi => "bmi",
            TargetWeightKg => "target_weight_kg",
            PhaseAngleDeg => "phase_angle_deg",
            CorrectedPhaseAngleDeg => "corrected_phase_angle_deg",
            TotalBodyWaterL => "total_body_water_l",
            TotalBodyWaterPct => "total_body_water_pct",
            ExtracellularWaterL => "extracellular_water_l",
            ExtracellularWaterPct => "extracellular_water_pct",
            IntracellularWaterL => "intracellular_water_l",
            IntracellularWaterPct => "intracellular_water_pct",
            EcwIcwRatio => "ecw_icw_ratio",
            FatFreeMassKg => "fat_free_mass_kg",
            FatFreeMassPct => "fat_free_mass_pct",
            FatFreeMassIndex => "fat_free_mass_index",
            FatMassKg => "fat_mass_kg",
            FatMassPct => "fat_mass_pct",
            FatMassIndex => "fat_mass_index",
            BoneMineralContentKg => "bone_mineral_content_kg",
            BoneMineralContentPct => "bone_mineral_content_pct",
            SoftLeanMassKg => "soft_lean_mass_kg",
            SoftLeanMassPct => "soft_lean_mass_pct",
            SkeletalMuscleMassKg => "skeletal_muscle_mass_kg",
            SkeletalMuscleMassPct => "skeletal_muscle_mass_pct",
            SkeletalMuscleMassIndex => "skeletal_muscle_mass_index",
            OtherTissuesMassKg => "other_tissues_mass_kg",
            OtherTissuesMassPct => "other_tissues_mass_pct",
            BasalMetabolicRateKcal => "basal_metabolic_rate_kcal",
            ProteinMassKg => "protein_mass_kg",
            MineralMassKg => "mineral_mass_kg",
            LeftArmFatMassKg => "left_arm_fat_mass_kg",
            LeftArmFatMassPct => "left_arm_fat_mass_pct",
            LeftArmFatFreeMassKg => "left_arm_fat_free_mass_kg",
            LeftArmFatFreeMassPct => "left_arm_fat_free_mass_pct",
            RightArmFatMassKg => "right_arm_fat_mass_kg",
            RightArmFatMassPct => "right_arm_fat_mass_pct",
            RightArmFatFreeMassKg => "right_arm_fat_free_mass_kg",
            RightArmFatFreeMassPct => "right_arm_fat_free_mass_pct",
            LeftLegFatMassKg => "left_leg_fat_mass_kg",
            LeftLegFatMassPct => "left_leg_fat_mass_pct",
            LeftLegFatFreeMassKg => "left_leg_fat_free_mass_kg",
            LeftLegFatFreeMassPct => "left_leg_fat_free_mass_pct",
            RightLegFatMassKg => "right_leg_fat_mass_kg",
            RightLegFatMassPct => "right_leg_fat_mass_pct",
            RightLegFatFreeMassKg => "right_leg_fat_free_mass_kg",
            RightLegFatFreeMassPct => "right_leg_fat_free_mass_pct",
            TrunkFatMassKg => "trunk_fat_mass_kg",
            TrunkFatMassPct => "trunk_fat_mass_pct",
            TrunkFatFreeMassKg => "trunk_fat_free_mass_kg",
            TrunkFatFreeMassPct => "trunk_fat_free_mass_pct",
        }
    }

    /// The percentage outcome that accompanies an absolute one in paired
    /// rendering, e.g. fat mass with fat mass %.
    pub fn percentage(&self) -> Option<Outcome> {
        let pct = match self {
            TotalBodyWaterL => TotalBodyWaterPct,
            ExtracellularWaterL => ExtracellularWaterPct,
            IntracellularWaterL => IntracellularWaterPct,
            FatFreeMassKg => FatFreeMassPct,
            FatMassKg => FatMassPct,
            BoneMineralContentKg => BoneMineralContentPct,
            SoftLeanMassKg => SoftLeanMassPct,
            SkeletalMuscleMassKg => SkeletalMuscleMassPct,
            OtherTissuesMassKg => OtherTissuesMassPct,
            LeftArmFatMassKg => LeftArmFatMassPct,
            LeftArmFatFreeMassKg => LeftArmFatFreeMassPct,
            RightArmFatMassKg => RightArmFatMassPct,
            RightArmFatFreeMassKg => RightArmFatFreeMassPct,
            LeftLegFatMassKg => LeftLegFatMassPct,
            LeftLegFatFreeMassKg => LeftLegFatFreeMassPct,
            RightLegFatMassKg => RightLegFatMassPct,
            RightLegFatFreeMassKg => RightLegFatFreeMassPct,
            TrunkFatMassKg => TrunkFatMassPct,
            TrunkFatFreeMassKg => TrunkFatFreeMassPct,
            _ => return None,
        };
        Some(pct)
    }

    /// True for outcomes that only appear as the second half of a pair.
    pub fn is_percentage_of_pair(&self) -> bool {
        Outcome::ALL
            .iter()
            .any(|outcome| outcome.percentage() == Some(*self))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcomes of one equation set. Every outcome is present as a key; a
/// `None` value means it could not be computed from the available inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyCompositionResult {
    values: BTreeMap<Outcome, Option<f64>>,
}

impl Default for BodyCompositionResult {
    fn default() -> Self {
        Self::new()
    }
}

fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let value = numerator? / denominator?;
    value.is_finite().then_some(value)
}

fn percent(part: Option<f64>, whole: Option<f64>) -> Option<f64> {
    ratio(part, whole).map(|r| r * 100.0)
}

fn difference(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(a? - b?)
}

fn body_phase_angle(measurement: &ElectricalMeasurement, form: ElectricalForm) -> Option<f64> {
    let converted = match measurement.to_form(form) {
        Ok(converted) => converted,
        Err(e) => {
            log::warn!("Skipping phase angle: {}", e);
            return None;
        }
    };
    let [left, right] = Segment::bilateral(Region::Body);
    Reading::bilateral_mean(converted.reading(left), converted.reading(right)).phase_angle_deg()
}

impl BodyCompositionResult {
    /// A result with every outcome missing.
    pub fn new() -> Self {
        Self {
            values: Outcome::ALL.iter().map(|outcome| (*outcome, None)).collect(),
        }
    }

    pub fn get(&self, outcome: Outcome) -> Option<f64> {
        self.values.get(&outcome).copied().flatten()
    }

    pub fn set(&mut self, outcome: Outcome, value: Option<f64>) {
        self.values.insert(outcome, value);
    }

    /// Sets the value only if the outcome is still missing.
    pub fn fill(&mut self, outcome: Outcome, value: Option<f64>) {
        if self.get(outcome).is_none() {
            self.set(outcome, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Outcome, Option<f64>)> + '_ {
        self.values.iter().map(|(outcome, value)| (*outcome, *value))
    }

    /// Value and percentage of an outcome that has a percentage counterpart.
    pub fn paired(&self, outcome: Outcome) -> Option<(Option<f64>, Option<f64>)> {
        let pct = outcome.percentage()?;
        Some((self.get(outcome), self.get(pct)))
    }

    /// Export map keyed by outcome name.
    pub fn to_map(&self) -> BTreeMap<&'static str, Option<f64>> {
        self.iter()
            .map(|(outcome, value)| (outcome.as_str(), value))
            .collect()
    }

    /// Fills missing outcomes that follow arithmetically from computed ones
    /// and from the subject. Values already set are never overwritten.
    pub fn derive_secondary(&mut self, measurement: &ElectricalMeasurement) {
        let subject: &Subject = measurement.subject();
        let weight = Some(subject.weight_kg());
        let height_sq = Some(subject.height_m().powi(2));

        self.fill(Bmi, Some(subject.bmi()));
        self.fill(TargetWeightKg, Some(subject.target_weight_kg()));
        self.fill(PhaseAngleDeg, body_phase_angle(measurement, ElectricalForm::Raw));
        self.fill(
            CorrectedPhaseAngleDeg,
            body_phase_angle(measurement, ElectricalForm::Corrected),
        );

        // Masses first, then the quantities expressed relative to them
        self.fill(
            IntracellularWaterL,
            difference(self.get(TotalBodyWaterL), self.get(ExtracellularWaterL)),
        );
        self.fill(FatMassKg, difference(weight, self.get(FatFreeMassKg)));
        self.fill(
            SoftLeanMassKg,
            difference(self.get(FatFreeMassKg), self.get(BoneMineralContentKg)),
        );
        self.fill(
            OtherTissuesMassKg,
            difference(self.get(SoftLeanMassKg), self.get(SkeletalMuscleMassKg)),
        );

        self.fill(TotalBodyWaterPct, percent(self.get(TotalBodyWaterL), weight));
        self.fill(
            ExtracellularWaterPct,
            percent(self.get(ExtracellularWaterL), self.get(TotalBodyWaterL)),
        );
        self.fill(
            IntracellularWaterPct,
            self.get(ExtracellularWaterPct).map(|ecw| 100.0 - ecw),
        );
        self.fill(
            EcwIcwRatio,
            ratio(self.get(ExtracellularWaterL), self.get(IntracellularWaterL)),
        );

        self.fill(FatFreeMassPct, percent(self.get(FatFreeMassKg), weight));
        self.fill(FatMassPct, self.get(FatFreeMassPct).map(|ffm| 100.0 - ffm));
        self.fill(FatFreeMassIndex, ratio(self.get(FatFreeMassKg), height_sq));
        self.fill(FatMassIndex, ratio(self.get(FatMassKg), height_sq));
        self.fill(
            SkeletalMuscleMassIndex,
            ratio(self.get(SkeletalMuscleMassKg), height_sq),
        );

        // Remaining masses are relative to body weight, in either direction
        for outcome in Outcome::ALL {
            if let Some(pct) = outcome.percentage()
                && !matches!(
                    outcome,
                    TotalBodyWaterL | ExtracellularWaterL | IntracellularWaterL | FatMassKg | FatFreeMassKg
                )
            {
                self.fill(outcome, self.get(pct).zip(weight).map(|(p, w)| p * w / 100.0));
                self.fill(pct, percent(self.get(outcome), weight));
            }
        }
    }
}
