//! Equation set backed by an external inference model.
//!
//! The model runtime is not part of this crate. It is reached through the
//! `Predictor` port, which maps named input features to named outputs.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::{ElectricalForm, ElectricalMeasurement, Parameter, Segment};
use crate::equation_set::EquationSet;
use crate::error::{BiaError, PredictorError};
use crate::outcome::{BodyCompositionResult, Outcome};

/// Inference collaborator. Implementations are shared read-only across
/// threads, so a loaded model session can serve many reports.
pub trait Predictor: Send + Sync {
    /// Runs a single-row inference.
    ///
    /// # Errors
    /// `PredictorError::Inference` if the runtime fails.
    fn predict(&self, inputs: &BTreeMap<String, f64>) -> Result<BTreeMap<String, f64>, PredictorError>;
}

impl<F> Predictor for F
where
    F: Fn(&BTreeMap<String, f64>) -> Result<BTreeMap<String, f64>, PredictorError> + Send + Sync,
{
    fn predict(&self, inputs: &BTreeMap<String, f64>) -> Result<BTreeMap<String, f64>, PredictorError> {
        self(inputs)
    }
}

/// Electrode segments fed to the model, in feature order. No trunk.
const MODEL_SEGMENTS: [Segment; 6] = [
    Segment::LEFT_ARM,
    Segment::LEFT_LEG,
    Segment::LEFT_BODY,
    Segment::RIGHT_ARM,
    Segment::RIGHT_LEG,
    Segment::RIGHT_BODY,
];

/// Feature names in the order the model was trained with.
pub fn input_features() -> Vec<String> {
    let mut names = vec!["height".to_string(), "weight".to_string(), "age".to_string()];
    for segment in MODEL_SEGMENTS {
        for parameter in [Parameter::Resistance, Parameter::Reactance] {
            names.push(format!("{}_{}", segment, parameter));
        }
    }
    names
}

/// Output label the model uses for an outcome, as named at training time.
/// Outcomes without a label (BMI, other tissues, left arm fat % and left arm
/// lean mass) are derived locally from the others.
pub fn model_key(outcome: Outcome) -> Option<&'static str> {
    use Outcome::*;
    let key = match outcome {
        TargetWeightKg => "target_weight",
        PhaseAngleDeg => "total_body_phaseangle",
        CorrectedPhaseAngleDeg => "total_body_phaseanglecorrected",
        TotalBodyWaterL => "total_body_water",
        TotalBodyWaterPct => "total_body_waterperc",
        ExtracellularWaterL => "total_body_extracellularwater",
        ExtracellularWaterPct => "total_body_extracellularwaterperc",
        IntracellularWaterL => "total_body_intracellularwater",
        IntracellularWaterPct => "total_body_intracellularwaterperc",
        EcwIcwRatio => "ecw_on_icw",
        FatFreeMassKg => "total_body_fatfreemass",
        FatFreeMassPct => "total_body_fatfreemassperc",
        FatFreeMassIndex => "total_body_fatfreemassindex",
        FatMassKg => "total_body_fatmass",
        FatMassPct => "total_body_fatmassperc",
        FatMassIndex => "total_body_fatmassindex",
        BoneMineralContentKg => "total_body_bonemineralcontent",
        BoneMineralContentPct => "total_body_bonemineralcontentperc",
        SoftLeanMassKg => "total_body_softleanmass",
        SoftLeanMassPct => "total_body_softleanmassperc",
        SkeletalMuscleMassKg => "total_body_skeletalmusclemass",
        SkeletalMuscleMassPct => "total_body_skeletalmusclemassperc",
        SkeletalMuscleMassIndex => "total_body_skeletalmusclemassindex",
        BasalMetabolicRateKcal => "total_body_basalmetabolicrate",
        ProteinMassKg => "total_body_proteins",
        MineralMassKg => "total_body_minerals",
        LeftArmFatMassKg => "left_arm_fatmass",
        LeftArmFatFreeMassPct => "left_arm_fatfreemassperc",
        LeftLegFatMassKg => "left_leg_fatmass",
        LeftLegFatMassPct => "left_leg_fatmassperc",
        LeftLegFatFreeMassKg => "left_leg_fatfreemass",
        LeftLegFatFreeMassPct => "left_leg_fatfreemassperc",
        RightArmFatMassKg => "right_arm_fatmass",
        RightArmFatMassPct => "right_arm_fatmassperc",
        RightArmFatFreeMassKg => "right_arm_fatfreemass",
        RightArmFatFreeMassPct => "right_arm_fatfreemassperc",
        RightLegFatMassKg => "right_leg_fatmass",
        RightLegFatMassPct => "right_leg_fatmassperc",
        RightLegFatFreeMassKg => "right_leg_fatfreemass",
        RightLegFatFreeMassPct => "right_leg_fatfreemassperc",
        TrunkFatMassKg => "total_trunk_fatmass",
        TrunkFatMassPct => "total_trunk_fatmassperc",
        TrunkFatFreeMassKg => "total_trunk_fatfreemass",
        TrunkFatFreeMassPct => "total_trunk_fatfreemassperc",
        Bmi | OtherTissuesMassKg | OtherTissuesMassPct | LeftArmFatMassPct | LeftArmFatFreeMassKg => {
            return None;
        }
    };
    Some(key)
}

/// Outcomes the model must return, with their output labels.
pub fn model_outputs() -> impl Iterator<Item = (Outcome, &'static str)> {
    Outcome::ALL
        .into_iter()
        .filter_map(|outcome| model_key(outcome).map(|key| (outcome, key)))
}

/// Checks that `inputs` holds exactly the model features, all finite.
///
/// # Errors
/// `PredictorError::TypeMismatch` naming the offending key.
pub fn check_inputs(inputs: &BTreeMap<String, f64>) -> Result<(), PredictorError> {
    let expected = input_features();
    for name in &expected {
        match inputs.get(name) {
            None => {
                return Err(PredictorError::TypeMismatch(format!("missing input feature '{}'", name)));
            }
            Some(value) if !value.is_finite() => {
                return Err(PredictorError::TypeMismatch(format!(
                    "input feature '{}' is not finite: {}",
                    name, value
                )));
            }
            Some(_) => {}
        }
    }
    if let Some(extra) = inputs.keys().find(|key| !expected.contains(key)) {
        return Err(PredictorError::TypeMismatch(format!("unexpected input feature '{}'", extra)));
    }
    Ok(())
}

/// Checks that every model outcome is present and finite. Unknown keys are
/// ignored.
///
/// # Errors
/// `PredictorError::TypeMismatch` naming the offending key.
pub fn check_outputs(outputs: &BTreeMap<String, f64>) -> Result<(), PredictorError> {
    for (_, key) in model_outputs() {
        match outputs.get(key) {
            None => {
                return Err(PredictorError::TypeMismatch(format!("model output '{}' is missing", key)));
            }
            Some(value) if !value.is_finite() => {
                return Err(PredictorError::TypeMismatch(format!(
                    "model output '{}' is not finite: {}",
                    key, value
                )));
            }
            Some(_) => {}
        }
    }
    let known = outputs
        .keys()
        .filter(|name| model_outputs().any(|(_, key)| key == name.as_str()))
        .count();
    if known < outputs.len() {
        log::debug!("Ignoring {} unrecognised model outputs", outputs.len() - known);
    }
    Ok(())
}

/// Builds the feature map from a raw measurement. None if any feature is
/// missing.
fn features(measurement: &ElectricalMeasurement) -> Option<BTreeMap<String, f64>> {
    let subject = measurement.subject();
    let mut values = vec![
        subject.height_cm() as f64,
        subject.weight_kg(),
        subject.age() as f64,
    ];
    for segment in MODEL_SEGMENTS {
        let reading = measurement.reading(segment);
        values.push(reading.resistance?);
        values.push(reading.reactance?);
    }
    Some(input_features().into_iter().zip(values).collect())
}

/// Model-based equation set.
#[derive(Clone)]
pub struct MlModel {
    predictor: Arc<dyn Predictor>,
}

impl MlModel {
    pub fn new(predictor: Arc<dyn Predictor>) -> Self {
        Self { predictor }
    }
}

impl std::fmt::Debug for MlModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MlModel").finish_non_exhaustive()
    }
}

impl EquationSet for MlModel {
    fn name(&self) -> &'static str {
        "inbody"
    }

    fn form(&self) -> ElectricalForm {
        ElectricalForm::Raw
    }

    fn evaluate(&self, measurement: &ElectricalMeasurement) -> Result<BodyCompositionResult, BiaError> {
        let raw = measurement.to_form(self.form())?;
        let mut result = BodyCompositionResult::new();

        match features(&raw) {
            Some(inputs) => {
                check_inputs(&inputs)?;
                let outputs = self.predictor.predict(&inputs)?;
                check_outputs(&outputs)?;
                for (outcome, key) in model_outputs() {
                    result.set(outcome, outputs.get(key).copied());
                }
                log::debug!("Evaluated {} model", self.name());
            }
            None => {
                log::debug!("Skipping {} model: missing input features", self.name());
            }
        }

        result.derive_secondary(&raw);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::domain::Reading;
    use crate::regression::tests::full_measurement;

    /// Returns `base + index` for every model output.
    fn stub_outputs(base: f64) -> BTreeMap<String, f64> {
        model_outputs()
            .enumerate()
            .map(|(i, (_, key))| (key.to_string(), base + i as f64))
            .collect()
    }

    struct RecordingPredictor {
        calls: AtomicUsize,
        last_inputs: Mutex<Option<BTreeMap<String, f64>>>,
    }

    impl Predictor for RecordingPredictor {
        fn predict(&self, inputs: &BTreeMap<String, f64>) -> Result<BTreeMap<String, f64>, PredictorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_inputs.lock().unwrap() = Some(inputs.clone());
            Ok(stub_outputs(10.0))
        }
    }

    fn recording() -> Arc<RecordingPredictor> {
        Arc::new(RecordingPredictor {
            calls: AtomicUsize::new(0),
            last_inputs: Mutex::new(None),
        })
    }

    #[test]
    fn test_input_feature_order() {
        let names = input_features();
        assert_eq!(names.len(), 15);
        assert_eq!(&names[..4], &["height", "weight", "age", "left_arm_resistance"]);
        assert_eq!(names[14], "right_body_reactance");
        assert!(names.iter().all(|name| !name.contains("trunk")));
    }

    #[test]
    fn test_model_output_count() {
        assert_eq!(model_outputs().count(), 44);
    }

    #[test]
    fn test_model_keys_are_unique_and_distinct_from_export_names() {
        let keys: std::collections::BTreeSet<_> = model_outputs().map(|(_, key)| key).collect();
        assert_eq!(keys.len(), 44);
        assert_eq!(model_key(Outcome::TotalBodyWaterL), Some("total_body_water"));
        assert_eq!(model_key(Outcome::Bmi), None);
        assert_eq!(model_key(Outcome::LeftArmFatFreeMassKg), None);
    }

    #[test]
    fn test_direct_lookup() {
        let predictor = recording();
        let model = MlModel::new(predictor.clone());
        let result = model.evaluate(&full_measurement()).unwrap();

        assert_eq!(predictor.calls.load(Ordering::SeqCst), 1);
        let expected = stub_outputs(10.0);
        for (outcome, key) in model_outputs() {
            assert_eq!(result.get(outcome), expected.get(key).copied());
        }

        // Derived locally from the model outputs
        let slm = result.get(Outcome::SoftLeanMassKg).unwrap();
        let smm = result.get(Outcome::SkeletalMuscleMassKg).unwrap();
        assert_eq!(result.get(Outcome::OtherTissuesMassKg), Some(slm - smm));
        assert!(result.get(Outcome::Bmi).is_some());
    }

    #[test]
    fn test_trained_output_labels() {
        const LABELS: [&str; 44] = [
            "total_body_basalmetabolicrate",
            "total_body_proteins",
            "total_body_minerals",
            "target_weight",
            "total_body_phaseangle",
            "total_body_phaseanglecorrected",
            "total_body_fatmass",
            "total_body_fatmassperc",
            "total_body_fatmassindex",
            "total_body_fatfreemass",
            "total_body_fatfreemassperc",
            "total_body_fatfreemassindex",
            "total_body_bonemineralcontentperc",
            "total_body_bonemineralcontent",
            "total_body_softleanmass",
            "total_body_softleanmassperc",
            "total_body_skeletalmusclemass",
            "total_body_skeletalmusclemassperc",
            "total_body_skeletalmusclemassindex",
            "left_arm_fatmass",
            "left_arm_fatfreemassperc",
            "left_leg_fatmass",
            "left_leg_fatmassperc",
            "left_leg_fatfreemass",
            "left_leg_fatfreemassperc",
            "right_arm_fatmass",
            "right_arm_fatmassperc",
            "right_arm_fatfreemass",
            "right_arm_fatfreemassperc",
            "right_leg_fatmass",
            "right_leg_fatmassperc",
            "right_leg_fatfreemass",
            "right_leg_fatfreemassperc",
            "total_trunk_fatmass",
            "total_trunk_fatmassperc",
            "total_trunk_fatfreemass",
            "total_trunk_fatfreemassperc",
            "total_body_water",
            "total_body_waterperc",
            "total_body_extracellularwater",
            "total_body_extracellularwaterperc",
            "total_body_intracellularwater",
            "total_body_intracellularwaterperc",
            "ecw_on_icw",
        ];
        let predictor = |_: &BTreeMap<String, f64>| -> Result<BTreeMap<String, f64>, PredictorError> {
            let mut outputs: BTreeMap<String, f64> =
                LABELS.iter().map(|label| (label.to_string(), 1.0)).collect();
            outputs.insert("total_body_water".to_string(), 44.5);
            outputs.insert("total_body_fatmass".to_string(), 14.0);
            outputs.insert("left_arm_fatmass".to_string(), 0.9);
            outputs.insert("left_arm_fatfreemassperc".to_string(), 4.0);
            Ok(outputs)
        };
        let model = MlModel::new(Arc::new(predictor));
        let result = model.evaluate(&full_measurement()).unwrap();

        assert_eq!(result.get(Outcome::TotalBodyWaterL), Some(44.5));
        assert_eq!(result.get(Outcome::FatMassKg), Some(14.0));
        assert_eq!(result.get(Outcome::LeftArmFatMassKg), Some(0.9));
        assert_eq!(result.get(Outcome::TargetWeightKg), Some(1.0));

        // Not emitted by the model
        let weight = full_measurement().subject().weight_kg();
        assert!(result.get(Outcome::Bmi).is_some());
        assert!((result.get(Outcome::LeftArmFatMassPct).unwrap() - 0.9 / weight * 100.0).abs() < 1e-9);
        assert!((result.get(Outcome::LeftArmFatFreeMassKg).unwrap() - 4.0 * weight / 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_export_names_are_not_model_labels() {
        let predictor = |_: &BTreeMap<String, f64>| -> Result<BTreeMap<String, f64>, PredictorError> {
            Ok(Outcome::ALL
                .iter()
                .map(|outcome| (outcome.as_str().to_string(), 1.0))
                .collect())
        };
        let model = MlModel::new(Arc::new(predictor));
        assert!(matches!(
            model.evaluate(&full_measurement()),
            Err(BiaError::Predictor(PredictorError::TypeMismatch(_)))
        ));
    }

    #[test]
    fn test_features_use_raw_values() {
        let predictor = recording();
        let model = MlModel::new(predictor.clone());
        let corrected = full_measurement().canonical().unwrap();
        model.evaluate(&corrected).unwrap();

        let inputs = predictor.last_inputs.lock().unwrap().clone().unwrap();
        assert_eq!(inputs["height"], 175.0);
        assert_eq!(inputs["age"], 30.0);
        assert!((inputs["left_arm_resistance"] - 290.0).abs() < 1e-9);
        assert!((inputs["right_body_reactance"] - 48.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_feature_skips_predictor() {
        let predictor = recording();
        let model = MlModel::new(predictor.clone());
        let m = full_measurement().with_reading(Segment::LEFT_LEG, Reading::missing());
        let result = model.evaluate(&m).unwrap();

        assert_eq!(predictor.calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.get(Outcome::TotalBodyWaterL), None);
        assert_eq!(result.get(Outcome::FatMassKg), None);
        assert_eq!(result.get(Outcome::LeftLegFatMassKg), None);
        assert!(result.get(Outcome::Bmi).is_some());
    }

    #[test]
    fn test_trunk_is_not_a_feature() {
        let predictor = recording();
        let model = MlModel::new(predictor.clone());
        let m = full_measurement().with_reading(Segment::LEFT_TRUNK, Reading::missing());
        let result = model.evaluate(&m).unwrap();
        assert_eq!(predictor.calls.load(Ordering::SeqCst), 1);
        assert!(result.get(Outcome::TrunkFatMassKg).is_some());
    }

    #[test]
    fn test_missing_output_is_type_mismatch() {
        let predictor = |_: &BTreeMap<String, f64>| -> Result<BTreeMap<String, f64>, PredictorError> {
            let mut outputs = stub_outputs(1.0);
            outputs.remove("total_body_water");
            Ok(outputs)
        };
        let model = MlModel::new(Arc::new(predictor));
        let result = model.evaluate(&full_measurement());
        assert!(matches!(
            result,
            Err(BiaError::Predictor(PredictorError::TypeMismatch(message))) if message.contains("total_body_water")
        ));
    }

    #[test]
    fn test_non_finite_output_is_type_mismatch() {
        let predictor = |_: &BTreeMap<String, f64>| -> Result<BTreeMap<String, f64>, PredictorError> {
            let mut outputs = stub_outputs(1.0);
            outputs.insert("total_body_fatmass".to_string(), f64::NAN);
            Ok(outputs)
        };
        let model = MlModel::new(Arc::new(predictor));
        assert!(matches!(
            model.evaluate(&full_measurement()),
            Err(BiaError::Predictor(PredictorError::TypeMismatch(_)))
        ));
    }

    #[test]
    fn test_extra_outputs_are_ignored() {
        let predictor = |_: &BTreeMap<String, f64>| -> Result<BTreeMap<String, f64>, PredictorError> {
            let mut outputs = stub_outputs(1.0);
            outputs.insert("model_version".to_string(), 2.0);
            Ok(outputs)
        };
        let model = MlModel::new(Arc::new(predictor));
        assert!(model.evaluate(&full_measurement()).is_ok());
    }

    #[test]
    fn test_inference_error_propagates() {
        let predictor = |_: &BTreeMap<String, f64>| -> Result<BTreeMap<String, f64>, PredictorError> {
            Err(PredictorError::Inference("session closed".to_string()))
        };
        let model = MlModel::new(Arc::new(predictor));
        assert!(matches!(
            model.evaluate(&full_measurement()),
            Err(BiaError::Predictor(PredictorError::Inference(_)))
        ));
    }

    #[test]
    fn test_check_inputs() {
        let mut inputs: BTreeMap<String, f64> =
            input_features().into_iter().map(|name| (name, 1.0)).collect();
        assert!(check_inputs(&inputs).is_ok());

        inputs.insert("left_trunk_resistance".to_string(), 1.0);
        assert!(matches!(check_inputs(&inputs), Err(PredictorError::TypeMismatch(_))));

        inputs.remove("left_trunk_resistance");
        inputs.remove("weight");
        assert!(matches!(check_inputs(&inputs), Err(PredictorError::TypeMismatch(m)) if m.contains("weight")));
    }
}
