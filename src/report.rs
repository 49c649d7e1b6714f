//! Reports combining several equation sets for one measurement.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::Serialize;

use crate::domain::{ElectricalForm, ElectricalMeasurement, Region, Segment, Session};
use crate::equation_set::EquationSet;
use crate::error::BiaError;
use crate::outcome::{BodyCompositionResult, Outcome};

/// Body resistance per metre of height, in ohm/m.
pub const RESISTANCE_RANGE: (f64, f64) = (200.0, 600.0);
/// Body reactance per metre of height, in ohm/m.
pub const REACTANCE_RANGE: (f64, f64) = (10.0, 60.0);
/// Body phase angle, in degrees.
pub const PHASE_ANGLE_RANGE: (f64, f64) = (3.0, 12.0);
/// Largest accepted left/right phase angle difference, in degrees.
pub const MAX_PHASE_ANGLE_ASYMMETRY: f64 = 1.0;

fn within(value: f64, (low, high): (f64, f64)) -> bool {
    value >= low && value <= high
}

/// Electrical plausibility of the whole-body readings, checked on the raw
/// form. Any missing value fails the check.
pub fn is_valid(measurement: &ElectricalMeasurement) -> bool {
    let raw = match measurement.to_form(ElectricalForm::Raw) {
        Ok(raw) => raw,
        Err(e) => {
            log::warn!("Cannot check validity: {}", e);
            return false;
        }
    };
    let height_m = raw.subject().height_m();

    let mut angles = Vec::with_capacity(2);
    for segment in Segment::bilateral(Region::Body) {
        let reading = raw.reading(segment);
        let (Some(r), Some(x), Some(angle)) =
            (reading.resistance, reading.reactance, reading.phase_angle_deg())
        else {
            return false;
        };
        if !within(r / height_m, RESISTANCE_RANGE)
            || !within(x / height_m, REACTANCE_RANGE)
            || !within(angle, PHASE_ANGLE_RANGE)
        {
            return false;
        }
        angles.push(angle);
    }

    (angles[0] - angles[1]).abs() <= MAX_PHASE_ANGLE_ASYMMETRY
}

/// Outcomes of every configured equation set for one measurement session.
#[derive(Debug, Clone)]
pub struct CompositeReport {
    session: Session,
    valid: bool,
    results: BTreeMap<&'static str, BodyCompositionResult>,
}

/// Serialized form of a report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportExport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<NaiveDateTime>,
    pub valid: bool,
    pub results: BTreeMap<String, BTreeMap<String, Option<f64>>>,
}

impl CompositeReport {
    /// Evaluates each equation set against the same measurement.
    ///
    /// # Errors
    /// Returns the first `BiaError` raised by an equation set.
    pub fn build(measurement: &ElectricalMeasurement, sets: &[&dyn EquationSet]) -> Result<Self, BiaError> {
        let mut results = BTreeMap::new();
        for set in sets {
            results.insert(set.name(), set.evaluate(measurement)?);
        }

        Ok(Self {
            session: measurement.session().clone(),
            valid: is_valid(measurement),
            results,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Result of one variant, by name.
    pub fn result(&self, variant: &str) -> Option<&BodyCompositionResult> {
        self.results.get(variant)
    }

    pub fn variants(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.results.keys().copied()
    }

    /// Nested `{variant: {outcome: value}}` mapping.
    pub fn export(&self) -> BTreeMap<String, BTreeMap<String, Option<f64>>> {
        self.results
            .iter()
            .map(|(variant, result)| {
                let outcomes = result
                    .to_map()
                    .into_iter()
                    .map(|(name, value)| (name.to_string(), value))
                    .collect();
                (variant.to_string(), outcomes)
            })
            .collect()
    }

    pub fn to_export(&self) -> ReportExport {
        ReportExport {
            subject_id: self.session.subject_id.clone(),
            recorded_at: self.session.recorded_at,
            valid: self.valid,
            results: self.export(),
        }
    }

    /// Plain text listing. Outcomes with a percentage counterpart are shown
    /// as `value (pct%)`.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        if let Some(id) = &self.session.subject_id {
            out.push_str(&format!("subject: {}\n", id));
        }
        if let Some(at) = &self.session.recorded_at {
            out.push_str(&format!("recorded at: {}\n", at));
        }
        out.push_str(&format!("valid measurement: {}\n", if self.valid { "yes" } else { "no" }));

        for (variant, result) in &self.results {
            out.push_str(&format!("\n[{}]\n", variant));
            for outcome in Outcome::ALL {
                if outcome.is_percentage_of_pair() {
                    continue;
                }
                let text = match result.paired(outcome) {
                    Some((value, pct)) => format_paired(value, pct),
                    None => format_value(result.get(outcome)),
                };
                out.push_str(&format!("{:<32}{}\n", outcome.as_str(), text));
            }
        }
        out
    }
}

/// Three decimals, or an empty string when missing.
pub fn format_value(value: Option<f64>) -> String {
    value.map(|v| format!("{:.3}", v)).unwrap_or_default()
}

/// `value (pct%)`, value with three decimals and percentage with one.
pub fn format_paired(value: Option<f64>, pct: Option<f64>) -> String {
    match (value, pct) {
        (Some(v), Some(p)) => format!("{:.3} ({:.1}%)", v, p),
        _ => format_value(value),
    }
}

/// Builds reports for many measurements in parallel. Each entry succeeds or
/// fails independently.
pub fn build_reports(
    measurements: &[ElectricalMeasurement],
    sets: &[&dyn EquationSet],
) -> Vec<Result<CompositeReport, BiaError>> {
    log::info!(
        "Building {} reports with {} equation sets",
        measurements.len(),
        sets.len()
    );
    measurements
        .par_iter()
        .map(|measurement| CompositeReport::build(measurement, sets))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::corrections::{CoefficientDataset, CoefficientTable};
    use crate::domain::{Reading, Sex, Subject};
    use crate::fitness::Fitness;
    use crate::regression::tests::full_measurement;
    use crate::standard::Standard;

    fn body_measurement(height_cm: f64, left: Reading, right: Reading) -> ElectricalMeasurement {
        let subject = Subject::new(30.0, Sex::Male, height_cm, 70.0).unwrap();
        ElectricalMeasurement::new(
            subject,
            [(Segment::LEFT_BODY, left), (Segment::RIGHT_BODY, right)],
            ElectricalForm::Raw,
            Arc::new(CoefficientTable::builtin(CoefficientDataset::Checkup)),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_measurement() {
        let m = body_measurement(170.0, Reading::new(400.0, 40.0), Reading::new(400.0, 40.0));
        assert!(is_valid(&m));
    }

    #[test]
    fn test_invalid_ratios() {
        // 300 / 1.7 < 200
        let low = body_measurement(170.0, Reading::new(300.0, 40.0), Reading::new(400.0, 40.0));
        assert!(!is_valid(&low));

        // 10 / 1.7 < 10
        let low_reactance = body_measurement(170.0, Reading::new(400.0, 10.0), Reading::new(400.0, 40.0));
        assert!(!is_valid(&low_reactance));
    }

    #[test]
    fn test_invalid_asymmetry() {
        // 5.71 and 7.12 degrees
        let m = body_measurement(170.0, Reading::new(400.0, 40.0), Reading::new(400.0, 50.0));
        assert!(!is_valid(&m));
    }

    #[test]
    fn test_invalid_when_missing_or_zero() {
        let missing = body_measurement(170.0, Reading::new(400.0, 40.0), Reading::missing());
        assert!(!is_valid(&missing));

        let zero = body_measurement(170.0, Reading::new(0.0, 40.0), Reading::new(400.0, 40.0));
        assert!(!is_valid(&zero));
    }

    #[test]
    fn test_validity_uses_raw_form() {
        let raw = body_measurement(170.0, Reading::new(400.0, 40.0), Reading::new(400.0, 40.0));
        let corrected = raw.canonical().unwrap();
        assert!(is_valid(&corrected));
    }

    #[test]
    fn test_build_and_export() {
        let report = CompositeReport::build(&full_measurement(), &[&Fitness, &Standard]).unwrap();
        assert_eq!(report.variants().collect::<Vec<_>>(), vec!["fitness", "standard"]);

        let export = report.export();
        assert_eq!(export.len(), 2);
        assert_eq!(export["fitness"].len(), Outcome::ALL.len());
        let tbw = export["fitness"]["total_body_water_l"].unwrap();
        assert!((tbw - 45.59174519838821).abs() < 1e-9);
        assert_eq!(export["standard"]["protein_mass_kg"], None);
    }

    #[test]
    fn test_export_serializes_nulls() {
        let report = CompositeReport::build(&full_measurement(), &[&Fitness]).unwrap();
        let json = serde_json::to_value(report.to_export()).unwrap();
        assert!(json["results"]["fitness"]["protein_mass_kg"].is_null());
        assert!(json["results"]["fitness"]["total_body_water_l"].is_number());
        assert!(json.get("subject_id").is_none());
    }

    #[test]
    fn test_render_text() {
        let m = full_measurement().with_session(Session {
            subject_id: Some("001".to_string()),
            recorded_at: None,
        });
        let report = CompositeReport::build(&m, &[&Fitness]).unwrap();
        let text = report.render_text();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "subject: 001");
        assert!(lines[1].starts_with("valid measurement: "));
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "[fitness]");
        // One row per outcome, percentages folded into their pair
        assert_eq!(lines.len(), 4 + 30);
        assert!(text.ends_with('\n'));
        // 45.592 L, 60.8% of 75 kg
        assert!(text.contains("total_body_water_l              45.592 (60.8%)"));
        assert!(!text.contains("total_body_water_pct"));
        assert!(text.contains("bmi                             24.490"));
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_value(None), "");
        assert_eq!(format_value(Some(1.23456)), "1.235");
        assert_eq!(format_paired(Some(15.0), Some(20.04)), "15.000 (20.0%)");
        assert_eq!(format_paired(Some(15.0), None), "15.000");
        assert_eq!(format_paired(None, Some(20.0)), "");
    }

    #[test]
    fn test_build_reports_in_parallel() {
        let measurements = vec![
            full_measurement(),
            full_measurement().with_reading(Segment::RIGHT_BODY, Reading::missing()),
            body_measurement(170.0, Reading::new(400.0, 40.0), Reading::new(400.0, 40.0)),
        ];
        let reports = build_reports(&measurements, &[&Fitness, &Standard]);
        assert_eq!(reports.len(), 3);

        let first = reports[0].as_ref().unwrap();
        let second = reports[1].as_ref().unwrap();
        assert!(first.result("fitness").unwrap().get(Outcome::TotalBodyWaterL).is_some());
        assert_eq!(
            second.result("standard").unwrap().get(Outcome::TotalBodyWaterL),
            None
        );
        assert!(reports[2].as_ref().unwrap().is_valid());
    }
}
