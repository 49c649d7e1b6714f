//! Domain types for subjects and segmental impedance measurements.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::corrections::CoefficientTable;
use crate::error::{CorrectionError, InputError};

/// Biological sex as declared by the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M", alias = "m")]
    Male,
    #[serde(rename = "F", alias = "f")]
    Female,
}

impl Sex {
    pub fn is_male(&self) -> bool {
        matches!(self, Sex::Male)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
        }
    }
}

impl FromStr for Sex {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "M" => Ok(Sex::Male),
            "F" => Ok(Sex::Female),
            _ => Err(InputError::UnknownSex(s.to_string())),
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Electrode side. `Upper` and `Lower` only exist for whole-body placements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[serde(alias = "LEFT")]
    Left,
    #[serde(alias = "RIGHT")]
    Right,
    #[serde(alias = "UPPER")]
    Upper,
    #[serde(alias = "LOWER")]
    Lower,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
            Side::Upper => "upper",
            Side::Lower => "lower",
        }
    }
}

/// Body region spanned by an electrode placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    #[serde(alias = "ARM")]
    Arm,
    #[serde(alias = "LEG")]
    Leg,
    #[serde(alias = "TRUNK")]
    Trunk,
    #[serde(alias = "BODY")]
    Body,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Arm => "arm",
            Region::Leg => "leg",
            Region::Trunk => "trunk",
            Region::Body => "body",
        }
    }
}

/// Electrical parameter of a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parameter {
    #[serde(alias = "R")]
    Resistance,
    #[serde(alias = "X")]
    Reactance,
}

impl Parameter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Parameter::Resistance => "resistance",
            Parameter::Reactance => "reactance",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A measured body segment: one side of one region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Segment {
    side: Side,
    region: Region,
}

impl Segment {
    pub const LEFT_ARM: Segment = Segment::at(Side::Left, Region::Arm);
    pub const LEFT_LEG: Segment = Segment::at(Side::Left, Region::Leg);
    pub const LEFT_TRUNK: Segment = Segment::at(Side::Left, Region::Trunk);
    pub const LEFT_BODY: Segment = Segment::at(Side::Left, Region::Body);
    pub const RIGHT_ARM: Segment = Segment::at(Side::Right, Region::Arm);
    pub const RIGHT_LEG: Segment = Segment::at(Side::Right, Region::Leg);
    pub const RIGHT_TRUNK: Segment = Segment::at(Side::Right, Region::Trunk);
    pub const RIGHT_BODY: Segment = Segment::at(Side::Right, Region::Body);
    pub const UPPER_BODY: Segment = Segment::at(Side::Upper, Region::Body);
    pub const LOWER_BODY: Segment = Segment::at(Side::Lower, Region::Body);

    const fn at(side: Side, region: Region) -> Self {
        Self { side, region }
    }

    /// Returns the segment for a side and region, or None for combinations
    /// that have no electrode placement (upper/lower limbs or trunk).
    pub fn new(side: Side, region: Region) -> Option<Self> {
        match (side, region) {
            (Side::Upper | Side::Lower, Region::Body) => Some(Self::at(side, region)),
            (Side::Upper | Side::Lower, _) => None,
            _ => Some(Self::at(side, region)),
        }
    }

    /// Returns the left/right segment of a region.
    pub const fn bilateral(region: Region) -> [Segment; 2] {
        [Segment::at(Side::Left, region), Segment::at(Side::Right, region)]
    }

    /// Returns all segment variants.
    pub fn all() -> &'static [Segment] {
        &[
            Segment::LEFT_ARM,
            Segment::LEFT_LEG,
            Segment::LEFT_TRUNK,
            Segment::LEFT_BODY,
            Segment::RIGHT_ARM,
            Segment::RIGHT_LEG,
            Segment::RIGHT_TRUNK,
            Segment::RIGHT_BODY,
            Segment::UPPER_BODY,
            Segment::LOWER_BODY,
        ]
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn region(&self) -> Region {
        self.region
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.side.as_str(), self.region.as_str())
    }
}

/// A resistance/reactance pair in ohms. Either half may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Reading {
    pub resistance: Option<f64>,
    pub reactance: Option<f64>,
}

impl Reading {
    pub fn new(resistance: f64, reactance: f64) -> Self {
        Self {
            resistance: Some(resistance),
            reactance: Some(reactance),
        }
    }

    /// A reading with neither value measured.
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn get(&self, parameter: Parameter) -> Option<f64> {
        match parameter {
            Parameter::Resistance => self.resistance,
            Parameter::Reactance => self.reactance,
        }
    }

    pub fn with(mut self, parameter: Parameter, value: Option<f64>) -> Self {
        match parameter {
            Parameter::Resistance => self.resistance = value,
            Parameter::Reactance => self.reactance = value,
        }
        self
    }
}

/// Reference frame of the stored electrical values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElectricalForm {
    /// As read by the analyser in the measurement posture.
    Raw,
    /// Orthostatically corrected to the reference posture.
    Corrected,
}

/// Anthropometric attributes of the measured subject.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Subject {
    age: u32,
    sex: Sex,
    height_cm: u32,
    weight_kg: f64,
}

impl Subject {
    /// Creates a subject, truncating age and height to whole units.
    pub fn new(age: f64, sex: Sex, height_cm: f64, weight_kg: f64) -> Result<Self, InputError> {
        if !age.is_finite() {
            return Err(InputError::NonFinite {
                field: "age".to_string(),
                value: age,
            });
        }
        if age < 0.0 {
            return Err(InputError::NonPositive {
                field: "age",
                value: age,
            });
        }
        if !height_cm.is_finite() || height_cm < 1.0 {
            return Err(InputError::NonPositive {
                field: "height",
                value: height_cm,
            });
        }
        if !weight_kg.is_finite() || weight_kg <= 0.0 {
            return Err(InputError::NonPositive {
                field: "weight",
                value: weight_kg,
            });
        }

        Ok(Self {
            age: age as u32,
            sex,
            height_cm: height_cm as u32,
            weight_kg,
        })
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn sex(&self) -> Sex {
        self.sex
    }

    pub fn height_cm(&self) -> u32 {
        self.height_cm
    }

    pub fn height_m(&self) -> f64 {
        self.height_cm as f64 / 100.0
    }

    pub fn weight_kg(&self) -> f64 {
        self.weight_kg
    }

    /// Body mass index in kg/m².
    pub fn bmi(&self) -> f64 {
        self.weight_kg / self.height_m().powi(2)
    }

    /// Target weight in kg: `bmi * (2.2 + 3.5 * (height_m - 1.5))`.
    pub fn target_weight_kg(&self) -> f64 {
        self.bmi() * (2.2 + 3.5 * (self.height_m() - 1.5))
    }
}

/// Identification of the measurement session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub subject_id: Option<String>,
    pub recorded_at: Option<NaiveDateTime>,
}

/// One impedance measurement session. Immutable: conversions between raw
/// and corrected form return a new measurement.
#[derive(Debug, Clone)]
pub struct ElectricalMeasurement {
    subject: Subject,
    session: Session,
    readings: BTreeMap<Segment, Reading>,
    form: ElectricalForm,
    table: Arc<CoefficientTable>,
}

impl ElectricalMeasurement {
    /// Creates a measurement. Segments not supplied are recorded as missing.
    ///
    /// # Errors
    /// Returns `InputError::NonFinite` if a supplied value is NaN or infinite.
    pub fn new<I>(
        subject: Subject,
        readings: I,
        form: ElectricalForm,
        table: Arc<CoefficientTable>,
    ) -> Result<Self, InputError>
    where
        I: IntoIterator<Item = (Segment, Reading)>,
    {
        let mut all: BTreeMap<Segment, Reading> = Segment::all()
            .iter()
            .map(|segment| (*segment, Reading::missing()))
            .collect();

        for (segment, reading) in readings {
            for parameter in [Parameter::Resistance, Parameter::Reactance] {
                if let Some(value) = reading.get(parameter)
                    && !value.is_finite()
                {
                    return Err(InputError::NonFinite {
                        field: format!("{}_{}", segment, parameter),
                        value,
                    });
                }
            }
            all.insert(segment, reading);
        }

        Ok(Self {
            subject,
            session: Session::default(),
            readings: all,
            form,
            table,
        })
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Attaches session identification.
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    pub fn form(&self) -> ElectricalForm {
        self.form
    }

    pub fn table(&self) -> &CoefficientTable {
        &self.table
    }

    /// Returns the stored reading of a segment, in this measurement's form.
    pub fn reading(&self, segment: Segment) -> Reading {
        self.readings.get(&segment).copied().unwrap_or_default()
    }

    pub fn resistance(&self, segment: Segment) -> Option<f64> {
        self.reading(segment).resistance
    }

    pub fn reactance(&self, segment: Segment) -> Option<f64> {
        self.reading(segment).reactance
    }

    /// Returns a copy with one segment's reading replaced.
    pub fn with_reading(&self, segment: Segment, reading: Reading) -> Self {
        let mut readings = self.readings.clone();
        readings.insert(segment, reading);
        Self {
            readings,
            ..self.clone()
        }
    }

    /// Returns this measurement expressed in the requested form.
    ///
    /// # Errors
    /// Returns `CorrectionError` if a present value has no usable
    /// coefficient in the table.
    pub fn to_form(&self, form: ElectricalForm) -> Result<Self, CorrectionError> {
        if form == self.form {
            return Ok(self.clone());
        }

        let mut readings = BTreeMap::new();
        for (segment, reading) in &self.readings {
            let converted = match form {
                ElectricalForm::Corrected => self.table.apply_reading(*segment, *reading)?,
                ElectricalForm::Raw => self.table.remove_reading(*segment, *reading)?,
            };
            readings.insert(*segment, converted);
        }

        Ok(Self {
            subject: self.subject,
            session: self.session.clone(),
            readings,
            form,
            table: Arc::clone(&self.table),
        })
    }

    /// The measurement in canonical (orthostatically corrected) form.
    pub fn canonical(&self) -> Result<Self, CorrectionError> {
        self.to_form(ElectricalForm::Corrected)
    }

    /// The measurement in raw (as-measured) form.
    pub fn raw(&self) -> Result<Self, CorrectionError> {
        self.to_form(ElectricalForm::Raw)
    }
}

/// Construction parameters of a measurement, as exchanged in JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeasurementInput {
    #[serde(flatten)]
    pub session: Session,

    pub age: f64,
    pub sex: Option<Sex>,
    pub height: f64,
    pub weight: f64,

    pub left_arm_resistance: Option<f64>,
    pub left_arm_reactance: Option<f64>,
    pub left_leg_resistance: Option<f64>,
    pub left_leg_reactance: Option<f64>,
    pub left_trunk_resistance: Option<f64>,
    pub left_trunk_reactance: Option<f64>,
    pub left_body_resistance: Option<f64>,
    pub left_body_reactance: Option<f64>,
    pub right_arm_resistance: Option<f64>,
    pub right_arm_reactance: Option<f64>,
    pub right_leg_resistance: Option<f64>,
    pub right_leg_reactance: Option<f64>,
    pub right_trunk_resistance: Option<f64>,
    pub right_trunk_reactance: Option<f64>,
    pub right_body_resistance: Option<f64>,
    pub right_body_reactance: Option<f64>,
    pub upper_body_resistance: Option<f64>,
    pub upper_body_reactance: Option<f64>,
    pub lower_body_resistance: Option<f64>,
    pub lower_body_reactance: Option<f64>,

    /// True when the electrical values are already orthostatically corrected.
    #[serde(default)]
    pub corrected_electrical_values: bool,
}

impl MeasurementInput {
    fn readings(&self) -> [(Segment, Reading); 10] {
        let pair = |resistance, reactance| Reading {
            resistance,
            reactance,
        };
        [
            (
                Segment::LEFT_ARM,
                pair(self.left_arm_resistance, self.left_arm_reactance),
            ),
            (
                Segment::LEFT_LEG,
                pair(self.left_leg_resistance, self.left_leg_reactance),
            ),
            (
                Segment::LEFT_TRUNK,
                pair(self.left_trunk_resistance, self.left_trunk_reactance),
            ),
            (
                Segment::LEFT_BODY,
                pair(self.left_body_resistance, self.left_body_reactance),
            ),
            (
                Segment::RIGHT_ARM,
                pair(self.right_arm_resistance, self.right_arm_reactance),
            ),
            (
                Segment::RIGHT_LEG,
                pair(self.right_leg_resistance, self.right_leg_reactance),
            ),
            (
                Segment::RIGHT_TRUNK,
                pair(self.right_trunk_resistance, self.right_trunk_reactance),
            ),
            (
                Segment::RIGHT_BODY,
                pair(self.right_body_resistance, self.right_body_reactance),
            ),
            (
                Segment::UPPER_BODY,
                pair(self.upper_body_resistance, self.upper_body_reactance),
            ),
            (
                Segment::LOWER_BODY,
                pair(self.lower_body_resistance, self.lower_body_reactance),
            ),
        ]
    }

    /// Builds the measurement using the given correction table.
    ///
    /// # Errors
    /// Returns `InputError` if sex is missing or subject data is invalid.
    pub fn into_measurement(
        self,
        table: Arc<CoefficientTable>,
    ) -> Result<ElectricalMeasurement, InputError> {
        let sex = self
            .sex
            .ok_or_else(|| InputError::UnknownSex("<missing>".to_string()))?;
        let subject = Subject::new(self.age, sex, self.height, self.weight)?;
        let form = if self.corrected_electrical_values {
            ElectricalForm::Corrected
        } else {
            ElectricalForm::Raw
        };
        let readings = self.readings();
        Ok(ElectricalMeasurement::new(subject, readings, form, table)?.with_session(self.session))
    }
}
