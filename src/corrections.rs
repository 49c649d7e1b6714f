//! Orthostatic correction between raw and canonical electrical readings.
//!
//! Each segment and parameter has a linear map `corrected = raw * b1 + b0`.
//! Tables are data: built-in datasets are provided, and custom tables can be
//! loaded from JSON.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{Parameter, Reading, Region, Segment, Side};
use crate::error::CorrectionError;

/// Linear calibration coefficients for one segment and parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectionCoefficients {
    pub b0: f64,
    pub b1: f64,
}

impl CorrectionCoefficients {
    pub const fn new(b0: f64, b1: f64) -> Self {
        Self { b0, b1 }
    }

    /// Checks that the map is invertible and finite.
    pub fn validate(&self, target: &str) -> Result<(), CorrectionError> {
        if !self.b0.is_finite() || !self.b1.is_finite() {
            return Err(CorrectionError::InvalidCoefficient {
                target: target.to_string(),
                reason: format!("non-finite coefficients ({}, {})", self.b0, self.b1),
            });
        }
        if self.b1 == 0.0 {
            return Err(CorrectionError::InvalidCoefficient {
                target: target.to_string(),
                reason: "slope is zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Raw to corrected: `raw * b1 + b0`. None stays None.
pub fn apply(raw: Option<f64>, coefficients: CorrectionCoefficients) -> Option<f64> {
    raw.map(|value| value * coefficients.b1 + coefficients.b0)
}

/// Corrected to raw: `(corrected - b0) / b1`. None stays None.
///
/// # Errors
/// Returns `CorrectionError::InvalidCoefficient` when `b1` is zero.
pub fn remove(
    corrected: Option<f64>,
    coefficients: CorrectionCoefficients,
) -> Result<Option<f64>, CorrectionError> {
    let Some(value) = corrected else {
        return Ok(None);
    };
    coefficients.validate("inverse correction")?;
    Ok(Some((value - coefficients.b0) / coefficients.b1))
}

/// Built-in coefficient datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CoefficientDataset {
    /// Eight-segment table for the standard electrode layout.
    #[default]
    Checkup,
    /// Adds whole-body upper/lower placements.
    Akern,
}

impl CoefficientDataset {
    pub fn all() -> &'static [CoefficientDataset] {
        &[CoefficientDataset::Checkup, CoefficientDataset::Akern]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CoefficientDataset::Checkup => "checkup",
            CoefficientDataset::Akern => "akern",
        }
    }

    fn rows(&self) -> &'static [CoefficientRow] {
        match self {
            CoefficientDataset::Checkup => CHECKUP_ROWS,
            CoefficientDataset::Akern => AKERN_ROWS,
        }
    }
}

impl FromStr for CoefficientDataset {
    type Err = CorrectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "checkup" => Ok(CoefficientDataset::Checkup),
            "akern" => Ok(CoefficientDataset::Akern),
            _ => Err(CorrectionError::UnknownDataset(s.to_string())),
        }
    }
}

impl fmt::Display for CoefficientDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of a coefficient table, as stored in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoefficientRow {
    pub side: Side,
    pub region: Region,
    pub parameter: Parameter,
    pub b0: f64,
    pub b1: f64,
}

const fn row(side: Side, region: Region, parameter: Parameter, b0: f64, b1: f64) -> CoefficientRow {
    CoefficientRow {
        side,
        region,
        parameter,
        b0,
        b1,
    }
}

use Parameter::{Reactance as X, Resistance as R};
use Region::{Arm, Body, Leg, Trunk};
use Side::{Left, Lower, Right, Upper};

const CHECKUP_ROWS: &[CoefficientRow] = &[
    row(Left, Arm, R, -5.929064, 0.874883),
    row(Left, Arm, X, 3.304037, 0.686138),
    row(Left, Body, R, 29.735312, 0.893878),
    row(Left, Body, X, -5.850700, 1.077053),
    row(Left, Leg, R, 22.703793, 0.988802),
    row(Left, Leg, X, -0.196244, 0.988221),
    row(Left, Trunk, R, 2.874024, 0.868278),
    row(Left, Trunk, X, 7.535099, 0.028624),
    row(Right, Arm, R, -17.392322, 0.904717),
    row(Right, Arm, X, 1.392877, 0.782267),
    row(Right, Body, R, -13.248009, 0.971554),
    row(Right, Body, X, 4.612482, 0.886881),
    row(Right, Leg, R, 3.174666, 1.071437),
    row(Right, Leg, X, -0.259402, 0.991873),
    row(Right, Trunk, R, 0.973686, 1.038562),
    row(Right, Trunk, X, 8.288528, -0.053032),
];

const AKERN_ROWS: &[CoefficientRow] = &[
    row(Left, Arm, R, -26.52469483, 0.890449104),
    row(Left, Arm, X, 2.285094205, 0.641054712),
    row(Left, Body, R, -16.67861046, 0.945093853),
    row(Left, Body, X, -3.4758113, 0.948008502),
    row(Left, Leg, R, 32.27067501, 0.927296855),
    row(Left, Leg, X, 0.89664892, 0.991384925),
    row(Left, Trunk, R, -3.466485256, 1.18316196),
    row(Left, Trunk, X, 7.4473968, 0.073604247),
    row(Lower, Body, R, 52.56977552, 0.948773993),
    row(Lower, Body, X, -0.823281553, 1.00633072),
    row(Right, Arm, R, -23.34396035, 0.872451337),
    row(Right, Arm, X, 2.614929578, 0.653447308),
    row(Right, Body, R, -0.074877704, 0.91119084),
    row(Right, Body, X, -0.514277526, 0.907606249),
    row(Right, Leg, R, 25.18288672, 0.941388917),
    row(Right, Leg, X, -1.155987874, 1.066059805),
    row(Right, Trunk, R, -3.218942633, 1.164758399),
    row(Right, Trunk, X, 7.76203773, 0.073428646),
    row(Upper, Body, R, -63.78991222, 0.901742825),
    row(Upper, Body, X, 9.520406271, 0.612947206),
];

/// A named, validated correction table.
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientTable {
    name: String,
    coefficients: BTreeMap<(Segment, Parameter), CorrectionCoefficients>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TableFile {
    Named {
        name: Option<String>,
        rows: Vec<CoefficientRow>,
    },
    Rows(Vec<CoefficientRow>),
}

impl TableFile {
    fn into_parts(self) -> (Option<String>, Vec<CoefficientRow>) {
        match self {
            TableFile::Named { name, rows } => (name, rows),
            TableFile::Rows(rows) => (None, rows),
        }
    }
}

impl CoefficientTable {
    /// Builds a table from rows.
    ///
    /// # Errors
    /// - `InvalidCoefficient` if a slope is zero or a value is not finite
    /// - `MalformedTable` for duplicate rows or unknown segments
    pub fn from_rows(
        name: impl Into<String>,
        rows: &[CoefficientRow],
    ) -> Result<Self, CorrectionError> {
        let name = name.into();
        let mut coefficients = BTreeMap::new();

        for row in rows {
            let segment = Segment::new(row.side, row.region).ok_or_else(|| {
                CorrectionError::MalformedTable(format!(
                    "{}: no segment for side {} and region {}",
                    name,
                    row.side.as_str(),
                    row.region.as_str()
                ))
            })?;
            let pair = CorrectionCoefficients::new(row.b0, row.b1);
            pair.validate(&format!("{} {}", segment, row.parameter))?;

            if coefficients.insert((segment, row.parameter), pair).is_some() {
                return Err(CorrectionError::MalformedTable(format!(
                    "{}: duplicate entry for {} {}",
                    name, segment, row.parameter
                )));
            }
        }

        if coefficients.is_empty() {
            return Err(CorrectionError::MalformedTable(format!("{}: no rows", name)));
        }

        Ok(Self { name, coefficients })
    }

    /// Returns one of the built-in tables.
    pub fn builtin(dataset: CoefficientDataset) -> Self {
        let coefficients = dataset
            .rows()
            .iter()
            .filter_map(|row| {
                Segment::new(row.side, row.region)
                    .map(|segment| ((segment, row.parameter), CorrectionCoefficients::new(row.b0, row.b1)))
            })
            .collect();
        Self {
            name: dataset.as_str().to_string(),
            coefficients,
        }
    }

    /// Loads a table from a JSON array of
    /// `{"side": "left", "region": "arm", "parameter": "R", "b0": .., "b1": ..}`
    /// rows, or an object `{"name": .., "rows": [..]}`. The file path names
    /// unnamed tables.
    pub fn from_json_path(path: &Path) -> Result<Self, CorrectionError> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| CorrectionError::Io {
            path: display.clone(),
            source,
        })?;
        let file: TableFile =
            serde_json::from_str(&content).map_err(|source| CorrectionError::Json {
                path: display.clone(),
                source,
            })?;

        let (name, rows) = file.into_parts();
        let table = Self::from_rows(name.unwrap_or(display), &rows)?;
        log::info!(
            "Loaded correction table '{}' with {} coefficients",
            table.name,
            table.coefficients.len()
        );
        Ok(table)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, segment: Segment, parameter: Parameter) -> Option<CorrectionCoefficients> {
        self.coefficients.get(&(segment, parameter)).copied()
    }

    fn lookup(
        &self,
        segment: Segment,
        parameter: Parameter,
    ) -> Result<CorrectionCoefficients, CorrectionError> {
        self.get(segment, parameter)
            .ok_or_else(|| CorrectionError::MissingCoefficient {
                table: self.name.clone(),
                segment,
                parameter,
            })
    }

    /// Corrects a raw reading. Missing values need no coefficient.
    pub fn apply_reading(&self, segment: Segment, reading: Reading) -> Result<Reading, CorrectionError> {
        let mut out = reading;
        for parameter in [Parameter::Resistance, Parameter::Reactance] {
            if reading.get(parameter).is_some() {
                let pair = self.lookup(segment, parameter)?;
                out = out.with(parameter, apply(reading.get(parameter), pair));
            }
        }
        Ok(out)
    }

    /// Reverts a corrected reading to raw form.
    pub fn remove_reading(&self, segment: Segment, reading: Reading) -> Result<Reading, CorrectionError> {
        let mut out = reading;
        for parameter in [Parameter::Resistance, Parameter::Reactance] {
            if reading.get(parameter).is_some() {
                let pair = self.lookup(segment, parameter)?;
                out = out.with(parameter, remove(reading.get(parameter), pair)?);
            }
        }
        Ok(out)
    }
}

impl Default for CoefficientTable {
    fn default() -> Self {
        Self::builtin(CoefficientDataset::default())
    }
}
