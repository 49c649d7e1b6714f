//! Error types for the body composition engine.
//!
//! Missing inputs are never errors: they surface as `None` on the affected
//! outcome. The types here cover configuration and contract violations.

use thiserror::Error;

use crate::domain::{Parameter, Segment};

/// Errors raised while building a measurement from subject data.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("unknown sex: {0} (expected \"M\" or \"F\")")]
    UnknownSex(String),

    #[error("{field} must be positive: {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("{field} must be a finite number: {value}")]
    NonFinite { field: String, value: f64 },
}

/// Errors raised by orthostatic correction tables.
#[derive(Debug, Error)]
pub enum CorrectionError {
    #[error("invalid coefficient for {target}: {reason}")]
    InvalidCoefficient { target: String, reason: String },

    #[error("no correction coefficient for {segment} {parameter} in table '{table}'")]
    MissingCoefficient {
        table: String,
        segment: Segment,
        parameter: Parameter,
    },

    #[error("malformed coefficient table: {0}")]
    MalformedTable(String),

    #[error("unknown coefficient dataset: {0} (expected checkup or akern)")]
    UnknownDataset(String),

    #[error("failed to read coefficient table {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse coefficient table {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from the electrical primitives.
#[derive(Debug, Error, PartialEq)]
pub enum DomainError {
    #[error("phase angle is undefined for zero resistance (reactance {reactance})")]
    ZeroResistance { reactance: f64 },
}

/// Errors at the boundary with the external inference collaborator.
#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

/// Umbrella error returned by equation sets and reports.
#[derive(Debug, Error)]
pub enum BiaError {
    #[error(transparent)]
    Correction(#[from] CorrectionError),

    #[error(transparent)]
    Predictor(#[from] PredictorError),
}
