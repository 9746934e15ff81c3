use thiserror::Error;

use crate::params::Parameter;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid temperature")]
    InvalidTemperature,
    #[error("invalid {0}")]
    NonFinite(Parameter),
    #[error("invalid setpoint: {value} outside [{min}, {max}]")]
    SetpointOutOfBounds { value: f64, min: f64, max: f64 },
    #[error("invalid deadband: {0} must be greater than zero")]
    DeadbandNotPositive(f64),
    #[error("invalid {parameter}: {value} must not be negative")]
    Negative { parameter: Parameter, value: f64 },
    #[error("invalid minTempSetpoint: {value} must be below maxTempSetpoint {max}")]
    MinAboveMax { value: f64, max: f64 },
    #[error("invalid maxTempSetpoint: {value} must be above minTempSetpoint {min}")]
    MaxBelowMin { value: f64, min: f64 },
    #[error("invalid enable")]
    InvalidEnable,
    #[error("invalid {context}: {payload:?} is not a number")]
    InvalidPayload { context: String, payload: String },
    #[error("unknown parameter {0:?}")]
    UnknownParameter(String),
}
