use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    config::{ChangeoverConfig, ConfigInput},
    error::ValidationError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Parameter {
    Setpoint,
    Anticipator,
    Deadband,
    SwapTime,
    MinTempSetpoint,
    MaxTempSetpoint,
    MinCycleTime,
}

impl Parameter {
    pub const ALL: [Parameter; 7] = [
        Self::Setpoint,
        Self::Anticipator,
        Self::Deadband,
        Self::SwapTime,
        Self::MinTempSetpoint,
        Self::MaxTempSetpoint,
        Self::MinCycleTime,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Setpoint => "setpoint",
            Self::Anticipator => "anticipator",
            Self::Deadband => "deadband",
            Self::SwapTime => "swapTime",
            Self::MinTempSetpoint => "minTempSetpoint",
            Self::MaxTempSetpoint => "maxTempSetpoint",
            Self::MinCycleTime => "minCycleTime",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Parameter {
    type Err = ValidationError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|parameter| parameter.as_str() == name)
            .ok_or_else(|| ValidationError::UnknownParameter(name.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterChange {
    pub parameter: Parameter,
    pub value: f64,
    pub adjusted_setpoint: Option<f64>,
}

impl fmt::Display for ParameterChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} set to {:.2}", self.parameter, self.value)?;
        if let Some(setpoint) = self.adjusted_setpoint {
            write!(f, ", setpoint adjusted to {setpoint:.2}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ParameterStore {
    config: ChangeoverConfig,
    initial: ChangeoverConfig,
}

impl ParameterStore {
    pub fn new(input: &ConfigInput) -> Self {
        let config = ChangeoverConfig::from_input(input);
        Self {
            initial: config.clone(),
            config,
        }
    }

    pub fn config(&self) -> &ChangeoverConfig {
        &self.config
    }

    pub fn set_parameter(
        &mut self,
        parameter: Parameter,
        value: f64,
    ) -> Result<ParameterChange, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::NonFinite(parameter));
        }

        let config = &mut self.config;
        let mut adjusted_setpoint = None;

        match parameter {
            Parameter::Setpoint => {
                if value < config.min_temp_setpoint || value > config.max_temp_setpoint {
                    return Err(ValidationError::SetpointOutOfBounds {
                        value,
                        min: config.min_temp_setpoint,
                        max: config.max_temp_setpoint,
                    });
                }
                config.setpoint = value;
            }
            Parameter::Deadband => {
                if value <= 0.0 {
                    return Err(ValidationError::DeadbandNotPositive(value));
                }
                config.deadband = value;
            }
            Parameter::Anticipator | Parameter::SwapTime | Parameter::MinCycleTime => {
                if value < 0.0 {
                    return Err(ValidationError::Negative { parameter, value });
                }
                match parameter {
                    Parameter::Anticipator => config.anticipator = value,
                    Parameter::SwapTime => config.swap_time = value,
                    _ => config.min_cycle_time = value,
                }
            }
            Parameter::MinTempSetpoint => {
                if value >= config.max_temp_setpoint {
                    return Err(ValidationError::MinAboveMax {
                        value,
                        max: config.max_temp_setpoint,
                    });
                }
                config.min_temp_setpoint = value;
                if config.setpoint < value {
                    config.setpoint = value;
                    adjusted_setpoint = Some(value);
                }
            }
            Parameter::MaxTempSetpoint => {
                if value <= config.min_temp_setpoint {
                    return Err(ValidationError::MaxBelowMin {
                        value,
                        min: config.min_temp_setpoint,
                    });
                }
                config.max_temp_setpoint = value;
                if config.setpoint > value {
                    config.setpoint = value;
                    adjusted_setpoint = Some(value);
                }
            }
        }

        Ok(ParameterChange {
            parameter,
            value,
            adjusted_setpoint,
        })
    }

    /// Returns whether the flag actually changed.
    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        let changed = self.config.enabled != enabled;
        self.config.enabled = enabled;
        changed
    }

    pub fn reset(&mut self) {
        self.config = self.initial.clone();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn store() -> ParameterStore {
        ParameterStore::new(&ConfigInput::default())
    }

    #[test]
    fn parses_every_parameter_name() {
        for parameter in Parameter::ALL {
            assert_eq!(parameter.as_str().parse::<Parameter>(), Ok(parameter));
        }
        assert_eq!(
            "hysteresis".parse::<Parameter>(),
            Err(ValidationError::UnknownParameter("hysteresis".to_string()))
        );
    }

    #[test]
    fn rejects_non_finite_values() {
        let mut store = store();
        for parameter in Parameter::ALL {
            assert_eq!(
                store.set_parameter(parameter, f64::NAN),
                Err(ValidationError::NonFinite(parameter))
            );
        }
        assert_eq!(store.config(), &ChangeoverConfig::default());
    }

    #[test]
    fn setpoint_must_stay_within_bounds() {
        let mut store = store();

        assert!(store.set_parameter(Parameter::Setpoint, 30.5).is_err());
        assert!(store.set_parameter(Parameter::Setpoint, 9.9).is_err());
        assert!(store.set_parameter(Parameter::Setpoint, 30.0).is_ok());
        assert!(store.set_parameter(Parameter::Setpoint, 10.0).is_ok());
        assert_eq!(store.config().setpoint, 10.0);
    }

    #[test]
    fn deadband_must_be_positive() {
        let mut store = store();

        assert_eq!(
            store.set_parameter(Parameter::Deadband, 0.0),
            Err(ValidationError::DeadbandNotPositive(0.0))
        );
        assert!(store.set_parameter(Parameter::Deadband, 0.1).is_ok());
    }

    #[test]
    fn durations_and_anticipator_accept_zero() {
        let mut store = store();

        for parameter in [
            Parameter::Anticipator,
            Parameter::SwapTime,
            Parameter::MinCycleTime,
        ] {
            assert_eq!(
                store.set_parameter(parameter, -0.1),
                Err(ValidationError::Negative {
                    parameter,
                    value: -0.1
                })
            );
            assert!(store.set_parameter(parameter, 0.0).is_ok());
        }

        let config = store.config();
        assert_eq!(config.anticipator, 0.0);
        assert_eq!(config.swap_time, 0.0);
        assert_eq!(config.min_cycle_time, 0.0);
    }

    #[test]
    fn raising_min_clamps_setpoint_up() {
        let mut store = store();

        let change = store
            .set_parameter(Parameter::MinTempSetpoint, 24.0)
            .unwrap();

        assert_eq!(change.adjusted_setpoint, Some(24.0));
        assert_eq!(store.config().setpoint, 24.0);
        assert_eq!(
            change.to_string(),
            "minTempSetpoint set to 24.00, setpoint adjusted to 24.00"
        );
    }

    #[test]
    fn lowering_max_clamps_setpoint_down() {
        let mut store = store();

        let change = store
            .set_parameter(Parameter::MaxTempSetpoint, 18.5)
            .unwrap();

        assert_eq!(store.config().setpoint, 18.5);
        assert_eq!(change.adjusted_setpoint, Some(18.5));
    }

    #[test]
    fn bounds_cannot_cross() {
        let mut store = store();

        assert_eq!(
            store.set_parameter(Parameter::MinTempSetpoint, 30.0),
            Err(ValidationError::MinAboveMax {
                value: 30.0,
                max: 30.0
            })
        );
        assert_eq!(
            store.set_parameter(Parameter::MaxTempSetpoint, 10.0),
            Err(ValidationError::MaxBelowMin {
                value: 10.0,
                min: 10.0
            })
        );
        assert!(store.config().is_valid());
    }

    #[test]
    fn plain_change_message() {
        let mut store = store();
        let change = store.set_parameter(Parameter::SwapTime, 120.0).unwrap();

        assert_eq!(change.adjusted_setpoint, None);
        assert_eq!(change.to_string(), "swapTime set to 120.00");
    }

    #[test]
    fn reset_restores_constructed_config() {
        let mut store = ParameterStore::new(&ConfigInput {
            setpoint: Some(19.0),
            ..ConfigInput::default()
        });
        store.set_parameter(Parameter::Setpoint, 25.0).unwrap();
        store.set_enabled(false);

        store.reset();

        assert_eq!(store.config().setpoint, 19.0);
        assert!(store.config().enabled);
    }
}
