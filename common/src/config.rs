use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::params::Parameter;

pub const DEFAULT_NAME: &str = "changeover";
pub const DEFAULT_SETPOINT: f64 = 22.0;
pub const DEFAULT_ANTICIPATOR: f64 = 0.5;
pub const DEFAULT_DEADBAND: f64 = 2.0;
pub const DEFAULT_SWAP_TIME: f64 = 300.0;
pub const DEFAULT_MIN_TEMP_SETPOINT: f64 = 10.0;
pub const DEFAULT_MAX_TEMP_SETPOINT: f64 = 30.0;
pub const DEFAULT_MIN_CYCLE_TIME: f64 = 60.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeoverConfig {
    pub name: String,
    pub setpoint: f64,
    pub anticipator: f64,
    pub deadband: f64,
    pub swap_time: f64,
    pub min_temp_setpoint: f64,
    pub max_temp_setpoint: f64,
    pub min_cycle_time: f64,
    pub enabled: bool,
}

impl Default for ChangeoverConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            setpoint: DEFAULT_SETPOINT,
            anticipator: DEFAULT_ANTICIPATOR,
            deadband: DEFAULT_DEADBAND,
            swap_time: DEFAULT_SWAP_TIME,
            min_temp_setpoint: DEFAULT_MIN_TEMP_SETPOINT,
            max_temp_setpoint: DEFAULT_MAX_TEMP_SETPOINT,
            min_cycle_time: DEFAULT_MIN_CYCLE_TIME,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigInput {
    pub name: Option<String>,
    pub setpoint: Option<f64>,
    pub anticipator: Option<f64>,
    pub deadband: Option<f64>,
    pub swap_time: Option<f64>,
    pub min_temp_setpoint: Option<f64>,
    pub max_temp_setpoint: Option<f64>,
    pub min_cycle_time: Option<f64>,
    pub enable: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigView {
    pub name: String,
    pub setpoint: f64,
    pub anticipator: f64,
    pub deadband: f64,
    pub swap_time: f64,
    pub min_temp_setpoint: f64,
    pub max_temp_setpoint: f64,
    pub min_cycle_time: f64,
    pub enable: bool,
}

impl ChangeoverConfig {
    /// Builds a config from untrusted input. Invalid or missing fields fall
    /// back to their defaults; construction never fails.
    pub fn from_input(input: &ConfigInput) -> Self {
        let (min_temp_setpoint, max_temp_setpoint) =
            sanitize_bounds(input.min_temp_setpoint, input.max_temp_setpoint);

        let mut setpoint = field_or_default(
            Parameter::Setpoint,
            input.setpoint,
            DEFAULT_SETPOINT,
            |value| (min_temp_setpoint..=max_temp_setpoint).contains(&value),
        );
        // The default itself may sit outside custom bounds.
        setpoint = setpoint.clamp(min_temp_setpoint, max_temp_setpoint);

        Self {
            name: input
                .name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .unwrap_or(DEFAULT_NAME)
                .to_string(),
            setpoint,
            anticipator: field_or_default(
                Parameter::Anticipator,
                input.anticipator,
                DEFAULT_ANTICIPATOR,
                |value| value >= 0.0,
            ),
            deadband: field_or_default(
                Parameter::Deadband,
                input.deadband,
                DEFAULT_DEADBAND,
                |value| value > 0.0,
            ),
            swap_time: field_or_default(
                Parameter::SwapTime,
                input.swap_time,
                DEFAULT_SWAP_TIME,
                |value| value >= 0.0,
            ),
            min_temp_setpoint,
            max_temp_setpoint,
            min_cycle_time: field_or_default(
                Parameter::MinCycleTime,
                input.min_cycle_time,
                DEFAULT_MIN_CYCLE_TIME,
                |value| value >= 0.0,
            ),
            enabled: input.enable.unwrap_or(true),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.min_temp_setpoint < self.max_temp_setpoint
            && (self.min_temp_setpoint..=self.max_temp_setpoint).contains(&self.setpoint)
            && self.deadband.is_finite()
            && self.deadband > 0.0
            && self.anticipator.is_finite()
            && self.anticipator >= 0.0
            && self.swap_time.is_finite()
            && self.swap_time >= 0.0
            && self.min_cycle_time.is_finite()
            && self.min_cycle_time >= 0.0
    }

    pub fn view(&self) -> ConfigView {
        ConfigView {
            name: if self.name.is_empty() {
                DEFAULT_NAME.to_string()
            } else {
                self.name.clone()
            },
            setpoint: finite_or(self.setpoint, DEFAULT_SETPOINT),
            anticipator: valid_or(self.anticipator, DEFAULT_ANTICIPATOR, |v| v >= 0.0),
            deadband: valid_or(self.deadband, DEFAULT_DEADBAND, |v| v > 0.0),
            swap_time: valid_or(self.swap_time, DEFAULT_SWAP_TIME, |v| v >= 0.0),
            min_temp_setpoint: finite_or(self.min_temp_setpoint, DEFAULT_MIN_TEMP_SETPOINT),
            max_temp_setpoint: finite_or(self.max_temp_setpoint, DEFAULT_MAX_TEMP_SETPOINT),
            min_cycle_time: valid_or(self.min_cycle_time, DEFAULT_MIN_CYCLE_TIME, |v| v >= 0.0),
            enable: self.enabled,
        }
    }
}

fn sanitize_bounds(min: Option<f64>, max: Option<f64>) -> (f64, f64) {
    let mut min = min.unwrap_or(DEFAULT_MIN_TEMP_SETPOINT);
    let mut max = max.unwrap_or(DEFAULT_MAX_TEMP_SETPOINT);

    if !min.is_finite() || (max.is_finite() && min >= max) {
        warn!(value = min, "invalid minTempSetpoint in config, using default");
        min = DEFAULT_MIN_TEMP_SETPOINT;
    }
    if !max.is_finite() || max <= min {
        warn!(value = max, "invalid maxTempSetpoint in config, using default");
        max = DEFAULT_MAX_TEMP_SETPOINT;
    }
    if min >= max {
        min = DEFAULT_MIN_TEMP_SETPOINT;
        max = DEFAULT_MAX_TEMP_SETPOINT;
    }

    (min, max)
}

fn field_or_default(
    parameter: Parameter,
    value: Option<f64>,
    default: f64,
    valid: impl Fn(f64) -> bool,
) -> f64 {
    match value {
        None => default,
        Some(value) if value.is_finite() && valid(value) => value,
        Some(value) => {
            warn!(%parameter, value, default, "invalid value in config, using default");
            default
        }
    }
}

fn finite_or(value: f64, default: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        default
    }
}

fn valid_or(value: f64, default: f64, valid: impl Fn(f64) -> bool) -> f64 {
    if value.is_finite() && valid(value) {
        value
    } else {
        default
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
    pub client_id: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "127.0.0.1".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
            client_id: "changeover-controller".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub changeover: ConfigInput,
    pub network: NetworkConfig,
    pub http_port: u16,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            changeover: ConfigInput::default(),
            network: NetworkConfig::default(),
            http_port: 8080,
        }
    }
}
