use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Off,
    Heating,
    Cooling,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Heating => "heating",
            Self::Cooling => "cooling",
        }
    }

    pub fn is_heating(self) -> Option<bool> {
        match self {
            Self::Off => None,
            Self::Heating => Some(true),
            Self::Cooling => Some(false),
        }
    }

    pub fn is_active(self) -> bool {
        self != Self::Off
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControllerState {
    pub mode: Mode,
    pub last_mode_change_time: f64,
    pub last_cycle_start_time: f64,
    pub last_temperature: Option<f64>,
}

impl ControllerState {
    pub fn is_heating(&self) -> Option<bool> {
        self.mode.is_heating()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModeSignal {
    #[serde(rename = "isHeating")]
    pub is_heating: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub mode: Mode,
    #[serde(rename = "isHeating")]
    pub is_heating: Option<bool>,
    pub setpoint: f64,
    pub temperature: Option<f64>,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Output {
    pub signal: ModeSignal,
    pub diagnostics: Diagnostics,
}
