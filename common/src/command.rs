use serde::{Deserialize, Serialize};

use crate::{error::ValidationError, params::Parameter};

pub const CONTEXT_ENABLE: &str = "enable";
pub const CONTEXT_TEMPERATURE: &str = "temperature";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SetTemperature(f64),
    SetParameter(Parameter, f64),
    SetEnabled(bool),
}

impl Command {
    pub fn from_context(context: &str, payload: &str) -> Result<Self, ValidationError> {
        let payload = payload.trim();

        if context == CONTEXT_ENABLE {
            return parse_bool(payload)
                .map(Command::SetEnabled)
                .ok_or(ValidationError::InvalidEnable);
        }

        if context == CONTEXT_TEMPERATURE {
            return payload
                .parse::<f64>()
                .map(Command::SetTemperature)
                .map_err(|_| ValidationError::InvalidTemperature);
        }

        let parameter = context.parse::<Parameter>()?;
        let value = payload
            .parse::<f64>()
            .map_err(|_| ValidationError::InvalidPayload {
                context: context.to_string(),
                payload: payload.to_string(),
            })?;
        Ok(Command::SetParameter(parameter, value))
    }
}

fn parse_bool(payload: &str) -> Option<bool> {
    if payload.eq_ignore_ascii_case("true") {
        Some(true)
    } else if payload.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InputEvent {
    TemperatureSample { value: f64 },
    SetParameter { name: Parameter, value: f64 },
    SetEnabled { value: bool },
}

impl From<InputEvent> for Command {
    fn from(event: InputEvent) -> Self {
        match event {
            InputEvent::TemperatureSample { value } => Command::SetTemperature(value),
            InputEvent::SetParameter { name, value } => Command::SetParameter(name, value),
            InputEvent::SetEnabled { value } => Command::SetEnabled(value),
        }
    }
}
