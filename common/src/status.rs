use serde::Serialize;

use crate::{error::ValidationError, evaluator::Evaluation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFill {
    Red,
    Yellow,
    Blue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusShape {
    Dot,
    Ring,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub fill: StatusFill,
    pub shape: StatusShape,
    pub text: String,
}

impl Status {
    pub fn idle() -> Self {
        Self {
            fill: StatusFill::Blue,
            shape: StatusShape::Ring,
            text: "waiting for temperature".to_string(),
        }
    }

    pub fn from_evaluation(evaluation: &Evaluation) -> Self {
        if !evaluation.enabled {
            return Self {
                fill: StatusFill::Red,
                shape: StatusShape::Dot,
                text: "disabled".to_string(),
            };
        }

        let is_heating = match evaluation.state.is_heating() {
            Some(true) => "true",
            Some(false) => "false",
            None => "null",
        };

        Self {
            fill: StatusFill::Blue,
            shape: if evaluation.changed() {
                StatusShape::Dot
            } else {
                StatusShape::Ring
            },
            text: format!(
                "mode: {}, isHeating: {is_heating}",
                evaluation.state.mode.as_str()
            ),
        }
    }

    pub fn rejected(error: &ValidationError) -> Self {
        let fill = match error {
            ValidationError::UnknownParameter(_) => StatusFill::Yellow,
            _ => StatusFill::Red,
        };
        Self {
            fill,
            shape: StatusShape::Ring,
            text: error.to_string(),
        }
    }
}
