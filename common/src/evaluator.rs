use crate::{
    config::ChangeoverConfig,
    types::{ControllerState, Diagnostics, Mode, ModeSignal, Output},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub heating: f64,
    pub cooling: f64,
}

impl Thresholds {
    pub fn from_config(config: &ChangeoverConfig) -> Self {
        let half_band = config.deadband / 2.0;
        Self {
            heating: config.setpoint - half_band - config.anticipator,
            cooling: config.setpoint + half_band + config.anticipator,
        }
    }

    pub fn contains(&self, temperature: f64) -> bool {
        (self.heating..=self.cooling).contains(&temperature)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub state: ControllerState,
    pub output: Option<Output>,
    pub thresholds: Thresholds,
    pub can_switch_mode: bool,
    pub can_turn_off: bool,
    pub enabled: bool,
}

impl Evaluation {
    pub fn changed(&self) -> bool {
        self.output.is_some()
    }
}

/// `temperature` is `None` until the first sample arrives; in that case only
/// the disable override can move the mode.
pub fn evaluate(
    config: &ChangeoverConfig,
    state: &ControllerState,
    temperature: Option<f64>,
    now: f64,
) -> Evaluation {
    let thresholds = Thresholds::from_config(config);
    let can_switch_mode = now - state.last_mode_change_time >= config.swap_time;
    let can_turn_off = now - state.last_cycle_start_time >= config.min_cycle_time;

    let target = if !config.enabled {
        // Overrides both lockouts.
        Mode::Off
    } else {
        match temperature {
            Some(t) if t < thresholds.heating && can_switch_mode => Mode::Heating,
            Some(t) if t > thresholds.cooling && can_switch_mode => Mode::Cooling,
            Some(t) if can_turn_off && thresholds.contains(t) => Mode::Off,
            _ => state.mode,
        }
    };

    let mut next = ControllerState {
        last_temperature: temperature,
        ..*state
    };

    let output = if target != state.mode {
        next.mode = target;
        next.last_mode_change_time = now;
        // Entering Off leaves the cycle clock alone, including a disable-driven Off.
        if target.is_active() {
            next.last_cycle_start_time = now;
        }
        Some(Output {
            signal: ModeSignal {
                is_heating: target.is_heating(),
            },
            diagnostics: Diagnostics {
                mode: target,
                is_heating: target.is_heating(),
                setpoint: config.setpoint,
                temperature,
                enabled: config.enabled,
            },
        })
    } else {
        None
    };

    Evaluation {
        state: next,
        output,
        thresholds,
        can_switch_mode,
        can_turn_off,
        enabled: config.enabled,
    }
}
