use tracing::{debug, info};

use crate::{
    clock::{Clock, SystemClock},
    command::Command,
    config::{ChangeoverConfig, ConfigInput, ConfigView},
    error::ValidationError,
    evaluator::{evaluate, Evaluation},
    params::ParameterStore,
    status::Status,
    types::{ControllerState, Diagnostics, Output},
};

#[derive(Debug, Clone)]
pub struct Controller<C = SystemClock> {
    params: ParameterStore,
    state: ControllerState,
    clock: C,
    status: Status,
    last_evaluation: Option<Evaluation>,
}

impl Controller<SystemClock> {
    pub fn new(input: &ConfigInput) -> Self {
        Self::with_clock(input, SystemClock)
    }
}

impl<C: Clock> Controller<C> {
    pub fn with_clock(input: &ConfigInput, clock: C) -> Self {
        Self {
            params: ParameterStore::new(input),
            state: ControllerState::default(),
            clock,
            status: Status::idle(),
            last_evaluation: None,
        }
    }

    pub fn config(&self) -> &ChangeoverConfig {
        self.params.config()
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn last_evaluation(&self) -> Option<&Evaluation> {
        self.last_evaluation.as_ref()
    }

    pub fn get_config(&self) -> ConfigView {
        self.params.config().view()
    }

    pub fn snapshot(&self) -> Diagnostics {
        let config = self.params.config();
        Diagnostics {
            mode: self.state.mode,
            is_heating: self.state.is_heating(),
            setpoint: config.setpoint,
            temperature: self.state.last_temperature,
            enabled: config.enabled,
        }
    }

    pub fn handle(
        &mut self,
        input: impl Into<Command>,
    ) -> Result<Option<Output>, ValidationError> {
        let now = self.clock.now_secs();
        self.accept_command(input.into(), now)
    }

    pub fn accept_sample(
        &mut self,
        value: f64,
        now: f64,
    ) -> Result<Option<Output>, ValidationError> {
        if !value.is_finite() {
            return Err(self.reject(ValidationError::InvalidTemperature));
        }
        Ok(self.run(Some(value), now))
    }

    pub fn accept_command(
        &mut self,
        command: Command,
        now: f64,
    ) -> Result<Option<Output>, ValidationError> {
        match command {
            Command::SetTemperature(value) => self.accept_sample(value, now),
            Command::SetParameter(parameter, value) => {
                let change = self
                    .params
                    .set_parameter(parameter, value)
                    .map_err(|err| self.reject(err))?;
                info!(controller = %self.config().name, "{change}");
                Ok(self.run(self.state.last_temperature, now))
            }
            Command::SetEnabled(enabled) => {
                if self.params.set_enabled(enabled) {
                    info!(controller = %self.config().name, enabled, "enable changed");
                }
                Ok(self.run(self.state.last_temperature, now))
            }
        }
    }

    /// Restores the constructed configuration and re-evaluates. The decision
    /// state and its timers are kept.
    pub fn reset_parameters(&mut self, now: f64) -> Option<Output> {
        self.params.reset();
        self.run(self.state.last_temperature, now)
    }

    fn run(&mut self, temperature: Option<f64>, now: f64) -> Option<Output> {
        let evaluation = evaluate(self.params.config(), &self.state, temperature, now);

        if evaluation.changed() {
            info!(
                controller = %self.config().name,
                from = self.state.mode.as_str(),
                to = evaluation.state.mode.as_str(),
                temperature = ?temperature,
                "mode changed"
            );
        } else {
            debug!(
                controller = %self.config().name,
                mode = evaluation.state.mode.as_str(),
                can_switch_mode = evaluation.can_switch_mode,
                can_turn_off = evaluation.can_turn_off,
                "mode unchanged"
            );
        }

        self.state = evaluation.state;
        self.status = Status::from_evaluation(&evaluation);
        let output = evaluation.output.clone();
        self.last_evaluation = Some(evaluation);
        output
    }

    fn reject(&mut self, error: ValidationError) -> ValidationError {
        debug!(controller = %self.config().name, %error, "input rejected");
        self.status = Status::rejected(&error);
        error
    }
}
