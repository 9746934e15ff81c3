pub mod clock;
pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod evaluator;
pub mod params;
pub mod status;
pub mod topics;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{Command, InputEvent};
pub use config::{ChangeoverConfig, ConfigInput, ConfigView, NetworkConfig, RuntimeConfig};
pub use controller::Controller;
pub use error::ValidationError;
pub use evaluator::{evaluate, Evaluation, Thresholds};
pub use params::{Parameter, ParameterChange, ParameterStore};
pub use status::{Status, StatusFill, StatusShape};
pub use topics::*;
pub use types::{ControllerState, Diagnostics, Mode, ModeSignal, Output};
