use std::{
    collections::HashMap, io::ErrorKind, net::SocketAddr, path::PathBuf, sync::Arc,
    time::Duration,
};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::Serialize;
use tokio::{
    net::TcpListener,
    sync::{mpsc, Mutex},
};
use tracing::{info, warn};

use changeover_common::{
    command::{CONTEXT_ENABLE, CONTEXT_TEMPERATURE},
    command_context, Command, ConfigView, Controller, Diagnostics, Output, RuntimeConfig, Status,
    Thresholds, ValidationError, TOPIC_CMD_WILDCARD, TOPIC_DIAGNOSTICS, TOPIC_MODE,
    TOPIC_SENSOR_TEMP,
};

const MAX_MQTT_PAYLOAD_BYTES: usize = 512;

#[derive(Clone)]
struct AppState {
    // Every event for the controller goes through this lock.
    controller: Arc<Mutex<Controller>>,
    outbox: mpsc::UnboundedSender<Publication>,
}

#[derive(Debug)]
struct Publication {
    topic: &'static str,
    retain: bool,
    body: Vec<u8>,
}

struct AppStore {
    runtime_path: PathBuf,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct StatusView {
    status: Status,
    #[serde(rename = "heatingThreshold")]
    heating_threshold: f64,
    #[serde(rename = "coolingThreshold")]
    cooling_threshold: f64,
    #[serde(rename = "canSwitchMode")]
    can_switch_mode: Option<bool>,
    #[serde(rename = "canTurnOff")]
    can_turn_off: Option<bool>,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = AppStore::new();
    let runtime = store.load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config from store: {err:#}");
        RuntimeConfig::default()
    });

    let controller = Controller::new(&runtime.changeover);
    info!(config = ?controller.get_config(), "changeover controller configured");

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or(runtime.network.mqtt_host.clone());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(runtime.network.mqtt_port);

    let mut mqtt_options =
        MqttOptions::new(runtime.network.client_id.clone(), mqtt_host, mqtt_port);
    let mqtt_user = std::env::var("MQTT_USER").unwrap_or(runtime.network.mqtt_user.clone());
    let mqtt_pass = std::env::var("MQTT_PASS").unwrap_or(runtime.network.mqtt_pass.clone());
    if !mqtt_user.is_empty() {
        mqtt_options.set_credentials(mqtt_user, mqtt_pass);
    }

    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);
    let (outbox, publications) = mpsc::unbounded_channel();

    let app_state = AppState {
        controller: Arc::new(Mutex::new(controller)),
        outbox,
    };

    subscribe_topics(&mqtt).await?;
    spawn_publish_loop(mqtt, publications);
    spawn_mqtt_loop(app_state.clone(), eventloop);

    let app = Router::new()
        .route("/api/config", get(handle_get_config))
        .route("/api/diagnostics", get(handle_get_diagnostics))
        .route("/api/status", get(handle_get_status))
        .route("/api/temperature", post(handle_post_temperature))
        .route("/api/parameter", post(handle_post_parameter))
        .route("/api/enable", post(handle_post_enable))
        .with_state(app_state);

    let port = std::env::var("CONTROLLER_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(runtime.http_port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn subscribe_topics(mqtt: &AsyncClient) -> anyhow::Result<()> {
    for topic in [TOPIC_SENSOR_TEMP, TOPIC_CMD_WILDCARD] {
        mqtt.subscribe(topic, QoS::AtMostOnce)
            .await
            .with_context(|| format!("failed to subscribe to {topic}"))?;
    }
    Ok(())
}

fn spawn_mqtt_loop(app_state: AppState, mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if let Err(err) =
                        handle_mqtt_message(&app_state, &message.topic, message.payload.to_vec())
                            .await
                    {
                        warn!("mqtt message handling error: {err:#}");
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

/// Maps a bus message to a command. `None` means the topic is not ours.
fn parse_message(topic: &str, message: &str) -> Option<Result<Command, ValidationError>> {
    if topic == TOPIC_SENSOR_TEMP {
        return Some(Command::from_context(CONTEXT_TEMPERATURE, message));
    }
    command_context(topic).map(|context| Command::from_context(context, message))
}

async fn handle_mqtt_message(
    app_state: &AppState,
    topic: &str,
    payload: Vec<u8>,
) -> anyhow::Result<()> {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return Ok(());
    }

    let message = String::from_utf8(payload).context("non utf8 mqtt payload")?;

    let command = match parse_message(topic, &message) {
        Some(Ok(command)) => command,
        Some(Err(err)) => {
            warn!("rejected message on {topic}: {err}");
            return Ok(());
        }
        None => return Ok(()),
    };

    if let Err(err) = apply_command(app_state, command).await {
        warn!("rejected message on {topic}: {err}");
    }
    Ok(())
}

async fn apply_command(
    app_state: &AppState,
    command: Command,
) -> Result<Option<Output>, ValidationError> {
    let mut controller = app_state.controller.lock().await;
    let result = controller.handle(command);

    // Queued under the lock so retained mode signals keep event order; the
    // publish itself happens in the publish loop, never while locked.
    if let Ok(Some(output)) = &result {
        for publication in publications(output) {
            if app_state.outbox.send(publication).is_err() {
                warn!("publish loop stopped, dropping controller output");
            }
        }
    }
    result
}

fn publications(output: &Output) -> Vec<Publication> {
    let mut queued = Vec::with_capacity(2);

    match serde_json::to_vec(&output.signal) {
        Ok(body) => queued.push(Publication {
            topic: TOPIC_MODE,
            retain: true,
            body,
        }),
        Err(err) => warn!("mode signal serialization failed: {err}"),
    }

    match serde_json::to_vec(&output.diagnostics) {
        Ok(body) => queued.push(Publication {
            topic: TOPIC_DIAGNOSTICS,
            retain: false,
            body,
        }),
        Err(err) => warn!("diagnostics serialization failed: {err}"),
    }

    queued
}

fn spawn_publish_loop(mqtt: AsyncClient, mut publications: mpsc::UnboundedReceiver<Publication>) {
    tokio::spawn(async move {
        while let Some(publication) = publications.recv().await {
            if let Err(err) = mqtt
                .publish(
                    publication.topic,
                    QoS::AtLeastOnce,
                    publication.retain,
                    publication.body,
                )
                .await
            {
                warn!("{} publish failed: {err}", publication.topic);
            }
        }
    });
}

async fn handle_get_config(State(state): State<AppState>) -> Json<ConfigView> {
    let controller = state.controller.lock().await;
    Json(controller.get_config())
}

async fn handle_get_diagnostics(State(state): State<AppState>) -> Json<Diagnostics> {
    let controller = state.controller.lock().await;
    Json(controller.snapshot())
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let controller = state.controller.lock().await;
    let thresholds = Thresholds::from_config(controller.config());
    let evaluation = controller.last_evaluation();

    Json(StatusView {
        status: controller.status().clone(),
        heating_threshold: thresholds.heating,
        cooling_threshold: thresholds.cooling,
        can_switch_mode: evaluation.map(|evaluation| evaluation.can_switch_mode),
        can_turn_off: evaluation.map(|evaluation| evaluation.can_turn_off),
    })
}

async fn handle_post_temperature(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    apply_and_respond(state, Command::from_context(CONTEXT_TEMPERATURE, value)).await
}

async fn handle_post_parameter(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let Some(name) = params.get("name") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'name' parameter");
    };
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    if name == CONTEXT_ENABLE || name == CONTEXT_TEMPERATURE {
        return error_response(StatusCode::BAD_REQUEST, "Use /api/enable or /api/temperature");
    }
    apply_and_respond(state, Command::from_context(name, value)).await
}

async fn handle_post_enable(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    apply_and_respond(state, Command::from_context(CONTEXT_ENABLE, value)).await
}

async fn apply_and_respond(
    state: AppState,
    command: Result<Command, ValidationError>,
) -> axum::response::Response {
    let command = match command {
        Ok(command) => command,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };

    if let Err(err) = apply_command(&state, command).await {
        return error_response(StatusCode::BAD_REQUEST, &err.to_string());
    }

    handle_get_diagnostics(State(state)).await.into_response()
}

impl AppStore {
    fn new() -> Self {
        let data_dir = std::env::var("CHANGEOVER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.changeover"));

        Self {
            runtime_path: data_dir.join("runtime.json"),
        }
    }

    async fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        match tokio::fs::read(&self.runtime_path).await {
            Ok(raw) => serde_json::from_slice::<RuntimeConfig>(&raw).with_context(|| {
                format!("malformed runtime config {}", self.runtime_path.display())
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use changeover_common::{ConfigInput, Parameter};
    use serde_json::json;
    use tokio::time::timeout;

    use super::*;

    fn unlocked_input() -> ConfigInput {
        ConfigInput {
            swap_time: Some(0.0),
            min_cycle_time: Some(0.0),
            ..ConfigInput::default()
        }
    }

    fn test_state(input: &ConfigInput) -> (AppState, mpsc::UnboundedReceiver<Publication>) {
        let (outbox, publications) = mpsc::unbounded_channel();
        let state = AppState {
            controller: Arc::new(Mutex::new(Controller::new(input))),
            outbox,
        };
        (state, publications)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn transition_queues_mode_signal_then_diagnostics() {
        let (state, mut publications) = test_state(&unlocked_input());

        apply_command(&state, Command::SetTemperature(18.0))
            .await
            .unwrap();

        let signal = publications.try_recv().unwrap();
        assert_eq!(signal.topic, TOPIC_MODE);
        assert!(signal.retain);
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(&signal.body).unwrap(),
            json!({ "isHeating": true })
        );

        let diagnostics = publications.try_recv().unwrap();
        assert_eq!(diagnostics.topic, TOPIC_DIAGNOSTICS);
        assert!(!diagnostics.retain);
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(&diagnostics.body).unwrap(),
            json!({
                "mode": "heating",
                "isHeating": true,
                "setpoint": 22.0,
                "temperature": 18.0,
                "enabled": true,
            })
        );

        apply_command(&state, Command::SetTemperature(18.0))
            .await
            .unwrap();
        assert!(publications.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_mqtt_queue_does_not_hold_the_controller() {
        let (mqtt, _eventloop) =
            AsyncClient::new(MqttOptions::new("changeover-test", "127.0.0.1", 1883), 2);
        let (state, publications) = test_state(&unlocked_input());
        spawn_publish_loop(mqtt, publications);

        for temperature in [18.0, 26.0, 18.0, 26.0, 18.0, 26.0] {
            let applied = timeout(
                Duration::from_millis(500),
                apply_command(&state, Command::SetTemperature(temperature)),
            )
            .await;
            assert!(matches!(applied, Ok(Ok(Some(_)))));
        }

        let locked = timeout(Duration::from_millis(500), state.controller.lock()).await;
        assert!(locked.is_ok());
    }

    #[tokio::test]
    async fn rejected_parameter_is_a_bad_request() {
        let (state, mut publications) = test_state(&ConfigInput::default());

        let response = apply_and_respond(state, Command::from_context("setpoint", "99")).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "invalid setpoint: 99 outside [10, 30]" })
        );
        assert!(publications.try_recv().is_err());
    }

    #[tokio::test]
    async fn unparsable_payload_is_a_bad_request() {
        let (state, _publications) = test_state(&ConfigInput::default());

        let response = apply_and_respond(state, Command::from_context("enable", "maybe")).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "error": "invalid enable" }));
    }

    #[tokio::test]
    async fn accepted_command_returns_diagnostics() {
        let (state, _publications) = test_state(&unlocked_input());

        let response =
            apply_and_respond(state, Command::from_context("temperature", "26")).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["mode"], "cooling");
        assert_eq!(body["isHeating"], false);
    }

    #[test]
    fn routes_sensor_and_command_topics() {
        assert_eq!(
            parse_message(TOPIC_SENSOR_TEMP, "19.25"),
            Some(Ok(Command::SetTemperature(19.25)))
        );
        assert_eq!(
            parse_message("changeover/cmnd/deadband", "1.5"),
            Some(Ok(Command::SetParameter(Parameter::Deadband, 1.5)))
        );
        assert_eq!(
            parse_message("changeover/cmnd/enable", "false"),
            Some(Ok(Command::SetEnabled(false)))
        );
        assert_eq!(parse_message(TOPIC_MODE, "{}"), None);
    }

    #[test]
    fn reports_bad_payloads() {
        assert_eq!(
            parse_message(TOPIC_SENSOR_TEMP, "warm"),
            Some(Err(ValidationError::InvalidTemperature))
        );
        assert_eq!(
            parse_message("changeover/cmnd/humidity", "40"),
            Some(Err(ValidationError::UnknownParameter("humidity".to_string())))
        );
    }

    #[test]
    fn runtime_config_reads_partial_json() {
        let runtime: RuntimeConfig = serde_json::from_str(
            r#"{"changeover":{"setpoint":21,"swapTime":600},"network":{"mqtt_host":"broker"}}"#,
        )
        .unwrap();

        assert_eq!(runtime.changeover.setpoint, Some(21.0));
        assert_eq!(runtime.changeover.swap_time, Some(600.0));
        assert_eq!(runtime.network.mqtt_host, "broker");
        assert_eq!(runtime.network.mqtt_port, 1883);
        assert_eq!(runtime.http_port, 8080);
    }
}
