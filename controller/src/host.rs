use std::{
    collections::HashMap,
    io::ErrorKind,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::Context;
use axum::{
    extract::{Path as UrlPath, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::Serialize;
use tokio::{
    net::TcpListener,
    sync::{mpsc, Mutex},
};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use climate_common::{
    climate_state_topic, topic, Climate, ClimateStatus, CommandOutcome, ControllerConfig,
    GroupAddress, HvacOperationMode, Precondition, SendError, Telegram, TOPIC_READ_REQUEST,
    TOPIC_TELEGRAM_IN, TOPIC_TELEGRAM_OUT,
};

const MAX_MQTT_PAYLOAD_BYTES: usize = 512;

#[derive(Clone)]
struct Device {
    name: String,
    climate: Arc<Mutex<Climate>>,
}

#[derive(Clone)]
struct AppState {
    devices: Arc<Vec<Device>>,
    mqtt: AsyncClient,
    prefix: Arc<String>,
}

impl AppState {
    fn device(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|device| device.name == name)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct ReadRequest {
    address: GroupAddress,
}

#[derive(Debug, Serialize)]
struct StatePayload {
    #[serde(flatten)]
    status: ClimateStatus,
    #[serde(rename = "updatedAt")]
    updated_at: i64,
}

#[derive(Debug, Serialize)]
struct CommandResponse {
    #[serde(rename = "telegramsSent")]
    telegrams_sent: usize,
    changed: bool,
    status: ClimateStatus,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = std::env::var("CLIMATE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./climate.json"));
    let config = load_config(&config_path)
        .await
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or(config.broker.mqtt_host.clone());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(config.broker.mqtt_port);

    let mut mqtt_options = MqttOptions::new(config.broker.client_id.clone(), mqtt_host, mqtt_port);
    let mqtt_user = std::env::var("MQTT_USER").unwrap_or(config.broker.mqtt_user.clone());
    let mqtt_pass = std::env::var("MQTT_PASS").unwrap_or(config.broker.mqtt_pass.clone());
    if !mqtt_user.is_empty() {
        mqtt_options.set_credentials(mqtt_user, mqtt_pass);
    }

    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<Telegram>();
    let (update_tx, update_rx) = mpsc::unbounded_channel::<usize>();

    let devices = build_devices(&config, &outbound_tx, &update_tx);
    info!("configured {} climate device(s)", devices.len());

    let app_state = AppState {
        devices: Arc::new(devices),
        mqtt,
        prefix: Arc::new(config.topic_prefix.clone()),
    };

    spawn_mqtt_loop(app_state.clone(), eventloop);
    spawn_outbound_loop(app_state.clone(), outbound_rx);
    spawn_state_publish_loop(app_state.clone(), update_rx);

    let app = Router::new()
        .route("/api/climates", get(handle_list_climates))
        .route("/api/climates/{name}", get(handle_get_climate))
        .route("/api/climates/{name}/mode", post(handle_set_mode))
        .route("/api/climates/{name}/comfort", post(handle_set_comfort))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let port = std::env::var("CONTROLLER_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(config.http_port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn load_config(path: &Path) -> anyhow::Result<ControllerConfig> {
    match tokio::fs::read(path).await {
        Ok(raw) => Ok(ControllerConfig::from_json(&raw)?),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            warn!("{} not found, starting without devices", path.display());
            Ok(ControllerConfig::default())
        }
        Err(err) => Err(err.into()),
    }
}

fn build_devices(
    config: &ControllerConfig,
    outbound_tx: &mpsc::UnboundedSender<Telegram>,
    update_tx: &mpsc::UnboundedSender<usize>,
) -> Vec<Device> {
    config
        .devices
        .iter()
        .enumerate()
        .map(|(index, device)| {
            let outbound = outbound_tx.clone();
            let sink =
                move |telegram: Telegram| outbound.send(telegram).map_err(|_| SendError::Closed);

            let updates = update_tx.clone();
            let on_update = move || {
                if updates.send(index).is_err() {
                    debug!("state publisher gone, dropping update for device {index}");
                }
            };

            let climate = Climate::from_config(&device.name, &device.climate, sink, on_update);
            info!("{climate}");
            Device {
                name: device.name.clone(),
                climate: Arc::new(Mutex::new(climate)),
            }
        })
        .collect()
}

fn spawn_mqtt_loop(app_state: AppState, mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        let telegram_topic = topic(&app_state.prefix, TOPIC_TELEGRAM_IN);
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if message.topic != telegram_topic {
                        continue;
                    }
                    if let Err(err) = handle_telegram_message(&app_state, &message.payload).await {
                        warn!("telegram handling error: {err:#}");
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                    let state = app_state.clone();
                    tokio::spawn(async move {
                        if let Err(err) = on_connected(&state).await {
                            warn!("mqtt session setup failed: {err:#}");
                        }
                    });
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

fn spawn_outbound_loop(app_state: AppState, mut outbound_rx: mpsc::UnboundedReceiver<Telegram>) {
    tokio::spawn(async move {
        let out_topic = topic(&app_state.prefix, TOPIC_TELEGRAM_OUT);
        while let Some(telegram) = outbound_rx.recv().await {
            debug!("outbound {telegram}");
            let body = match serde_json::to_vec(&telegram) {
                Ok(body) => body,
                Err(err) => {
                    warn!("telegram serialization failed: {err}");
                    continue;
                }
            };
            if let Err(err) = app_state
                .mqtt
                .publish(out_topic.as_str(), QoS::AtLeastOnce, false, body)
                .await
            {
                warn!("telegram publish failed: {err}");
            }
        }
    });
}

fn spawn_state_publish_loop(app_state: AppState, mut update_rx: mpsc::UnboundedReceiver<usize>) {
    tokio::spawn(async move {
        while let Some(index) = update_rx.recv().await {
            let Some(device) = app_state.devices.get(index) else {
                continue;
            };

            let payload = StatePayload {
                status: device.climate.lock().await.status(),
                updated_at: Utc::now().timestamp(),
            };
            let body = match serde_json::to_vec(&payload) {
                Ok(body) => body,
                Err(err) => {
                    warn!("climate state serialization failed: {err}");
                    continue;
                }
            };

            let state_topic = climate_state_topic(&app_state.prefix, &device.name);
            if let Err(err) = app_state
                .mqtt
                .publish(state_topic, QoS::AtLeastOnce, true, body)
                .await
            {
                warn!("climate state publish failed: {err}");
            }
        }
    });
}

async fn handle_telegram_message(app_state: &AppState, payload: &[u8]) -> anyhow::Result<()> {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized telegram payload ({} bytes)",
            payload.len()
        );
        return Ok(());
    }

    let telegram: Telegram = serde_json::from_slice(payload).context("malformed telegram json")?;
    debug!("inbound {telegram}");

    for device in app_state.devices.iter() {
        let mut climate = device.climate.lock().await;
        if !climate.has_group_address(telegram.group_address) {
            continue;
        }
        match climate.process(&telegram) {
            Ok(changes) => debug!(device = %device.name, "{changes} change(s) from {telegram}"),
            Err(err) => warn!(device = %device.name, "{err}"),
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
enum SessionRequest {
    Subscribe(String),
    Publish { topic: String, body: Vec<u8> },
}

// Clean sessions drop subscriptions, so every ConnAck subscribes again
// before asking the bus for current state.
async fn session_requests(
    devices: &[Device],
    prefix: &str,
) -> anyhow::Result<Vec<SessionRequest>> {
    let mut requests = vec![SessionRequest::Subscribe(topic(prefix, TOPIC_TELEGRAM_IN))];
    let read_topic = topic(prefix, TOPIC_READ_REQUEST);
    for device in devices {
        let addresses = device.climate.lock().await.state_addresses();
        for address in addresses {
            requests.push(SessionRequest::Publish {
                topic: read_topic.clone(),
                body: serde_json::to_vec(&ReadRequest { address })?,
            });
        }
    }
    Ok(requests)
}

async fn on_connected(app_state: &AppState) -> anyhow::Result<()> {
    for request in session_requests(&app_state.devices, &app_state.prefix).await? {
        match request {
            SessionRequest::Subscribe(topic) => app_state
                .mqtt
                .subscribe(topic.as_str(), QoS::AtMostOnce)
                .await
                .with_context(|| format!("failed to subscribe to {topic}"))?,
            SessionRequest::Publish { topic, body } => app_state
                .mqtt
                .publish(topic, QoS::AtLeastOnce, false, body)
                .await
                .context("failed to publish state read request")?,
        }
    }
    Ok(())
}

async fn handle_list_climates(State(state): State<AppState>) -> impl IntoResponse {
    let mut statuses = Vec::with_capacity(state.devices.len());
    for device in state.devices.iter() {
        statuses.push(device.climate.lock().await.status());
    }
    Json(statuses)
}

async fn handle_get_climate(
    State(state): State<AppState>,
    UrlPath(name): UrlPath<String>,
) -> impl IntoResponse {
    let Some(device) = state.device(&name) else {
        return error_response(StatusCode::NOT_FOUND, "Unknown climate device");
    };
    let status = device.climate.lock().await.status();
    Json(status).into_response()
}

async fn handle_set_mode(
    State(state): State<AppState>,
    UrlPath(name): UrlPath<String>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let Ok(mode) = value.parse::<HvacOperationMode>() else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid operation mode");
    };
    let Some(device) = state.device(&name) else {
        return error_response(StatusCode::NOT_FOUND, "Unknown climate device");
    };

    let mut climate = device.climate.lock().await;
    if !climate.get_supported_operation_modes().contains(&mode) {
        return error_response(
            StatusCode::CONFLICT,
            "Operation mode not supported by this device",
        );
    }
    match climate.set_operation_mode(mode) {
        Ok(outcome) => command_response(outcome, climate.status()),
        Err(err) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    }
}

async fn handle_set_comfort(
    State(state): State<AppState>,
    UrlPath(name): UrlPath<String>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let Ok(target) = value.parse::<f32>() else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid temperature");
    };
    if !target.is_finite() {
        return error_response(StatusCode::BAD_REQUEST, "Invalid temperature");
    }
    let Some(device) = state.device(&name) else {
        return error_response(StatusCode::NOT_FOUND, "Unknown climate device");
    };

    let mut climate = device.climate.lock().await;
    match climate.set_target_temperature_comfort(target) {
        Ok(outcome) => command_response(outcome, climate.status()),
        Err(err) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    }
}

fn command_response(outcome: CommandOutcome, status: ClimateStatus) -> axum::response::Response {
    match outcome {
        CommandOutcome::Applied {
            telegrams_sent,
            changed,
        } => Json(CommandResponse {
            telegrams_sent,
            changed,
            status,
        })
        .into_response(),
        CommandOutcome::Unsupported => error_response(
            StatusCode::CONFLICT,
            "Operation mode is not configured for this device",
        ),
        CommandOutcome::PreconditionFailed(precondition) => {
            error_response(StatusCode::CONFLICT, precondition_message(precondition))
        }
    }
}

fn precondition_message(precondition: Precondition) -> &'static str {
    match precondition {
        Precondition::SetpointUnknown => "Setpoint temperature not known yet",
        Precondition::SetpointShiftUnknown => "Setpoint shift not known yet",
        Precondition::SetpointShiftNotWritable => "Setpoint shift has no write address",
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
