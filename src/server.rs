use crate::catalog::DEFAULT_CATALOG;
use crate::commands::Dispatcher;
use crate::config::Config;
use crate::coordinator::{Coordinator, Health};
use crate::error::{CommandError, MonitorError, Result};
use crate::sensors::{self, SensorState};
use crate::snapshot::Snapshot;
use crate::transport::{DeviceApi, HttpTransport};
use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use futures::{future, Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Everything the HTTP handlers share.
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub dispatcher: Arc<Dispatcher>,
    /// Ends open event streams when the server shuts down
    pub shutdown: CancellationToken,
}

impl AppState {
    #[must_use]
    pub fn new(
        coordinator: Arc<Coordinator>,
        dispatcher: Arc<Dispatcher>,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            coordinator,
            dispatcher,
            shutdown,
        })
    }

    /// Wire a coordinator over the default catalog and a dispatcher to `device`.
    #[must_use]
    pub fn from_device(
        device: Arc<dyn DeviceApi>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        let coordinator = Arc::new(Coordinator::new(
            Arc::clone(&device),
            DEFAULT_CATALOG,
            interval,
        ));
        let dispatcher = Arc::new(Dispatcher::new(device, Arc::clone(&coordinator)));
        Self::new(coordinator, dispatcher, shutdown)
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<CommandError> for ApiError {
    fn from(error: CommandError) -> Self {
        let status = match &error {
            CommandError::Validation(_) => StatusCode::BAD_REQUEST,
            CommandError::UnknownCommand(_) => StatusCode::NOT_FOUND,
            CommandError::Transport(_) => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, error.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub cycle: u64,
    pub fetched_at: Option<DateTime<Utc>>,
    pub degraded_sources: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub command: String,
    pub response: Value,
}

/// The latest snapshot, per-source errors included.
pub async fn get_snapshot(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = state.coordinator.snapshot();
    Json(&*snapshot).into_response()
}

pub async fn get_sensors(State(state): State<Arc<AppState>>) -> Json<Vec<SensorState>> {
    Json(sensors::read_all(&state.coordinator.snapshot()))
}

/// # Errors
///
/// Responds 404 when no metric has this key.
pub async fn get_sensor(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> std::result::Result<Json<SensorState>, ApiError> {
    let spec = sensors::find(&key)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("Unknown sensor: {key}")))?;
    Ok(Json(SensorState::new(spec, &state.coordinator.snapshot())))
}

pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<Health> {
    Json(state.coordinator.health())
}

/// Run a cycle now, or join the one in flight.
///
/// # Errors
///
/// Responds 503 when every source failed.
pub async fn post_refresh(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<RefreshResponse>, ApiError> {
    let snapshot = state.coordinator.refresh_now().await.map_err(|e| {
        ApiError::new(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
    })?;

    Ok(Json(RefreshResponse {
        cycle: snapshot.cycle,
        fetched_at: snapshot.fetched_at,
        degraded_sources: snapshot
            .degraded_sources()
            .into_iter()
            .map(str::to_string)
            .collect(),
    }))
}

/// Execute a write command with an optional JSON argument object.
///
/// # Errors
///
/// Responds 400 on invalid arguments, 404 on an unknown command and 502 when
/// the device call fails.
pub async fn post_command(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Option<Json<Value>>,
) -> std::result::Result<Json<CommandResponse>, ApiError> {
    let args = body.map_or(Value::Null, |Json(args)| args);
    let response = state.dispatcher.dispatch(&name, &args).await?;

    Ok(Json(CommandResponse {
        command: name,
        response,
    }))
}

fn json_event<T: Serialize>(name: &str, data: &T) -> Event {
    match Event::default().event(name).json_data(data) {
        Ok(event) => event,
        Err(e) => {
            error!("Failed to serialize {name} event for SSE: {e}");
            Event::default().event(name).data("Error")
        }
    }
}

/// Sensor values, pushed every time a new snapshot is installed.
pub async fn sensor_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let stream = WatchStream::new(state.coordinator.subscribe())
        .map(|snapshot: Arc<Snapshot>| Ok(json_event("sensors", &sensors::read_all(&snapshot))))
        .take_until(state.shutdown.clone().cancelled_owned());

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Integration health, pushed on every cycle outcome.
pub async fn health_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let stream = WatchStream::new(state.coordinator.subscribe_health())
        .map(|health: Health| Ok(json_event("health", &health)))
        .take_until(state.shutdown.clone().cancelled_owned());

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Command notifications as they are fired.
pub async fn notification_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.dispatcher.subscribe())
        .filter_map(|received| {
            future::ready(match received {
                Ok(notification) => Some(Ok(json_event(notification.event, &notification))),
                Err(e) => {
                    warn!("Notification stream lagged: {e}");
                    None
                }
            })
        })
        .take_until(state.shutdown.clone().cancelled_owned());

    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/snapshot", get(get_snapshot))
        .route("/api/sensors", get(get_sensors))
        .route("/api/sensors/:key", get(get_sensor))
        .route("/api/health", get(get_health))
        .route("/api/health/stream", get(health_stream))
        .route("/api/refresh", post(post_refresh))
        .route("/api/commands/:name", post(post_command))
        .route("/api/stream", get(sensor_stream))
        .route("/api/events", get(notification_stream))
        .with_state(state)
}

/// Run the monitor: poll the router and serve the HTTP surface on `listen_port`.
///
/// # Errors
///
/// Returns an error if:
/// - The configuration is invalid or the HTTP client cannot be built
/// - The listen address cannot be parsed or bound
/// - The server fails while running
pub async fn run(config: Config, cancel_token: CancellationToken) -> Result<()> {
    info!("Initializing monitor for router at {}", config.host);
    config.validate()?;

    let device: Arc<dyn DeviceApi> = Arc::new(HttpTransport::from_config(&config)?);
    let state = AppState::from_device(device, config.scan_interval(), cancel_token.clone());

    let addr = format!("0.0.0.0:{}", config.listen_port);
    let address: SocketAddr = addr.parse()?;
    info!("Binding server to address: {address}");

    let listener = TcpListener::bind(address)
        .await
        .map_err(MonitorError::Server)?;

    serve(listener, state, cancel_token).await
}

/// Start the polling loop and serve the routes on an already bound listener
/// until `cancel_token` fires.
///
/// # Errors
///
/// Returns an error if the server fails while running.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    cancel_token: CancellationToken,
) -> Result<()> {
    let poll_interval = state.coordinator.interval();
    let poller = tokio::spawn({
        let coordinator = Arc::clone(&state.coordinator);
        let cancel_token = cancel_token.clone();
        async move { coordinator.run(cancel_token).await }
    });

    let app = router(state);
    debug!("Routes configured");

    let stop_polling = cancel_token.clone();

    if let Ok(addr) = listener.local_addr() {
        info!(
            "Monitor listening on: http://{addr}, polling every {}s",
            poll_interval.as_secs()
        );
    }

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel_token.cancelled().await })
        .await;

    stop_polling.cancel();
    if let Err(e) = poller.await {
        error!("Polling task ended abnormally: {e}");
    }

    if let Err(e) = served {
        return Err(MonitorError::Generic(format!("Server error: {e}")));
    }

    info!("Server shutdown complete");
    Ok(())
}

