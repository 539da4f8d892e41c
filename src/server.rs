//! HTTP boundary for the plant ledger.
//!
//! Exposes ledger operations as JSON endpoints. The caller identity is
//! taken from the `x-caller-id` header; the ledger itself decides whether
//! that caller may perform the operation.
//!
//! # Routes
//!
//! ```text
//! GET  /health
//! POST /plants                     register
//! GET  /plants/:id                 plant view
//! POST /plants/:id/readings        submit a reading
//! POST /plants/:id/transfer        transfer ownership
//! POST /plants/:id/status          activate / deactivate
//! GET  /plants/:id/history         ?limit=N
//! GET  /plants/:id/analytics       ?extended=true
//! GET  /owners/:owner/plants       plants held by an owner
//! ```

use crate::core::analytics::{AnalyticsReport, WindowStatistics};
use crate::core::types::{HealthSnapshot, OwnerId, Plant, PlantId, PlantStatus};
use crate::ledger::{LedgerError, SharedLedger, SubmitOutcome};
use crate::store;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};

/// Header carrying the caller identity.
pub const CALLER_HEADER: &str = "x-caller-id";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Where to persist ledger state after each mutation (none = memory only)
    pub state_path: Option<PathBuf>,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16, state_path: Option<PathBuf>) -> Self {
        Self {
            host: host.into(),
            port,
            state_path,
        }
    }
}

/// Shared server state
pub struct ServerState {
    ledger: SharedLedger,
    state_path: Option<PathBuf>,
    /// Held across snapshot and save so a later save always carries every
    /// mutation an earlier one did.
    persist_lock: Mutex<()>,
}

impl ServerState {
    pub fn new(ledger: SharedLedger, config: &ServerConfig) -> Self {
        Self {
            ledger,
            state_path: config.state_path.clone(),
            persist_lock: Mutex::new(()),
        }
    }

    fn save_now(&self, path: &std::path::Path) -> Result<(), store::StoreError> {
        let _guard = self.persist_lock.lock().unwrap_or_else(PoisonError::into_inner);
        store::save(path, &self.ledger.snapshot())
    }

    /// Persist ledger state off the async workers. Completes before the
    /// response is sent. Failures are logged; the mutation already happened.
    async fn persist(self: &Arc<Self>) {
        let Some(path) = self.state_path.clone() else {
            return;
        };
        let state = Arc::clone(self);
        match tokio::task::spawn_blocking(move || state.save_now(&path)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "failed to persist ledger state"),
            Err(e) => tracing::warn!(error = %e, "persist task failed"),
        }
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn ledger_error(e: LedgerError) -> ApiError {
    let status = match e {
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::NotOwner => StatusCode::FORBIDDEN,
        _ => StatusCode::BAD_REQUEST,
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
            code: e.code().to_string(),
        }),
    )
}

fn body_error(rejection: JsonRejection) -> ApiError {
    (
        rejection.status(),
        Json(ErrorResponse {
            error: rejection.body_text(),
            code: "INVALID_BODY".to_string(),
        }),
    )
}

/// Resolve the caller identity from request headers.
fn caller(headers: &HeaderMap) -> Result<OwnerId, ApiError> {
    headers
        .get(CALLER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| OwnerId::new(v.trim()))
        .filter(|id| !id.is_null())
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: format!("missing or empty {CALLER_HEADER} header"),
                    code: "MISSING_CALLER".to_string(),
                }),
            )
        })
}

/// Reading as submitted over HTTP.
///
/// Percentages are accepted wider than they are stored so that an
/// out-of-range value is reported as a validation error. Any `timestamp`
/// field is ignored; the ledger stamps the reading.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReadingRequest {
    pub soil_moisture: u16,
    pub temperature: i32,
    pub humidity: u16,
    pub ph: u16,
    pub light_intensity: u32,
}

impl ReadingRequest {
    /// Narrow to a snapshot, failing the same way validation would.
    pub fn into_snapshot(self) -> Result<HealthSnapshot, LedgerError> {
        let soil_moisture = u8::try_from(self.soil_moisture)
            .map_err(|_| LedgerError::InvalidMoisture(self.soil_moisture))?;
        let humidity =
            u8::try_from(self.humidity).map_err(|_| LedgerError::InvalidHumidity(self.humidity))?;
        Ok(HealthSnapshot::new(
            soil_moisture,
            self.temperature,
            humidity,
            self.ph,
            self.light_intensity,
        ))
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub plants: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub species: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub id: PlantId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransferRequest {
    pub new_owner: OwnerId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusRequest {
    pub status: PlantStatus,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub plant_id: PlantId,
    pub readings: Vec<HealthSnapshot>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    #[serde(default)]
    pub extended: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyticsResponse {
    pub plant_id: PlantId,
    #[serde(flatten)]
    pub report: AnalyticsReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<WindowStatistics>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OwnedResponse {
    pub owner: OwnerId,
    pub plants: Vec<PlantId>,
}

/// GET /health
async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        plants: state.ledger.total_plants(),
    })
}

/// POST /plants
async fn register(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let owner = caller(&headers)?;
    let Json(request) = body.map_err(body_error)?;
    let id = state
        .ledger
        .register(&request.name, &request.species, &owner)
        .map_err(ledger_error)?;
    state.persist().await;
    Ok((StatusCode::CREATED, Json(RegisterResponse { id })))
}

/// GET /plants/:id
async fn get_plant(State(state): State<Arc<ServerState>>, Path(id): Path<u64>) -> ApiResult<Plant> {
    state.ledger.plant(PlantId(id)).map(Json).map_err(ledger_error)
}

/// POST /plants/:id/readings
async fn submit_reading(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    body: Result<Json<ReadingRequest>, JsonRejection>,
) -> ApiResult<SubmitOutcome> {
    let who = caller(&headers)?;
    let Json(request) = body.map_err(body_error)?;
    let id = PlantId(id);

    let snapshot = match request.into_snapshot() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            // Ownership and status guards still take precedence over range errors.
            state.ledger.check_submit(id, &who).map_err(ledger_error)?;
            return Err(ledger_error(e));
        }
    };

    let outcome = state
        .ledger
        .submit(id, snapshot, &who)
        .map_err(ledger_error)?;
    state.persist().await;
    Ok(Json(outcome))
}

/// POST /plants/:id/transfer
async fn transfer(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> ApiResult<Plant> {
    let who = caller(&headers)?;
    let Json(request) = body.map_err(body_error)?;
    let id = PlantId(id);
    state
        .ledger
        .transfer(id, &request.new_owner, &who)
        .map_err(ledger_error)?;
    state.persist().await;
    state.ledger.plant(id).map(Json).map_err(ledger_error)
}

/// POST /plants/:id/status
async fn set_status(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    body: Result<Json<StatusRequest>, JsonRejection>,
) -> ApiResult<Plant> {
    let who = caller(&headers)?;
    let Json(request) = body.map_err(body_error)?;
    let id = PlantId(id);
    state
        .ledger
        .set_status(id, request.status, &who)
        .map_err(ledger_error)?;
    state.persist().await;
    state.ledger.plant(id).map(Json).map_err(ledger_error)
}

/// GET /plants/:id/history
async fn history(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<u64>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<HistoryResponse> {
    let plant_id = PlantId(id);
    let readings = state
        .ledger
        .history(plant_id, query.limit)
        .map_err(ledger_error)?;
    Ok(Json(HistoryResponse { plant_id, readings }))
}

/// GET /plants/:id/analytics
async fn analytics(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<u64>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<AnalyticsResponse> {
    let plant_id = PlantId(id);
    let report = state.ledger.analyze(plant_id).map_err(ledger_error)?;
    let window = if query.extended {
        Some(state.ledger.window_statistics(plant_id).map_err(ledger_error)?)
    } else {
        None
    };
    Ok(Json(AnalyticsResponse {
        plant_id,
        report,
        window,
    }))
}

/// GET /owners/:owner/plants
async fn owned(State(state): State<Arc<ServerState>>, Path(owner): Path<String>) -> Json<OwnedResponse> {
    let owner = OwnerId::new(owner);
    let plants = state.ledger.owner_set_of(&owner);
    Json(OwnedResponse { owner, plants })
}

/// Build the router over a shared ledger.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/plants", post(register))
        .route("/plants/:id", get(get_plant))
        .route("/plants/:id/readings", post(submit_reading))
        .route("/plants/:id/transfer", post(transfer))
        .route("/plants/:id/status", post(set_status))
        .route("/plants/:id/history", get(history))
        .route("/plants/:id/analytics", get(analytics))
        .route("/owners/:owner/plants", get(owned))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// A running server.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signal shutdown and wait for in-flight requests to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            tracing::error!("Server task failed: {}", e);
        }
    }
}

/// Run the HTTP server
pub async fn run(config: ServerConfig, ledger: SharedLedger) -> anyhow::Result<ServerHandle> {
    let state = Arc::new(ServerState::new(ledger, &config));
    let app = router(state);

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let addr = listener.local_addr()?;

    tracing::info!("Plant ledger server listening on http://{}", addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(ServerHandle {
        addr,
        shutdown_tx,
        task,
    })
}
