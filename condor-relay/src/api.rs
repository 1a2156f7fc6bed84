//! REST control API

use crate::bridge::BridgeState;
use crate::config::network_problems;
use crate::error::BridgeError;
use crate::state::AppState;
use crate::stats::Statistics;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use condor_core::model::CONVERTIBLE_FIELDS;
use condor_core::{ConversionSettings, FieldCategory, NetworkConfig};
use serde::Serialize;
use tower_http::cors::CorsLayer;

type ApiError = (StatusCode, String);

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/statistics", get(get_statistics))
        .route("/api/settings", get(get_settings).put(put_settings))
        .route("/api/network", get(get_network).put(put_network))
        .route("/api/start", post(start_relay))
        .route("/api/stop", post(stop_relay))
        .route("/api/fields", get(list_fields))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// === Status Endpoints ===

#[derive(Serialize)]
struct StatusResponse {
    state: BridgeState,
    /// Inbound socket address while running
    listen_addr: Option<String>,
    /// Network config the next start will use
    network: NetworkConfig,
    /// Network config of the current or most recent run
    active_network: Option<NetworkConfig>,
    settings: ConversionSettings,
    statistics: Statistics,
}

async fn status_of(state: &AppState) -> StatusResponse {
    let network = state.config.read().await.network.clone();
    let bridge = &state.bridge;
    StatusResponse {
        state: bridge.state(),
        listen_addr: bridge.local_addr().map(|addr| addr.to_string()),
        network,
        active_network: bridge.network(),
        settings: bridge.settings(),
        statistics: bridge.statistics(),
    }
}

async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(status_of(&state).await)
}

async fn get_statistics(State(state): State<AppState>) -> Json<Statistics> {
    Json(state.bridge.statistics())
}

// === Settings Endpoints ===

async fn get_settings(State(state): State<AppState>) -> Json<ConversionSettings> {
    Json(state.bridge.settings())
}

async fn put_settings(
    State(state): State<AppState>,
    Json(settings): Json<ConversionSettings>,
) -> Json<ConversionSettings> {
    {
        // Bridge and config change under the same lock.
        let mut config = state.config.write().await;
        state.bridge.update_settings(settings);
        config.conversions = settings;
    }
    state.persist().await;
    Json(settings)
}

// === Network Endpoints ===

async fn get_network(State(state): State<AppState>) -> Json<NetworkConfig> {
    Json(state.config.read().await.network.clone())
}

async fn put_network(
    State(state): State<AppState>,
    Json(network): Json<NetworkConfig>,
) -> Result<Json<NetworkConfig>, ApiError> {
    if matches!(
        state.bridge.state(),
        BridgeState::Starting | BridgeState::Running | BridgeState::Stopping
    ) {
        return Err((
            StatusCode::CONFLICT,
            "Stop the relay before changing network settings".to_string(),
        ));
    }

    let problems = network_problems(&network);
    if !problems.is_empty() {
        return Err((StatusCode::UNPROCESSABLE_ENTITY, problems.join("; ")));
    }

    state.config.write().await.network = network.clone();
    state.persist().await;
    tracing::info!(
        "Network settings updated: {}:{} -> {}:{}",
        network.bind_host,
        network.input_port,
        network.output_host,
        network.output_port
    );
    Ok(Json(network))
}

// === Lifecycle Endpoints ===

async fn start_relay(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let network = state.config.read().await.network.clone();

    state.bridge.start(network).await.map_err(|e| match e {
        BridgeError::AlreadyRunning => (StatusCode::CONFLICT, e.to_string()),
        _ => (StatusCode::BAD_GATEWAY, e.to_string()),
    })?;

    Ok(Json(status_of(&state).await))
}

async fn stop_relay(State(state): State<AppState>) -> Json<StatusResponse> {
    state.bridge.stop().await;
    Json(status_of(&state).await)
}

// === Field Table ===

#[derive(Serialize)]
struct FieldInfo {
    name: &'static str,
    category: FieldCategory,
    /// Unit the field is currently emitted in
    unit: &'static str,
    converted: bool,
}

async fn list_fields(State(state): State<AppState>) -> Json<Vec<FieldInfo>> {
    let settings = state.bridge.settings();
    // Defaults are the simulator's native units.
    let native = ConversionSettings::default();

    let fields: Vec<FieldInfo> = CONVERTIBLE_FIELDS
        .iter()
        .filter_map(|&(name, category)| {
            let source = native.target_for(category)?;
            let active = settings.active_target(category);
            Some(FieldInfo {
                name,
                category,
                unit: active.unwrap_or(source).symbol(),
                converted: active.is_some(),
            })
        })
        .collect();

    Json(fields)
}
