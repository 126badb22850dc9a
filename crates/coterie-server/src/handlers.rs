//! HTTP handlers for the Coterie server.
//!
//! Join and admin-elevation endpoints issue session tokens; room and
//! message administration delegates to the store; the WebSocket upgrade
//! and the embedded client UI are served from the same router.

use anyhow::Result;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header::AUTHORIZATION, header::CONTENT_TYPE, Request},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::auth::{extract_bearer_token, SessionKeys};
use crate::config::Config;
use crate::error::ApiError;
use crate::metrics;
use crate::ws;
use coterie_core::{validate_slug, ReadOnlyRooms, Registry, UserIdentity};
use coterie_protocol::{ServerEvent, UserInfo};
use coterie_store::Store;

/// Shared server state.
pub struct AppState {
    /// Durable rooms and message history.
    pub store: Store,
    /// Connection/room table for the realtime gateway.
    pub registry: Registry,
    /// Session token signing keys.
    pub sessions: SessionKeys,
    /// Configured read-only room set.
    pub readonly: ReadOnlyRooms,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config, store: Store) -> Self {
        Self {
            registry: Registry::new(),
            sessions: SessionKeys::new(&config.session_secret),
            readonly: config.readonly_rooms(),
            store,
            config,
        }
    }
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the store or listener fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let store = Store::connect(&config.database_url).await?;
    store.seed_default_rooms().await?;

    let state = Arc::new(AppState::new(config.clone(), store));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let app = router(state);

    // Bind and serve
    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr).await?;

    info!("Coterie server listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the application router.
fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/admin", post(upgrade_admin))
        .route("/api/rooms", get(list_rooms).post(create_room))
        .route("/api/messages/:id", delete(delete_message))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/", get(index))
        .route("/app.js", get(app_js))
        .route("/health", get(health))
        .route("/api/join", post(join))
        .route("/ws", get(ws::ws_handler))
        .merge(protected)
        .with_state(state)
}

/// Session-validation middleware for the protected routes.
///
/// Stores the verified identity in request extensions.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(extract_bearer_token);

    let Some(token) = token else {
        return ApiError::Unauthorized.into_response();
    };

    match state.sessions.verify(token) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(_) => ApiError::Unauthorized.into_response(),
    }
}

/// Health check handler.
async fn health() -> impl IntoResponse {
    Json(json!({
        "ok": true,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinRequest {
    #[serde(default)]
    invite_code: String,
    #[serde(default)]
    display_name: String,
}

/// Exchange the invite code for a fresh session.
async fn join(
    State(state): State<Arc<AppState>>,
    Json(body): Json<JoinRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.invite_code.trim().is_empty() || body.display_name.trim().is_empty() {
        return Err(ApiError::MissingFields);
    }
    if body.invite_code != state.config.invite_code {
        return Err(ApiError::InvalidInviteCode);
    }

    let user = UserIdentity::new(Uuid::new_v4().to_string(), &body.display_name, false);
    let token = state.sessions.issue(&user)?;

    debug!(user = %user.display_name, "Member joined");

    Ok(Json(json!({
        "ok": true,
        "token": token,
        "user": UserInfo::from(user),
        "siteName": state.config.site_name,
        "readonlyRooms": state.readonly.slugs(),
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdminRequest {
    #[serde(default)]
    admin_code: String,
}

/// Elevate the current session to admin.
///
/// Elevation is bound to the re-issued token only; a fresh join always
/// starts non-admin.
async fn upgrade_admin(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<UserIdentity>,
    Json(body): Json<AdminRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.admin_code != state.config.admin_code {
        return Err(ApiError::InvalidAdminCode);
    }

    let elevated = UserIdentity {
        is_admin: true,
        ..user
    };
    let token = state.sessions.issue(&elevated)?;

    debug!(user = %elevated.display_name, "Session elevated to admin");

    Ok(Json(json!({
        "ok": true,
        "token": token,
        "user": UserInfo::from(elevated),
    })))
}

/// List all rooms with the read-only set.
async fn list_rooms(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<UserIdentity>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rooms = state.store.list_rooms().await?;

    Ok(Json(json!({
        "ok": true,
        "rooms": rooms,
        "readonlyRooms": state.readonly.slugs(),
    })))
}

#[derive(Debug, Deserialize)]
struct CreateRoomRequest {
    #[serde(default)]
    slug: String,
    #[serde(default)]
    name: String,
}

/// Create a room (admin only).
async fn create_room(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<UserIdentity>,
    Json(body): Json<CreateRoomRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !user.is_admin {
        return Err(ApiError::Forbidden);
    }
    if body.slug.trim().is_empty() || body.name.trim().is_empty() {
        return Err(ApiError::MissingFields);
    }
    validate_slug(&body.slug).map_err(|msg| ApiError::BadRequest(msg.to_string()))?;

    let room = state.store.create_room(&body.slug, &body.name).await?;
    info!(room = %room.slug, "Room created");

    Ok(Json(json!({ "ok": true, "room": room })))
}

/// Delete a message (admin only) and notify every connected client.
async fn delete_message(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<UserIdentity>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !user.is_admin {
        return Err(ApiError::Forbidden);
    }

    state.store.delete_message(&id).await?;

    // Clients in any room may still be rendering the message
    let count = state
        .registry
        .broadcast_all(ServerEvent::message_deleted(&id));
    debug!(message = %id, recipients = count, "Message deleted");

    Ok(Json(json!({ "ok": true })))
}

/// Client UI entry point.
async fn index() -> Html<&'static str> {
    Html(include_str!("../assets/index.html"))
}

/// Client UI script.
async fn app_js() -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "application/javascript; charset=utf-8")],
        include_str!("../assets/app.js"),
    )
}
