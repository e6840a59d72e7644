//! HTTP transport for the device registry and the voice assistant
//!
//! Public routes: health and the device status webhook. Every other route
//! needs the caller identity, passed by the fronting auth layer in the
//! `x-user-id` header.

use crate::assistant::{AssistantReply, CommandInput, VoiceAssistant};
use crate::config::{HttpConfig, ScopeMode, ServerConfig};
use crate::error::{HomeError, Result};
use crate::log_structured_error;
use crate::openai::{AssistantBackend, AudioClip};
use crate::registry::dashboard::{DashboardFilter, DashboardView};
use crate::registry::{
    Area, Device, DeviceRegistry, DeviceScope, Location, StoreAreaRequest, StoreDeviceRequest,
    StoreLocationRequest, UpdateDeviceRequest, UserId,
};
use crate::tools::{ToolDispatcher, ToolResult};
use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use url::Url;

/// Header carrying the authenticated user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Application state shared across all HTTP handlers
#[derive(Clone)]
struct AppState {
    registry: DeviceRegistry,
    dispatcher: ToolDispatcher,
    backend: Option<Arc<dyn AssistantBackend>>,
    assistant: Option<VoiceAssistant>,
    scope_mode: ScopeMode,
    public_url: Url,
}

impl AppState {
    fn backend(&self) -> Result<&Arc<dyn AssistantBackend>> {
        self.backend
            .as_ref()
            .ok_or_else(|| HomeError::config("OpenAI API key is not configured."))
    }

    fn assistant(&self) -> Result<&VoiceAssistant> {
        self.assistant
            .as_ref()
            .ok_or_else(|| HomeError::config("OpenAI API key is not configured."))
    }
}

/// Caller identity extracted from `x-user-id`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserId);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = HomeError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| HomeError::unauthenticated("missing x-user-id header"))?;

        header
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<UserId>().ok())
            .map(AuthenticatedUser)
            .ok_or_else(|| HomeError::unauthenticated("malformed x-user-id header"))
    }
}

impl HomeError {
    fn status_code(&self) -> StatusCode {
        match self {
            HomeError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            HomeError::NotFound(_) => StatusCode::NOT_FOUND,
            HomeError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            HomeError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to HTTP clients: the inner message without the variant prefix
    fn client_message(&self) -> String {
        match self {
            HomeError::Config(msg)
            | HomeError::NotFound(msg)
            | HomeError::PermissionDenied(msg)
            | HomeError::Unauthenticated(msg)
            | HomeError::UpstreamTransport(msg)
            | HomeError::Transcription(msg)
            | HomeError::SpeechSynthesis(msg)
            | HomeError::InvalidInput(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for HomeError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if let HomeError::Validation(errors) = self {
            return (
                status,
                Json(json!({
                    "message": "The given data was invalid.",
                    "errors": errors,
                })),
            )
                .into_response();
        }

        if status.is_server_error() {
            log_structured_error!(self, "http_transport", "handle_request");
        } else {
            debug!(status = status.as_u16(), error = %self, "Request rejected");
        }

        (status, Json(json!({ "error": self.client_message() }))).into_response()
    }
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: String,
    assistant: &'static str,
}

/// Device state exposed through the webhook
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct WebhookDevice {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub status: String,
    pub brightness: u8,
    pub location_id: Option<u64>,
    pub area_id: Option<u64>,
    pub updated_at: DateTime<Utc>,
}

impl From<Device> for WebhookDevice {
    fn from(device: Device) -> Self {
        Self {
            id: device.id,
            name: device.name,
            device_type: device.device_type.to_string(),
            status: device.status.to_string(),
            brightness: device.brightness,
            location_id: device.location_id,
            area_id: device.area_id,
            updated_at: device.updated_at,
        }
    }
}

/// Body of `POST /voice/tool`
#[derive(Debug, Deserialize)]
struct ToolRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Body of `POST /voice/command`
#[derive(Debug, Default, Deserialize)]
struct VoiceCommandRequest {
    text: Option<String>,
    /// Base64-encoded recording
    audio: Option<String>,
    /// Recording format, used as file extension (default `webm`)
    audio_format: Option<String>,
}

impl VoiceCommandRequest {
    fn into_input(self) -> Result<CommandInput> {
        let mut errors: HashMap<String, Vec<String>> = HashMap::new();

        let audio = match self.audio.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
            Some(encoded) => match base64::engine::general_purpose::STANDARD.decode(encoded) {
                Ok(bytes) => Some(AudioClip::new(
                    bytes,
                    self.audio_format.as_deref().unwrap_or("webm"),
                )),
                Err(_) => {
                    errors
                        .entry("audio".to_string())
                        .or_default()
                        .push("The audio field must be base64 encoded.".to_string());
                    None
                }
            },
            None => None,
        };

        let text = self.text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        if audio.is_none() && text.is_none() && errors.is_empty() {
            errors
                .entry("text".to_string())
                .or_default()
                .push("The text field is required when audio is not present.".to_string());
        }

        if !errors.is_empty() {
            return Err(HomeError::Validation(errors));
        }
        Ok(CommandInput { text, audio })
    }
}

/// HTTP transport server
pub struct HttpTransportServer {
    state: Arc<AppState>,
    config: HttpConfig,
}

impl HttpTransportServer {
    /// Create the server. Without a backend the voice session and command
    /// routes answer with a configuration error; everything else works.
    pub fn new(
        config: &ServerConfig,
        registry: DeviceRegistry,
        backend: Option<Arc<dyn AssistantBackend>>,
    ) -> Self {
        let dispatcher = ToolDispatcher::new(registry.clone());
        let assistant = backend.as_ref().map(|backend| {
            VoiceAssistant::new(backend.clone(), dispatcher.clone(), config.assistant.clone())
        });

        let state = AppState {
            registry,
            dispatcher,
            backend,
            assistant,
            scope_mode: config.assistant.scope,
            public_url: config.http.public_url.clone(),
        };

        Self {
            state: Arc::new(state),
            config: config.http.clone(),
        }
    }

    /// Build the router with all endpoints
    pub fn router(&self) -> Router {
        let public_routes = Router::new()
            .route("/health", get(health_check))
            .route("/webhooks/devices/:token", get(device_webhook));

        let protected_routes = Router::new()
            .route("/dashboard", get(dashboard))
            .route("/devices", post(store_device))
            .route("/devices/:id", patch(update_device).delete(destroy_device))
            .route("/areas", post(store_area))
            .route("/locations", post(store_location))
            .route("/voice/session", post(create_session))
            .route("/voice/tool", post(execute_tool))
            .route("/voice/command", post(voice_command));

        let app = Router::new()
            .merge(public_routes)
            .merge(protected_routes)
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            app.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
        } else {
            app
        }
    }

    /// Bind and serve until ctrl-c
    pub async fn start(&self) -> Result<()> {
        let app = self.router();
        let address = format!("{}:{}", self.config.host, self.config.port);

        let listener = TcpListener::bind(&address).await.map_err(|e| {
            HomeError::config(format!("Failed to bind to {address}: {e}"))
        })?;

        info!("HTTP server listening on {address}");
        info!("Health check: http://{address}/health");
        if self.state.backend.is_none() {
            warn!("Voice session and command routes disabled: OpenAI API key is not configured");
        }

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    debug!("Health check requested");

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
        assistant: if state.backend.is_some() {
            "configured"
        } else {
            "unconfigured"
        },
    })
}

async fn device_webhook(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<WebhookDevice>> {
    let device = state.registry.device_by_webhook_token(&token).await?;
    Ok(Json(device.into()))
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Query(filter): Query<DashboardFilter>,
) -> Json<DashboardView> {
    Json(
        state
            .registry
            .dashboard(user_id, &filter, &state.public_url)
            .await,
    )
}

async fn store_device(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(request): Json<StoreDeviceRequest>,
) -> Result<(StatusCode, Json<Device>)> {
    let device = state.registry.create_device(user_id, request).await?;
    Ok((StatusCode::CREATED, Json(device)))
}

async fn update_device(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<u64>,
    Json(request): Json<UpdateDeviceRequest>,
) -> Result<Json<Device>> {
    let device = state.registry.update_device(user_id, id, request).await?;
    Ok(Json(device))
}

async fn destroy_device(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<u64>,
) -> Result<StatusCode> {
    state.registry.hide_device(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn store_area(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(request): Json<StoreAreaRequest>,
) -> Result<(StatusCode, Json<Area>)> {
    let area = state.registry.create_area(user_id, request).await?;
    Ok((StatusCode::CREATED, Json(area)))
}

async fn store_location(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(request): Json<StoreLocationRequest>,
) -> Result<(StatusCode, Json<Location>)> {
    let location = state.registry.create_location(user_id, request).await?;
    Ok((StatusCode::CREATED, Json(location)))
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<Value>> {
    debug!(user_id, "Realtime session requested");
    let session = state.backend()?.create_realtime_session().await?;
    Ok(Json(session))
}

async fn execute_tool(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(request): Json<ToolRequest>,
) -> Result<Json<ToolResult>> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(HomeError::validation("name", "The name field is required."));
    }
    if !matches!(request.arguments, Value::Null | Value::Object(_)) {
        return Err(HomeError::validation(
            "arguments",
            "The arguments field must be an object.",
        ));
    }

    let scope = DeviceScope::for_caller(state.scope_mode, user_id);
    let result = state
        .dispatcher
        .dispatch(scope, name, request.arguments)
        .await;
    Ok(Json(result))
}

async fn voice_command(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(request): Json<VoiceCommandRequest>,
) -> Result<Json<AssistantReply>> {
    let assistant = state.assistant()?;
    let input = request.into_input()?;
    let reply = assistant.process_command(user_id, input).await?;
    Ok(Json(reply))
}
