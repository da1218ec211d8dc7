use std::net::IpAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

use crate::actions::http::HttpRequestOptions;
use crate::actions::print::PrintOptions;
use crate::actions::sonos::SonosAction;
use crate::actions::{DeviceAction, AVAILABLE_ACTIONS};
use crate::discovery::{Discovery, DiscoveryOptions};
use crate::error::DeviceError;
use crate::ports;
use crate::types::{Capability, Device, DeviceType};

#[derive(Clone)]
pub struct AppState {
    discovery: Arc<Discovery>,
}

impl AppState {
    pub fn new(discovery: Arc<Discovery>) -> Self {
        Self { discovery }
    }
}

impl IntoResponse for DeviceError {
    fn into_response(self) -> Response {
        let status = match &self {
            DeviceError::InvalidMac(_)
            | DeviceError::MissingField(_)
            | DeviceError::MissingCapability { .. }
            | DeviceError::UnknownAction(_)
            | DeviceError::UnknownSonosAction(_)
            | DeviceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            DeviceError::DeviceNotFound(_) => StatusCode::NOT_FOUND,
            DeviceError::ScanInProgress => StatusCode::CONFLICT,
            DeviceError::Unsupported { .. } => StatusCode::NOT_IMPLEMENTED,
            DeviceError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            DeviceError::NoInterface | DeviceError::Io(_) | DeviceError::Http(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = match &self {
            DeviceError::Unsupported { note, .. } => {
                json!({ "success": false, "error": self.to_string(), "note": note })
            }
            DeviceError::UnknownSonosAction(_) => json!({
                "success": false,
                "error": self.to_string(),
                "availableActions": SonosAction::NAMES,
            }),
            _ => json!({ "success": false, "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult = std::result::Result<Json<Value>, DeviceError>;

/// Build the API router. Routes are nested under `/api/network`.
pub fn router(discovery: Arc<Discovery>) -> Router {
    let api = Router::new()
        .route("/discover", get(get_discover))
        .route("/quick-scan", get(get_quick_scan))
        .route("/devices", get(get_devices))
        .route("/devices/{ip}", get(get_device))
        .route("/devices/{ip}/action", post(post_device_action))
        .route("/devices/type/{device_type}", get(get_devices_by_type))
        .route("/devices/capability/{capability}", get(get_devices_by_capability))
        .route("/info", get(get_info))
        .route("/wake", post(post_wake))
        .route("/print", post(post_print))
        .route("/sonos", post(post_sonos))
        .route("/http", post(post_http))
        .with_state(AppState::new(discovery));

    Router::new().nest("/api/network", api).layer(
        ServiceBuilder::new()
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            )
            .layer(SetResponseHeaderLayer::if_not_present(
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-store"),
            )),
    )
}

/// Serve the API on `bind` until Ctrl+C.
pub async fn spawn_server(bind: &str, discovery: Arc<Discovery>) -> Result<()> {
    let app = router(discovery.clone());
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("serving device API on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
            discovery.shutdown();
        })
        .await?;
    Ok(())
}

fn parse_ip(raw: &str) -> Result<IpAddr, DeviceError> {
    raw.trim()
        .parse()
        .map_err(|_| DeviceError::InvalidRequest(format!("invalid IP address: {raw}")))
}

fn device_list(devices: Vec<Device>) -> Value {
    json!({ "success": true, "count": devices.len(), "devices": devices })
}

#[derive(Debug, Default, Deserialize)]
struct DiscoverQuery {
    sweep: Option<bool>,
    /// Same syntax as a ports file line: `22,80,8000-8010`.
    ports: Option<String>,
}

async fn get_discover(State(app): State<AppState>, Query(q): Query<DiscoverQuery>) -> ApiResult {
    let ports = match q.ports.as_deref() {
        Some(raw) => Some(
            ports::parse_ports_str(raw)
                .map_err(|e| DeviceError::InvalidRequest(format!("{e:#}")))?,
        ),
        None => None,
    };
    let opts = DiscoveryOptions {
        ports: ports.filter(|p| !p.is_empty()),
        sweep: q.sweep.unwrap_or(false),
    };

    let report = app.discovery.discover(opts).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Found {} devices on the network", report.count),
        "network": report.network,
        "devices": report.devices,
        "count": report.count,
        "duration": report.duration,
    })))
}

async fn get_quick_scan(State(app): State<AppState>) -> ApiResult {
    Ok(Json(device_list(app.discovery.quick_scan().await)))
}

async fn get_devices(State(app): State<AppState>) -> ApiResult {
    Ok(Json(device_list(app.discovery.cached_devices().await)))
}

async fn get_device(State(app): State<AppState>, Path(ip): Path<String>) -> Response {
    let ip = match parse_ip(&ip) {
        Ok(ip) => ip,
        Err(e) => return e.into_response(),
    };
    match app.discovery.lookup_or_scan(ip).await {
        Some(device) => Json(json!({ "success": true, "device": device })).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "error": "Device not found or offline" })),
        )
            .into_response(),
    }
}

async fn get_info(State(app): State<AppState>) -> ApiResult {
    Ok(Json(json!({ "success": true, "networks": app.discovery.network_info() })))
}

async fn get_devices_by_type(
    State(app): State<AppState>,
    Path(device_type): Path<String>,
) -> ApiResult {
    let devices = match device_type.parse::<DeviceType>() {
        Ok(t) => app.discovery.registry().by_type(t).await,
        Err(_) => Vec::new(),
    };
    let mut body = device_list(devices);
    body["type"] = json!(device_type);
    Ok(Json(body))
}

async fn get_devices_by_capability(
    State(app): State<AppState>,
    Path(capability): Path<String>,
) -> ApiResult {
    let devices = match capability.parse::<Capability>() {
        Ok(c) => app.discovery.registry().by_capability(c).await,
        Err(_) => Vec::new(),
    };
    let mut body = device_list(devices);
    body["capability"] = json!(capability);
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
struct WakeRequest {
    mac: Option<String>,
    ip: Option<String>,
}

async fn post_wake(State(app): State<AppState>, Json(req): Json<WakeRequest>) -> ApiResult {
    let mut mac = req.mac.filter(|m| !m.trim().is_empty());
    if mac.is_none() {
        if let Some(ip) = req.ip.as_deref() {
            let ip = parse_ip(ip)?;
            mac = app
                .discovery
                .device(ip)
                .await
                .and_then(|d| d.mac().map(str::to_string));
        }
    }
    let mac = mac.ok_or(DeviceError::MissingField("MAC address (or IP of a known device)"))?;
    let outcome = app.discovery.wake_on_lan(&mac).await?;
    Ok(Json(json!(outcome)))
}

#[derive(Debug, Deserialize)]
struct PrintRequest {
    ip: Option<String>,
    content: Option<String>,
    #[serde(default)]
    options: Option<PrintOptions>,
}

async fn post_print(State(app): State<AppState>, Json(req): Json<PrintRequest>) -> ApiResult {
    let (Some(ip), Some(content)) = (req.ip, req.content.filter(|c| !c.is_empty())) else {
        return Err(DeviceError::MissingField("ip and content"));
    };
    let ip = parse_ip(&ip)?;
    let options = req.options.unwrap_or_default();
    let outcome = app.discovery.print_to_device(ip, &content, &options).await?;
    Ok(Json(json!(outcome)))
}

#[derive(Debug, Deserialize)]
struct SonosRequest {
    ip: Option<String>,
    action: Option<String>,
    #[serde(default)]
    params: Value,
}

async fn post_sonos(State(app): State<AppState>, Json(req): Json<SonosRequest>) -> ApiResult {
    let (Some(ip), Some(action)) = (req.ip, req.action) else {
        return Err(DeviceError::MissingField("ip and action"));
    };
    let ip = parse_ip(&ip)?;
    let outcome = app.discovery.control_sonos(ip, &action, &req.params).await?;
    Ok(Json(json!(outcome)))
}

#[derive(Debug, Deserialize)]
struct HttpProxyRequest {
    ip: Option<String>,
    #[serde(flatten)]
    options: HttpRequestOptions,
}

async fn post_http(State(app): State<AppState>, Json(req): Json<HttpProxyRequest>) -> ApiResult {
    let ip = req.ip.ok_or(DeviceError::MissingField("ip"))?;
    let ip = parse_ip(&ip)?;
    let outcome = app.discovery.http_request(ip, &req.options).await?;
    Ok(Json(json!(outcome)))
}

#[derive(Debug, Deserialize)]
struct ActionRequest {
    action: Option<String>,
    #[serde(default)]
    params: Value,
}

async fn post_device_action(
    State(app): State<AppState>,
    Path(ip): Path<String>,
    Json(req): Json<ActionRequest>,
) -> Response {
    let ip = match parse_ip(&ip) {
        Ok(ip) => ip,
        Err(e) => return e.into_response(),
    };
    if app.discovery.device(ip).await.is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "error": "Device not found. Run discovery first." })),
        )
            .into_response();
    }

    let name = req.action.unwrap_or_default();
    let action = match DeviceAction::parse(&name, req.params) {
        Ok(a) => a,
        Err(DeviceError::UnknownAction(a)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "success": false,
                    "error": format!("Unknown action: {a}"),
                    "availableActions": AVAILABLE_ACTIONS,
                })),
            )
                .into_response();
        }
        Err(e) => return e.into_response(),
    };

    match app.discovery.perform_action(ip, action).await {
        Ok(outcome) => Json(json!(outcome)).into_response(),
        Err(e) => e.into_response(),
    }
}
