mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{discovery_with, FakeProbe};
use lan_devctl::server::router;

fn printer_lan() -> Router {
    let probe = FakeProbe::on_lan()
        .with_arp_table("? (192.168.1.10) at aa:bb:cc:00:11:22 [ether] on eth0\n")
        .with_ports("192.168.1.10", &[9100]);
    router(discovery_with(Arc::new(probe)))
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(b) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn discover_then_list_and_filter() {
    let app = printer_lan();

    let (status, body) = call(&app, "GET", "/api/network/devices", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);

    let (status, body) = call(&app, "GET", "/api/network/discover", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 1);
    assert_eq!(body["network"]["subnet"], "192.168.1.0/24");
    let device = &body["devices"][0];
    assert_eq!(device["ip"], "192.168.1.10");
    assert_eq!(device["type"], "printer");
    assert_eq!(device["openPorts"], json!([9100]));
    assert_eq!(device["capabilities"], json!(["print"]));
    assert_eq!(device["vendor"], Value::Null);

    let (_, body) = call(&app, "GET", "/api/network/devices/type/printer", None).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["type"], "printer");

    let (_, body) = call(&app, "GET", "/api/network/devices/type/camera", None).await;
    assert_eq!(body["count"], 0);

    let (_, body) = call(&app, "GET", "/api/network/devices/capability/PRINT", None).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["capability"], "PRINT");

    let (status, body) = call(&app, "GET", "/api/network/devices/capability/teleport", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn discover_accepts_port_override() {
    let app = printer_lan();

    let (status, body) = call(&app, "GET", "/api/network/discover?ports=22,80", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);

    let (status, body) = call(&app, "GET", "/api/network/discover?ports=notaport", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn single_device_lookup() {
    let app = printer_lan();
    call(&app, "GET", "/api/network/discover", None).await;

    let (status, body) = call(&app, "GET", "/api/network/devices/192.168.1.10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["device"]["type"], "printer");

    let (status, body) = call(&app, "GET", "/api/network/devices/192.168.1.99", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, _) = call(&app, "GET", "/api/network/devices/not-an-ip", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn device_actions_are_routed_and_validated() {
    let app = printer_lan();

    let (status, body) = call(
        &app,
        "POST",
        "/api/network/devices/192.168.1.10/action",
        Some(json!({ "action": "scan" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Device not found. Run discovery first.");

    call(&app, "GET", "/api/network/discover", None).await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/network/devices/192.168.1.10/action",
        Some(json!({ "action": "scan" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["openPorts"], json!([9100]));

    let (status, body) = call(
        &app,
        "POST",
        "/api/network/devices/192.168.1.10/action",
        Some(json!({ "action": "reboot" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["availableActions"],
        json!(["wake", "print", "sonos", "http", "ping", "scan"])
    );

    let (status, body) = call(
        &app,
        "POST",
        "/api/network/devices/192.168.1.10/action",
        Some(json!({ "action": "sonos", "params": { "action": "play" } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = call(
        &app,
        "POST",
        "/api/network/devices/192.168.1.10/action",
        Some(json!({ "action": "sonos", "params": { "action": "shuffle" } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unknown Sonos action: shuffle");
    assert_eq!(body["availableActions"][0], "play");
    assert_eq!(body["availableActions"].as_array().unwrap().len(), 7);

    let (status, body) = call(
        &app,
        "POST",
        "/api/network/devices/192.168.1.10/action",
        Some(json!({ "action": "ssh", "params": { "command": "ls" } })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert!(body["note"].is_string());
}

#[tokio::test]
async fn wake_validates_input() {
    let app = printer_lan();

    let (status, body) = call(&app, "POST", "/api/network/wake", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = call(&app, "POST", "/api/network/wake", Some(json!({ "mac": "nope" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid MAC address: nope");

    // A known IP without a learned MAC cannot be woken either.
    let (status, _) = call(
        &app,
        "POST",
        "/api/network/wake",
        Some(json!({ "ip": "192.168.1.77" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn print_and_sonos_endpoints_check_fields_and_capabilities() {
    let app = printer_lan();
    call(&app, "GET", "/api/network/discover", None).await;

    let (status, _) = call(&app, "POST", "/api/network/print", Some(json!({ "ip": "192.168.1.10" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &app,
        "POST",
        "/api/network/sonos",
        Some(json!({ "ip": "192.168.1.10", "action": "dance" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unknown Sonos action: dance");
    assert_eq!(
        body["availableActions"],
        json!(["play", "pause", "stop", "next", "previous", "setVolume", "getVolume"])
    );

    let (status, body) = call(
        &app,
        "POST",
        "/api/network/sonos",
        Some(json!({ "ip": "192.168.1.10", "action": "pause" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "device 192.168.1.10 does not support sonos");

    let (status, _) = call(&app, "POST", "/api/network/http", Some(json!({ "path": "/" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn info_lists_interfaces_and_responses_are_not_cached() {
    let app = printer_lan();
    let request = Request::builder()
        .uri("/api/network/info")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");

    let (_, body) = call(&app, "GET", "/api/network/info", None).await;
    assert_eq!(body["networks"][0]["interface"], "eth0");
    assert_eq!(body["networks"][0]["address"], "192.168.1.5");
}

#[tokio::test]
async fn slow_device_maps_to_gateway_timeout() {
    let slow = Router::new().route(
        "/slow",
        axum::routing::get(|| async {
            tokio::time::sleep(std::time::Duration::from_secs(3)).await;
            "late"
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move { axum::serve(listener, slow).await.unwrap() });

    let app = printer_lan();
    let (status, body) = call(
        &app,
        "POST",
        "/api/network/http",
        Some(json!({ "ip": "127.0.0.1", "port": port, "path": "/slow", "timeout": 100 })),
    )
    .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"], "HTTP request timed out");
}
