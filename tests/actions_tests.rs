mod common;

use std::net::{SocketAddr, SocketAddrV4};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, UdpSocket};

use common::{discovery_with_config, ip, FakeProbe};
use lan_devctl::actions::http::HttpRequestOptions;
use lan_devctl::actions::print::PrintOptions;
use lan_devctl::actions::{ActionOutcome, DeviceAction};
use lan_devctl::types::HostCandidate;
use lan_devctl::{Device, DeviceError, Discovery, DiscoveryConfig};

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    addr
}

async fn loopback_device(config: DiscoveryConfig, ports: &[u16]) -> Arc<Discovery> {
    let discovery = discovery_with_config(Arc::new(FakeProbe::on_lan()), config);
    discovery
        .registry()
        .upsert(Device::from_scan(
            HostCandidate::new(ip("127.0.0.1")),
            ports.iter().copied(),
        ))
        .await;
    discovery
}

#[tokio::test]
async fn print_streams_content_to_the_printer() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let reader = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        sock.read_to_end(&mut buf).await.unwrap();
        buf
    });

    let discovery = loopback_device(DiscoveryConfig::default(), &[9100]).await;
    let options = PrintOptions {
        port,
        form_feed: false,
    };
    let outcome = discovery
        .print_to_device(ip("127.0.0.1"), "Hello from the LAN\n", &options)
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.bytes, 19);
    assert_eq!(reader.await.unwrap(), b"Hello from the LAN\n");
}

#[tokio::test]
async fn print_action_parsed_from_params() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let reader = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        sock.read_to_end(&mut buf).await.unwrap();
        buf
    });

    let discovery = loopback_device(DiscoveryConfig::default(), &[9100, 631]).await;
    let action = DeviceAction::parse(
        "print",
        json!({ "content": "page", "options": { "port": port, "formFeed": true } }),
    )
    .unwrap();
    let outcome = discovery.perform_action(ip("127.0.0.1"), action).await.unwrap();

    assert!(matches!(outcome, ActionOutcome::Print(ref p) if p.bytes == 5));
    assert_eq!(reader.await.unwrap(), b"page\x0c");
}

#[tokio::test]
async fn print_needs_print_capability() {
    let discovery = loopback_device(DiscoveryConfig::default(), &[22]).await;
    let err = discovery
        .print_to_device(ip("127.0.0.1"), "x", &PrintOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DeviceError::MissingCapability { .. }));
    assert_eq!(err.to_string(), "device 127.0.0.1 does not support print");

    let err = discovery
        .print_to_device(ip("10.9.9.9"), "x", &PrintOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DeviceError::DeviceNotFound(_)));
}

type SoapLog = Arc<Mutex<Vec<(String, String, String)>>>;

async fn record_soap(
    State(log): State<SoapLog>,
    uri: axum::http::Uri,
    headers: HeaderMap,
    body: String,
) -> String {
    let action = headers
        .get("soapaction")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    log.lock().unwrap().push((uri.path().to_string(), action, body));
    "<s:Envelope><s:Body><u:GetVolumeResponse xmlns:u=\"urn:schemas-upnp-org:service:RenderingControl:1\">\
     <CurrentVolume>23</CurrentVolume></u:GetVolumeResponse></s:Body></s:Envelope>"
        .to_string()
}

async fn sonos_stub() -> (u16, SoapLog) {
    let log: SoapLog = Arc::default();
    let app = Router::new()
        .route("/MediaRenderer/RenderingControl/Control", post(record_soap))
        .route("/MediaRenderer/AVTransport/Control", post(record_soap))
        .with_state(log.clone());
    (serve(app).await.port(), log)
}

#[tokio::test]
async fn sonos_get_volume_reads_current_volume() {
    let (port, log) = sonos_stub().await;
    let config = DiscoveryConfig {
        sonos_port: port,
        ..DiscoveryConfig::default()
    };
    let discovery = loopback_device(config, &[1400]).await;

    let outcome = discovery
        .control_sonos(ip("127.0.0.1"), "getVolume", &Value::Null)
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.volume, Some(23));

    let log = log.lock().unwrap();
    let (path, action, body) = &log[0];
    assert_eq!(path, "/MediaRenderer/RenderingControl/Control");
    assert_eq!(
        action,
        "\"urn:schemas-upnp-org:service:RenderingControl:1#GetVolume\""
    );
    assert!(body.contains("<Channel>Master</Channel>"));
}

#[tokio::test]
async fn sonos_set_volume_is_clamped_and_play_uses_av_transport() {
    let (port, log) = sonos_stub().await;
    let config = DiscoveryConfig {
        sonos_port: port,
        ..DiscoveryConfig::default()
    };
    let discovery = loopback_device(config, &[1400]).await;

    let outcome = discovery
        .control_sonos(ip("127.0.0.1"), "setVolume", &json!({ "volume": 150 }))
        .await
        .unwrap();
    assert_eq!(outcome.volume, Some(100));

    let play = DeviceAction::parse("sonos", json!({ "action": "play" })).unwrap();
    discovery.perform_action(ip("127.0.0.1"), play).await.unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 2);
    assert!(log[0].2.contains("<DesiredVolume>100</DesiredVolume>"));
    assert_eq!(log[1].0, "/MediaRenderer/AVTransport/Control");
    assert!(log[1].1.ends_with("AVTransport:1#Play\""));
    assert!(log[1].2.contains("<Speed>1</Speed>"));
}

#[tokio::test]
async fn sonos_rejects_unknown_action_and_non_speakers() {
    let discovery = loopback_device(DiscoveryConfig::default(), &[9100]).await;

    let err = discovery
        .control_sonos(ip("127.0.0.1"), "shuffle", &Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, DeviceError::UnknownSonosAction(_)));

    let err = discovery
        .control_sonos(ip("127.0.0.1"), "play", &Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, DeviceError::MissingCapability { .. }));
}

#[tokio::test]
async fn http_passthrough_parses_json_and_text() {
    let app = Router::new()
        .route("/status", get(|| async { Json(json!({ "ok": true, "uptime": 42 })) }))
        .route("/echo", post(|body: String| async move { format!("echo: {body}") }));
    let port = serve(app).await.port();
    let discovery = loopback_device(DiscoveryConfig::default(), &[80]).await;

    let status = discovery
        .http_request(
            ip("127.0.0.1"),
            &HttpRequestOptions {
                port,
                path: "/status".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(status.status, 200);
    assert_eq!(status.data, json!({ "ok": true, "uptime": 42 }));
    assert_eq!(
        status.headers.get("content-type").map(String::as_str),
        Some("application/json")
    );

    let echo = discovery
        .http_request(
            ip("127.0.0.1"),
            &HttpRequestOptions {
                method: "post".into(),
                port,
                path: "echo".into(),
                data: Some(Value::String("hi".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(echo.data, Value::String("echo: hi".into()));
}

#[tokio::test]
async fn http_passthrough_reports_non_success_status() {
    let port = serve(Router::new()).await.port();
    let discovery = loopback_device(DiscoveryConfig::default(), &[80]).await;
    let outcome = discovery
        .http_request(
            ip("127.0.0.1"),
            &HttpRequestOptions {
                port,
                path: "/missing".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.status, 404);
}

#[tokio::test]
async fn wake_device_uses_cached_mac() {
    let rx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let target = match rx.local_addr().unwrap() {
        SocketAddr::V4(v4) => v4,
        SocketAddr::V6(_) => unreachable!(),
    };
    let config = DiscoveryConfig {
        wol_target: SocketAddrV4::new(*target.ip(), target.port()),
        ..DiscoveryConfig::default()
    };
    let discovery = discovery_with_config(Arc::new(FakeProbe::on_lan()), config);

    let mut pc = HostCandidate::new(ip("192.168.1.30"));
    pc.mac = Some("B8:27:EB:12:34:56".into());
    discovery.registry().upsert(Device::from_scan(pc, [22])).await;
    discovery
        .registry()
        .upsert(Device::from_scan(HostCandidate::new(ip("192.168.1.31")), [22]))
        .await;

    let outcome = discovery.wake_device(ip("192.168.1.30")).await.unwrap();
    assert!(outcome.success);

    let mut buf = [0u8; 128];
    let (n, _) = tokio::time::timeout(Duration::from_secs(2), rx.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(n, 102);
    assert_eq!(&buf[..6], &[0xFF; 6]);
    assert_eq!(&buf[6..12], &[0xB8, 0x27, 0xEB, 0x12, 0x34, 0x56]);

    let err = discovery.wake_device(ip("192.168.1.31")).await.unwrap_err();
    assert!(matches!(err, DeviceError::MissingField(_)));
}

#[tokio::test]
async fn ssh_and_cast_are_reported_unsupported() {
    let discovery = loopback_device(DiscoveryConfig::default(), &[22, 8008]).await;

    for (name, params) in [
        ("ssh", json!({ "command": "uptime" })),
        ("cast", json!({ "action": "pause" })),
    ] {
        let action = DeviceAction::parse(name, params).unwrap();
        let err = discovery
            .perform_action(ip("127.0.0.1"), action)
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::Unsupported { .. }), "{name}");
    }
}

#[tokio::test]
async fn scan_and_ping_actions_go_through_the_probe() {
    let probe = Arc::new(
        FakeProbe::on_lan()
            .with_ports("127.0.0.1", &[22, 9100])
            .with_alive("127.0.0.1"),
    );
    let discovery = discovery_with_config(probe, DiscoveryConfig::default());
    discovery
        .registry()
        .upsert(Device::from_scan(HostCandidate::new(ip("127.0.0.1")), [22]))
        .await;

    let scan = discovery
        .perform_action(ip("127.0.0.1"), DeviceAction::Scan)
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(&scan).unwrap(),
        json!({ "success": true, "openPorts": [22, 9100] })
    );

    let ping = discovery
        .perform_action(ip("127.0.0.1"), DeviceAction::Ping)
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(&ping).unwrap(),
        json!({ "success": true, "alive": true, "latency": 2 })
    );
}

async fn slow_endpoint() -> &'static str {
    tokio::time::sleep(Duration::from_secs(3)).await;
    "late"
}

#[tokio::test]
async fn http_passthrough_times_out() {
    let app = Router::new().route("/slow", get(slow_endpoint));
    let port = serve(app).await.port();
    let discovery = loopback_device(DiscoveryConfig::default(), &[80]).await;

    let started = std::time::Instant::now();
    let err = discovery
        .http_request(
            ip("127.0.0.1"),
            &HttpRequestOptions {
                port,
                path: "/slow".into(),
                timeout: Some(100),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DeviceError::Timeout("HTTP request")), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn sonos_call_times_out() {
    let app = Router::new().route("/MediaRenderer/AVTransport/Control", post(slow_endpoint));
    let config = DiscoveryConfig {
        sonos_port: serve(app).await.port(),
        http_timeout: Duration::from_millis(100),
        ..DiscoveryConfig::default()
    };
    let discovery = loopback_device(config, &[1400]).await;

    let err = discovery
        .control_sonos(ip("127.0.0.1"), "pause", &Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, DeviceError::Timeout("Sonos SOAP call")), "{err:?}");
}

#[tokio::test]
async fn print_job_times_out_when_printer_stalls() {
    // Accepts the connection but never reads, so a large job fills the
    // socket buffers and the write stalls.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(sock);
    });

    let config = DiscoveryConfig {
        print_timeout: Duration::from_millis(200),
        ..DiscoveryConfig::default()
    };
    let discovery = loopback_device(config, &[9100]).await;
    let job = "x".repeat(64 * 1024 * 1024);
    let options = PrintOptions {
        port,
        form_feed: false,
    };

    let started = std::time::Instant::now();
    let err = discovery
        .print_to_device(ip("127.0.0.1"), &job, &options)
        .await
        .unwrap_err();
    assert!(matches!(err, DeviceError::Timeout("print job")), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(3));
}
