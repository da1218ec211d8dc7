//! Device-specific control operations.
//!
//! Each dispatcher builds its payload with a pure function (magic packet,
//! SOAP envelope, URL) and keeps the socket work separate.

pub mod http;
pub mod print;
pub mod sonos;
pub mod wol;

use std::net::IpAddr;

use serde::Serialize;
use serde_json::Value;

use crate::error::{DeviceError, Result};
use crate::types::PingResult;

use self::http::{HttpOutcome, HttpRequestOptions};
use self::print::{PrintOptions, PrintOutcome};
use self::sonos::{SonosAction, SonosOutcome};
use self::wol::WakeOutcome;

/// Action names accepted by the capability-routed endpoint.
pub const AVAILABLE_ACTIONS: &[&str] = &["wake", "print", "sonos", "http", "ping", "scan"];

/// An action addressed to one cached device.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceAction {
    Wake,
    Print { content: String, options: PrintOptions },
    Sonos(SonosAction),
    Http(HttpRequestOptions),
    Ping,
    Scan,
    /// Remote command execution. Not implemented.
    Ssh { command: String },
    /// Google Cast control. Not implemented.
    Cast { action: String },
}

impl DeviceAction {
    /// Build an action from its name and free-form params.
    ///
    /// Input problems (unknown name, missing content) are reported here,
    /// before any I/O.
    pub fn parse(name: &str, params: Value) -> Result<Self> {
        let action = match name {
            "wake" => DeviceAction::Wake,
            "print" => {
                let content = params
                    .get("content")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .ok_or(DeviceError::MissingField("content"))?
                    .to_string();
                let options = match params.get("options") {
                    Some(v) if !v.is_null() => serde_json::from_value(v.clone())
                        .map_err(|e| DeviceError::InvalidRequest(format!("print options: {e}")))?,
                    _ => PrintOptions::default(),
                };
                DeviceAction::Print { content, options }
            }
            "sonos" => {
                let sonos_action = params
                    .get("action")
                    .and_then(Value::as_str)
                    .ok_or(DeviceError::MissingField("sonos action"))?;
                DeviceAction::Sonos(SonosAction::parse(sonos_action, &params)?)
            }
            "http" => {
                let opts = if params.is_null() {
                    HttpRequestOptions::default()
                } else {
                    serde_json::from_value(params)
                        .map_err(|e| DeviceError::InvalidRequest(format!("http options: {e}")))?
                };
                DeviceAction::Http(opts)
            }
            "ping" => DeviceAction::Ping,
            "scan" => DeviceAction::Scan,
            "ssh" => DeviceAction::Ssh {
                command: str_param(&params, "command"),
            },
            "cast" => DeviceAction::Cast {
                action: str_param(&params, "action"),
            },
            other => return Err(DeviceError::UnknownAction(other.to_string())),
        };
        Ok(action)
    }
}

fn str_param(params: &Value, key: &str) -> String {
    params
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Result of a dispatched [`DeviceAction`].
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ActionOutcome {
    Wake(WakeOutcome),
    Print(PrintOutcome),
    Sonos(SonosOutcome),
    Http(HttpOutcome),
    Ping {
        success: bool,
        #[serde(flatten)]
        ping: PingResult,
    },
    #[serde(rename_all = "camelCase")]
    Scan { success: bool, open_ports: Vec<u16> },
}

/// `ip:port`, bracketing IPv6 literals.
pub(crate) fn host_port(ip: IpAddr, port: u16) -> String {
    match ip {
        IpAddr::V4(v4) => format!("{v4}:{port}"),
        IpAddr::V6(v6) => format!("[{v6}]:{port}"),
    }
}
