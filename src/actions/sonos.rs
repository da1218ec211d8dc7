//! Sonos transport and volume control over UPnP SOAP.

use std::net::IpAddr;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{DeviceError, Result};

pub const SONOS_PORT: u16 = 1400;

const DEFAULT_VOLUME: u8 = 50;

const SOAP_CALL: &str = "Sonos SOAP call";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SonosService {
    AvTransport,
    RenderingControl,
}

impl SonosService {
    pub fn name(&self) -> &'static str {
        match self {
            SonosService::AvTransport => "AVTransport",
            SonosService::RenderingControl => "RenderingControl",
        }
    }

    pub fn control_path(&self) -> &'static str {
        match self {
            SonosService::AvTransport => "/MediaRenderer/AVTransport/Control",
            SonosService::RenderingControl => "/MediaRenderer/RenderingControl/Control",
        }
    }

    pub fn urn(&self) -> String {
        format!("urn:schemas-upnp-org:service:{}:1", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SonosAction {
    Play,
    Pause,
    Stop,
    Next,
    Previous,
    SetVolume(u8),
    GetVolume,
}

impl SonosAction {
    pub const NAMES: &'static [&'static str] =
        &["play", "pause", "stop", "next", "previous", "setVolume", "getVolume"];

    /// Map an action name and its params to a SOAP call.
    ///
    /// `setVolume` reads `params.volume` (number or numeric string), defaults
    /// to 50 and clamps to 0..=100.
    pub fn parse(name: &str, params: &Value) -> Result<Self> {
        let action = match name {
            "play" => SonosAction::Play,
            "pause" => SonosAction::Pause,
            "stop" => SonosAction::Stop,
            "next" => SonosAction::Next,
            "previous" => SonosAction::Previous,
            "getVolume" => SonosAction::GetVolume,
            "setVolume" => {
                let volume = match params.get("volume") {
                    Some(Value::Number(n)) => n.as_f64(),
                    Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
                    _ => None,
                };
                let volume = volume
                    .map(|v| v.clamp(0.0, 100.0).round() as u8)
                    .unwrap_or(DEFAULT_VOLUME);
                SonosAction::SetVolume(volume)
            }
            other => return Err(DeviceError::UnknownSonosAction(other.to_string())),
        };
        Ok(action)
    }

    pub fn service(&self) -> SonosService {
        match self {
            SonosAction::SetVolume(_) | SonosAction::GetVolume => SonosService::RenderingControl,
            _ => SonosService::AvTransport,
        }
    }

    /// UPnP action name as it appears in the envelope and `SOAPAction` header.
    pub fn soap_name(&self) -> &'static str {
        match self {
            SonosAction::Play => "Play",
            SonosAction::Pause => "Pause",
            SonosAction::Stop => "Stop",
            SonosAction::Next => "Next",
            SonosAction::Previous => "Previous",
            SonosAction::SetVolume(_) => "SetVolume",
            SonosAction::GetVolume => "GetVolume",
        }
    }

    fn arguments(&self) -> String {
        match self {
            SonosAction::Play => "<InstanceID>0</InstanceID><Speed>1</Speed>".to_string(),
            SonosAction::SetVolume(v) => format!(
                "<InstanceID>0</InstanceID><Channel>Master</Channel><DesiredVolume>{v}</DesiredVolume>"
            ),
            SonosAction::GetVolume => {
                "<InstanceID>0</InstanceID><Channel>Master</Channel>".to_string()
            }
            _ => "<InstanceID>0</InstanceID>".to_string(),
        }
    }

    /// Value for the `SOAPAction` header, quotes included.
    pub fn soap_action_header(&self) -> String {
        format!("\"{}#{}\"", self.service().urn(), self.soap_name())
    }

    pub fn envelope(&self) -> String {
        let name = self.soap_name();
        let urn = self.service().urn();
        let args = self.arguments();
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
  <s:Body>
    <u:{name} xmlns:u="{urn}">
      {args}
    </u:{name}>
  </s:Body>
</s:Envelope>"#
        )
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SonosOutcome {
    pub success: bool,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u8>,
    pub response: String,
}

/// Pull `<CurrentVolume>` out of a GetVolume reply.
pub fn parse_current_volume(body: &str) -> Option<u8> {
    let start = body.find("<CurrentVolume>")? + "<CurrentVolume>".len();
    let end = body[start..].find("</CurrentVolume>")? + start;
    body[start..end].trim().parse().ok()
}

/// POST the SOAP envelope for `action` to the speaker at `ip:port`.
pub async fn send_sonos_action(
    ip: IpAddr,
    port: u16,
    action: SonosAction,
    timeout: Duration,
) -> Result<SonosOutcome> {
    let service = action.service();
    let url = format!("http://{}{}", super::host_port(ip, port), service.control_path());
    debug!(%url, action = action.soap_name(), "sending SOAP request");

    let client = reqwest::Client::builder()
        .no_proxy()
        .timeout(timeout)
        .build()?;
    let response = client
        .post(&url)
        .header(reqwest::header::CONTENT_TYPE, "text/xml; charset=\"utf-8\"")
        .header("SOAPAction", action.soap_action_header())
        .body(action.envelope())
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| DeviceError::from_reqwest(e, SOAP_CALL))?;
    let body = response
        .text()
        .await
        .map_err(|e| DeviceError::from_reqwest(e, SOAP_CALL))?;

    let volume = match action {
        SonosAction::GetVolume => parse_current_volume(&body),
        SonosAction::SetVolume(v) => Some(v),
        _ => None,
    };
    info!(%ip, action = action.soap_name(), "Sonos action completed");
    Ok(SonosOutcome {
        success: true,
        action: action.soap_name().to_string(),
        volume,
        response: body,
    })
}
