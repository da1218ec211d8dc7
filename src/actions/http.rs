use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::time::Duration;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{DeviceError, Result};

const HTTP_REQUEST: &str = "HTTP request";

/// A request to forward to a device's HTTP interface.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpRequestOptions {
    pub method: String,
    pub path: String,
    pub port: u16,
    pub data: Option<Value>,
    pub headers: HashMap<String, String>,
    /// Milliseconds; the configured HTTP timeout applies when absent.
    pub timeout: Option<u64>,
}

impl Default for HttpRequestOptions {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            path: "/".to_string(),
            port: 80,
            data: None,
            headers: HashMap::new(),
            timeout: None,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct HttpOutcome {
    pub success: bool,
    pub status: u16,
    /// Parsed JSON when the body is JSON, otherwise the body text.
    pub data: Value,
    pub headers: BTreeMap<String, String>,
}

/// `https` for 443 and 8443, `http` otherwise.
pub fn scheme_for_port(port: u16) -> &'static str {
    match port {
        443 | 8443 => "https",
        _ => "http",
    }
}

pub fn build_url(ip: IpAddr, port: u16, path: &str) -> String {
    let sep = if path.starts_with('/') { "" } else { "/" };
    format!(
        "{}://{}{sep}{path}",
        scheme_for_port(port),
        super::host_port(ip, port)
    )
}

/// Forward a request to `ip` and return status, body and headers.
///
/// Certificate verification is off: local devices mostly serve self-signed
/// certificates.
pub async fn http_request(
    ip: IpAddr,
    opts: &HttpRequestOptions,
    default_timeout: Duration,
) -> Result<HttpOutcome> {
    let method = Method::from_bytes(opts.method.to_ascii_uppercase().as_bytes())
        .map_err(|_| DeviceError::InvalidRequest(format!("invalid method: {}", opts.method)))?;
    let url = build_url(ip, opts.port, &opts.path);
    let timeout = opts.timeout.map(Duration::from_millis).unwrap_or(default_timeout);

    let client = reqwest::Client::builder()
        .no_proxy()
        .danger_accept_invalid_certs(true)
        .timeout(timeout)
        .build()?;

    let mut req = client.request(method, &url);
    for (k, v) in &opts.headers {
        req = req.header(k.as_str(), v.as_str());
    }
    req = match &opts.data {
        None | Some(Value::Null) => req,
        Some(Value::String(s)) => req.body(s.clone()),
        Some(other) => req.json(other),
    };

    debug!(%url, "forwarding HTTP request");
    let response = req
        .send()
        .await
        .map_err(|e| DeviceError::from_reqwest(e, HTTP_REQUEST))?;
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
        .collect();
    let text = response
        .text()
        .await
        .map_err(|e| DeviceError::from_reqwest(e, HTTP_REQUEST))?;
    let data = serde_json::from_str(&text).unwrap_or(Value::String(text));

    Ok(HttpOutcome {
        success: true,
        status,
        data,
        headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn scheme_follows_port() {
        let ip = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 8));
        assert_eq!(build_url(ip, 443, "/status"), "https://192.168.1.8:443/status");
        assert_eq!(build_url(ip, 8443, "api"), "https://192.168.1.8:8443/api");
        assert_eq!(build_url(ip, 8080, "/"), "http://192.168.1.8:8080/");
    }

    #[test]
    fn ipv6_hosts_are_bracketed() {
        let ip = IpAddr::V6(Ipv6Addr::LOCALHOST);
        assert_eq!(build_url(ip, 80, "/"), "http://[::1]:80/");
    }

    #[test]
    fn options_default_from_partial_json() {
        let opts: HttpRequestOptions = serde_json::from_str(r#"{"port": 8123}"#).unwrap();
        assert_eq!(opts.method, "GET");
        assert_eq!(opts.path, "/");
        assert_eq!(opts.port, 8123);
    }

    #[tokio::test]
    async fn bad_method_fails_before_sending() {
        let opts = HttpRequestOptions {
            method: "GE T".to_string(),
            ..Default::default()
        };
        let err = http_request(IpAddr::V4(Ipv4Addr::LOCALHOST), &opts, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::InvalidRequest(_)));
    }
}
