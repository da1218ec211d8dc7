use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time;
use tracing::info;

use crate::error::{DeviceError, Result};

/// RAW / JetDirect port.
pub const RAW_PRINT_PORT: u16 = 9100;

const FORM_FEED: u8 = 0x0C;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PrintOptions {
    pub port: u16,
    /// Append a form feed so page-oriented printers eject the last page.
    pub form_feed: bool,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            port: RAW_PRINT_PORT,
            form_feed: false,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PrintOutcome {
    pub success: bool,
    pub message: String,
    pub bytes: usize,
}

/// Open a raw TCP connection, write `content`, and close.
///
/// The whole job (connect, write, shutdown) must finish within `timeout`.
pub async fn print_raw(
    addr: SocketAddr,
    content: &[u8],
    options: &PrintOptions,
    timeout: Duration,
) -> Result<PrintOutcome> {
    let job = async {
        let mut stream = TcpStream::connect(addr).await?;
        stream.write_all(content).await?;
        if options.form_feed {
            stream.write_all(&[FORM_FEED]).await?;
        }
        stream.shutdown().await?;
        Ok::<_, std::io::Error>(())
    };

    time::timeout(timeout, job)
        .await
        .map_err(|_| DeviceError::Timeout("print job"))??;

    let bytes = content.len() + usize::from(options.form_feed);
    info!(%addr, bytes, "print job sent");
    Ok(PrintOutcome {
        success: true,
        message: "Print job sent".to_string(),
        bytes,
    })
}
