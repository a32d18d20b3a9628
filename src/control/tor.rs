//! Tor control-port client
//!
//! Speaks just enough of the line-based control protocol to authenticate
//! and send `SIGNAL NEWNYM`.

use crate::control::{ControlError, IdentityRotator};
use futures_util::future::BoxFuture;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Upper bound for one whole rotate exchange
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Rotates identity through a Tor control port
#[derive(Debug, Clone)]
pub struct TorControl {
    address: String,
    password: Option<String>,
}

impl TorControl {
    pub fn new(address: impl Into<String>, password: Option<String>) -> Self {
        Self {
            address: address.into(),
            password,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn exchange(&self) -> Result<(), ControlError> {
        let stream = TcpStream::connect(&self.address)
            .await
            .map_err(|source| ControlError::Connect {
                address: self.address.clone(),
                source,
            })?;
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let auth = match &self.password {
            Some(password) => format!("AUTHENTICATE \"{}\"\r\n", quote(password)),
            None => "AUTHENTICATE\r\n".to_string(),
        };
        command(&mut reader, &mut writer, &auth, "AUTHENTICATE").await?;
        command(&mut reader, &mut writer, "SIGNAL NEWNYM\r\n", "SIGNAL NEWNYM").await?;

        // Best effort; the signal has already been accepted
        let _ = writer.write_all(b"QUIT\r\n").await;
        Ok(())
    }
}

impl IdentityRotator for TorControl {
    fn rotate(&self) -> BoxFuture<'_, Result<(), ControlError>> {
        Box::pin(async move {
            tokio::time::timeout(EXCHANGE_TIMEOUT, self.exchange())
                .await
                .map_err(|_| ControlError::Timeout(self.address.clone()))?
        })
    }

    fn name(&self) -> &'static str {
        "tor-control"
    }
}

/// Sends one command and expects a `250` reply
async fn command<R, W>(
    reader: &mut BufReader<R>,
    writer: &mut W,
    line: &str,
    label: &str,
) -> Result<(), ControlError>
where
    R: tokio::io::AsyncRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;

    let mut reply = String::new();
    if reader.read_line(&mut reply).await? == 0 {
        return Err(ControlError::Rejected {
            command: label.to_string(),
            reply: "connection closed".to_string(),
        });
    }

    let reply = reply.trim_end();
    if reply.starts_with("250") {
        Ok(())
    } else {
        Err(ControlError::Rejected {
            command: label.to_string(),
            reply: reply.to_string(),
        })
    }
}

fn quote(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}
