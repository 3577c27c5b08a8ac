//! Serial control surface
//!
//! Line-delimited JSON over a USB gadget serial port: one request envelope
//! per line in, one response envelope per line out. The port is reopened
//! whenever the handheld disconnects.

use anyhow::Result;
use cecd_engine::Orchestrator;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::config::SerialConfig;
use crate::state::AppState;

/// Wait before reopening the port after a failure or disconnect
const REOPEN_DELAY: Duration = Duration::from_secs(1);

/// Longest request line accepted, newline excluded
pub const MAX_LINE_LEN: usize = 4096;

/// Greeting sent when a session starts
#[derive(Serialize)]
struct Ready {
    status: &'static str,
    message: &'static str,
}

const READY: Ready = Ready {
    status: "ready",
    message: "cecd ready",
};

/// Keep the serial port open and serve commands on it
pub async fn run(state: Arc<AppState>, config: SerialConfig) {
    loop {
        match tokio_serial::new(&config.device, config.baud_rate).open_native_async() {
            Ok(port) => {
                info!(device = %config.device, baud = config.baud_rate, "Serial port opened");
                match serve(&state.orchestrator, port).await {
                    Ok(()) => info!(device = %config.device, "Serial peer disconnected"),
                    Err(e) => warn!(device = %config.device, error = %e, "Serial session failed"),
                }
            }
            Err(e) => {
                debug!(device = %config.device, error = %e, "Serial port unavailable");
            }
        }
        tokio::time::sleep(REOPEN_DELAY).await;
    }
}

/// Serve one session until the peer closes the stream
pub async fn serve<S>(orchestrator: &Orchestrator, stream: S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    write_line(&mut writer, &READY).await?;

    loop {
        buf.clear();
        let read = (&mut reader)
            .take(MAX_LINE_LEN as u64 + 1)
            .read_until(b'\n', &mut buf)
            .await?;
        if read == 0 {
            return Ok(());
        }

        let response = if buf.len() > MAX_LINE_LEN && !buf.ends_with(b"\n") {
            skip_line(&mut reader).await?;
            warn!(limit = MAX_LINE_LEN, "Serial request line too long");
            orchestrator
                .reject_malformed(
                    &format!("<line over {} bytes>", MAX_LINE_LEN),
                    format!("line exceeds {} bytes", MAX_LINE_LEN),
                )
                .await
        } else {
            let text = String::from_utf8_lossy(&buf);
            let line = text.trim();
            if line.is_empty() {
                continue;
            }
            debug!(line = %line, "Serial request");
            orchestrator.execute_json(line).await
        };
        write_line(&mut writer, &response).await?;
    }
}

/// Drop input up to and including the next newline
async fn skip_line<R>(reader: &mut R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(());
        }
        match available.iter().position(|b| *b == b'\n') {
            Some(pos) => {
                reader.consume(pos + 1);
                return Ok(());
            }
            None => {
                let len = available.len();
                reader.consume(len);
            }
        }
    }
}

async fn write_line<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut json = serde_json::to_string(message)?;
    json.push('\n');
    writer.write_all(json.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cecd_core::PolicyRegistry;
    use cecd_engine::{new_ledger, OrchestratorConfig, SystemClock};
    use cecd_transmit::{FrameTransmitter, ProcessOutput, TransmitError};

    struct EchoBus;

    #[async_trait]
    impl FrameTransmitter for EchoBus {
        async fn transmit(&self, command: &str, _timeout: Duration) -> Result<ProcessOutput, TransmitError> {
            Ok(ProcessOutput {
                stdout: format!("sent {}\n", command),
                stderr: String::new(),
                exit_code: Some(0),
            })
        }

        async fn set_protocol_version(&self, _version: &str) -> Result<(), TransmitError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_serial_session() {
        let orchestrator = Orchestrator::new(
            Arc::new(EchoBus),
            Arc::new(SystemClock),
            new_ledger(),
            PolicyRegistry::builtin(),
            OrchestratorConfig::default(),
        );
        let (client, server) = tokio::io::duplex(4096);

        let session = tokio::spawn(async move {
            serve(&orchestrator, server).await.unwrap();
            orchestrator
        });

        let (reader, mut writer) = tokio::io::split(client);
        let mut lines = BufReader::new(reader).lines();

        let ready: serde_json::Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(ready["status"], "ready");

        writer
            .write_all(b"{\"command\":\"mute\"}\n\n{broken\n")
            .await
            .unwrap();

        let first: serde_json::Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(first["command"], "MUTE");
        assert_eq!(first["status"], "success");
        assert!(first["result"].as_str().unwrap().contains("sent mute"));

        let second: serde_json::Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(second["status"], "error");

        drop(writer);
        drop(lines);
        let orchestrator = session.await.unwrap();
        assert_eq!(orchestrator.ledger().read().await.len(), 2);
    }

    #[tokio::test]
    async fn test_oversized_line_is_rejected() {
        let orchestrator = Orchestrator::new(
            Arc::new(EchoBus),
            Arc::new(SystemClock),
            new_ledger(),
            PolicyRegistry::builtin(),
            OrchestratorConfig::default(),
        );
        let (client, server) = tokio::io::duplex(1024);

        let session = tokio::spawn(async move {
            serve(&orchestrator, server).await.unwrap();
            orchestrator
        });

        let (reader, mut writer) = tokio::io::split(client);
        let mut lines = BufReader::new(reader).lines();
        lines.next_line().await.unwrap().unwrap();

        let writes = tokio::spawn(async move {
            let mut input = vec![b'a'; MAX_LINE_LEN * 3];
            input.extend_from_slice(b"\n{\"command\":\"ping\"}\n");
            writer.write_all(&input).await.unwrap();
            writer
        });

        let rejected: serde_json::Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(rejected["status"], "error");
        assert!(rejected["result"].as_str().unwrap().contains("line exceeds 4096 bytes"));

        let pong: serde_json::Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(pong["result"], "pong");

        drop(writes.await.unwrap());
        drop(lines);
        let orchestrator = session.await.unwrap();
        let history = orchestrator.ledger().read().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history.all()[0].command, "<line over 4096 bytes>");
    }
}
