//! `cec-client` process transmitter

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, trace};

use crate::{FrameTransmitter, ProcessOutput, TransmitError};

/// Budget for the protocol version side channel
const SIDE_CHANNEL_TIMEOUT: Duration = Duration::from_secs(5);

/// How to reach the CEC tools on this host
#[derive(Debug, Clone)]
pub struct CecClientConfig {
    /// Path to `cec-client`
    pub client_path: String,
    /// Arguments for single-command mode
    pub client_args: Vec<String>,
    /// Path to `cec-ctl`, used for protocol version changes
    pub ctl_path: String,
    /// CEC adapter index passed to `cec-ctl -d`
    pub adapter: u8,
}

impl Default for CecClientConfig {
    fn default() -> Self {
        Self {
            client_path: "cec-client".to_string(),
            client_args: vec!["-s".to_string(), "-d".to_string(), "1".to_string()],
            ctl_path: "cec-ctl".to_string(),
            adapter: 0,
        }
    }
}

/// Runs one `cec-client` process per command
pub struct CecClient {
    config: CecClientConfig,
}

impl CecClient {
    pub fn new(config: CecClientConfig) -> Self {
        Self { config }
    }

    /// Arguments for a `cec-ctl` protocol version change
    fn protocol_version_args(&self, version: &str) -> Vec<String> {
        vec![
            format!("-d{}", self.config.adapter),
            "--tv".to_string(),
            format!("--cec-version-{}", version),
        ]
    }
}

impl Default for CecClient {
    fn default() -> Self {
        Self::new(CecClientConfig::default())
    }
}

#[async_trait]
impl FrameTransmitter for CecClient {
    async fn transmit(&self, command: &str, limit: Duration) -> Result<ProcessOutput, TransmitError> {
        info!(command = %command, "Executing CEC command");

        let mut child = Command::new(&self.config.client_path)
            .args(&self.config.client_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait future on timeout kills the client
            .kill_on_drop(true)
            .spawn()
            .map_err(TransmitError::Spawn)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(format!("{}\n", command).as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = match timeout(limit, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                debug!(command = %command, timeout = ?limit, "CEC client timed out, killed");
                return Err(TransmitError::Timeout(limit));
            }
        };

        let result = ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        };
        trace!(
            command = %command,
            exit_code = ?result.exit_code,
            stdout_len = result.stdout.len(),
            "CEC client finished"
        );
        Ok(result)
    }

    async fn set_protocol_version(&self, version: &str) -> Result<(), TransmitError> {
        let args = self.protocol_version_args(version);
        let run = Command::new(&self.config.ctl_path)
            .args(&args)
            .kill_on_drop(true)
            .output();

        let output = timeout(SIDE_CHANNEL_TIMEOUT, run)
            .await
            .map_err(|_| TransmitError::Timeout(SIDE_CHANNEL_TIMEOUT))?
            .map_err(TransmitError::Spawn)?;

        if !output.status.success() {
            return Err(TransmitError::SideChannel(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        info!(version = %version, "Set CEC version");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_version_args() {
        let client = CecClient::default();
        assert_eq!(
            client.protocol_version_args("1.4"),
            vec!["-d0", "--tv", "--cec-version-1.4"]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let client = CecClient::new(CecClientConfig {
            client_path: "/nonexistent/cec-client".to_string(),
            ..Default::default()
        });
        let result = client.transmit("pow 0", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(TransmitError::Spawn(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_echoes_through_process() {
        let client = CecClient::new(CecClientConfig {
            client_path: "cat".to_string(),
            client_args: Vec::new(),
            ..Default::default()
        });
        let output = client.transmit("tx 10:04", Duration::from_secs(5)).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "tx 10:04\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_process() {
        let client = CecClient::new(CecClientConfig {
            client_path: "sleep".to_string(),
            client_args: vec!["5".to_string()],
            ..Default::default()
        });
        let result = client.transmit("scan", Duration::from_millis(100)).await;
        assert!(matches!(result, Err(TransmitError::Timeout(_))));
    }
}
