//! cecd Transmit - Frame transmitter adapter
//!
//! This crate owns the boundary with the hardware: it hands one command
//! string at a time to an external CEC client process and turns whatever
//! comes back (output text, exit status, a timeout) into a structured
//! outcome the engine can reason about.

pub mod client;
pub mod report;

pub use client::{CecClient, CecClientConfig};
pub use report::{classify, TransmitReport};

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Budget for ordinary frames
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(15);

/// Budget for a bus scan
pub const SCAN_TIMEOUT: Duration = Duration::from_secs(15);

/// Budget for a power status query
pub const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum TransmitError {
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),
    #[error("Failed to launch CEC client: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Side channel failed: {0}")]
    SideChannel(String),
}

/// Raw result of one client invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Sends commands to the CEC bus
#[async_trait]
pub trait FrameTransmitter: Send + Sync {
    /// Send one command, waiting at most `timeout` for the client to exit
    async fn transmit(&self, command: &str, timeout: Duration) -> Result<ProcessOutput, TransmitError>;

    /// Ask the adapter to announce a specific CEC protocol version
    async fn set_protocol_version(&self, version: &str) -> Result<(), TransmitError>;
}
