//! Transmit-and-record path to the display
//!
//! Every command that reaches the transmitter goes through [`Link::send`],
//! which records the attempt in the ledger before handing it back. Callers
//! hold the orchestrator's device lock while using a link, so ledger order
//! matches execution order.

use cecd_core::{AttemptKind, CommandAttempt, CommandHistory, VendorId};
use cecd_transmit::{classify, FrameTransmitter, TransmitError, TransmitReport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

use crate::clock::Clock;

/// Command history shared between the engine and read-only views
pub type SharedLedger = Arc<RwLock<CommandHistory>>;

pub fn new_ledger() -> SharedLedger {
    Arc::new(RwLock::new(CommandHistory::new()))
}

/// A transmitted command and how it went
#[derive(Debug, Clone)]
pub struct Sent {
    /// The attempt as recorded in the ledger
    pub attempt: CommandAttempt,
    pub report: TransmitReport,
}

impl Sent {
    pub fn success(&self) -> bool {
        self.attempt.success()
    }
}

pub struct Link {
    transmitter: Arc<dyn FrameTransmitter>,
    clock: Arc<dyn Clock>,
    ledger: SharedLedger,
}

impl Link {
    pub fn new(
        transmitter: Arc<dyn FrameTransmitter>,
        clock: Arc<dyn Clock>,
        ledger: SharedLedger,
    ) -> Self {
        Self {
            transmitter,
            clock,
            ledger,
        }
    }

    /// Transmit one command and record the attempt
    pub async fn send(&self, command: &str, timeout: Duration, vendor: Option<VendorId>) -> Sent {
        let report = classify(command, self.transmitter.transmit(command, timeout).await);
        let attempt = CommandAttempt::new(
            command,
            AttemptKind::for_command(command),
            vendor,
            report.outcome,
            report.detail.clone(),
            self.clock.now(),
        );
        let attempt = self.record(attempt).await;
        Sent { attempt, report }
    }

    /// Append an attempt to the ledger
    pub async fn record(&self, attempt: CommandAttempt) -> CommandAttempt {
        info!(
            command = %attempt.command,
            success = attempt.success(),
            outcome = ?attempt.outcome,
            vendor = attempt.vendor_tag(),
            "CEC_CMD"
        );
        self.ledger.write().await.record(attempt)
    }

    pub async fn set_protocol_version(&self, version: &str) -> Result<(), TransmitError> {
        self.transmitter.set_protocol_version(version).await
    }

    pub async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            self.clock.sleep(duration).await;
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}
