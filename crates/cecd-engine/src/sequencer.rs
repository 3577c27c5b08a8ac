//! Power sequencing state machine
//!
//! Power-on runs through explicit states:
//!
//! ```text
//! Idle -> Preparing -> Transmitting(1) -> Verifying(1) -> Succeeded
//!                           ^                  |
//!                           +-- attempt + 1 ---+--> Failed
//! ```
//!
//! `Preparing` optionally resets the CEC link and sets the protocol
//! version. Each `Transmitting` state sends the vendor's whole frame list,
//! even if some frames fail. `Verifying` waits, then polls the display's
//! power state. Both terminal states add one summary attempt to the ledger.
//!
//! The sequencer never fails: every transmitter problem is already an
//! outcome on the recorded attempt.

use cecd_core::command::frames;
use cecd_core::{AttemptKind, CommandAttempt, Outcome, PowerState, VendorId, VendorPolicy};
use cecd_transmit::{COMMAND_TIMEOUT, STATUS_TIMEOUT};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::link::Link;

/// Pause between the last frame of an attempt and the status poll
pub const VERIFY_WAIT: Duration = Duration::from_secs(2);

/// Pause after the link reset frames
pub const LINK_RESET_SETTLE: Duration = Duration::from_secs(1);

/// Pause before NEC's second standby frame
pub const NEC_STANDBY_RETRY_WAIT: Duration = Duration::from_secs(1);

/// Harmless queries that wake up a sluggish CEC link
const LINK_RESET_FRAMES: [&str; 3] = [
    frames::GIVE_VENDOR_ID,
    frames::GIVE_PHYSICAL_ADDRESS,
    frames::GIVE_OSD_NAME,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SequenceState {
    Idle,
    Preparing,
    Transmitting { attempt: u32 },
    Verifying { attempt: u32 },
    Succeeded,
    Failed,
}

impl SequenceState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SequenceState::Succeeded | SequenceState::Failed)
    }
}

/// Outcome of a full power-on or power-off run
#[derive(Debug, Clone, Serialize)]
pub struct PowerSequenceResult {
    pub vendor: VendorId,
    pub state: SequenceState,
    pub attempts_used: u32,
    /// Last polled power state, power-on only
    pub verified_power: Option<PowerState>,
    /// Link reset frames sent while preparing
    pub preparation: Vec<CommandAttempt>,
    /// Power frames, across all attempts
    pub frames: Vec<CommandAttempt>,
    /// Power status polls
    pub polls: Vec<CommandAttempt>,
    /// Whole-sequence summary, power-on only
    pub summary: Option<CommandAttempt>,
    pub success: bool,
}

impl PowerSequenceResult {
    fn new(vendor: VendorId) -> Self {
        Self {
            vendor,
            state: SequenceState::Idle,
            attempts_used: 0,
            verified_power: None,
            preparation: Vec::new(),
            frames: Vec::new(),
            polls: Vec::new(),
            summary: None,
            success: false,
        }
    }

    /// Result text for the caller: headline plus every frame's result
    pub fn message(&self) -> String {
        let headline = match &self.summary {
            Some(summary) => summary.detail.clone(),
            None if self.success => format!("Power-off sent after {} attempts", self.attempts_used),
            None => format!("Power-off failed after {} attempts", self.attempts_used),
        };
        let details: Vec<&str> = self.frames.iter().map(|a| a.detail.as_str()).collect();
        if details.is_empty() {
            headline
        } else {
            format!("{}\n{}", headline, details.join("\n"))
        }
    }
}

/// Drives one vendor policy against the display
pub struct PowerSequencer<'a> {
    policy: &'a VendorPolicy,
    link: &'a Link,
}

impl<'a> PowerSequencer<'a> {
    pub fn new(policy: &'a VendorPolicy, link: &'a Link) -> Self {
        Self { policy, link }
    }

    fn vendor(&self) -> VendorId {
        self.policy.vendor
    }

    /// Run the power-on state machine to a terminal state
    pub async fn power_on(&self) -> PowerSequenceResult {
        let mut result = PowerSequenceResult::new(self.vendor());
        let retries = self.policy.retry_count.max(1);

        info!(vendor = %self.vendor(), retries, "Starting power-on sequence");

        while !result.state.is_terminal() {
            let next = match result.state {
                SequenceState::Idle => SequenceState::Preparing,
                SequenceState::Preparing => {
                    self.prepare(&mut result).await;
                    SequenceState::Transmitting { attempt: 1 }
                }
                SequenceState::Transmitting { attempt } => {
                    self.transmit_attempt(attempt, &mut result).await;
                    SequenceState::Verifying { attempt }
                }
                SequenceState::Verifying { attempt } => {
                    let power = self.verify(&mut result).await;
                    if power.is_on() {
                        SequenceState::Succeeded
                    } else if attempt < retries {
                        SequenceState::Transmitting { attempt: attempt + 1 }
                    } else {
                        SequenceState::Failed
                    }
                }
                SequenceState::Succeeded | SequenceState::Failed => break,
            };
            debug!(vendor = %self.vendor(), from = ?result.state, to = ?next, "Sequence transition");
            result.state = next;
        }

        result.success = result.state == SequenceState::Succeeded;
        let (outcome, detail) = if result.success {
            (
                Outcome::Success,
                format!("Power-on successful after {} attempts", result.attempts_used),
            )
        } else {
            (
                Outcome::Failed,
                format!("Power-on failed after {} attempts", result.attempts_used),
            )
        };
        let summary = CommandAttempt::new(
            format!("SEQUENCE: {}", self.policy.sequence_label()),
            AttemptKind::Sequence,
            Some(self.vendor()),
            outcome,
            detail,
            self.link.clock().now(),
        );
        result.summary = Some(self.link.record(summary).await);

        if result.success {
            info!(vendor = %self.vendor(), attempts = result.attempts_used, "Power-on sequence succeeded");
        } else {
            warn!(vendor = %self.vendor(), attempts = result.attempts_used, "Power-on sequence failed");
        }
        result
    }

    async fn prepare(&self, result: &mut PowerSequenceResult) {
        if self.policy.requires_link_reset {
            info!(vendor = %self.vendor(), "Performing CEC link reset");
            for frame in LINK_RESET_FRAMES {
                let sent = self.link.send(frame, COMMAND_TIMEOUT, Some(self.vendor())).await;
                result.preparation.push(sent.attempt);
                self.link.sleep(self.policy.command_delay).await;
            }
            self.link.sleep(LINK_RESET_SETTLE).await;
        }

        if let Some(version) = &self.policy.required_protocol_version {
            match self.link.set_protocol_version(version).await {
                Ok(()) => debug!(vendor = %self.vendor(), version = %version, "Protocol version set"),
                Err(e) => warn!(vendor = %self.vendor(), version = %version, error = %e, "Failed to set CEC version"),
            }
        }
    }

    async fn transmit_attempt(&self, attempt: u32, result: &mut PowerSequenceResult) {
        info!(vendor = %self.vendor(), attempt, "Power-on attempt");
        result.attempts_used = attempt;

        let mut clean = true;
        for frame in &self.policy.power_on {
            let sent = self.link.send(frame, COMMAND_TIMEOUT, Some(self.vendor())).await;
            // A failed frame doesn't abort the attempt; the poll decides
            clean &= sent.success();
            result.frames.push(sent.attempt);
            self.link.sleep(self.policy.command_delay).await;
        }

        if !clean {
            warn!(vendor = %self.vendor(), attempt, "Some power-on frames failed");
        }
    }

    async fn verify(&self, result: &mut PowerSequenceResult) -> PowerState {
        self.link.sleep(VERIFY_WAIT).await;
        let sent = self
            .link
            .send(frames::POWER_STATUS, STATUS_TIMEOUT, Some(self.vendor()))
            .await;
        let power = sent
            .report
            .clean_stdout()
            .map(PowerState::from_status_output)
            .unwrap_or_default();
        debug!(vendor = %self.vendor(), power = ?power, "Polled power state");
        result.polls.push(sent.attempt);
        result.verified_power = Some(power);
        power
    }

    /// Send standby, with NEC's single retry on failure
    pub async fn power_off(&self) -> PowerSequenceResult {
        let mut result = PowerSequenceResult::new(self.vendor());
        info!(vendor = %self.vendor(), "Starting power-off");

        if let Some(delay) = self.policy.power_off_delay {
            self.link.sleep(delay).await;
        }

        let mut sent = self
            .link
            .send(&self.policy.power_off, COMMAND_TIMEOUT, Some(self.vendor()))
            .await;
        result.attempts_used = 1;

        if self.vendor() == VendorId::Nec && !sent.success() {
            debug!("NEC standby failed, retrying once");
            result.frames.push(sent.attempt);
            self.link.sleep(NEC_STANDBY_RETRY_WAIT).await;
            sent = self
                .link
                .send(&self.policy.power_off, COMMAND_TIMEOUT, Some(self.vendor()))
                .await;
            result.attempts_used = 2;
        }

        result.success = sent.success();
        result.frames.push(sent.attempt);
        result.state = if result.success {
            SequenceState::Succeeded
        } else {
            SequenceState::Failed
        };
        result
    }
}
