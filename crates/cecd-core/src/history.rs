//! Command history ledger
//!
//! Every command the engine attempts ends up here, in the order it was
//! executed. The ledger is append-only apart from an explicit `clear`, and
//! derives an export view of successful raw frames that a signage player
//! can replay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::command::{frames, is_raw_frame};
use crate::vendor::VendorId;

/// How an attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failed,
    TimedOut,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// What kind of command an attempt carried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptKind {
    /// Raw frame transmission (`tx ...`)
    Frame,
    /// Any other `cec-client` command (`on 0`, `pow 0`, `scan`, ...)
    Command,
    /// Summary of a whole power sequence
    Sequence,
    /// Request rejected before reaching the transmitter
    Rejected,
}

impl AttemptKind {
    /// Kind for a command string about to be transmitted
    pub fn for_command(command: &str) -> Self {
        if is_raw_frame(command) {
            AttemptKind::Frame
        } else {
            AttemptKind::Command
        }
    }
}

/// One executed (or rejected) command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandAttempt {
    /// Position in the ledger, assigned on record
    #[serde(default)]
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub command: String,
    pub kind: AttemptKind,
    /// Vendor in effect when the command ran, if one was known
    pub vendor: Option<VendorId>,
    pub outcome: Outcome,
    pub detail: String,
}

impl CommandAttempt {
    pub fn new(
        command: impl Into<String>,
        kind: AttemptKind,
        vendor: Option<VendorId>,
        outcome: Outcome,
        detail: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            seq: 0,
            timestamp,
            command: command.into(),
            kind,
            vendor,
            outcome,
            detail: detail.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Vendor tag as shown in logs and exports
    pub fn vendor_tag(&self) -> &'static str {
        self.vendor.map(|v| v.as_str()).unwrap_or("unknown")
    }

    /// Export entry for a successful raw frame, `None` for anything else
    fn export_entry(&self) -> Option<ExportEntry> {
        if !self.success() || self.kind != AttemptKind::Frame {
            return None;
        }
        let payload: String = self
            .command
            .strip_prefix(frames::TX_PREFIX)?
            .chars()
            .filter(|c| *c != ':' && !c.is_whitespace())
            .collect();
        Some(ExportEntry {
            description: format!("Vendor: {} | Original: {}", self.vendor_tag(), self.command),
            derived_command: player_command(&payload),
            payload,
            timestamp: self.timestamp,
        })
    }
}

/// Command string the downstream player uses to replay a payload
pub fn player_command(payload: &str) -> String {
    format!("BrightControl Send Ascii String \"{}\"", payload)
}

/// One replayable frame in an export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEntry {
    pub description: String,
    /// Frame bytes as hex without separators
    pub payload: String,
    pub derived_command: String,
    pub timestamp: DateTime<Utc>,
}

/// Export of successful commands, computed on demand
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub export_time: DateTime<Utc>,
    pub total_successful_commands: usize,
    pub commands: Vec<CommandAttempt>,
    pub export_format: Vec<ExportEntry>,
}

/// Recent activity plus totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandLogSummary {
    pub recent_commands: Vec<CommandAttempt>,
    pub successful_commands: usize,
    pub total_commands: usize,
}

/// Number of attempts shown in a log summary
pub const SUMMARY_RECENT: usize = 10;

/// Ordered record of every attempted command
#[derive(Debug, Clone, Default)]
pub struct CommandHistory {
    attempts: Vec<CommandAttempt>,
    next_seq: u64,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attempt, returning it with its ledger sequence number
    pub fn record(&mut self, mut attempt: CommandAttempt) -> CommandAttempt {
        self.next_seq += 1;
        attempt.seq = self.next_seq;
        self.attempts.push(attempt.clone());
        attempt
    }

    pub fn all(&self) -> &[CommandAttempt] {
        &self.attempts
    }

    pub fn successful_only(&self) -> impl Iterator<Item = &CommandAttempt> + '_ {
        self.attempts.iter().filter(|a| a.success())
    }

    /// The most recent `n` attempts, oldest first
    pub fn last_n(&self, n: usize) -> &[CommandAttempt] {
        let start = self.attempts.len().saturating_sub(n);
        &self.attempts[start..]
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn successful_count(&self) -> usize {
        self.successful_only().count()
    }

    /// Drop every attempt. Sequence numbers keep counting up.
    pub fn clear(&mut self) {
        self.attempts.clear();
    }

    pub fn summary(&self) -> CommandLogSummary {
        CommandLogSummary {
            recent_commands: self.last_n(SUMMARY_RECENT).to_vec(),
            successful_commands: self.successful_count(),
            total_commands: self.len(),
        }
    }

    /// Build the export view of successful commands
    pub fn export_bundle(&self, now: DateTime<Utc>) -> ExportBundle {
        let commands: Vec<CommandAttempt> = self.successful_only().cloned().collect();
        let export_format = commands.iter().filter_map(CommandAttempt::export_entry).collect();
        ExportBundle {
            export_time: now,
            total_successful_commands: commands.len(),
            commands,
            export_format,
        }
    }
}
