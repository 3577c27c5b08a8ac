//! Translation from raw client output to a structured outcome
//!
//! `cec-client` reports most problems as free text while still exiting 0,
//! so the outcome is decided here and nowhere else:
//! - timeout → `TimedOut`
//! - launch or IO failure → `Failed`
//! - non-zero exit → `Failed`
//! - exit 0 with "failed" or "error" anywhere in the output → `Failed`
//! - otherwise → `Success`

use cecd_core::Outcome;

use crate::{ProcessOutput, TransmitError};

/// Words that mark client output as a failure
const FAILURE_MARKERS: [&str; 2] = ["failed", "error"];

/// Structured result of one transmission
#[derive(Debug, Clone)]
pub struct TransmitReport {
    pub outcome: Outcome,
    /// Human-readable result line(s)
    pub detail: String,
    /// Raw process output, when the process ran to completion
    pub output: Option<ProcessOutput>,
}

impl TransmitReport {
    /// Client stdout if the process exited cleanly
    pub fn clean_stdout(&self) -> Option<&str> {
        self.output
            .as_ref()
            .filter(|o| o.success())
            .map(|o| o.stdout.as_str())
    }
}

fn has_failure_marker(text: &str) -> bool {
    let text = text.to_lowercase();
    FAILURE_MARKERS.iter().any(|m| text.contains(m))
}

/// Classify the result of transmitting `command`
pub fn classify(command: &str, result: Result<ProcessOutput, TransmitError>) -> TransmitReport {
    match result {
        Ok(output) if output.success() => {
            let outcome = if has_failure_marker(&output.stdout) {
                Outcome::Failed
            } else {
                Outcome::Success
            };
            TransmitReport {
                outcome,
                detail: format!("Command executed: {}\nOutput: {}", command, output.stdout.trim_end()),
                output: Some(output),
            }
        }
        Ok(output) => TransmitReport {
            outcome: Outcome::Failed,
            detail: format!("Command failed: {}", output.stderr.trim_end()),
            output: Some(output),
        },
        Err(TransmitError::Timeout(_)) => TransmitReport {
            outcome: Outcome::TimedOut,
            detail: format!("Command timed out: {}", command),
            output: None,
        },
        Err(e) => TransmitReport {
            outcome: Outcome::Failed,
            detail: format!("Error executing command: {}", e),
            output: None,
        },
    }
}
