//! cecd Engine - Vendor-adaptive CEC orchestration
//!
//! This crate ties the pieces together:
//! - Vendor detection from a bus scan
//! - The power sequencing state machine (retry, verify)
//! - The orchestration facade every transport calls into
//! - The request/response envelope shared by all transports

pub mod clock;
pub mod detector;
pub mod envelope;
pub mod link;
pub mod orchestrator;
pub mod sequencer;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::{Clock, SystemClock};
pub use detector::{classify_scan, detect_vendor};
pub use envelope::{CommandError, Request, Response, Status};
pub use link::{new_ledger, Link, Sent, SharedLedger};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use sequencer::{PowerSequenceResult, PowerSequencer, SequenceState};
