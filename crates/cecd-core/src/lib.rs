//! cecd Core - Core types, vendor policies and command history
//!
//! This crate provides the foundational types for the cecd system:
//! - Vendor identification and the per-vendor power/input policy table
//! - The logical command table (names to raw CEC frames)
//! - Parsing of `cec-client` scan output into device records
//! - The command history ledger and its export view

pub mod command;
pub mod device;
pub mod history;
pub mod vendor;

pub use command::{is_raw_frame, CoreCommand, ParseCommandError};
pub use device::{describe_devices, external_devices, parse_scan, DeviceRecord, PowerState, ScanRecords};
pub use history::{
    AttemptKind, CommandAttempt, CommandHistory, CommandLogSummary, ExportBundle, ExportEntry,
    Outcome,
};
pub use vendor::{generic_input_frame, PolicyRegistry, VendorId, VendorPolicy};
