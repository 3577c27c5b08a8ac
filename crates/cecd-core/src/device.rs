//! Scan output parsing and device records
//!
//! `cec-client` answers a `scan` with one block per logical address:
//!
//! ```text
//! device #0: TV
//! address:       0.0.0.0
//! active source: no
//! vendor:        Samsung
//! osd string:    TV
//! CEC version:   1.4
//! power status:  on
//! ```
//!
//! The controller's own adapter shows up in that list too, so
//! [`external_devices`] drops it.

use serde::{Deserialize, Serialize};
use std::str::Lines;

use crate::vendor::VendorId;

/// Power state reported by a display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    On,
    Standby,
    TransitionToOn,
    TransitionToStandby,
    Unknown,
}

impl PowerState {
    /// Interpret a power status label (`on`, `standby`, ...)
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        match label.as_str() {
            "on" => PowerState::On,
            "standby" => PowerState::Standby,
            _ if label.contains("standby to on") => PowerState::TransitionToOn,
            _ if label.contains("on to standby") => PowerState::TransitionToStandby,
            _ => PowerState::Unknown,
        }
    }

    /// Find the `power status:` line in a status query response
    pub fn from_status_output(output: &str) -> Self {
        output
            .lines()
            .find_map(|line| {
                let (key, value) = line.trim().split_once(':')?;
                (key.trim().eq_ignore_ascii_case("power status")).then(|| Self::from_label(value))
            })
            .unwrap_or(PowerState::Unknown)
    }

    pub fn is_on(&self) -> bool {
        matches!(self, PowerState::On)
    }
}

impl Default for PowerState {
    fn default() -> Self {
        Self::Unknown
    }
}

/// One device block from a scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Logical address slot (`device #N`)
    pub slot: u8,
    /// Device type label after the slot (`TV`, `Recorder 1`, ...)
    pub kind: String,
    /// Physical address (`1.0.0.0`)
    pub address: Option<String>,
    pub vendor: Option<String>,
    /// On-screen-display name
    pub name: Option<String>,
    /// Power status label as reported
    pub power: Option<String>,
    pub cec_version: Option<String>,
    pub active_source: Option<bool>,
}

impl DeviceRecord {
    /// Whether this is the controller's own CEC adapter rather than a display
    pub fn is_self_device(&self) -> bool {
        let name = self.name.as_deref().unwrap_or_default().to_lowercase();
        let vendor = self.vendor.as_deref().unwrap_or_default().to_lowercase();
        name.contains("cectester") || name.contains("recorder") || vendor.contains("pulse eight")
    }

    pub fn power_state(&self) -> PowerState {
        self.power
            .as_deref()
            .map(PowerState::from_label)
            .unwrap_or_default()
    }

    /// Vendor keyword matched in the vendor label or OSD name
    pub fn vendor_id(&self) -> Option<VendorId> {
        let haystack = format!(
            "{} {}",
            self.vendor.as_deref().unwrap_or_default(),
            self.name.as_deref().unwrap_or_default()
        )
        .to_lowercase();
        VendorId::DETECTION_ORDER
            .into_iter()
            .find(|v| haystack.contains(v.as_str()))
    }

    fn apply(&mut self, key: &str, value: &str) {
        let value = value.trim().to_string();
        match key.trim().to_lowercase().as_str() {
            "address" => self.address = Some(value),
            "vendor" => self.vendor = Some(value),
            "osd string" => self.name = Some(value),
            "power status" => self.power = Some(value),
            "cec version" => self.cec_version = Some(value),
            "active source" => self.active_source = Some(value.eq_ignore_ascii_case("yes")),
            _ => {}
        }
    }
}

/// Parse the `device #N: kind` header line
fn parse_device_start(line: &str) -> Option<DeviceRecord> {
    let rest = line.strip_prefix("device #")?;
    let (slot, kind) = rest.split_once(':').unwrap_or((rest, ""));
    Some(DeviceRecord {
        slot: slot.trim().parse().unwrap_or_default(),
        kind: kind.trim().to_string(),
        ..Default::default()
    })
}

/// Lazy iterator over device blocks in scan text
///
/// Clone before consuming (or call [`parse_scan`] again) to walk the same
/// text twice.
#[derive(Debug, Clone)]
pub struct ScanRecords<'a> {
    lines: Lines<'a>,
    current: Option<DeviceRecord>,
}

impl<'a> Iterator for ScanRecords<'a> {
    type Item = DeviceRecord;

    fn next(&mut self) -> Option<DeviceRecord> {
        for line in self.lines.by_ref() {
            let line = line.trim();
            if let Some(record) = parse_device_start(line) {
                if let Some(done) = self.current.replace(record) {
                    return Some(done);
                }
                continue;
            }
            if let (Some(current), Some((key, value))) = (self.current.as_mut(), line.split_once(':')) {
                current.apply(key, value);
            }
        }
        self.current.take()
    }
}

/// Parse scan output into device records, in scan order
pub fn parse_scan(text: &str) -> ScanRecords<'_> {
    ScanRecords {
        lines: text.lines(),
        current: None,
    }
}

/// Devices on the bus other than the controller itself
pub fn external_devices(text: &str) -> impl Iterator<Item = DeviceRecord> + Clone + '_ {
    parse_scan(text).filter(|d| !d.is_self_device())
}

/// Operator-facing summary of scanned devices
pub fn describe_devices(devices: &[DeviceRecord]) -> String {
    if devices.is_empty() {
        return "No external CEC devices found".to_string();
    }

    let mut summary = String::from("Detected CEC Devices:\n");
    for device in devices {
        let vendor = device.vendor.as_deref().unwrap_or("Unknown");
        let name = device.name.as_deref().unwrap_or("Unknown");
        let power = device.power.as_deref().unwrap_or("unknown");
        summary.push_str(&format!("• {} ({}) - {}", name, vendor, power));
        if let Some(note) = device.vendor_id().and_then(|v| v.note()) {
            summary.push_str(&format!(" ({})", note));
        }
        summary.push('\n');
    }
    summary.trim_end().to_string()
}
