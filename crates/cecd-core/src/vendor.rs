//! Vendor identification and per-vendor command policies
//!
//! Consumer CEC implementations differ wildly in how they react to the
//! standard power and routing messages. Each supported vendor gets a
//! [`VendorPolicy`] describing the frames to send, how long to wait between
//! them and how often to retry. Anything we can't identify falls back to the
//! generic policy.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::command::frames;

/// Display vendor, as far as the engine cares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VendorId {
    Optoma,
    Nec,
    Epson,
    Samsung,
    Lg,
    Generic,
}

impl VendorId {
    /// Detection priority. Earlier entries win when several keywords match.
    pub const DETECTION_ORDER: [VendorId; 5] = [
        VendorId::Optoma,
        VendorId::Nec,
        VendorId::Epson,
        VendorId::Samsung,
        VendorId::Lg,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VendorId::Optoma => "optoma",
            VendorId::Nec => "nec",
            VendorId::Epson => "epson",
            VendorId::Samsung => "samsung",
            VendorId::Lg => "lg",
            VendorId::Generic => "generic",
        }
    }

    /// Map a free-form label to a vendor. Unknown labels become `Generic`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "optoma" => VendorId::Optoma,
            "nec" => VendorId::Nec,
            "epson" => VendorId::Epson,
            "samsung" => VendorId::Samsung,
            "lg" => VendorId::Lg,
            _ => VendorId::Generic,
        }
    }

    /// Short operator hint shown next to scanned devices of this vendor
    pub fn note(&self) -> Option<&'static str> {
        match self {
            VendorId::Optoma => Some("May need special power-on sequence"),
            VendorId::Nec => Some("May need CEC v1.4 and longer delays"),
            VendorId::Epson => Some("May need CEC reset after power cycle"),
            VendorId::Samsung => Some("Supports Anynet+ commands"),
            VendorId::Lg => Some("Supports SimpLink commands"),
            VendorId::Generic => None,
        }
    }
}

impl std::fmt::Display for VendorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delay used between frames when a vendor doesn't specify one
pub const DEFAULT_COMMAND_DELAY: Duration = Duration::from_millis(500);

/// Power and input behaviour for one vendor
#[derive(Debug, Clone, Serialize)]
pub struct VendorPolicy {
    pub vendor: VendorId,
    /// Frames sent, in order, for every power-on attempt
    pub power_on: Vec<String>,
    /// Pause after each frame
    pub command_delay: Duration,
    /// Number of power-on attempts, always at least 1
    pub retry_count: u32,
    /// Pause before the standby frame
    pub power_off_delay: Option<Duration>,
    /// Frame sent to put the display in standby
    pub power_off: String,
    /// Poke the link with harmless queries before powering on
    pub requires_link_reset: bool,
    /// CEC version the adapter must announce for this vendor
    pub required_protocol_version: Option<String>,
    /// Logical input name ("hdmi1".."hdmi4", "tv") to raw frame
    pub inputs: HashMap<String, String>,
}

impl VendorPolicy {
    /// The fallback used for unknown displays
    pub fn generic() -> Self {
        Self::base(VendorId::Generic)
    }

    fn base(vendor: VendorId) -> Self {
        Self {
            vendor,
            power_on: vec![frames::POWER_ON.to_string()],
            command_delay: DEFAULT_COMMAND_DELAY,
            retry_count: 1,
            power_off_delay: None,
            power_off: frames::STANDBY.to_string(),
            requires_link_reset: false,
            required_protocol_version: None,
            inputs: HashMap::new(),
        }
    }

    fn with_power_on(mut self, frames: &[&str], delay: Duration, retries: u32) -> Self {
        self.power_on = frames.iter().map(|f| f.to_string()).collect();
        self.command_delay = delay;
        self.retry_count = retries.max(1);
        self
    }

    fn with_inputs(mut self, inputs: &[(&str, &str)]) -> Self {
        self.inputs = inputs
            .iter()
            .map(|(name, frame)| (name.to_string(), frame.to_string()))
            .collect();
        self
    }

    /// Frame for a logical input, if this vendor overrides it
    pub fn input_frame(&self, input: &str) -> Option<&str> {
        self.inputs.get(&input.to_lowercase()).map(String::as_str)
    }

    /// The power-on frames joined the way sequence summaries show them
    pub fn sequence_label(&self) -> String {
        self.power_on.join(" && ")
    }
}

/// Input frames used when the vendor has no override
pub fn generic_input_frame(input: &str) -> Option<&'static str> {
    match input.to_lowercase().as_str() {
        "hdmi1" => Some(frames::HDMI_1),
        "hdmi2" => Some(frames::HDMI_2),
        "hdmi3" => Some(frames::HDMI_3),
        "hdmi4" => Some(frames::HDMI_4),
        _ => None,
    }
}

/// Fixed mapping from vendor to policy, built once at startup
#[derive(Debug, Clone)]
pub struct PolicyRegistry {
    policies: HashMap<VendorId, VendorPolicy>,
    generic: VendorPolicy,
}

impl PolicyRegistry {
    /// The built-in vendor table
    pub fn builtin() -> Self {
        let secs = Duration::from_secs_f64;

        let optoma = VendorPolicy::base(VendorId::Optoma).with_power_on(
            &[frames::IMAGE_VIEW_ON, frames::ACTIVE_SOURCE_HDMI1, frames::IMAGE_VIEW_ON],
            secs(1.0),
            3,
        );
        let optoma = VendorPolicy {
            power_off_delay: Some(secs(0.5)),
            ..optoma
        };

        let nec = VendorPolicy::base(VendorId::Nec).with_power_on(
            &[frames::IMAGE_VIEW_ON, frames::ACTIVE_SOURCE_HDMI1],
            secs(2.0),
            2,
        );
        let nec = VendorPolicy {
            power_off_delay: Some(secs(1.0)),
            required_protocol_version: Some("1.4".to_string()),
            ..nec
        };

        let epson = VendorPolicy::base(VendorId::Epson).with_power_on(
            &[
                frames::GIVE_VENDOR_ID,
                frames::IMAGE_VIEW_ON,
                frames::ACTIVE_SOURCE_HDMI1,
                frames::GIVE_VENDOR_ID,
            ],
            secs(1.5),
            2,
        );
        let epson = VendorPolicy {
            requires_link_reset: true,
            ..epson
        };

        let samsung = VendorPolicy::base(VendorId::Samsung).with_inputs(&[
            ("hdmi1", frames::HDMI_1),
            ("hdmi2", frames::HDMI_2),
            ("hdmi3", frames::HDMI_3),
            ("hdmi4", frames::HDMI_4),
            ("tv", "tx 4F:9D:00:00"),
        ]);

        let lg = VendorPolicy::base(VendorId::Lg).with_inputs(&[
            ("hdmi1", "tx 10:44:F1"),
            ("hdmi2", "tx 10:44:F2"),
            ("hdmi3", "tx 10:44:F3"),
            ("hdmi4", "tx 10:44:F4"),
        ]);

        let policies = [optoma, nec, epson, samsung, lg]
            .into_iter()
            .map(|p| (p.vendor, p))
            .collect();

        Self {
            policies,
            generic: VendorPolicy::generic(),
        }
    }

    /// Policy for a vendor, generic when there is no dedicated entry
    pub fn lookup(&self, vendor: VendorId) -> &VendorPolicy {
        self.policies.get(&vendor).unwrap_or(&self.generic)
    }

    /// Policy for a free-form vendor label
    pub fn lookup_label(&self, label: &str) -> &VendorPolicy {
        self.lookup(VendorId::from_label(label))
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_vendor_is_generic() {
        let registry = PolicyRegistry::builtin();
        let policy = registry.lookup_label("unknown-vendor");
        assert_eq!(policy.vendor, VendorId::Generic);
        assert_eq!(policy.retry_count, 1);
        assert_eq!(policy.power_on, vec!["on 0".to_string()]);
        assert_eq!(policy.power_off, "standby 0");
        assert!(policy.inputs.is_empty());
    }

    #[test]
    fn test_vendor_table() {
        let registry = PolicyRegistry::builtin();

        let optoma = registry.lookup(VendorId::Optoma);
        assert_eq!(optoma.power_on, vec!["tx 10:04", "tx 10:82:10:00", "tx 10:04"]);
        assert_eq!(optoma.command_delay, Duration::from_secs(1));
        assert_eq!(optoma.retry_count, 3);
        assert_eq!(optoma.power_off_delay, Some(Duration::from_millis(500)));

        let nec = registry.lookup(VendorId::Nec);
        assert_eq!(nec.power_on.len(), 2);
        assert_eq!(nec.command_delay, Duration::from_secs(2));
        assert_eq!(nec.retry_count, 2);
        assert_eq!(nec.required_protocol_version.as_deref(), Some("1.4"));

        let epson = registry.lookup(VendorId::Epson);
        assert_eq!(epson.power_on.first().map(String::as_str), Some("tx 10:8C"));
        assert_eq!(epson.command_delay, Duration::from_millis(1500));
        assert!(epson.requires_link_reset);

        let samsung = registry.lookup(VendorId::Samsung);
        assert_eq!(samsung.retry_count, 1);
        assert_eq!(samsung.input_frame("TV"), Some("tx 4F:9D:00:00"));

        let lg = registry.lookup(VendorId::Lg);
        assert_eq!(lg.input_frame("hdmi3"), Some("tx 10:44:F3"));
        assert_eq!(lg.input_frame("tv"), None);
    }

    #[test]
    fn test_vendor_labels() {
        assert_eq!(VendorId::from_label(" NEC "), VendorId::Nec);
        assert_eq!(VendorId::from_label("sony"), VendorId::Generic);
        assert_eq!(VendorId::Lg.to_string(), "lg");
        assert_eq!(
            serde_json::to_string(&VendorId::Optoma).unwrap(),
            "\"optoma\""
        );
    }

    #[test]
    fn test_generic_inputs() {
        assert_eq!(generic_input_frame("HDMI2"), Some("tx 4F:82:20:00"));
        assert_eq!(generic_input_frame("tv"), None);
    }
}
