//! Logical command table
//!
//! Transports speak in logical names (`POWER_ON`, `HDMI_2`, `NUMBER_7`).
//! This module maps them to the command strings understood by `cec-client`.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Raw frames and `cec-client` commands shared across the crate
pub mod frames {
    pub const POWER_ON: &str = "on 0";
    pub const STANDBY: &str = "standby 0";
    pub const POWER_STATUS: &str = "pow 0";
    pub const SCAN: &str = "scan";

    pub const IMAGE_VIEW_ON: &str = "tx 10:04";
    pub const ACTIVE_SOURCE_HDMI1: &str = "tx 10:82:10:00";
    pub const GIVE_VENDOR_ID: &str = "tx 10:8C";
    pub const GIVE_PHYSICAL_ADDRESS: &str = "tx 10:83";
    pub const GIVE_OSD_NAME: &str = "tx 10:46";
    pub const GET_CEC_VERSION: &str = "tx 10:9F";

    pub const HDMI_1: &str = "tx 4F:82:10:00";
    pub const HDMI_2: &str = "tx 4F:82:20:00";
    pub const HDMI_3: &str = "tx 4F:82:30:00";
    pub const HDMI_4: &str = "tx 4F:82:40:00";

    /// Prefix of a raw frame transmission
    pub const TX_PREFIX: &str = "tx ";
}

/// True if the command is a raw frame transmission (`tx ...`)
pub fn is_raw_frame(command: &str) -> bool {
    command.starts_with(frames::TX_PREFIX)
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown command: {0}")]
pub struct ParseCommandError(pub String);

/// Fixed set of logical commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoreCommand {
    PowerOn,
    PowerOff,
    PowerStatus,
    Hdmi(u8),
    ActiveSource,
    InactiveSource,
    VolumeUp,
    VolumeDown,
    Mute,
    Scan,
    VendorId,
    PhysicalAddress,
    OsdName,
    CecVersion,
    Up,
    Down,
    Left,
    Right,
    Select,
    Back,
    Menu,
    Exit,
    Number(u8),
}

impl CoreCommand {
    /// Every command in the table, in a stable order
    pub fn all() -> Vec<CoreCommand> {
        use CoreCommand::*;
        let mut all = vec![PowerOn, PowerOff, PowerStatus];
        all.extend((1..=4).map(Hdmi));
        all.extend([
            ActiveSource,
            InactiveSource,
            VolumeUp,
            VolumeDown,
            Mute,
            Scan,
            VendorId,
            PhysicalAddress,
            OsdName,
            CecVersion,
            Up,
            Down,
            Left,
            Right,
            Select,
            Back,
            Menu,
            Exit,
        ]);
        all.extend((0..=9).map(Number));
        all
    }

    /// Logical name as used on the wire
    pub fn name(&self) -> String {
        use CoreCommand::*;
        match self {
            PowerOn => "POWER_ON".into(),
            PowerOff => "POWER_OFF".into(),
            PowerStatus => "POWER_STATUS".into(),
            Hdmi(n) => format!("HDMI_{}", n),
            ActiveSource => "ACTIVE_SOURCE".into(),
            InactiveSource => "INACTIVE_SOURCE".into(),
            VolumeUp => "VOLUME_UP".into(),
            VolumeDown => "VOLUME_DOWN".into(),
            Mute => "MUTE".into(),
            Scan => "SCAN".into(),
            VendorId => "VENDOR_ID".into(),
            PhysicalAddress => "PHYSICAL_ADDRESS".into(),
            OsdName => "OSD_NAME".into(),
            CecVersion => "CEC_VERSION".into(),
            Up => "UP".into(),
            Down => "DOWN".into(),
            Left => "LEFT".into(),
            Right => "RIGHT".into(),
            Select => "SELECT".into(),
            Back => "BACK".into(),
            Menu => "MENU".into(),
            Exit => "EXIT".into(),
            Number(n) => format!("NUMBER_{}", n),
        }
    }

    /// The `cec-client` command string for this logical command
    pub fn frame(&self) -> String {
        use CoreCommand::*;
        match self {
            PowerOn => frames::POWER_ON.into(),
            PowerOff => frames::STANDBY.into(),
            PowerStatus => frames::POWER_STATUS.into(),
            Hdmi(n) => format!("tx 4F:82:{}0:00", n),
            ActiveSource => "as".into(),
            InactiveSource => "is".into(),
            VolumeUp => "volup".into(),
            VolumeDown => "voldown".into(),
            Mute => "mute".into(),
            Scan => frames::SCAN.into(),
            VendorId => frames::GIVE_VENDOR_ID.into(),
            PhysicalAddress => frames::GIVE_PHYSICAL_ADDRESS.into(),
            OsdName => frames::GIVE_OSD_NAME.into(),
            CecVersion => frames::GET_CEC_VERSION.into(),
            Up => "tx 10:44:01".into(),
            Down => "tx 10:44:02".into(),
            Left => "tx 10:44:03".into(),
            Right => "tx 10:44:04".into(),
            Select => "tx 10:44:00".into(),
            // BACK and EXIT share the same user-control code
            Back | Exit => "tx 10:44:0D".into(),
            Menu => "tx 10:44:09".into(),
            Number(n) => format!("tx 10:44:2{}", n),
        }
    }
}

impl FromStr for CoreCommand {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use CoreCommand::*;
        let name = s.trim().to_uppercase();

        let digit = |prefix: &str, max: u8| -> Option<u8> {
            let rest = name.strip_prefix(prefix)?;
            let n: u8 = rest.parse().ok()?;
            (rest.len() == 1 && n <= max).then_some(n)
        };
        if let Some(n) = digit("HDMI_", 4).filter(|n| *n >= 1) {
            return Ok(Hdmi(n));
        }
        if let Some(n) = digit("NUMBER_", 9) {
            return Ok(Number(n));
        }

        let cmd = match name.as_str() {
            "POWER_ON" => PowerOn,
            "POWER_OFF" => PowerOff,
            "POWER_STATUS" => PowerStatus,
            "ACTIVE_SOURCE" => ActiveSource,
            "INACTIVE_SOURCE" => InactiveSource,
            "VOLUME_UP" => VolumeUp,
            "VOLUME_DOWN" => VolumeDown,
            "MUTE" => Mute,
            "SCAN" => Scan,
            "VENDOR_ID" => VendorId,
            "PHYSICAL_ADDRESS" => PhysicalAddress,
            "OSD_NAME" => OsdName,
            "CEC_VERSION" => CecVersion,
            "UP" => Up,
            "DOWN" => Down,
            "LEFT" => Left,
            "RIGHT" => Right,
            "SELECT" => Select,
            "BACK" => Back,
            "MENU" => Menu,
            "EXIT" => Exit,
            _ => return Err(ParseCommandError(s.trim().to_string())),
        };
        Ok(cmd)
    }
}
