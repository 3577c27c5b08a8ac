//! Configuration loading

use anyhow::Result;
use cecd_core::VendorId;
use cecd_engine::OrchestratorConfig;
use cecd_transmit::CecClientConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub cec: CecConfig,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Bind address for the HTTP server
    #[serde(default = "default_bind")]
    pub bind: String,
    /// TLS configuration (optional - enables HTTPS when present)
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            tls: None,
        }
    }
}

/// TLS/HTTPS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM format)
    pub cert: String,
    /// Path to private key file (PEM format)
    pub key: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CecConfig {
    /// CEC client binary used for every transmission
    #[serde(default = "default_client_path")]
    pub client_path: String,
    /// Binary used for the protocol version side channel
    #[serde(default = "default_ctl_path")]
    pub ctl_path: String,
    /// Adapter index passed to the side channel
    #[serde(default)]
    pub adapter_port: u8,
    /// Fixed display vendor, skipping detection (`auto` or unset detects)
    #[serde(default)]
    pub vendor: Option<String>,
}

impl Default for CecConfig {
    fn default() -> Self {
        Self {
            client_path: default_client_path(),
            ctl_path: default_ctl_path(),
            adapter_port: 0,
            vendor: None,
        }
    }
}

fn default_client_path() -> String {
    "cec-client".to_string()
}

fn default_ctl_path() -> String {
    "cec-ctl".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_serial_device")]
    pub device: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            device: default_serial_device(),
            baud_rate: default_baud_rate(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_serial_device() -> String {
    "/dev/ttyGS0".to_string()
}

fn default_baud_rate() -> u32 {
    115200
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory export files are written to
    #[serde(default = "default_export_dir")]
    pub dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: default_export_dir(),
        }
    }
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

impl Config {
    pub fn to_client_config(&self) -> CecClientConfig {
        CecClientConfig {
            client_path: self.cec.client_path.clone(),
            ctl_path: self.cec.ctl_path.clone(),
            adapter: self.cec.adapter_port,
            ..CecClientConfig::default()
        }
    }

    pub fn to_orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            vendor_override: self.cec.vendor.as_deref().and_then(parse_vendor),
        }
    }
}

/// Configured vendor label, `None` to keep detection on
fn parse_vendor(label: &str) -> Option<VendorId> {
    let label = label.trim();
    if label.is_empty() || label.eq_ignore_ascii_case("auto") {
        return None;
    }
    match VendorId::from_label(label) {
        VendorId::Generic if !label.eq_ignore_ascii_case(VendorId::Generic.as_str()) => {
            warn!(vendor = %label, "Unknown vendor in configuration, using detection");
            None
        }
        vendor => Some(vendor),
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("cecd.toml")).unwrap();
        assert_eq!(config.daemon.bind, "0.0.0.0:8080");
        assert_eq!(config.serial.device, "/dev/ttyGS0");
        assert_eq!(config.serial.baud_rate, 115200);
        assert!(config.serial.enabled);
        assert_eq!(config.cec.client_path, "cec-client");
        assert!(config.to_orchestrator_config().vendor_override.is_none());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cecd.toml");
        std::fs::write(
            &path,
            "[cec]\nvendor = \"NEC\"\nadapter_port = 1\n\n[serial]\nenabled = false\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(
            config.to_orchestrator_config().vendor_override,
            Some(VendorId::Nec)
        );
        assert_eq!(config.to_client_config().adapter, 1);
        assert_eq!(config.to_client_config().ctl_path, "cec-ctl");
        assert!(!config.serial.enabled);
        assert_eq!(config.export.dir, PathBuf::from("/tmp"));
    }

    #[test]
    fn test_vendor_labels() {
        let with_vendor = |label: &str| {
            let mut config = Config::default();
            config.cec.vendor = Some(label.to_string());
            config.to_orchestrator_config().vendor_override
        };
        assert_eq!(with_vendor("epson"), Some(VendorId::Epson));
        assert_eq!(with_vendor("Generic"), Some(VendorId::Generic));
        assert_eq!(with_vendor("auto"), None);
        assert_eq!(with_vendor("  "), None);
        // Typos fall back to detection instead of pinning the generic policy
        assert_eq!(with_vendor("optmoa"), None);
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cecd.toml");
        std::fs::write(&path, "[daemon\nbind = ").unwrap();
        assert!(load_config(&path).is_err());
    }
}
