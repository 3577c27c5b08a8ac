//! Application state management

use anyhow::Result;
use cecd_core::PolicyRegistry;
use cecd_engine::{new_ledger, Clock, Orchestrator, SystemClock};
use cecd_transmit::{CecClient, FrameTransmitter};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::export::save_export;

/// Shared application state
pub struct AppState {
    /// The single entry point to the display
    pub orchestrator: Orchestrator,
    /// Configuration
    pub config: Config,
}

impl AppState {
    /// Create application state talking to the real CEC tools
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let transmitter = Arc::new(CecClient::new(config.to_client_config()));
        Self::with_transmitter(config, transmitter, Arc::new(SystemClock))
    }

    pub fn with_transmitter(
        config: Config,
        transmitter: Arc<dyn FrameTransmitter>,
        clock: Arc<dyn Clock>,
    ) -> Result<Arc<Self>> {
        let orchestrator_config = config.to_orchestrator_config();
        if let Some(vendor) = orchestrator_config.vendor_override {
            info!(vendor = %vendor, "Vendor detection disabled by configuration");
        }

        let orchestrator = Orchestrator::new(
            transmitter,
            clock,
            new_ledger(),
            PolicyRegistry::builtin(),
            orchestrator_config,
        );

        Ok(Arc::new(Self {
            orchestrator,
            config,
        }))
    }

    /// Persist the current export view to the configured directory
    pub async fn save_export(&self) -> Result<PathBuf> {
        let bundle = self.orchestrator.export().await;
        save_export(&bundle, &self.config.export.dir).await
    }
}
