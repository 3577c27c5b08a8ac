//! Orchestration facade
//!
//! The single entry point for transports. Device-directed commands run
//! under one async mutex for their whole duration, sleeps included, so two
//! callers never interleave frames on the bus and the ledger reads in
//! execution order. Ledger views only take the ledger's read lock.

use cecd_core::command::frames;
use cecd_core::history::CommandLogSummary;
use cecd_core::{
    describe_devices, external_devices, generic_input_frame, AttemptKind, CommandAttempt,
    CoreCommand, DeviceRecord, ExportBundle, Outcome, PolicyRegistry, VendorId,
};
use cecd_transmit::{FrameTransmitter, COMMAND_TIMEOUT, SCAN_TIMEOUT, STATUS_TIMEOUT};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::detector::detect_vendor;
use crate::envelope::{CommandError, Request, Response};
use crate::link::{Link, Sent, SharedLedger};
use crate::sequencer::PowerSequencer;

#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Skip detection and always use this vendor
    pub vendor_override: Option<VendorId>,
}

/// State owned by whoever holds the device lock
struct Session {
    link: Link,
    /// Vendor tag for commands that don't run detection themselves
    last_vendor: Option<VendorId>,
}

/// Result of a dispatched command before it becomes a [`Response`]
struct Reply {
    ok: bool,
    text: String,
}

impl Reply {
    fn new(ok: bool, text: impl Into<String>) -> Self {
        Self {
            ok,
            text: text.into(),
        }
    }

    fn from_sent(sent: &Sent) -> Self {
        Self::new(sent.success(), sent.attempt.detail.clone())
    }

    fn into_response(self, command: &str) -> Response {
        if self.ok {
            Response::success(command, self.text)
        } else {
            Response::error(command, self.text)
        }
    }
}

fn to_json<T: Serialize>(command: &str, value: &T) -> Response {
    match serde_json::to_string_pretty(value) {
        Ok(json) => Response::success(command, json),
        Err(e) => Response::error(command, format!("Failed to serialize result: {}", e)),
    }
}

/// `tx ...` in any case, normalised to a lower-case prefix
fn normalize_raw_frame(command: &str) -> Option<String> {
    let prefix = command.get(..frames::TX_PREFIX.len())?;
    prefix
        .eq_ignore_ascii_case(frames::TX_PREFIX)
        .then(|| format!("{}{}", frames::TX_PREFIX, command[prefix.len()..].trim()))
}

pub struct Orchestrator {
    session: Mutex<Session>,
    ledger: SharedLedger,
    registry: PolicyRegistry,
    clock: Arc<dyn Clock>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        transmitter: Arc<dyn FrameTransmitter>,
        clock: Arc<dyn Clock>,
        ledger: SharedLedger,
        registry: PolicyRegistry,
        config: OrchestratorConfig,
    ) -> Self {
        let link = Link::new(transmitter, clock.clone(), ledger.clone());
        Self {
            session: Mutex::new(Session {
                link,
                last_vendor: config.vendor_override,
            }),
            ledger,
            registry,
            clock,
            config,
        }
    }

    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }

    /// Run one request to completion
    pub async fn execute(&self, request: Request) -> Response {
        let name = request.name();
        info!(command = %name, "Processing command");

        if let Some(response) = self.execute_admin(&name, &request).await {
            return response;
        }

        let mut session = self.session.lock().await;
        match self.dispatch(&mut session, &name, &request).await {
            Ok(reply) => reply.into_response(&name),
            Err(e) => self.reject(&session, &name, &request.command, e).await,
        }
    }

    /// Parse a JSON envelope and run it
    pub async fn execute_json(&self, line: &str) -> Response {
        match Request::from_json(line) {
            Ok(request) => self.execute(request).await,
            Err(e) => {
                let session = self.session.lock().await;
                self.reject(&session, "", line.trim(), e).await
            }
        }
    }

    /// Record input that never parsed as a request and answer it
    pub async fn reject_malformed(&self, raw: &str, reason: impl Into<String>) -> Response {
        let session = self.session.lock().await;
        let error = CommandError::MalformedRequest(reason.into());
        self.reject(&session, "", raw, error).await
    }

    /// Scan the bus for external devices
    pub async fn scan_devices(&self) -> Result<Vec<DeviceRecord>, String> {
        let session = self.session.lock().await;
        let (sent, devices) = self.scan_locked(&session).await;
        devices.ok_or(sent.attempt.detail)
    }

    pub async fn history(&self, count: Option<usize>) -> CommandLogSummary {
        let history = self.ledger.read().await;
        match count {
            Some(n) => CommandLogSummary {
                recent_commands: history.last_n(n).to_vec(),
                successful_commands: history.successful_count(),
                total_commands: history.len(),
            },
            None => history.summary(),
        }
    }

    pub async fn export(&self) -> ExportBundle {
        self.ledger.read().await.export_bundle(self.clock.now())
    }

    /// Drop the command history, after any command in flight
    pub async fn clear_history(&self) {
        let _session = self.session.lock().await;
        self.ledger.write().await.clear();
        info!("Command history cleared");
    }

    /// Commands that never touch the bus
    async fn execute_admin(&self, name: &str, request: &Request) -> Option<Response> {
        let response = match name {
            "PING" => Response::success(name, "pong"),
            "HISTORY" | "LOG" => to_json(name, &self.history(request.count).await),
            "EXPORT" => to_json(name, &self.export().await),
            "CLEAR_HISTORY" => {
                self.clear_history().await;
                Response::success(name, "Command history cleared")
            }
            _ => return None,
        };
        Some(response)
    }

    async fn dispatch(
        &self,
        session: &mut Session,
        name: &str,
        request: &Request,
    ) -> Result<Reply, CommandError> {
        match name {
            "" => Err(CommandError::MalformedRequest("missing command".to_string())),
            "POWER_ON" => {
                let vendor = self.resolve_vendor(session).await;
                let result = PowerSequencer::new(self.registry.lookup(vendor), &session.link)
                    .power_on()
                    .await;
                Ok(Reply::new(result.success, result.message()))
            }
            "POWER_OFF" => {
                let vendor = self.resolve_vendor(session).await;
                let result = PowerSequencer::new(self.registry.lookup(vendor), &session.link)
                    .power_off()
                    .await;
                Ok(Reply::new(result.success, result.message()))
            }
            "STATUS" | "POWER_STATUS" => {
                let vendor = self.resolve_vendor(session).await;
                let sent = session
                    .link
                    .send(frames::POWER_STATUS, STATUS_TIMEOUT, Some(vendor))
                    .await;
                Ok(Reply::new(
                    sent.success(),
                    format!("Vendor: {}\n{}", vendor, sent.attempt.detail),
                ))
            }
            "SCAN" => {
                let (sent, devices) = self.scan_locked(session).await;
                Ok(match devices {
                    Some(devices) => Reply::new(true, describe_devices(&devices)),
                    None => Reply::from_sent(&sent),
                })
            }
            "INPUT" => self.switch_input(session, request).await,
            "CUSTOM" => {
                let command = request
                    .cec_command
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .ok_or_else(|| {
                        CommandError::MalformedRequest("CUSTOM requires cec_command".to_string())
                    })?;
                let command = normalize_raw_frame(command).unwrap_or_else(|| command.to_string());
                Ok(self.send_direct(session, &command).await)
            }
            "DEVICE_INFO" => Ok(self.device_info(session).await),
            _ => {
                if let Some(frame) = normalize_raw_frame(request.command.trim()) {
                    return Ok(self.send_direct(session, &frame).await);
                }
                let core: CoreCommand = name
                    .parse()
                    .map_err(|e: cecd_core::ParseCommandError| CommandError::UnknownCommand(e.0))?;
                Ok(self.send_direct(session, &core.frame()).await)
            }
        }
    }

    /// Record a request that never reached the bus and build its error response
    ///
    /// `name` is echoed to the caller, `command` is what the ledger keeps.
    async fn reject(
        &self,
        session: &Session,
        name: &str,
        command: &str,
        error: CommandError,
    ) -> Response {
        warn!(command = %command, error = %error, "Rejected command");
        let attempt = CommandAttempt::new(
            command,
            AttemptKind::Rejected,
            session.last_vendor,
            Outcome::Failed,
            error.to_string(),
            self.clock.now(),
        );
        session.link.record(attempt).await;
        Response::error(name, error.to_string())
    }

    async fn resolve_vendor(&self, session: &mut Session) -> VendorId {
        let vendor = match self.config.vendor_override {
            Some(vendor) => {
                debug!(vendor = %vendor, "Using configured vendor");
                vendor
            }
            None => detect_vendor(&session.link).await,
        };
        session.last_vendor = Some(vendor);
        vendor
    }

    async fn send_direct(&self, session: &Session, command: &str) -> Reply {
        let sent = session
            .link
            .send(command, COMMAND_TIMEOUT, session.last_vendor)
            .await;
        Reply::from_sent(&sent)
    }

    async fn scan_locked(&self, session: &Session) -> (Sent, Option<Vec<DeviceRecord>>) {
        let sent = session
            .link
            .send(frames::SCAN, SCAN_TIMEOUT, session.last_vendor)
            .await;
        let devices = sent
            .report
            .clean_stdout()
            .map(|text| external_devices(text).collect());
        (sent, devices)
    }

    async fn switch_input(&self, session: &mut Session, request: &Request) -> Result<Reply, CommandError> {
        let input = request
            .input
            .as_deref()
            .map(|i| i.trim().to_lowercase())
            .filter(|i| !i.is_empty())
            .ok_or_else(|| CommandError::MalformedRequest("INPUT requires input".to_string()))?;

        let vendor = self.resolve_vendor(session).await;
        let frame = self
            .registry
            .lookup(vendor)
            .input_frame(&input)
            .or_else(|| generic_input_frame(&input))
            .ok_or_else(|| CommandError::MalformedRequest(format!("Unknown input: {}", input)))?;

        info!(input = %input, vendor = %vendor, "Switching input");
        let sent = session.link.send(frame, COMMAND_TIMEOUT, Some(vendor)).await;
        Ok(Reply::from_sent(&sent))
    }

    async fn device_info(&self, session: &Session) -> Reply {
        #[derive(Serialize)]
        struct DeviceInfo {
            scan: String,
            vendor_id: String,
            physical_address: String,
            osd_name: String,
            cec_version: String,
        }

        let (sent, devices) = self.scan_locked(session).await;
        let scan = match devices {
            Some(devices) => describe_devices(&devices),
            None => sent.attempt.detail,
        };
        let info = DeviceInfo {
            scan,
            vendor_id: self.send_direct(session, frames::GIVE_VENDOR_ID).await.text,
            physical_address: self.send_direct(session, frames::GIVE_PHYSICAL_ADDRESS).await.text,
            osd_name: self.send_direct(session, frames::GIVE_OSD_NAME).await.text,
            cec_version: self.send_direct(session, frames::GET_CEC_VERSION).await.text,
        };
        match serde_json::to_string_pretty(&info) {
            Ok(json) => Reply::new(true, json),
            Err(e) => Reply::new(false, format!("Failed to serialize device info: {}", e)),
        }
    }
}
