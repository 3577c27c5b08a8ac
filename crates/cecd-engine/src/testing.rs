//! Test doubles for the transmitter and the clock

use async_trait::async_trait;
use cecd_transmit::{FrameTransmitter, ProcessOutput, TransmitError};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use crate::clock::Clock;

/// Scripted CEC bus
pub struct StubTransmitter {
    scan_output: String,
    power_label: String,
    timeouts: HashSet<String>,
    /// Command -> number of upcoming sends that report failure
    failures: Mutex<HashMap<String, usize>>,
    version_fails: bool,
    sent: Mutex<Vec<String>>,
    versions: Mutex<Vec<String>>,
}

impl StubTransmitter {
    pub fn new() -> Self {
        Self {
            scan_output: String::new(),
            power_label: "on".to_string(),
            timeouts: HashSet::new(),
            failures: Mutex::new(HashMap::new()),
            version_fails: false,
            sent: Mutex::new(Vec::new()),
            versions: Mutex::new(Vec::new()),
        }
    }

    /// Scan output announcing a single display from `vendor`
    pub fn with_display(self, vendor: &str) -> Self {
        let scan = format!(
            "device #0: TV\naddress: 0.0.0.0\nvendor: {}\nosd string: Display\npower status: standby\n\
             device #1: Recorder 1\naddress: 1.0.0.0\nvendor: Pulse Eight\nosd string: CECTester\n",
            vendor
        );
        self.with_scan(&scan)
    }

    pub fn with_scan(mut self, output: &str) -> Self {
        self.scan_output = output.to_string();
        self
    }

    /// Label answered to every power status query
    pub fn with_power(mut self, label: &str) -> Self {
        self.power_label = label.to_string();
        self
    }

    pub fn timing_out(mut self, command: &str) -> Self {
        self.timeouts.insert(command.to_string());
        self
    }

    /// Fail the next `times` sends of `command`
    pub fn failing(self, command: &str, times: usize) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(command.to_string(), times);
        self
    }

    pub fn with_failing_version_change(mut self) -> Self {
        self.version_fails = true;
        self
    }

    /// Commands received so far, in order
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn versions(&self) -> Vec<String> {
        self.versions.lock().unwrap().clone()
    }

    fn respond(&self, command: &str) -> Result<ProcessOutput, TransmitError> {
        if self.timeouts.contains(command) {
            return Err(TransmitError::Timeout(Duration::from_secs(15)));
        }

        let mut failures = self.failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(command).filter(|n| **n > 0) {
            *remaining -= 1;
            return Ok(ProcessOutput {
                stdout: String::new(),
                stderr: "transmit failed".to_string(),
                exit_code: Some(1),
            });
        }

        let stdout = match command {
            "scan" => self.scan_output.clone(),
            "pow 0" => format!("power status: {}\n", self.power_label),
            _ => String::new(),
        };
        Ok(ProcessOutput {
            stdout,
            stderr: String::new(),
            exit_code: Some(0),
        })
    }
}

#[async_trait]
impl FrameTransmitter for StubTransmitter {
    async fn transmit(&self, command: &str, _timeout: Duration) -> Result<ProcessOutput, TransmitError> {
        self.sent.lock().unwrap().push(command.to_string());
        // Give concurrent callers a chance to interleave if nothing stops them
        tokio::task::yield_now().await;
        self.respond(command)
    }

    async fn set_protocol_version(&self, version: &str) -> Result<(), TransmitError> {
        self.versions.lock().unwrap().push(version.to_string());
        if self.version_fails {
            Err(TransmitError::SideChannel("cec-ctl not installed".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Clock that records sleeps and returns immediately
pub struct MockClock {
    start: DateTime<Utc>,
    sleeps: Mutex<Vec<Duration>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            start: Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap(),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

#[async_trait]
impl Clock for MockClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }

    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.total_slept()).unwrap_or_default();
        self.start + elapsed
    }
}
