//! Vendor detection from a bus scan

use cecd_core::command::frames;
use cecd_core::{external_devices, parse_scan, VendorId};
use cecd_transmit::SCAN_TIMEOUT;
use tracing::{debug, info, warn};

use crate::link::Link;

/// Pick a vendor from raw scan output
///
/// Keywords are matched in [`VendorId::DETECTION_ORDER`] against the vendor
/// labels and OSD names of external devices. Output without any device
/// blocks is matched as a whole instead.
pub fn classify_scan(text: &str) -> VendorId {
    let haystack = if parse_scan(text).next().is_some() {
        external_devices(text)
            .map(|d| {
                format!(
                    "{} {}",
                    d.vendor.unwrap_or_default(),
                    d.name.unwrap_or_default()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        text.to_string()
    }
    .to_lowercase();

    VendorId::DETECTION_ORDER
        .into_iter()
        .find(|v| haystack.contains(v.as_str()))
        .unwrap_or(VendorId::Generic)
}

/// Scan the bus and classify the attached display
///
/// Never fails: a scan that times out or errors yields `Generic`.
pub async fn detect_vendor(link: &Link) -> VendorId {
    let sent = link.send(frames::SCAN, SCAN_TIMEOUT, None).await;
    match sent.report.clean_stdout() {
        Some(text) => {
            let vendor = classify_scan(text);
            info!(vendor = %vendor, "Detected vendor");
            vendor
        }
        None => {
            warn!(detail = %sent.attempt.detail, "Vendor detection failed, using generic");
            debug!(outcome = ?sent.attempt.outcome, "Detection scan outcome");
            VendorId::Generic
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::new_ledger;
    use crate::testing::{MockClock, StubTransmitter};
    use std::sync::Arc;

    #[test]
    fn test_classify_device_blocks() {
        let text = "device #0: TV\nvendor: NEC\nosd string: PA1004UL\n\
                    device #1: Recorder 1\nvendor: Pulse Eight\nosd string: CECTester\n";
        assert_eq!(classify_scan(text), VendorId::Nec);
    }

    #[test]
    fn test_classify_priority() {
        let text = "device #0: TV\nvendor: Samsung\n\
                    device #4: Playback 1\nvendor: Epson\n";
        assert_eq!(classify_scan(text), VendorId::Epson);
    }

    #[test]
    fn test_self_device_ignored() {
        // "connection" would match "nec" if the whole text were searched
        let text = "opening a connection to the CEC adapter...\n\
                    device #1: Recorder 1\nvendor: Pulse Eight\nosd string: CECTester\n";
        assert_eq!(classify_scan(text), VendorId::Generic);
    }

    #[test]
    fn test_classify_unstructured_text() {
        assert_eq!(classify_scan("Found an OPTOMA projector"), VendorId::Optoma);
        assert_eq!(classify_scan(""), VendorId::Generic);
    }

    #[tokio::test]
    async fn test_detect_from_scan() {
        let stub = Arc::new(StubTransmitter::new().with_display("Optoma"));
        let ledger = new_ledger();
        let link = Link::new(stub.clone(), Arc::new(MockClock::new()), ledger.clone());

        assert_eq!(detect_vendor(&link).await, VendorId::Optoma);
        assert_eq!(stub.sent(), vec!["scan"]);
        assert_eq!(ledger.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_detect_falls_back_on_timeout() {
        let stub = Arc::new(StubTransmitter::new().with_display("Epson").timing_out("scan"));
        let link = Link::new(stub, Arc::new(MockClock::new()), new_ledger());
        assert_eq!(detect_vendor(&link).await, VendorId::Generic);
    }

    #[tokio::test]
    async fn test_detect_falls_back_on_failure() {
        let stub = Arc::new(StubTransmitter::new().with_display("Epson").failing("scan", 1));
        let link = Link::new(stub, Arc::new(MockClock::new()), new_ledger());
        assert_eq!(detect_vendor(&link).await, VendorId::Generic);
    }
}
