//! Fuzz target: `build_submission`
//!
//! Any accepted payload must come back as a JSON object carrying the
//! device metadata, whatever keys the caller sent.
//!
//! cargo fuzz run fuzz_submission

#![no_main]

use coretest::app::status::NetworkStatus;
use coretest::web::submit::{FIRMWARE_VERSION, SubmissionMeta, build_submission};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let network = NetworkStatus::default();
    let meta = SubmissionMeta {
        device_id: "CORE_ESP32_0",
        uptime_ms: 1,
        network: &network,
    };
    if let Ok(out) = build_submission(data, &meta) {
        let v: serde_json::Value = serde_json::from_str(&out).expect("valid JSON");
        assert_eq!(v["device_id"], "CORE_ESP32_0");
        assert_eq!(v["firmware_version"], FIRMWARE_VERSION);
    }
});
