//! Cloud relay for `/api/submit-data`.
//!
//! The caller's JSON object is forwarded to the configured endpoint with
//! the device metadata merged in. Metadata keys overwrite caller keys of
//! the same name.

use serde_json::{Map, Value, json};

use crate::app::ports::{CloudError, CloudPort, CloudResponse};
use crate::app::status::NetworkStatus;

use super::request::RequestError;

/// Reported in every submission.
pub const FIRMWARE_VERSION: &str = "1.0.0";

/// Sent as `User-Agent` by the cloud adapter.
pub const USER_AGENT: &str = "CORE-ESP32/1.0.0";

/// Largest upstream response body kept for the reply.
pub const MAX_RESPONSE_LEN: usize = 1024;

/// Device facts attached to a submission.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionMeta<'a> {
    pub device_id: &'a str,
    pub uptime_ms: u64,
    pub network: &'a NetworkStatus,
}

/// Merge the metadata into `raw`, which must be a JSON object.
pub fn build_submission(raw: &[u8], meta: &SubmissionMeta<'_>) -> Result<String, RequestError> {
    let mut doc: Map<String, Value> =
        serde_json::from_slice(raw).map_err(|_| RequestError::InvalidJson)?;

    doc.insert("device_id".into(), meta.device_id.into());
    doc.insert("firmware_version".into(), FIRMWARE_VERSION.into());
    doc.insert(
        "submission_timestamp".into(),
        meta.uptime_ms.to_string().into(),
    );
    doc.insert("network_status".into(), meta.network.ssid.as_str().into());
    doc.insert(
        "signal_strength".into(),
        meta.network.rssi.map_or(0, i32::from).into(),
    );
    doc.insert(
        "local_ip".into(),
        meta.network
            .local_ip
            .map(|ip| ip.to_string())
            .unwrap_or_default()
            .into(),
    );
    serde_json::to_string(&doc).map_err(|_| RequestError::InvalidJson)
}

/// Post `body` and describe the result the way the web UI expects.
pub fn relay(cloud: &mut impl CloudPort, url: &str, body: &str) -> Value {
    match cloud.post_json(url, body) {
        Ok(resp) => describe(&resp),
        Err(e) => failure(e),
    }
}

fn describe(resp: &CloudResponse) -> Value {
    // Upstream JSON is embedded as-is, anything else as a string.
    let response = serde_json::from_str::<Value>(&resp.body)
        .unwrap_or_else(|_| Value::String(resp.body.clone()));
    let (success, message) = if resp.is_success() {
        (true, "Data submitted successfully")
    } else {
        (false, "Server error")
    };
    json!({
        "success": success,
        "message": message,
        "http_code": resp.status,
        "response": response,
    })
}

fn failure(e: CloudError) -> Value {
    json!({
        "success": false,
        "message": format!("HTTP request failed: {}", e),
    })
}
