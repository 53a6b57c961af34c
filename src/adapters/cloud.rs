//! Cloud relay adapter: one JSON POST per submission.
//!
//! Implements [`CloudPort`].
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::http::client` with the
//!   built-in certificate bundle for `https://` endpoints.  A fresh
//!   connection is opened per request; submissions are rare.
//! - **all other targets**: records the request and answers `200 {}`.

use core::time::Duration;

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{CloudError, CloudPort, CloudResponse};
#[cfg(target_os = "espidf")]
use crate::web::submit::{MAX_RESPONSE_LEN, USER_AGENT};

/// Whole-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn check_url(url: &str) -> Result<(), CloudError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(CloudError::InvalidUrl)
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF implementation
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct CloudAdapter {
    timeout: Duration,
}

#[cfg(target_os = "espidf")]
impl CloudAdapter {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn exchange(&self, url: &str, body: &str) -> Result<CloudResponse, esp_idf_svc::sys::EspError> {
        use esp_idf_svc::http::Method;
        use esp_idf_svc::http::client::{Configuration, EspHttpConnection};

        let mut conn = EspHttpConnection::new(&Configuration {
            timeout: Some(self.timeout),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        })?;

        let len = body.len().to_string();
        let headers = [
            ("Content-Type", "application/json"),
            ("User-Agent", USER_AGENT),
            ("Content-Length", len.as_str()),
        ];
        conn.initiate_request(Method::Post, url, &headers)?;

        let mut sent = body.as_bytes();
        while !sent.is_empty() {
            let n = conn.write(sent)?;
            sent = &sent[n..];
        }
        conn.initiate_response()?;
        let status = conn.status();

        let mut raw = Vec::new();
        let mut buf = [0u8; 256];
        while raw.len() < MAX_RESPONSE_LEN {
            let n = conn.read(&mut buf)?;
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
        }
        raw.truncate(MAX_RESPONSE_LEN);

        Ok(CloudResponse {
            status,
            body: String::from_utf8_lossy(&raw).into_owned(),
        })
    }
}

#[cfg(target_os = "espidf")]
impl CloudPort for CloudAdapter {
    fn post_json(&mut self, url: &str, body: &str) -> Result<CloudResponse, CloudError> {
        check_url(url)?;
        info!("Cloud: POST {} ({} bytes)", url, body.len());
        let resp = self.exchange(url, body).map_err(|e| {
            warn!("Cloud: request to {} failed: {}", url, e);
            CloudError::RequestFailed
        })?;
        info!("Cloud: HTTP {}", resp.status);
        Ok(resp)
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation implementation (host / test)
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
pub struct CloudAdapter {
    sent: Vec<(String, String)>,
}

#[cfg(not(target_os = "espidf"))]
impl CloudAdapter {
    pub fn new(_timeout: Duration) -> Self {
        Self { sent: Vec::new() }
    }

    /// `(url, body)` of every accepted request.
    pub fn sent(&self) -> &[(String, String)] {
        &self.sent
    }
}

#[cfg(not(target_os = "espidf"))]
impl CloudPort for CloudAdapter {
    fn post_json(&mut self, url: &str, body: &str) -> Result<CloudResponse, CloudError> {
        check_url(url)?;
        info!("[sim] Cloud: POST {} ({} bytes)", url, body.len());
        self.sent.push((url.into(), body.into()));
        Ok(CloudResponse {
            status: 200,
            body: "{}".into(),
        })
    }
}
