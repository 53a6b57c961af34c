//! Web API served over the captive portal.
//!
//! ```text
//!  EspHttpServer ──▶ HttpRequest ──▶ WebApi::handle ──▶ CommandPort ──▶ control loop
//!                                        │
//!                                        └──▶ CloudPort (submit-data relay)
//! ```
//!
//! Everything in here is transport-free: the HTTP server adapter builds an
//! [`HttpRequest`], hands it to [`WebApi`](router::WebApi) and writes back
//! the [`HttpResponse`]. The whole API is therefore testable on the host
//! with a scripted [`CommandPort`](crate::app::ports::CommandPort).

pub mod request;
pub mod router;
pub mod status;
pub mod submit;

pub use request::{HttpRequest, Method, RequestError};
pub use router::WebApi;

/// Content types the API answers with.
pub const CONTENT_JSON: &str = "application/json";
pub const CONTENT_TEXT: &str = "text/plain";

/// A finished response, ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpResponse {
    pub fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: CONTENT_JSON,
            body,
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: CONTENT_TEXT,
            body: body.into(),
        }
    }

    /// `{"success":<ok>,"message":"<message>"}`
    pub fn outcome(status: u16, ok: bool, message: &str) -> Self {
        Self::json(
            status,
            serde_json::json!({ "success": ok, "message": message }).to_string(),
        )
    }

    pub fn method_not_allowed() -> Self {
        Self::outcome(405, false, "Method not allowed")
    }

    pub fn not_found() -> Self {
        Self::text(404, "Not found")
    }

    /// Reason phrase for the status line.
    pub fn reason(&self) -> &'static str {
        match self.status {
            200 => "OK",
            400 => "Bad Request",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            500 => "Internal Server Error",
            503 => "Service Unavailable",
            _ => "",
        }
    }
}
