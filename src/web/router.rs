//! Endpoint dispatch.
//!
//! | Path                  | Method | Reply                          |
//! |-----------------------|--------|--------------------------------|
//! | `/status`             | GET    | status JSON                    |
//! | `/set_amplitude`      | GET    | `OK` / `Bad Request` (text)    |
//! | `/api/auto-injection` | POST   | `{success, message[, duration]}` |
//! | `/api/inject`         | POST   | `{success, message}`           |
//! | `/api/stop`           | POST   | `{success, message}`           |
//! | `/api/wifi`           | POST   | `{success, message}`           |
//! | `/api/wifi-reset`     | POST   | `{success, message}`           |
//! | `/api/cloud`          | POST   | `{success, message}`           |
//! | `/api/submit-data`    | POST   | relay result                   |
//!
//! A known path with the wrong method answers 405. Rejections from the
//! control loop map to: surface disabled 403, bad parameter 400, storage
//! 500, anything else 200 with `success: false`. A control loop that does
//! not answer gives 503.

use log::{debug, warn};
use serde_json::json;

use crate::app::commands::{Ack, AppCommand, AutoInjectionAction, NetworkCommand, Outcome, Request};
use crate::app::ports::{BridgeError, CloudPort, CommandPort};
use crate::config::{BrokerSettings, DEFAULT_BROKER_PORT, DEFAULT_CLOUD_URL, NetworkSettings};
use crate::error::CommandError;
use crate::fsm::MenuSelection;

use super::request::{HttpRequest, InjectMode, InjectRequest, Method, RequestError, parse_percent};
use super::status::StatusJson;
use super::submit::{SubmissionMeta, build_submission, relay};
use super::HttpResponse;

/// Nominal ramp time quoted by the inject action (s).
const INJECT_DURATION_SECS: u32 = 3;

/// Why a command did not produce an [`Ack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    Bridge(BridgeError),
    Rejected(CommandError),
}

impl Failure {
    fn status(self) -> u16 {
        match self {
            Self::Bridge(_) => 503,
            Self::Rejected(CommandError::SurfaceDisabled) => 403,
            Self::Rejected(CommandError::InvalidParameter(_)) => 400,
            Self::Rejected(CommandError::StorageFailed) => 500,
            Self::Rejected(_) => 200,
        }
    }

    fn message(self) -> String {
        match self {
            Self::Bridge(e) => e.to_string(),
            Self::Rejected(e) => e.to_string(),
        }
    }

    fn json(self) -> HttpResponse {
        HttpResponse::outcome(self.status(), false, &self.message())
    }

    fn text(self) -> HttpResponse {
        HttpResponse::text(self.status(), &self.message())
    }
}

/// Request handler shared by every route.
pub struct WebApi<C, U> {
    commands: C,
    cloud: U,
    device_id: String,
}

impl<C: CommandPort, U: CloudPort> WebApi<C, U> {
    pub fn new(commands: C, cloud: U, device_id: &str) -> Self {
        Self {
            commands,
            cloud,
            device_id: device_id.into(),
        }
    }

    pub fn handle(&mut self, req: &HttpRequest<'_>) -> HttpResponse {
        debug!("HTTP {:?} {}", req.method, req.path);
        match (req.method, req.path) {
            (Method::Get, "/status") => self.status(),
            (Method::Get, "/set_amplitude") => self.set_amplitude(req),
            (Method::Post, "/api/auto-injection") => self.auto_injection(req),
            (Method::Post, "/api/inject") => self.inject(req),
            (Method::Post, "/api/stop") => self.stop(),
            (Method::Post, "/api/wifi") => self.wifi(req),
            (Method::Post, "/api/wifi-reset") => self.wifi_reset(),
            (Method::Post, "/api/cloud") => self.cloud_settings(req),
            (Method::Post, "/api/submit-data") => self.submit_data(req),
            (_, path) if is_route(path) => HttpResponse::method_not_allowed(),
            _ => HttpResponse::not_found(),
        }
    }

    fn run(&self, request: impl Into<Request>) -> Result<Ack, Failure> {
        match self.commands.request(request.into()) {
            Ok(Ok(ack)) => Ok(ack),
            Ok(Err(e)) => Err(Failure::Rejected(e)),
            Err(e) => {
                warn!("HTTP: control loop unavailable: {}", e);
                Err(Failure::Bridge(e))
            }
        }
    }

    // ── Routes ────────────────────────────────────────────────

    fn status(&self) -> HttpResponse {
        match self.run(AppCommand::GetStatus) {
            Ok(ack) => HttpResponse::json(200, StatusJson::from_snapshot(&ack.status).to_json()),
            Err(f) => f.json(),
        }
    }

    fn set_amplitude(&self, req: &HttpRequest<'_>) -> HttpResponse {
        let cmd = if let Some(value) = req.arg("value") {
            match parse_percent(&value) {
                Ok(percent) => AppCommand::SetAmplitudePercent(percent),
                Err(_) => return HttpResponse::text(400, "Bad Request"),
            }
        } else if let Some(state) = req.arg("state") {
            match MenuSelection::parse(&state) {
                Some(menu) => AppCommand::SelectMenu(menu),
                None => return HttpResponse::text(400, "Bad Request"),
            }
        } else {
            return HttpResponse::text(400, "Bad Request");
        };

        match self.run(cmd) {
            Ok(_) => HttpResponse::text(200, "OK"),
            Err(f) => f.text(),
        }
    }

    fn auto_injection(&self, req: &HttpRequest<'_>) -> HttpResponse {
        let Some(action) = req.arg("action").as_deref().and_then(AutoInjectionAction::parse)
        else {
            return HttpResponse::outcome(400, false, "Invalid action");
        };

        match self.run(AppCommand::AutoInjection(action)) {
            Ok(ack) => match ack.outcome {
                Outcome::InjectionStarted { target_ma } => HttpResponse::json(
                    200,
                    json!({
                        "success": true,
                        "message": format!("Injecting {:.0}mA", target_ma),
                        "duration": INJECT_DURATION_SECS,
                    })
                    .to_string(),
                ),
                Outcome::RecordingStarted { duration_secs } => HttpResponse::json(
                    200,
                    json!({
                        "success": true,
                        "message": "Recording started",
                        "duration": duration_secs,
                    })
                    .to_string(),
                ),
                _ => HttpResponse::outcome(200, true, "Stopped"),
            },
            Err(f) => f.json(),
        }
    }

    fn inject(&self, req: &HttpRequest<'_>) -> HttpResponse {
        let parsed = match InjectRequest::parse(req.body) {
            Ok(p) => p,
            Err(e) => return request_error(e),
        };
        let cmd = match parsed.mode {
            InjectMode::Special => AppCommand::SpecialInject {
                window_secs: parsed.duration_secs,
            },
            InjectMode::Quick => AppCommand::QuickInject {
                percent: parsed.amplitude,
            },
        };

        match self.run(cmd) {
            Ok(ack) => {
                let message = match ack.outcome {
                    Outcome::QuickApplied { percent } => format!("Quick: {:.0}% set", percent),
                    Outcome::SpecialArmed { target_ma, .. } => {
                        format!("Special: Auto-increment to {:.0}mA", target_ma)
                    }
                    _ => "OK".into(),
                };
                HttpResponse::outcome(200, true, &message)
            }
            Err(f) => f.json(),
        }
    }

    fn stop(&self) -> HttpResponse {
        match self.run(AppCommand::Stop) {
            Ok(_) => HttpResponse::outcome(200, true, "Stopped"),
            Err(f) => f.json(),
        }
    }

    fn wifi(&self, req: &HttpRequest<'_>) -> HttpResponse {
        let ssid = req.arg("ssid").unwrap_or_default();
        if ssid.is_empty() {
            return HttpResponse::outcome(400, false, "SSID is required");
        }
        let password = req.arg("password").unwrap_or_default();
        let cloud = req
            .arg("cloudServer")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_CLOUD_URL.into());

        let settings = match NetworkSettings::new(&ssid, &password, &cloud) {
            Ok(s) => s,
            Err(e) => return HttpResponse::outcome(400, false, &e.to_string()),
        };
        match self.run(NetworkCommand::Update(settings)) {
            Ok(_) => HttpResponse::outcome(
                200,
                true,
                "WiFi settings saved. Connecting in the background; the access point stays up.",
            ),
            Err(f) => f.json(),
        }
    }

    fn wifi_reset(&self) -> HttpResponse {
        match self.run(NetworkCommand::Reset) {
            Ok(_) => HttpResponse::outcome(200, true, "WiFi settings reset to defaults"),
            Err(f) => f.json(),
        }
    }

    fn cloud_settings(&self, req: &HttpRequest<'_>) -> HttpResponse {
        let host = req.arg("host").unwrap_or_default();
        if host.is_empty() {
            return HttpResponse::outcome(400, false, "MQTT host is required");
        }
        let port = match req.arg("port").filter(|p| !p.is_empty()) {
            None => DEFAULT_BROKER_PORT,
            Some(p) => match p.trim().parse::<u16>() {
                Ok(port) => port,
                Err(_) => return HttpResponse::outcome(400, false, "Invalid MQTT port"),
            },
        };
        let field = |name: &str| req.arg(name).unwrap_or_default();
        let broker = match BrokerSettings::new(
            &host,
            port,
            &field("user"),
            &field("pass"),
            &field("clientId"),
            &field("topic"),
        ) {
            Ok(b) => b,
            Err(e) => return HttpResponse::outcome(400, false, &e.to_string()),
        };
        match self.run(NetworkCommand::SetBroker(broker)) {
            Ok(_) => HttpResponse::outcome(200, true, "MQTT settings saved"),
            Err(f) => f.json(),
        }
    }

    fn submit_data(&mut self, req: &HttpRequest<'_>) -> HttpResponse {
        let status = match self.run(AppCommand::GetStatus) {
            Ok(ack) => ack.status,
            Err(f) => return f.json(),
        };
        if !status.network.connected {
            return HttpResponse::outcome(200, false, "WiFi not connected");
        }

        let meta = SubmissionMeta {
            device_id: &self.device_id,
            uptime_ms: status.uptime_ms,
            network: &status.network,
        };
        let body = match build_submission(req.body, &meta) {
            Ok(b) => b,
            Err(_) => return HttpResponse::outcome(200, false, "Invalid JSON data"),
        };
        let result = relay(&mut self.cloud, &status.network.cloud_url, &body);
        HttpResponse::json(200, result.to_string())
    }
}

fn is_route(path: &str) -> bool {
    matches!(
        path,
        "/status"
            | "/set_amplitude"
            | "/api/auto-injection"
            | "/api/inject"
            | "/api/stop"
            | "/api/wifi"
            | "/api/wifi-reset"
            | "/api/cloud"
            | "/api/submit-data"
    )
}

/// Body errors on `/api/inject` use the `{"error": ...}` shape.
fn request_error(e: RequestError) -> HttpResponse {
    HttpResponse::json(400, json!({ "error": e.to_string() }).to_string())
}
