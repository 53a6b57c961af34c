//! Web API end to end: [`WebApi`] in front of a host control loop.
//!
//! Requests go through [`DirectPort`], which applies them to a shared
//! [`Bench`] as the remote surface, so every reply reflects real FSM state.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Value, json};

use coretest::app::commands::ControlSurface;
use coretest::app::ports::{CloudError, CloudPort, CloudResponse, SettingsPort};
use coretest::config::{BrokerSettings, DEFAULT_CLOUD_URL};
use coretest::fsm::StateId;
use coretest::web::{HttpRequest, HttpResponse, Method, WebApi};

use crate::mock_hw::{lockstep_config, Bench, DeadPort, DirectPort};

const DEVICE_ID: &str = "CORE_ESP32_a1286f24";

// ── Harness ───────────────────────────────────────────────────

#[derive(Default)]
struct CloudLog {
    answer: Option<Result<CloudResponse, CloudError>>,
    sent: Vec<(String, String)>,
}

/// Upstream endpoint with a scripted answer; 200 `{}` by default.
#[derive(Clone, Default)]
struct ScriptedCloud(Rc<RefCell<CloudLog>>);

impl ScriptedCloud {
    fn answer(&self, answer: Result<CloudResponse, CloudError>) {
        self.0.borrow_mut().answer = Some(answer);
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.0.borrow().sent.clone()
    }
}

impl CloudPort for ScriptedCloud {
    fn post_json(&mut self, url: &str, body: &str) -> Result<CloudResponse, CloudError> {
        let mut log = self.0.borrow_mut();
        log.sent.push((url.into(), body.into()));
        log.answer.clone().unwrap_or(Ok(CloudResponse {
            status: 200,
            body: "{}".into(),
        }))
    }
}

struct Web {
    bench: Rc<RefCell<Bench>>,
    cloud: ScriptedCloud,
    api: WebApi<DirectPort, ScriptedCloud>,
}

impl Web {
    fn over(bench: Bench) -> Self {
        let bench = Rc::new(RefCell::new(bench));
        let cloud = ScriptedCloud::default();
        let api = WebApi::new(DirectPort(bench.clone()), cloud.clone(), DEVICE_ID);
        Self { bench, cloud, api }
    }

    fn remote() -> Self {
        Self::over(Bench::remote())
    }

    fn get(&mut self, uri: &str) -> HttpResponse {
        self.api.handle(&HttpRequest::new(Method::Get, uri, b""))
    }

    fn post(&mut self, uri: &str, body: &str) -> HttpResponse {
        self.api
            .handle(&HttpRequest::new(Method::Post, uri, body.as_bytes()))
    }

    fn state(&self) -> StateId {
        self.bench.borrow().app.state()
    }
}

fn body(resp: &HttpResponse) -> Value {
    serde_json::from_str(&resp.body).expect("JSON body")
}

fn outcome(ok: bool, message: &str) -> Value {
    json!({ "success": ok, "message": message })
}

// ── /status ───────────────────────────────────────────────────

#[test]
fn status_reports_live_readings() {
    let mut web = Web::remote();
    {
        let mut b = web.bench.borrow_mut();
        b.hw.set_current_ma(150.0);
        b.tick_at(100);
    }

    let resp = web.get("/status");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.content_type, "application/json");
    let v = body(&resp);
    assert_eq!(v["voltage"], json!(24.0));
    assert_eq!(v["current"], json!(0.15));
    assert_eq!(v["resistance"], json!(160.0));
    assert_eq!(v["state"], "STOP");
    assert_eq!(v["menu"], "STOP");
    assert_eq!(v["control"], "remote");
    assert_eq!(v["countdownActive"], false);
    assert_eq!(v["autoInjectionActive"], false);
    assert_eq!(v["wifiConnected"], false);
    assert_eq!(v["wifiSSID"], "");
    assert!(v.get("countdownTime").is_none());
    assert!(v.get("countdownEndTime").is_none());
}

#[test]
fn status_is_served_in_local_mode() {
    let mut web = Web::over(Bench::new());
    let resp = web.get("/status");
    assert_eq!(resp.status, 200);
    assert_eq!(body(&resp)["control"], "local");
}

// ── /set_amplitude ────────────────────────────────────────────

#[test]
fn set_amplitude_by_value_and_state() {
    let mut web = Web::remote();

    let resp = web.get("/set_amplitude?value=50");
    assert_eq!((resp.status, resp.body.as_str()), (200, "OK"));
    assert_eq!(resp.content_type, "text/plain");
    assert_eq!(web.bench.borrow().hw.last_dac(), Some(127));

    let resp = web.get("/set_amplitude?state=RUNTIME");
    assert_eq!((resp.status, resp.body.as_str()), (200, "OK"));
    assert_eq!(web.state(), StateId::TimedRun);
    assert!((web.bench.borrow().app.amplitude().value() - 0.5).abs() < 1e-6);

    let v = body(&web.get("/status"));
    assert_eq!(v["state"], "RUN");
    assert_eq!(v["menu"], "RUNTIME");
    assert_eq!(v["countdownActive"], true);
    assert_eq!(v["countdownTime"], "02:00");
    assert_eq!(v["countdownEndTime"], json!(120_000));
}

#[test]
fn set_amplitude_rejects_bad_arguments() {
    let mut web = Web::remote();
    for uri in [
        "/set_amplitude",
        "/set_amplitude?value=abc",
        "/set_amplitude?value=",
        "/set_amplitude?state=PAUSE",
        "/set_amplitude?state=run",
    ] {
        let resp = web.get(uri);
        assert_eq!((resp.status, resp.body.as_str()), (400, "Bad Request"), "{uri}");
    }
    assert_eq!(web.state(), StateId::Stopped);
    assert_eq!(web.bench.borrow().hw.dac, vec![0]);
}

#[test]
fn set_amplitude_refused_while_injecting() {
    let mut web = Web::remote();
    web.post("/api/auto-injection", "action=inject");
    let resp = web.get("/set_amplitude?value=10");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, "Auto-injection in progress");
    assert_eq!(web.state(), StateId::Ramping);
}

// ── /api/auto-injection ───────────────────────────────────────

#[test]
fn auto_injection_inject_record_stop() {
    let mut web = Web::over(Bench::with_config(lockstep_config()));
    {
        let b = &mut *web.bench.borrow_mut();
        b.app.set_surface(ControlSurface::Remote, &mut b.sink);
        b.hw.attach_load(400.0);
    }

    let resp = web.post("/api/auto-injection", "action=inject");
    assert_eq!(resp.status, 200);
    assert_eq!(
        body(&resp),
        json!({ "success": true, "message": "Injecting 200mA", "duration": 3 })
    );

    let resp = web.post("/api/auto-injection", "action=record");
    assert_eq!(body(&resp), outcome(false, "Cannot start recording"));

    assert!(web
        .bench
        .borrow_mut()
        .run_while(60_000, 100, |app| app.state() == StateId::Holding));
    let v = body(&web.get("/status"));
    assert_eq!(v["targetReached"], true);
    assert_eq!(v["autoInjectionActive"], true);

    let resp = web.post("/api/auto-injection?action=record", "");
    assert_eq!(
        body(&resp),
        json!({ "success": true, "message": "Recording started", "duration": 120 })
    );
    assert_eq!(web.state(), StateId::Recording);

    let resp = web.post("/api/auto-injection", "action=stop");
    assert_eq!(body(&resp), outcome(true, "Stopped"));
    assert_eq!(web.state(), StateId::Stopped);
    assert_eq!(web.bench.borrow().hw.last_dac(), Some(0));
}

#[test]
fn auto_injection_accepts_start_alias() {
    let mut web = Web::remote();
    let resp = web.post("/api/auto-injection", "action=start");
    assert_eq!(body(&resp)["message"], "Injecting 200mA");
    let resp = web.post("/api/auto-injection", "action=start");
    assert_eq!(body(&resp), outcome(false, "Already injecting"));
}

#[test]
fn auto_injection_rejects_unknown_action() {
    let mut web = Web::remote();
    for form in ["", "action=", "action=pause", "mode=inject"] {
        let resp = web.post("/api/auto-injection", form);
        assert_eq!(resp.status, 400, "{form:?}");
        assert_eq!(body(&resp), outcome(false, "Invalid action"));
    }
    assert_eq!(web.state(), StateId::Stopped);
}

// ── /api/inject ───────────────────────────────────────────────

#[test]
fn quick_inject_sets_fixed_amplitude() {
    let mut web = Web::remote();
    let resp = web.post("/api/inject", r#"{"mode":"quick","amplitude":42}"#);
    assert_eq!(resp.status, 200);
    assert_eq!(body(&resp), outcome(true, "Quick: 42% set"));
    assert_eq!(web.state(), StateId::Running);
    assert_eq!(web.bench.borrow().hw.last_dac(), Some(107));

    let resp = web.post("/api/inject", r#"{"amplitude":250}"#);
    assert_eq!(body(&resp), outcome(true, "Quick: 100% set"));
}

#[test]
fn special_inject_arms_auto_injection() {
    let mut web = Web::remote();
    let resp = web.post("/api/inject", r#"{"mode":"special","duration":30}"#);
    assert_eq!(body(&resp), outcome(true, "Special: Auto-increment to 200mA"));
    assert_eq!(web.state(), StateId::Ramping);

    let resp = web.post("/api/inject", r#"{"mode":"special","duration":0}"#);
    assert_eq!(resp.status, 400);
    assert_eq!(body(&resp)["success"], false);
}

#[test]
fn inject_body_errors() {
    let mut web = Web::remote();
    let resp = web.post("/api/inject", "");
    assert_eq!(resp.status, 400);
    assert_eq!(body(&resp), json!({ "error": "No data" }));

    let resp = web.post("/api/inject", "{mode: quick");
    assert_eq!(resp.status, 400);
    assert_eq!(body(&resp), json!({ "error": "Invalid JSON" }));

    assert_eq!(web.state(), StateId::Stopped);
}

// ── /api/stop ─────────────────────────────────────────────────

#[test]
fn stop_from_any_state() {
    let mut web = Web::remote();
    web.get("/set_amplitude?state=RUN");
    web.get("/set_amplitude?value=80");
    let resp = web.post("/api/stop", "");
    assert_eq!(body(&resp), outcome(true, "Stopped"));
    assert_eq!(web.state(), StateId::Stopped);
    assert!(web.bench.borrow().app.amplitude().is_zero());

    // Idempotent.
    assert_eq!(body(&web.post("/api/stop", "")), outcome(true, "Stopped"));
}

// ── Surface, transport and routing errors ─────────────────────

#[test]
fn local_mode_refuses_web_control() {
    let mut web = Web::over(Bench::new());

    let resp = web.post("/api/stop", "");
    assert_eq!(resp.status, 403);
    assert_eq!(body(&resp), outcome(false, "Control surface disabled"));

    let resp = web.get("/set_amplitude?value=50");
    assert_eq!((resp.status, resp.body.as_str()), (403, "Control surface disabled"));

    let resp = web.post("/api/inject", r#"{"amplitude":50}"#);
    assert_eq!(resp.status, 403);
    assert_eq!(web.bench.borrow().hw.dac, vec![0]);
}

#[test]
fn unresponsive_control_loop_is_503() {
    let mut api = WebApi::new(DeadPort, ScriptedCloud::default(), DEVICE_ID);

    let resp = api.handle(&HttpRequest::new(Method::Get, "/status", b""));
    assert_eq!(resp.status, 503);
    assert_eq!(body(&resp), outcome(false, "control loop timeout"));

    let resp = api.handle(&HttpRequest::new(Method::Get, "/set_amplitude?value=1", b""));
    assert_eq!((resp.status, resp.body.as_str()), (503, "control loop timeout"));
}

#[test]
fn routing_errors() {
    let mut web = Web::remote();

    let resp = web.get("/nope");
    assert_eq!((resp.status, resp.body.as_str()), (404, "Not found"));

    for (method, uri) in [
        (Method::Post, "/status"),
        (Method::Post, "/set_amplitude?value=1"),
        (Method::Get, "/api/stop"),
        (Method::Get, "/api/inject"),
        (Method::Other, "/api/wifi"),
        (Method::Get, "/api/cloud"),
    ] {
        let resp = web.api.handle(&HttpRequest::new(method, uri, b""));
        assert_eq!(resp.status, 405, "{uri}");
        assert_eq!(body(&resp), outcome(false, "Method not allowed"));
    }
    assert_eq!(web.bench.borrow().hw.dac, vec![0]);
}

// ── /api/wifi, /api/wifi-reset ────────────────────────────────

#[test]
fn wifi_settings_saved_and_applied() {
    let mut web = Web::remote();
    let resp = web.post(
        "/api/wifi",
        "ssid=Lab+Net&password=hunter2hunter2&cloudServer=http%3A%2F%2F10.0.0.2%2Fingest",
    );
    assert_eq!(resp.status, 200);
    assert_eq!(body(&resp)["success"], true);

    let b = web.bench.borrow();
    let saved = b.store.load_settings().unwrap();
    assert_eq!(saved.ssid.as_str(), "Lab Net");
    assert_eq!(saved.password.as_str(), "hunter2hunter2");
    assert_eq!(saved.cloud_url.as_str(), "http://10.0.0.2/ingest");
    assert_eq!(b.wifi.sim_connect_calls(), 1);
}

#[test]
fn wifi_defaults_cloud_server() {
    let mut web = Web::remote();
    web.post("/api/wifi", "ssid=Lab&password=&cloudServer=");
    let saved = web.bench.borrow().store.load_settings().unwrap();
    assert_eq!(saved.cloud_url.as_str(), DEFAULT_CLOUD_URL);
    assert!(saved.password.is_empty());
}

#[test]
fn wifi_rejects_bad_settings() {
    let mut web = Web::remote();

    let resp = web.post("/api/wifi", "ssid=&password=whatever1");
    assert_eq!(resp.status, 400);
    assert_eq!(body(&resp), outcome(false, "SSID is required"));

    let resp = web.post("/api/wifi", "ssid=Lab&password=short");
    assert_eq!(resp.status, 400);
    assert_eq!(body(&resp)["success"], false);

    let resp = web.post("/api/wifi", "ssid=Lab&cloudServer=ftp%3A%2F%2Fhost");
    assert_eq!(resp.status, 400);

    assert_eq!(web.bench.borrow().wifi.sim_connect_calls(), 0);
}

#[test]
fn wifi_reset_restores_defaults() {
    let mut web = Web::remote();
    web.post("/api/wifi", "ssid=Lab&password=hunter2hunter2");
    web.bench.borrow_mut().tick_at(100);
    assert_eq!(body(&web.get("/status"))["wifiSSID"], "Lab");

    let resp = web.post("/api/wifi-reset", "");
    assert_eq!(body(&resp), outcome(true, "WiFi settings reset to defaults"));
    let status = body(&web.get("/status"));
    assert_eq!(status["wifiSSID"], "");
    assert_eq!(status["wifiConnected"], false);
    let saved = web.bench.borrow().store.load_settings().unwrap();
    assert!(saved.ssid.is_empty());
    assert_eq!(saved.cloud_url.as_str(), DEFAULT_CLOUD_URL);
}

// ── /api/cloud ────────────────────────────────────────────────

#[test]
fn cloud_settings_saved() {
    let mut web = Web::remote();
    let resp = web.post(
        "/api/cloud",
        "host=mq.lab&port=8883&user=bench&pass=hunter22&clientId=core-07&topic=lab%2Fcore",
    );
    assert_eq!(resp.status, 200);
    assert_eq!(body(&resp), outcome(true, "MQTT settings saved"));

    let b = web.bench.borrow();
    let saved = b.store.load_broker().unwrap();
    assert_eq!(saved.host.as_str(), "mq.lab");
    assert_eq!(saved.port, 8883);
    assert_eq!(saved.client_id.as_str(), "core-07");
    assert_eq!(saved.topic.as_str(), "lab/core");
    assert_eq!(b.supervisor.broker(), &saved);
    assert_eq!(b.wifi.sim_connect_calls(), 0);
}

#[test]
fn cloud_settings_require_host_and_port() {
    let mut web = Web::remote();

    let resp = web.post("/api/cloud", "host=&port=1883");
    assert_eq!(resp.status, 400);
    assert_eq!(body(&resp), outcome(false, "MQTT host is required"));

    let resp = web.post("/api/cloud", "host=mq.lab&port=eighty");
    assert_eq!(resp.status, 400);
    assert_eq!(body(&resp), outcome(false, "Invalid MQTT port"));

    assert_eq!(
        web.bench.borrow().store.load_broker().unwrap(),
        BrokerSettings::default()
    );
}

#[test]
fn cloud_settings_cleared_by_wifi_reset() {
    let mut web = Web::remote();
    web.post("/api/cloud", "host=mq.lab&topic=lab%2Fcore");
    assert_eq!(web.bench.borrow().store.load_broker().unwrap().port, 1883);

    web.post("/api/wifi-reset", "");
    assert_eq!(
        web.bench.borrow().store.load_broker().unwrap(),
        BrokerSettings::default()
    );
}

// ── /api/submit-data ──────────────────────────────────────────

/// Remote web API with the station associated to `Lab` and the cloud
/// endpoint at `http://10.0.0.2/ingest`.
fn connected() -> Web {
    let mut web = Web::remote();
    web.post(
        "/api/wifi",
        "ssid=Lab&password=hunter2hunter2&cloudServer=http://10.0.0.2/ingest",
    );
    web.bench.borrow_mut().tick_at(100);
    assert_eq!(body(&web.get("/status"))["wifiConnected"], true);
    web
}

#[test]
fn submit_requires_station_link() {
    let mut web = Web::remote();
    let resp = web.post("/api/submit-data", r#"{"sample":1}"#);
    assert_eq!(resp.status, 200);
    assert_eq!(body(&resp), outcome(false, "WiFi not connected"));
    assert!(web.cloud.sent().is_empty());
}

#[test]
fn submit_rejects_non_object_payloads() {
    let mut web = connected();
    for payload in ["", "not json", "[1,2]", "42"] {
        let resp = web.post("/api/submit-data", payload);
        assert_eq!(body(&resp), outcome(false, "Invalid JSON data"), "{payload:?}");
    }
    assert!(web.cloud.sent().is_empty());
}

#[test]
fn submit_relays_payload_with_device_metadata() {
    let mut web = connected();
    web.cloud.answer(Ok(CloudResponse {
        status: 201,
        body: r#"{"id":7}"#.into(),
    }));

    let resp = web.post("/api/submit-data", r#"{"sample":1,"device_id":"spoofed"}"#);
    assert_eq!(
        body(&resp),
        json!({
            "success": true,
            "message": "Data submitted successfully",
            "http_code": 201,
            "response": { "id": 7 },
        })
    );

    let sent = web.cloud.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "http://10.0.0.2/ingest");
    let upstream: Value = serde_json::from_str(&sent[0].1).unwrap();
    assert_eq!(upstream["sample"], 1);
    assert_eq!(upstream["device_id"], DEVICE_ID);
    assert_eq!(upstream["firmware_version"], "1.0.0");
    assert_eq!(upstream["submission_timestamp"], "100");
    assert_eq!(upstream["network_status"], "Lab");
    assert_eq!(upstream["signal_strength"], -58);
    assert_eq!(upstream["local_ip"], "10.0.0.42");
}

#[test]
fn submit_reports_upstream_failures() {
    let mut web = connected();

    web.cloud.answer(Ok(CloudResponse {
        status: 500,
        body: "oops".into(),
    }));
    let v = body(&web.post("/api/submit-data", "{}"));
    assert_eq!(v["success"], false);
    assert_eq!(v["message"], "Server error");
    assert_eq!(v["http_code"], 500);
    assert_eq!(v["response"], "oops");

    web.cloud.answer(Err(CloudError::RequestFailed));
    let v = body(&web.post("/api/submit-data", "{}"));
    assert_eq!(v, outcome(false, "HTTP request failed: cloud request failed"));
}
