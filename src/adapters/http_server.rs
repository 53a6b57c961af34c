//! ESP-IDF HTTP server front end for the [`WebApi`].
//!
//! Every route is registered for GET and POST; the API itself answers 405
//! for the wrong one.  Handlers run on the server's own task and reach the
//! control loop only through the [`RemoteClient`] inside the API, so the
//! shared `WebApi` lock is held for one request at a time.

use std::sync::{Arc, Mutex};

use esp_idf_svc::http::Method as SvcMethod;
use esp_idf_svc::http::server::{Configuration, EspHttpConnection, EspHttpServer, Request};
use esp_idf_svc::io::{EspIOError, Read, Write};
use esp_idf_svc::sys::EspError;
use log::{info, warn};

use crate::app::arbiter::RemoteClient;
use crate::app::ports::CloudPort;
use crate::web::request::MAX_BODY_LEN;
use crate::web::{HttpRequest, HttpResponse, Method, WebApi};

/// Paths served by the API.
pub const ROUTES: [&str; 9] = [
    "/status",
    "/set_amplitude",
    "/api/auto-injection",
    "/api/inject",
    "/api/stop",
    "/api/wifi",
    "/api/wifi-reset",
    "/api/cloud",
    "/api/submit-data",
];

/// Handler task stack; the cloud relay runs TLS on it.
const SERVER_STACK_SIZE: usize = 16 * 1024;

type SharedApi<U> = Arc<Mutex<WebApi<RemoteClient<'static>, U>>>;

/// Start the server. Keep the returned handle alive for as long as the
/// API should be served.
pub fn start<U>(api: WebApi<RemoteClient<'static>, U>) -> Result<EspHttpServer<'static>, EspError>
where
    U: CloudPort + Send + 'static,
{
    let mut server = EspHttpServer::new(&Configuration {
        stack_size: SERVER_STACK_SIZE,
        max_uri_handlers: ROUTES.len() * 2,
        ..Default::default()
    })?;
    let api: SharedApi<U> = Arc::new(Mutex::new(api));

    for path in ROUTES {
        for (svc, method) in [(SvcMethod::Get, Method::Get), (SvcMethod::Post, Method::Post)] {
            let api = api.clone();
            server.fn_handler(path, svc, move |req| serve(&api, method, req))?;
        }
    }
    info!("HTTP server listening ({} routes)", ROUTES.len());
    Ok(server)
}

fn serve<U: CloudPort>(
    api: &SharedApi<U>,
    method: Method,
    mut req: Request<&mut EspHttpConnection<'_>>,
) -> Result<(), EspIOError> {
    let uri = req.uri().to_owned();
    let body = match read_body(&mut req) {
        Ok(b) => b,
        Err(resp) => return respond(req, &resp),
    };

    let resp = match api.lock() {
        Ok(mut api) => api.handle(&HttpRequest::new(method, &uri, &body)),
        Err(_) => {
            warn!("HTTP: API lock poisoned");
            HttpResponse::outcome(500, false, "Internal error")
        }
    };
    respond(req, &resp)
}

fn read_body(req: &mut Request<&mut EspHttpConnection<'_>>) -> Result<Vec<u8>, HttpResponse> {
    let mut body = Vec::new();
    let mut buf = [0u8; 256];
    loop {
        let n = req
            .read(&mut buf)
            .map_err(|_| HttpResponse::outcome(400, false, "Body read failed"))?;
        if n == 0 {
            return Ok(body);
        }
        if body.len() + n > MAX_BODY_LEN {
            return Err(HttpResponse::outcome(400, false, "Request body too large"));
        }
        body.extend_from_slice(&buf[..n]);
    }
}

fn respond(
    req: Request<&mut EspHttpConnection<'_>>,
    resp: &HttpResponse,
) -> Result<(), EspIOError> {
    let headers = [
        ("Content-Type", resp.content_type),
        ("Access-Control-Allow-Origin", "*"),
    ];
    let mut out = req.into_response(resp.status, Some(resp.reason()), &headers)?;
    out.write_all(resp.body.as_bytes())?;
    Ok(())
}
