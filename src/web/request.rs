//! Request model and argument parsing.
//!
//! Arguments are looked up the way the web UI sends them: first in the
//! query string, then in an `application/x-www-form-urlencoded` body.
//! JSON bodies are only read by the endpoints that take them.

use serde::Deserialize;

/// Largest body the server reads.
pub const MAX_BODY_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Other,
}

impl Method {
    pub fn parse(s: &str) -> Self {
        match s {
            "GET" => Self::Get,
            "POST" => Self::Post,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    /// A POST that needs a body arrived without one.
    NoData,
    /// Body is not valid JSON, or not a JSON object.
    InvalidJson,
    /// A required argument is absent or empty.
    MissingArg(&'static str),
    /// An argument is present but does not parse.
    BadValue(&'static str),
    /// Body exceeds [`MAX_BODY_LEN`].
    TooLarge,
}

impl core::fmt::Display for RequestError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoData => write!(f, "No data"),
            Self::InvalidJson => write!(f, "Invalid JSON"),
            Self::MissingArg(name) => write!(f, "missing argument '{}'", name),
            Self::BadValue(name) => write!(f, "invalid value for '{}'", name),
            Self::TooLarge => write!(f, "request body too large"),
        }
    }
}

/// One decoded request. Borrowed from the transport's buffers.
#[derive(Debug, Clone, Copy)]
pub struct HttpRequest<'a> {
    pub method: Method,
    pub path: &'a str,
    /// Raw query string without the leading `?`.
    pub query: &'a str,
    pub body: &'a [u8],
}

impl<'a> HttpRequest<'a> {
    /// Split a request URI into path and query.
    pub fn new(method: Method, uri: &'a str, body: &'a [u8]) -> Self {
        let (path, query) = uri.split_once('?').unwrap_or((uri, ""));
        Self {
            method,
            path,
            query,
            body,
        }
    }

    /// Named argument from the query string or a form body.
    pub fn arg(&self, name: &str) -> Option<String> {
        if let Some(v) = form_value(self.query, name) {
            return Some(v);
        }
        self.form_body().and_then(|body| form_value(body, name))
    }

    /// Body as UTF-8 when it looks like form data rather than JSON.
    fn form_body(&self) -> Option<&'a str> {
        let body = core::str::from_utf8(self.body).ok()?;
        let trimmed = body.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('{') || trimmed.starts_with('[') {
            return None;
        }
        Some(body)
    }
}

/// Find `name` in `a=1&b=2` style input and decode its value. The first
/// occurrence wins; a key without `=` has an empty value.
pub fn form_value(input: &str, name: &str) -> Option<String> {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .find_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (url_decode(key) == name).then(|| url_decode(value))
        })
}

/// Decode `+` and `%XX` escapes. Malformed escapes are kept literally and
/// invalid UTF-8 is replaced.
pub fn url_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .filter(|h| h.iter().all(u8::is_ascii_hexdigit))
                    .and_then(|h| core::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                match hex {
                    Some(b) => {
                        out.push(b);
                        i += 2;
                    }
                    None => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Parse a 0–100 percentage argument. Range is enforced by the amplitude
/// clamp, not here.
pub fn parse_percent(value: &str) -> Result<f32, RequestError> {
    value
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or(RequestError::BadValue("value"))
}

// ── /api/inject body ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InjectMode {
    /// Fixed amplitude, RUN without countdown.
    Quick,
    /// Auto-injection with a custom recording window.
    Special,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InjectRequest {
    pub mode: InjectMode,
    /// Percent, quick mode only.
    pub amplitude: f32,
    /// Seconds, special mode only.
    pub duration_secs: Option<u32>,
}

#[derive(Deserialize)]
struct InjectBody {
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    amplitude: Option<f32>,
    #[serde(default)]
    duration: Option<u32>,
}

impl InjectRequest {
    /// Missing `mode` means quick, missing `amplitude` means 0. Any mode
    /// other than `special` is quick.
    pub fn parse(body: &[u8]) -> Result<Self, RequestError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(RequestError::NoData);
        }
        if body.len() > MAX_BODY_LEN {
            return Err(RequestError::TooLarge);
        }
        let raw: InjectBody =
            serde_json::from_slice(body).map_err(|_| RequestError::InvalidJson)?;
        let mode = match raw.mode.as_deref() {
            Some("special") => InjectMode::Special,
            _ => InjectMode::Quick,
        };
        Ok(Self {
            mode,
            amplitude: raw.amplitude.unwrap_or(0.0),
            duration_secs: raw.duration,
        })
    }
}
