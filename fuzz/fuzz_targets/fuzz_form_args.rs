//! Fuzz target: query-string and form-body argument lookup
//!
//! Splits the input into a URI and a body and looks up every argument the
//! web API reads. Decoding must be total: lossy on bad UTF-8, literal on
//! malformed escapes.
//!
//! cargo fuzz run fuzz_form_args

#![no_main]

use coretest::web::request::{parse_percent, url_decode};
use coretest::web::{HttpRequest, Method};
use libfuzzer_sys::fuzz_target;

const ARGS: [&str; 6] = ["value", "state", "action", "ssid", "password", "cloudServer"];

fuzz_target!(|data: &[u8]| {
    let split = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    let (uri, body) = data.split_at(split);
    let uri = String::from_utf8_lossy(uri);

    let req = HttpRequest::new(Method::Post, &uri, body);
    for name in ARGS {
        if let Some(value) = req.arg(name) {
            if let Ok(p) = parse_percent(&value) {
                assert!(p.is_finite());
            }
        }
    }

    // Each escape shrinks to one byte, at most one replacement character.
    assert!(url_decode(&uri).len() <= uri.len());
});
