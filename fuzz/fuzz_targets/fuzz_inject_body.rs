//! Fuzz target: `InjectRequest::parse`
//!
//! cargo fuzz run fuzz_inject_body

#![no_main]

use coretest::web::request::{InjectRequest, MAX_BODY_LEN, RequestError};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    match InjectRequest::parse(data) {
        Ok(_) => assert!(data.len() <= MAX_BODY_LEN),
        Err(RequestError::NoData) => assert!(data.iter().all(u8::is_ascii_whitespace)),
        Err(_) => {}
    }
});
