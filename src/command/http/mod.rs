//! ### HTTP application
//!
//! The HTTP service runs on bearer profile 1 and is driven by parameter
//! commands followed by an action. Completion of an action is reported
//! asynchronously with `+HTTPACTION: <method>,<status>,<datalen>`.

pub mod responses;
pub mod types;

use super::{build, CmdString};
use crate::error::Error;
use types::HttpMethod;

/// Initialize HTTP service
pub const INIT: &[u8] = b"AT+HTTPINIT";

/// Terminate HTTP service
pub const TERM: &[u8] = b"AT+HTTPTERM";

/// Bind the HTTP service to bearer profile 1
pub const SET_CID: &[u8] = b"AT+HTTPPARA=\"CID\",1";

/// Enable HTTPS for the following actions
pub const ENABLE_SSL: &[u8] = b"AT+HTTPSSL=1";

/// Read the HTTP server response
pub const READ: &[u8] = b"AT+HTTPREAD";

/// Time the modem waits for the `+HTTPDATA` payload, in milliseconds
pub const DATA_INPUT_TIME_MS: u32 = 10_000;

/// Set HTTP parameter `URL`, with `args` appended as the query string.
pub fn set_url(url: &str, args: Option<&str>) -> Result<CmdString, Error> {
    match args {
        Some(args) => build(format_args!("AT+HTTPPARA=\"URL\",\"{}?{}\"", url, args)),
        None => build(format_args!("AT+HTTPPARA=\"URL\",\"{}\"", url)),
    }
}

/// Set HTTP parameter `CONTENT`, the `Content-Type` of a POST body.
pub fn set_content(mime: &str) -> Result<CmdString, Error> {
    build(format_args!("AT+HTTPPARA=\"CONTENT\",\"{}\"", mime))
}

/// Input HTTP data `+HTTPDATA`
///
/// The modem answers `DOWNLOAD` and then takes exactly `len` bytes of raw
/// payload.
pub fn set_data(len: usize) -> Result<CmdString, Error> {
    build(format_args!("AT+HTTPDATA={},{}", len, DATA_INPUT_TIME_MS))
}

/// HTTP method action `+HTTPACTION`
pub fn action(method: HttpMethod) -> Result<CmdString, Error> {
    build(format_args!("AT+HTTPACTION={}", method.code()))
}
