//! Responses for HTTP Commands
use super::types::HttpMethod;
use crate::error::Error;
use crate::parse;

/// Answer to `+HTTPDATA` once the modem accepts payload bytes
pub const DOWNLOAD: &[u8] = b"DOWNLOAD";

/// Header of the `AT+HTTPREAD` answer, followed by the payload length
pub const READ_HEADER: &[u8] = b"+HTTPREAD: ";

/// `+HTTPACTION` fragments marking success and network failure of an action.
///
/// Status `200` is success. Status codes `600..=606` are raised by the modem
/// itself when the transfer failed on the network side.
pub fn action_patterns(method: HttpMethod) -> (&'static [u8], &'static [u8]) {
    match method {
        HttpMethod::Get => (b"0,200", b"0,60"),
        HttpMethod::Post => (b"1,200", b"1,60"),
    }
}

/// Payload length from the remainder of a `+HTTPREAD: <len>` line.
pub fn read_length(line: &[u8]) -> Result<usize, Error> {
    parse::leading_int(line).ok_or(Error::Malformed)
}
