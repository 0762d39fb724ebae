//! Responses for SMS Commands
use heapless::String;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::parse;

/// A text mode SMS as read with `+CMGR`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sms {
    /// `REC UNREAD`, `REC READ`, ...
    pub status: String<16>,
    pub sender: String<24>,
    /// Service centre time stamp, `yy/MM/dd,hh:mm:ss±zz`
    pub timestamp: String<24>,
    pub text: String<160>,
}

/// Decoded `+CMGR:` header line, without the message body.
#[derive(Debug, Clone, PartialEq)]
pub struct SmsHeader {
    pub status: String<16>,
    pub sender: String<24>,
    pub timestamp: String<24>,
}

impl SmsHeader {
    pub fn with_text(self, text: &[u8]) -> Result<Sms, Error> {
        Ok(Sms {
            status: self.status,
            sender: self.sender,
            timestamp: self.timestamp,
            text: parse::to_string(text)?,
        })
    }
}

/// Decode the quoted fields of a `+CMGR:` header.
///
/// The optional alphanumeric sender name sits between the sender and the
/// time stamp, so the time stamp is taken as the last quoted field.
pub fn message_header(line: &[u8]) -> Result<SmsHeader, Error> {
    let rest = parse::after(line, b"+CMGR:").unwrap_or(line);
    let (status, rest) = parse::quoted(rest).ok_or(Error::Malformed)?;
    let (sender, mut rest) = parse::quoted(rest).ok_or(Error::Malformed)?;

    let mut timestamp: &[u8] = &[];
    while let Some((field, tail)) = parse::quoted(rest) {
        timestamp = field;
        rest = tail;
    }

    Ok(SmsHeader {
        status: parse::to_string(status)?,
        sender: parse::to_string(sender)?,
        timestamp: parse::to_string(timestamp)?,
    })
}

/// Message body: everything up to the first line break.
pub fn message_text(body: &[u8]) -> &[u8] {
    let body = body.strip_prefix(b"\r\n").unwrap_or(body);
    match parse::find(body, b"\r\n") {
        Some(end) => &body[..end],
        None => body,
    }
}
