//! Responses for Network service Commands
use heapless::String;

use crate::error::Error;
use crate::parse;
use crate::registration::Status;

/// Longest operator name kept from `+COPS?`.
pub const OPERATOR_LEN: usize = 32;

/// Registration status from a `+CREG: <n>,<stat>` line.
pub fn registration_status(resp: &[u8]) -> Option<Status> {
    let rest = parse::after(resp, b"+CREG:")?;
    let stat = parse::after_byte(rest, b',')?;
    parse::leading_int::<u8>(stat).map(Status::from)
}

/// Map the `+CSQ` rssi scale onto dBm.
///
/// `0..=31` covers -114 dBm to -52 dBm in 2 dB steps. `99` (not known or not
/// detectable) and `-1` map to `0`.
pub fn rssi_to_dbm(rssi: i32) -> i16 {
    match rssi {
        99 | -1 => 0,
        // Out of range values saturate
        n => (n.clamp(0, 31) * 2 - 114) as i16,
    }
}

/// Signal strength in dBm from a `+CSQ: <rssi>,<ber>` response.
pub fn signal_quality(resp: &[u8]) -> Result<i16, Error> {
    let rest = parse::after(resp, b"CSQ: ").ok_or(Error::Malformed)?;
    let rssi = parse::leading_int::<i32>(rest).ok_or(Error::Malformed)?;
    Ok(rssi_to_dbm(rssi))
}

/// Operator name from a `+COPS: <mode>,<format>,"<oper>"` response.
pub fn operator_name(resp: &[u8]) -> Result<String<OPERATOR_LEN>, Error> {
    let rest = parse::after(resp, b",\"").ok_or(Error::Malformed)?;
    let (name, _) = parse::split_once(rest, b'"').ok_or(Error::Malformed)?;
    parse::to_string(name)
}
