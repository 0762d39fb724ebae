//! Responses for GSM location Commands
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::parse;

/// Cell based position and network time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Location {
    pub lon: f32,
    pub lat: f32,
    /// Years since 2000
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

fn field<T: core::str::FromStr>(input: &[u8]) -> Result<T, Error> {
    parse::leading_int(input).ok_or(Error::Malformed)
}

/// Decode `+CIPGSMLOC: 0,<lon>,<lat>,<yyyy>/<MM>/<dd>,<hh>:<mm>:<ss>`.
///
/// Every field is located by searching for its leading delimiter. A missing
/// delimiter fails the whole decode, and a non-zero location code is
/// reported as [`Error::Location`].
pub fn location(resp: &[u8]) -> Result<Location, Error> {
    let p = parse::after(resp, b"+CIPGSMLOC:").ok_or(Error::Malformed)?;
    let code: u16 = field(p)?;
    if code != 0 {
        return Err(Error::Location(code));
    }

    let p = parse::after_byte(p, b',').ok_or(Error::Malformed)?;
    let lon = parse::leading_float(p).ok_or(Error::Malformed)?;
    let p = parse::after_byte(p, b',').ok_or(Error::Malformed)?;
    let lat = parse::leading_float(p).ok_or(Error::Malformed)?;

    let p = parse::after_byte(p, b',').ok_or(Error::Malformed)?;
    let year = field::<u16>(p)?
        .checked_sub(2000)
        .and_then(|y| u8::try_from(y).ok())
        .ok_or(Error::Malformed)?;
    let p = parse::after_byte(p, b'/').ok_or(Error::Malformed)?;
    let month = field(p)?;
    let p = parse::after_byte(p, b'/').ok_or(Error::Malformed)?;
    let day = field(p)?;

    let p = parse::after_byte(p, b',').ok_or(Error::Malformed)?;
    let hour = field(p)?;
    let p = parse::after_byte(p, b':').ok_or(Error::Malformed)?;
    let minute = field(p)?;
    let p = parse::after_byte(p, b':').ok_or(Error::Malformed)?;
    let second = field(p)?;

    Ok(Location {
        lon,
        lat,
        year,
        month,
        day,
        hour,
        minute,
        second,
    })
}
