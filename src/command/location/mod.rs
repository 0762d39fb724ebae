//! ### GSM location

pub mod responses;

/// GSM location and time `+CIPGSMLOC` on bearer profile 1
///
/// Answers `+CIPGSMLOC: <locationcode>[,<longitude>,<latitude>,<date>,<time>]`
/// once the location service replied, which can take several seconds.
pub const GET_LOCATION: &[u8] = b"AT+CIPGSMLOC=1,1";
