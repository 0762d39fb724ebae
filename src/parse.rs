//! Delimiter anchored decoding of modem responses.
//!
//! Every step searches for a delimiter in an owned byte slice and hands back
//! the remainder, so a decoder reads as a chain of `?` that stops at the
//! first missing delimiter.

use core::str::FromStr;

/// Position of the first occurrence of `needle` in `haystack`.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Bytes following the first occurrence of `delim`.
pub fn after<'a>(input: &'a [u8], delim: &[u8]) -> Option<&'a [u8]> {
    find(input, delim).map(|pos| &input[pos + delim.len()..])
}

/// Bytes following the first occurrence of the single byte `delim`.
pub fn after_byte(input: &[u8], delim: u8) -> Option<&[u8]> {
    input
        .iter()
        .position(|&b| b == delim)
        .map(|pos| &input[pos + 1..])
}

/// Split at the first `delim`, dropping the delimiter.
pub fn split_once(input: &[u8], delim: u8) -> Option<(&[u8], &[u8])> {
    input
        .iter()
        .position(|&b| b == delim)
        .map(|pos| (&input[..pos], &input[pos + 1..]))
}

/// Content of the next `"quoted"` field and the remainder after its closing quote.
pub fn quoted(input: &[u8]) -> Option<(&[u8], &[u8])> {
    let rest = after_byte(input, b'"')?;
    split_once(rest, b'"')
}

fn numeric_prefix(input: &[u8], accept: impl Fn(u8) -> bool) -> &[u8] {
    let start = input
        .iter()
        .position(|&b| b != b' ')
        .unwrap_or(input.len());
    let input = &input[start..];
    let mut end = 0;
    for (i, &b) in input.iter().enumerate() {
        let sign = i == 0 && (b == b'-' || b == b'+');
        if !(sign || accept(b)) {
            break;
        }
        end = i + 1;
    }
    &input[..end]
}

/// Leading integer of `input`, ignoring leading spaces and whatever follows
/// the digits.
pub fn leading_int<T: FromStr>(input: &[u8]) -> Option<T> {
    let digits = numeric_prefix(input, |b| b.is_ascii_digit());
    core::str::from_utf8(digits).ok()?.parse().ok()
}

/// Leading decimal number of `input`, same rules as [`leading_int`].
pub fn leading_float(input: &[u8]) -> Option<f32> {
    let digits = numeric_prefix(input, |b| b.is_ascii_digit() || b == b'.');
    core::str::from_utf8(digits).ok()?.parse().ok()
}

/// Copy `field` into a fixed capacity string.
pub fn to_string<const N: usize>(field: &[u8]) -> Result<heapless::String<N>, crate::error::Error> {
    let s = core::str::from_utf8(field).map_err(|_| crate::error::Error::Malformed)?;
    heapless::String::try_from(s).map_err(|_| crate::error::Error::Overflow)
}
