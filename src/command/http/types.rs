//! Argument and parameter types used by HTTP Commands and Responses

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HttpMethod {
    Get = 0,
    Post = 1,
}

impl HttpMethod {
    /// `<method>` value of `+HTTPACTION`.
    pub fn code(self) -> u8 {
        self as u8
    }
}
