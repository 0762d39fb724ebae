#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod asynch;
pub mod buffer;
pub mod command;
pub mod config;
pub mod error;
mod module_timing;
pub mod parse;
pub mod registration;

#[cfg(test)]
mod test_helpers;

pub use asynch::{Modem, State};
pub use buffer::{PagedStorage, ResponseBuffer};
pub use error::Error;
