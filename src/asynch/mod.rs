pub mod engine;
pub mod http;
pub mod modem;
mod pwr;
pub mod state;

use embedded_io::ReadReady;
use embedded_io_async::{Read, Write};

pub use engine::{CommandEngine, Matched, PendingMatch};
pub use http::HttpSession;
pub use modem::Modem;
pub use state::{HttpState, OperationState, State};

/// Serial link to the modem.
///
/// Any async UART that can tell whether bytes are waiting qualifies.
pub trait ByteChannel: Read + Write + ReadReady {}

impl<T: Read + Write + ReadReady> ByteChannel for T {}
