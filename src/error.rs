use crate::asynch::state::HttpState;

/// Step of [`Modem::setup`](crate::asynch::Modem::setup) that failed.
///
/// The discriminant is the numeric failure stage reported by the classic
/// SIM800 drivers, `0` being reserved for success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SetupStage {
    /// No `+CREG` home/roaming registration within the attempt budget
    Registration = 1,
    /// `AT+CGATT?` not acknowledged
    GprsAttach = 2,
    /// Bearer connection type could not be set
    BearerType = 3,
    /// Bearer APN could not be set
    Apn = 4,
    /// SMS storage could not be selected
    SmsStorage = 5,
}

impl SetupStage {
    pub fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// None of the expected patterns showed up before the deadline
    Timeout,
    /// The modem answered with the failure pattern
    Rejected,
    /// A matched response lacked an expected delimiter or field
    Malformed,
    Setup(SetupStage),
    /// The HTTP session cannot perform the request in its current state
    InvalidState(HttpState),
    /// `+CIPGSMLOC` reported a non-zero location code
    Location(u16),
    /// Command text, decoded field or pattern exceeds its fixed capacity
    Overflow,

    Io(embedded_io::ErrorKind),
    Storage,
    IoPin,
}

impl Error {
    /// Failure stage code (1 to 5) of a [`SetupStage`] error.
    ///
    /// `None` for every other error, which did not stop setup at a stage.
    pub fn setup_code(&self) -> Option<u8> {
        match self {
            Self::Setup(stage) => Some(stage.code()),
            _ => None,
        }
    }
}

impl Error {
    pub(crate) fn io<E: embedded_io::Error>(e: E) -> Self {
        Self::Io(e.kind())
    }
}
