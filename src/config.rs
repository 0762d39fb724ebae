use core::convert::Infallible;
use embassy_time::Duration;
use embedded_hal::digital::{ErrorType, OutputPin};

/// Placeholder for a control line that is not wired up.
pub struct NoPin;

impl ErrorType for NoPin {
    type Error = Infallible;
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Board level configuration of a SIM800 modem.
///
/// The associated constants carry the defaults of the classic Arduino
/// SIM800 drivers and can be overridden per board.
pub trait ModemConfig {
    type ResetPin: OutputPin;
    type EnablePin: OutputPin;

    /// Baud rate locked with `AT+IPR` during init
    const BAUD_RATE: u32 = 115_200;

    /// Deadline for commands that only wait for `OK`
    const COMMAND_TIMEOUT: Duration = Duration::from_millis(2000);

    /// Pause between two drains of the serial channel while waiting
    const POLL_INTERVAL: Duration = Duration::from_millis(10);

    /// Number of `AT` probes before the modem is declared unresponsive
    const ALIVE_ATTEMPTS: u8 = 3;

    /// Number of `AT+CREG?` queries before network setup gives up
    const ATTACH_ATTEMPTS: u8 = 30;
    const ATTACH_RETRY_DELAY: Duration = Duration::from_secs(1);

    fn reset_pin(&mut self) -> Option<&mut Self::ResetPin>;
    fn enable_pin(&mut self) -> Option<&mut Self::EnablePin>;
}
