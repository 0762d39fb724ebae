use embassy_time::Timer;
use embedded_hal::digital::OutputPin as _;

use crate::{asynch::state::OperationState, config::ModemConfig, error::Error, module_timing};

use super::state;

pub(crate) struct PwrCtrl<'a, 'b, CFG> {
    config: &'b mut CFG,
    ch: &'b state::Runner<'a>,
}

impl<'a, 'b, CFG> PwrCtrl<'a, 'b, CFG>
where
    CFG: ModemConfig,
{
    pub(crate) fn new(ch: &'b state::Runner<'a>, config: &'b mut CFG) -> Self {
        Self { ch, config }
    }

    /// Drive the enable line high, if the board has one.
    pub(crate) fn enable(&mut self) -> Result<(), Error> {
        if let Some(pin) = self.config.enable_pin() {
            pin.set_high().map_err(|_| Error::IoPin)?;
        } else {
            debug!("No enable pin configured");
        }
        Ok(())
    }

    /// Pulse `RST` high, low, high and give the module time to boot.
    ///
    /// Without a reset pin the module is assumed to be up already and no boot
    /// delay is spent.
    pub(crate) async fn reset(&mut self) -> Result<(), Error> {
        if let Some(pin) = self.config.reset_pin() {
            debug!("Resetting SIM800");
            pin.set_high().map_err(|_| Error::IoPin)?;
            Timer::after(module_timing::reset_settle_time()).await;
            pin.set_low().map_err(|_| Error::IoPin)?;
            Timer::after(module_timing::reset_time()).await;
            pin.set_high().map_err(|_| Error::IoPin)?;
            Timer::after(module_timing::boot_time()).await;
            self.ch.set_operation_state(OperationState::PowerDown);
        } else {
            warn!("No reset pin configured");
        }
        Ok(())
    }

    pub(crate) async fn power_up(&mut self) -> Result<(), Error> {
        self.enable()?;
        self.reset().await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::asynch::state::{Runner, State};
    use crate::test_helpers::{PinLog, RecordingPin};
    use embassy_futures::block_on;

    struct PinConfig {
        reset: RecordingPin,
        enable: RecordingPin,
    }

    impl ModemConfig for PinConfig {
        type ResetPin = RecordingPin;
        type EnablePin = RecordingPin;

        fn reset_pin(&mut self) -> Option<&mut Self::ResetPin> {
            Some(&mut self.reset)
        }

        fn enable_pin(&mut self) -> Option<&mut Self::EnablePin> {
            Some(&mut self.enable)
        }
    }

    #[test]
    fn power_up_pulses_reset() {
        let log = PinLog::default();
        let mut config = PinConfig {
            reset: RecordingPin::new("RST", &log),
            enable: RecordingPin::new("EN", &log),
        };
        let state = State::new();
        let ch = Runner::new(&state);

        block_on(PwrCtrl::new(&ch, &mut config).power_up()).unwrap();
        assert_eq!(
            log.take(),
            vec![("EN", true), ("RST", true), ("RST", false), ("RST", true)]
        );
    }
}
