use embassy_time::{Duration, Timer};
use heapless::String;

use crate::{
    buffer::{PagedStorage, ResponseBuffer},
    command::{
        general, location,
        location::responses::Location,
        network_service::{self, responses as net_responses, responses::OPERATOR_LEN},
        sms::{self, responses::Sms},
        ERROR, OK,
    },
    config::ModemConfig,
    error::{Error, SetupStage},
    module_timing,
    registration::Status,
};

use super::{
    engine::CommandEngine,
    http::HttpSession,
    pwr::PwrCtrl,
    state::{self, HttpState, OperationState, State},
    ByteChannel,
};

/// Driver for one SIM800 on one serial link.
///
/// Owns the command engine, and with it the channel and response buffer,
/// along with the HTTP session sharing them. Every operation runs to
/// completion before the next one starts, except HTTP transfers which are
/// polled and may be interleaved with anything else.
pub struct Modem<'d, CFG, C, S, const N: usize> {
    ch: state::Runner<'d>,
    config: CFG,
    engine: CommandEngine<C, S, N>,
    http: HttpSession<'d>,
}

impl<'d, CFG, C, S, const N: usize> Modem<'d, CFG, C, S, N>
where
    CFG: ModemConfig,
    C: ByteChannel,
    S: PagedStorage,
{
    pub fn new(state: &'d State, config: CFG, channel: C, buffer: ResponseBuffer<N, S>) -> Self {
        let ch = state::Runner::new(state);
        Self {
            http: HttpSession::new(ch.clone(), CFG::COMMAND_TIMEOUT),
            engine: CommandEngine::new(channel, buffer, CFG::POLL_INTERVAL),
            config,
            ch,
        }
    }

    /// Handle for observing state changes from elsewhere.
    pub fn state_runner(&self) -> state::Runner<'d> {
        self.ch.clone()
    }

    pub fn operation_state(&self) -> OperationState {
        self.ch.operation_state(None)
    }

    pub fn http_state(&self) -> HttpState {
        self.http.state()
    }

    /// Direct access to the command engine, e.g. for commands this driver
    /// has no wrapper for.
    pub fn engine(&mut self) -> &mut CommandEngine<C, S, N> {
        &mut self.engine
    }

    pub fn release(self) -> (CFG, C, ResponseBuffer<N, S>) {
        let (channel, buffer) = self.engine.release();
        (self.config, channel, buffer)
    }

    /// Other commands would purge an HTTP response that is still being read.
    fn ensure_idle(&self) -> Result<(), Error> {
        if self.http.holds_response() {
            warn!("HTTP response pending, finish reading it or uninit first");
            return Err(Error::InvalidState(HttpState::Reading));
        }
        Ok(())
    }

    async fn send(&mut self, cmd: &[u8], timeout: Duration) -> Result<bool, Error> {
        Ok(self
            .engine
            .send_command(Some(cmd), timeout, OK, Some(ERROR))
            .await?
            .is_expected())
    }

    /// Send a command whose failure is tolerated.
    async fn send_best_effort(&mut self, cmd: &[u8], timeout: Duration) -> Result<(), Error> {
        if !self.send(cmd, timeout).await? {
            warn!("{:?} not acknowledged", crate::fmt::ascii(cmd));
        }
        Ok(())
    }

    /// Power the module up, wait for it to answer `AT` and bring it to full
    /// functionality at a fixed baud rate with echo disabled.
    pub async fn init(&mut self) -> Result<(), Error> {
        PwrCtrl::new(&self.ch, &mut self.config).power_up().await?;
        self.http.reset(&mut self.engine);

        let mut alive = false;
        for attempt in 0..CFG::ALIVE_ATTEMPTS {
            if self.send(general::AT, CFG::COMMAND_TIMEOUT).await? {
                alive = true;
                break;
            }
            debug!("No answer to AT, attempt {}", attempt + 1);
        }
        if !alive {
            error!("Modem does not respond");
            return Err(Error::Timeout);
        }

        self.send_best_effort(
            general::set_baud_rate(CFG::BAUD_RATE)?.as_bytes(),
            CFG::COMMAND_TIMEOUT,
        )
        .await?;
        self.send_best_effort(general::ECHO_OFF, CFG::COMMAND_TIMEOUT)
            .await?;
        self.send_best_effort(
            general::set_functionality(true),
            module_timing::functionality_time(),
        )
        .await?;

        self.ch.update_registration_with(|r| r.reset());
        self.ch.set_operation_state(OperationState::Initialized);
        Ok(())
    }

    async fn wait_for_registration(&mut self) -> Result<bool, Error> {
        for attempt in 0..CFG::ATTACH_ATTEMPTS {
            let res = self
                .engine
                .send_command(
                    Some(network_service::GET_REGISTRATION),
                    CFG::COMMAND_TIMEOUT,
                    OK,
                    None,
                )
                .await?;
            if res.is_expected() {
                let stat = net_responses::registration_status(self.engine.peek(res.len)?)
                    .unwrap_or(Status::None);
                debug!("Registration status {:?}, attempt {}", stat, attempt + 1);
                self.ch.update_registration_with(|r| r.set_status(stat));
                if stat.registered() {
                    return Ok(true);
                }
            }
            Timer::after(CFG::ATTACH_RETRY_DELAY).await;
        }
        Ok(false)
    }

    /// Wait for network registration, then attach GPRS, configure bearer
    /// profile 1 with `apn` and select SIM storage for SMS.
    ///
    /// A failing step is reported as [`Error::Setup`] carrying the stage.
    pub async fn setup(&mut self, apn: &str) -> Result<(), Error> {
        self.ensure_idle()?;

        if !self.wait_for_registration().await? {
            return Err(Error::Setup(SetupStage::Registration));
        }

        if !self
            .send(network_service::GET_GPRS_ATTACH, CFG::COMMAND_TIMEOUT)
            .await?
        {
            return Err(Error::Setup(SetupStage::GprsAttach));
        }

        if !self
            .send(network_service::SET_BEARER_CONTYPE, CFG::COMMAND_TIMEOUT)
            .await?
        {
            return Err(Error::Setup(SetupStage::BearerType));
        }

        let apn_cmd = network_service::set_bearer_apn(apn)?;
        if !self.send(apn_cmd.as_bytes(), CFG::COMMAND_TIMEOUT).await? {
            return Err(Error::Setup(SetupStage::Apn));
        }

        // The bearer may already be open
        self.send_best_effort(network_service::OPEN_BEARER, module_timing::bearer_time())
            .await?;
        self.send_best_effort(network_service::QUERY_BEARER, module_timing::bearer_time())
            .await?;
        self.send_best_effort(sms::SET_TEXT_MODE, CFG::COMMAND_TIMEOUT)
            .await?;

        if !self
            .send(sms::SELECT_SIM_STORAGE, CFG::COMMAND_TIMEOUT)
            .await?
        {
            return Err(Error::Setup(SetupStage::SmsStorage));
        }

        self.ch.set_operation_state(OperationState::Attached);
        Ok(())
    }

    /// Terminate the HTTP service and close the bearer.
    pub async fn power_down(&mut self) -> Result<(), Error> {
        self.http.uninit(&mut self.engine).await?;
        let closed = self
            .engine
            .send_command(
                Some(network_service::CLOSE_BEARER),
                CFG::COMMAND_TIMEOUT,
                OK,
                None,
            )
            .await?
            .expected();
        if closed.is_ok() {
            self.ch.set_operation_state(OperationState::Initialized);
        }
        closed.map(|_| ())
    }

    /// Name of the registered operator.
    pub async fn operator_name(&mut self) -> Result<String<OPERATOR_LEN>, Error> {
        self.ensure_idle()?;
        let len = self
            .engine
            .send_command(
                Some(network_service::GET_OPERATOR),
                CFG::COMMAND_TIMEOUT,
                OK,
                Some(ERROR),
            )
            .await?
            .expected()?;
        net_responses::operator_name(self.engine.peek(len)?)
    }

    /// Signal strength in dBm, `0` when unknown.
    pub async fn signal_quality(&mut self) -> Result<i16, Error> {
        self.ensure_idle()?;
        let len = self
            .engine
            .send_command(
                Some(network_service::GET_SIGNAL_QUALITY),
                CFG::COMMAND_TIMEOUT,
                OK,
                None,
            )
            .await?
            .expected()?;
        net_responses::signal_quality(self.engine.peek(len)?)
    }

    /// Read and delete the SMS at storage index 1.
    ///
    /// `None` when there is no message or it could not be read in time.
    pub async fn check_sms(&mut self) -> Result<Option<Sms>, Error> {
        self.ensure_idle()?;
        let read = sms::read_message(1)?;
        let res = self
            .engine
            .send_command(
                Some(read.as_bytes()),
                CFG::COMMAND_TIMEOUT,
                b"+CMGR:",
                Some(ERROR),
            )
            .await?;
        if !res.is_expected() {
            return Ok(None);
        }
        self.engine.consume(res.len);

        // Header and body share the deadline started by the read command
        let header = self
            .engine
            .check_buffer(b"\r\n", None, CFG::COMMAND_TIMEOUT, false)
            .await?;
        if !header.is_expected() {
            return Ok(None);
        }
        let header_len = header.len;
        let header = sms::responses::message_header(self.engine.peek(header_len)?);
        self.engine.consume(header_len);

        // The body is complete once the final OK arrived
        let body = self
            .engine
            .check_buffer(OK, None, CFG::COMMAND_TIMEOUT, false)
            .await?;
        if !body.is_expected() {
            return Ok(None);
        }
        let text = sms::responses::message_text(self.engine.peek(body.len)?);
        let sms = header.and_then(|h| h.with_text(text));

        let delete = sms::delete_message(1)?;
        self.send_best_effort(delete.as_bytes(), CFG::COMMAND_TIMEOUT)
            .await?;

        match sms {
            Ok(sms) => {
                info!("SMS from {}", sms.sender.as_str());
                Ok(Some(sms))
            }
            Err(e) => {
                warn!("Unreadable SMS: {:?}", e);
                Ok(None)
            }
        }
    }

    /// Cell based location and network time.
    pub async fn location(&mut self) -> Result<Location, Error> {
        self.ensure_idle()?;
        let len = self
            .engine
            .send_command(
                Some(location::GET_LOCATION),
                module_timing::location_time(),
                OK,
                Some(ERROR),
            )
            .await?
            .expected()?;
        location::responses::location(self.engine.peek(len)?)
    }

    /// Switch between minimum functionality, with the RF circuits off, and
    /// full functionality.
    pub async fn sleep(&mut self, enable: bool) -> Result<(), Error> {
        self.ensure_idle()?;
        self.engine
            .send_command(
                Some(general::set_functionality(!enable)),
                module_timing::functionality_time(),
                OK,
                Some(ERROR),
            )
            .await?
            .expected()?;
        Ok(())
    }

    /// Start the HTTP service.
    pub async fn http_init(&mut self) -> Result<(), Error> {
        self.http.init(&mut self.engine, false).await
    }

    /// Start the HTTP service with SSL enabled for every request.
    pub async fn https_init(&mut self) -> Result<(), Error> {
        self.http.init(&mut self.engine, true).await
    }

    pub async fn http_get(&mut self, url: &str, args: Option<&str>) -> Result<(), Error> {
        self.http.get(&mut self.engine, url, args).await
    }

    pub async fn http_post(
        &mut self,
        url: &str,
        payload: &[u8],
        mime: Option<&str>,
    ) -> Result<(), Error> {
        self.http.post(&mut self.engine, url, payload, mime).await
    }

    /// See [`HttpSession::is_connected`].
    pub async fn http_is_connected(&mut self) -> nb::Result<(), Error> {
        self.http.is_connected(&mut self.engine).await
    }

    pub async fn http_read(&mut self) -> Result<(), Error> {
        self.http.read(&mut self.engine).await
    }

    /// See [`HttpSession::is_read`].
    pub async fn http_is_read(&mut self) -> nb::Result<usize, Error> {
        self.http.is_read(&mut self.engine).await
    }

    pub async fn http_read_payload(&mut self, out: &mut [u8]) -> Result<usize, Error> {
        self.http.read_payload(&mut self.engine, out).await
    }

    pub async fn http_uninit(&mut self) -> Result<(), Error> {
        self.http.uninit(&mut self.engine).await
    }

    pub fn http_transfer_elapsed(&self) -> Duration {
        self.http.transfer_elapsed()
    }
}
