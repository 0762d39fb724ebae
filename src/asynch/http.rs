use embassy_time::{Duration, Instant};

use crate::{
    buffer::PagedStorage,
    command::{
        http::{
            self,
            responses::{action_patterns, read_length, DOWNLOAD, READ_HEADER},
            types::HttpMethod,
        },
        ERROR, OK,
    },
    error::Error,
    module_timing,
};

use super::{
    engine::{CommandEngine, Matched},
    state::{self, HttpState},
    ByteChannel,
};

/// HTTP(S) transfers on top of a [`CommandEngine`].
///
/// Setting up a request blocks until each parameter command is
/// acknowledged, but completion of the transfer and arrival of the response
/// are polled with [`is_connected`](Self::is_connected) and
/// [`is_read`](Self::is_read), which look at the response stream once and
/// return [`nb::Error::WouldBlock`] while nothing conclusive arrived. Other
/// commands can be interleaved between two polls.
pub struct HttpSession<'d> {
    ch: state::Runner<'d>,
    timeout: Duration,
    started: Instant,
    read_len: Option<usize>,
    payload_remaining: usize,
}

impl<'d> HttpSession<'d> {
    pub fn new(ch: state::Runner<'d>, timeout: Duration) -> Self {
        Self {
            ch,
            timeout,
            started: Instant::now(),
            read_len: None,
            payload_remaining: 0,
        }
    }

    pub fn state(&self) -> HttpState {
        self.ch.http_state(None)
    }

    /// Time since the current request was issued or read.
    pub fn transfer_elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Payload bytes announced by `+HTTPREAD` that were not handed out yet.
    pub fn payload_remaining(&self) -> usize {
        self.payload_remaining
    }

    /// Whether a response body is announced or expected but not fully
    /// handed out yet. Any other command would purge it.
    pub fn holds_response(&self) -> bool {
        self.state() == HttpState::Reading
            && (self.read_len.is_none() || self.payload_remaining > 0)
    }

    /// Forget the session without talking to the modem.
    pub fn reset<C, S, const N: usize>(&mut self, engine: &mut CommandEngine<C, S, N>)
    where
        C: ByteChannel,
        S: PagedStorage,
    {
        engine.unwatch();
        self.read_len = None;
        self.payload_remaining = 0;
        self.ch.set_ssl(false);
        self.ch.set_http_state(HttpState::Disabled);
    }

    fn fail(&self, e: Error) -> Error {
        error!("HTTP request failed: {:?}", e);
        self.ch.set_http_state(HttpState::Error);
        e
    }

    async fn param<C, S, const N: usize>(
        &self,
        engine: &mut CommandEngine<C, S, N>,
        cmd: &[u8],
        timeout: Duration,
    ) -> Result<usize, Error>
    where
        C: ByteChannel,
        S: PagedStorage,
    {
        engine
            .send_command(Some(cmd), timeout, OK, Some(ERROR))
            .await?
            .expected()
    }

    /// Start the HTTP service, with SSL for all following requests if `ssl`.
    pub async fn init<C, S, const N: usize>(
        &mut self,
        engine: &mut CommandEngine<C, S, N>,
        ssl: bool,
    ) -> Result<(), Error>
    where
        C: ByteChannel,
        S: PagedStorage,
    {
        engine.unwatch();
        self.read_len = None;
        self.payload_remaining = 0;

        let res = match self
            .param(engine, http::INIT, module_timing::bearer_time())
            .await
        {
            Ok(_) => {
                self.param(engine, http::SET_CID, module_timing::http_param_time())
                    .await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = res {
            warn!("HTTP init failed: {:?}", e);
            self.ch.set_ssl(false);
            self.ch.set_http_state(HttpState::Disabled);
            return Err(e);
        }

        self.ch.set_ssl(ssl);
        self.ch.set_http_state(HttpState::Ready);
        Ok(())
    }

    fn check_request_state(&self) -> Result<(), Error> {
        match self.state() {
            HttpState::Ready | HttpState::Reading => Ok(()),
            s => Err(Error::InvalidState(s)),
        }
    }

    /// Issue a GET of `url`, with `args` as query string.
    ///
    /// On success the session is `Connecting`. Any rejected or unanswered
    /// parameter aborts the request and leaves the session in `Error`.
    pub async fn get<C, S, const N: usize>(
        &mut self,
        engine: &mut CommandEngine<C, S, N>,
        url: &str,
        args: Option<&str>,
    ) -> Result<(), Error>
    where
        C: ByteChannel,
        S: PagedStorage,
    {
        self.check_request_state()?;
        match self
            .request(engine, HttpMethod::Get, url, args, None)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Issue a POST of `payload` to `url`.
    ///
    /// The announced length is the length of `payload`, and the payload is
    /// only sent after the modem asked for it with `DOWNLOAD`.
    pub async fn post<C, S, const N: usize>(
        &mut self,
        engine: &mut CommandEngine<C, S, N>,
        url: &str,
        payload: &[u8],
        mime: Option<&str>,
    ) -> Result<(), Error>
    where
        C: ByteChannel,
        S: PagedStorage,
    {
        self.check_request_state()?;
        match self
            .request(engine, HttpMethod::Post, url, None, Some((payload, mime)))
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn request<C, S, const N: usize>(
        &mut self,
        engine: &mut CommandEngine<C, S, N>,
        method: HttpMethod,
        url: &str,
        args: Option<&str>,
        body: Option<(&[u8], Option<&str>)>,
    ) -> Result<(), Error>
    where
        C: ByteChannel,
        S: PagedStorage,
    {
        self.param(engine, http::set_url(url, args)?.as_bytes(), self.timeout)
            .await?;

        if let Some((_, Some(mime))) = body {
            self.param(engine, http::set_content(mime)?.as_bytes(), self.timeout)
                .await?;
        }

        if self.ch.ssl() {
            self.param(engine, http::ENABLE_SSL, self.timeout).await?;
        }

        if let Some((payload, _)) = body {
            let ready = engine
                .send_command(
                    Some(http::set_data(payload.len())?.as_bytes()),
                    module_timing::http_param_time(),
                    DOWNLOAD,
                    Some(ERROR),
                )
                .await?
                .expected()?;
            engine.consume(ready);
            engine.write_raw(payload).await?;
            engine
                .send_command(None, self.timeout, OK, Some(ERROR))
                .await?
                .expected()?;
        }

        self.param(engine, http::action(method)?.as_bytes(), self.timeout)
            .await?;

        let (success, failure) = action_patterns(method);
        engine.watch(success, failure)?;
        self.read_len = None;
        self.payload_remaining = 0;
        self.started = Instant::now();
        self.ch.set_http_state(HttpState::Connecting);
        Ok(())
    }

    /// Poll for completion of the request.
    ///
    /// `Ok` once the server answered `200`. The session stays `Connecting`
    /// until [`read`](Self::read) is issued. A network failure moves it to
    /// `Error` and yields [`Error::Rejected`]. The completion line is
    /// recognised even when it arrived during another command.
    pub async fn is_connected<C, S, const N: usize>(
        &mut self,
        engine: &mut CommandEngine<C, S, N>,
    ) -> nb::Result<(), Error>
    where
        C: ByteChannel,
        S: PagedStorage,
    {
        let state = self.state();
        if state != HttpState::Connecting {
            return Err(nb::Error::Other(Error::InvalidState(state)));
        }

        engine.drain().await?;
        match engine.watched() {
            None => Err(nb::Error::WouldBlock),
            Some(Matched::Expected) => Ok(()),
            Some(_) => Err(nb::Error::Other(self.fail(Error::Rejected))),
        }
    }

    /// Ask for the response body with `AT+HTTPREAD`.
    pub async fn read<C, S, const N: usize>(
        &mut self,
        engine: &mut CommandEngine<C, S, N>,
    ) -> Result<(), Error>
    where
        C: ByteChannel,
        S: PagedStorage,
    {
        match self.state() {
            HttpState::Connecting | HttpState::Reading => {}
            s => return Err(Error::InvalidState(s)),
        }

        if let Err(e) = engine.send_line(http::READ).await {
            return Err(self.fail(e));
        }
        engine.unwatch();
        self.read_len = None;
        self.payload_remaining = 0;
        self.started = Instant::now();
        self.ch.set_http_state(HttpState::Reading);
        Ok(())
    }

    /// Poll for the `+HTTPREAD: <len>` header and return the payload length.
    ///
    /// Nothing is consumed until the whole length line arrived. The payload
    /// itself stays in the response stream and is handed out by
    /// [`read_payload`](Self::read_payload).
    pub async fn is_read<C, S, const N: usize>(
        &mut self,
        engine: &mut CommandEngine<C, S, N>,
    ) -> nb::Result<usize, Error>
    where
        C: ByteChannel,
        S: PagedStorage,
    {
        let state = self.state();
        if state != HttpState::Reading {
            return Err(nb::Error::Other(Error::InvalidState(state)));
        }
        if let Some(len) = self.read_len {
            return Ok(len);
        }

        let header = engine.poll_once(READ_HEADER, Some(ERROR)).await?;
        match header.matched {
            Matched::Timeout => Err(nb::Error::WouldBlock),
            Matched::Alternate => Err(nb::Error::Other(self.fail(Error::Rejected))),
            Matched::Expected => {
                let Some(line_end) = engine.find_from(header.len, b"\r\n")? else {
                    return Err(nb::Error::WouldBlock);
                };
                engine.consume(header.len);
                let line = line_end - header.len;
                let len = read_length(engine.peek(line)?);
                engine.consume(line);
                match len {
                    Ok(len) => {
                        debug!("HTTP response of {} bytes", len);
                        self.read_len = Some(len);
                        self.payload_remaining = len;
                        Ok(len)
                    }
                    Err(e) => Err(nb::Error::Other(self.fail(e))),
                }
            }
        }
    }

    /// Copy the next payload bytes into `out`, returning how many were copied.
    pub async fn read_payload<C, S, const N: usize>(
        &mut self,
        engine: &mut CommandEngine<C, S, N>,
        out: &mut [u8],
    ) -> Result<usize, Error>
    where
        C: ByteChannel,
        S: PagedStorage,
    {
        let state = self.state();
        if state != HttpState::Reading || self.read_len.is_none() {
            return Err(Error::InvalidState(state));
        }

        let want = out.len().min(self.payload_remaining);
        if want == 0 {
            return Ok(0);
        }
        let n = engine.receive(&mut out[..want], self.timeout).await?;
        self.payload_remaining -= n;
        Ok(n)
    }

    /// Terminate the HTTP service. The session is `Disabled` afterwards,
    /// whether the modem acknowledged or not.
    pub async fn uninit<C, S, const N: usize>(
        &mut self,
        engine: &mut CommandEngine<C, S, N>,
    ) -> Result<(), Error>
    where
        C: ByteChannel,
        S: PagedStorage,
    {
        let res = engine
            .send_command(Some(http::TERM), self.timeout, OK, Some(ERROR))
            .await;
        self.reset(engine);
        if !res?.is_expected() {
            debug!("HTTP service was not running");
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::asynch::state::State;
    use crate::buffer::{NoStorage, ResponseBuffer};
    use crate::test_helpers::MockChannel;
    use embassy_futures::block_on;

    type Engine = CommandEngine<MockChannel, NoStorage, 256>;

    fn engine(channel: &MockChannel) -> Engine {
        CommandEngine::new(
            channel.clone(),
            ResponseBuffer::new(),
            Duration::from_millis(1),
        )
    }

    fn session(state: &State) -> HttpSession<'_> {
        HttpSession::new(state::Runner::new(state), Duration::from_millis(50))
    }

    fn expect_init(channel: &MockChannel) {
        channel.expect("AT+HTTPINIT", "\r\nOK\r\n");
        channel.expect("AT+HTTPPARA=\"CID\",1", "\r\nOK\r\n");
    }

    #[test]
    fn get_connect_read() {
        let channel = MockChannel::new();
        let mut engine = engine(&channel);
        let state = State::new();
        let mut http = session(&state);

        expect_init(&channel);
        block_on(http.init(&mut engine, false)).unwrap();
        assert_eq!(http.state(), HttpState::Ready);

        channel.expect("AT+HTTPPARA=\"URL\",\"example.com/t?id=7\"", "\r\nOK\r\n");
        channel.expect("AT+HTTPACTION=0", "\r\nOK\r\n");
        block_on(http.get(&mut engine, "example.com/t", Some("id=7"))).unwrap();
        assert_eq!(http.state(), HttpState::Connecting);

        assert_eq!(
            block_on(http.is_connected(&mut engine)),
            Err(nb::Error::WouldBlock)
        );

        channel.push_rx("\r\n+HTTPACTION: 0,200,5\r\n");
        assert_eq!(block_on(http.is_connected(&mut engine)), Ok(()));
        // Success alone does not start reading
        assert_eq!(http.state(), HttpState::Connecting);

        channel.expect("AT+HTTPREAD", "\r\n+HTTPREAD: 5\r\nhello\r\nOK\r\n");
        block_on(http.read(&mut engine)).unwrap();
        assert_eq!(http.state(), HttpState::Reading);
        assert_eq!(block_on(http.is_read(&mut engine)), Ok(5));
        assert_eq!(block_on(http.is_read(&mut engine)), Ok(5));

        let mut body = [0u8; 16];
        assert_eq!(block_on(http.read_payload(&mut engine, &mut body)), Ok(5));
        assert_eq!(&body[..5], b"hello");
        assert_eq!(http.payload_remaining(), 0);
        assert_eq!(block_on(http.read_payload(&mut engine, &mut body)), Ok(0));

        channel.expect("AT+HTTPTERM", "\r\nOK\r\n");
        block_on(http.uninit(&mut engine)).unwrap();
        assert_eq!(http.state(), HttpState::Disabled);
    }

    #[test]
    fn error_pattern_sticks_until_uninit() {
        let channel = MockChannel::new();
        let mut engine = engine(&channel);
        let state = State::new();
        let mut http = session(&state);

        expect_init(&channel);
        block_on(http.init(&mut engine, false)).unwrap();
        channel.expect("AT+HTTPPARA=\"URL\",\"example.com\"", "\r\nOK\r\n");
        channel.expect("AT+HTTPACTION=0", "\r\nOK\r\n\r\n+HTTPACTION: 0,601,0\r\n");
        block_on(http.get(&mut engine, "example.com", None)).unwrap();

        assert_eq!(
            block_on(http.is_connected(&mut engine)),
            Err(nb::Error::Other(Error::Rejected))
        );
        assert_eq!(http.state(), HttpState::Error);

        assert_eq!(
            block_on(http.get(&mut engine, "example.com", None)),
            Err(Error::InvalidState(HttpState::Error))
        );
        assert_eq!(
            block_on(http.read(&mut engine)),
            Err(Error::InvalidState(HttpState::Error))
        );
        assert_eq!(http.state(), HttpState::Error);

        channel.expect("AT+HTTPTERM", "\r\nOK\r\n");
        block_on(http.uninit(&mut engine)).unwrap();
        assert_eq!(http.state(), HttpState::Disabled);
    }

    #[test]
    fn failed_parameter_aborts_request() {
        let channel = MockChannel::new();
        let mut engine = engine(&channel);
        let state = State::new();
        let mut http = session(&state);

        expect_init(&channel);
        block_on(http.init(&mut engine, false)).unwrap();
        channel.expect("AT+HTTPPARA=\"URL\",\"bad\"", "\r\nERROR\r\n");

        assert_eq!(
            block_on(http.get(&mut engine, "bad", None)),
            Err(Error::Rejected)
        );
        assert_eq!(http.state(), HttpState::Error);
        assert!(channel.sent().ends_with(b"AT+HTTPPARA=\"URL\",\"bad\"\r\n"));
    }

    #[test]
    fn requests_need_an_initialized_service() {
        let channel = MockChannel::new();
        let mut engine = engine(&channel);
        let state = State::new();
        let mut http = session(&state);

        assert_eq!(
            block_on(http.get(&mut engine, "example.com", None)),
            Err(Error::InvalidState(HttpState::Disabled))
        );
        assert_eq!(
            block_on(http.is_connected(&mut engine)),
            Err(nb::Error::Other(Error::InvalidState(HttpState::Disabled)))
        );
        assert!(channel.sent().is_empty());

        channel.expect("AT+HTTPINIT", "\r\nERROR\r\n");
        assert_eq!(block_on(http.init(&mut engine, true)), Err(Error::Rejected));
        assert_eq!(http.state(), HttpState::Disabled);
        assert!(!state::Runner::new(&state).ssl());
    }

    #[test]
    fn https_post_streams_payload_after_download() {
        let channel = MockChannel::new();
        let mut engine = engine(&channel);
        let state = State::new();
        let mut http = session(&state);
        let payload = b"{\"on\":true}";

        expect_init(&channel);
        block_on(http.init(&mut engine, true)).unwrap();

        channel.expect("AT+HTTPPARA=\"URL\",\"https://example.com/s\"", "\r\nOK\r\n");
        channel.expect("AT+HTTPPARA=\"CONTENT\",\"application/json\"", "\r\nOK\r\n");
        channel.expect("AT+HTTPSSL=1", "\r\nOK\r\n");
        channel.expect("AT+HTTPDATA=11,10000", "\r\nDOWNLOAD\r\n");
        channel.expect_raw(payload, "\r\nOK\r\n");
        channel.expect("AT+HTTPACTION=1", "\r\nOK\r\n");

        block_on(http.post(
            &mut engine,
            "https://example.com/s",
            payload,
            Some("application/json"),
        ))
        .unwrap();
        assert_eq!(http.state(), HttpState::Connecting);

        let sent = channel.sent();
        let data = b"AT+HTTPDATA=11,10000\r\n{\"on\":true}AT+HTTPACTION=1\r\n";
        assert!(sent.ends_with(data));

        // A GET completion does not complete a POST
        channel.push_rx("\r\n+HTTPACTION: 0,200,2\r\n");
        assert_eq!(
            block_on(http.is_connected(&mut engine)),
            Err(nb::Error::WouldBlock)
        );
        channel.push_rx("\r\n+HTTPACTION: 1,200,2\r\n");
        assert_eq!(block_on(http.is_connected(&mut engine)), Ok(()));
    }

    #[test]
    fn completion_survives_interleaved_commands() {
        let channel = MockChannel::new();
        let mut engine = engine(&channel);
        let state = State::new();
        let mut http = session(&state);

        expect_init(&channel);
        block_on(http.init(&mut engine, false)).unwrap();
        channel.expect("AT+HTTPPARA=\"URL\",\"example.com\"", "\r\nOK\r\n");
        channel.expect("AT+HTTPACTION=0", "\r\nOK\r\n");
        block_on(http.get(&mut engine, "example.com", None)).unwrap();

        // Completion arrives in the middle of another reply, and the next
        // command purges the buffer
        channel.expect("AT+CSQ", "\r\n+CSQ: 20,0\r\n\r\n+HTTPACTION: 0,200,12\r\n\r\nOK\r\n");
        channel.expect("AT+COPS?", "\r\n+COPS: 0,0,\"Telenor\"\r\n\r\nOK\r\n");
        block_on(engine.send_command(Some(&b"AT+CSQ"[..]), Duration::from_millis(50), OK, None))
            .unwrap();
        block_on(engine.send_command(Some(&b"AT+COPS?"[..]), Duration::from_millis(50), OK, None))
            .unwrap();

        assert_eq!(block_on(http.is_connected(&mut engine)), Ok(()));
    }

    /// Session that issued `AT+HTTPREAD` after a successful GET.
    fn reading<'d>(channel: &MockChannel, engine: &mut Engine, state: &'d State, reply: &str) -> HttpSession<'d> {
        let mut http = session(state);
        expect_init(channel);
        block_on(http.init(engine, false)).unwrap();
        channel.expect("AT+HTTPPARA=\"URL\",\"example.com\"", "\r\nOK\r\n");
        channel.expect("AT+HTTPACTION=0", "\r\nOK\r\n\r\n+HTTPACTION: 0,200,12\r\n");
        block_on(http.get(engine, "example.com", None)).unwrap();
        assert_eq!(block_on(http.is_connected(engine)), Ok(()));

        channel.expect("AT+HTTPREAD", reply);
        block_on(http.read(engine)).unwrap();
        http
    }

    #[test]
    fn partial_length_line_stays_in_progress() {
        let channel = MockChannel::new();
        let mut engine = engine(&channel);
        let state = State::new();
        let mut http = reading(&channel, &mut engine, &state, "\r\n+HTTPREAD: ");

        assert_eq!(block_on(http.is_read(&mut engine)), Err(nb::Error::WouldBlock));
        channel.push_rx("1");
        assert_eq!(block_on(http.is_read(&mut engine)), Err(nb::Error::WouldBlock));
        assert_eq!(http.state(), HttpState::Reading);
        assert!(http.holds_response());

        channel.push_rx("2\r\nhello world!\r\nOK\r\n");
        assert_eq!(block_on(http.is_read(&mut engine)), Ok(12));

        let mut body = [0u8; 12];
        assert_eq!(block_on(http.read_payload(&mut engine, &mut body)), Ok(12));
        assert_eq!(&body, b"hello world!");
        assert!(!http.holds_response());
    }

    #[test]
    fn read_error_moves_to_error() {
        let channel = MockChannel::new();
        let mut engine = engine(&channel);
        let state = State::new();
        let mut http = reading(&channel, &mut engine, &state, "\r\nERROR\r\n");

        assert_eq!(
            block_on(http.is_read(&mut engine)),
            Err(nb::Error::Other(Error::Rejected))
        );
        assert_eq!(http.state(), HttpState::Error);
        assert!(!http.holds_response());
    }

    #[test]
    fn post_stops_when_download_refused() {
        let channel = MockChannel::new();
        let mut engine = engine(&channel);
        let state = State::new();
        let mut http = session(&state);

        expect_init(&channel);
        block_on(http.init(&mut engine, false)).unwrap();
        channel.expect("AT+HTTPPARA=\"URL\",\"example.com/s\"", "\r\nOK\r\n");
        channel.expect("AT+HTTPDATA=5,10000", "\r\nERROR\r\n");

        assert_eq!(
            block_on(http.post(&mut engine, "example.com/s", b"hello", None)),
            Err(Error::Rejected)
        );
        assert_eq!(http.state(), HttpState::Error);
        assert!(channel.sent().ends_with(b"AT+HTTPDATA=5,10000\r\n"));
    }

    #[test]
    fn https_get_enables_ssl() {
        let channel = MockChannel::new();
        let mut engine = engine(&channel);
        let state = State::new();
        let mut http = session(&state);

        expect_init(&channel);
        block_on(http.init(&mut engine, true)).unwrap();
        channel.expect("AT+HTTPPARA=\"URL\",\"https://example.com\"", "\r\nOK\r\n");
        channel.expect("AT+HTTPSSL=1", "\r\nOK\r\n");
        channel.expect("AT+HTTPACTION=0", "\r\nOK\r\n");

        block_on(http.get(&mut engine, "https://example.com", None)).unwrap();
        assert_eq!(http.state(), HttpState::Connecting);
        assert!(channel
            .sent()
            .ends_with(b"AT+HTTPPARA=\"URL\",\"https://example.com\"\r\nAT+HTTPSSL=1\r\nAT+HTTPACTION=0\r\n"));
    }

    #[test]
    fn init_recovers_from_error() {
        let channel = MockChannel::new();
        let mut engine = engine(&channel);
        let state = State::new();
        let mut http = session(&state);

        expect_init(&channel);
        block_on(http.init(&mut engine, false)).unwrap();
        channel.expect("AT+HTTPPARA=\"URL\",\"bad\"", "\r\nERROR\r\n");
        assert!(block_on(http.get(&mut engine, "bad", None)).is_err());
        assert_eq!(http.state(), HttpState::Error);

        expect_init(&channel);
        block_on(http.init(&mut engine, false)).unwrap();
        assert_eq!(http.state(), HttpState::Ready);

        channel.expect("AT+HTTPPARA=\"URL\",\"example.com\"", "\r\nOK\r\n");
        channel.expect("AT+HTTPACTION=0", "\r\nOK\r\n");
        block_on(http.get(&mut engine, "example.com", None)).unwrap();
        assert_eq!(http.state(), HttpState::Connecting);
    }
}
