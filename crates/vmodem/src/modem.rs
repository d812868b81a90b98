//! The modem engine: state machine, command dispatch, and the per-line tasks
//! (terminal reader, ringer, dialer, online relay).
//!
//! # Locking model
//!
//! Every field mutation, state transition and result-code emission happens
//! under one per-modem [`tokio::sync::Mutex`]. Blocking stream I/O and sleeps
//! always run with the mutex released. [`Modem`] methods lock automatically;
//! grouped or re-entrant work goes through [`Modem::lock`], whose
//! [`ModemLock`] guard exposes the same operations with the lock already
//! held.
//!
//! # Cancellation model
//!
//! Each state issues a fresh [`CancellationToken`]; entering a new state
//! cancels the previous one. A task spawned for a state captures that token
//! and exits quietly at its next suspension point once superseded, so at most
//! one ringer, one relay, one dialer and one escape timer can ever be live.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use tokio::io::{split, AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::command::{AtCommand, Tokenizer};
use crate::config::{CommandHook, LineHook, ModemConfig, OutgoingCall, StatusTransitionFn};
use crate::error::ModemError;
use crate::metrics::Metrics;
use crate::retcode::RetCode;
use crate::status::ModemStatus;
use crate::stream::BoxedStream;

/// Command lines longer than this are silently truncated.
const CMD_BUFFER_MAX: usize = 100;

/// Chunk size of the peer-to-terminal relay.
const RELAY_CHUNK: usize = 128;

/// Pause between RING result codes.
const RING_INTERVAL: Duration = Duration::from_secs(2);

/// One S12 unit of escape guard time.
const GUARD_QUANTUM: Duration = Duration::from_millis(50);

/// A virtual Hayes-compatible modem bridging a terminal stream with a network
/// peer.
///
/// The handle is cheap to clone; all clones refer to the same line. Dropping
/// every handle does not tear the line down — call [`Modem::close`] for that.
///
/// Construction spawns the terminal reader task, so a tokio runtime must be
/// current.
#[derive(Clone)]
pub struct Modem {
    shared: Arc<Shared>,
}

struct Shared {
    id: String,
    connect_str: String,
    ring_max: u32,
    answer_char: Option<u8>,
    disable_pre_guard: bool,
    disable_post_guard: bool,
    outgoing_call: Option<Arc<dyn OutgoingCall>>,
    command_hook: Option<Arc<dyn CommandHook>>,
    line_hook: Option<Arc<dyn LineHook>>,
    status_transition: Option<StatusTransitionFn>,
    /// Cancelled exactly once, on the transition into `Closed`. Lets the
    /// terminal reader escape a blocked read.
    closed: CancellationToken,
    state: Mutex<ModemState>,
}

struct ModemState {
    status: ModemStatus,
    /// Token of the current state; reissued on every transition.
    epoch: CancellationToken,
    tty_tx: Option<WriteHalf<BoxedStream>>,
    /// Peer read half. Shared behind its own mutex so the online relay can be
    /// restarted (ATO) without threading the half back through the state
    /// machine; the stream lock is only ever contended between a cancelled
    /// relay and its successor.
    conn_rx: Option<Arc<Mutex<ReadHalf<BoxedStream>>>>,
    conn_tx: Option<WriteHalf<BoxedStream>>,
    sregs: [u8; 256],
    echo: bool,
    short_form: bool,
    quiet_mode: bool,
    ring_count: u32,
    /// Escape detector: consecutive `+` bytes seen in online mode.
    plus_count: u8,
    last_plus: Option<Instant>,
    last_not_plus: Option<Instant>,
    metrics: Metrics,
}

impl Modem {
    /// Creates a modem over the configured terminal stream and starts reading
    /// from it immediately.
    ///
    /// Returns [`ModemError::ConfigRequired`] when no terminal stream was
    /// provided.
    pub fn new(config: ModemConfig) -> Result<Modem, ModemError> {
        let Some(tty) = config.tty else {
            return Err(ModemError::ConfigRequired);
        };

        let connect_str = if config.connect_str.is_empty() {
            "CONNECT".to_string()
        } else {
            config.connect_str
        };
        let ring_max = if config.ring_max == 0 { 5 } else { config.ring_max };

        let mut sregs = [0u8; 256];
        sregs[12] = config.guard_time;

        let (tty_rx, tty_tx) = split(tty);

        let shared = Arc::new(Shared {
            id: config.id,
            connect_str,
            ring_max,
            answer_char: config.answer_char,
            disable_pre_guard: config.disable_pre_guard,
            disable_post_guard: config.disable_post_guard,
            outgoing_call: config.outgoing_call,
            command_hook: config.command_hook,
            line_hook: config.line_hook,
            status_transition: config.status_transition,
            closed: CancellationToken::new(),
            state: Mutex::new(ModemState {
                status: ModemStatus::Idle,
                epoch: CancellationToken::new(),
                tty_tx: Some(tty_tx),
                conn_rx: None,
                conn_tx: None,
                sregs,
                echo: true,
                short_form: false,
                quiet_mode: false,
                ring_count: 0,
                plus_count: 0,
                last_plus: None,
                last_not_plus: None,
                metrics: Metrics::default(),
            }),
        });

        let modem = Modem { shared };
        tokio::spawn(tty_read_task(modem.clone(), tty_rx));
        Ok(modem)
    }

    /// Identifier of this line.
    pub fn id(&self) -> &str {
        &self.shared.id
    }

    /// Acquires the modem mutex and returns a guard exposing the lock-held
    /// operations.
    pub async fn lock(&self) -> ModemLock<'_> {
        ModemLock {
            modem: self,
            state: self.shared.state.lock().await,
        }
    }

    /// Current status.
    pub async fn status(&self) -> ModemStatus {
        self.lock().await.status()
    }

    /// Forces a state transition. Panics on an illegal one.
    pub async fn set_status(&self, status: ModemStatus) {
        self.lock().await.set_status(status).await;
    }

    /// Tears the line down irreversibly.
    pub async fn close(&self) {
        self.lock().await.close().await;
    }

    /// Offers an incoming connection; the modem starts ringing.
    pub async fn incoming_call(&self, conn: BoxedStream) -> Result<(), ModemError> {
        self.lock().await.incoming_call(conn).await
    }

    /// Tokenizes and dispatches one command line (without the `AT` prefix).
    pub async fn process_at_command(&self, line: &str) -> RetCode {
        self.lock().await.process_at_command(line).await
    }

    /// Writes a string to the terminal.
    pub async fn tty_write_str(&self, s: &str) {
        self.lock().await.tty_write_str(s).await;
    }

    /// Snapshot of the line's counters.
    pub async fn metrics(&self) -> Metrics {
        self.lock().await.metrics()
    }
}

/// Guard over a locked modem.
///
/// All mutating operations live here; [`Modem`]'s methods are thin wrappers
/// that take the lock per call. Hooks receive this guard so they can interact
/// with the line without being able to deadlock on it.
pub struct ModemLock<'a> {
    modem: &'a Modem,
    state: MutexGuard<'a, ModemState>,
}

impl ModemLock<'_> {
    /// Identifier of this line.
    pub fn id(&self) -> &str {
        self.modem.id()
    }

    /// Current status.
    pub fn status(&self) -> ModemStatus {
        self.state.status
    }

    /// Snapshot of the line's counters.
    pub fn metrics(&self) -> Metrics {
        let mut snapshot = self.state.metrics.clone();
        snapshot.status = self.state.status;
        snapshot
    }

    /// Tears the line down irreversibly.
    pub async fn close(&mut self) {
        self.set_status(ModemStatus::Closed).await;
    }

    /// Offers an incoming connection; the modem starts ringing.
    ///
    /// Fails with [`ModemError::ModemBusy`] unless the modem is idle.
    pub async fn incoming_call(&mut self, conn: BoxedStream) -> Result<(), ModemError> {
        if self.status() != ModemStatus::Idle {
            return Err(ModemError::ModemBusy);
        }
        let (rx, tx) = split(conn);
        self.state.conn_rx = Some(Arc::new(Mutex::new(rx)));
        self.state.conn_tx = Some(tx);
        self.set_status(ModemStatus::Ringing).await;
        Ok(())
    }

    /// Writes a string to the terminal. A write failure closes the modem.
    pub async fn tty_write_str(&mut self, s: &str) {
        self.tty_write(s.as_bytes()).await;
    }

    /// Forces a state transition, running every side effect of the new state:
    /// cancelling the previous epoch, emitting the result code, managing the
    /// peer connection and launching the state's task.
    ///
    /// # Panics
    ///
    /// On a transition the state machine does not allow. That is a programmer
    /// error, not a runtime condition.
    pub async fn set_status(&mut self, status: ModemStatus) {
        let prev = self.state.status;
        if prev == status {
            return;
        }
        if !prev.may_transition_to(status) {
            panic!("{}: {}: {prev} -> {status}", self.id(), ModemError::InvalidStateTransition);
        }

        self.state.epoch.cancel();
        self.state.epoch = CancellationToken::new();
        self.state.status = status;
        log::debug!("{}: status {prev} -> {status}", self.id());

        match status {
            ModemStatus::Idle => {
                if matches!(
                    prev,
                    ModemStatus::Connected | ModemStatus::ConnectedCmd | ModemStatus::Dialing
                ) {
                    self.print_ret_code(RetCode::NoCarrier).await;
                }
                self.state.conn_rx = None;
                self.state.conn_tx = None;
            }
            ModemStatus::Connected => {
                match prev {
                    ModemStatus::Ringing => {
                        if let Some(answer) = self.modem.shared.answer_char {
                            // Best effort: a failed handshake write does not
                            // abort the call.
                            if let Some(tx) = self.state.conn_tx.as_mut() {
                                let _ = tx.write_all(&[answer]).await;
                            }
                        }
                        self.state.metrics.num_in_conns += 1;
                        self.state.metrics.num_conns += 1;
                        self.state.metrics.last_conn_time = Some(SystemTime::now());
                        self.print_ret_code(RetCode::Connect).await;
                    }
                    ModemStatus::Dialing => {
                        self.state.metrics.num_out_conns += 1;
                        self.state.metrics.num_conns += 1;
                        self.state.metrics.last_conn_time = Some(SystemTime::now());
                        self.print_ret_code(RetCode::Connect).await;
                    }
                    // Returning online from command mode restarts the relay
                    // without a new banner.
                    _ => {}
                }
                if let Some(rx) = self.state.conn_rx.clone() {
                    tokio::spawn(online_task(self.modem.clone(), rx, self.state.epoch.clone()));
                }
            }
            ModemStatus::ConnectedCmd => {
                self.print_ret_code(RetCode::Ok).await;
            }
            ModemStatus::Dialing => {}
            ModemStatus::Ringing => {
                tokio::spawn(ring_task(self.modem.clone(), self.state.epoch.clone()));
            }
            ModemStatus::Closed => {
                self.state.tty_tx = None;
                self.state.conn_rx = None;
                self.state.conn_tx = None;
                self.modem.shared.closed.cancel();
            }
        }

        if let Some(observer) = self.modem.shared.status_transition.clone() {
            observer(self.modem, prev, status);
        }
    }

    /// Tokenizes and dispatches one command line (without the `AT` prefix).
    ///
    /// Commands are only accepted while idle, ringing, or in online command
    /// mode; anywhere else the whole line is an error.
    pub async fn process_at_command(&mut self, line: &str) -> RetCode {
        if !matches!(
            self.status(),
            ModemStatus::Idle | ModemStatus::ConnectedCmd | ModemStatus::Ringing
        ) {
            return RetCode::Error;
        }
        self.state.metrics.last_at_cmd_time = Some(SystemTime::now());

        if let Some(hook) = self.modem.shared.line_hook.clone() {
            let ret = hook.on_line(self, line).await;
            if ret != RetCode::Skip {
                return ret;
            }
        }

        let mut tokens = Tokenizer::new(line);
        let mut ret = RetCode::Ok;
        loop {
            match tokens.next_command() {
                Err(_) => return RetCode::Error,
                Ok(None) => break,
                Ok(Some(cmd)) => {
                    ret = self.process_command(&cmd).await;
                    if ret == RetCode::Error {
                        break;
                    }
                    if cmd.long {
                        break;
                    }
                }
            }
        }
        ret
    }

    async fn process_command(&mut self, cmd: &AtCommand) -> RetCode {
        if let Some(hook) = self.modem.shared.command_hook.clone() {
            let ret = hook.on_command(self, cmd).await;
            if ret != RetCode::Skip {
                return ret;
            }
        }

        match cmd.command.as_str() {
            "S" => {
                let reg = cmd_num(&cmd.number);
                if reg > 255 {
                    return RetCode::Error;
                }
                if cmd.assign {
                    let value = cmd_num(&cmd.value);
                    if value > 255 {
                        return RetCode::Error;
                    }
                    self.state.sregs[reg as usize] = value as u8;
                    return RetCode::Ok;
                }
                if cmd.query {
                    let value = self.state.sregs[reg as usize];
                    let text = format!("{}{value:03}\r\n", self.cr());
                    self.tty_write(text.as_bytes()).await;
                    return RetCode::Ok;
                }
            }
            "E" => match cmd_num(&cmd.number) {
                0 => self.state.echo = false,
                1 => self.state.echo = true,
                _ => return RetCode::Error,
            },
            "V" => match cmd_num(&cmd.number) {
                0 => self.state.short_form = true,
                1 => self.state.short_form = false,
                _ => return RetCode::Error,
            },
            "Q" => match cmd_num(&cmd.number) {
                0 => self.state.quiet_mode = false,
                1 => self.state.quiet_mode = true,
                _ => return RetCode::Error,
            },
            "D" => {
                if self.status() != ModemStatus::Idle {
                    return RetCode::Error;
                }
                let Some(dialer) = self.modem.shared.outgoing_call.clone() else {
                    return RetCode::NoCarrier;
                };
                self.set_status(ModemStatus::Dialing).await;
                let mut number = cmd.value.trim().to_ascii_uppercase();
                if let Some(rest) = number.strip_prefix(['T', 'P']) {
                    number = rest.trim().to_string();
                }
                let epoch = self.state.epoch.clone();
                tokio::spawn(dial_task(self.modem.clone(), dialer, number, epoch));
                return RetCode::Silent;
            }
            "A" => match self.status() {
                ModemStatus::Idle => return RetCode::NoCarrier,
                ModemStatus::Ringing => {
                    self.set_status(ModemStatus::Connected).await;
                    return RetCode::Silent;
                }
                _ => return RetCode::Error,
            },
            "H" => {
                if matches!(self.status(), ModemStatus::Connected | ModemStatus::ConnectedCmd) {
                    self.set_status(ModemStatus::Idle).await;
                    return RetCode::Silent;
                }
            }
            "O" => {
                if self.status() != ModemStatus::ConnectedCmd {
                    return RetCode::Error;
                }
                self.set_status(ModemStatus::Connected).await;
                return RetCode::Silent;
            }
            "&F" | "Z" => {
                self.state.sregs[0] = 0;
                self.state.echo = true;
                self.state.short_form = false;
                self.state.quiet_mode = false;
                if matches!(self.status(), ModemStatus::Connected | ModemStatus::ConnectedCmd) {
                    self.set_status(ModemStatus::Idle).await;
                    return RetCode::Silent;
                }
            }
            // Unrecognized commands are accepted for compatibility with the
            // init strings real clients send.
            _ => {}
        }
        RetCode::Ok
    }

    fn cr(&self) -> &'static str {
        if self.state.short_form {
            "\r"
        } else {
            "\r\n"
        }
    }

    /// Emits a result code to the terminal, honoring quiet mode and the
    /// verbose/short setting.
    ///
    /// Writes bypass the metered path: a failing terminal during a state
    /// transition must not trigger another transition from in here. The next
    /// metered write or read picks the failure up and closes the modem.
    pub(crate) async fn print_ret_code(&mut self, ret: RetCode) {
        let text = if self.state.short_form {
            ret.short_code()
        } else if ret == RetCode::Connect {
            Some(self.modem.shared.connect_str.as_str())
        } else {
            ret.verbose()
        };
        let Some(text) = text else { return };
        if self.state.quiet_mode {
            return;
        }
        let framed = format!("{}{}{}", self.cr(), text, self.cr());
        if let Some(tty) = self.state.tty_tx.as_mut() {
            let _ = tty.write_all(framed.as_bytes()).await;
        }
    }

    /// Metered terminal write. Any failure closes the modem.
    async fn tty_write(&mut self, buf: &[u8]) {
        if buf.is_empty() {
            return;
        }
        self.state.metrics.last_tty_tx_time = Some(SystemTime::now());
        let Some(tty) = self.state.tty_tx.as_mut() else {
            return;
        };
        match tty.write_all(buf).await {
            Ok(()) => self.state.metrics.tty_tx_bytes += buf.len() as u64,
            Err(_) => self.set_status(ModemStatus::Closed).await,
        }
    }

    fn guard_time(&self) -> Duration {
        GUARD_QUANTUM * u32::from(self.state.sregs[12])
    }

    /// Feeds one online-mode byte to the `+++` escape detector.
    ///
    /// With S12 = 0 both windows are zero-width and the inter-plus check
    /// resets the counter on every byte, so the sequence can never complete;
    /// escaping requires an explicit guard time.
    async fn feed_escape_detector(&mut self, byte: u8) {
        if byte != b'+' {
            self.state.plus_count = 0;
            self.state.last_not_plus = Some(Instant::now());
            return;
        }

        let guard = self.guard_time();
        if !self.modem.shared.disable_pre_guard {
            let data_too_recent = self
                .state
                .last_not_plus
                .is_some_and(|t| t.elapsed() < guard);
            if data_too_recent {
                self.state.plus_count = 0;
                self.state.last_not_plus = Some(Instant::now());
                return;
            }
        }

        let gap_expired = self.state.last_plus.map_or(true, |t| t.elapsed() > guard);
        if gap_expired {
            self.state.plus_count = 0;
        }
        self.state.plus_count += 1;
        self.state.last_plus = Some(Instant::now());

        if self.state.plus_count == 3 {
            if self.modem.shared.disable_post_guard {
                self.set_status(ModemStatus::ConnectedCmd).await;
            } else {
                tokio::spawn(post_guard_task(
                    self.modem.clone(),
                    self.state.epoch.clone(),
                    guard,
                ));
            }
        }
    }
}

/// Numeric parameter of a short command. Empty means zero; values too large
/// for the register space saturate so the caller rejects them.
fn cmd_num(s: &str) -> u32 {
    if s.is_empty() {
        0
    } else {
        s.parse().unwrap_or(u32::MAX)
    }
}

/// Reads the terminal one byte at a time for the modem's whole life.
///
/// In command-assembly states it implements the `AT` line discipline (echo,
/// DEL editing, `A/` repeat); in online mode it relays bytes to the peer and
/// feeds the escape detector. Loss of the terminal closes the modem.
async fn tty_read_task(modem: Modem, mut tty_rx: ReadHalf<BoxedStream>) {
    let closed = modem.shared.closed.clone();
    let mut a_flag = false;
    let mut at_flag = false;
    let mut buffer = String::new();
    let mut last_cmd = String::new();
    let mut byte = [0u8; 1];

    loop {
        let result = tokio::select! {
            _ = closed.cancelled() => return,
            r = tty_rx.read(&mut byte) => r,
        };

        let mut m = modem.lock().await;
        if m.status() == ModemStatus::Closed {
            return;
        }
        if !matches!(result, Ok(n) if n > 0) {
            log::warn!("{}: terminal stream lost", m.id());
            m.set_status(ModemStatus::Closed).await;
            return;
        }
        m.state.metrics.last_tty_rx_time = Some(SystemTime::now());
        m.state.metrics.tty_rx_bytes += 1;
        let b = byte[0];

        if m.status() == ModemStatus::Connected {
            // Online pass-through. The escape bytes are data too.
            m.state.metrics.conn_tx_bytes += 1;
            let write_failed = match m.state.conn_tx.as_mut() {
                Some(tx) => tx.write_all(&[b]).await.is_err(),
                None => false,
            };
            if write_failed {
                log::warn!("{}: connection stream lost", m.id());
                m.set_status(ModemStatus::Idle).await;
                continue;
            }
            m.feed_escape_detector(b).await;
            continue;
        }
        m.state.plus_count = 0;

        if m.status() == ModemStatus::Dialing {
            // Any keypress aborts a dial in progress.
            m.set_status(ModemStatus::Idle).await;
            continue;
        }

        if !at_flag {
            if m.state.echo {
                m.tty_write(&[b]).await;
            }
            if b.to_ascii_uppercase() == b'A' {
                a_flag = true;
                continue;
            }
            if a_flag && b == b'/' {
                a_flag = false;
                if m.state.echo {
                    m.tty_write(b"\r").await;
                }
                let line = last_cmd.clone();
                let ret = m.process_at_command(&line).await;
                m.print_ret_code(ret).await;
                continue;
            }
            if a_flag && b.to_ascii_uppercase() == b'T' {
                at_flag = true;
                a_flag = false;
                continue;
            }
            a_flag = false;
        } else if b == 0x7f {
            if !buffer.is_empty() {
                buffer.pop();
                if m.state.echo {
                    m.tty_write(b"\x1b[D \x1b[D").await;
                }
            }
        } else if b == b'\r' {
            at_flag = false;
            last_cmd = buffer.clone();
            if m.state.echo {
                m.tty_write(b"\r").await;
            }
            let line = last_cmd.clone();
            let ret = m.process_at_command(&line).await;
            m.print_ret_code(ret).await;
            buffer.clear();
        } else if buffer.len() < CMD_BUFFER_MAX && (b == b' ' || b.is_ascii_graphic()) {
            buffer.push(b as char);
            if m.state.echo {
                m.tty_write(&[b]).await;
            }
        }
    }
}

/// Emits RING every two seconds while ringing; gives up after `ring_max`
/// rings or answers automatically once S0 is reached.
///
/// Returns a boxed future for the same reason as [`online_task`]: it is
/// mutually recursive with `set_status`'s `ModemStatus::Ringing` arm through
/// `tokio::spawn`.
fn ring_task(modem: Modem, epoch: CancellationToken) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        let mut m = modem.lock().await;
        while m.status() == ModemStatus::Ringing {
            if epoch.is_cancelled() {
                break;
            }
            m.state.ring_count += 1;
            m.print_ret_code(RetCode::Ring).await;
            if m.state.ring_count > modem.shared.ring_max {
                m.set_status(ModemStatus::Idle).await;
                break;
            }
            let auto_answer = m.state.sregs[0];
            if auto_answer > 0 && m.state.ring_count >= u32::from(auto_answer) {
                m.set_status(ModemStatus::Connected).await;
                break;
            }
            drop(m);
            tokio::select! {
                _ = epoch.cancelled() => {}
                _ = tokio::time::sleep(RING_INTERVAL) => {}
            }
            m = modem.lock().await;
        }
        m.state.ring_count = 0;
    })
}

/// Runs the outgoing-call callback off the critical section, performs the
/// optional answer-char handshake and installs the connection.
///
/// The epoch is rechecked after every blocking step: if the dial was aborted
/// (keypress, close) the obtained connection is dropped and no state changes.
async fn dial_task(
    modem: Modem,
    dialer: Arc<dyn OutgoingCall>,
    number: String,
    epoch: CancellationToken,
) {
    if epoch.is_cancelled() {
        return;
    }
    log::info!("{}: dialing {number}", modem.id());

    let mut fail = false;
    let mut conn: Option<BoxedStream> = None;
    match dialer.dial(&modem, &number).await {
        Ok(stream) => conn = Some(stream),
        Err(err) => {
            log::debug!("{}: dial failed: {err}", modem.id());
            fail = true;
        }
    }

    if let Some(expected) = modem.shared.answer_char {
        if let Some(stream) = conn.as_mut() {
            let mut buf = [0u8; 1];
            match stream.read(&mut buf).await {
                Ok(1) if buf[0] == expected => {}
                _ => fail = true,
            }
        }
    }

    let mut m = modem.lock().await;
    if epoch.is_cancelled() {
        // Aborted while we were off dialing; the connection, if any, is
        // dropped without touching the state machine.
        return;
    }
    if fail {
        m.set_status(ModemStatus::Idle).await;
        return;
    }
    if let Some(stream) = conn {
        let (rx, tx) = split(stream);
        m.state.conn_rx = Some(Arc::new(Mutex::new(rx)));
        m.state.conn_tx = Some(tx);
        m.set_status(ModemStatus::Connected).await;
    }
}

/// Copies peer bytes to the terminal while connected. EOF or a read error is
/// a graceful hangup.
///
/// Returns a boxed future rather than being a plain `async fn`: this call and
/// `set_status`'s `ModemStatus::Connected` arm are mutually recursive through
/// `tokio::spawn`, and an un-erased `async fn` here makes that a self-referential
/// opaque type that `rustc` can't size or prove `Send` for.
fn online_task(
    modem: Modem,
    conn_rx: Arc<Mutex<ReadHalf<BoxedStream>>>,
    epoch: CancellationToken,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        let mut buf = [0u8; RELAY_CHUNK];
        loop {
            let result = tokio::select! {
                _ = epoch.cancelled() => return,
                r = async { conn_rx.lock().await.read(&mut buf).await } => r,
            };

            let mut m = modem.lock().await;
            if epoch.is_cancelled() {
                return;
            }
            match result {
                Ok(n) if n > 0 => {
                    m.state.metrics.conn_rx_bytes += n as u64;
                    m.tty_write(&buf[..n]).await;
                }
                _ => {
                    log::warn!("{}: connection stream lost", m.id());
                    m.set_status(ModemStatus::Idle).await;
                    return;
                }
            }
        }
    })
}

/// Waits out the post-escape guard window, then drops to online command mode
/// if the three `+` are still the last thing seen and the state is unchanged.
async fn post_guard_task(modem: Modem, epoch: CancellationToken, guard: Duration) {
    tokio::time::sleep(guard).await;
    let mut m = modem.lock().await;
    if epoch.is_cancelled() || m.state.plus_count != 3 {
        return;
    }
    m.set_status(ModemStatus::ConnectedCmd).await;
}
