use std::sync::Arc;

use async_trait::async_trait;

use crate::command::AtCommand;
use crate::error::ModemError;
use crate::modem::{Modem, ModemLock};
use crate::retcode::RetCode;
use crate::status::ModemStatus;
use crate::stream::BoxedStream;

/// Places outgoing calls on behalf of the modem.
///
/// `dial` runs with the modem mutex *released*, so it may block on arbitrary
/// I/O (name resolution, TCP connects, proxies). Returning
/// [`ModemError::NoCarrier`] — or any other error — sends the terminal a
/// clean `NO CARRIER`.
#[async_trait]
pub trait OutgoingCall: Send + Sync {
    async fn dial(&self, modem: &Modem, number: &str) -> Result<BoxedStream, ModemError>;
}

/// Intercepts atomic AT commands before the built-in dispatch.
///
/// Runs with the modem mutex *held*: the hook receives the open
/// [`ModemLock`] and may emit terminal output through it, but must not call
/// any locking method on the [`Modem`] handle itself. Return
/// [`RetCode::Skip`] to fall through to the built-in handler.
#[async_trait]
pub trait CommandHook: Send + Sync {
    async fn on_command(&self, modem: &mut ModemLock<'_>, cmd: &AtCommand) -> RetCode;
}

/// Intercepts whole command lines before tokenization.
///
/// Same locking regime as [`CommandHook`]. Returning anything other than
/// [`RetCode::Skip`] short-circuits the tokenizer; the returned code is the
/// response for the entire line.
#[async_trait]
pub trait LineHook: Send + Sync {
    async fn on_line(&self, modem: &mut ModemLock<'_>, line: &str) -> RetCode;
}

/// Observer invoked after every completed status transition, with the modem
/// mutex held. It must not call locking methods on the handle.
pub type StatusTransitionFn = Arc<dyn Fn(&Modem, ModemStatus, ModemStatus) + Send + Sync>;

/// Construction options for a [`Modem`].
///
/// Only `tty` is required; everything else has a usable default.
#[derive(Default)]
pub struct ModemConfig {
    /// Identifier used in logs and metrics.
    pub id: String,
    /// Terminal-side stream. Required.
    pub tty: Option<BoxedStream>,
    /// Callback placing outgoing calls; without it, `ATD` reports
    /// `NO CARRIER`.
    pub outgoing_call: Option<Arc<dyn OutgoingCall>>,
    /// Per-command interception hook.
    pub command_hook: Option<Arc<dyn CommandHook>>,
    /// Per-line interception hook.
    pub line_hook: Option<Arc<dyn LineHook>>,
    /// Status transition observer.
    pub status_transition: Option<StatusTransitionFn>,
    /// Verbose connect banner. Empty means `"CONNECT"`.
    pub connect_str: String,
    /// Rings before an unanswered incoming call is dropped. Zero means 5.
    pub ring_max: u32,
    /// Handshake byte written to the peer when answering and expected back
    /// when dialing.
    pub answer_char: Option<u8>,
    /// Initial S12 value: escape guard time in 50 ms units.
    pub guard_time: u8,
    /// Skip the silence-before check of the `+++` detector.
    pub disable_pre_guard: bool,
    /// Skip the silence-after timer of the `+++` detector.
    pub disable_post_guard: bool,
}
