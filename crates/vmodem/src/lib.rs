//! Virtual Hayes-compatible modem engine.
//!
//! `vmodem` emulates the AT-command state machine of a classical voiceband
//! modem over arbitrary byte streams: the terminal side of each line speaks
//! AT commands and raw data, the network side is whatever stream the embedder
//! provides (typically TCP). Legacy software gets a modem; the call goes over
//! the network.
//!
//! One [`Modem`] is one emulated line. It owns both streams, runs a terminal
//! reader task for its whole life, and drives ringing, dialing and the online
//! relay as state-bound tasks that are cancelled whenever the state machine
//! moves on.
//!
//! ```no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use tokio::net::TcpStream;
//! use vmodem::{BoxedStream, Modem, ModemConfig, ModemError, OutgoingCall};
//!
//! struct TcpDialer;
//!
//! #[async_trait]
//! impl OutgoingCall for TcpDialer {
//!     async fn dial(&self, _modem: &Modem, number: &str) -> Result<BoxedStream, ModemError> {
//!         let stream = TcpStream::connect(number).await?;
//!         Ok(Box::new(stream))
//!     }
//! }
//!
//! # async fn run(tty: BoxedStream) -> Result<(), ModemError> {
//! let modem = Modem::new(ModemConfig {
//!     id: "tty0".into(),
//!     tty: Some(tty),
//!     outgoing_call: Some(Arc::new(TcpDialer)),
//!     ..Default::default()
//! })?;
//! # modem.close().await;
//! # Ok(())
//! # }
//! ```

mod command;
mod config;
mod error;
mod metrics;
mod modem;
mod retcode;
mod status;
mod stream;

pub use command::AtCommand;
pub use config::{CommandHook, LineHook, ModemConfig, OutgoingCall, StatusTransitionFn};
pub use error::ModemError;
pub use metrics::Metrics;
pub use modem::{Modem, ModemLock};
pub use retcode::RetCode;
pub use status::ModemStatus;
pub use stream::{BoxedStream, ByteStream};
