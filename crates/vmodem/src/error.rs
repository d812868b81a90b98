use thiserror::Error;

/// Errors surfaced by the modem engine.
///
/// I/O failures on owned streams are never reported through this type; they
/// are recovered internally by a state transition (terminal loss closes the
/// modem, peer loss hangs up). Illegal state transitions are programmer
/// errors and panic instead of returning.
#[derive(Debug, Error)]
pub enum ModemError {
    /// Construction was attempted without a required option (the terminal
    /// stream).
    #[error("config required")]
    ConfigRequired,

    /// An incoming call was offered while the modem was not idle.
    #[error("modem busy")]
    ModemBusy,

    /// An illegal state transition was attempted.
    #[error("invalid state transition")]
    InvalidStateTransition,

    /// An outgoing call could not be placed. Dial callbacks return this to
    /// signal a clean `NO CARRIER` to the terminal.
    #[error("no carrier")]
    NoCarrier,

    /// I/O failure inside a dial callback.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
