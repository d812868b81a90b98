use std::fmt;

/// Operational state of a modem line.
///
/// The modem follows a strict state machine; every transition is validated by
/// [`Modem::set_status`](crate::Modem) and an illegal transition is treated as
/// a programmer error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModemStatus {
    /// On hook, waiting for commands. Initial state.
    Idle,
    /// An outgoing call is in progress.
    Dialing,
    /// Online data mode: terminal and peer bytes are relayed verbatim.
    Connected,
    /// Online command mode: the call is up but the terminal talks AT again.
    ConnectedCmd,
    /// An incoming call is ringing.
    Ringing,
    /// The line has been torn down. Terminal state.
    Closed,
}

impl ModemStatus {
    /// Whether a network connection is owned in this state.
    pub fn owns_connection(self) -> bool {
        matches!(self, ModemStatus::Ringing | ModemStatus::Connected | ModemStatus::ConnectedCmd)
    }

    /// Whether the state machine allows `self -> next`.
    ///
    /// Self-transitions are filtered out before this check and `Closed` as a
    /// source is rejected unconditionally.
    pub(crate) fn may_transition_to(self, next: ModemStatus) -> bool {
        if self == ModemStatus::Closed {
            return false;
        }
        match next {
            ModemStatus::Idle | ModemStatus::Closed => true,
            ModemStatus::Dialing | ModemStatus::Ringing => self == ModemStatus::Idle,
            ModemStatus::Connected => matches!(
                self,
                ModemStatus::Dialing | ModemStatus::Ringing | ModemStatus::ConnectedCmd
            ),
            ModemStatus::ConnectedCmd => self == ModemStatus::Connected,
        }
    }
}

impl fmt::Display for ModemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModemStatus::Idle => "Idle",
            ModemStatus::Dialing => "Dialing",
            ModemStatus::Connected => "Connected",
            ModemStatus::ConnectedCmd => "ConnectedCmd",
            ModemStatus::Ringing => "Ringing",
            ModemStatus::Closed => "Closed",
        };
        f.write_str(name)
    }
}
