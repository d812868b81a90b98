use std::time::SystemTime;

use crate::status::ModemStatus;

/// Runtime counters for one modem line.
///
/// Byte counters are cumulative since construction. [`Modem::metrics`]
/// returns a snapshot with `status` filled in at copy time.
///
/// [`Modem::metrics`]: crate::Modem::metrics
#[derive(Debug, Clone)]
pub struct Metrics {
    /// Status at the time the snapshot was taken.
    pub status: ModemStatus,
    /// Bytes written to the terminal.
    pub tty_tx_bytes: u64,
    /// Bytes read from the terminal.
    pub tty_rx_bytes: u64,
    /// Bytes relayed terminal -> peer in online mode.
    pub conn_tx_bytes: u64,
    /// Bytes relayed peer -> terminal in online mode.
    pub conn_rx_bytes: u64,
    /// Total connections established.
    pub num_conns: u64,
    /// Incoming connections answered.
    pub num_in_conns: u64,
    /// Outgoing connections completed.
    pub num_out_conns: u64,
    /// Last write to the terminal.
    pub last_tty_tx_time: Option<SystemTime>,
    /// Last read from the terminal.
    pub last_tty_rx_time: Option<SystemTime>,
    /// Last AT command processed.
    pub last_at_cmd_time: Option<SystemTime>,
    /// Last connection established.
    pub last_conn_time: Option<SystemTime>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            status: ModemStatus::Idle,
            tty_tx_bytes: 0,
            tty_rx_bytes: 0,
            conn_tx_bytes: 0,
            conn_rx_bytes: 0,
            num_conns: 0,
            num_in_conns: 0,
            num_out_conns: 0,
            last_tty_tx_time: None,
            last_tty_rx_time: None,
            last_at_cmd_time: None,
            last_conn_time: None,
        }
    }
}
