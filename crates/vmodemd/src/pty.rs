//! Pseudo-terminal provisioning.
//!
//! Each virtual modem line is backed by a pty pair: legacy software opens the
//! slave device (through a stable symlink), the daemon reads and writes the
//! master. Pty file descriptors only offer blocking I/O, so a pair of bridge
//! threads shuttles bytes between the master and the async world; the modem
//! engine sees an ordinary [`AsyncRead`]/[`AsyncWrite`] stream.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::OwnedFd;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::mpsc as std_mpsc;
use std::task::{Context, Poll};
use std::thread;

use nix::pty::openpty;
use nix::unistd::ttyname;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::mpsc;

use crate::Res;

const BRIDGE_BUF: usize = 1024;
const INCOMING_QUEUE: usize = 64;

/// One provisioned modem line: the async stream over the pty master plus the
/// paths involved.
pub struct PtyLine {
    pub stream: PtyStream,
    pub slave_path: PathBuf,
    pub link_path: PathBuf,
}

/// Opens a fresh pty pair and links `link_path` to its slave device.
///
/// The slave fd is kept open for the lifetime of the stream so the master
/// does not signal hangup every time the external program closes the device.
pub fn open_line(link_path: &Path) -> Res<PtyLine> {
    let pty = openpty(None, None)?;
    let slave_path = ttyname(&pty.slave)?;

    let _ = std::fs::remove_file(link_path);
    std::os::unix::fs::symlink(&slave_path, link_path)?;

    let stream = PtyStream::new(pty.master, pty.slave)?;
    Ok(PtyLine {
        stream,
        slave_path,
        link_path: link_path.to_path_buf(),
    })
}

/// Async byte stream over a pty master.
///
/// Reads arrive through a channel fed by a blocking reader thread; writes are
/// queued to a blocking writer thread. When either side of the pty dies the
/// channels close and the stream reports EOF / broken pipe, which the modem
/// engine turns into line teardown.
pub struct PtyStream {
    incoming: mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
    outgoing: Option<std_mpsc::Sender<Vec<u8>>>,
    _slave: OwnedFd,
}

impl PtyStream {
    fn new(master: OwnedFd, slave: OwnedFd) -> Res<Self> {
        let reader = File::from(master);
        let writer = reader.try_clone()?;

        let (incoming_tx, incoming) = mpsc::channel(INCOMING_QUEUE);
        thread::spawn(move || read_loop(reader, incoming_tx));

        let (outgoing, outgoing_rx) = std_mpsc::channel::<Vec<u8>>();
        thread::spawn(move || write_loop(writer, outgoing_rx));

        Ok(Self {
            incoming,
            pending: Vec::new(),
            outgoing: Some(outgoing),
            _slave: slave,
        })
    }
}

fn read_loop(mut master: File, tx: mpsc::Sender<Vec<u8>>) {
    let mut buf = [0u8; BRIDGE_BUF];
    loop {
        match master.read(&mut buf) {
            Ok(n) if n > 0 => {
                if tx.blocking_send(buf[..n].to_vec()).is_err() {
                    return;
                }
            }
            _ => return,
        }
    }
}

fn write_loop(mut master: File, rx: std_mpsc::Receiver<Vec<u8>>) {
    for chunk in rx.iter() {
        if master.write_all(&chunk).is_err() {
            return;
        }
    }
}

impl AsyncRead for PtyStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if !this.pending.is_empty() {
            let n = this.pending.len().min(buf.remaining());
            buf.put_slice(&this.pending[..n]);
            this.pending.drain(..n);
            return Poll::Ready(Ok(()));
        }
        match this.incoming.poll_recv(cx) {
            Poll::Ready(Some(data)) => {
                let n = data.len().min(buf.remaining());
                buf.put_slice(&data[..n]);
                if n < data.len() {
                    this.pending.extend_from_slice(&data[n..]);
                }
                Poll::Ready(Ok(()))
            }
            // Reader thread is gone: EOF.
            Poll::Ready(None) => Poll::Ready(Ok(())),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl AsyncWrite for PtyStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let queued = this
            .outgoing
            .as_ref()
            .map(|tx| tx.send(buf.to_vec()).is_ok())
            .unwrap_or(false);
        if queued {
            Poll::Ready(Ok(buf.len()))
        } else {
            Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()))
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().outgoing = None;
        Poll::Ready(Ok(()))
    }
}
