//! Exchange operations: receive and send against the current connection.
//!
//! Driven by a task separate from the accept loop. Each operation borrows the
//! socket from the connection slot for exactly one call, so the two tasks
//! never race on the handle. Any I/O failure closes the socket immediately
//! and raises `finished`, unblocking the accept loop without waiting for its
//! timeout.

use std::io;

use compio::buf::BufResult;
use compio::io::{AsyncRead, AsyncWrite};
use compio::net::TcpStream;
use tracing::{debug, info};

use moorline_core::error::{report, Result, ServerError};
use moorline_core::signal::SignalSet;

use crate::command;
use crate::scan::WifiScan;
use crate::slot::SharedSlot;

/// Handle for the data-exchange task.
///
/// Cheap to clone; all clones operate on the same connection slot and signal
/// set.
#[derive(Clone)]
pub struct Exchange {
    slot: SharedSlot,
    signals: SignalSet,
    read_capacity: usize,
    write_capacity: usize,
    /// Slot generation observed by the last `wait_accepted`. Lets `finish`
    /// recognize that the connection it handled was already reclaimed and a
    /// newer one occupies the slot.
    current_generation: u64,
}

impl Exchange {
    pub(crate) fn new(
        slot: SharedSlot,
        signals: SignalSet,
        read_capacity: usize,
        write_capacity: usize,
    ) -> Self {
        Self {
            slot,
            signals,
            read_capacity,
            write_capacity,
            current_generation: 0,
        }
    }

    /// The signal set shared with the accept loop.
    #[must_use]
    pub fn signals(&self) -> &SignalSet {
        &self.signals
    }

    /// Receive buffer capacity from the server configuration.
    #[must_use]
    pub fn read_capacity(&self) -> usize {
        self.read_capacity
    }

    /// Send buffer capacity from the server configuration.
    #[must_use]
    pub fn write_capacity(&self) -> usize {
        self.write_capacity
    }

    /// Suspend until the accept loop publishes a new connection.
    ///
    /// Must be observed before the first operation on each connection;
    /// waiting consumes the `accepted` flag for the next cycle and records
    /// the connection's generation so a late [`finish`](Self::finish) cannot
    /// leak into the next one.
    pub async fn wait_accepted(&mut self) {
        self.signals.accepted.wait().await;
        self.current_generation = self.slot.lock().generation();
    }

    /// Receive one bounded chunk from the current connection.
    ///
    /// The destination buffer is cleared first, so no stale data leaks
    /// across calls. Returns `Ok(0)` when the peer closed its write side,
    /// which is a normal exit, not an error. Both normal exits raise
    /// `received`.
    ///
    /// # Errors
    ///
    /// - [`ServerError::NotConnected`] if no client occupies the slot.
    /// - [`ServerError::Receive`] on socket failure; the socket is closed
    ///   immediately and `finished` is raised.
    pub async fn receive(&self, buf: &mut Vec<u8>) -> Result<usize> {
        buf.clear();
        let mut stream = self.lend()?;

        loop {
            let chunk = Vec::with_capacity(self.read_capacity);
            let BufResult(result, chunk) = stream.read(chunk).await;
            match result {
                Ok(0) => {
                    debug!("connection closed by peer");
                    if self.slot.lock().restore(stream) {
                        self.signals.received.set();
                    }
                    return Ok(0);
                }
                Ok(n) => {
                    if !self.slot.lock().restore(stream) {
                        // Reclaimed while the read was in flight; the bytes
                        // belong to a connection that no longer exists.
                        return Err(ServerError::NotConnected);
                    }
                    debug!("received {n} bytes");
                    buf.extend_from_slice(&chunk);
                    // Line-oriented ASCII protocol; log whatever arrived as text.
                    info!("{}", String::from_utf8_lossy(command::trim_line(buf)));
                    self.signals.received.set();
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let err = ServerError::Receive(e);
                    self.fail(stream, &err);
                    return Err(err);
                }
            }
        }
    }

    /// Send the full buffer to the current connection.
    ///
    /// Partial writes are retried until every byte is out. Success raises
    /// `sent` and lowers `ready_to_send`.
    ///
    /// # Errors
    ///
    /// - [`ServerError::NotConnected`] if no client occupies the slot.
    /// - [`ServerError::Send`] on socket failure; the socket is closed
    ///   immediately and `finished` is raised.
    pub async fn send(&self, data: &[u8]) -> Result<()> {
        let mut stream = self.lend()?;

        match send_all(&mut stream, data).await {
            Ok(()) => {
                if !self.slot.lock().restore(stream) {
                    return Err(ServerError::NotConnected);
                }
                debug!("sent {} bytes", data.len());
                self.signals.ready_to_send.clear();
                self.signals.sent.set();
                Ok(())
            }
            Err(e) => {
                let err = ServerError::Send(e);
                self.fail(stream, &err);
                Err(err)
            }
        }
    }

    /// Normal-completion signal from the driver.
    ///
    /// Raises `finished` only while the connection observed by the last
    /// [`wait_accepted`](Self::wait_accepted) still occupies the slot; if the
    /// accept loop already reclaimed it, a late signal would leak into the
    /// next connection's cycle.
    pub fn finish(&self) {
        let slot = self.slot.lock();
        if slot.is_occupied() && slot.generation() == self.current_generation {
            self.signals.finished.set();
        }
    }

    fn lend(&self) -> Result<TcpStream> {
        self.slot.lock().lend().ok_or(ServerError::NotConnected)
    }

    /// Shared error path: log once, close the socket immediately, and
    /// unblock the accept loop without waiting for its timeout.
    fn fail(&self, stream: TcpStream, err: &ServerError) {
        report(err);
        let was_current = self.slot.lock().discard(stream);
        // A failure caused by the listener's own force-close must not leave
        // a stale `finished` behind for the next connection.
        if was_current {
            self.signals.finished.set();
        }
    }
}

/// Minimal write seam so the partial-write loop is testable off the network.
pub(crate) trait WriteChunk {
    async fn write_chunk(&mut self, chunk: Vec<u8>) -> io::Result<usize>;
}

impl WriteChunk for TcpStream {
    async fn write_chunk(&mut self, chunk: Vec<u8>) -> io::Result<usize> {
        let BufResult(result, _) = AsyncWrite::write(self, chunk).await;
        result
    }
}

/// Write the whole buffer, retrying the remaining suffix after every partial
/// write. A single write may transfer fewer bytes than requested; treating a
/// short write as complete would corrupt the stream.
pub(crate) async fn send_all<S: WriteChunk>(stream: &mut S, data: &[u8]) -> io::Result<()> {
    let mut written = 0;
    while written < data.len() {
        let chunk = data[written..].to_vec();
        match stream.write_chunk(chunk).await {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "write returned zero bytes",
                ));
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Drive one connection: receive lines until the peer closes, answering the
/// scan command and nothing else.
///
/// Non-command content is accepted and logged by the receive path but never
/// answered. On normal completion raises `finished` so the accept loop can
/// close and re-enter; on failure the exchange error path has already done
/// so.
///
/// # Errors
///
/// Propagates the first receive or send failure. Callers absorb it at the
/// connection boundary; it never outlives the connection.
pub async fn run_exchange<S: WifiScan>(exchange: &Exchange, scanner: &S) -> Result<()> {
    let mut line = Vec::with_capacity(exchange.read_capacity());
    let mut reply = Vec::with_capacity(exchange.write_capacity());

    loop {
        let received = exchange.receive(&mut line).await?;
        if received == 0 {
            break;
        }
        if command::is_scan_command(&line) {
            command::build_scan_reply(scanner, &mut reply);
            exchange.signals().ready_to_send.set();
            exchange.send(&reply).await?;
        }
    }

    exchange.finish();
    Ok(())
}
