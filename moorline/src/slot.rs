//! Connection slot: single-occupancy holder of the active client socket.
//!
//! The accept loop installs each accepted socket here and later closes it;
//! the exchange operations borrow the socket for the duration of one I/O
//! call. While the socket is lent out the slot keeps its raw handle, so a
//! timeout-triggered force-close can still shut the connection down and fail
//! the borrower's in-flight I/O instead of waiting for it.
//!
//! The slot is shared behind a mutex that is only ever held for bookkeeping,
//! never across I/O.

use std::mem;
use std::sync::Arc;

use compio::net::TcpStream;
use parking_lot::Mutex;
use tracing::trace;

use moorline_core::tcp::{shutdown_both, RawSocketHandle};

#[cfg(unix)]
use std::os::unix::io::AsRawFd;
#[cfg(windows)]
use std::os::windows::io::AsRawSocket;

fn handle_of(stream: &TcpStream) -> RawSocketHandle {
    #[cfg(unix)]
    {
        stream.as_raw_fd()
    }
    #[cfg(windows)]
    {
        stream.as_raw_socket()
    }
}

enum SlotState {
    /// No client.
    Empty,
    /// Client socket parked in the slot.
    Held(TcpStream),
    /// Socket borrowed by an exchange operation; the raw handle stays behind
    /// so a force-close can still reach the connection.
    Lent(RawSocketHandle),
}

/// Holder of at most one active client socket.
pub struct ConnectionSlot {
    state: SlotState,
    generation: u64,
}

impl ConnectionSlot {
    /// Create an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SlotState::Empty,
            generation: 0,
        }
    }

    /// Park a freshly accepted socket in the slot.
    ///
    /// Any previous occupant is closed first, so at most one live client
    /// socket ever exists. Each install starts a new generation, letting a
    /// borrower that unblocks late recognize that its connection is gone.
    pub fn install(&mut self, stream: TcpStream) {
        self.close();
        self.state = SlotState::Held(stream);
        self.generation = self.generation.wrapping_add(1);
    }

    /// Generation of the current occupant. Bumped on every install.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Borrow the parked socket for one exchange operation.
    ///
    /// Returns `None` when the slot is empty or the socket is already lent
    /// out.
    pub fn lend(&mut self) -> Option<TcpStream> {
        match mem::replace(&mut self.state, SlotState::Empty) {
            SlotState::Held(stream) => {
                self.state = SlotState::Lent(handle_of(&stream));
                Some(stream)
            }
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Return a borrowed socket to the slot.
    ///
    /// Returns `true` if the socket was re-parked. If the slot was
    /// force-closed while the socket was lent out, the returned stream is
    /// stale: it is dropped instead and `false` comes back.
    pub fn restore(&mut self, stream: TcpStream) -> bool {
        match self.state {
            SlotState::Lent(_) => {
                self.state = SlotState::Held(stream);
                true
            }
            _ => {
                trace!("dropping stale stream returned after force-close");
                drop(stream);
                false
            }
        }
    }

    /// Error path: shut down and drop a borrowed socket immediately.
    ///
    /// Returns `true` if the socket was still the slot's current occupant,
    /// `false` if the slot had already been force-closed and moved on.
    pub fn discard(&mut self, stream: TcpStream) -> bool {
        let was_current = matches!(self.state, SlotState::Lent(_));
        if was_current {
            self.state = SlotState::Empty;
        }
        let _ = shutdown_both(&stream);
        drop(stream);
        was_current
    }

    /// Shut down and release whatever occupies the slot.
    ///
    /// Safe to call on an empty slot; closing twice is a no-op. A lent-out
    /// socket is shut down in place, which fails the borrower's next I/O
    /// call; the borrower drops the handle itself.
    pub fn close(&mut self) {
        match mem::replace(&mut self.state, SlotState::Empty) {
            SlotState::Empty => {}
            SlotState::Held(stream) => {
                let _ = shutdown_both(&stream);
                drop(stream);
            }
            SlotState::Lent(handle) => {
                let _ = shutdown_both(&handle);
            }
        }
    }

    /// Whether a client currently occupies the slot (parked or lent out).
    #[must_use]
    pub fn is_occupied(&self) -> bool {
        !matches!(self.state, SlotState::Empty)
    }
}

impl Default for ConnectionSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Slot handle shared between the accept loop and the exchange operations.
pub type SharedSlot = Arc<Mutex<ConnectionSlot>>;

#[cfg(test)]
mod tests {
    use super::*;
    use compio::buf::BufResult;
    use compio::io::AsyncRead;
    use compio::net::TcpListener;

    async fn local_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (client, server)
    }

    async fn read_eof(stream: &mut TcpStream) -> bool {
        let buf = Vec::with_capacity(8);
        let BufResult(result, _) = stream.read(buf).await;
        matches!(result, Ok(0))
    }

    #[test]
    fn test_install_and_close() {
        compio::runtime::Runtime::new().unwrap().block_on(async {
            let (_client, server) = local_pair().await;
            let mut slot = ConnectionSlot::new();
            assert!(!slot.is_occupied());

            slot.install(server);
            assert!(slot.is_occupied());

            slot.close();
            assert!(!slot.is_occupied());

            // Closing an empty slot is a safe no-op.
            slot.close();
            assert!(!slot.is_occupied());
        });
    }

    #[test]
    fn test_install_evicts_previous_occupant() {
        compio::runtime::Runtime::new().unwrap().block_on(async {
            let (mut client1, server1) = local_pair().await;
            let (_client2, server2) = local_pair().await;

            let mut slot = ConnectionSlot::new();
            slot.install(server1);
            slot.install(server2);

            // First connection was closed by the second install.
            assert!(read_eof(&mut client1).await);
            assert!(slot.is_occupied());
        });
    }

    #[test]
    fn test_lend_and_restore() {
        compio::runtime::Runtime::new().unwrap().block_on(async {
            let (_client, server) = local_pair().await;
            let mut slot = ConnectionSlot::new();
            slot.install(server);

            let stream = slot.lend().expect("occupied slot lends its socket");
            assert!(slot.is_occupied());
            assert!(slot.lend().is_none()); // already lent out

            assert!(slot.restore(stream));
            assert!(slot.lend().is_some());
        });
    }

    #[test]
    fn test_lend_from_empty_slot() {
        let mut slot = ConnectionSlot::new();
        assert!(slot.lend().is_none());
    }

    #[test]
    fn test_force_close_while_lent() {
        compio::runtime::Runtime::new().unwrap().block_on(async {
            let (mut client, server) = local_pair().await;
            let mut slot = ConnectionSlot::new();
            slot.install(server);

            let stream = slot.lend().unwrap();

            // Listener reclaims the slot while the exchange holds the stream.
            slot.close();
            assert!(!slot.is_occupied());
            assert!(read_eof(&mut client).await);

            // The borrower's handle is stale; restoring drops it.
            assert!(!slot.restore(stream));
            assert!(!slot.is_occupied());
        });
    }

    #[test]
    fn test_generation_advances_per_install() {
        compio::runtime::Runtime::new().unwrap().block_on(async {
            let (_client1, server1) = local_pair().await;
            let (_client2, server2) = local_pair().await;

            let mut slot = ConnectionSlot::new();
            let initial = slot.generation();

            slot.install(server1);
            let first = slot.generation();
            assert_ne!(first, initial);

            // Closing does not advance the generation; only installs do.
            slot.close();
            assert_eq!(slot.generation(), first);

            slot.install(server2);
            assert_ne!(slot.generation(), first);
        });
    }

    #[test]
    fn test_discard_reports_currency() {
        compio::runtime::Runtime::new().unwrap().block_on(async {
            let (_client, server) = local_pair().await;
            let mut slot = ConnectionSlot::new();
            slot.install(server);

            let stream = slot.lend().unwrap();
            assert!(slot.discard(stream));
            assert!(!slot.is_occupied());

            // After a force-close the discarded stream is no longer current.
            let (_client2, server2) = local_pair().await;
            slot.install(server2);
            let stream2 = slot.lend().unwrap();
            slot.close();
            assert!(!slot.discard(stream2));
        });
    }
}
