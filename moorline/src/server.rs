//! Single-connection accept loop.
//!
//! The server parks exactly one client at a time. Each accepted connection is
//! installed into the shared slot, announced through `accepted`, then held
//! until the exchange side raises `finished` or a bounded wait expires. Either
//! way the slot is closed before the loop re-enters `accept`, so a stuck or
//! silent client can delay the next one by at most the configured timeout.

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use moorline_core::error::{report, Result, ServerError};
use moorline_core::options::ServerOptions;
use moorline_core::signal::SignalSet;
use moorline_core::tcp::configure_keepalive;

use crate::exchange::Exchange;
use crate::listener::ListeningSocket;
use crate::slot::{ConnectionSlot, SharedSlot};

/// A TCP front-end serving one client connection at a time.
pub struct ConnectionServer {
    listener: ListeningSocket,
    slot: SharedSlot,
    signals: SignalSet,
    options: ServerOptions,
}

impl ConnectionServer {
    /// Bind the listening socket and prepare the shared connection state.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::SocketCreate`], [`ServerError::Bind`] or
    /// [`ServerError::Listen`] when the socket cannot be set up. All three
    /// are fatal: the server never came up.
    pub async fn open(options: ServerOptions) -> Result<Self> {
        let listener = ListeningSocket::open(&options).await?;
        Ok(Self {
            listener,
            slot: Arc::new(Mutex::new(ConnectionSlot::new())),
            signals: SignalSet::new(),
            options,
        })
    }

    /// Handle for the data-exchange task.
    #[must_use]
    pub fn exchange(&self) -> Exchange {
        Exchange::new(
            Arc::clone(&self.slot),
            self.signals.clone(),
            self.options.read_buffer_size,
            self.options.write_buffer_size,
        )
    }

    /// The signal set shared between the accept loop and the exchange side.
    #[must_use]
    pub fn signals(&self) -> &SignalSet {
        &self.signals
    }

    /// The bound listening address. With port 0 this carries the port the
    /// kernel picked.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Run the accept loop until the listening socket fails.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Accept`] when `accept` itself fails; errors on
    /// individual connections are absorbed and the loop re-enters `accept`.
    pub async fn run(&self) -> Result<()> {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    report(&err);
                    return Err(err);
                }
            };
            debug!("accepted connection from {peer}");

            if self.options.keepalive.enabled {
                if let Err(e) = configure_keepalive(&stream, &self.options.keepalive) {
                    // The connection still works without keepalive; a dead
                    // peer just takes longer to notice.
                    warn!("failed to configure keepalive for {peer}: {e}");
                }
            }

            self.slot.lock().install(stream);
            self.signals.accepted.set();

            if let Err(err) = self.wait_for_finished().await {
                // Implicit finish, not a hard error.
                debug!("{err}; reclaiming connection");
            }
            self.slot.lock().close();
        }
    }

    /// Bounded wait for the exchange side to finish with the connection.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::FinishTimeout`] when the wait expires; the
    /// caller treats it as an implicit finish and reclaims the connection
    /// anyway. A `finished` raised in the instant after the timeout would
    /// otherwise poison the next cycle, so the flag is cleared before the
    /// error returns.
    async fn wait_for_finished(&self) -> Result<()> {
        let timeout = self.options.finish_timeout;
        if self.signals.finished.wait_timeout(timeout).await {
            Ok(())
        } else {
            self.signals.finished.clear();
            Err(ServerError::FinishTimeout(timeout))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compio::runtime::Runtime;
    use std::net::{IpAddr, Ipv4Addr};

    fn loopback_options() -> ServerOptions {
        ServerOptions::default()
            .with_addr(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .with_port(0)
    }

    #[test]
    fn test_open_binds_ephemeral_port() {
        Runtime::new().unwrap().block_on(async {
            let server = ConnectionServer::open(loopback_options()).await.unwrap();
            assert_ne!(server.local_addr().port(), 0);
            assert!(!server.signals().accepted.is_set());
        });
    }

    #[test]
    fn test_exchange_shares_signals_with_server() {
        Runtime::new().unwrap().block_on(async {
            let server = ConnectionServer::open(loopback_options()).await.unwrap();
            let exchange = server.exchange();

            server.signals().accepted.set();
            assert!(exchange.signals().accepted.is_set());
        });
    }

    #[test]
    fn test_exchange_receive_without_connection_fails() {
        Runtime::new().unwrap().block_on(async {
            let server = ConnectionServer::open(loopback_options()).await.unwrap();
            let exchange = server.exchange();

            let mut buf = Vec::new();
            let err = exchange.receive(&mut buf).await.unwrap_err();
            assert!(matches!(err, ServerError::NotConnected));
        });
    }
}
