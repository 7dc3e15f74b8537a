//! Listening socket manager.
//!
//! Creates, configures, binds and listens on the server socket once at
//! startup and owns it for the process lifetime. Startup failures are fatal;
//! the partially-created socket is closed before the error returns, so the
//! manager never holds a socket on failure.

use std::net::SocketAddr;

use compio::net::{TcpListener, TcpStream};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tracing::info;

use moorline_core::error::{Result, ServerError};
use moorline_core::options::ServerOptions;
use moorline_core::tcp::adopt_listener;

/// The process-wide listening socket.
pub struct ListeningSocket {
    inner: TcpListener,
    addr: SocketAddr,
}

impl ListeningSocket {
    /// Create, configure, bind and listen.
    ///
    /// Address reuse is enabled before binding so a restart after a crash
    /// does not fail on "address in use" while the old connections drain.
    ///
    /// # Errors
    ///
    /// - [`ServerError::SocketCreate`] if the socket cannot be created or
    ///   configured.
    /// - [`ServerError::Bind`] if the address is already bound or otherwise
    ///   unavailable.
    /// - [`ServerError::Listen`] if the bound socket cannot listen.
    pub async fn open(options: &ServerOptions) -> Result<Self> {
        let addr = options.bind_addr();

        // On any early return the socket is dropped, which closes it.
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(ServerError::SocketCreate)?;
        socket
            .set_reuse_address(true)
            .map_err(ServerError::SocketCreate)?;
        socket
            .bind(&SockAddr::from(addr))
            .map_err(|source| ServerError::Bind { addr, source })?;
        socket
            .listen(options.backlog as i32)
            .map_err(|source| ServerError::Listen { addr, source })?;
        socket
            .set_nonblocking(true)
            .map_err(ServerError::SocketCreate)?;

        let inner = adopt_listener(socket);
        // Re-read the address so binding to port 0 reports the real port.
        let addr = inner.local_addr().map_err(ServerError::SocketCreate)?;
        info!("listening on port {}", addr.port());

        Ok(Self { inner, addr })
    }

    /// Block until a client connects.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Accept`]; the caller treats it as fatal, since
    /// a broken listening socket cannot self-heal.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        self.inner.accept().await.map_err(ServerError::Accept)
    }

    /// The address the socket is actually bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn loopback_options() -> ServerOptions {
        ServerOptions::new()
            .with_addr(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .with_port(0)
    }

    #[test]
    fn test_open_reports_bound_port() {
        compio::runtime::Runtime::new().unwrap().block_on(async {
            let listener = ListeningSocket::open(&loopback_options()).await.unwrap();
            assert_ne!(listener.local_addr().port(), 0);
        });
    }

    #[test]
    fn test_bind_conflict_is_a_bind_error() {
        compio::runtime::Runtime::new().unwrap().block_on(async {
            let port = portpicker::pick_unused_port().expect("no free port");
            let options = loopback_options().with_port(port);

            let _first = ListeningSocket::open(&options).await.unwrap();
            let second = ListeningSocket::open(&options).await;

            match second {
                Err(err @ ServerError::Bind { .. }) => assert!(err.is_fatal()),
                Err(other) => panic!("expected bind error, got {other:?}"),
                Ok(_) => panic!("second bind unexpectedly succeeded"),
            }
        });
    }

    #[test]
    fn test_accept_returns_connected_stream() {
        compio::runtime::Runtime::new().unwrap().block_on(async {
            let listener = ListeningSocket::open(&loopback_options()).await.unwrap();
            let addr = listener.local_addr();

            let client = compio::runtime::spawn(async move {
                TcpStream::connect(addr).await.unwrap()
            });

            let (_stream, peer) = listener.accept().await.unwrap();
            assert!(peer.ip().is_loopback());
            client.await;
        });
    }
}
