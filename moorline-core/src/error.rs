//! Moorline Error Types
//!
//! Error taxonomy for the connection server. Startup and accept failures are
//! fatal; receive/send failures are absorbed at the connection boundary.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

/// Main error type for server operations.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Listening socket could not be created or configured
    #[error("failed to create listening socket: {0}")]
    SocketCreate(#[source] io::Error),

    /// Listening socket could not bind (address in use or unavailable)
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Bound socket could not start listening
    #[error("failed to listen on {addr}: {source}")]
    Listen {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Accept failed; the listening socket cannot self-heal
    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),

    /// Receive failed on the active connection
    #[error("error occurred during receiving: {0}")]
    Receive(#[source] io::Error),

    /// Send failed on the active connection
    #[error("error occurred during sending: {0}")]
    Send(#[source] io::Error),

    /// Exchange operation invoked while no client connection was active
    #[error("no client connection is active")]
    NotConnected,

    /// Bounded wait on the finished signal expired; treated as an implicit
    /// finish, not a hard error
    #[error("timed out after {0:?} waiting for transmission to finish")]
    FinishTimeout(Duration),
}

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

impl ServerError {
    /// Check if this error terminates the service.
    ///
    /// Startup failures and accept failures are fatal; everything scoped to a
    /// single connection is recovered by closing that connection.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SocketCreate(_) | Self::Bind { .. } | Self::Listen { .. } | Self::Accept(_)
        )
    }

    /// Check if this error is scoped to the current connection.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::Receive(_) | Self::Send(_) | Self::NotConnected)
    }

    /// The underlying OS error code, when one exists.
    ///
    /// This is the uniform errno-equivalent logged by [`report`].
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::SocketCreate(e)
            | Self::Bind { source: e, .. }
            | Self::Listen { source: e, .. }
            | Self::Accept(e)
            | Self::Receive(e)
            | Self::Send(e) => e.raw_os_error(),
            Self::NotConnected | Self::FinishTimeout(_) => None,
        }
    }
}

/// Log an error with its OS error code before any corrective action.
///
/// Every failure is reported exactly once, here, so the silent per-connection
/// recovery never loses diagnosability.
pub fn report(err: &ServerError) {
    match err.raw_os_error() {
        Some(code) => error!("{err} (os error {code})"),
        None => error!("{err}"),
    }
}
