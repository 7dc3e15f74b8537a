//! Server configuration
//!
//! This module provides the immutable configuration record for the TCP
//! front-end: bind address, listen backlog, exchange buffer capacities,
//! keepalive policy and the bounded wait applied while reclaiming a
//! connection.
//!
//! The record is created once at startup and never mutated afterwards.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// TCP keepalive policy applied to every accepted connection.
///
/// Keepalive lets the OS detect a peer that vanished without closing the
/// connection; combined with the bounded finish wait it guarantees the
/// listener always gets its single connection slot back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepalivePolicy {
    /// Whether `SO_KEEPALIVE` is enabled on accepted sockets.
    pub enabled: bool,
    /// Idle time before the first keepalive probe (`TCP_KEEPIDLE`).
    pub idle: Duration,
    /// Interval between unanswered probes (`TCP_KEEPINTVL`).
    pub interval: Duration,
    /// Number of unanswered probes before the connection is dropped
    /// (`TCP_KEEPCNT`).
    pub count: u32,
}

impl Default for KeepalivePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            idle: Duration::from_secs(10),
            interval: Duration::from_secs(10),
            count: 5,
        }
    }
}

/// Server configuration.
///
/// All values have device-appropriate defaults; the record is consumed by the
/// listening socket manager, the accept loop and the exchange operations.
///
/// # Examples
///
/// ```
/// use moorline_core::options::ServerOptions;
/// use std::time::Duration;
///
/// let opts = ServerOptions::default()
///     .with_port(27015)
///     .with_finish_timeout(Duration::from_millis(3500));
/// ```
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Address the listening socket binds to.
    ///
    /// Default: `0.0.0.0` (all IPv4 interfaces).
    pub addr: IpAddr,

    /// Port the listening socket binds to.
    ///
    /// Default: 27015. Tests may use 0 to let the OS pick a free port.
    pub port: u16,

    /// Listen backlog depth.
    ///
    /// Maximum number of fully-established connections queued awaiting
    /// accept. Default: 4.
    pub backlog: u32,

    /// Receive buffer capacity (bytes).
    ///
    /// Upper bound on the bytes drained by a single receive call.
    /// Default: 512.
    pub read_buffer_size: usize,

    /// Send buffer capacity (bytes).
    ///
    /// Staging capacity for assembled replies. Default: 512, enough for the
    /// scan reply prefix plus the bounded scan text.
    pub write_buffer_size: usize,

    /// Keepalive policy for accepted connections.
    pub keepalive: KeepalivePolicy,

    /// Bounded wait on the `finished` signal before the accept loop
    /// force-closes the connection and reclaims the slot.
    ///
    /// Default: 3.5 seconds.
    pub finish_timeout: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 27015,
            backlog: 4,
            read_buffer_size: 512,
            write_buffer_size: 512,
            keepalive: KeepalivePolicy::default(),
            finish_timeout: Duration::from_millis(3500),
        }
    }
}

impl ServerOptions {
    /// Create new server options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address.
    pub fn with_addr(mut self, addr: IpAddr) -> Self {
        self.addr = addr;
        self
    }

    /// Set the listening port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the listen backlog depth.
    pub fn with_backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog;
        self
    }

    /// Set the receive buffer capacity.
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set the send buffer capacity.
    pub fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Set the keepalive policy.
    pub fn with_keepalive(mut self, keepalive: KeepalivePolicy) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Set the bounded wait on the `finished` signal.
    pub fn with_finish_timeout(mut self, timeout: Duration) -> Self {
        self.finish_timeout = timeout;
        self
    }

    /// The socket address the listening socket binds to.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.addr, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = ServerOptions::default();
        assert_eq!(opts.port, 27015);
        assert_eq!(opts.backlog, 4);
        assert_eq!(opts.read_buffer_size, 512);
        assert_eq!(opts.write_buffer_size, 512);
        assert_eq!(opts.finish_timeout, Duration::from_millis(3500));
        assert!(opts.keepalive.enabled);
        assert_eq!(opts.keepalive.idle, Duration::from_secs(10));
        assert_eq!(opts.keepalive.interval, Duration::from_secs(10));
        assert_eq!(opts.keepalive.count, 5);
    }

    #[test]
    fn test_builder_pattern() {
        let opts = ServerOptions::new()
            .with_port(9000)
            .with_backlog(16)
            .with_read_buffer_size(1024)
            .with_finish_timeout(Duration::from_secs(1));

        assert_eq!(opts.port, 9000);
        assert_eq!(opts.backlog, 16);
        assert_eq!(opts.read_buffer_size, 1024);
        assert_eq!(opts.finish_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_bind_addr() {
        let opts = ServerOptions::new().with_port(27015);
        assert_eq!(opts.bind_addr().to_string(), "0.0.0.0:27015");

        let opts = opts.with_addr("127.0.0.1".parse().unwrap()).with_port(0);
        assert_eq!(opts.bind_addr().to_string(), "127.0.0.1:0");
    }

    #[test]
    fn test_keepalive_override() {
        let opts = ServerOptions::new().with_keepalive(KeepalivePolicy {
            enabled: false,
            idle: Duration::from_secs(5),
            interval: Duration::from_secs(5),
            count: 3,
        });
        assert!(!opts.keepalive.enabled);
        assert_eq!(opts.keepalive.count, 3);
    }
}
