//! TCP socket configuration utilities.
//!
//! This module applies OS-level socket options (keepalive, shutdown) to
//! sockets owned elsewhere, without taking ownership of them.
//!
//! # Safety
//!
//! This module uses unsafe code to access raw file descriptors/sockets for
//! TCP socket configuration. The unsafe operations are encapsulated and safe
//! to use from the public API.

#![allow(unsafe_code)]

use std::io;
use std::net::Shutdown;

use crate::options::KeepalivePolicy;

/// Raw socket handle retained by the connection slot while the stream itself
/// is lent out to an exchange operation.
#[cfg(unix)]
pub type RawSocketHandle = std::os::unix::io::RawFd;

#[cfg(windows)]
pub type RawSocketHandle = std::os::windows::io::RawSocket;

/// Apply the keepalive policy to a connected socket.
///
/// When the policy is disabled, `SO_KEEPALIVE` is switched off and the timing
/// parameters are left untouched. The probe count is applied on Unix only;
/// other platforms rely on their stack defaults for it.
///
/// # Errors
///
/// Returns an error if any of the socket options cannot be set.
#[cfg(unix)]
pub fn configure_keepalive<S: std::os::unix::io::AsRawFd>(
    socket: &S,
    policy: &KeepalivePolicy,
) -> io::Result<()> {
    use std::os::unix::io::FromRawFd;

    let fd = socket.as_raw_fd();
    let sock = unsafe { socket2::Socket::from_raw_fd(fd) };
    let result = apply_keepalive(&sock, policy);
    std::mem::forget(sock); // Don't close the fd
    result
}

#[cfg(windows)]
pub fn configure_keepalive<S: std::os::windows::io::AsRawSocket>(
    socket: &S,
    policy: &KeepalivePolicy,
) -> io::Result<()> {
    use std::os::windows::io::FromRawSocket;

    let raw = socket.as_raw_socket();
    let sock = unsafe { socket2::Socket::from_raw_socket(raw) };
    let result = apply_keepalive(&sock, policy);
    std::mem::forget(sock); // Don't close the socket
    result
}

fn apply_keepalive(sock: &socket2::Socket, policy: &KeepalivePolicy) -> io::Result<()> {
    if !policy.enabled {
        return sock.set_keepalive(false);
    }

    sock.set_keepalive(true)?;

    let keepalive = socket2::TcpKeepalive::new()
        .with_time(policy.idle)
        .with_interval(policy.interval);
    #[cfg(unix)]
    let keepalive = keepalive.with_retries(policy.count);

    sock.set_tcp_keepalive(&keepalive)
}

/// Adopt a configured, already-listening socket into the async runtime.
///
/// Ownership of the underlying handle transfers to the returned listener;
/// the socket must already be bound and listening.
#[cfg(unix)]
#[must_use]
pub fn adopt_listener(socket: socket2::Socket) -> compio::net::TcpListener {
    use std::os::unix::io::{FromRawFd, IntoRawFd};

    // The fd comes straight out of the socket2 handle, so it is valid and
    // uniquely owned here.
    unsafe { compio::net::TcpListener::from_raw_fd(socket.into_raw_fd()) }
}

#[cfg(windows)]
#[must_use]
pub fn adopt_listener(socket: socket2::Socket) -> compio::net::TcpListener {
    use std::os::windows::io::{FromRawSocket, IntoRawSocket};

    unsafe { compio::net::TcpListener::from_raw_socket(socket.into_raw_socket()) }
}

/// Shut down both directions of a connected socket without closing it.
///
/// Used by the force-close path to fail any in-flight read or write on the
/// connection; callers tolerate errors from sockets that are already dead.
///
/// # Errors
///
/// Returns an error if the socket is already shut down or no longer
/// connected.
#[cfg(unix)]
pub fn shutdown_both<S: std::os::unix::io::AsRawFd>(socket: &S) -> io::Result<()> {
    use std::os::unix::io::FromRawFd;

    let fd = socket.as_raw_fd();
    let sock = unsafe { socket2::Socket::from_raw_fd(fd) };
    let result = sock.shutdown(Shutdown::Both);
    std::mem::forget(sock); // Don't close the fd
    result
}

#[cfg(windows)]
pub fn shutdown_both<S: std::os::windows::io::AsRawSocket>(socket: &S) -> io::Result<()> {
    use std::os::windows::io::FromRawSocket;

    let raw = socket.as_raw_socket();
    let sock = unsafe { socket2::Socket::from_raw_socket(raw) };
    let result = sock.shutdown(Shutdown::Both);
    std::mem::forget(sock); // Don't close the socket
    result
}
