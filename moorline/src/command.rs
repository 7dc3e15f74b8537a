//! Command gating and reply assembly.
//!
//! The wire protocol recognizes a single command token. The match is exact:
//! only trailing line terminators and NUL padding are stripped before the
//! comparison, so prefix, suffix and case variants of the token are treated
//! as ordinary content and produce no reply.

use tracing::debug;

use crate::scan::WifiScan;

/// The one command token the server recognizes.
pub const SCAN_COMMAND: &[u8] = b"scan";

/// Fixed prefix of every scan reply.
pub const SCAN_REPLY_PREFIX: &str = "Scanned APs:";

/// Upper bound on the formatted scan text appended after the prefix.
pub const MAX_SCAN_TEXT: usize = 312;

/// Check whether a received buffer is exactly the scan command.
#[must_use]
pub fn is_scan_command(received: &[u8]) -> bool {
    trim_line(received) == SCAN_COMMAND
}

/// Strip trailing line terminators and NUL padding.
///
/// The protocol is line-oriented ASCII with no framing, so a command may
/// arrive with a trailing newline or, from C peers, a terminating NUL.
/// Nothing else is trimmed.
pub(crate) fn trim_line(received: &[u8]) -> &[u8] {
    let mut end = received.len();
    while end > 0 && matches!(received[end - 1], b'\0' | b'\r' | b'\n') {
        end -= 1;
    }
    &received[..end]
}

/// Assemble a scan reply into `reply`: the fixed prefix followed by the
/// formatted scan results, truncated to the reply bound.
///
/// Runs the scan synchronously; the collaborator blocks the calling task for
/// the scan duration.
pub fn build_scan_reply<S: WifiScan + ?Sized>(scanner: &S, reply: &mut Vec<u8>) {
    reply.clear();
    reply.extend_from_slice(SCAN_REPLY_PREFIX.as_bytes());

    let result = scanner.scan_all_access_points();
    debug!("scan found {} access points", result.ap_count);

    let text = scanner.format_scan_result(MAX_SCAN_TEXT);
    reply.extend_from_slice(text.as_bytes());
    reply.truncate(SCAN_REPLY_PREFIX.len() + MAX_SCAN_TEXT);
}
