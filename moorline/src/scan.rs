//! Wi-Fi scan collaborator interface.
//!
//! The scan subsystem lives outside this crate; the server only needs the two
//! calls the command path makes. Both block the calling task for the scan
//! duration, which is acceptable because the exchange handles one client at a
//! time.

/// Summary of a completed access-point scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanResult {
    /// Number of access points found.
    pub ap_count: usize,
}

/// Interface to the Wi-Fi scan subsystem.
pub trait WifiScan {
    /// Scan for all visible access points and return a summary.
    fn scan_all_access_points(&self) -> ScanResult;

    /// Render the most recent scan results as text, at most `max_len` bytes.
    fn format_scan_result(&self, max_len: usize) -> String;
}
