//! # Moorline
//!
//! A single-connection TCP front-end for small embedded devices, built on
//! `io_uring` (via `compio`).
//!
//! ## Architecture
//!
//! Moorline is structured as a small layered service:
//!
//! - **`moorline-core`**: Configuration, error taxonomy, signal flags, raw
//!   socket helpers
//! - **`moorline`**: Listening socket, accept loop, exchange operations and
//!   the scan command (this crate)
//!
//! The server parks exactly one client connection at a time. An accept loop
//! owns the listening socket and the connection slot; a separate exchange
//! task receives lines, answers the `scan` command and hands the connection
//! back. The two sides coordinate through sticky signal flags, never by
//! sharing the socket.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use moorline::prelude::*;
//!
//! struct Radio;
//!
//! impl WifiScan for Radio {
//!     fn scan_all_access_points(&self) -> ScanResult {
//!         ScanResult { ap_count: 0 }
//!     }
//!     fn format_scan_result(&self, _max_len: usize) -> String {
//!         String::new()
//!     }
//! }
//!
//! async fn serve() -> Result<(), ServerError> {
//!     let server = ConnectionServer::open(ServerOptions::default()).await?;
//!     let mut exchange = server.exchange();
//!
//!     let driver = compio::runtime::spawn(async move {
//!         loop {
//!             exchange.wait_accepted().await;
//!             let _ = run_exchange(&exchange, &Radio).await;
//!         }
//!     });
//!
//!     let result = server.run().await;
//!     drop(driver);
//!     result
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod dev_tracing;
pub mod exchange;
pub mod listener;
pub mod scan;
pub mod server;
pub mod slot;

pub use exchange::{run_exchange, Exchange};
pub use listener::ListeningSocket;
pub use scan::{ScanResult, WifiScan};
pub use server::ConnectionServer;
pub use slot::ConnectionSlot;

pub use moorline_core::error::{Result, ServerError};
pub use moorline_core::options::{KeepalivePolicy, ServerOptions};
pub use moorline_core::signal::{Signal, SignalSet};

/// Convenience re-exports for typical users of the crate.
pub mod prelude {
    pub use crate::exchange::{run_exchange, Exchange};
    pub use crate::scan::{ScanResult, WifiScan};
    pub use crate::server::ConnectionServer;
    pub use moorline_core::error::ServerError;
    pub use moorline_core::options::{KeepalivePolicy, ServerOptions};
}
