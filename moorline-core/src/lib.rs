//! Moorline Core
//!
//! This crate contains the shared core building blocks:
//! - Server configuration and keepalive policy (`options`)
//! - Error taxonomy and the error reporter (`error`)
//! - Sticky manual-reset signal flags (`signal`)
//! - Raw-fd TCP socket configuration utilities (`tcp`)

// The tcp module needs raw fd/socket access for socket configuration
#![cfg_attr(not(test), deny(unsafe_code))]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod options;
pub mod signal;
pub mod tcp;

// Small prelude for downstream crates. Keep it minimal to avoid API lock-in.
pub mod prelude {
    pub use crate::error::{report, ServerError};
    pub use crate::options::{KeepalivePolicy, ServerOptions};
    pub use crate::signal::{Signal, SignalSet};
    pub use crate::tcp::{configure_keepalive, shutdown_both};
}
