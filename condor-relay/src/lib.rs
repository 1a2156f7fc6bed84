//! Condor Relay Library
//!
//! Runtime side of the relay: the UDP bridge and its worker, statistics,
//! configuration, logging setup, the status monitor and the HTTP control API.

pub mod api;
pub mod bridge;
pub mod config;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod sink;
pub mod state;
pub mod stats;

pub use bridge::{Bridge, BridgeState};
pub use error::BridgeError;
pub use stats::Statistics;
