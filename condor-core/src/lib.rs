//! Condor Relay Core Library
//!
//! The packet pipeline of the relay, free of I/O: the telemetry field model
//! and classifier, the datagram codec, the unit table, and the conversion
//! engine that ties them together.

pub mod codec;
pub mod convert;
pub mod error;
pub mod model;
pub mod units;

pub use codec::{decode, encode, Datagram};
pub use convert::{transform, CategoryCounts, ConversionReport};
pub use error::ParseError;
pub use model::{classify, ConversionSettings, FieldCategory, NetworkConfig, TelemetryField};
pub use units::UnitSpec;
