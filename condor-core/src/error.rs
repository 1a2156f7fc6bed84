//! Error types for datagram decoding

use thiserror::Error;

/// A datagram that cannot be turned into a field sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty datagram")]
    Empty,
}
