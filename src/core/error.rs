//! Error types for the TFTP protocol engine.

use thiserror::Error;

/// Errors that can occur when decoding a packet from the wire.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Input datagram is shorter than required.
    #[error("packet too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum bytes required.
        expected: usize,
        /// Actual bytes received.
        actual: usize,
    },

    /// Opcode is not one of the six defined TFTP operations.
    #[error("unknown opcode: {0}")]
    UnknownOpcode(u16),

    /// A string field is missing its NUL terminator.
    #[error("unterminated string field")]
    UnterminatedString,

    /// A string field is not valid UTF-8.
    #[error("string field is not valid UTF-8")]
    InvalidString,

    /// A request carries a transfer mode this implementation does not know.
    #[error("unknown transfer mode: {0:?}")]
    UnknownMode(String),

    /// An option name arrived without a value.
    #[error("option is missing its value")]
    DanglingOption,
}

/// Protocol violations observed during an active transfer.
///
/// Any of these closes the transfer and, where a peer address is known,
/// sends an error command before closing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// The peer sent a datagram that does not decode.
    #[error("malformed packet: {0}")]
    Decode(#[from] DecodeError),

    /// A data block arrived with a number that is neither expected nor
    /// the previously acknowledged one.
    #[error("unexpected block number: expected {expected}, got {actual}")]
    UnexpectedBlock {
        /// The block number the transfer was waiting for.
        expected: u16,
        /// The block number that arrived.
        actual: u16,
    },
}

/// Top-level errors surfaced by the client and server layers.
#[derive(Debug, Error)]
pub enum TftpError {
    /// The peer terminated the transfer with an error command.
    #[error("peer error {code}: {message}")]
    Peer {
        /// TFTP error code from the wire.
        code: u16,
        /// Error message from the wire.
        message: String,
    },

    /// The retry budget was exhausted without a reply.
    #[error("transfer timed out")]
    TimedOut,

    /// The transfer was cancelled locally.
    #[error("transfer cancelled")]
    Cancelled,

    /// The peer violated the protocol.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    /// Local stream or socket failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
