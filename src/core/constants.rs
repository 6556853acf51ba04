//! Protocol constants from RFC 1350 and RFC 2347-2349.
//!
//! These values are fixed by the protocol and MUST NOT be changed.

use std::time::Duration;

// =============================================================================
// OPCODES (RFC 1350 / RFC 2347)
// =============================================================================

/// Read request (RRQ).
pub const OPCODE_READ_REQUEST: u16 = 1;

/// Write request (WRQ).
pub const OPCODE_WRITE_REQUEST: u16 = 2;

/// Data block (DATA).
pub const OPCODE_DATA: u16 = 3;

/// Acknowledgement (ACK).
pub const OPCODE_ACK: u16 = 4;

/// Error (ERROR).
pub const OPCODE_ERROR: u16 = 5;

/// Option acknowledgement (OACK, RFC 2347).
pub const OPCODE_OPTION_ACK: u16 = 6;

// =============================================================================
// BLOCK SIZES (RFC 1350 / RFC 2348)
// =============================================================================

/// Data block payload size when no `blksize` option is negotiated.
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Smallest negotiable `blksize` value.
pub const MIN_BLOCK_SIZE: usize = 8;

/// Largest negotiable `blksize` value (65535 minus the DATA header,
/// rounded down per RFC 2348).
pub const MAX_BLOCK_SIZE: usize = 65464;

// =============================================================================
// OPTION NAMES (RFC 2348 / RFC 2349)
// =============================================================================

/// Block size option.
pub const OPTION_BLOCK_SIZE: &str = "blksize";

/// Retransmission timeout option, in whole seconds.
pub const OPTION_TIMEOUT: &str = "timeout";

/// Transfer size option.
pub const OPTION_TRANSFER_SIZE: &str = "tsize";

// =============================================================================
// TIMING DEFAULTS
// =============================================================================

/// Retransmission interval when no `timeout` option is negotiated.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Smallest `timeout` option value accepted, in seconds (RFC 2349).
pub const MIN_TIMEOUT_SECS: u64 = 1;

/// Largest `timeout` option value accepted, in seconds (RFC 2349).
pub const MAX_TIMEOUT_SECS: u64 = 255;

/// Retransmissions attempted before a transfer is declared dead.
pub const DEFAULT_MAX_RETRIES: usize = 5;

// =============================================================================
// ERROR CODES (RFC 1350 / RFC 2347)
// =============================================================================

/// Not defined, see error message.
pub const ERR_UNDEFINED: u16 = 0;

/// File not found.
pub const ERR_FILE_NOT_FOUND: u16 = 1;

/// Access violation.
pub const ERR_ACCESS_VIOLATION: u16 = 2;

/// Disk full or allocation exceeded.
pub const ERR_DISK_FULL: u16 = 3;

/// Illegal TFTP operation.
pub const ERR_ILLEGAL_OPERATION: u16 = 4;

/// Unknown transfer ID.
pub const ERR_UNKNOWN_TRANSFER_ID: u16 = 5;

/// File already exists.
pub const ERR_FILE_EXISTS: u16 = 6;

/// No such user.
pub const ERR_NO_SUCH_USER: u16 = 7;

/// Option negotiation failed (RFC 2347).
pub const ERR_OPTION_NEGOTIATION: u16 = 8;
