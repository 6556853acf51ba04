//! TFTP wire format.
//!
//! Implements the packet layer of RFC 1350 with the RFC 2347 option
//! extension:
//!
//! - **Packet codec**: [`Packet`] with `encode`/`decode` over raw datagrams
//! - **Transfer modes**: [`TransferMode`] string parsing and formatting

mod mode;
mod packet;

pub use mode::*;
pub use packet::*;
