//! # TFTP Protocol
//!
//! A transfer engine for the Trivial File Transfer Protocol: RFC 1350
//! lockstep transfers plus the RFC 2347-2349 option negotiation
//! extensions, for both client requests and server-side answers.
//!
//! The core of the crate is the [`Transfer`] state machine. It is
//! sans-IO: it consumes decoded commands, timer ticks and cancellation as
//! explicit events, queues outbound datagrams for a collaborator to put
//! on the wire, and reports its terminal result as a polled value. The
//! UDP socket, the timer and the filesystem all live outside the core and
//! plug in through narrow interfaces.
//!
//! - **Reliability**: stop-and-wait with verbatim retransmission and a
//!   bounded retry budget
//! - **Negotiation**: `blksize`, `timeout` and `tsize` options, with
//!   silent fallback to protocol defaults when a peer ignores them
//! - **Isolation**: one state machine per transfer, sharing nothing
//!
//! ## Feature Flags
//!
//! - `transport` (default): tokio UDP socket wrapper and transfer driver
//! - `client` (default): high-level read/write client
//! - `server` (default): request acceptor and per-session transfers
//!
//! ## Modules
//!
//! - [`core`]: constants, error types and stream traits (always included)
//! - [`wire`]: packet codec (always included)
//! - [`options`]: option negotiation (always included)
//! - [`transfer`]: the transfer state machine (always included)
//! - [`transport`]: async UDP plumbing (requires `transport` feature)
//! - [`client`]: client API (requires `client` feature)
//! - [`server`]: server API (requires `server` feature)
//!
//! ## Example
//!
//! Driving a transfer by hand, with the collaborator's responsibilities
//! played inline:
//!
//! ```rust
//! use tftp_protocol::prelude::*;
//!
//! let mut transfer = Transfer::read_request(
//!     "hello.txt",
//!     TransferMode::Octet,
//!     OptionSet::new(),
//!     Vec::<u8>::new(),
//!     TransferConfig::default(),
//! );
//!
//! // Entry action: the RRQ goes out.
//! transfer.start();
//! let rrq = transfer.poll_transmit().expect("request queued");
//! assert_eq!(Packet::decode(&rrq).unwrap().name(), "RRQ");
//!
//! // The peer answers with a single short data block.
//! transfer.on_packet(Packet::Data { block: 1, data: b"hi".to_vec() });
//!
//! // The engine acked it and completed.
//! assert!(transfer.poll_transmit().is_some());
//! assert!(transfer.outcome().unwrap().is_success());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core protocol (always included)
pub mod core;
pub mod options;
pub mod transfer;
pub mod wire;

// Transport layer (feature-gated)
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod transport;

// Client API (feature-gated)
#[cfg(feature = "client")]
#[cfg_attr(docsrs, doc(cfg(feature = "client")))]
pub mod client;

// Server API (feature-gated)
#[cfg(feature = "server")]
#[cfg_attr(docsrs, doc(cfg(feature = "server")))]
pub mod server;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::{BlockSink, BlockSource, DecodeError, ProtocolViolation, TftpError};
    pub use crate::options::{OptionSet, TransferOption};
    pub use crate::transfer::{
        Transfer, TransferConfig, TransferOutcome, TransferState,
    };
    pub use crate::wire::{Packet, Request, TransferMode};

    #[cfg(feature = "transport")]
    pub use crate::transport::TftpSocket;

    #[cfg(feature = "client")]
    pub use crate::client::TftpClient;

    #[cfg(feature = "server")]
    pub use crate::server::{DirectoryHandler, RequestHandler, TftpServer};
}

// Re-export commonly used items at crate root
pub use crate::core::TftpError;
pub use crate::options::OptionSet;
pub use crate::transfer::{Transfer, TransferConfig, TransferOutcome, TransferState};
pub use crate::wire::{Packet, TransferMode};

#[cfg(feature = "client")]
pub use crate::client::TftpClient;

#[cfg(feature = "server")]
pub use crate::server::TftpServer;
