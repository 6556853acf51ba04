//! Async UDP plumbing for transfers.
//!
//! The state machine in [`crate::transfer`] is sans-IO; this module is
//! the collaborator that connects it to the network:
//!
//! - **Sockets**: [`TftpSocket`], a tokio UDP wrapper with an owned
//!   receive buffer
//! - **Event dispatch**: [`drive`] / [`drive_with_cancel`], the
//!   one-event-at-a-time loop feeding datagrams, timer ticks and
//!   cancellation into a [`Transfer`](crate::transfer::Transfer)

mod drive;
mod socket;

pub use drive::*;
pub use socket::*;
