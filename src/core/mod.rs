//! Core constants, error types and stream traits.
//!
//! This module has no I/O dependencies; everything here is shared by the
//! wire codec, the option set and the transfer state machine.

mod constants;
mod error;
mod traits;

pub use constants::*;
pub use error::*;
pub use traits::*;
