//! RESP protocol support: frame model, codec, and the crate error type.

/// RESP encoder and decoder.
pub mod codec;
/// Error taxonomy and result alias.
pub mod error;
/// Frame types.
pub mod frame;

pub use error::{Error, Result};
pub use frame::Frame;
