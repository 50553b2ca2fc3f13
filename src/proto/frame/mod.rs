//! RESP frame types.

mod types;

pub use types::Frame;
