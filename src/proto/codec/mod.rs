//! RESP encoding and decoding.

mod decoder;
mod encoder;

pub use decoder::Decoder;
pub use encoder::{encode_frame, Encoder};
