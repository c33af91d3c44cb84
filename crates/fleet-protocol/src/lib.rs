//! fleet-protocol
//!
//! Wire-level encoding/decoding for fleet record synchronization.
//!
//! This crate turns logical messages (`fleet_core::Message`) into bytes
//! and back again, in two layers:
//!
//! - [`text_codec`]  : prefix-tagged UTF-8 message bodies (`SEND_DATA:`, `DATA:`, ...)
//! - [`frame_codec`] : 4-byte big-endian length prefix around each body, so
//!   bodies survive being split or coalesced by TCP
//!
//! Constants shared by both sides live in [`wire_types`].

pub mod frame_codec;
pub mod text_codec;
pub mod wire_types;

pub use frame_codec::FrameCodec;
pub use text_codec::{decode_message, encode_message};

/// Errors that can arise when framing or decoding a message.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The body does not start with any known message prefix.
    #[error("unrecognised message: {preview:?}")]
    UnknownMessage { preview: String },

    /// A body that must be text (greeting, roster) is not valid UTF-8.
    #[error("message body is not valid UTF-8")]
    InvalidUtf8,

    /// A well-formed message arrived where a different one was required.
    #[error("expected {expected:?}, got {got:?}")]
    UnexpectedMessage {
        expected: fleet_core::MessageKind,
        got: fleet_core::MessageKind,
    },

    /// A roster line is not a socket address.
    #[error("invalid roster entry: {0:?}")]
    InvalidRosterEntry(String),

    /// Frame length exceeds the configured maximum.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// Underlying stream failure while reading or writing frames.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
