//! Length-delimited framing for message bodies over a byte stream.
//!
//! Wire format: 4-byte big-endian length prefix + body.
//!
//! The decoder buffers partial reads until a whole frame is present, and
//! yields frames one at a time when a single read carries several. A
//! length prefix above the configured maximum is rejected outright. The
//! stream cannot be resynchronised after that, so callers drop the
//! connection.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use fleet_core::Message;
use tokio_util::codec::{Decoder, Encoder};

use crate::text_codec;
use crate::wire_types::{DEFAULT_MAX_FRAME_LEN, LENGTH_PREFIX_LEN};
use crate::ProtocolError;

/// Codec for framing message bodies over a byte stream.
///
/// Decodes raw bodies (`Bytes`) so the caller decides what to do with one
/// it does not understand; encodes either raw bodies or whole [`Message`]s.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_len: usize,
}

impl FrameCodec {
    /// Limits above what the 4-byte prefix can express are clamped to
    /// `u32::MAX`.
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            max_frame_len: max_frame_len.min(u32::MAX as usize),
        }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }

        let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;

        if length > self.max_frame_len {
            return Err(ProtocolError::FrameTooLarge {
                size: length,
                max: self.max_frame_len,
            });
        }

        let total = LENGTH_PREFIX_LEN + length;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_LEN);
        Ok(Some(src.split_to(length).freeze()))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, body: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if body.len() > self.max_frame_len {
            return Err(ProtocolError::FrameTooLarge {
                size: body.len(),
                max: self.max_frame_len,
            });
        }

        dst.reserve(LENGTH_PREFIX_LEN + body.len());
        dst.put_u32(body.len() as u32);
        dst.extend_from_slice(&body);
        Ok(())
    }
}

impl Encoder<Message> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = text_codec::encode_to_bytes(&msg);
        Encoder::<Bytes>::encode(self, body, dst)
    }
}
