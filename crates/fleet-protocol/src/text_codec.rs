//! Prefix-tagged text bodies.
//!
//! Body format (one logical message per body):
//!
//! - Welcome:      `Welcome...` (server sends [`WELCOME_TEXT`])
//! - RosterUpdate: `Connected clients:\n` + one `ip:port\n` per peer
//! - PushPayload:  `SEND_DATA:` + payload
//! - PullRequest:  `REQUEST_DATA`
//! - PullResponse: `DATA:` + payload
//! - Ping:         `PING`
//!
//! Payloads are opaque bytes and are never validated here, not even as
//! UTF-8. Greetings and rosters must be UTF-8.
//!
//! [`WELCOME_TEXT`]: crate::wire_types::WELCOME_TEXT

use std::net::SocketAddr;

use bytes::{BufMut, Bytes, BytesMut};
use fleet_core::Message;

use crate::wire_types::{
    ERROR_PREVIEW_LEN, PING, PULL_REQUEST, PULL_RESPONSE_PREFIX, PUSH_PREFIX, ROSTER_HEADER,
    WELCOME_PREFIX,
};
use crate::ProtocolError;

/// Encode `msg` as a text body, appending to `dst`.
pub fn encode_message(msg: &Message, dst: &mut BytesMut) {
    match msg {
        Message::Welcome(text) => dst.put_slice(text.as_bytes()),
        Message::RosterUpdate(peers) => {
            dst.put_slice(ROSTER_HEADER.as_bytes());
            for peer in peers {
                dst.put_slice(peer.to_string().as_bytes());
                dst.put_u8(b'\n');
            }
        }
        Message::PushPayload(payload) => {
            dst.reserve(PUSH_PREFIX.len() + payload.len());
            dst.put_slice(PUSH_PREFIX.as_bytes());
            dst.put_slice(payload);
        }
        Message::PullRequest => dst.put_slice(PULL_REQUEST.as_bytes()),
        Message::PullResponse(payload) => {
            dst.reserve(PULL_RESPONSE_PREFIX.len() + payload.len());
            dst.put_slice(PULL_RESPONSE_PREFIX.as_bytes());
            dst.put_slice(payload);
        }
        Message::Ping => dst.put_slice(PING.as_bytes()),
    }
}

/// Encode `msg` into a fresh body buffer.
pub fn encode_to_bytes(msg: &Message) -> Bytes {
    let mut buf = BytesMut::with_capacity(64 + msg.payload_len().unwrap_or(0));
    encode_message(msg, &mut buf);
    buf.freeze()
}

/// Decode one complete body.
///
/// Takes `Bytes` so payloads can be sliced out without copying.
pub fn decode_message(body: Bytes) -> Result<Message, ProtocolError> {
    if body.as_ref() == PULL_REQUEST.as_bytes() {
        return Ok(Message::PullRequest);
    }
    if body.as_ref() == PING.as_bytes() {
        return Ok(Message::Ping);
    }
    if body.starts_with(PUSH_PREFIX.as_bytes()) {
        return Ok(Message::PushPayload(body.slice(PUSH_PREFIX.len()..)));
    }
    if body.starts_with(PULL_RESPONSE_PREFIX.as_bytes()) {
        return Ok(Message::PullResponse(body.slice(PULL_RESPONSE_PREFIX.len()..)));
    }
    if body.starts_with(ROSTER_HEADER.as_bytes()) {
        return decode_roster(&body[ROSTER_HEADER.len()..]);
    }
    if body.starts_with(WELCOME_PREFIX.as_bytes()) {
        let text = std::str::from_utf8(&body).map_err(|_| ProtocolError::InvalidUtf8)?;
        return Ok(Message::Welcome(text.to_string()));
    }

    Err(ProtocolError::UnknownMessage {
        preview: preview(&body),
    })
}

fn decode_roster(lines: &[u8]) -> Result<Message, ProtocolError> {
    let text = std::str::from_utf8(lines).map_err(|_| ProtocolError::InvalidUtf8)?;

    let peers = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.parse::<SocketAddr>()
                .map_err(|_| ProtocolError::InvalidRosterEntry(line.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Message::RosterUpdate(peers))
}

/// Whether `body` is tagged as a server notification (greeting or roster),
/// whether or not the rest of it decodes.
pub fn is_notification_body(body: &[u8]) -> bool {
    body.starts_with(WELCOME_PREFIX.as_bytes()) || body.starts_with(ROSTER_HEADER.as_bytes())
}

/// Render the start of a body for logs and error messages.
pub fn preview(body: &[u8]) -> String {
    let end = body.len().min(ERROR_PREVIEW_LEN);
    let mut s = String::from_utf8_lossy(&body[..end]).into_owned();
    if body.len() > end {
        s.push_str("...");
    }
    s
}
