//! Low-level wire constants.
//!
//! Message bodies are UTF-8 text identified by a leading prefix; each body
//! travels inside one length-prefixed frame (see `frame_codec`).
//!
//! ```text
//! Server → client
//!   Welcome to the server!\n
//!   Connected clients:\n<addr>\n<addr>\n...
//!   DATA:<payload>
//!
//! Client → server
//!   SEND_DATA:<payload>
//!   REQUEST_DATA
//!   PING
//! ```

/// Greeting the server sends once per session.
pub const WELCOME_TEXT: &str = "Welcome to the server!\n";

/// Any body starting with this is a greeting.
pub const WELCOME_PREFIX: &str = "Welcome";

/// Header line of a roster broadcast; one address per following line.
pub const ROSTER_HEADER: &str = "Connected clients:\n";

/// Push of an opaque collection payload.
pub const PUSH_PREFIX: &str = "SEND_DATA:";

/// Pull request. Exact match, no payload.
pub const PULL_REQUEST: &str = "REQUEST_DATA";

/// Pull response carrying the stored snapshot.
pub const PULL_RESPONSE_PREFIX: &str = "DATA:";

/// Keep-alive. Exact match, never answered.
pub const PING: &str = "PING";

/// Payload served when nothing has been pushed yet.
pub const EMPTY_COLLECTION: &[u8] = b"[]";

/// Size of the big-endian length prefix in front of every frame.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Default upper bound on a single frame body: 16 MiB.
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// How many bytes of an unrecognised body are echoed into error messages.
pub const ERROR_PREVIEW_LEN: usize = 32;
