//! IRC server core: line framing, message grammar, channel state, dispatch.

pub mod codec;
pub mod message;
pub mod modes;
pub mod replies;
pub mod server;
pub mod state;

/// Fixed server identity, used as the prefix of every server-originated line.
pub const SERVER_NAME: &str = "42.IRC";

/// Version string advertised in the welcome burst.
pub const SERVER_VERSION: &str = "0.1";
