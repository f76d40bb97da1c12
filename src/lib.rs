//! cove, a small IRC server.
//!
//! The library exposes the server core so the binary and the integration
//! tests can drive the same code path.

pub mod irc;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Result<T> = std::result::Result<T, Error>;
