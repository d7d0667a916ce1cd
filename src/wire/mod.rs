//! Wire protocol spoken between token actors and their peers.
//!
//! Messages are short ASCII strings: a two letter opcode optionally followed
//! by a single space separated payload. Cross-region traffic is additionally
//! wrapped in a `region sender receiver` frame.

mod frame;
mod message;

pub use frame::{RemoteFrame, encode_reply};
pub use message::{Command, Reply};

/// Errors produced while decoding wire messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
	#[error("Unknown opcode: {0}")]
	UnknownOpcode(String),

	#[error("Malformed message: {0}")]
	Malformed(String),
}
