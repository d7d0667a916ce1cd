use super::WireError;
use std::fmt;

/// Inbound commands addressed to a token actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
	/// `ST`
	Synchronize,
	/// `NT <value>`
	Create { value: &'a str },
	/// `DT`
	Delete,
}

/// Replies a token actor sends back to the original sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
	/// `TS`
	SynchronizeAccepted,
	/// `TN`
	Created,
	/// `TD`
	Deleted,
	/// `EM`
	TokenMissing,
	/// `EE`
	FatalError,
}

const REQ_SYNCHRONIZE: &str = "ST";
const REQ_CREATE: &str = "NT";
const REQ_DELETE: &str = "DT";

const RESP_SYNCHRONIZE_ACCEPTED: &str = "TS";
const RESP_CREATED: &str = "TN";
const RESP_DELETED: &str = "TD";
const RESP_TOKEN_MISSING: &str = "EM";
const RESP_FATAL_ERROR: &str = "EE";

/// Splits `input` into an opcode and at most one payload field.
///
/// Fields are separated by runs of spaces. A third field is rejected.
fn split_fields(input: &str) -> Result<(&str, Option<&str>), WireError> {
	let input = input.trim_matches(' ');
	if input.is_empty() {
		return Err(WireError::Malformed("empty message".to_string()));
	}

	let Some((opcode, rest)) = input.split_once(' ') else {
		return Ok((input, None));
	};

	let payload = rest.trim_start_matches(' ');
	if payload.contains(' ') {
		return Err(WireError::Malformed(format!(
			"unexpected trailing field after {}",
			opcode
		)));
	}
	Ok((opcode, Some(payload)))
}

impl<'a> Command<'a> {
	/// Decodes one command. The returned value borrows its payload from `input`.
	pub fn decode(input: &'a str) -> Result<Self, WireError> {
		let (opcode, payload) = split_fields(input)?;
		match (opcode, payload) {
			(REQ_SYNCHRONIZE, None) => Ok(Command::Synchronize),
			(REQ_DELETE, None) => Ok(Command::Delete),
			(REQ_CREATE, Some(value)) if value.chars().all(|c| c.is_ascii_graphic()) => {
				Ok(Command::Create { value })
			}
			(REQ_CREATE, Some(_)) => Err(WireError::Malformed(format!(
				"{} value holds non printable characters",
				REQ_CREATE
			))),
			(REQ_CREATE, None) => Err(WireError::Malformed(format!(
				"{} requires a token value",
				REQ_CREATE
			))),
			(REQ_SYNCHRONIZE | REQ_DELETE, Some(_)) => Err(WireError::Malformed(format!(
				"{} takes no payload",
				opcode
			))),
			(other, _) => Err(WireError::UnknownOpcode(other.to_string())),
		}
	}
}

impl fmt::Display for Command<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Command::Synchronize => f.write_str(REQ_SYNCHRONIZE),
			Command::Create { value } => write!(f, "{} {}", REQ_CREATE, value),
			Command::Delete => f.write_str(REQ_DELETE),
		}
	}
}

impl Reply {
	pub fn opcode(&self) -> &'static str {
		match self {
			Reply::SynchronizeAccepted => RESP_SYNCHRONIZE_ACCEPTED,
			Reply::Created => RESP_CREATED,
			Reply::Deleted => RESP_DELETED,
			Reply::TokenMissing => RESP_TOKEN_MISSING,
			Reply::FatalError => RESP_FATAL_ERROR,
		}
	}

	pub fn decode(input: &str) -> Result<Self, WireError> {
		let (opcode, payload) = split_fields(input)?;
		if payload.is_some() {
			return Err(WireError::Malformed(format!("{} takes no payload", opcode)));
		}
		match opcode {
			RESP_SYNCHRONIZE_ACCEPTED => Ok(Reply::SynchronizeAccepted),
			RESP_CREATED => Ok(Reply::Created),
			RESP_DELETED => Ok(Reply::Deleted),
			RESP_TOKEN_MISSING => Ok(Reply::TokenMissing),
			RESP_FATAL_ERROR => Ok(Reply::FatalError),
			other => Err(WireError::UnknownOpcode(other.to_string())),
		}
	}
}

impl fmt::Display for Reply {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.opcode())
	}
}
