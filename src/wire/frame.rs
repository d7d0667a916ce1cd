use super::{Reply, WireError};

/// A cross-region message as handed over by the transport.
///
/// Layout: `region sender receiver body`, where `body` is an opcode with an
/// optional payload and is decoded separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteFrame<'a> {
	pub region: &'a str,
	pub sender: &'a str,
	pub receiver: &'a str,
	pub body: &'a str,
}

impl<'a> RemoteFrame<'a> {
	pub fn parse(input: &'a str) -> Result<Self, WireError> {
		let mut parts = input.trim_matches(' ').splitn(4, ' ');
		let mut next = |field: &str| {
			parts
				.next()
				.filter(|part| !part.is_empty())
				.ok_or_else(|| WireError::Malformed(format!("frame is missing {}", field)))
		};

		let region = next("region")?;
		let sender = next("sender")?;
		let receiver = next("receiver")?;
		let body = next("body")?;

		Ok(Self {
			region,
			sender,
			receiver,
			body,
		})
	}
}

/// Encodes a reply travelling from `sender` in `region` back to `receiver`.
pub fn encode_reply(region: &str, sender: &str, receiver: &str, reply: Reply) -> String {
	format!("{} {} {} {}", region, sender, receiver, reply)
}
