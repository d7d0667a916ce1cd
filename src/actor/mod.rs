//! Per-token actors and the router that owns them.
//!
//! Every token id gets its own actor the first time a message names it. The
//! actor serialises all commands for that token and drives at most one
//! synchronization run at a time.

mod router;
mod state;
mod token;
mod transport;

pub use router::MessageRouter;
pub use state::{Effect, Message, TokenState, Transition, transition};
pub use transport::{ChannelTransport, Coordinates, LoggingTransport, Transport, TransportError};

use crate::metrics::Metrics;
use crate::sync::Synchronizer;
use crate::token::TokenRepository;
use crate::wire::{Reply, encode_reply};
use std::sync::Arc;
use tracing::{debug, warn};

/// Dependencies shared by every actor of the process.
pub struct ActorContext {
	/// Region this process serves, e.g. `FioImport/acme`.
	pub region: String,
	pub repository: Arc<dyn TokenRepository>,
	pub synchronizer: Arc<dyn Synchronizer>,
	pub transport: Arc<dyn Transport>,
	pub metrics: Arc<Metrics>,
}

impl ActorContext {
	/// Sends `reply` from actor `from` back to `to`.
	///
	/// Local senders are not answered; only remote regions receive replies.
	pub(crate) async fn reply(&self, from: &str, to: &Coordinates, reply: Reply) {
		if to.region == self.region {
			debug!("{} ~ local reply {} to {} dropped", from, reply, to.name);
			return;
		}

		let frame = encode_reply(&self.region, from, &to.name, reply);
		if let Err(e) = self.transport.send(&to.region, frame).await {
			warn!("{} ~ unable to reply {} to {}: {}", from, reply, to.region, e);
		}
	}
}
