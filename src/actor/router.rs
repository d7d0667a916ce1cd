use super::state::{Message, TokenState};
use super::token::{ActorHandle, Mail, Registry, TokenActor};
use super::{ActorContext, Coordinates};
use crate::wire::{Command, RemoteFrame, Reply};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Routes messages to per-token actors, spawning them on first contact.
pub struct MessageRouter {
	context: Arc<ActorContext>,
	actors: Registry,
	shutdown: CancellationToken,
}

impl MessageRouter {
	pub fn new(context: ActorContext) -> Self {
		Self {
			context: Arc::new(context),
			actors: Arc::new(Mutex::new(HashMap::new())),
			shutdown: CancellationToken::new(),
		}
	}

	/// Region served by this router.
	pub fn region(&self) -> &str {
		&self.context.region
	}

	/// Delivers `message` to the actor named `receiver`.
	pub async fn tell(&self, receiver: &str, message: Message, sender: Coordinates) {
		if self.shutdown.is_cancelled() {
			debug!("{} ~ router stopped, dropping {:?}", receiver, message);
			return;
		}

		let mut actors = self.actors.lock().await;
		let mut mail = Mail::new(message, sender);
		for _ in 0..2 {
			let handle = actors.entry(receiver.to_string()).or_insert_with(|| {
				TokenActor::spawn(
					receiver.to_string(),
					Arc::clone(&self.context),
					Arc::clone(&self.actors),
					self.shutdown.child_token(),
				)
			});
			match handle.mailbox.send(mail) {
				Ok(()) => return,
				Err(returned) => {
					// actor task ended on its own, replace it
					mail = returned.0;
					actors.remove(receiver);
				}
			}
		}
		warn!("{} ~ unable to deliver {:?}", receiver, mail.message);
	}

	/// Handles a message originating in this process.
	///
	/// Undecodable bodies are dropped without a reply.
	pub async fn process_local(&self, receiver: &str, sender: Coordinates, body: &str) {
		match Command::decode(body) {
			Ok(command) => self.tell(receiver, command.into(), sender).await,
			Err(e) => debug!("{} ~ dropping local message from {}: {}", receiver, sender.name, e),
		}
	}

	/// Handles a framed message coming in from another region.
	///
	/// # Arguments
	///
	/// * `input` - Frame in the form `region sender receiver body`
	pub async fn process_remote(&self, input: &str) {
		let frame = match RemoteFrame::parse(input) {
			Ok(frame) => frame,
			Err(e) => {
				warn!("Dropping unparsable frame: {}", e);
				return;
			}
		};
		let sender = Coordinates::new(frame.sender, frame.region);

		match Command::decode(frame.body) {
			Ok(command) => self.tell(frame.receiver, command.into(), sender).await,
			Err(e) => {
				warn!(
					"{} ~ undecodable message from {}/{}: {}",
					frame.receiver, sender.region, sender.name, e
				);
				self.context
					.reply(frame.receiver, &sender, Reply::FatalError)
					.await;
			}
		}
	}

	/// Number of actors currently alive.
	pub async fn active_actors(&self) -> usize {
		self.actors.lock().await.len()
	}

	/// Current state of the actor for `id`, if one is alive.
	///
	/// Actors for ids without a stored token retire when idle, so `None`
	/// also stands for a token that does not exist.
	pub async fn state(&self, id: &str) -> Option<TokenState> {
		self.actors
			.lock()
			.await
			.get(id)
			.map(|handle| *handle.state.borrow())
	}

	/// Subscribes to state changes of the actor for `id`.
	pub async fn watch(&self, id: &str) -> Option<watch::Receiver<TokenState>> {
		self.actors
			.lock()
			.await
			.get(id)
			.map(|handle| handle.state.clone())
	}

	/// Stops every actor and waits for them to finish.
	///
	/// Running synchronizations are cancelled; their watermark stays at the
	/// last persisted value.
	pub async fn shutdown(&self) {
		self.shutdown.cancel();
		let handles: Vec<ActorHandle> = self
			.actors
			.lock()
			.await
			.drain()
			.map(|(_, handle)| handle)
			.collect();

		info!("Stopping {} token actors", handles.len());
		for result in futures::future::join_all(handles.into_iter().map(|handle| handle.task)).await {
			if let Err(e) = result {
				warn!("Token actor ended abnormally: {}", e);
			}
		}
	}
}
