use super::state::{Effect, Message, TokenState, Transition, transition};
use super::{ActorContext, Coordinates};
use crate::sync::WorkflowError;
use crate::token::Token;
use crate::wire::Reply;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A message together with its routing metadata.
#[derive(Debug)]
pub(crate) struct Mail {
	pub message: Message,
	pub sender: Coordinates,
	/// Generation of the run that posted a `SynchronizationDone`.
	pub run: Option<u64>,
}

impl Mail {
	pub fn new(message: Message, sender: Coordinates) -> Self {
		Self {
			message,
			sender,
			run: None,
		}
	}
}

/// Router side of a spawned token actor.
pub(crate) struct ActorHandle {
	pub mailbox: mpsc::UnboundedSender<Mail>,
	pub state: watch::Receiver<TokenState>,
	pub task: JoinHandle<()>,
}

/// Live actors by token id.
pub(crate) type Registry = Arc<Mutex<HashMap<String, ActorHandle>>>;

struct ActiveRun {
	generation: u64,
	cancel: CancellationToken,
}

/// Owner of one token's lifecycle.
///
/// Mail is processed strictly one at a time, so the state needs no locking.
/// Synchronization runs execute on their own task and report back with a
/// `SynchronizationDone` posted to this actor's mailbox. That completion is
/// ordered after everything already queued when the run was spawned and may
/// interleave with mail arriving while it runs.
///
/// An actor with no stored token and no run leaves the registry once its
/// mailbox is empty; the next message for the id spawns a fresh one.
pub(crate) struct TokenActor {
	id: String,
	state: TokenState,
	context: Arc<ActorContext>,
	registry: Registry,
	inbox: mpsc::UnboundedReceiver<Mail>,
	mailbox: mpsc::UnboundedSender<Mail>,
	state_tx: watch::Sender<TokenState>,
	shutdown: CancellationToken,
	run: Option<ActiveRun>,
	generation: u64,
}

impl TokenActor {
	/// Spawns the actor task for `id`.
	pub fn spawn(
		id: String,
		context: Arc<ActorContext>,
		registry: Registry,
		shutdown: CancellationToken,
	) -> ActorHandle {
		let (mailbox, inbox) = mpsc::unbounded_channel();
		let (state_tx, state) = watch::channel(TokenState::Nil);

		let actor = Self {
			id,
			state: TokenState::Nil,
			context,
			registry,
			inbox,
			mailbox: mailbox.clone(),
			state_tx,
			shutdown,
			run: None,
			generation: 0,
		};
		let task = tokio::spawn(actor.run_loop());

		ActorHandle {
			mailbox,
			state,
			task,
		}
	}

	async fn run_loop(mut self) {
		debug!("{} ~ Actor Spawned", self.id);
		loop {
			let mail = tokio::select! {
				biased;
				_ = self.shutdown.cancelled() => break,
				mail = self.inbox.recv() => match mail {
					Some(mail) => mail,
					None => break,
				},
			};
			self.process(mail).await;
			if self.settle().await {
				debug!("{} ~ Actor Retired", self.id);
				return;
			}
		}

		if let Some(run) = self.run.take() {
			run.cancel.cancel();
		}
		debug!("{} ~ Actor Stopped", self.id);
	}

	async fn process(&mut self, mail: Mail) {
		if mail.message == Message::SynchronizationDone && !self.is_current_run(mail.run) {
			debug!("{} ~ ignoring completion of superseded run", self.id);
			return;
		}

		let mut step = transition(self.state, &mail.message);
		if step.effect == Effect::Hydrate {
			step = match self.hydrate().await {
				Some(state) => {
					// published together with the outcome below
					self.state = state;
					transition(self.state, &mail.message)
				}
				None => Transition::failed(self.state),
			};
		}

		let from = self.state;
		let step = self.apply(step).await;
		if from != step.next {
			debug!("{} ~ {} -> {}", self.id, from, step.next);
		}
		if mail.message == Message::SynchronizationDone {
			self.run = None;
		}
		self.set_state(step.next);

		if let Some(reply) = step.reply {
			self.context.reply(&self.id, &mail.sender, reply).await;
		}
	}

	/// Processes queued mail while the actor is idle in `NonExistent` and
	/// retires it once nothing is left. Returns whether the actor retired.
	async fn settle(&mut self) -> bool {
		while self.state == TokenState::NonExistent && self.run.is_none() {
			// senders only deliver while holding the registry lock
			let mut actors = self.registry.lock().await;
			match self.inbox.try_recv() {
				Ok(mail) => {
					drop(actors);
					self.process(mail).await;
				}
				Err(_) => {
					let owned = actors
						.get(&self.id)
						.is_some_and(|handle| handle.mailbox.same_channel(&self.mailbox));
					if owned {
						actors.remove(&self.id);
					}
					return true;
				}
			}
		}
		false
	}

	fn is_current_run(&self, run: Option<u64>) -> bool {
		self.run.as_ref().map(|active| active.generation) == run
	}

	fn set_state(&mut self, state: TokenState) {
		self.state = state;
		self.state_tx.send_replace(state);
	}

	/// Reads storage to find out whether the token exists.
	async fn hydrate(&self) -> Option<TokenState> {
		match self.context.repository.load(&self.id).await {
			Ok(Some(_)) => Some(TokenState::Existing),
			Ok(None) => Some(TokenState::NonExistent),
			Err(e) => {
				warn!("{} ~ unable to load token: {}", self.id, e);
				None
			}
		}
	}

	/// Carries out the effect of `step`, returning what actually happened.
	async fn apply(&mut self, step: Transition) -> Transition {
		let current = self.state;
		let repository = &self.context.repository;

		match &step.effect {
			Effect::None | Effect::Hydrate => step,

			Effect::Persist { value } => match repository.create(&self.id, value).await {
				Ok(_) => {
					self.context.metrics.token_created();
					info!("{} ~ token created", self.id);
					step
				}
				Err(e) => {
					warn!("{} ~ unable to create token: {}", self.id, e);
					Transition::failed(current)
				}
			},

			Effect::Remove => match repository.delete(&self.id).await {
				Ok(()) => {
					if let Some(run) = self.run.take() {
						run.cancel.cancel();
					}
					self.context.metrics.token_deleted();
					info!("{} ~ token deleted", self.id);
					step
				}
				Err(e) => {
					warn!("{} ~ unable to delete token: {}", self.id, e);
					Transition::failed(current)
				}
			},

			Effect::SpawnSync => match repository.load(&self.id).await {
				Ok(Some(token)) => {
					self.spawn_run(token);
					step
				}
				Ok(None) => {
					warn!("{} ~ token vanished from storage", self.id);
					Transition {
						next: TokenState::NonExistent,
						reply: Some(Reply::TokenMissing),
						effect: Effect::None,
					}
				}
				Err(e) => {
					warn!("{} ~ unable to load token: {}", self.id, e);
					Transition::failed(current)
				}
			},
		}
	}

	fn spawn_run(&mut self, token: Token) {
		self.generation += 1;
		let generation = self.generation;
		let cancel = self.shutdown.child_token();
		self.run = Some(ActiveRun {
			generation,
			cancel: cancel.clone(),
		});

		let synchronizer = Arc::clone(&self.context.synchronizer);
		let mailbox = self.mailbox.clone();
		let me = Coordinates::new(self.id.clone(), self.context.region.clone());

		tokio::spawn(async move {
			match synchronizer.synchronize(token, cancel).await {
				Ok(stats) => debug!("{} ~ run {} finished: {}", me.name, generation, stats.summary()),
				Err(WorkflowError::Cancelled) => info!("{} ~ synchronization cancelled", me.name),
				Err(e) => warn!("{} ~ synchronization aborted: {}", me.name, e),
			}

			let done = Mail {
				message: Message::SynchronizationDone,
				sender: me,
				run: Some(generation),
			};
			// the actor is gone when the process shuts down
			let _ = mailbox.send(done);
		});
	}
}
