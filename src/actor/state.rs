//! Token lifecycle state machine.
//!
//! [`transition`] is a pure function of the current state and the incoming
//! message. It names the side effect the actor has to carry out; when that
//! effect fails the actor falls back to [`Transition::failed`].

use crate::wire::{Command, Reply};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
	/// Freshly spawned, storage not consulted yet.
	Nil,
	NonExistent,
	Existing,
	/// A synchronization run is in flight.
	Synchronizing,
}

impl fmt::Display for TokenState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			TokenState::Nil => "Nil",
			TokenState::NonExistent => "NonExistent",
			TokenState::Existing => "Existing",
			TokenState::Synchronizing => "Synchronizing",
		};
		f.write_str(name)
	}
}

/// Messages a token actor understands.
#[derive(Clone, PartialEq, Eq)]
pub enum Message {
	CreateToken { value: String },
	DeleteToken,
	SynchronizeToken,
	/// Posted by the actor's own synchronization run when it ends.
	SynchronizationDone,
}

impl fmt::Debug for Message {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Message::CreateToken { .. } => f.write_str("CreateToken"),
			Message::DeleteToken => f.write_str("DeleteToken"),
			Message::SynchronizeToken => f.write_str("SynchronizeToken"),
			Message::SynchronizationDone => f.write_str("SynchronizationDone"),
		}
	}
}

impl From<Command<'_>> for Message {
	fn from(command: Command<'_>) -> Self {
		match command {
			Command::Synchronize => Message::SynchronizeToken,
			Command::Create { value } => Message::CreateToken {
				value: value.to_string(),
			},
			Command::Delete => Message::DeleteToken,
		}
	}
}

/// Side effect attached to a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
	None,
	/// Read storage to leave `Nil`, then process the same message again.
	Hydrate,
	/// Persist a brand-new token.
	Persist { value: String },
	/// Remove the stored token and stop any running synchronization.
	Remove,
	/// Start a background synchronization run.
	SpawnSync,
}

/// Outcome of one message, assuming its effect succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
	pub next: TokenState,
	pub reply: Option<Reply>,
	pub effect: Effect,
}

impl Transition {
	fn stay(state: TokenState, reply: Option<Reply>) -> Self {
		Self {
			next: state,
			reply,
			effect: Effect::None,
		}
	}

	fn to(next: TokenState, reply: Reply, effect: Effect) -> Self {
		Self {
			next,
			reply: Some(reply),
			effect,
		}
	}

	/// Outcome when the effect of a transition from `state` failed.
	pub fn failed(state: TokenState) -> Self {
		Self::stay(state, Some(Reply::FatalError))
	}
}

pub fn transition(state: TokenState, message: &Message) -> Transition {
	use TokenState::*;

	match (state, message) {
		(Nil, _) => Transition {
			next: Nil,
			reply: None,
			effect: Effect::Hydrate,
		},

		(NonExistent, Message::CreateToken { value }) => Transition::to(
			Existing,
			Reply::Created,
			Effect::Persist {
				value: value.clone(),
			},
		),
		(NonExistent, Message::DeleteToken | Message::SynchronizeToken) => {
			Transition::stay(NonExistent, Some(Reply::TokenMissing))
		}
		(NonExistent, Message::SynchronizationDone) => Transition::stay(NonExistent, None),

		(Existing, Message::CreateToken { .. }) => {
			Transition::stay(Existing, Some(Reply::FatalError))
		}
		(Existing, Message::DeleteToken) => {
			Transition::to(NonExistent, Reply::Deleted, Effect::Remove)
		}
		(Existing, Message::SynchronizeToken) => Transition::to(
			Synchronizing,
			Reply::SynchronizeAccepted,
			Effect::SpawnSync,
		),
		(Existing, Message::SynchronizationDone) => Transition::stay(Existing, None),

		(Synchronizing, Message::CreateToken { .. }) => {
			Transition::stay(Synchronizing, Some(Reply::FatalError))
		}
		(Synchronizing, Message::DeleteToken) => {
			Transition::to(NonExistent, Reply::Deleted, Effect::Remove)
		}
		(Synchronizing, Message::SynchronizeToken) => {
			Transition::stay(Synchronizing, Some(Reply::SynchronizeAccepted))
		}
		(Synchronizing, Message::SynchronizationDone) => Transition::stay(Existing, None),
	}
}
