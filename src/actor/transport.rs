use tokio::sync::mpsc;
use tracing::info;

/// Address of an actor: its name within a region.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinates {
	pub name: String,
	pub region: String,
}

impl Coordinates {
	pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			region: region.into(),
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
	#[error("Transport closed: {0}")]
	Closed(String),
}

/// Outbound leg towards other regions.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
	/// Delivers an already framed message to `region`.
	async fn send(&self, region: &str, frame: String) -> Result<(), TransportError>;
}

/// Transport that only logs outgoing frames.
///
/// Used when no broker is attached to the process.
#[derive(Debug, Default)]
pub struct LoggingTransport;

#[async_trait::async_trait]
impl Transport for LoggingTransport {
	async fn send(&self, region: &str, frame: String) -> Result<(), TransportError> {
		info!("-> {} {}", region, frame);
		Ok(())
	}
}

/// Transport that hands frames to an in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
	outbox: mpsc::UnboundedSender<(String, String)>,
}

impl ChannelTransport {
	/// Create the transport and the receiving end of its channel.
	pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, String)>) {
		let (outbox, receiver) = mpsc::unbounded_channel();
		(Self { outbox }, receiver)
	}
}

#[async_trait::async_trait]
impl Transport for ChannelTransport {
	async fn send(&self, region: &str, frame: String) -> Result<(), TransportError> {
		self.outbox
			.send((region.to_string(), frame))
			.map_err(|_| TransportError::Closed(region.to_string()))
	}
}
