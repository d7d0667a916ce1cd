use fio_bco_import::actor::{ActorContext, LoggingTransport, MessageRouter};
use fio_bco_import::config::Config;
use fio_bco_import::gateway::{FioClient, LedgerClient, VaultClient};
use fio_bco_import::http::ResilientClient;
use fio_bco_import::metrics::Metrics;
use fio_bco_import::scheduler::ImportScheduler;
use fio_bco_import::sync::SynchronizationWorkflow;
use fio_bco_import::token::{FileTokenRepository, TokenRepository};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
	let config = Config::from_env();

	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| EnvFilter::new(config.log_level.to_lowercase())),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.init();

	info!("Starting fio import for tenant {:?}", config.tenant);

	let repository: Arc<dyn TokenRepository> = match FileTokenRepository::open(&config.storage).await {
		Ok(repository) => Arc::new(repository),
		Err(e) => {
			error!("Failed to open token storage {:?}: {}", config.storage, e);
			return;
		}
	};

	let http_client = match ResilientClient::with_timeouts(config.retry, config.timeouts) {
		Ok(client) => client,
		Err(e) => {
			error!("Failed to create HTTP client: {}", e);
			return;
		}
	};

	let metrics = Arc::new(Metrics::new());
	let workflow = SynchronizationWorkflow::new(
		config.tenant.clone(),
		FioClient::new(http_client.clone(), config.fio_gateway.clone()),
		VaultClient::new(http_client.clone(), config.vault_gateway.clone()),
		LedgerClient::new(http_client, config.ledger_gateway.clone()),
		Arc::clone(&repository),
		Arc::clone(&metrics),
		config.sync_deadline,
	);

	// replies leave through the broker at lake_hostname, which is attached externally
	info!("Serving region {} (broker {})", config.region(), config.lake_hostname);
	let router = Arc::new(MessageRouter::new(ActorContext {
		region: config.region(),
		repository: Arc::clone(&repository),
		synchronizer: Arc::new(workflow),
		transport: Arc::new(LoggingTransport),
		metrics: Arc::clone(&metrics),
	}));

	let shutdown = CancellationToken::new();
	let scheduler = ImportScheduler::new(repository, Arc::clone(&router), config.sync_rate);
	let scheduler_task = {
		let shutdown = shutdown.clone();
		tokio::spawn(async move { scheduler.run(shutdown).await })
	};

	if let Err(e) = tokio::signal::ctrl_c().await {
		error!("Unable to listen for shutdown signal: {}", e);
	}
	info!("Shutting down");

	shutdown.cancel();
	if let Err(e) = scheduler_task.await {
		error!("Scheduler ended abnormally: {}", e);
	}
	router.shutdown().await;

	match serde_json::to_string(&metrics.snapshot()) {
		Ok(snapshot) => info!("Final metrics {}", snapshot),
		Err(e) => error!("Unable to render metrics: {}", e),
	}
}
