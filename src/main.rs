mod config;
mod gateway;
mod richlist;
mod utils;
mod wallet;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::{Config, ConfigError};
use crate::gateway::{ChainGateway, ChainGatewayClient, GatewayError, HeightPoller};
use crate::richlist::{QueryError, RichlistAggregator, RichlistReader};
use crate::utils::Shutdown;
use crate::wallet::WalletSyncError;
use crate::wallet::sync::{FileWalletRepository, SyncScheduler, WalletRepository, WalletStore};

/// Keeps per-asset richlists of chain wallets in sync.
#[derive(Parser)]
#[command(name = "richlist-sync", version)]
struct Cli {
	/// Path to the TOML configuration file. Missing files fall back to defaults.
	#[arg(long, global = true, default_value = "richlist.toml")]
	config: PathBuf,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Run the height poller and the sync scheduler until Ctrl-C.
	Run,
	/// List the assets that have a richlist in the stored snapshots.
	Denoms,
	/// Print one page of an asset's richlist from the stored snapshots.
	Top {
		denom: String,
		/// Wallets per page, 1 to 100.
		#[arg(long)]
		limit: Option<u32>,
		/// Wallets to skip.
		#[arg(long)]
		offset: Option<usize>,
	},
}

#[derive(Debug, thiserror::Error)]
enum AppError {
	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error(transparent)]
	Gateway(#[from] GatewayError),

	#[error(transparent)]
	Sync(#[from] WalletSyncError),

	#[error(transparent)]
	Query(#[from] QueryError),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
	dotenvy::dotenv().ok();
	let cli = Cli::parse();

	let config = match Config::load(&cli.config) {
		Ok(config) => config,
		Err(e) => {
			eprintln!("Invalid configuration {:?}: {}", cli.config, e);
			std::process::exit(2);
		}
	};
	config.logging.init();

	let result = match cli.command {
		Command::Run => run(config).await,
		Command::Denoms => denoms(&config).await,
		Command::Top {
			denom,
			limit,
			offset,
		} => top(&config, &denom, limit, offset).await,
	};

	if let Err(e) = result {
		error!("{}", e);
		std::process::exit(1);
	}
}

async fn run(config: Config) -> Result<(), AppError> {
	info!("Starting richlist sync");

	let gateway: Arc<dyn ChainGateway> = Arc::new(ChainGatewayClient::new(&config.gateway)?);
	info!(
		"Created gateway client for {} and {}",
		config.gateway.rest_url, config.gateway.cosmos_url
	);

	let repository = FileWalletRepository::init(config.sync.data_dir.clone()).await?;
	let store = WalletStore::open(Box::new(repository)).await?;

	let (trigger, shutdown) = Shutdown::channel();
	let (aggregator, reader) = RichlistAggregator::new();
	let (poller, heads) = HeightPoller::new(
		gateway.clone(),
		config.sync.poll_interval(),
		config.retry.poller_policy(),
	);
	let scheduler = SyncScheduler::new(
		gateway,
		store,
		aggregator,
		heads,
		config.sync.scheduler_settings(),
		config.retry.policy(),
		shutdown.clone(),
	);

	let poller_task = tokio::spawn(poller.run(shutdown.clone()));
	let scheduler_task = tokio::spawn(scheduler.run());

	tokio::signal::ctrl_c().await?;
	info!("Shutdown requested, waiting for running work to stop");
	trigger.send_replace(true);

	let (poller_result, scheduler_result) = tokio::join!(poller_task, scheduler_task);
	for (name, result) in [("poller", poller_result), ("scheduler", scheduler_result)] {
		if let Err(e) = result {
			error!("The {} task ended abnormally: {}", name, e);
		}
	}

	info!("Stopped with richlists for {} denoms", reader.denoms().len());
	Ok(())
}

/// Rank the persisted snapshots without contacting the chain.
async fn load_richlist(config: &Config) -> Result<RichlistReader, AppError> {
	let repository = FileWalletRepository::new(config.sync.data_dir.clone());
	let wallets = repository.load_all().await?;
	let (aggregator, reader) = RichlistAggregator::new();
	aggregator.rebuild(&wallets);
	Ok(reader)
}

async fn denoms(config: &Config) -> Result<(), AppError> {
	let reader = load_richlist(config).await?;
	let output = serde_json::json!({ "denoms": reader.denoms() });
	println!("{}", serde_json::to_string_pretty(&output)?);
	Ok(())
}

async fn top(
	config: &Config,
	denom: &str,
	limit: Option<u32>,
	offset: Option<usize>,
) -> Result<(), AppError> {
	let reader = load_richlist(config).await?;
	let page = reader.top(denom, limit, offset)?;
	println!("{}", serde_json::to_string_pretty(&page)?);
	Ok(())
}
