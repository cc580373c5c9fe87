use crate::wallet::{Wallet, WalletSyncError};

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Repository for wallet snapshot persistence
#[async_trait::async_trait]
pub trait WalletRepository: Send + Sync {
	/// Persist the full wallet record, replacing any previous snapshot.
	async fn save(&self, wallet: &Wallet) -> Result<(), WalletSyncError>;
	/// Load every stored snapshot.
	async fn load_all(&self) -> Result<Vec<Wallet>, WalletSyncError>;
}

/// File-based implementation of WalletRepository
///
/// One pretty-printed JSON file per wallet, named `<address>.json`.
pub struct FileWalletRepository {
	data_dir: PathBuf,
}

impl FileWalletRepository {
	pub fn new(data_dir: PathBuf) -> Self {
		Self { data_dir }
	}

	/// Create the data directory if needed.
	pub async fn init(data_dir: PathBuf) -> Result<Self, WalletSyncError> {
		tokio::fs::create_dir_all(&data_dir).await.map_err(|e| {
			WalletSyncError::Persistence(format!(
				"Failed to create data directory {:?}: {}",
				data_dir, e
			))
		})?;
		Ok(Self::new(data_dir))
	}

	fn get_wallet_filename(&self, address: &str) -> PathBuf {
		self.data_dir.join(format!("{}.json", address))
	}

	async fn load_file(path: &Path) -> Result<Wallet, WalletSyncError> {
		let content = tokio::fs::read_to_string(path).await.map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to read wallet snapshot: {}", e))
		})?;

		serde_json::from_str(&content).map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to parse wallet snapshot: {}", e))
		})
	}
}

#[async_trait::async_trait]
impl WalletRepository for FileWalletRepository {
	async fn save(&self, wallet: &Wallet) -> Result<(), WalletSyncError> {
		let content = serde_json::to_string_pretty(wallet).map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to serialize wallet: {}", e))
		})?;

		// Write next to the target and rename, so a crash never leaves a torn snapshot.
		let filename = self.get_wallet_filename(&wallet.address);
		let staging = filename.with_extension("json.tmp");
		tokio::fs::write(&staging, content).await.map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to write wallet snapshot: {}", e))
		})?;
		tokio::fs::rename(&staging, &filename).await.map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to replace wallet snapshot: {}", e))
		})?;

		debug!("Saved wallet snapshot to {:?}", filename);
		Ok(())
	}

	async fn load_all(&self) -> Result<Vec<Wallet>, WalletSyncError> {
		let mut entries = tokio::fs::read_dir(&self.data_dir).await.map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to read directory: {}", e))
		})?;

		let mut wallets = Vec::new();

		while let Some(entry) = entries.next_entry().await.map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to read directory entry: {}", e))
		})? {
			let path = entry.path();
			if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
				continue;
			}

			match Self::load_file(&path).await {
				Ok(wallet) => wallets.push(wallet),
				Err(e) => warn!("Skipping wallet snapshot {:?}: {}", path, e),
			}
		}

		info!(
			"Loaded {} wallet snapshots from {:?}",
			wallets.len(),
			self.data_dir
		);
		Ok(wallets)
	}
}

/// In-memory repository for tests; keeps every saved snapshot.
#[cfg(test)]
#[derive(Default, Clone)]
pub struct MemoryWalletRepository {
	pub saved: std::sync::Arc<std::sync::Mutex<Vec<Wallet>>>,
}

#[cfg(test)]
impl MemoryWalletRepository {
	pub fn with_wallets(wallets: Vec<Wallet>) -> Self {
		Self {
			saved: std::sync::Arc::new(std::sync::Mutex::new(wallets)),
		}
	}

	/// Latest saved snapshot of `address`.
	pub fn latest(&self, address: &str) -> Option<Wallet> {
		self.saved
			.lock()
			.unwrap()
			.iter()
			.rev()
			.find(|wallet| wallet.address == address)
			.cloned()
	}

	pub fn save_count(&self) -> usize {
		self.saved.lock().unwrap().len()
	}
}

#[cfg(test)]
#[async_trait::async_trait]
impl WalletRepository for MemoryWalletRepository {
	async fn save(&self, wallet: &Wallet) -> Result<(), WalletSyncError> {
		self.saved.lock().unwrap().push(wallet.clone());
		Ok(())
	}

	async fn load_all(&self) -> Result<Vec<Wallet>, WalletSyncError> {
		Ok(self.saved.lock().unwrap().clone())
	}
}
