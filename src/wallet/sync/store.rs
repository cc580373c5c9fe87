use super::repositories::WalletRepository;
use crate::wallet::{Wallet, WalletSyncError, validate_address};

use std::collections::BTreeMap;
use tracing::{debug, info};

/// All known wallets, keyed by address, mirrored to a [`WalletRepository`].
///
/// Placeholders created by [`WalletStore::ensure`] live only in memory until their first
/// successful refresh is committed.
pub struct WalletStore {
    wallets: BTreeMap<String, Wallet>,
    repository: Box<dyn WalletRepository>,
}

impl WalletStore {
    /// Rehydrate the store from every persisted snapshot.
    pub async fn open(repository: Box<dyn WalletRepository>) -> Result<Self, WalletSyncError> {
        let wallets: BTreeMap<String, Wallet> = repository
            .load_all()
            .await?
            .into_iter()
            .map(|wallet| (wallet.address.clone(), wallet))
            .collect();

        info!("Wallet store opened with {} wallets", wallets.len());
        Ok(Self {
            wallets,
            repository,
        })
    }

    /// Get the wallet for `address`, creating an empty placeholder if it is new.
    pub fn ensure(&mut self, address: &str) -> Result<&mut Wallet, WalletSyncError> {
        if !self.wallets.contains_key(address) {
            validate_address(address)?;
            debug!(address, "New wallet observed");
        }

        Ok(self
            .wallets
            .entry(address.to_string())
            .or_insert_with(|| Wallet::placeholder(address)))
    }

    pub fn get(&self, address: &str) -> Option<&Wallet> {
        self.wallets.get(address)
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    /// Wallets in address order.
    pub fn wallets(&self) -> impl Iterator<Item = &Wallet> {
        self.wallets.values()
    }

    /// Persist `wallet` and then replace the in-memory record.
    ///
    /// If persisting fails the in-memory record is left untouched.
    pub async fn commit(&mut self, wallet: Wallet) -> Result<(), WalletSyncError> {
        self.repository.save(&wallet).await?;
        self.wallets.insert(wallet.address.clone(), wallet);
        Ok(())
    }

    /// Lowest `last_checked_height` of any wallet, 0 for an empty store.
    pub fn lowest_checked_height(&self) -> u64 {
        self.wallets
            .values()
            .map(|wallet| wallet.last_checked_height)
            .min()
            .unwrap_or(0)
    }

    /// Addresses whose last refresh lies more than `max_drift` blocks behind `current_height`.
    pub fn stale_addresses(&self, current_height: u64, max_drift: u64) -> Vec<String> {
        self.wallets
            .values()
            .filter(|wallet| wallet.drift(current_height) > max_drift)
            .map(|wallet| wallet.address.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::address;
    use crate::wallet::sync::repositories::MemoryWalletRepository;

    fn checked_at(seed: u8, height: u64) -> Wallet {
        let mut wallet = Wallet::placeholder(address(seed));
        wallet.last_checked_height = height;
        wallet
    }

    #[tokio::test]
    async fn test_open_rehydrates_snapshots() {
        let repository =
            MemoryWalletRepository::with_wallets(vec![checked_at(1, 100), checked_at(2, 40)]);
        let store = WalletStore::open(Box::new(repository)).await.unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.lowest_checked_height(), 40);
        assert_eq!(store.get(&address(1)).unwrap().last_checked_height, 100);
    }

    #[tokio::test]
    async fn test_ensure_creates_placeholder_once() {
        let repository = MemoryWalletRepository::default();
        let mut store = WalletStore::open(Box::new(repository.clone())).await.unwrap();

        store.ensure(&address(3)).unwrap().username = Some("pool".to_string());
        let again = store.ensure(&address(3)).unwrap();

        assert_eq!(again.username.as_deref(), Some("pool"));
        assert_eq!(store.len(), 1);
        // Placeholders are not persisted.
        assert_eq!(repository.save_count(), 0);
    }

    #[tokio::test]
    async fn test_ensure_rejects_invalid_address() {
        let mut store = WalletStore::open(Box::new(MemoryWalletRepository::default()))
            .await
            .unwrap();
        assert!(matches!(
            store.ensure("not an address"),
            Err(WalletSyncError::InvalidAddress { .. })
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_stale_selection_is_strictly_greater_than_drift() {
        let repository = MemoryWalletRepository::with_wallets(vec![
            checked_at(1, 8_000),
            checked_at(2, 7_999),
            checked_at(3, 0),
        ]);
        let store = WalletStore::open(Box::new(repository)).await.unwrap();

        let stale = store.stale_addresses(10_000, 2_000);
        assert!(!stale.contains(&address(1)));
        assert!(stale.contains(&address(2)));
        assert!(stale.contains(&address(3)));
        assert_eq!(store.stale_addresses(100, 2_000), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_commit_persists_full_record() {
        let repository = MemoryWalletRepository::default();
        let mut store = WalletStore::open(Box::new(repository.clone())).await.unwrap();

        store.commit(checked_at(5, 900)).await.unwrap();

        assert_eq!(store.get(&address(5)).unwrap().last_checked_height, 900);
        assert_eq!(repository.latest(&address(5)), Some(checked_at(5, 900)));
    }

    #[test]
    fn test_empty_store_lowest_height_is_zero() {
        let store = WalletStore {
            wallets: BTreeMap::new(),
            repository: Box::new(MemoryWalletRepository::default()),
        };
        assert_eq!(store.lowest_checked_height(), 0);
    }
}
