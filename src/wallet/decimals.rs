use crate::gateway::ChainGateway;
use crate::wallet::WalletSyncError;

use std::collections::HashMap;
use tracing::{debug, info};

/// Cache of decimal precision per asset.
///
/// Misses trigger one refetch of the whole token catalog; an asset still missing after
/// that is reported as [`WalletSyncError::DecimalsUnavailable`].
#[derive(Debug, Default)]
pub struct DecimalRegistry {
	decimals: HashMap<String, u32>,
}

impl DecimalRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Precision of `denom`, refetching the token catalog once on a cache miss.
	pub async fn decimals_of(
		&mut self,
		gateway: &dyn ChainGateway,
		denom: &str,
	) -> Result<u32, WalletSyncError> {
		if let Some(decimals) = self.decimals.get(denom) {
			return Ok(*decimals);
		}

		debug!(denom, "Unknown denom, refetching token list");
		self.refresh(gateway).await?;

		self.decimals
			.get(denom)
			.copied()
			.ok_or_else(|| WalletSyncError::DecimalsUnavailable {
				denom: denom.to_string(),
			})
	}

	/// Replace the cache with the current token catalog.
	pub async fn refresh(&mut self, gateway: &dyn ChainGateway) -> Result<(), WalletSyncError> {
		self.decimals = gateway
			.tokens()
			.await?
			.into_iter()
			.map(|token| (token.denom, token.decimals))
			.collect();
		info!("Loaded decimals of {} tokens", self.len());
		Ok(())
	}

	pub fn len(&self) -> usize {
		self.decimals.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::gateway::mock::{MockChain, MockGateway, token};

	#[tokio::test]
	async fn test_serves_from_cache_after_first_fetch() {
		let gateway = MockGateway::new(MockChain {
			tokens: vec![token("swth", 8), token("eth", 18)],
			..MockChain::default()
		});
		let mut registry = DecimalRegistry::new();

		assert_eq!(registry.decimals_of(&gateway, "swth").await.unwrap(), 8);
		assert_eq!(registry.decimals_of(&gateway, "eth").await.unwrap(), 18);
		assert_eq!(gateway.calls("tokens"), 1);
		assert_eq!(registry.len(), 2);
	}

	#[tokio::test]
	async fn test_refetches_once_for_new_denom() {
		let gateway = MockGateway::new(MockChain {
			tokens: vec![token("swth", 8)],
			..MockChain::default()
		});
		let mut registry = DecimalRegistry::new();
		registry.decimals_of(&gateway, "swth").await.unwrap();

		gateway.update(|chain| chain.tokens.push(token("usdc1", 6)));
		assert_eq!(registry.decimals_of(&gateway, "usdc1").await.unwrap(), 6);
		assert_eq!(gateway.calls("tokens"), 2);
	}

	#[tokio::test]
	async fn test_unknown_denom_fails_after_single_refetch() {
		let gateway = MockGateway::new(MockChain {
			tokens: vec![token("swth", 8)],
			..MockChain::default()
		});
		let mut registry = DecimalRegistry::new();

		let result = registry.decimals_of(&gateway, "moon").await;
		assert!(matches!(
			result,
			Err(WalletSyncError::DecimalsUnavailable { ref denom }) if denom == "moon"
		));
		assert_eq!(gateway.calls("tokens"), 1);
	}
}
