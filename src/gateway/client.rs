//!
//! HTTP client for the chain-data gateway.
//!
//! The gateway is split across two services: the exchange REST API (blocks, validators,
//! balances, profiles, pools, tokens) and the Cosmos LCD (staking and distribution).
//! Connection failures are retried with an exponential backoff before they surface as
//! `GatewayError::RequestTimedOut`; error bodies reported by the node are classified into
//! the typed variants the sync engine reacts to.

use super::types::*;
use crate::config::GatewayConfig;

use async_trait::async_trait;
use backoff::{ExponentialBackoffBuilder, future::retry};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Read access to chain data needed to discover wallets and refresh their balances.
#[async_trait]
pub trait ChainGateway: Send + Sync {
	/// Latest block height and time.
	async fn latest_block(&self) -> Result<ChainHead, GatewayError>;

	/// All validators, bonded or not.
	async fn validators(&self) -> Result<Vec<Validator>, GatewayError>;

	/// Addresses delegating to the given validator operator.
	async fn validator_delegators(&self, operator: &str) -> Result<Vec<String>, GatewayError>;

	/// All liquidity pools.
	async fn liquidity_pools(&self) -> Result<Vec<LiquidityPool>, GatewayError>;

	/// The token catalog.
	async fn tokens(&self) -> Result<Vec<TokenInfo>, GatewayError>;

	/// Spendable, in-order and in-position balances per asset.
	async fn balances(&self, address: &str) -> Result<Vec<LiveBalance>, GatewayError>;

	/// Username and last activity.
	async fn profile(&self, address: &str) -> Result<Profile, GatewayError>;

	/// Active delegations, one coin per delegation entry.
	async fn delegations(&self, address: &str) -> Result<Vec<Coin>, GatewayError>;

	/// Unbonding queues of a delegator.
	async fn unbonding_delegations(
		&self,
		address: &str,
	) -> Result<Vec<UnbondingDelegation>, GatewayError>;

	/// Outstanding self-bond rewards and commission of a validator.
	async fn validator_distribution(
		&self,
		operator: &str,
	) -> Result<ValidatorDistribution, GatewayError>;

	/// Outstanding rewards of a delegator, summed over all validators.
	async fn delegator_rewards(&self, address: &str) -> Result<Vec<Coin>, GatewayError>;
}

/// Chain-data gateway client
#[derive(Clone)]
pub struct ChainGatewayClient {
	/// The underlying HTTP client.
	http_client: Client,
	/// Base URL of the exchange REST API.
	rest_url: String,
	/// Base URL of the Cosmos LCD.
	cosmos_url: String,
	/// How long connection failures are retried before giving up.
	retry_window: Duration,
}

impl ChainGatewayClient {
	/// Create a new gateway client.
	///
	/// # Arguments
	/// * `config` - URLs and timeouts of the upstream services.
	///
	/// # Errors
	/// Returns `GatewayError::HttpError` if the HTTP client cannot be built.
	pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
		let http_client = Client::builder()
			.connect_timeout(Duration::from_secs(config.connect_timeout_secs))
			.timeout(Duration::from_secs(
				config.connect_timeout_secs + config.read_timeout_secs,
			))
			.build()?;

		Ok(Self {
			http_client,
			rest_url: config.rest_url.trim_end_matches('/').to_string(),
			cosmos_url: config.cosmos_url.trim_end_matches('/').to_string(),
			retry_window: Duration::from_secs(config.request_retry_secs),
		})
	}

	async fn rest<T: DeserializeOwned>(
		&self,
		path: &str,
		query: &[(&str, &str)],
	) -> Result<T, GatewayError> {
		self.get_json(&format!("{}{}", self.rest_url, path), query)
			.await
	}

	async fn cosmos<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
		let envelope: CosmosEnvelope<T> = self
			.get_json(&format!("{}{}", self.cosmos_url, path), &[])
			.await?;
		Ok(envelope.result)
	}

	/// Execute a GET request and decode the JSON body.
	///
	/// Timeouts and connection failures are retried until the retry window is used up.
	/// Non-success responses are classified with [`classify_failure`].
	async fn get_json<T: DeserializeOwned>(
		&self,
		url: &str,
		query: &[(&str, &str)],
	) -> Result<T, GatewayError> {
		let client = &self.http_client;
		let policy = ExponentialBackoffBuilder::new()
			.with_initial_interval(Duration::from_millis(250))
			.with_max_elapsed_time(Some(self.retry_window))
			.build();

		let (status, body) = retry(policy, || async move {
			let response = client
				.get(url)
				.query(query)
				.send()
				.await
				.map_err(|e| {
					if e.is_timeout() || e.is_connect() {
						debug!("Request {} {:?} failed, retrying: {}", url, query, e);
						backoff::Error::transient(e)
					} else {
						backoff::Error::permanent(e)
					}
				})?;

			let status = response.status();
			let body = response.text().await.map_err(|e| {
				if e.is_timeout() {
					backoff::Error::transient(e)
				} else {
					backoff::Error::permanent(e)
				}
			})?;

			Ok::<_, backoff::Error<reqwest::Error>>((status, body))
		})
		.await
		.map_err(|e| {
			if e.is_timeout() || e.is_connect() {
				GatewayError::RequestTimedOut {
					url: url.to_string(),
				}
			} else {
				GatewayError::HttpError(e)
			}
		})?;

		debug!("Request {} done, {} bytes", url, body.len());

		if !status.is_success() {
			let error = classify_failure(status.as_u16(), &body);
			if matches!(error, GatewayError::UnexpectedStatus { .. }) {
				warn!("Request {} {:?} failed: {}", url, query, error);
			}
			return Err(error);
		}

		Ok(serde_json::from_str(&body)?)
	}
}

/// Map an error response of the node to a typed error.
///
/// The node reports sync state and missing staking records as HTTP 500 with a
/// recognizable body prefix; anything else is passed through as `UnexpectedStatus`.
pub fn classify_failure(status: u16, body: &str) -> GatewayError {
	if status == 500 {
		if body.starts_with("Node is catching up") {
			return GatewayError::NodeIsCatchingUp;
		}
		if body.starts_with(r#"{"error":"delegation does not exist"}"#) {
			return GatewayError::DelegationDoesNotExist;
		}
		if body.starts_with(r#"{"error":"validator does not exist: "#) {
			return GatewayError::ValidatorDoesNotExist;
		}
	}

	GatewayError::UnexpectedStatus {
		status,
		body: body.chars().take(512).collect(),
	}
}

#[async_trait]
impl ChainGateway for ChainGatewayClient {
	async fn latest_block(&self) -> Result<ChainHead, GatewayError> {
		let blocks: Vec<ChainHead> = self.rest("/get_blocks", &[("limit", "1")]).await?;
		blocks.into_iter().next().ok_or(GatewayError::NoData)
	}

	async fn validators(&self) -> Result<Vec<Validator>, GatewayError> {
		let validators: Vec<ValidatorResponse> = self.rest("/get_all_validators", &[]).await?;
		Ok(validators.into_iter().map(Validator::from).collect())
	}

	async fn validator_delegators(&self, operator: &str) -> Result<Vec<String>, GatewayError> {
		let delegators: Option<Vec<DelegatorResponse>> = self
			.cosmos(&format!("/staking/validators/{}/delegations", operator))
			.await?;
		Ok(delegators
			.unwrap_or_default()
			.into_iter()
			.map(|d| d.delegator_address)
			.collect())
	}

	async fn liquidity_pools(&self) -> Result<Vec<LiquidityPool>, GatewayError> {
		self.rest("/get_liquidity_pools", &[]).await
	}

	async fn tokens(&self) -> Result<Vec<TokenInfo>, GatewayError> {
		self.rest("/get_tokens", &[]).await
	}

	async fn balances(&self, address: &str) -> Result<Vec<LiveBalance>, GatewayError> {
		// Keyed by denom; an account without balances is reported as null or {}.
		let balances: Option<HashMap<String, LiveBalance>> = self
			.rest("/get_balance", &[("account", address)])
			.await?;
		Ok(balances.unwrap_or_default().into_values().collect())
	}

	async fn profile(&self, address: &str) -> Result<Profile, GatewayError> {
		let profile: ProfileResponse = self.rest("/get_profile", &[("account", address)]).await?;
		Ok(profile.into())
	}

	async fn delegations(&self, address: &str) -> Result<Vec<Coin>, GatewayError> {
		let delegations: Option<Vec<DelegationResponse>> = self
			.cosmos(&format!("/staking/delegators/{}/delegations", address))
			.await?;
		Ok(delegations
			.unwrap_or_default()
			.into_iter()
			.map(|d| d.balance)
			.collect())
	}

	async fn unbonding_delegations(
		&self,
		address: &str,
	) -> Result<Vec<UnbondingDelegation>, GatewayError> {
		let unbonding: Option<Vec<UnbondingDelegation>> = self
			.cosmos(&format!(
				"/staking/delegators/{}/unbonding_delegations",
				address
			))
			.await?;
		Ok(unbonding.unwrap_or_default())
	}

	async fn validator_distribution(
		&self,
		operator: &str,
	) -> Result<ValidatorDistribution, GatewayError> {
		let distribution: Option<ValidatorDistributionResponse> = self
			.cosmos(&format!("/distribution/validators/{}", operator))
			.await?;
		Ok(distribution.unwrap_or_default().into())
	}

	async fn delegator_rewards(&self, address: &str) -> Result<Vec<Coin>, GatewayError> {
		let rewards: Option<DelegatorRewardsResponse> = self
			.cosmos(&format!("/distribution/delegators/{}/rewards", address))
			.await?;
		Ok(rewards.unwrap_or_default().total.unwrap_or_default())
	}
}
