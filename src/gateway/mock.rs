//! Scripted in-memory `ChainGateway` for tests.

use super::types::*;
use super::ChainGateway;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

/// Chain data served by [`MockGateway`].
#[derive(Default)]
pub struct MockChain {
	pub head: Option<ChainHead>,
	pub validators: Vec<Validator>,
	pub delegators: HashMap<String, Vec<String>>,
	pub pools: Vec<LiquidityPool>,
	pub tokens: Vec<TokenInfo>,
	pub balances: HashMap<String, Vec<LiveBalance>>,
	pub profiles: HashMap<String, Profile>,
	pub delegations: HashMap<String, Vec<Coin>>,
	pub unbonding: HashMap<String, Vec<UnbondingDelegation>>,
	pub validator_distributions: HashMap<String, ValidatorDistribution>,
	pub delegator_rewards: HashMap<String, Vec<Coin>>,
	/// Operators whose distribution lookup reports that the validator is gone.
	pub removed_validators: HashSet<String>,
}

#[derive(Default)]
struct Script {
	failures: HashMap<&'static str, VecDeque<GatewayError>>,
	calls: HashMap<&'static str, usize>,
}

#[derive(Default)]
pub struct MockGateway {
	chain: Mutex<MockChain>,
	script: Mutex<Script>,
}

impl MockGateway {
	pub fn new(chain: MockChain) -> Self {
		Self {
			chain: Mutex::new(chain),
			script: Mutex::new(Script::default()),
		}
	}

	/// Mutate the served chain data.
	pub fn update(&self, f: impl FnOnce(&mut MockChain)) {
		f(&mut self.chain.lock().unwrap());
	}

	pub fn set_head(&self, head: ChainHead) {
		self.update(|chain| chain.head = Some(head));
	}

	/// Make the next call of `method` fail with `error`. Failures queue up in order.
	pub fn fail_next(&self, method: &'static str, error: GatewayError) {
		self.script
			.lock()
			.unwrap()
			.failures
			.entry(method)
			.or_default()
			.push_back(error);
	}

	/// Number of times `method` has been called.
	pub fn calls(&self, method: &'static str) -> usize {
		self.script
			.lock()
			.unwrap()
			.calls
			.get(method)
			.copied()
			.unwrap_or(0)
	}

	fn enter(&self, method: &'static str) -> Result<(), GatewayError> {
		let mut script = self.script.lock().unwrap();
		*script.calls.entry(method).or_default() += 1;
		match script.failures.get_mut(method).and_then(VecDeque::pop_front) {
			Some(error) => Err(error),
			None => Ok(()),
		}
	}

	fn read<T>(&self, f: impl FnOnce(&MockChain) -> T) -> T {
		f(&self.chain.lock().unwrap())
	}
}

/// A chain head at `height`, one second per block after a fixed genesis.
pub fn head(height: u64) -> ChainHead {
	ChainHead {
		height,
		time: Utc.timestamp_opt(1_600_000_000 + height as i64, 0).unwrap(),
	}
}

pub fn live(denom: &str, available: &str, order: &str, position: &str) -> LiveBalance {
	LiveBalance {
		denom: denom.to_string(),
		available: available.to_string(),
		order: order.to_string(),
		position: position.to_string(),
	}
}

pub fn token(denom: &str, decimals: u32) -> TokenInfo {
	TokenInfo {
		denom: denom.to_string(),
		decimals,
	}
}

#[async_trait]
impl ChainGateway for MockGateway {
	async fn latest_block(&self) -> Result<ChainHead, GatewayError> {
		self.enter("latest_block")?;
		self.read(|chain| chain.head.clone())
			.ok_or(GatewayError::NoData)
	}

	async fn validators(&self) -> Result<Vec<Validator>, GatewayError> {
		self.enter("validators")?;
		Ok(self.read(|chain| chain.validators.clone()))
	}

	async fn validator_delegators(&self, operator: &str) -> Result<Vec<String>, GatewayError> {
		self.enter("validator_delegators")?;
		Ok(self.read(|chain| chain.delegators.get(operator).cloned().unwrap_or_default()))
	}

	async fn liquidity_pools(&self) -> Result<Vec<LiquidityPool>, GatewayError> {
		self.enter("liquidity_pools")?;
		Ok(self.read(|chain| chain.pools.clone()))
	}

	async fn tokens(&self) -> Result<Vec<TokenInfo>, GatewayError> {
		self.enter("tokens")?;
		Ok(self.read(|chain| chain.tokens.clone()))
	}

	async fn balances(&self, address: &str) -> Result<Vec<LiveBalance>, GatewayError> {
		self.enter("balances")?;
		Ok(self.read(|chain| chain.balances.get(address).cloned().unwrap_or_default()))
	}

	async fn profile(&self, address: &str) -> Result<Profile, GatewayError> {
		self.enter("profile")?;
		Ok(self.read(|chain| chain.profiles.get(address).cloned().unwrap_or_default()))
	}

	async fn delegations(&self, address: &str) -> Result<Vec<Coin>, GatewayError> {
		self.enter("delegations")?;
		Ok(self.read(|chain| chain.delegations.get(address).cloned().unwrap_or_default()))
	}

	async fn unbonding_delegations(
		&self,
		address: &str,
	) -> Result<Vec<UnbondingDelegation>, GatewayError> {
		self.enter("unbonding_delegations")?;
		Ok(self.read(|chain| chain.unbonding.get(address).cloned().unwrap_or_default()))
	}

	async fn validator_distribution(
		&self,
		operator: &str,
	) -> Result<ValidatorDistribution, GatewayError> {
		self.enter("validator_distribution")?;
		if self.read(|chain| chain.removed_validators.contains(operator)) {
			return Err(GatewayError::ValidatorDoesNotExist);
		}
		Ok(self.read(|chain| {
			chain
				.validator_distributions
				.get(operator)
				.cloned()
				.unwrap_or_default()
		}))
	}

	async fn delegator_rewards(&self, address: &str) -> Result<Vec<Coin>, GatewayError> {
		self.enter("delegator_rewards")?;
		Ok(self.read(|chain| chain.delegator_rewards.get(address).cloned().unwrap_or_default()))
	}
}

/// A valid bech32 account address derived from `seed`.
pub fn address(seed: u8) -> String {
	bech32::encode::<bech32::Bech32>(bech32::Hrp::parse("swth").unwrap(), &[seed; 20]).unwrap()
}

/// A valid bech32 validator operator address derived from `seed`.
pub fn operator(seed: u8) -> String {
	bech32::encode::<bech32::Bech32>(bech32::Hrp::parse("swthvaloper").unwrap(), &[seed; 20])
		.unwrap()
}
