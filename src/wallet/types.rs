use crate::gateway::GatewayError;
use crate::wallet::balance::{BalanceComponents, BalanceDelta};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A tracked account and its per-asset balances.
///
/// This is also the persisted snapshot format: one record per wallet, rewritten in full
/// after every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
	/// Bech32 account address.
	pub address: String,
	/// Chain time of the latest activity seen for this account.
	pub last_seen_time: Option<DateTime<Utc>>,
	/// Height of the latest activity seen for this account.
	pub last_seen_height: u64,
	/// Chain time of the last completed refresh.
	pub last_checked_time: Option<DateTime<Utc>>,
	/// Chain height of the last completed refresh.
	pub last_checked_height: u64,
	/// Profile username, validator moniker or liquidity pool name.
	pub username: Option<String>,
	/// Operator address if this is a validator's own wallet.
	#[serde(rename = "validator")]
	pub validator_operator_address: Option<String>,
	/// Balances per asset.
	#[serde(rename = "balance", default)]
	pub balances: BTreeMap<String, BalanceComponents>,
}

impl Wallet {
	/// A wallet that has been observed but never refreshed.
	pub fn placeholder(address: impl Into<String>) -> Self {
		Self {
			address: address.into(),
			last_seen_time: None,
			last_seen_height: 0,
			last_checked_time: None,
			last_checked_height: 0,
			username: None,
			validator_operator_address: None,
			balances: BTreeMap::new(),
		}
	}

	pub fn is_validator(&self) -> bool {
		self.validator_operator_address.is_some()
	}

	/// Merge a partial balance update for `denom` and recompute its total.
	pub fn apply_balance_delta(
		&mut self,
		denom: &str,
		decimals: u32,
		delta: &BalanceDelta,
	) -> Result<(), WalletSyncError> {
		self.balances
			.entry(denom.to_string())
			.or_insert_with(|| BalanceComponents::zero(decimals))
			.apply(delta, decimals)
			.ok_or_else(|| WalletSyncError::AmountOverflow {
				denom: denom.to_string(),
			})
	}

	/// Drop the validator role after the chain stopped reporting it.
	pub fn demote(&mut self) {
		self.validator_operator_address = None;
		self.username = None;
	}

	/// Blocks elapsed since the last refresh, as seen from `current_height`.
	pub fn drift(&self, current_height: u64) -> u64 {
		current_height.saturating_sub(self.last_checked_height)
	}
}

/// Check that `address` is a well-formed bech32 string.
///
/// Addresses name the snapshot files, so anything else is rejected before it reaches
/// the store.
pub fn validate_address(address: &str) -> Result<(), WalletSyncError> {
	bech32::decode(address)
		.map(|_| ())
		.map_err(|e| WalletSyncError::InvalidAddress {
			address: address.to_string(),
			reason: e.to_string(),
		})
}

/// Error types for wallet discovery, refresh and persistence
#[derive(Debug, thiserror::Error)]
pub enum WalletSyncError {
	#[error("Gateway error: {0}")]
	Gateway(#[from] GatewayError),

	#[error("Decimals of '{denom}' unavailable even after refetching the token list")]
	DecimalsUnavailable { denom: String },

	#[error("Invalid amount '{amount}' for '{denom}'")]
	InvalidAmount { denom: String, amount: String },

	#[error("Balance of '{denom}' overflowed")]
	AmountOverflow { denom: String },

	#[error("Invalid address '{address}': {reason}")]
	InvalidAddress { address: String, reason: String },

	#[error("Persistence error: {0}")]
	Persistence(String),

	#[error("Refresh of {address} gave up after {attempts} attempts: {last_error}")]
	RetriesExhausted {
		address: String,
		attempts: u32,
		last_error: GatewayError,
	},

	#[error("Shutdown requested")]
	Shutdown,
}

impl WalletSyncError {
	/// Transient gateway errors that are worth waiting out.
	pub fn transient_gateway_error(&self) -> Option<&GatewayError> {
		match self {
			WalletSyncError::Gateway(e) if e.is_transient() => Some(e),
			_ => None,
		}
	}
}
