//! Types for chain-data gateway integration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// The most recent block known to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHead {
    /// Block height.
    #[serde(rename = "block_height", deserialize_with = "height_or_zero")]
    pub height: u64,
    /// Block time as reported by the chain.
    pub time: DateTime<Utc>,
}

/// A validator together with the account that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validator {
    /// The validator's primary (self-bond) wallet.
    pub wallet_address: String,
    /// The operator address used by the staking and distribution modules.
    pub operator_address: String,
    /// Human-readable validator name.
    pub moniker: String,
}

/// An automated market maker pool and the wallet holding its liquidity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LiquidityPool {
    pub pool_address: String,
    #[serde(default)]
    pub name: String,
}

/// Token catalog entry, used to resolve decimal precision.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenInfo {
    pub denom: String,
    pub decimals: u32,
}

/// Spendable balance of one asset. Amounts are already in human units.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LiveBalance {
    pub denom: String,
    #[serde(deserialize_with = "amount_string")]
    pub available: String,
    #[serde(deserialize_with = "amount_string")]
    pub order: String,
    #[serde(deserialize_with = "amount_string")]
    pub position: String,
}

/// Account profile information.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Profile {
    pub username: Option<String>,
    pub last_seen_height: u64,
    pub last_seen_time: Option<DateTime<Utc>>,
}

/// An amount of one asset in raw on-chain units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    #[serde(deserialize_with = "amount_string")]
    pub amount: String,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.into(),
        }
    }
}

/// One unbonding queue of a delegator towards a single validator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct UnbondingDelegation {
    #[serde(default)]
    pub entries: Vec<UnbondingEntry>,
}

/// A single pending unbonding. The balance is in raw units of the staking asset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UnbondingEntry {
    #[serde(deserialize_with = "amount_string")]
    pub balance: String,
}

/// Outstanding validator distribution: self-bond rewards and commission.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidatorDistribution {
    pub self_bond_rewards: Vec<Coin>,
    pub commission: Vec<Coin>,
}

// Wire shapes of the REST and Cosmos endpoints. They are converted into the
// types above by the client so that the sync engine never sees envelopes.

#[derive(Debug, Deserialize)]
pub(crate) struct CosmosEnvelope<T> {
    pub result: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ValidatorResponse {
    #[serde(rename = "WalletAddress")]
    pub wallet_address: String,
    #[serde(rename = "OperatorAddress")]
    pub operator_address: String,
    #[serde(rename = "Description", default)]
    pub description: ValidatorDescription,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ValidatorDescription {
    #[serde(default)]
    pub moniker: String,
}

impl From<ValidatorResponse> for Validator {
    fn from(value: ValidatorResponse) -> Self {
        Self {
            wallet_address: value.wallet_address,
            operator_address: value.operator_address,
            moniker: value.description.moniker,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileResponse {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "height_or_zero")]
    pub last_seen_block: u64,
    #[serde(default)]
    pub last_seen_time: Option<String>,
}

impl From<ProfileResponse> for Profile {
    fn from(value: ProfileResponse) -> Self {
        let last_seen_time = value
            .last_seen_time
            .as_deref()
            .and_then(|time| match DateTime::parse_from_rfc3339(time) {
                Ok(parsed) => Some(parsed.with_timezone(&Utc)),
                Err(e) => {
                    warn!("Ignoring unparseable last seen time '{}': {}", time, e);
                    None
                }
            });

        Self {
            username: value.username.filter(|name| !name.is_empty()),
            last_seen_height: value.last_seen_block,
            last_seen_time,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DelegationResponse {
    pub balance: Coin,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DelegatorResponse {
    pub delegator_address: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ValidatorDistributionResponse {
    #[serde(default)]
    pub self_bond_rewards: Option<Vec<Coin>>,
    #[serde(default)]
    pub val_commission: Option<Vec<Coin>>,
}

impl From<ValidatorDistributionResponse> for ValidatorDistribution {
    fn from(value: ValidatorDistributionResponse) -> Self {
        Self {
            self_bond_rewards: value.self_bond_rewards.unwrap_or_default(),
            commission: value.val_commission.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DelegatorRewardsResponse {
    #[serde(default)]
    pub total: Option<Vec<Coin>>,
}

/// Heights are sent as numbers by some endpoints and as strings by others.
fn height_or_zero<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
        Missing(()),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(height) => Ok(height),
        Raw::Text(text) if text.trim().is_empty() => Ok(0),
        Raw::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
        Raw::Missing(()) => Ok(0),
    }
}

fn amount_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

/// Error types for gateway requests
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Request to {url} timed out")]
    RequestTimedOut { url: String },

    #[error("Node is catching up")]
    NodeIsCatchingUp,

    #[error("Delegation does not exist")]
    DelegationDoesNotExist,

    #[error("Validator does not exist")]
    ValidatorDoesNotExist,

    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("No data returned")]
    NoData,

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl GatewayError {
    /// Timeouts and a syncing node resolve on their own; the caller should wait and retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::RequestTimedOut { .. } | GatewayError::NodeIsCatchingUp
        )
    }

    /// The wallet is no longer backed by an active validator.
    pub fn is_stale_role(&self) -> bool {
        matches!(
            self,
            GatewayError::DelegationDoesNotExist | GatewayError::ValidatorDoesNotExist
        )
    }
}
