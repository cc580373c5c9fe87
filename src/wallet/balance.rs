//! Per-asset balance ledger of a wallet.
//!
//! A balance is split into seven components coming from different endpoints (spendable
//! funds, stake, unbonding queue, rewards, commission, open orders, open positions) and a
//! derived total. Components can only be changed through [`BalanceComponents::apply`],
//! which recomputes the total in the same step, so a stale total is never observable.
//! All arithmetic is exact decimal arithmetic at the asset's registered precision.

use crate::utils::to_precision;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Balance components of one asset, each stored at the asset's decimal precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceComponents {
    available: Decimal,
    staking: Decimal,
    unbonding: Decimal,
    rewards: Decimal,
    commission: Decimal,
    orders: Decimal,
    positions: Decimal,
    total: Decimal,
}

/// A partial update of [`BalanceComponents`]. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceDelta {
    pub available: Option<Decimal>,
    pub staking: Option<Decimal>,
    pub unbonding: Option<Decimal>,
    pub rewards: Option<Decimal>,
    pub commission: Option<Decimal>,
    pub orders: Option<Decimal>,
    pub positions: Option<Decimal>,
}

impl BalanceComponents {
    /// All components zero, formatted at `decimals`.
    pub fn zero(decimals: u32) -> Self {
        let zero = to_precision(Decimal::ZERO, decimals);
        Self {
            available: zero,
            staking: zero,
            unbonding: zero,
            rewards: zero,
            commission: zero,
            orders: zero,
            positions: zero,
            total: zero,
        }
    }

    /// Add each present delta field onto the stored value, round to `decimals` and
    /// recompute the total. Returns `None` on arithmetic overflow, leaving `self` unchanged.
    pub fn apply(&mut self, delta: &BalanceDelta, decimals: u32) -> Option<()> {
        let mut next = self.clone();

        for (slot, change) in [
            (&mut next.available, delta.available),
            (&mut next.staking, delta.staking),
            (&mut next.unbonding, delta.unbonding),
            (&mut next.rewards, delta.rewards),
            (&mut next.commission, delta.commission),
            (&mut next.orders, delta.orders),
            (&mut next.positions, delta.positions),
        ] {
            if let Some(change) = change {
                *slot = to_precision(slot.checked_add(change)?, decimals);
            }
        }

        next.total = to_precision(next.component_sum()?, decimals);
        *self = next;
        Some(())
    }

    fn component_sum(&self) -> Option<Decimal> {
        // Orders and positions are exposure rather than held funds, but they have
        // always been part of the total and consumers rank by it.
        [
            self.staking,
            self.unbonding,
            self.rewards,
            self.commission,
            self.orders,
            self.positions,
        ]
        .into_iter()
        .try_fold(self.available, |sum, part| sum.checked_add(part))
    }

    pub fn available(&self) -> Decimal {
        self.available
    }

    pub fn staking(&self) -> Decimal {
        self.staking
    }

    pub fn unbonding(&self) -> Decimal {
        self.unbonding
    }

    pub fn rewards(&self) -> Decimal {
        self.rewards
    }

    pub fn commission(&self) -> Decimal {
        self.commission
    }

    pub fn orders(&self) -> Decimal {
        self.orders
    }

    pub fn positions(&self) -> Decimal {
        self.positions
    }

    pub fn total(&self) -> Decimal {
        self.total
    }
}
