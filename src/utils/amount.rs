use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Largest scale a `Decimal` can carry.
pub const MAX_SCALE: u32 = 28;

/// Round `value` to `decimals` places (midpoint away from zero) and pad it so that it
/// always renders with exactly `decimals` fractional digits.
pub fn to_precision(value: Decimal, decimals: u32) -> Decimal {
	let decimals = decimals.min(MAX_SCALE);
	let mut rounded = value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
	rounded.rescale(decimals);
	rounded
}

/// Parse an amount that is already expressed in human units.
pub fn parse_amount(amount: &str) -> Option<Decimal> {
	Decimal::from_str(amount.trim()).ok()
}

/// Convert a raw on-chain amount into human units by dividing by `10^decimals`.
///
/// Raw amounts are usually integers, but distribution endpoints report fractional
/// raw units, so the input is parsed as a decimal.
pub fn raw_to_decimal(raw: &str, decimals: u32) -> Option<Decimal> {
	let value = parse_amount(raw)?;
	value.checked_mul(Decimal::new(1, decimals.min(MAX_SCALE)))
}
