//! Position sizing and fee arithmetic shared by the simulator and the live loop.

/// Whole shares purchasable with `cash * fraction` at `price`.
///
/// Returns 0 for a non-positive or non-finite price, or when the budget does
/// not cover a single share.
pub fn shares_for_cash(cash: f64, fraction: f64, price: f64) -> u64 {
    if !price.is_finite() || price <= 0.0 || !cash.is_finite() || cash <= 0.0 {
        return 0;
    }
    let budget = cash * fraction;
    let shares = (budget / price).floor();
    if shares < 1.0 { 0 } else { shares as u64 }
}

/// Total cash debited for a buy: shares * price * (1 + fee_rate).
pub fn buy_cost(shares: u64, price: f64, fee_rate: f64) -> f64 {
    shares as f64 * price * (1.0 + fee_rate)
}

/// Cash credited for a sell: shares * price * (1 - fee_rate).
pub fn sell_proceeds(shares: u64, price: f64, fee_rate: f64) -> f64 {
    shares as f64 * price * (1.0 - fee_rate)
}

/// Shares to sell from `held`: `floor(held * fraction)`, or the whole position
/// when that rounds to zero.
pub fn shares_to_sell(held: u64, fraction: f64) -> u64 {
    if held == 0 {
        return 0;
    }
    let partial = (held as f64 * fraction).floor() as u64;
    if partial == 0 { held } else { partial.min(held) }
}
