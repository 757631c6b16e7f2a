//! Closed-form risk formulas.
//!
//! Every function is total: NaN inputs (empty or malformed fields) and
//! divisions by zero propagate as NaN or infinity instead of failing.
//! Fee arguments are percentages (1 = 1%).

use sizer_domain::Trend;

/// `min` that propagates NaN (`f64::min` would drop it)
fn nan_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.min(b)
    }
}

/// `max` that propagates NaN
fn nan_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.max(b)
    }
}

/// Dollar amount at risk: `balance × risk% / 100`
pub fn risk_in_usd(balance: f64, risk_percent: f64) -> f64 {
    balance * risk_percent / 100.0
}

/// Bullish when the stop sits below the entry, Bearish otherwise.
///
/// `None` when either price is missing.
pub fn trend(entry_price: f64, stoploss: f64) -> Option<Trend> {
    if entry_price.is_nan() || stoploss.is_nan() {
        return None;
    }
    if entry_price > stoploss {
        Some(Trend::Bullish)
    } else {
        Some(Trend::Bearish)
    }
}

/// Fraction of the position left after the stop is hit: `min / max`
pub fn loss_remained_pct(entry_price: f64, stoploss: f64) -> f64 {
    nan_min(entry_price, stoploss) / nan_max(entry_price, stoploss)
}

/// Notional size such that the loss at the stop, fees included, equals the
/// risk amount.
///
/// ```text
/// size = risk / (entryFee/100 + stopFee/100 × remained + (1 − remained))
/// ```
pub fn position_size_usd(
    risk_in_usd: f64,
    entry_price: f64,
    stoploss: f64,
    entry_fee: f64,
    stop_fee: f64,
) -> f64 {
    risk_in_usd / loss_denominator(entry_price, stoploss, entry_fee, stop_fee)
}

/// Loss per unit of notional when the stop fills, fees included
pub fn loss_denominator(entry_price: f64, stoploss: f64, entry_fee: f64, stop_fee: f64) -> f64 {
    let remained = loss_remained_pct(entry_price, stoploss);
    entry_fee / 100.0 + (stop_fee / 100.0) * remained + (1.0 - remained)
}

/// Position size in units of the traded asset
pub fn position_size_crypto(position_size_usd: f64, entry_price: f64) -> f64 {
    position_size_usd / entry_price
}

/// Fees paid on entry plus fees paid when the stop fills
pub fn fee_in_usd(
    position_size_usd: f64,
    entry_fee: f64,
    stop_fee: f64,
    entry_price: f64,
    stoploss: f64,
) -> f64 {
    position_size_usd * (entry_fee / 100.0 + (stop_fee / 100.0) * (entry_price / stoploss))
}

/// Relative distance from entry to stop: `1 − min / max`
pub fn entry_over_stoploss_ratio(entry_price: f64, stoploss: f64) -> f64 {
    1.0 - loss_remained_pct(entry_price, stoploss)
}

/// `min(entry, takeProfit) / max(entry, takeProfit)`
pub fn entry_over_take_profit_ratio(entry_price: f64, take_profit: f64) -> f64 {
    nan_min(entry_price, take_profit) / nan_max(entry_price, take_profit)
}

/// Growth factor of the position at the take-profit: `max / min`
pub fn take_profit_ratio(entry_price: f64, take_profit: f64) -> f64 {
    nan_max(entry_price, take_profit) / nan_min(entry_price, take_profit)
}

/// Profit at the take-profit after entry and exit fees
pub fn trade_profit(
    position_size_usd: f64,
    entry_price: f64,
    take_profit: f64,
    entry_fee: f64,
    take_profit_fee: f64,
) -> f64 {
    let tp_ratio = take_profit_ratio(entry_price, take_profit);
    position_size_usd * tp_ratio
        - position_size_usd * entry_fee / 100.0
        - position_size_usd * tp_ratio * take_profit_fee / 100.0
}

/// Profit relative to the position size
pub fn trade_profit_ratio(trade_profit: f64, position_size_usd: f64) -> f64 {
    trade_profit / position_size_usd
}

/// Profit relative to the account balance
pub fn real_profit_percent(trade_profit: f64, account_balance: f64) -> f64 {
    trade_profit / account_balance
}

/// Reward ratio over risk ratio
pub fn risk_reward_ratio(entry_over_take_profit: f64, entry_over_stoploss: f64) -> f64 {
    entry_over_take_profit / entry_over_stoploss
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < EPSILON * expected.abs().max(1.0),
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_risk_in_usd() {
        assert_close(risk_in_usd(1000.0, 2.0), 20.0);
        assert!(risk_in_usd(f64::NAN, 2.0).is_nan());
    }

    #[test]
    fn test_position_size_long_scenario() {
        // 20 / (0.01 + 0.01 × 0.9 + 0.1) = 20 / 0.119
        let risk = risk_in_usd(1000.0, 2.0);
        let size = position_size_usd(risk, 100.0, 90.0, 1.0, 1.0);
        assert_close(size, 20.0 / 0.119);
        assert!((size - 168.07).abs() < 0.01);

        let units = position_size_crypto(size, 100.0);
        assert!((units - 1.6807).abs() < 0.0001);
    }

    #[test]
    fn test_position_size_times_denominator_is_risk() {
        let cases = [
            (20.0, 100.0, 90.0, 1.0, 1.0),
            (150.0, 95_000.0, 93_500.0, 0.1, 0.1),
            (5.0, 2.5, 2.75, 0.0, 0.0),
            (1_000.0, 0.0004, 0.00035, 0.075, 0.05),
        ];
        for (risk, entry, stop, entry_fee, stop_fee) in cases {
            let size = position_size_usd(risk, entry, stop, entry_fee, stop_fee);
            assert_close(size * loss_denominator(entry, stop, entry_fee, stop_fee), risk);
        }
    }

    #[test]
    fn test_trend() {
        assert_eq!(trend(100.0, 90.0), Some(Trend::Bullish));
        assert_eq!(trend(100.0, 110.0), Some(Trend::Bearish));
        assert_eq!(trend(100.0, 100.0), Some(Trend::Bearish));
        assert_eq!(trend(f64::NAN, 90.0), None);
        assert_eq!(trend(100.0, f64::NAN), None);
    }

    #[test]
    fn test_entry_over_stoploss_ratio_short() {
        assert_close(entry_over_stoploss_ratio(100.0, 110.0), 1.0 - 100.0 / 110.0);
        assert!((entry_over_stoploss_ratio(100.0, 110.0) - 0.0909).abs() < 0.0001);
    }

    #[test]
    fn test_nan_propagates_through_min_max() {
        assert!(loss_remained_pct(f64::NAN, 90.0).is_nan());
        assert!(entry_over_take_profit_ratio(100.0, f64::NAN).is_nan());
        assert!(position_size_usd(20.0, f64::NAN, 90.0, 1.0, 1.0).is_nan());
    }

    #[test]
    fn test_division_by_zero_is_not_an_error() {
        assert!(position_size_crypto(100.0, 0.0).is_infinite());
        assert!(risk_reward_ratio(0.5, 0.0).is_infinite());
        assert!(trade_profit_ratio(0.0, 0.0).is_nan());
    }

    #[test]
    fn test_trade_profit() {
        // entry 100, tp 120, size 1000, fees 1% / 1%
        // 1000 × 1.2 − 10 − 12 = 1178
        assert_close(trade_profit(1000.0, 100.0, 120.0, 1.0, 1.0), 1178.0);
        assert_close(trade_profit_ratio(1178.0, 1000.0), 1.178);
        assert_close(real_profit_percent(1178.0, 1000.0), 1.178);
    }

    #[test]
    fn test_fee_in_usd() {
        // 1000 × (0.01 + 0.01 × 100/90)
        assert_close(fee_in_usd(1000.0, 1.0, 1.0, 100.0, 90.0), 10.0 + 10.0 * 100.0 / 90.0);
    }

    #[test]
    fn test_risk_reward_ratio() {
        let reward = entry_over_take_profit_ratio(100.0, 120.0);
        let risk = entry_over_stoploss_ratio(100.0, 90.0);
        assert_close(risk_reward_ratio(reward, risk), (100.0 / 120.0) / 0.1);
    }
}
