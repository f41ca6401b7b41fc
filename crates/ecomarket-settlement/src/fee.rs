//! Platform fee split.

use ecomarket_types::{MarketError, Result, constants};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// How an order total divides between the platform and the seller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    pub total: Decimal,
    pub fee: Decimal,
    pub seller_amount: Decimal,
}

impl FeeSplit {
    /// `fee = round(total * rate, 2)` with midpoints rounded away from zero;
    /// the seller gets the remainder, so `fee + seller_amount == total`.
    ///
    /// # Errors
    /// `InvalidAmount` for a negative total or a rate outside `[0, 1)`.
    pub fn compute(total: Decimal, rate: Decimal) -> Result<Self> {
        if total.is_sign_negative() {
            return Err(MarketError::InvalidAmount {
                reason: format!("order total {total} is negative"),
            });
        }
        if rate.is_sign_negative() || rate >= Decimal::ONE {
            return Err(MarketError::InvalidAmount {
                reason: format!("fee rate {rate} outside [0, 1)"),
            });
        }
        let out_of_range = || MarketError::InvalidAmount {
            reason: format!("fee on {total} at rate {rate} is out of range"),
        };
        let fee = total
            .checked_mul(rate)
            .ok_or_else(out_of_range)?
            .round_dp_with_strategy(constants::MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
        let seller_amount = total.checked_sub(fee).ok_or_else(out_of_range)?;
        Ok(Self {
            total,
            fee,
            seller_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn ten_percent_of_a_thousand() {
        let split = FeeSplit::compute(dec("1000"), dec("0.10")).unwrap();
        assert_eq!(split.fee, dec("100"));
        assert_eq!(split.seller_amount, dec("900"));
    }

    #[test]
    fn midpoint_rounds_away_from_zero() {
        // 0.25 * 0.10 = 0.025 -> 0.03
        let split = FeeSplit::compute(dec("0.25"), dec("0.10")).unwrap();
        assert_eq!(split.fee, dec("0.03"));
        assert_eq!(split.seller_amount, dec("0.22"));
    }

    #[test]
    fn parts_always_sum_to_total() {
        for cents in [0_i64, 1, 5, 99, 1_234, 99_999, 1_000_001] {
            let total = Decimal::new(cents, 2);
            let split = FeeSplit::compute(total, dec("0.10")).unwrap();
            assert_eq!(split.fee + split.seller_amount, total);
            assert!(!split.seller_amount.is_sign_negative());
        }
    }

    #[test]
    fn zero_rate_keeps_nothing() {
        let split = FeeSplit::compute(dec("42.50"), Decimal::ZERO).unwrap();
        assert_eq!(split.fee, Decimal::ZERO);
        assert_eq!(split.seller_amount, dec("42.50"));
    }

    #[test]
    fn bad_inputs_are_rejected() {
        assert!(FeeSplit::compute(dec("-1"), dec("0.1")).is_err());
        assert!(FeeSplit::compute(dec("1"), Decimal::ONE).is_err());
    }

    #[test]
    fn largest_total_does_not_panic() {
        let split = FeeSplit::compute(Decimal::MAX, dec("0.10")).unwrap();
        assert!(split.fee > Decimal::ZERO);
        assert!(split.seller_amount > split.fee);
    }
}
