//! Fixed-point price conversions and the vesting split.
//!
//! `sale_price` is the number of sale-token smallest units bought by one
//! whole payment token, scaled by 10^18. Products are formed in 256 bits, so
//! an 18-decimal payment token at a large price still converts exactly; a
//! result that does not fit in `u128` fails the call instead of wrapping.

use serde::{Deserialize, Serialize};
use tsl_types::amount::{pow10, serde_u128};

use crate::error::{SaleError, SaleResult};

/// Share of a vesting account's entitlement released at redemption, in
/// percent. The rest goes to the treasury.
pub const VESTED_RELEASE_PERCENT: u128 = 15;

fn scale(decimals: u8) -> SaleResult<u128> {
    pow10(decimals).map_err(|e| SaleError::InvalidConfig(e.to_string()))
}

/// Full 256-bit product of `a` and `b` as `(high, low)` halves.
fn widening_mul(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = u64::MAX as u128;
    let (a_hi, a_lo) = (a >> 64, a & MASK);
    let (b_hi, b_lo) = (b >> 64, b & MASK);
    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;
    let mid = (ll >> 64) + (lh & MASK) + (hl & MASK);
    let low = (ll & MASK) | (mid << 64);
    let high = hh + (lh >> 64) + (hl >> 64) + (mid >> 64);
    (high, low)
}

/// `a * b / divisor`, rounded down.
pub fn mul_div(a: u128, b: u128, divisor: u128) -> SaleResult<u128> {
    if divisor == 0 {
        return Err(SaleError::ArithmeticOverflow);
    }
    let (high, low) = widening_mul(a, b);
    if high == 0 {
        return Ok(low / divisor);
    }
    // Quotient needs more than 128 bits.
    if high >= divisor {
        return Err(SaleError::ArithmeticOverflow);
    }
    // Restoring long division; `rem < divisor` holds after every step.
    let mut rem = high;
    let mut quotient = 0u128;
    for bit in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((low >> bit) & 1);
        quotient <<= 1;
        if carry == 1 || rem >= divisor {
            rem = rem.wrapping_sub(divisor);
            quotient |= 1;
        }
    }
    Ok(quotient)
}

/// Sale-token units bought by `payment` smallest payment units.
pub fn entitlement_for(payment: u128, sale_price: u128, payment_decimals: u8) -> SaleResult<u128> {
    mul_div(payment, sale_price, scale(payment_decimals)?)
}

/// Payment units returned for giving back `amount` sale-token units.
///
/// Rounds down, so refunding never returns more than was paid.
pub fn refund_payment_for(amount: u128, sale_price: u128, payment_decimals: u8) -> SaleResult<u128> {
    if sale_price == 0 {
        return Err(SaleError::InvalidConfig("sale price must be non-zero".into()));
    }
    mul_div(amount, scale(payment_decimals)?, sale_price)
}

/// How one redemption is paid out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionSplit {
    #[serde(with = "serde_u128")]
    pub to_account: u128,
    #[serde(with = "serde_u128")]
    pub to_treasury: u128,
}

impl RedemptionSplit {
    pub fn total(&self) -> u128 {
        self.to_account + self.to_treasury
    }
}

/// Split `owed` between the buyer and the treasury.
pub fn split_redemption(owed: u128, vesting: bool) -> SaleResult<RedemptionSplit> {
    if !vesting {
        return Ok(RedemptionSplit {
            to_account: owed,
            to_treasury: 0,
        });
    }
    let to_account = owed
        .checked_mul(VESTED_RELEASE_PERCENT)
        .ok_or(SaleError::ArithmeticOverflow)?
        / 100;
    Ok(RedemptionSplit {
        to_account,
        to_treasury: owed - to_account,
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use tsl_types::{parse_units, PRICE_SCALE, TOKEN_DECIMALS};

    use super::*;

    #[test]
    fn one_usdc_at_fractional_price() {
        let price = parse_units("43.3125031", 18).unwrap();
        assert_eq!(
            entitlement_for(1_000_000, price, 6).unwrap(),
            parse_units("43.3125031", TOKEN_DECIMALS).unwrap()
        );
    }

    #[test]
    fn refund_inverts_entitlement_at_whole_price() {
        let price = 42 * PRICE_SCALE;
        let entitlement = entitlement_for(1_000_000, price, 6).unwrap();
        assert_eq!(entitlement, 42 * 10u128.pow(18));
        assert_eq!(refund_payment_for(entitlement, price, 6).unwrap(), 1_000_000);
    }

    #[test]
    fn overflow_is_reported() {
        assert_eq!(
            entitlement_for(u128::MAX, 2 * PRICE_SCALE, 18).unwrap_err(),
            SaleError::ArithmeticOverflow
        );
        assert_eq!(
            refund_payment_for(u128::MAX, 1, 6).unwrap_err(),
            SaleError::ArithmeticOverflow
        );
        assert!(matches!(
            refund_payment_for(1, 0, 6),
            Err(SaleError::InvalidConfig(_))
        ));
    }

    #[test]
    fn eighteen_decimal_payment_at_large_price() {
        let price = 69_420 * PRICE_SCALE;
        let thousand_eth = parse_units("1000", 18).unwrap();
        let entitlement = entitlement_for(thousand_eth, price, 18).unwrap();
        assert_eq!(entitlement, parse_units("69420000", 18).unwrap());
        assert_eq!(refund_payment_for(entitlement, price, 18).unwrap(), thousand_eth);
    }

    #[test]
    fn mul_div_uses_the_full_product() {
        assert_eq!(mul_div(u128::MAX, u128::MAX, u128::MAX).unwrap(), u128::MAX);
        assert_eq!(mul_div(u128::MAX, 2, 4).unwrap(), u128::MAX / 2);
        assert_eq!(mul_div(1 << 100, 1 << 100, 1 << 90).unwrap(), 1 << 110);
        assert_eq!(mul_div(u128::MAX, 2, 1).unwrap_err(), SaleError::ArithmeticOverflow);
        assert_eq!(mul_div(1, 1, 0).unwrap_err(), SaleError::ArithmeticOverflow);
    }

    #[test]
    fn vesting_split_matches_release_share() {
        let owed = parse_units("4331.25031", 18).unwrap();
        let split = split_redemption(owed, true).unwrap();
        assert_eq!(split.to_account, parse_units("649.6875465", 18).unwrap());
        assert_eq!(split.to_treasury, parse_units("3681.5627635", 18).unwrap());
        assert_eq!(split.total(), owed);

        let plain = split_redemption(owed, false).unwrap();
        assert_eq!(plain.to_account, owed);
        assert_eq!(plain.to_treasury, 0);
    }

    proptest! {
        #[test]
        fn refund_loses_at_most_one_unit(
            payment in 1u128..1_000_000_000_000,
            price in 1_000_000u128..1_000_000_000_000_000_000_000,
        ) {
            let entitlement = entitlement_for(payment, price, 6).unwrap();
            let refunded = refund_payment_for(entitlement, price, 6).unwrap();
            prop_assert!(refunded <= payment);
            prop_assert!(payment - refunded <= 1);
        }

        #[test]
        fn mul_div_matches_narrow_arithmetic(
            a in 0u128..=u64::MAX as u128,
            b in 0u128..=u64::MAX as u128,
            divisor in 1u128..u128::MAX,
        ) {
            prop_assert_eq!(mul_div(a, b, divisor).unwrap(), a * b / divisor);
        }

        #[test]
        fn mul_div_inverts_exact_products(a: u128, b in 1u128..=u128::MAX) {
            prop_assert_eq!(mul_div(a, b, b).unwrap(), a);
        }

        #[test]
        fn split_conserves_owed(owed in 0u128..u128::MAX / 100, vesting: bool) {
            prop_assert_eq!(split_redemption(owed, vesting).unwrap().total(), owed);
        }
    }
}
