//! Exact fixed-point amounts.
//!
//! Every monetary quantity in TSL is an unsigned integer in the smallest unit
//! of its token. Human-readable decimals ("43.3125031") are converted with
//! [`parse_units`] and [`format_units`]; no floating point is involved.

use std::fmt;

use crate::error::TypeError;

/// Decimal places of the sale (entitlement) token.
pub const TOKEN_DECIMALS: u8 = 18;

/// Scale of the sale price: token units per 1.0 payment unit, times 10^18.
pub const PRICE_SCALE: u128 = 1_000_000_000_000_000_000;

/// `10^decimals`, or an error when it does not fit in a `u128`.
pub fn pow10(decimals: u8) -> Result<u128, TypeError> {
    10u128
        .checked_pow(u32::from(decimals))
        .ok_or(TypeError::UnsupportedDecimals(decimals))
}

/// Parse a human-readable decimal into smallest units.
///
/// Surrounding whitespace and `_` separators are ignored and trailing
/// fractional zeros are insignificant, so `"210000"`, `" 210_000.000 "` and
/// `"210000.0"` all produce the same value. More significant fractional
/// digits than `decimals` is an error rather than a silent truncation.
pub fn parse_units(text: &str, decimals: u8) -> Result<u128, TypeError> {
    let cleaned: String = text.trim().chars().filter(|c| *c != '_').collect();
    let (whole, fraction) = cleaned.split_once('.').unwrap_or((cleaned.as_str(), ""));

    if whole.is_empty() && fraction.is_empty() {
        return Err(TypeError::InvalidAmount(text.to_string()));
    }
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(whole) || !all_digits(fraction) {
        return Err(TypeError::InvalidAmount(text.to_string()));
    }

    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > usize::from(decimals) {
        return Err(TypeError::TooManyDecimals {
            decimals,
            text: text.to_string(),
        });
    }

    let overflow = || TypeError::AmountOverflow(text.to_string());
    let scale = pow10(decimals)?;
    let whole_value: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| overflow())?
    };
    let fraction_value: u128 = if fraction.is_empty() {
        0
    } else {
        // `fraction.len() <= decimals`, so both the digits and the padding fit.
        let digits: u128 = fraction.parse().map_err(|_| overflow())?;
        let padding = pow10(decimals - fraction.len() as u8)?;
        digits.checked_mul(padding).ok_or_else(overflow)?
    };

    whole_value
        .checked_mul(scale)
        .and_then(|v| v.checked_add(fraction_value))
        .ok_or_else(overflow)
}

/// Render smallest units as a human-readable decimal with no trailing zeros.
pub fn format_units(value: u128, decimals: u8) -> String {
    let decimals = usize::from(decimals);
    if decimals == 0 {
        return value.to_string();
    }
    let digits = format!("{value:0>width$}", width = decimals + 1);
    let (whole, fraction) = digits.split_at(digits.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}

/// An amount paired with its decimal scale, for display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Units {
    pub value: u128,
    pub decimals: u8,
}

impl Units {
    pub fn new(value: u128, decimals: u8) -> Self {
        Self { value, decimals }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_units(self.value, self.decimals))
    }
}

/// Serde helpers for `u128` fields.
///
/// Values are written as decimal strings because common formats (TOML, JSON
/// consumers in other languages) cannot hold 128-bit integers. Reading
/// accepts either a string or a native integer.
pub mod serde_u128 {
    use std::fmt;

    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        deserializer.deserialize_any(U128Visitor)
    }

    struct U128Visitor;

    impl<'de> Visitor<'de> for U128Visitor {
        type Value = u128;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an unsigned integer or a decimal integer string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
            Ok(u128::from(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u128, E> {
            u128::try_from(v).map_err(|_| E::custom(format!("negative amount: {v}")))
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<u128, E> {
            Ok(v)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
            let cleaned: String = v.trim().chars().filter(|c| *c != '_').collect();
            cleaned
                .parse()
                .map_err(|e| E::custom(format!("invalid amount {v:?}: {e}")))
        }
    }
}
