//! Conversion between raw on-chain amounts and UI amounts.

use crate::error::AmountError;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Most decimals a token may have; `Decimal` cannot scale by more.
pub const MAX_DECIMALS: u8 = 28;

/// Checks that amounts of a token with `decimals` decimals can be converted.
///
/// # Errors
/// Returns [`AmountError::UnsupportedDecimals`] beyond [`MAX_DECIMALS`].
pub fn check_decimals(decimals: u8) -> Result<(), AmountError> {
    if decimals > MAX_DECIMALS {
        return Err(AmountError::UnsupportedDecimals { decimals });
    }
    Ok(())
}

/// Scale factor for a token with `decimals` decimal places.
///
/// Decimals beyond [`MAX_DECIMALS`] scale as [`MAX_DECIMALS`]; snapshots are
/// rejected with [`check_decimals`] before their amounts are converted.
fn scale(decimals: u8) -> Decimal {
    let exponent = u32::from(decimals.min(MAX_DECIMALS));
    Decimal::from_i128_with_scale(10i128.pow(exponent), 0)
}

/// Converts a raw on-chain amount into UI units.
pub fn to_ui_amount(raw: u64, decimals: u8) -> Decimal {
    Decimal::from(raw) / scale(decimals)
}

/// Converts a UI amount into raw units.
///
/// Dust below one raw unit is truncated. Negative amounts map to zero and
/// amounts beyond `u64::MAX` saturate.
pub fn to_raw_amount(amount: Decimal, decimals: u8) -> u64 {
    if amount.is_sign_negative() {
        return 0;
    }
    amount
        .checked_mul(scale(decimals))
        .and_then(|raw| raw.trunc().to_u64())
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_to_ui_amount() {
        assert_eq!(to_ui_amount(1_500_000_000, 9), dec!(1.5));
        assert_eq!(to_ui_amount(250_000_000, 6), dec!(250));
        assert_eq!(to_ui_amount(42, 0), dec!(42));
    }

    #[test]
    fn test_to_raw_amount_truncates_dust() {
        assert_eq!(to_raw_amount(dec!(1.2345678919), 9), 1_234_567_891);
        assert_eq!(to_raw_amount(dec!(0.0000001), 6), 0);
    }

    #[test]
    fn test_unsupported_decimals() {
        assert!(check_decimals(9).is_ok());
        assert!(check_decimals(MAX_DECIMALS).is_ok());
        assert_eq!(
            check_decimals(30),
            Err(AmountError::UnsupportedDecimals { decimals: 30 })
        );
        // Conversions stay total for any decimals.
        assert_eq!(to_ui_amount(5, 20), dec!(0.00000000000000000005));
        assert_eq!(to_raw_amount(dec!(1), 255), u64::MAX);
    }

    #[test]
    fn test_to_raw_amount_negative_is_zero() {
        assert_eq!(to_raw_amount(dec!(-3), 6), 0);
    }
}
