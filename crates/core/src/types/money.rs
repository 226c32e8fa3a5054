//! Decimal money helpers and gateway minor-unit conversion.
//!
//! Prices are carried as [`Decimal`] in the currency's standard unit (dollars,
//! not cents). Payment gateways take integer minor units, so every amount sent
//! to a gateway goes through [`to_minor_units`] and is never derived from a
//! float.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Errors converting between decimal amounts and minor units.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    /// The amount has more fractional digits than the currency allows.
    #[error("{amount} has more than {exponent} decimal places for {currency}")]
    TooPrecise {
        amount: Decimal,
        exponent: u32,
        currency: CurrencyCode,
    },
    /// The amount does not fit in an `i64` count of minor units.
    #[error("{0} is out of range")]
    OutOfRange(Decimal),
}

/// ISO 4217 currency codes the store can settle in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
    JPY,
}

impl CurrencyCode {
    /// Number of decimal places in one minor unit.
    #[must_use]
    pub const fn exponent(self) -> u32 {
        match self {
            Self::JPY => 0,
            Self::USD | Self::EUR | Self::GBP | Self::CAD | Self::AUD => 2,
        }
    }

    /// Lowercase code as payment gateways expect it.
    #[must_use]
    pub const fn gateway_code(self) -> &'static str {
        match self {
            Self::USD => "usd",
            Self::EUR => "eur",
            Self::GBP => "gbp",
            Self::CAD => "cad",
            Self::AUD => "aud",
            Self::JPY => "jpy",
        }
    }

    /// Convert a count of minor units back to a decimal amount.
    #[must_use]
    pub fn from_minor_units(self, minor: i64) -> Decimal {
        Decimal::new(minor, self.exponent())
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            "JPY" => Ok(Self::JPY),
            _ => Err(format!("unsupported currency: {s}")),
        }
    }
}

/// Convert a decimal amount to an integer count of the currency's minor unit.
///
/// Amounts with more precision than the currency supports are rejected rather
/// than rounded, since silently rounding would make the charged amount differ
/// from the order total.
///
/// # Errors
///
/// Returns [`MoneyError::TooPrecise`] for sub-minor-unit amounts and
/// [`MoneyError::OutOfRange`] if the result does not fit in an `i64`.
pub fn to_minor_units(amount: Decimal, currency: CurrencyCode) -> Result<i64, MoneyError> {
    let exponent = currency.exponent();
    let normalized = amount.normalize();
    if normalized.scale() > exponent {
        return Err(MoneyError::TooPrecise {
            amount,
            exponent,
            currency,
        });
    }

    let factor = Decimal::from(10_i64.pow(exponent));
    amount
        .checked_mul(factor)
        .and_then(|minor| minor.trunc().to_i64())
        .ok_or(MoneyError::OutOfRange(amount))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_to_minor_units_usd() {
        assert_eq!(to_minor_units(dec("57.50"), CurrencyCode::USD).unwrap(), 5750);
        assert_eq!(to_minor_units(dec("0.1"), CurrencyCode::USD).unwrap(), 10);
        assert_eq!(to_minor_units(dec("19.99"), CurrencyCode::USD).unwrap(), 1999);
    }

    #[test]
    fn test_to_minor_units_avoids_float_drift() {
        // 0.1 + 0.2 is not 0.3 in binary floating point
        let sum = dec("0.1") + dec("0.2");
        assert_eq!(to_minor_units(sum, CurrencyCode::USD).unwrap(), 30);
    }

    #[test]
    fn test_to_minor_units_zero_exponent() {
        assert_eq!(to_minor_units(dec("1200"), CurrencyCode::JPY).unwrap(), 1200);
        assert!(to_minor_units(dec("1200.5"), CurrencyCode::JPY).is_err());
    }

    #[test]
    fn test_to_minor_units_rejects_sub_cent() {
        assert!(matches!(
            to_minor_units(dec("1.005"), CurrencyCode::USD),
            Err(MoneyError::TooPrecise { .. })
        ));
    }

    #[test]
    fn test_trailing_zeros_are_not_extra_precision() {
        assert_eq!(to_minor_units(dec("57.5000"), CurrencyCode::USD).unwrap(), 5750);
    }

    #[test]
    fn test_from_minor_units() {
        assert_eq!(CurrencyCode::USD.from_minor_units(5750), dec("57.50"));
        assert_eq!(CurrencyCode::JPY.from_minor_units(300), dec("300"));
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("usd".parse::<CurrencyCode>().unwrap(), CurrencyCode::USD);
        assert!("xyz".parse::<CurrencyCode>().is_err());
    }
}
