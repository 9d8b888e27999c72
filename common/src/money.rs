//! [`Money`]-related definitions.

use std::{fmt, str::FromStr};

use rust_decimal::{prelude::ToPrimitive as _, Decimal};

use crate::define_kind;

/// Amount of money in some [`Currency`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Money {
    /// Amount of this [`Money`].
    pub amount: Decimal,

    /// [`Currency`] of this amount.
    pub currency: Currency,
}

impl Money {
    /// Returns this [`Money`] amount in minor units of its [`Currency`]
    /// (paise, cents).
    ///
    /// Payment gateways denominate orders in minor units.
    ///
    /// [`None`] is returned if the amount overflows [`i64`] minor units.
    #[must_use]
    pub fn minor_units(&self) -> Option<i64> {
        (self.amount * Decimal::ONE_HUNDRED).trunc().to_i64()
    }

    /// Indicates whether this [`Money`] amount is chargeable, i.e. strictly
    /// positive.
    #[must_use]
    pub fn is_chargeable(&self) -> bool {
        self.amount > Decimal::ZERO
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { amount, currency } = self;
        if amount.is_integer() {
            write!(f, "{}{currency}", amount.to_i128().expect("integer"))
        } else {
            write!(f, "{amount}{currency}")
        }
    }
}

impl FromStr for Money {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < 4 {
            return Err("too short");
        }

        let (amount, currency) = s.split_at(s.len() - 3);
        let amount = Decimal::from_str(amount).map_err(|_| "invalid amount")?;
        let currency =
            Currency::from_str(currency).map_err(|_| "invalid currency")?;

        Ok(Self { amount, currency })
    }
}

define_kind! {
    #[doc = "Currency of a [`Money`] amount."]
    enum Currency {
        #[doc = "Indian Rupee."]
        Inr = 1,

        #[doc = "US Dollar."]
        Usd = 2,

        #[doc = "Euro."]
        Eur = 3,
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use rust_decimal::Decimal;

    use super::{Currency, Money};

    fn decimal(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn from_str() {
        assert_eq!(
            Money::from_str("500INR").unwrap(),
            Money {
                amount: decimal("500"),
                currency: Currency::Inr,
            },
        );

        assert_eq!(
            Money::from_str("123.45USD").unwrap(),
            Money {
                amount: decimal("123.45"),
                currency: Currency::Usd,
            },
        );

        assert_eq!(
            Money::from_str("123.45EUR").unwrap(),
            Money {
                amount: decimal("123.45"),
                currency: Currency::Eur,
            },
        );

        assert!(Money::from_str("123.45").is_err());
        assert!(Money::from_str("123.45In").is_err());
        assert!(Money::from_str("123.45Rupees").is_err());

        assert!(Money::from_str("123.00INR").is_ok());
        assert!(Money::from_str("123.0INR").is_ok());
        assert!(Money::from_str("123INR").is_ok());
    }

    #[test]
    fn to_string() {
        assert_eq!(
            Money {
                amount: decimal("123.45"),
                currency: Currency::Inr,
            }
            .to_string(),
            "123.45INR",
        );

        assert_eq!(
            Money {
                amount: decimal("123.00"),
                currency: Currency::Usd,
            }
            .to_string(),
            "123USD",
        );
    }

    #[test]
    fn minor_units() {
        assert_eq!(
            Money::from_str("500INR").unwrap().minor_units(),
            Some(50000),
        );
        assert_eq!(
            Money::from_str("123.45USD").unwrap().minor_units(),
            Some(12345),
        );
        assert_eq!(Money::from_str("0.009EUR").unwrap().minor_units(), Some(0));
    }

    #[test]
    fn chargeable() {
        assert!(Money::from_str("0.01INR").unwrap().is_chargeable());
        assert!(!Money::from_str("0INR").unwrap().is_chargeable());
        assert!(!Money::from_str("-5INR").unwrap().is_chargeable());
    }
}
