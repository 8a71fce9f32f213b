use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Neg;

/// A number of units in a single currency, e.g. `100.00 AUD`.
///
/// Numbers are exact decimals and keep the scale they were parsed with, so
/// `100.00` renders back as `100.00` and negates to `-100.00`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    pub number: Decimal,
    pub currency: String,
}

impl Amount {
    pub fn new(number: Decimal, currency: &str) -> Self {
        Amount {
            number,
            currency: currency.to_string(),
        }
    }

    pub fn zero(currency: &str) -> Self {
        Amount::new(Decimal::ZERO, currency)
    }

    pub fn is_zero(&self) -> bool {
        self.number.is_zero()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.number, self.currency)
    }
}

impl Neg for Amount {
    type Output = Self;
    fn neg(self) -> Self {
        Amount {
            number: -self.number,
            currency: self.currency,
        }
    }
}

impl Neg for &Amount {
    type Output = Amount;
    fn neg(self) -> Amount {
        -self.clone()
    }
}
