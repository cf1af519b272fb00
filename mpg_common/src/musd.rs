use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Sub},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::op;

pub const MUSD_CURRENCY_CODE: &str = "mUSD";

/// One whole mUSD in base units. The settlement asset carries 18 decimals on chain.
const MUSD_SCALE: u128 = 1_000_000_000_000_000_000;

//--------------------------------------        Musd         ---------------------------------------------------------
/// An amount of the mUSD settlement asset, held in base (18-decimal) units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Musd(u128);

op!(binary Musd, Add, add);
op!(binary Musd, Sub, sub);
op!(inplace Musd, AddAssign, add_assign);

impl Sum for Musd {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in mUSD base units: {0}")]
pub struct MusdConversionError(pub String);

impl From<u128> for Musd {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl Display for Musd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 > 0 && self.0 < MUSD_SCALE / 100 {
            // Dust amounts would render as 0.00
            write!(f, "{} base units", self.0)
        } else {
            let musd = self.0 as f64 / MUSD_SCALE as f64;
            write!(f, "{musd:0.2} {MUSD_CURRENCY_CODE}")
        }
    }
}

impl Musd {
    pub fn value(&self) -> u128 {
        self.0
    }

    pub fn from_musd(whole: u64) -> Self {
        Self(u128::from(whole) * MUSD_SCALE)
    }

    /// The amount in whole mUSD, truncating any fractional part.
    pub fn whole_units(&self) -> u64 {
        u64::try_from(self.0 / MUSD_SCALE).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn whole_unit_conversions() {
        let amount = Musd::from_musd(42);
        assert_eq!(amount.value(), 42 * MUSD_SCALE);
        assert_eq!(amount.whole_units(), 42);
        assert_eq!(Musd::from(MUSD_SCALE / 2).whole_units(), 0);
    }

    #[test]
    fn arithmetic() {
        let total: Musd = [Musd::from_musd(1), Musd::from_musd(2)].into_iter().sum();
        assert_eq!(total, Musd::from_musd(3));
        assert_eq!(Musd::from_musd(5) - Musd::from_musd(2), Musd::from_musd(3));
    }

    #[test]
    fn display() {
        assert_eq!(Musd::from_musd(10).to_string(), "10.00 mUSD");
        assert_eq!(Musd::from(250u128).to_string(), "250 base units");
        assert_eq!(Musd::default().to_string(), "0.00 mUSD");
    }
}
