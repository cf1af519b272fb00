use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Sub},
};

use serde::{Deserialize, Serialize};

use crate::op;

pub const FIAT_CURRENCY_CODE: &str = "INR";

//--------------------------------------        Fiat         ---------------------------------------------------------
/// An amount in the target fiat currency. Fiat amounts are whole rupees; the payment rails do not
/// carry sub-rupee precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fiat(u64);

op!(binary Fiat, Add, add);
op!(binary Fiat, Sub, sub);
op!(inplace Fiat, AddAssign, add_assign);

impl Sum for Fiat {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl From<u64> for Fiat {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Display for Fiat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "₹{}", self.0)
    }
}

impl Fiat {
    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}
