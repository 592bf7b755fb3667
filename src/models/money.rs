// src/models/money.rs
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};

/// Currency amount held in minor units (cents).
///
/// Serialized as a decimal number of major units, e.g. `33.34`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Largest magnitude accepted from outside input, in major units.
    pub const MAX_MAJOR: f64 = 1e12;

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Converts a major-unit amount, rounding half away from zero to cents.
    /// Returns `None` for non-finite amounts or ones beyond [`Money::MAX_MAJOR`].
    pub fn try_from_major(amount: f64) -> Option<Self> {
        if !amount.is_finite() || amount.abs() > Self::MAX_MAJOR {
            return None;
        }
        Some(Self((amount * 100.0).round() as i64))
    }

    /// For amounts known to be in range; anything else becomes zero.
    pub fn from_major(amount: f64) -> Self {
        Self::try_from_major(amount).unwrap_or(Self::ZERO)
    }

    pub const fn cents(&self) -> i64 {
        self.0
    }

    pub fn as_major(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Splits the amount into `parts` shares that sum exactly to `self`.
    /// The remainder cents go to the first share.
    pub fn split_evenly(self, parts: usize) -> Vec<Money> {
        if parts == 0 {
            return Vec::new();
        }
        let n = parts as i64;
        let share = self.0 / n;
        let remainder = self.0 - share * n;

        let mut shares = vec![Money(share); parts];
        shares[0] = Money(share + remainder);
        shares
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_major())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = f64::deserialize(deserializer)?;
        Money::try_from_major(amount)
            .ok_or_else(|| serde::de::Error::custom("amount must be a finite number within range"))
    }
}
