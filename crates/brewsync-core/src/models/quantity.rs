//! Fixed-point decimal quantities.
//!
//! Volumes, temperatures and amounts travel through the translator as whole
//! thousandths so that translating the same record twice is bit-for-bit
//! stable and pushing a recipe never drifts through float round-trips.

use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const SCALE: i64 = 1000;
const DECIMALS: u32 = 3;

/// A decimal value stored as an integer count of thousandths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Milli(i64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid decimal '{0}'")]
pub struct ParseMilliError(pub String);

impl Milli {
    pub const ZERO: Self = Self(0);

    /// Build from a raw count of thousandths.
    pub const fn from_raw(thousandths: i64) -> Self {
        Self(thousandths)
    }

    pub const fn raw(self) -> i64 {
        self.0
    }

    pub const fn from_int(value: i64) -> Self {
        Self(value.saturating_mul(SCALE))
    }

    /// Quantise a float once, rounding half away from zero.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() {
            Self((value * 1000.0).round() as i64)
        } else {
            Self::ZERO
        }
    }

    /// Exact ratio `num / den`, rounded to thousandths.
    pub fn from_ratio(num: i64, den: i64) -> Self {
        Self::from_int(num).scale(1, den)
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    /// Multiply by the rational `num / den`, rounding half away from zero.
    ///
    /// A zero denominator yields zero.
    #[allow(clippy::cast_possible_truncation)]
    pub fn scale(self, num: i64, den: i64) -> Self {
        if den == 0 {
            return Self::ZERO;
        }
        let product = i128::from(self.0) * i128::from(num);
        let quotient = div_round(product, i128::from(den));
        Self(quotient.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64)
    }

    /// Round to `places` decimal places (0..=3).
    pub fn round_to(self, places: u32) -> Self {
        let places = places.min(DECIMALS);
        let step = 10_i64.pow(DECIMALS - places);
        Self(self.scale(1, step).0.saturating_mul(step))
    }

    /// Round to the nearest whole number.
    pub fn round_int(self) -> i64 {
        self.scale(1, SCALE).0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Exact arithmetic mean, rounded to thousandths.
    pub fn mean(values: &[Self]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let sum: i128 = values.iter().map(|value| i128::from(value.0)).sum();
        let count = i128::try_from(values.len()).ok()?;
        i64::try_from(div_round(sum, count)).ok().map(Self)
    }
}

fn div_round(num: i128, den: i128) -> i128 {
    let quotient = num / den;
    let remainder = num % den;
    if remainder.abs() * 2 >= den.abs() {
        quotient + num.signum() * den.signum()
    } else {
        quotient
    }
}

impl Add for Milli {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Milli {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for Milli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        let whole = magnitude / 1000;
        let fraction = magnitude % 1000;
        if fraction == 0 {
            write!(f, "{sign}{whole}")
        } else {
            let digits = format!("{fraction:03}");
            write!(f, "{sign}{whole}.{}", digits.trim_end_matches('0'))
        }
    }
}

impl FromStr for Milli {
    type Err = ParseMilliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseMilliError(s.to_string());
        let trimmed = s.trim();
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        let whole_value: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let mut fraction_value = 0_i64;
        for (index, digit) in fraction.bytes().take(3).enumerate() {
            let weight = 10_i64.pow(2 - u32::try_from(index).map_err(|_| invalid())?);
            fraction_value += i64::from(digit - b'0') * weight;
        }
        let round_up = fraction.as_bytes().get(3).is_some_and(|digit| *digit >= b'5');

        let mut raw = whole_value
            .checked_mul(SCALE)
            .and_then(|value| value.checked_add(fraction_value))
            .ok_or_else(invalid)?;
        if round_up {
            raw = raw.checked_add(1).ok_or_else(invalid)?;
        }
        Ok(Self(if negative { -raw } else { raw }))
    }
}

impl Serialize for Milli {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0 % SCALE == 0 {
            serializer.serialize_i64(self.0 / SCALE)
        } else {
            serializer.serialize_f64(self.to_f64())
        }
    }
}

struct MilliVisitor;

impl Visitor<'_> for MilliVisitor {
    type Value = Milli;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a decimal number or numeric string")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Milli, E> {
        Ok(Milli::from_int(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Milli, E> {
        i64::try_from(value)
            .map(Milli::from_int)
            .map_err(|_| E::custom("decimal out of range"))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Milli, E> {
        Ok(Milli::from_f64(value))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Milli, E> {
        value.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Milli {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MilliVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exact_decimals() {
        assert_eq!("20".parse::<Milli>().unwrap(), Milli::from_raw(20_000));
        assert_eq!("20.5".parse::<Milli>().unwrap(), Milli::from_raw(20_500));
        assert_eq!("-0.125".parse::<Milli>().unwrap(), Milli::from_raw(-125));
        assert_eq!(".5".parse::<Milli>().unwrap(), Milli::from_raw(500));
        assert_eq!("1.0005".parse::<Milli>().unwrap(), Milli::from_raw(1001));
    }

    #[test]
    fn rejects_garbage() {
        assert!("".parse::<Milli>().is_err());
        assert!("abc".parse::<Milli>().is_err());
        assert!("1.2.3".parse::<Milli>().is_err());
        assert!("1e3".parse::<Milli>().is_err());
    }

    #[test]
    fn display_trims_trailing_zeros() {
        assert_eq!(Milli::from_raw(23_500).to_string(), "23.5");
        assert_eq!(Milli::from_raw(23_000).to_string(), "23");
        assert_eq!(Milli::from_raw(-500).to_string(), "-0.5");
        assert_eq!(Milli::from_raw(1_005).to_string(), "1.005");
    }

    #[test]
    fn scale_rounds_half_away_from_zero() {
        assert_eq!(Milli::from_raw(1_500).scale(1, 1000), Milli::from_raw(2));
        assert_eq!(Milli::from_raw(-1_500).scale(1, 1000), Milli::from_raw(-2));
        assert_eq!(Milli::from_int(7).scale(1, 0), Milli::ZERO);
        assert_eq!(Milli::from_ratio(1, 3), Milli::from_raw(333));
    }

    #[test]
    fn round_to_fewer_places() {
        let value = Milli::from_raw(72_456);
        assert_eq!(value.round_to(2), Milli::from_raw(72_460));
        assert_eq!(value.round_to(1), Milli::from_raw(72_500));
        assert_eq!(value.round_to(0), Milli::from_raw(72_000));
        assert_eq!(value.round_int(), 72);
    }

    #[test]
    fn mean_is_exact() {
        let values = [Milli::from_int(18), Milli::from_int(19), Milli::from_int(20)];
        assert_eq!(Milli::mean(&values), Some(Milli::from_int(19)));
        assert_eq!(Milli::mean(&[]), None);
    }

    #[test]
    fn json_serialization_is_stable() {
        assert_eq!(serde_json::to_string(&Milli::from_int(23)).unwrap(), "23");
        assert_eq!(serde_json::to_string(&Milli::from_raw(23_500)).unwrap(), "23.5");
        let parsed: Milli = serde_json::from_str("23.5").unwrap();
        assert_eq!(parsed, Milli::from_raw(23_500));
        let parsed: Milli = serde_json::from_str("\"4.250\"").unwrap();
        assert_eq!(parsed, Milli::from_raw(4_250));
    }
}
