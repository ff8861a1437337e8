//! Directed exchange-rate edges and their keys.

use crate::core::currency::Currency;
use crate::core::error::RateError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Structured `(base, quote)` edge key. Serialized as `BASE-QUOTE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RateKey {
    pub base: Currency,
    pub quote: Currency,
}

impl RateKey {
    pub fn new(base: Currency, quote: Currency) -> Self {
        Self { base, quote }
    }

    pub fn inverse(&self) -> Self {
        Self::new(self.quote, self.base)
    }
}

impl Display for RateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.base, self.quote)
    }
}

impl FromStr for RateKey {
    type Err = RateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .split_once('-')
            .ok_or_else(|| RateError::InvalidKey(s.to_string()))?;
        let base = base
            .parse::<Currency>()
            .map_err(|_| RateError::InvalidKey(s.to_string()))?;
        let quote = quote
            .parse::<Currency>()
            .map_err(|_| RateError::InvalidKey(s.to_string()))?;
        Ok(Self::new(base, quote))
    }
}

impl TryFrom<String> for RateKey {
    type Error = RateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RateKey> for String {
    fn from(key: RateKey) -> Self {
        key.to_string()
    }
}

/// Canonical string form of an edge key, e.g. `USD-VES`.
pub fn create_rate_key(base: Currency, quote: Currency) -> String {
    RateKey::new(base, quote).to_string()
}

/// One unit of `base` equals `value` units of `quote`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rate {
    base: Currency,
    quote: Currency,
    value: f64,
    provider: String,
    at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawRate {
    base: Currency,
    quote: Currency,
    value: f64,
    provider: String,
    at: DateTime<Utc>,
}

impl<'de> Deserialize<'de> for Rate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawRate::deserialize(deserializer)?;
        Rate::new(raw.base, raw.quote, raw.value, raw.provider, raw.at)
            .map_err(serde::de::Error::custom)
    }
}

impl Rate {
    /// Builds a validated edge. `value` must be positive, finite and have a
    /// finite reciprocal, so every rate can be inverted.
    pub fn new(
        base: Currency,
        quote: Currency,
        value: f64,
        provider: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<Self, RateError> {
        if !value.is_finite() || value <= 0.0 || !(1.0 / value).is_finite() {
            return Err(RateError::InvalidValue {
                key: RateKey::new(base, quote),
                value,
            });
        }
        Ok(Self {
            base,
            quote,
            value,
            provider: provider.into(),
            at,
        })
    }

    pub fn key(&self) -> RateKey {
        RateKey::new(self.base, self.quote)
    }

    pub fn base(&self) -> Currency {
        self.base
    }

    pub fn quote(&self) -> Currency {
        self.quote
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }

    /// Reverse edge with `1 / value`, keeping provider and timestamp.
    pub fn inverse(&self) -> Rate {
        Rate {
            base: self.quote,
            quote: self.base,
            value: 1.0 / self.value,
            provider: self.provider.clone(),
            at: self.at,
        }
    }

    /// Chains `self` (`A -> P`) with `next` (`P -> B`) into `A -> B`.
    ///
    /// Returns `None` when the pivot currencies do not line up. The value is
    /// rounded to `digits` significant digits and the provider label joins both
    /// sources with `+`.
    pub fn cross(&self, next: &Rate, digits: u32, at: DateTime<Utc>) -> Option<Rate> {
        if self.quote != next.base || self.base == next.quote {
            return None;
        }
        let value = round_to_significant_digits(self.value * next.value, digits);
        Rate::new(
            self.base,
            next.quote,
            value,
            format!("{}+{}", self.provider, next.provider),
            at,
        )
        .ok()
    }
}

/// Most significant digits an `f64` can meaningfully carry.
pub const MAX_SIGNIFICANT_DIGITS: u32 = 17;

/// Rounds `value` to `digits` significant decimal digits.
///
/// `digits` is clamped to `1..=MAX_SIGNIFICANT_DIGITS`. Values too close to
/// the `f64` limits to scale are returned unrounded.
pub fn round_to_significant_digits(value: f64, digits: u32) -> f64 {
    if value == 0.0 || !value.is_finite() {
        return value;
    }
    let digits = digits.clamp(1, MAX_SIGNIFICANT_DIGITS) as i32;
    let magnitude = value.abs().log10().floor() as i32;
    let scale = digits - 1 - magnitude;
    let factor = 10f64.powi(scale.abs());
    if !factor.is_finite() {
        return value;
    }
    let rounded = if scale >= 0 {
        (value * factor).round() / factor
    } else {
        (value / factor).round() * factor
    };
    if rounded.is_finite() { rounded } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_create_rate_key() {
        assert_eq!(create_rate_key(Currency::Usd, Currency::Ves), "USD-VES");
        assert_eq!(create_rate_key(Currency::Eur, Currency::Usd), "EUR-USD");
    }

    #[test]
    fn test_rate_key_is_directional() {
        for a in Currency::ALL {
            for b in Currency::ALL {
                if a != b {
                    assert_ne!(create_rate_key(a, b), create_rate_key(b, a));
                }
            }
        }
    }

    #[test]
    fn test_rate_key_parse() {
        let key: RateKey = "cop-ves".parse().unwrap();
        assert_eq!(key, RateKey::new(Currency::Cop, Currency::Ves));
        assert!("USDVES".parse::<RateKey>().is_err());
        assert!("USD-XYZ".parse::<RateKey>().is_err());
    }

    #[test]
    fn test_rate_rejects_invalid_values() {
        for value in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let result = Rate::new(Currency::Usd, Currency::Ves, value, "BCV", at());
            assert!(matches!(result, Err(RateError::InvalidValue { .. })));
        }
    }

    #[test]
    fn test_rate_rejects_values_without_finite_inverse() {
        let tiny = Rate::new(Currency::Usd, Currency::Cop, 1e-310, "Tiny", at());
        assert!(matches!(tiny, Err(RateError::InvalidValue { .. })));

        let huge = Rate::new(Currency::Usd, Currency::Cop, f64::MAX, "Huge", at()).unwrap();
        let inverse = huge.inverse();
        assert!(inverse.value().is_finite() && inverse.value() > 0.0);
        assert!(Rate::new(inverse.base(), inverse.quote(), inverse.value(), "x", at()).is_ok());
    }

    #[test]
    fn test_inverse_rate() {
        let rate = Rate::new(Currency::Usd, Currency::Ves, 36.21, "BCV", at()).unwrap();
        let inverse = rate.inverse();

        assert_eq!(inverse.base(), Currency::Ves);
        assert_eq!(inverse.quote(), Currency::Usd);
        assert!((inverse.value() - 1.0 / 36.21).abs() < 1e-12);
        assert_eq!(inverse.provider(), "BCV");
        assert_eq!(inverse.at(), rate.at());
        assert!((inverse.inverse().value() - 36.21).abs() < 1e-9);
    }

    #[test]
    fn test_cross_rate() {
        let eur_usd = Rate::new(Currency::Eur, Currency::Usd, 1.08, "Frankfurter", at()).unwrap();
        let usd_ves = Rate::new(Currency::Usd, Currency::Ves, 195.0, "BCV", at()).unwrap();

        let cross = eur_usd.cross(&usd_ves, 6, at()).unwrap();
        assert_eq!(cross.key(), RateKey::new(Currency::Eur, Currency::Ves));
        assert_eq!(cross.value(), 210.6);
        assert_eq!(cross.provider(), "Frankfurter+BCV");

        assert!(usd_ves.cross(&eur_usd, 6, at()).is_none());
    }

    #[test]
    fn test_round_to_significant_digits() {
        assert_eq!(round_to_significant_digits(36.2156789, 6), 36.2157);
        assert_eq!(round_to_significant_digits(0.001234567, 4), 0.001235);
        assert_eq!(round_to_significant_digits(123456.789, 3), 123000.0);
        assert_eq!(round_to_significant_digits(-36.2156789, 6), -36.2157);
        for digits in [1, 6, 8] {
            assert_eq!(round_to_significant_digits(0.0, digits), 0.0);
        }
    }

    #[test]
    fn test_round_near_f64_limits() {
        // Scaling a subnormal to 6 digits would need 10^325.
        assert_eq!(round_to_significant_digits(5e-320, 6), 5e-320);
        // Rounding 1.7e308 up to one digit would overflow.
        assert_eq!(round_to_significant_digits(1.7e308, 1), 1.7e308);
        let tiny = round_to_significant_digits(1.23456789e-300, 6);
        assert!((tiny / 1.23457e-300 - 1.0).abs() < 1e-12);

        // Out-of-range digit counts are clamped instead of overflowing.
        assert!((round_to_significant_digits(36.2156789, 400) - 36.2156789).abs() < 1e-12);
        assert_eq!(round_to_significant_digits(36.2156789, 0), 40.0);
        assert!(round_to_significant_digits(1e-12, u32::MAX).is_finite());
    }

    #[test]
    fn test_rate_json_shape() {
        let rate = Rate::new(Currency::Usd, Currency::Ves, 36.21, "BCV", at()).unwrap();
        let json = serde_json::to_value(&rate).unwrap();
        assert_eq!(json["base"], "USD");
        assert_eq!(json["quote"], "VES");
        assert_eq!(json["provider"], "BCV");
        assert_eq!(json["at"], "2024-01-01T00:00:00Z");

        let bad = r#"{"base":"USD","quote":"VES","value":0,"provider":"x","at":"2024-01-01T00:00:00Z"}"#;
        assert!(serde_json::from_str::<Rate>(bad).is_err());
    }
}
