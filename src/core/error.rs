//! Error types for the rate graph and composition engine.

use crate::core::rate::RateKey;
use thiserror::Error;

/// Errors raised while constructing rates and keys.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RateError {
    /// Rate values must be positive and finite.
    #[error("Invalid rate value {value} for {key}")]
    InvalidValue { key: RateKey, value: f64 },

    /// Edge key does not follow the `BASE-QUOTE` format.
    #[error("Invalid rate key: {0}")]
    InvalidKey(String),
}

/// Failure of a whole composition cycle, distinct from an empty but valid response.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// An edge is stored under a key that does not match its currencies.
    #[error("Rate stored under {key} describes {actual}")]
    KeyMismatch { key: RateKey, actual: RateKey },

    /// A rate in the finished graph violates the rate invariants.
    #[error("Composed graph holds an invalid rate: {0}")]
    InvalidRate(#[from] RateError),
}
